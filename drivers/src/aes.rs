/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains API for AES Cryptography operations, key slot management
    and the secure boot / secure storage key checks.

--*/

use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::{mode_pkt, se, Config, CryptoConfig};
use tock_registers::fields::FieldValue;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::dma::BufferId;
use crate::engine::{Locked, SeEngine};
use crate::hw::{SeHw, Submission};
use crate::key_slot::{SBK_SLOT, SSK_SLOT};
use crate::platform::SePlatform;

pub const AES_BLOCK_SIZE: usize = 16;

const AES_MAX_KEY_SIZE: usize = 32;

/// Ciphertext of blocks 00..0f under an all-zero secure boot key
const SBK_CLEAR_CIPHERTEXT: [u8; AES_BLOCK_SIZE] = [
    0x7a, 0xca, 0x0f, 0xd9, 0xbc, 0xd6, 0xec, 0x7c, 0x9f, 0x97, 0x46, 0x66, 0x16, 0xe6, 0xa2, 0x82,
];

const SBK_CLEAR_PLAINTEXT: [u8; AES_BLOCK_SIZE] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

/// Block cipher mode of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    Ecb,
    Cbc,
    Ofb,
    Ctr,
}

/// AES key size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesKeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl AesKeySize {
    pub fn from_len(len: usize) -> SeResult<Self> {
        match len {
            16 => Ok(AesKeySize::Aes128),
            24 => Ok(AesKeySize::Aes192),
            32 => Ok(AesKeySize::Aes256),
            _ => Err(SeError::AES_INVALID_KEY_LENGTH),
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            AesKeySize::Aes128 => 16,
            AesKeySize::Aes192 => 24,
            AesKeySize::Aes256 => 32,
        }
    }

    fn mode_pkt(&self) -> u32 {
        match self {
            AesKeySize::Aes128 => mode_pkt::AES_KEY128,
            AesKeySize::Aes192 => mode_pkt::AES_KEY192,
            AesKeySize::Aes256 => mode_pkt::AES_KEY256,
        }
    }
}

/// Where the key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesKeyType {
    /// Secure boot key, resident in its reserved slot
    SecureBootKey,

    /// Secure storage key, resident in its reserved slot
    SecureStorageKey,

    /// Caller supplied key loaded into a free slot
    UserSpecified,
}

/// Key selection request.
#[derive(Debug, Clone, Copy)]
pub struct AesKeyInfo<'a> {
    pub key_type: AesKeyType,

    /// Key length in bytes: 16, 24 or 32
    pub key_length: usize,

    /// Key bytes, used for [`AesKeyType::UserSpecified`] only
    pub key: &'a [u8],
}

impl<'a> AesKeyInfo<'a> {
    pub fn user(key: &'a [u8]) -> Self {
        Self {
            key_type: AesKeyType::UserSpecified,
            key_length: key.len(),
            key,
        }
    }

    pub fn secure_boot_key() -> Self {
        Self {
            key_type: AesKeyType::SecureBootKey,
            key_length: 16,
            key: &[],
        }
    }

    pub fn secure_storage_key() -> Self {
        Self {
            key_type: AesKeyType::SecureStorageKey,
            key_length: 16,
            key: &[],
        }
    }
}

#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
struct KeyMaterial {
    bytes: [u8; AES_MAX_KEY_SIZE],
    len: usize,
}

/// AES state of one client.
#[derive(Clone)]
pub struct AesSession {
    mode: Option<AesMode>,
    encrypt: bool,
    key_type: AesKeyType,
    key_size: AesKeySize,
    key_slot: Option<u32>,
    key: KeyMaterial,
    iv: [u8; AES_BLOCK_SIZE],

    /// CMAC chaining value between chunks
    pub(crate) cmac_iv: [u8; AES_BLOCK_SIZE],

    /// Cipher of the zero block, the CMAC subkey seed
    pub(crate) cmac_l: [u8; AES_BLOCK_SIZE],
}

impl Default for AesSession {
    fn default() -> Self {
        Self {
            mode: None,
            encrypt: true,
            key_type: AesKeyType::UserSpecified,
            key_size: AesKeySize::Aes128,
            key_slot: None,
            key: KeyMaterial::default(),
            iv: [0; AES_BLOCK_SIZE],
            cmac_iv: [0; AES_BLOCK_SIZE],
            cmac_l: [0; AES_BLOCK_SIZE],
        }
    }
}

impl core::fmt::Debug for AesSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesSession")
            .field("mode", &self.mode)
            .field("encrypt", &self.encrypt)
            .field("key_type", &self.key_type)
            .field("key_size", &self.key_size)
            .field("key_slot", &self.key_slot)
            .finish_non_exhaustive()
    }
}

impl AesSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the mode and direction of subsequent [`SeEngine::aes_process_buffer`] calls
    pub fn select_operation(&mut self, mode: AesMode, encrypt: bool) -> SeResult<()> {
        match mode {
            AesMode::Ecb | AesMode::Cbc => {
                self.mode = Some(mode);
                self.encrypt = encrypt;
                Ok(())
            }
            AesMode::Ofb | AesMode::Ctr => {
                log::warn!("AES mode {:?} is not supported", mode);
                Err(SeError::AES_UNSUPPORTED_MODE)
            }
        }
    }

    pub fn mode(&self) -> Option<AesMode> {
        self.mode
    }

    pub fn is_encrypt(&self) -> bool {
        self.encrypt
    }

    pub fn key_slot(&self) -> Option<u32> {
        self.key_slot
    }

    pub fn key_type(&self) -> AesKeyType {
        self.key_type
    }

    pub fn key_size(&self) -> AesKeySize {
        self.key_size
    }

    /// Copy the IV last set on this session into `iv`
    pub fn initial_vector(&self, iv: &mut [u8]) -> SeResult<()> {
        if iv.len() < AES_BLOCK_SIZE {
            Err(SeError::AES_IV_BUFFER_TOO_SMALL)?;
        }
        iv[..AES_BLOCK_SIZE].copy_from_slice(&self.iv);
        Ok(())
    }

    pub(crate) fn user_slot(&self) -> Option<u32> {
        match self.key_type {
            AesKeyType::UserSpecified => self.key_slot,
            _ => None,
        }
    }

    pub(crate) fn forget_key(&mut self) {
        self.key_slot = None;
        self.key.zeroize();
    }
}

/// Register settings of one AES submission
#[derive(Debug, Clone, Copy)]
pub(crate) struct AesParams {
    pub mode: AesMode,
    pub encrypt: bool,
    pub slot: u32,
    pub key_size: AesKeySize,
}

impl AesParams {
    pub fn cbc_encrypt(slot: u32, key_size: AesKeySize) -> Self {
        Self {
            mode: AesMode::Cbc,
            encrypt: true,
            slot,
            key_size,
        }
    }

    fn config(&self) -> FieldValue<u32, Config::Register> {
        let pkt = self.key_size.mode_pkt();
        if self.encrypt {
            Config::ENC_MODE.val(pkt) + Config::ENC_ALG::AES_ENC + Config::DEC_ALG::NOP
        } else {
            Config::DEC_MODE.val(pkt) + Config::DEC_ALG::AES_DEC + Config::ENC_ALG::NOP
        }
    }

    fn crypto_config(&self) -> FieldValue<u32, CryptoConfig::Register> {
        let common = CryptoConfig::INPUT_SEL::AHB + CryptoConfig::KEY_INDEX.val(self.slot);
        match (self.mode, self.encrypt) {
            (AesMode::Cbc, true) => {
                common
                    + CryptoConfig::XOR_POS::TOP
                    + CryptoConfig::VCTRAM_SEL::AESOUT
                    + CryptoConfig::IV_SELECT::UPDATED
                    + CryptoConfig::CORE_SEL::ENCRYPT
            }
            (AesMode::Cbc, false) => {
                common
                    + CryptoConfig::XOR_POS::BOTTOM
                    + CryptoConfig::VCTRAM_SEL::PREVAHB
                    + CryptoConfig::IV_SELECT::UPDATED
                    + CryptoConfig::CORE_SEL::DECRYPT
            }
            (_, true) => common + CryptoConfig::XOR_POS::BYPASS + CryptoConfig::CORE_SEL::ENCRYPT,
            (_, false) => common + CryptoConfig::XOR_POS::BYPASS + CryptoConfig::CORE_SEL::DECRYPT,
        }
    }
}

impl<P: SePlatform> SeHw<'_, P> {
    /// Encrypt or decrypt `nbytes` from `in_ll` to memory behind `out_ll`
    fn aes_process_chunk(
        &self,
        params: &AesParams,
        in_ll: u32,
        out_ll: u32,
        nbytes: usize,
    ) -> SeResult<()> {
        self.write_fields(se::CONFIG, params.config() + Config::DST::MEMORY);
        self.write_fields(se::CRYPTO_CONFIG, params.crypto_config());
        self.start_operation(Submission::start().input(in_ll).output(out_ll).bytes(nbytes))
    }

    /// Run a CBC-MAC pass over `nbytes`, leaving the last block in the hash registers
    pub(crate) fn cmac_process_chunk(
        &self,
        params: &AesParams,
        in_ll: u32,
        nbytes: usize,
    ) -> SeResult<()> {
        self.write_fields(se::CONFIG, params.config() + Config::DST::HASH_REG);
        self.write_fields(
            se::CRYPTO_CONFIG,
            params.crypto_config() + CryptoConfig::HASH_ENB::SET,
        );
        self.start_operation(Submission::start().input(in_ll).bytes(nbytes))
    }

    /// Run `src` through the engine in buffer sized chunks
    pub(crate) fn aes_process(
        &self,
        params: &AesParams,
        src: &[u8],
        dst: &mut [u8],
    ) -> SeResult<()> {
        let input = self.pool.input(BufferId::A);
        let output = self.pool.output(BufferId::A);
        let chunk_size = self.pool.buffer_size;
        for (src, dst) in src.chunks(chunk_size).zip(dst.chunks_mut(chunk_size)) {
            self.load(input, src);
            output.program(&**self.platform, 0, src.len());
            self.platform.flush_write_combine();
            self.aes_process_chunk(params, input.ll_addr(), output.ll_addr(), src.len())?;
            self.unload(output, &mut dst[..src.len()]);
        }
        Ok(())
    }
}

impl<P: SePlatform> Locked<'_, P> {
    pub(crate) fn aes_select_key(
        &mut self,
        session: &mut AesSession,
        info: &AesKeyInfo,
    ) -> SeResult<()> {
        let key_size = AesKeySize::from_len(info.key_length)?;

        let slot = match (info.key_type, key_size) {
            (AesKeyType::SecureBootKey, AesKeySize::Aes128) => SBK_SLOT,
            (AesKeyType::SecureStorageKey, AesKeySize::Aes128) => SSK_SLOT,
            (AesKeyType::UserSpecified, _) => {
                if info.key.len() < key_size.bytes() {
                    Err(SeError::AES_INVALID_KEY_LENGTH)?;
                }
                // Reselecting drops the slot held by the previous user key
                if let Some(slot) = session.user_slot() {
                    self.key_slots.release(slot);
                }
                let slot = self.key_slots.allocate()?;
                let key = &info.key[..key_size.bytes()];
                if let Err(err) = self.hw.set_key(slot, key) {
                    self.key_slots.release(slot);
                    return Err(err);
                }
                session.key.bytes[..key.len()].copy_from_slice(key);
                session.key.len = key.len();
                slot
            }
            _ => return Err(SeError::AES_UNSUPPORTED_KEY_TYPE),
        };

        if info.key_type != AesKeyType::UserSpecified {
            if let Some(old) = session.user_slot() {
                self.key_slots.release(old);
            }
            session.key.zeroize();
        }
        session.key_type = info.key_type;
        session.key_size = key_size;
        session.key_slot = Some(slot);
        Ok(())
    }

    pub(crate) fn aes_set_iv(&mut self, session: &mut AesSession, iv: &[u8]) -> SeResult<()> {
        let Some(slot) = session.key_slot else {
            return Err(SeError::AES_NO_KEY_SELECTED);
        };
        if iv.len() < AES_BLOCK_SIZE {
            Err(SeError::AES_IV_BUFFER_TOO_SMALL)?;
        }
        session.iv.copy_from_slice(&iv[..AES_BLOCK_SIZE]);
        self.hw.set_iv(slot, &session.iv)
    }

    pub(crate) fn aes_process_buffer(
        &mut self,
        session: &AesSession,
        src: &[u8],
        dst: &mut [u8],
    ) -> SeResult<()> {
        let Some(mode) = session.mode else {
            return Err(SeError::AES_NO_OPERATION_SELECTED);
        };
        let Some(slot) = session.key_slot else {
            return Err(SeError::AES_NO_KEY_SELECTED);
        };
        if src.len() % AES_BLOCK_SIZE != 0 {
            Err(SeError::AES_UNALIGNED_SIZE)?;
        }
        if dst.len() < src.len() {
            Err(SeError::AES_OUTPUT_BUFFER_TOO_SMALL)?;
        }
        let params = AesParams {
            mode,
            encrypt: session.encrypt,
            slot,
            key_size: session.key_size,
        };
        self.hw.aes_process(&params, src, dst)
    }

    /// Encrypt one block with CBC and a zero IV under `info`
    fn aes_encrypt_probe(
        &mut self,
        session: &mut AesSession,
        info: &AesKeyInfo,
        block: &[u8; AES_BLOCK_SIZE],
    ) -> SeResult<[u8; AES_BLOCK_SIZE]> {
        self.aes_select_key(session, info)?;
        session.select_operation(AesMode::Cbc, true)?;
        self.aes_set_iv(session, &[0; AES_BLOCK_SIZE])?;
        let mut out = [0u8; AES_BLOCK_SIZE];
        self.aes_process_buffer(session, block, &mut out)?;
        Ok(out)
    }

    fn aes_verify_ssk_lock(&mut self) -> SeResult<()> {
        let mut session = AesSession::new();
        let session = &mut session;
        let probe: [u8; AES_BLOCK_SIZE] = core::array::from_fn(|i| i as u8);
        let ssk_out = self.aes_encrypt_probe(session, &AesKeyInfo::secure_storage_key(), &probe)?;

        let zero_key = [0u8; 16];
        let zero_out = self.aes_encrypt_probe(session, &AesKeyInfo::user(&zero_key), &probe);
        if let Some(slot) = session.user_slot() {
            self.key_slots.release(slot);
            session.forget_key();
        }
        let zero_out = zero_out?;

        // Try to overwrite the slot with a key different from its current one
        let trial_key = if ssk_out == zero_out {
            [0xffu8; 16]
        } else {
            [0u8; 16]
        };
        self.aes_select_key(session, &AesKeyInfo::secure_storage_key())?;
        self.aes_set_iv(session, &[0; AES_BLOCK_SIZE])?;
        self.hw.set_key(SSK_SLOT, &trial_key)?;
        let mut after = [0u8; AES_BLOCK_SIZE];
        self.aes_process_buffer(session, &probe, &mut after)?;

        if after != ssk_out {
            log::error!("Secure storage key slot accepted a key update after locking");
            Err(SeError::AES_SSK_LOCK_VERIFY_FAILED)?;
        }
        Ok(())
    }
}

impl<P: SePlatform> SeEngine<P> {
    /// Load a key for `session`, allocating a slot for user keys
    pub fn aes_select_key(&self, session: &mut AesSession, info: &AesKeyInfo) -> SeResult<()> {
        self.with_engine(|eng| eng.aes_select_key(session, info))
    }

    /// Release the slot of a user key held by `session`
    pub fn aes_release_key_slot(&self, session: &mut AesSession) -> SeResult<()> {
        if let Some(slot) = session.user_slot() {
            self.release_key_slot(slot)?;
        }
        session.forget_key();
        Ok(())
    }

    /// Load the IV used by the next CBC operation on the session's slot
    pub fn aes_set_iv(&self, session: &mut AesSession, iv: &[u8]) -> SeResult<()> {
        self.with_engine(|eng| eng.aes_set_iv(session, iv))
    }

    /// Read the engine's updated IV for the session's slot into `iv`
    pub fn aes_get_iv(&self, session: &mut AesSession, iv: &mut [u8]) -> SeResult<()> {
        let Some(slot) = session.key_slot else {
            return Err(SeError::AES_NO_KEY_SELECTED);
        };
        if iv.len() < AES_BLOCK_SIZE {
            Err(SeError::AES_IV_BUFFER_TOO_SMALL)?;
        }
        let current = self.with_engine(|eng| eng.hw.get_iv(slot))?;
        session.iv = current;
        iv[..AES_BLOCK_SIZE].copy_from_slice(&current);
        Ok(())
    }

    /// Encrypt or decrypt `src` into `dst`; `src` must be whole blocks
    pub fn aes_process_buffer(
        &self,
        session: &AesSession,
        src: &[u8],
        dst: &mut [u8],
    ) -> SeResult<()> {
        self.with_engine(|eng| eng.aes_process_buffer(session, src, dst))
    }

    /// Overwrite the secure boot key with zeros and check the clear took
    pub fn aes_clear_secure_boot_key(&self) -> SeResult<()> {
        self.with_engine(|eng| {
            eng.hw.set_key(SBK_SLOT, &[0u8; 16])?;
            let mut session = AesSession::new();
            let out = eng.aes_encrypt_probe(
                &mut session,
                &AesKeyInfo::secure_boot_key(),
                &SBK_CLEAR_PLAINTEXT,
            )?;
            if out != SBK_CLEAR_CIPHERTEXT {
                log::error!("Secure boot key is not cleared");
                Err(SeError::AES_SBK_CLEAR_VERIFY_FAILED)?;
            }
            Ok(())
        })
    }

    /// Write-lock the secure storage key slot and check the lock holds
    pub fn aes_lock_secure_storage_key(&self) -> SeResult<()> {
        self.with_engine(|eng| {
            eng.hw.write_lock_key_slot(SSK_SLOT)?;
            eng.aes_verify_ssk_lock()
        })
    }

    /// Load `key` as the secure storage key, then lock it
    pub fn aes_set_and_lock_secure_storage_key(&self, key: &[u8; 16]) -> SeResult<()> {
        self.with_engine(|eng| {
            eng.hw.set_key(SSK_SLOT, key)?;
            eng.hw.write_lock_key_slot(SSK_SLOT)?;
            eng.aes_verify_ssk_lock()
        })
    }

    /// Block further updates of key slot `slot`
    pub fn aes_write_lock_key_slot(&self, slot: u32) -> SeResult<()> {
        self.write_lock_key_slot(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_size() {
        assert_eq!(AesKeySize::from_len(24), Ok(AesKeySize::Aes192));
        assert_eq!(
            AesKeySize::from_len(20),
            Err(SeError::AES_INVALID_KEY_LENGTH)
        );
        assert_eq!(AesKeySize::Aes256.bytes(), 32);
    }

    #[test]
    fn test_select_operation() {
        let mut session = AesSession::new();
        assert_eq!(session.mode(), None);
        session.select_operation(AesMode::Cbc, false).unwrap();
        assert_eq!(session.mode(), Some(AesMode::Cbc));
        assert!(!session.is_encrypt());
        assert_eq!(
            session.select_operation(AesMode::Ctr, true),
            Err(SeError::AES_UNSUPPORTED_MODE)
        );
        assert_eq!(session.mode(), Some(AesMode::Cbc));
    }

    #[test]
    fn test_initial_vector() {
        let session = AesSession::new();
        let mut short = [0u8; 8];
        assert_eq!(
            session.initial_vector(&mut short),
            Err(SeError::AES_IV_BUFFER_TOO_SMALL)
        );
        let mut iv = [0xffu8; 16];
        session.initial_vector(&mut iv).unwrap();
        assert_eq!(iv, [0; 16]);
    }

    #[test]
    fn test_cbc_register_settings() {
        let enc = AesParams::cbc_encrypt(3, AesKeySize::Aes256);
        let crypto = enc.crypto_config().value;
        assert_eq!(crypto >> 24, 3);
        let encrypt = CryptoConfig::CORE_SEL::ENCRYPT.value;
        assert_eq!(crypto & encrypt, encrypt);
        assert_eq!(enc.config().value >> 24, mode_pkt::AES_KEY256);

        let dec = AesParams {
            encrypt: false,
            ..enc
        };
        assert_eq!(dec.config().value >> 24, 0);
        assert_eq!((dec.config().value >> 16) & 0xff, mode_pkt::AES_KEY256);
    }
}
