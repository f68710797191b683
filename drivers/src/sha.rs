/*++

Licensed under the Apache-2.0 license.

File Name:

    sha.rs

Abstract:

    File contains API for SHA1 and SHA2 Cryptography operations

--*/

use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::{mode_pkt, se, Config, ShaConfig};

use crate::dma::BufferId;
use crate::engine::SeEngine;
use crate::hw::{SeHw, Submission};
use crate::platform::SePlatform;

/// Hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaMode {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl ShaMode {
    /// Digest size in bytes
    pub fn digest_size(&self) -> usize {
        match self {
            ShaMode::Sha1 => 20,
            ShaMode::Sha224 => 28,
            ShaMode::Sha256 => 32,
            ShaMode::Sha384 => 48,
            ShaMode::Sha512 => 64,
        }
    }

    /// Block size in bits
    pub fn block_size_bits(&self) -> usize {
        match self {
            ShaMode::Sha1 | ShaMode::Sha224 | ShaMode::Sha256 => 512,
            ShaMode::Sha384 | ShaMode::Sha512 => 1024,
        }
    }

    fn mode_pkt(&self) -> u32 {
        match self {
            ShaMode::Sha1 => mode_pkt::SHA1,
            ShaMode::Sha224 => mode_pkt::SHA224,
            ShaMode::Sha256 => mode_pkt::SHA256,
            ShaMode::Sha384 => mode_pkt::SHA384,
            ShaMode::Sha512 => mode_pkt::SHA512,
        }
    }

    /// Number of 32-bit result words holding the digest
    fn result_words(&self) -> usize {
        match self {
            ShaMode::Sha1 => 5,
            ShaMode::Sha224 | ShaMode::Sha256 => 8,
            ShaMode::Sha384 | ShaMode::Sha512 => 16,
        }
    }
}

/// Hash state of one client, carried across hardware submissions.
#[derive(Debug, Clone)]
pub struct ShaSession {
    mode: ShaMode,

    /// Total message length in bits
    msg_length: u64,

    /// Bits the engine has yet to see
    msg_left: u64,

    /// Intermediate hash as the engine left it
    hash: [u32; se::HASH_RESULT_WORDS],

    /// Let the engine load its initial hash on the next submission
    init_hw_hash: bool,
}

impl ShaSession {
    /// Start hashing a message of exactly `total_size` bytes
    pub fn new(mode: ShaMode, total_size: usize) -> SeResult<Self> {
        if total_size == 0 {
            Err(SeError::SHA_ZERO_MESSAGE_SIZE)?;
        }
        let bits = (total_size as u64) * 8;
        Ok(Self {
            mode,
            msg_length: bits,
            msg_left: bits,
            hash: [0; se::HASH_RESULT_WORDS],
            init_hw_hash: true,
        })
    }

    pub fn mode(&self) -> ShaMode {
        self.mode
    }

    /// Bytes not yet hashed
    pub fn remaining(&self) -> usize {
        (self.msg_left / 8) as usize
    }

    /// Convert the saved hash into the big-endian digest
    pub fn finalize(&self, digest: &mut [u8]) -> SeResult<()> {
        if digest.len() != self.mode.digest_size() {
            Err(SeError::SHA_INVALID_DIGEST_SIZE)?;
        }
        let mut words = self.hash;
        if matches!(self.mode, ShaMode::Sha384 | ShaMode::Sha512) {
            // 64-bit state is held low word first
            for pair in words.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
        }
        let words = &words[..self.mode.result_words()];
        for (out, word) in digest.chunks_mut(4).zip(words) {
            out.copy_from_slice(&word.to_be_bytes()[..out.len()]);
        }
        Ok(())
    }
}

impl<P: SePlatform> SeHw<'_, P> {
    /// Submit one chunk already sitting in the buffer behind `ll_addr`
    fn sha_process(&self, session: &mut ShaSession, ll_addr: u32) -> SeResult<()> {
        self.write_fields(
            se::CONFIG,
            Config::ENC_MODE.val(session.mode.mode_pkt())
                + Config::ENC_ALG::SHA
                + Config::DEC_ALG::NOP
                + Config::DST::HASH_REG,
        );
        self.write(se::IN_LL_ADDR, ll_addr);

        let init = if session.init_hw_hash {
            ShaConfig::HW_INIT_HASH::SET
        } else {
            ShaConfig::HW_INIT_HASH::CLEAR
        };
        self.write_fields(se::SHA_CONFIG, init);

        for i in 0..se::SHA_MSG_WORDS as u32 {
            self.write(se::SHA_MSG_LENGTH + 4 * i, 0);
            self.write(se::SHA_MSG_LEFT + 4 * i, 0);
        }
        self.write(se::SHA_MSG_LENGTH, session.msg_length as u32);
        self.write(se::SHA_MSG_LENGTH + 4, (session.msg_length >> 32) as u32);
        self.write(se::SHA_MSG_LEFT, session.msg_left as u32);
        self.write(se::SHA_MSG_LEFT + 4, (session.msg_left >> 32) as u32);

        if !session.init_hw_hash {
            for (i, word) in session.hash.iter().enumerate() {
                self.write(se::HASH_RESULT + 4 * i as u32, *word);
            }
        }

        let result = self.start_operation(Submission::start().input(ll_addr));
        session.init_hw_hash = false;
        result
    }

    /// Capture the engine's intermediate state into `session`
    fn sha_backup(&self, session: &mut ShaSession) {
        let low = self.read(se::SHA_MSG_LEFT) as u64;
        let high = self.read(se::SHA_MSG_LEFT + 4) as u64;
        session.msg_left = high << 32 | low;
        for (i, word) in session.hash.iter_mut().enumerate() {
            *word = self.read(se::HASH_RESULT + 4 * i as u32);
        }
    }
}

impl<P: SePlatform> SeEngine<P> {
    /// Feed the next part of the message to the engine.
    ///
    /// Chunks are staged in alternating buffers so the next chunk is copied
    /// while the previous one is being hashed. Every chunk except the one
    /// completing the message must be a whole number of blocks.
    pub fn sha_update(&self, session: &mut ShaSession, data: &[u8]) -> SeResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() as u64 * 8 > session.msg_left {
            Err(SeError::SHA_MESSAGE_OVERFLOW)?;
        }

        self.with_engine(|eng| {
            let hw = &eng.hw;
            let timeout = hw.config.semaphore_timeout;
            let block_bits = session.mode.block_size_bits();
            let mut result = Ok(());
            let mut first = true;

            *eng.buffer_in_use = BufferId::A;
            for chunk in data.chunks(hw.pool.buffer_size) {
                let buffer = eng.buffer_in_use.other();
                let slot = hw.pool.input(buffer);
                hw.load(slot, chunk);
                hw.platform.flush_write_combine();

                if !hw.isr.done.wait_timeout(timeout) {
                    log::error!("SHA buffer semaphore timed out");
                    result = Err(SeError::HW_SEMAPHORE_TIMEOUT);
                    break;
                }
                if first {
                    first = false;
                } else {
                    hw.sha_backup(session);
                }
                if hw.platform.interrupt_enable().is_err() {
                    result = Err(SeError::ENGINE_INTERRUPT_ENABLE_FAILED);
                    break;
                }
                if hw.isr.error() {
                    result = Err(SeError::SHA_ENGINE_ERROR);
                    break;
                }
                if (chunk.len() * 8) % block_bits != 0 && session.remaining() != chunk.len() {
                    result = Err(SeError::SHA_UNALIGNED_CHUNK);
                    break;
                }

                *eng.buffer_in_use = buffer;
                if let Err(err) = hw.sha_process(session, slot.ll_addr()) {
                    result = Err(err);
                    break;
                }
            }

            // Pick up the state of the last submission, even after a failure
            if !hw.isr.done.wait_timeout(timeout) && result.is_ok() {
                result = Err(SeError::HW_SEMAPHORE_TIMEOUT);
            }
            hw.sha_backup(session);
            hw.isr.done.signal();
            result
        })
    }

    /// Write the digest of a completely hashed message into `digest`
    pub fn sha_final(&self, session: &ShaSession, digest: &mut [u8]) -> SeResult<()> {
        session.finalize(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_message() {
        assert_eq!(
            ShaSession::new(ShaMode::Sha256, 0).err(),
            Some(SeError::SHA_ZERO_MESSAGE_SIZE)
        );
    }

    #[test]
    fn test_session_init() {
        let session = ShaSession::new(ShaMode::Sha512, 300).unwrap();
        assert_eq!(session.msg_length, 2400);
        assert_eq!(session.remaining(), 300);
        assert!(session.init_hw_hash);
    }

    #[test]
    fn test_finalize_sha256() {
        let mut session = ShaSession::new(ShaMode::Sha256, 3).unwrap();
        session.hash[..8].copy_from_slice(&[
            0xba7816bf, 0x8f01cfea, 0x414140de, 0x5dae2223, 0xb00361a3, 0x96177a9c, 0xb410ff61,
            0xf20015ad,
        ]);
        let mut digest = [0u8; 32];
        session.finalize(&mut digest).unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_finalize_swaps_sha512_words() {
        let mut session = ShaSession::new(ShaMode::Sha384, 1).unwrap();
        session.hash[0] = 0x5566_7788;
        session.hash[1] = 0x1122_3344;
        let mut digest = [0u8; 48];
        session.finalize(&mut digest).unwrap();
        assert_eq!(digest[..8], [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
    }

    #[test]
    fn test_finalize_wrong_size() {
        let session = ShaSession::new(ShaMode::Sha1, 3).unwrap();
        let mut digest = [0u8; 32];
        assert_eq!(
            session.finalize(&mut digest),
            Err(SeError::SHA_INVALID_DIGEST_SIZE)
        );
    }
}
