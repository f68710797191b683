/*++

Licensed under the Apache-2.0 license.

File Name:

    rsa.rs

Abstract:

    File contains API for RSA modular exponentiation on the PKC block.

--*/

use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::{se, Config, RsaConfig, RsaKeyTableAddr};
use zeroize::Zeroizing;

use crate::chip::SeCapabilities;
use crate::dma::BufferId;
use crate::engine::SeEngine;
use crate::hw::{SeHw, Submission};
use crate::platform::SePlatform;

pub const RSA_MIN_MODULUS_BITS: usize = 512;
pub const RSA_MAX_MODULUS_BITS: usize = 2048;

const RSA_KEY_SLOTS: u32 = 2;
const RSA_MODULUS_GRANULE_BITS: usize = 64;

/// Where the result of an exponentiation lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaOutput {
    /// Output buffer through DMA
    Memory,

    /// RSA output registers
    Registers,
}

/// Key and destination of an exponentiation.
///
/// Numbers are big-endian byte strings.
#[derive(Debug, Clone, Copy)]
pub struct RsaKeyInfo<'a> {
    pub key_slot: u32,
    pub modulus: &'a [u8],
    pub exponent: &'a [u8],
    pub output: RsaOutput,
}

/// Validated parameters of the last exponentiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsaSession {
    pub key_slot: u32,
    pub modulus_bits: usize,
    pub exponent_bits: usize,
    pub output: RsaOutput,
}

impl RsaSession {
    pub fn from_key(key: &RsaKeyInfo) -> SeResult<Self> {
        let modulus_bits = key.modulus.len() * 8;
        if !(RSA_MIN_MODULUS_BITS..=RSA_MAX_MODULUS_BITS).contains(&modulus_bits)
            || modulus_bits % RSA_MODULUS_GRANULE_BITS != 0
        {
            Err(SeError::RSA_INVALID_MODULUS_SIZE)?;
        }
        if key.exponent.is_empty() || key.exponent.len() > key.modulus.len() {
            Err(SeError::RSA_INVALID_EXPONENT_SIZE)?;
        }
        if key.key_slot >= RSA_KEY_SLOTS {
            Err(SeError::RSA_INVALID_KEY_SLOT)?;
        }
        Ok(Self {
            key_slot: key.key_slot,
            modulus_bits,
            exponent_bits: key.exponent.len() * 8,
            output: key.output,
        })
    }

    fn modulus_words(&self) -> usize {
        self.modulus_bits / 32
    }

    fn exponent_words(&self) -> usize {
        (self.exponent_bits / 8 + 3) / 4
    }
}

/// Big-endian bytes to little-endian-ordered words, least significant first
fn be_bytes_to_words(bytes: &[u8], words: &mut [u32]) -> usize {
    let mut count = 0;
    for (word, chunk) in words.iter_mut().zip(bytes.rchunks(4)) {
        let mut buf = [0u8; 4];
        buf[4 - chunk.len()..].copy_from_slice(chunk);
        *word = u32::from_be_bytes(buf);
        count += 1;
    }
    count
}

impl<P: SePlatform> SeHw<'_, P> {
    fn rsa_write_key(&self, session: &RsaSession, key: &RsaKeyInfo) {
        let mut words = Zeroizing::new([0u32; se::RSA_OUTPUT_WORDS]);
        for (sel, number) in [
            (RsaKeyTableAddr::EXPMOD_SEL::EXPONENT, key.exponent),
            (RsaKeyTableAddr::EXPMOD_SEL::MODULUS, key.modulus),
        ] {
            words.fill(0);
            let nwords = be_bytes_to_words(number, &mut *words);
            for (i, word) in words[..nwords].iter().enumerate() {
                self.write_fields(
                    se::RSA_KEYTABLE_ADDR,
                    RsaKeyTableAddr::OP::WRITE
                        + RsaKeyTableAddr::INPUT_MODE::REGISTER
                        + RsaKeyTableAddr::KEY_SLOT.val(session.key_slot)
                        + sel
                        + RsaKeyTableAddr::WORD_ADDR.val(i as u32),
                );
                self.write(se::RSA_KEYTABLE_DATA, *word);
            }
        }
    }

    fn rsa_mod_exp(
        &self,
        session: &RsaSession,
        key: &RsaKeyInfo,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<()> {
        let nbytes = key.modulus.len();
        self.rsa_write_key(session, key);
        self.write(
            se::RSA_KEY_SIZE,
            (session.modulus_bits / RSA_MODULUS_GRANULE_BITS - 1) as u32,
        );
        self.write(se::RSA_EXP_SIZE, session.exponent_words() as u32);
        self.write_fields(se::RSA_CONFIG, RsaConfig::KEY_SLOT.val(session.key_slot));

        let dst = match session.output {
            RsaOutput::Memory => Config::DST::MEMORY,
            RsaOutput::Registers => Config::DST::RSA_REG,
        };
        self.write_fields(
            se::CONFIG,
            Config::ENC_ALG::RSA + Config::DEC_ALG::NOP + dst,
        );

        // The engine consumes numbers least significant byte first
        let mut reversed = Zeroizing::new(input.to_vec());
        reversed.reverse();
        let in_slot = self.pool.input(BufferId::B);
        let out_slot = self.pool.output(BufferId::B);
        self.load(in_slot, &reversed);
        out_slot.program(&**self.platform, 0, nbytes);
        self.platform.flush_write_combine();
        self.start_operation(
            Submission::start()
                .input(in_slot.ll_addr())
                .output(out_slot.ll_addr()),
        )?;

        match session.output {
            RsaOutput::Memory => {
                self.unload(out_slot, &mut output[..nbytes]);
                output[..nbytes].reverse();
            }
            RsaOutput::Registers => {
                let nwords = session.modulus_words();
                for (i, bytes) in output[..nbytes].rchunks_exact_mut(4).enumerate().take(nwords) {
                    let word = self.read(se::RSA_OUTPUT + 4 * i as u32);
                    bytes.copy_from_slice(&word.to_be_bytes());
                }
            }
        }
        Ok(())
    }
}

impl<P: SePlatform> SeEngine<P> {
    /// Compute `input ^ exponent mod modulus` into `output`.
    ///
    /// `input` must be exactly as long as the modulus.
    pub fn rsa_mod_exp(
        &self,
        key: &RsaKeyInfo,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<RsaSession> {
        if !self.capabilities().contains(SeCapabilities::PKC) {
            Err(SeError::RSA_PKC_NOT_SUPPORTED)?;
        }
        let session = RsaSession::from_key(key)?;
        if input.len() != key.modulus.len() {
            Err(SeError::RSA_INVALID_INPUT_SIZE)?;
        }
        if output.len() < key.modulus.len() {
            Err(SeError::RSA_OUTPUT_TOO_SMALL)?;
        }
        self.with_engine(|eng| eng.hw.rsa_mod_exp(&session, key, input, output))?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(modulus: &'a [u8], exponent: &'a [u8], key_slot: u32) -> RsaKeyInfo<'a> {
        RsaKeyInfo {
            key_slot,
            modulus,
            exponent,
            output: RsaOutput::Memory,
        }
    }

    #[test]
    fn test_modulus_size() {
        let exp = [0x01, 0x00, 0x01];
        assert_eq!(
            RsaSession::from_key(&key(&[0xff; 56], &exp, 0)),
            Err(SeError::RSA_INVALID_MODULUS_SIZE)
        );
        assert_eq!(
            RsaSession::from_key(&key(&[0xff; 260], &exp, 0)),
            Err(SeError::RSA_INVALID_MODULUS_SIZE)
        );
        assert_eq!(
            RsaSession::from_key(&key(&[0xff; 68], &exp, 0)),
            Err(SeError::RSA_INVALID_MODULUS_SIZE)
        );
        let session = RsaSession::from_key(&key(&[0xff; 72], &exp, 1)).unwrap();
        assert_eq!(session.modulus_bits, 576);
        assert_eq!(session.exponent_words(), 1);
    }

    #[test]
    fn test_key_slot_and_exponent() {
        let modulus = [0xff; 64];
        assert_eq!(
            RsaSession::from_key(&key(&modulus, &[3], 2)),
            Err(SeError::RSA_INVALID_KEY_SLOT)
        );
        assert_eq!(
            RsaSession::from_key(&key(&modulus, &[], 0)),
            Err(SeError::RSA_INVALID_EXPONENT_SIZE)
        );
    }

    #[test]
    fn test_be_bytes_to_words() {
        let mut words = [0u32; 4];
        assert_eq!(be_bytes_to_words(&[0x01, 0x02, 0x03, 0x04, 0x05], &mut words), 2);
        assert_eq!(words[..2], [0x0203_0405, 0x0000_0001]);
    }
}
