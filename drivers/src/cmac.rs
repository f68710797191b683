/*++

Licensed under the Apache-2.0 license.

File Name:

    cmac.rs

Abstract:

    File contains API for AES-CMAC computation over one or more chunks.

--*/

use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::se;

use crate::aes::{AesKeySize, AesMode, AesParams, AesSession, AES_BLOCK_SIZE};
use crate::dma::BufferId;
use crate::engine::SeEngine;
use crate::key_slot::SBK_SLOT;
use crate::platform::SePlatform;

pub const CMAC_TAG_SIZE: usize = 16;

const CMAC_RB: u8 = 0x87;

/// One chunk of a CMAC computation.
#[derive(Debug, Clone, Copy)]
pub struct CmacInput<'a> {
    pub data: &'a [u8],

    /// Start a new computation
    pub first_chunk: bool,

    /// Finish the computation and produce the tag
    pub last_chunk: bool,

    /// Use the secure boot key instead of the session's key
    pub use_sbk: bool,
}

fn left_shift_one(block: &[u8; AES_BLOCK_SIZE]) -> ([u8; AES_BLOCK_SIZE], bool) {
    let mut out = [0u8; AES_BLOCK_SIZE];
    let mut carry = 0u8;
    for i in (0..AES_BLOCK_SIZE).rev() {
        out[i] = (block[i] << 1) | carry;
        carry = block[i] >> 7;
    }
    (out, carry != 0)
}

fn double(block: &[u8; AES_BLOCK_SIZE]) -> [u8; AES_BLOCK_SIZE] {
    let (mut out, msb) = left_shift_one(block);
    if msb {
        out[AES_BLOCK_SIZE - 1] ^= CMAC_RB;
    }
    out
}

/// Derive the CMAC subkeys K1 and K2 from `l`, the cipher of a zero block
pub fn derive_subkeys(l: &[u8; AES_BLOCK_SIZE]) -> ([u8; AES_BLOCK_SIZE], [u8; AES_BLOCK_SIZE]) {
    let k1 = double(l);
    let k2 = double(&k1);
    (k1, k2)
}

impl<P: SePlatform> SeEngine<P> {
    /// Feed one chunk to a CMAC computation.
    ///
    /// Every chunk but the last must be a whole number of blocks. The tag is
    /// written to `output` when `input.last_chunk` is set.
    pub fn aes_compute_cmac(
        &self,
        session: &mut AesSession,
        input: &CmacInput,
        output: Option<&mut [u8]>,
    ) -> SeResult<()> {
        if !input.last_chunk && input.data.len() % AES_BLOCK_SIZE != 0 {
            Err(SeError::CMAC_UNALIGNED_CHUNK)?;
        }
        let output = match (input.last_chunk, output) {
            (false, _) => None,
            (true, None) => Err(SeError::CMAC_MISSING_OUTPUT)?,
            (true, Some(out)) if out.len() < CMAC_TAG_SIZE => {
                Err(SeError::CMAC_OUTPUT_TOO_SMALL)?
            }
            (true, Some(out)) => Some(out),
        };

        self.with_engine(|eng| {
            let params = if input.use_sbk {
                AesParams::cbc_encrypt(SBK_SLOT, AesKeySize::Aes128)
            } else {
                let Some(slot) = session.key_slot() else {
                    return Err(SeError::AES_NO_KEY_SELECTED);
                };
                AesParams::cbc_encrypt(slot, session.key_size())
            };
            let hw = &eng.hw;

            if input.first_chunk {
                session.select_operation(AesMode::Cbc, true)?;
                session.cmac_iv = [0; AES_BLOCK_SIZE];
                hw.set_iv(params.slot, &session.cmac_iv)?;
                let mut l = [0u8; AES_BLOCK_SIZE];
                hw.aes_process(&params, &[0; AES_BLOCK_SIZE], &mut l)?;
                session.cmac_l = l;
            }

            let data = input.data;
            let mut nblocks = data.len() / AES_BLOCK_SIZE;
            let mut last_block = [0u8; AES_BLOCK_SIZE];
            let mut pad = false;
            if input.last_chunk {
                if nblocks == 0 || data.len() % AES_BLOCK_SIZE != 0 {
                    let tail = &data[nblocks * AES_BLOCK_SIZE..];
                    last_block[..tail.len()].copy_from_slice(tail);
                    last_block[tail.len()] = 0x80;
                    pad = true;
                } else {
                    nblocks -= 1;
                    last_block.copy_from_slice(&data[nblocks * AES_BLOCK_SIZE..]);
                }
            }

            let slot = hw.pool.input(BufferId::A);
            for chunk in data[..nblocks * AES_BLOCK_SIZE].chunks(hw.pool.buffer_size) {
                hw.load(slot, chunk);
                hw.platform.flush_write_combine();
                hw.set_iv(params.slot, &session.cmac_iv)?;
                hw.cmac_process_chunk(&params, slot.ll_addr(), chunk.len())?;
                session.cmac_iv = hw.get_iv(params.slot)?;
            }

            let Some(output) = output else {
                return Ok(());
            };

            let (k1, k2) = derive_subkeys(&session.cmac_l);
            let subkey = if pad { k2 } else { k1 };
            for (byte, k) in last_block.iter_mut().zip(subkey) {
                *byte ^= k;
            }
            hw.load(slot, &last_block);
            hw.platform.flush_write_combine();
            hw.set_iv(params.slot, &session.cmac_iv)?;
            hw.cmac_process_chunk(&params, slot.ll_addr(), AES_BLOCK_SIZE)?;
            session.cmac_iv = hw.get_iv(params.slot)?;

            for (i, bytes) in output[..CMAC_TAG_SIZE].chunks_exact_mut(4).enumerate() {
                let word = hw.read(se::HASH_RESULT + 4 * i as u32);
                bytes.copy_from_slice(&word.to_le_bytes());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> [u8; AES_BLOCK_SIZE] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_derive_subkeys() {
        let l = block("7df76b0c1ab899b33e42f047b91b546f");
        let (k1, k2) = derive_subkeys(&l);
        assert_eq!(k1, block("fbeed618357133667c85e08f7236a8de"));
        assert_eq!(k2, block("f7ddac306ae266ccf90bc11ee46d513b"));
    }

    #[test]
    fn test_double_with_carry() {
        let mut l = [0u8; AES_BLOCK_SIZE];
        l[0] = 0x80;
        let (k1, _) = derive_subkeys(&l);
        let mut expected = [0u8; AES_BLOCK_SIZE];
        expected[15] = CMAC_RB;
        assert_eq!(k1, expected);
    }
}
