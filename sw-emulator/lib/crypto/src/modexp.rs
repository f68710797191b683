/*++

Licensed under the Apache-2.0 license.

File Name:

    modexp.rs

Abstract:

    File contains modular exponentiation for the emulated PKC block.

--*/

use crypto_bigint::modular::runtime_mod::{DynResidue, DynResidueParams};
use crypto_bigint::{Encoding, U2048};

/// Largest operand in bytes
pub const MODEXP_MAX_BYTES: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModExpError {
    /// An operand is longer than the engine supports
    OperandTooLarge,

    /// Montgomery form needs an odd modulus
    EvenModulus,

    /// Base is not reduced
    BaseOutOfRange,
}

fn to_uint(bytes: &[u8]) -> Result<U2048, ModExpError> {
    if bytes.len() > MODEXP_MAX_BYTES {
        return Err(ModExpError::OperandTooLarge);
    }
    let mut padded = [0u8; MODEXP_MAX_BYTES];
    padded[MODEXP_MAX_BYTES - bytes.len()..].copy_from_slice(bytes);
    Ok(U2048::from_be_slice(&padded))
}

/// Compute `base ^ exp mod modulus` on big-endian operands.
///
/// The result is written big-endian into `out`, right aligned.
pub fn mod_exp(
    base: &[u8],
    exp: &[u8],
    modulus: &[u8],
    out: &mut [u8],
) -> Result<(), ModExpError> {
    let odd = modulus.last().map_or(false, |byte| byte & 1 == 1);
    let base = to_uint(base)?;
    let exp = to_uint(exp)?;
    let modulus = to_uint(modulus)?;
    if !odd {
        return Err(ModExpError::EvenModulus);
    }
    if base >= modulus {
        return Err(ModExpError::BaseOutOfRange);
    }

    let params = DynResidueParams::new(&modulus);
    let result = DynResidue::new(&base, params).pow(&exp).retrieve();
    let bytes = result.to_be_bytes();
    let len = out.len().min(MODEXP_MAX_BYTES);
    let out_len = out.len();
    out[..out_len - len].fill(0);
    out[out_len - len..].copy_from_slice(&bytes[MODEXP_MAX_BYTES - len..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values() {
        let mut out = [0u8; 4];
        mod_exp(&[4], &[13], &[0x01, 0xf1], &mut out).unwrap();
        // 4^13 mod 497 = 445
        assert_eq!(out, [0, 0, 0x01, 0xbd]);
    }

    #[test]
    fn test_512_bit_modulus() {
        let modulus = [0xffu8; 64];
        let mut base = [0u8; 64];
        base[63] = 2;
        let mut out = [0u8; 64];
        // 2^515 = 2^3 * 2^512 and 2^512 = 1 mod 2^512 - 1
        mod_exp(&base, &[0x02, 0x03], &modulus, &mut out).unwrap();
        let mut expected = [0u8; 64];
        expected[63] = 8;
        assert_eq!(out, expected);
    }

    #[test]
    fn test_invalid_operands() {
        let mut out = [0u8; 8];
        assert_eq!(
            mod_exp(&[2], &[3], &[0x10], &mut out),
            Err(ModExpError::EvenModulus)
        );
        assert_eq!(
            mod_exp(&[0x20], &[3], &[0x11], &mut out),
            Err(ModExpError::BaseOutOfRange)
        );
        assert_eq!(
            mod_exp(&[2], &[3], &[1u8; 257], &mut out),
            Err(ModExpError::OperandTooLarge)
        );
    }
}
