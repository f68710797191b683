/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains the AES block cipher used by the emulated engine, plus
    CBC helpers for checking engine output.

--*/

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

pub const AES_BLOCK_SIZE: usize = 16;

/// AES-128, AES-192 or AES-256 selected by key length
#[derive(Clone)]
pub enum AesCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCipher {
    /// Returns `None` unless `key` is 16, 24 or 32 bytes long
    pub fn new(key: &[u8]) -> Option<Self> {
        match key.len() {
            16 => Aes128::new_from_slice(key).ok().map(AesCipher::Aes128),
            24 => Aes192::new_from_slice(key).ok().map(AesCipher::Aes192),
            32 => Aes256::new_from_slice(key).ok().map(AesCipher::Aes256),
            _ => None,
        }
    }

    pub fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCipher::Aes128(cipher) => cipher.encrypt_block(block),
            AesCipher::Aes192(cipher) => cipher.encrypt_block(block),
            AesCipher::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }

    pub fn decrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCipher::Aes128(cipher) => cipher.decrypt_block(block),
            AesCipher::Aes192(cipher) => cipher.decrypt_block(block),
            AesCipher::Aes256(cipher) => cipher.decrypt_block(block),
        }
    }
}

macro_rules! cbc_apply {
    ($mode:ident, $method:ident, $key:expr, $iv:expr, $data:expr) => {{
        let iv = GenericArray::from_slice($iv);
        match $key.len() {
            16 => {
                let mut cipher = cbc::$mode::<Aes128>::new(GenericArray::from_slice($key), iv);
                $data
                    .chunks_exact_mut(AES_BLOCK_SIZE)
                    .for_each(|b| cipher.$method(GenericArray::from_mut_slice(b)));
            }
            24 => {
                let mut cipher = cbc::$mode::<Aes192>::new(GenericArray::from_slice($key), iv);
                $data
                    .chunks_exact_mut(AES_BLOCK_SIZE)
                    .for_each(|b| cipher.$method(GenericArray::from_mut_slice(b)));
            }
            32 => {
                let mut cipher = cbc::$mode::<Aes256>::new(GenericArray::from_slice($key), iv);
                $data
                    .chunks_exact_mut(AES_BLOCK_SIZE)
                    .for_each(|b| cipher.$method(GenericArray::from_mut_slice(b)));
            }
            len => panic!("invalid AES key length {len}"),
        }
    }};
}

/// CBC encrypt whole blocks of `data` in place
///
/// # Panics
///
/// Panics if `key` is not 16, 24 or 32 bytes long
pub fn cbc_encrypt(key: &[u8], iv: &[u8; AES_BLOCK_SIZE], data: &mut [u8]) {
    cbc_apply!(Encryptor, encrypt_block_mut, key, iv, data)
}

/// CBC decrypt whole blocks of `data` in place
///
/// # Panics
///
/// Panics if `key` is not 16, 24 or 32 bytes long
pub fn cbc_decrypt(key: &[u8], iv: &[u8; AES_BLOCK_SIZE], data: &mut [u8]) {
    cbc_apply!(Decryptor, decrypt_block_mut, key, iv, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex<const N: usize>(s: &str) -> [u8; N] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_fips197_vectors() {
        let plaintext: [u8; 16] = unhex("00112233445566778899aabbccddeeff");
        let key: [u8; 32] =
            unhex("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
        let cases = [
            (16, "69c4e0d86a7b0430d8cdb78070b4c55a"),
            (24, "dda97ca4864cdfe06eaf70a0ec0d7191"),
            (32, "8ea2b7ca516745bfeafc49904b496089"),
        ];
        for (len, expected) in cases {
            let cipher = AesCipher::new(&key[..len]).unwrap();
            let mut block = plaintext;
            cipher.encrypt_block(&mut block);
            assert_eq!(hex::encode(block), expected);
            cipher.decrypt_block(&mut block);
            assert_eq!(block, plaintext);
        }
    }

    #[test]
    fn test_bad_key_length() {
        assert!(AesCipher::new(&[0; 20]).is_none());
    }

    #[test]
    fn test_cbc_sp800_38a() {
        let key: [u8; 16] = unhex("2b7e151628aed2a6abf7158809cf4f3c");
        let iv: [u8; 16] = unhex("000102030405060708090a0b0c0d0e0f");
        let mut data: [u8; 32] = unhex(
            "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51",
        );
        cbc_encrypt(&key, &iv, &mut data);
        assert_eq!(
            hex::encode(data),
            "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2"
        );
        cbc_decrypt(&key, &iv, &mut data);
        assert_eq!(
            hex::encode(data),
            "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51"
        );
    }
}
