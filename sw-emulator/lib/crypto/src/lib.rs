/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the Security Engine emulator crypto library.

--*/

mod aes;
mod helpers;
mod modexp;
mod sha;

pub use crate::aes::{cbc_decrypt, cbc_encrypt, AesCipher, AES_BLOCK_SIZE};
pub use crate::helpers::{pairs_to_u64, u64_to_pairs};
pub use crate::modexp::{mod_exp, ModExpError, MODEXP_MAX_BYTES};
pub use crate::sha::{Sha, ShaAlgo, SHA_STATE_WORDS};
