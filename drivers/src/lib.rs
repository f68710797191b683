/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the Security Engine driver library.

--*/

mod aes;
mod chip;
mod client;
mod cmac;
mod config;
mod context_save;
mod dma;
mod engine;
mod hw;
mod key_slot;
mod platform;
mod rng;
mod rsa;
mod sha;
mod sync;
mod wait;

pub use aes::{AesKeyInfo, AesKeySize, AesKeyType, AesMode, AesSession, AES_BLOCK_SIZE};
pub use chip::{ChipFamily, SeCapabilities};
pub use client::{SeAlgorithm, SeClient, SeSession};
pub use cmac::{derive_subkeys, CmacInput, CMAC_TAG_SIZE};
pub use config::SeConfig;
pub use context_save::{ContextLayout, KNOWN_PATTERN};
pub use dma::{BufferId, LlDescriptor};
pub use engine::SeEngine;
pub use key_slot::{KeySlotTable, NUM_KEY_SLOTS, SBK_SLOT, SRK_SLOT, SSK_SLOT};
pub use platform::{DmaRegion, IsrHandler, SeMmio, SePlatform};
pub use rng::{RngDestination, RngInitMode, RngKeySize, RngSession, RngSource};
pub use rsa::{RsaKeyInfo, RsaOutput, RsaSession, RSA_MAX_MODULUS_BITS, RSA_MIN_MODULUS_BITS};
pub use sha::{ShaMode, ShaSession};
pub use tegra_se_error::{SeError, SeErrorKind, SeResult};
pub use wait::Deadline;
