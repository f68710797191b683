/*++

Licensed under the Apache-2.0 license.

File Name:

    chip.rs

Abstract:

    File contains the chip families the driver supports and what each one
    is capable of.

--*/

use bitflags::bitflags;
use tegra_se_error::{SeError, SeResult};

bitflags! {
    /// Optional engine features
    pub struct SeCapabilities: u32 {
        /// SP 800-90 DRBG with entropy source and reseed control
        const RNG_SP800_90 = 1 << 0;

        /// Public key (RSA) accelerator
        const PKC = 1 << 1;
    }
}

/// Chip family hosting the engine.
///
/// The family decides the capability set and the layout of the suspend
/// context buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipFamily {
    /// SE 1.0
    T30,

    /// SE 2.x
    T114,
}

impl ChipFamily {
    /// Map an engine version to its chip family
    pub fn from_version(major: u32, minor: u32) -> SeResult<Self> {
        match (major, minor) {
            (1, 0) => Ok(ChipFamily::T30),
            (2, _) => Ok(ChipFamily::T114),
            _ => {
                log::warn!("Unsupported Security Engine version {major}.{minor}");
                Err(SeError::ENGINE_UNSUPPORTED_VERSION)
            }
        }
    }

    pub fn capabilities(&self) -> SeCapabilities {
        match self {
            ChipFamily::T30 => SeCapabilities::empty(),
            ChipFamily::T114 => SeCapabilities::RNG_SP800_90 | SeCapabilities::PKC,
        }
    }

    /// Number of sticky bit word quads saved at suspend
    pub fn sticky_word_quads(&self) -> u32 {
        match self {
            ChipFamily::T30 => 1,
            ChipFamily::T114 => 2,
        }
    }

    /// Whether the RSA key table is part of the suspend context
    pub fn saves_rsa_keytable(&self) -> bool {
        self.capabilities().contains(SeCapabilities::PKC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_version() {
        assert_eq!(ChipFamily::from_version(1, 0), Ok(ChipFamily::T30));
        assert_eq!(ChipFamily::from_version(2, 1), Ok(ChipFamily::T114));
        assert_eq!(
            ChipFamily::from_version(3, 0),
            Err(SeError::ENGINE_UNSUPPORTED_VERSION)
        );
    }

    #[test]
    fn test_capabilities() {
        assert!(ChipFamily::T30.capabilities().is_empty());
        assert!(ChipFamily::T114
            .capabilities()
            .contains(SeCapabilities::PKC | SeCapabilities::RNG_SP800_90));
        assert!(!ChipFamily::T30.saves_rsa_keytable());
        assert_eq!(ChipFamily::T114.sticky_word_quads(), 2);
    }
}
