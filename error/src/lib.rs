/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the Security Engine crates for
    error handling.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::fmt;
use core::num::{NonZeroU32, TryFromIntError};

/// Security Engine Error Type
///
/// Codes are laid out as `0xCCCC_KKNN`: component `CCCC`, error kind `KK`
/// and a per-component sequence number `NN`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SeError(pub NonZeroU32);

/// Coarse classification every [`SeError`] belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SeErrorKind {
    /// Malformed caller input
    BadParameter,
    /// Size outside the range an algorithm accepts
    InvalidSize,
    /// Mode or operation not available on this path or chip
    NotSupported,
    /// Engine or session not ready
    NotInitialized,
    /// Hardware reported an error status
    InvalidState,
    /// Semaphore wait or status poll exceeded its deadline
    Timeout,
    /// Key slot pool exhausted
    AlreadyAllocated,
    /// DMA or descriptor allocation failed
    InsufficientMemory,
    /// A cryptographic self-check failed
    BadValue,
}

impl SeErrorKind {
    const fn from_code(code: u32) -> Option<Self> {
        match code {
            0x01 => Some(Self::BadParameter),
            0x02 => Some(Self::InvalidSize),
            0x03 => Some(Self::NotSupported),
            0x04 => Some(Self::NotInitialized),
            0x05 => Some(Self::InvalidState),
            0x06 => Some(Self::Timeout),
            0x07 => Some(Self::AlreadyAllocated),
            0x08 => Some(Self::InsufficientMemory),
            0x09 => Some(Self::BadValue),
            _ => None,
        }
    }
}

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: SeError = SeError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl SeError {
    /// Create an error; intended to only be used from const contexts, as we
    /// don't want runtime panics if val is zero. The preferred way to get an
    /// SeError from a u32 is `SeError::try_from()`.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("SeError cannot be 0"),
        }
    }

    /// Kind this error belongs to.
    pub fn kind(&self) -> SeErrorKind {
        // Every constant below encodes a valid kind; a foreign code read back
        // through `try_from` is treated as a hardware-side failure.
        SeErrorKind::from_code((self.0.get() >> 8) & 0xff).unwrap_or(SeErrorKind::InvalidState)
    }

    define_error_constants![
        (
            ENGINE_NOT_INITIALIZED,
            0x0001_0401,
            "Engine has not been initialized"
        ),
        (
            ENGINE_INVALID_CONFIG,
            0x0001_0102,
            "Engine configuration is invalid"
        ),
        (
            ENGINE_DMA_ALLOC_FAILED,
            0x0001_0803,
            "DMA descriptor or buffer allocation failed"
        ),
        (
            ENGINE_INTERRUPT_REGISTER_FAILED,
            0x0001_0504,
            "Interrupt handler registration failed"
        ),
        (
            ENGINE_INTERRUPT_ENABLE_FAILED,
            0x0001_0505,
            "Interrupt enable failed"
        ),
        (
            ENGINE_UNSUPPORTED_VERSION,
            0x0001_0306,
            "Security Engine version is not supported"
        ),
        (HW_OP_TIMEOUT, 0x0002_0601, "Engine did not reach idle in time"),
        (
            HW_SEMAPHORE_TIMEOUT,
            0x0002_0602,
            "Dual buffer semaphore wait timed out"
        ),
        (HW_ERROR_STATUS, 0x0002_0503, "Engine reported an error status"),
        (
            HW_TOO_MANY_BLOCKS,
            0x0002_0904,
            "Block count exceeds the LAST_BLOCK range"
        ),
        (
            HW_UNALIGNED_TRANSFER,
            0x0002_0105,
            "Transfer size is not a multiple of the AES block size"
        ),
        (
            KEY_SLOT_EXHAUSTED,
            0x0003_0701,
            "No free AES key slot is available"
        ),
        (
            KEY_SLOT_OUT_OF_RANGE,
            0x0003_0302,
            "AES key slot index is out of range"
        ),
        (SHA_ZERO_MESSAGE_SIZE, 0x0004_0101, "SHA total message size is zero"),
        (
            SHA_UNALIGNED_CHUNK,
            0x0004_0102,
            "Non final SHA chunk is not a multiple of the block size"
        ),
        (
            SHA_INVALID_DIGEST_SIZE,
            0x0004_0103,
            "SHA output size does not match the digest length"
        ),
        (
            SHA_MESSAGE_OVERFLOW,
            0x0004_0104,
            "SHA update exceeds the declared message size"
        ),
        (SHA_ENGINE_ERROR, 0x0004_0505, "SHA submission saw the error flag"),
        (AES_UNSUPPORTED_MODE, 0x0005_0301, "AES mode is not supported"),
        (AES_INVALID_KEY_LENGTH, 0x0005_0102, "AES key length is invalid"),
        (
            AES_UNSUPPORTED_KEY_TYPE,
            0x0005_0303,
            "Key type is not supported for this key length"
        ),
        (
            AES_UNALIGNED_SIZE,
            0x0005_0104,
            "AES data size is not a multiple of the block size"
        ),
        (
            AES_NO_OPERATION_SELECTED,
            0x0005_0405,
            "No AES operation has been selected"
        ),
        (AES_NO_KEY_SELECTED, 0x0005_0306, "No AES key slot has been selected"),
        (AES_IV_BUFFER_TOO_SMALL, 0x0005_0107, "IV buffer is too small"),
        (
            AES_OUTPUT_BUFFER_TOO_SMALL,
            0x0005_0108,
            "AES output buffer is smaller than the input"
        ),
        (
            AES_SBK_CLEAR_VERIFY_FAILED,
            0x0005_0909,
            "Secure boot key clear verification failed"
        ),
        (
            AES_SSK_LOCK_VERIFY_FAILED,
            0x0005_090a,
            "Secure storage key lock verification failed"
        ),
        (
            CMAC_UNALIGNED_CHUNK,
            0x0006_0101,
            "Non final CMAC chunk is not a multiple of the block size"
        ),
        (CMAC_MISSING_OUTPUT, 0x0006_0102, "Last CMAC chunk has no output"),
        (CMAC_OUTPUT_TOO_SMALL, 0x0006_0203, "CMAC output buffer is too small"),
        (RSA_PKC_NOT_SUPPORTED, 0x0007_0301, "PKC is not supported on this chip"),
        (
            RSA_INVALID_MODULUS_SIZE,
            0x0007_0202,
            "RSA modulus size is invalid"
        ),
        (
            RSA_INVALID_EXPONENT_SIZE,
            0x0007_0203,
            "RSA exponent size is invalid"
        ),
        (RSA_INVALID_KEY_SLOT, 0x0007_0104, "RSA key slot is invalid"),
        (
            RSA_INVALID_INPUT_SIZE,
            0x0007_0205,
            "RSA input size does not match the modulus"
        ),
        (
            RSA_OUTPUT_TOO_SMALL,
            0x0007_0206,
            "RSA output buffer is smaller than the modulus"
        ),
        (RNG_CONTEXT_NOT_SET, 0x0008_0401, "RNG context has not been set up"),
        (RNG_ZERO_SIZE, 0x0008_0202, "Requested random size is zero"),
        (
            RNG_SRK_DEST_NOT_SUPPORTED,
            0x0008_0303,
            "RNG destination SRK is not supported"
        ),
        (RNG_ENGINE_ERROR, 0x0008_0505, "RNG generation saw the error flag"),
        (
            RNG_SP800_90_NOT_SUPPORTED,
            0x0008_0306,
            "RNG mode or entropy source needs SP 800-90 support"
        ),
        (
            CLIENT_WRONG_ALGORITHM,
            0x0009_0101,
            "Client session holds a different algorithm"
        ),
        (
            CLIENT_NO_ALGORITHM,
            0x0009_0402,
            "Client has not selected an algorithm"
        ),
    ];
}

impl From<core::num::NonZeroU32> for crate::SeError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::SeError(val)
    }
}

impl From<SeError> for core::num::NonZeroU32 {
    fn from(val: SeError) -> Self {
        val.0
    }
}

impl From<SeError> for u32 {
    fn from(val: SeError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for SeError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(SeError(val)),
            Err(err) => Err(err),
        }
    }
}

impl fmt::Display for SeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:08x})", self.kind(), self.0.get())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SeError {}

pub type SeResult<T> = Result<T, SeError>;
