/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the Security Engine emulator types library.

--*/

mod macros;

/// Bus data width
pub type RvData = u32;

/// Bus address width
pub type RvAddr = u32;

emu_enum!(
    /// Bus access size
    #[derive(Debug, Eq, PartialEq, Copy, Clone)]
    pub RvSize;
    usize;
    {
        Byte = 1,
        HalfWord = 2,
        Word = 4,
    };
    Invalid
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_conversion() {
        assert_eq!(RvSize::from(4usize), RvSize::Word);
        assert_eq!(RvSize::from(3usize), RvSize::Invalid);
        assert_eq!(usize::from(RvSize::HalfWord), 2);
        assert_eq!(RvSize::Byte.to_string(), "Byte");
    }
}
