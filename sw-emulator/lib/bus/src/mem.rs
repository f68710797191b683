/*++

Licensed under the Apache-2.0 license.

File Name:

    mem.rs

Abstract:

    File contains the byte storage backing RAM, with scalar accesses for the
    CPU side and slice copies for DMA.

--*/

use crate::BusError;
use tegra_se_emu_types::{RvAddr, RvData, RvSize};

/// Memory Exception
#[derive(Debug, PartialEq, Eq)]
pub enum MemError {
    /// Read Address misaligned
    ReadAddrMisaligned,

    /// Read Access fault
    ReadAccessFault,

    /// Write Address misaligned
    WriteAddrMisaligned,

    /// Write access fault
    WriteAccessFault,
}

impl From<MemError> for BusError {
    /// Converts to this type from the input type.
    fn from(exception: MemError) -> BusError {
        match exception {
            MemError::ReadAddrMisaligned => BusError::LoadAddrMisaligned,
            MemError::ReadAccessFault => BusError::LoadAccessFault,
            MemError::WriteAddrMisaligned => BusError::StoreAddrMisaligned,
            MemError::WriteAccessFault => BusError::StoreAccessFault,
        }
    }
}

/// Memory
pub struct Mem {
    /// Data storage
    data: Vec<u8>,
}

impl Mem {
    /// Create a new memory object
    ///
    /// # Arguments
    ///
    /// * `data` - Data contents for memory
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Size of the memory in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable reference to data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable reference to data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read data of specified size from given address. The address must be
    /// `size` aligned.
    ///
    /// # Error
    ///
    /// * `MemError::ReadAddrMisaligned` - Read address is not `size` aligned
    /// * `MemError::ReadAccessFault` - Read from invalid or non existent address
    pub fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, MemError> {
        let width = Self::width(size).ok_or(MemError::ReadAccessFault)?;
        if addr as usize % width != 0 {
            return Err(MemError::ReadAddrMisaligned);
        }
        let mut bytes = [0u8; 4];
        self.read_slice(addr, &mut bytes[..width])?;
        Ok(RvData::from_le_bytes(bytes))
    }

    /// Write data of specified size to given address. The address must be
    /// `size` aligned.
    ///
    /// # Error
    ///
    /// * `MemError::WriteAddrMisaligned` - Write address is not `size` aligned
    /// * `MemError::WriteAccessFault` - Write to invalid or non existent address
    pub fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), MemError> {
        let width = Self::width(size).ok_or(MemError::WriteAccessFault)?;
        if addr as usize % width != 0 {
            return Err(MemError::WriteAddrMisaligned);
        }
        self.write_slice(addr, &val.to_le_bytes()[..width])
    }

    /// Copy bytes starting at `addr` into `data`
    pub fn read_slice(&self, addr: RvAddr, data: &mut [u8]) -> Result<(), MemError> {
        let start = addr as usize;
        let src = start
            .checked_add(data.len())
            .and_then(|end| self.data.get(start..end))
            .ok_or(MemError::ReadAccessFault)?;
        data.copy_from_slice(src);
        Ok(())
    }

    /// Copy `data` to the bytes starting at `addr`
    pub fn write_slice(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), MemError> {
        let start = addr as usize;
        let dst = start
            .checked_add(data.len())
            .and_then(|end| self.data.get_mut(start..end))
            .ok_or(MemError::WriteAccessFault)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn width(size: RvSize) -> Option<usize> {
        match size {
            RvSize::Invalid => None,
            size => Some(size.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sizes() {
        let mem = Mem::new(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(mem.read(RvSize::Byte, 5), Ok(6));
        assert_eq!(mem.read(RvSize::HalfWord, 2), Ok(0x0403));
        assert_eq!(mem.read(RvSize::Word, 4), Ok(0x0807_0605));
    }

    #[test]
    fn test_misaligned() {
        let mut mem = Mem::new(vec![0; 8]);
        assert_eq!(mem.read(RvSize::Word, 2), Err(MemError::ReadAddrMisaligned));
        assert_eq!(
            mem.write(RvSize::HalfWord, 1, 0),
            Err(MemError::WriteAddrMisaligned)
        );
    }

    #[test]
    fn test_out_of_range() {
        let mut mem = Mem::new(vec![0; 8]);
        assert_eq!(mem.read(RvSize::Word, 8), Err(MemError::ReadAccessFault));
        assert_eq!(
            mem.write_slice(6, &[1, 2, 3]),
            Err(MemError::WriteAccessFault)
        );
        assert_eq!(
            mem.read_slice(u32::MAX, &mut [0; 2]),
            Err(MemError::ReadAccessFault)
        );
    }

    #[test]
    fn test_slices() {
        let mut mem = Mem::new(vec![0; 8]);
        mem.write_slice(3, &[0xaa, 0xbb]).unwrap();
        let mut out = [0u8; 4];
        mem.read_slice(2, &mut out).unwrap();
        assert_eq!(out, [0, 0xaa, 0xbb, 0]);
        mem.write(RvSize::Word, 4, 0x1122_3344).unwrap();
        assert_eq!(&mem.data()[4..], &[0x44, 0x33, 0x22, 0x11]);
    }
}
