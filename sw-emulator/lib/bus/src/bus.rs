/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus trait.

--*/

use tegra_se_emu_types::{RvAddr, RvData, RvSize};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Load address misaligned exception
    LoadAddrMisaligned,

    /// Load access fault exception
    LoadAccessFault,

    /// Store address misaligned exception
    StoreAddrMisaligned,

    /// Store access fault exception
    StoreAccessFault,
}

/// Represents an abstract memory bus. Used to read and write from RAM and
/// peripheral addresses.
pub trait Bus {
    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError>;

    /// Write data of specified size to given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `addr` - Address to write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError>;

    /// Copy `data.len()` bytes starting at `addr` into `data`
    fn read_bytes(&self, addr: RvAddr, data: &mut [u8]) -> Result<(), BusError> {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.read(RvSize::Byte, addr.wrapping_add(i as RvAddr))? as u8;
        }
        Ok(())
    }

    /// Copy `data` to the bytes starting at `addr`
    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        for (i, byte) in data.iter().enumerate() {
            self.write(RvSize::Byte, addr.wrapping_add(i as RvAddr), *byte as RvData)?;
        }
        Ok(())
    }
}
