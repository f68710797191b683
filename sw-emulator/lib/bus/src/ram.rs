/*++

Licensed under the Apache-2.0 license.

File Name:

    ram.rs

Abstract:

    File contains implementation of RAM

--*/

use crate::{mem::Mem, Bus, BusError};
use tegra_se_emu_types::{RvAddr, RvData, RvSize};

/// Random Access Memory Device
pub struct Ram {
    data: Mem,
}

impl Ram {
    /// Create new zero filled RAM of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            data: Mem::new(vec![0; size]),
        }
    }

    pub fn mmap_size(&self) -> RvAddr {
        self.data.len() as RvAddr
    }

    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.data_mut()
    }
}

impl Bus for Ram {
    fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        Ok(self.data.read(size, addr)?)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        Ok(self.data.write(size, addr, val)?)
    }

    fn read_bytes(&self, addr: RvAddr, data: &mut [u8]) -> Result<(), BusError> {
        Ok(self.data.read_slice(addr, data)?)
    }

    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        Ok(self.data.write_slice(addr, data)?)
    }
}
