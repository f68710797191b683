/*++

Licensed under the Apache-2.0 license.

File Name:

    root_bus.rs

Abstract:

    File contains the root Bus of the emulated SoC: the Security Engine,
    the PMC and system RAM.

--*/

use tegra_se_emu_bus::{Bus, BusError, Ram};
use tegra_se_emu_types::{RvAddr, RvData, RvSize};
use tegra_se_registers::{pmc, se};

use crate::{Pmc, SecurityEngine};

pub const PMC_BASE: RvAddr = 0x7000_E400;
pub const SE_BASE: RvAddr = 0x7001_2000;
pub const RAM_BASE: RvAddr = 0x8000_0000;

/// Offset into `ram` of the `len` bytes at bus address `addr`
fn ram_offset(ram: &Ram, addr: RvAddr, len: usize, fault: BusError) -> Result<RvAddr, BusError> {
    let offset = addr.checked_sub(RAM_BASE).ok_or(fault)?;
    if offset as usize + len > ram.mmap_size() as usize {
        Err(fault)?
    }
    Ok(offset)
}

fn access_len(size: RvSize, fault: BusError) -> Result<usize, BusError> {
    match size {
        RvSize::Invalid => Err(fault),
        size => Ok(size.into()),
    }
}

/// The engine's view of RAM, addressed with bus addresses
struct RamPort<'a>(&'a mut Ram);

impl Bus for RamPort<'_> {
    fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        let fault = BusError::LoadAccessFault;
        let offset = ram_offset(&*self.0, addr, access_len(size, fault)?, fault)?;
        self.0.read(size, offset)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        let fault = BusError::StoreAccessFault;
        let offset = ram_offset(&*self.0, addr, access_len(size, fault)?, fault)?;
        self.0.write(size, offset, val)
    }

    fn read_bytes(&self, addr: RvAddr, data: &mut [u8]) -> Result<(), BusError> {
        let offset = ram_offset(&*self.0, addr, data.len(), BusError::LoadAccessFault)?;
        self.0.read_bytes(offset, data)
    }

    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        let offset = ram_offset(&*self.0, addr, data.len(), BusError::StoreAccessFault)?;
        self.0.write_bytes(offset, data)
    }
}

/// Root bus of the emulated SoC
pub struct SeRootBus {
    pub se: SecurityEngine,
    pub pmc: Pmc,
    pub ram: Ram,
}

impl SeRootBus {
    pub fn new(ram_size: usize) -> Self {
        Self {
            se: SecurityEngine::new(),
            pmc: Pmc::new(),
            ram: Ram::new(ram_size),
        }
    }

    fn in_bank(addr: RvAddr, base: RvAddr, size: RvAddr) -> Option<RvAddr> {
        addr.checked_sub(base).filter(|offset| *offset < size)
    }
}

impl Bus for SeRootBus {
    fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if let Some(offset) = Self::in_bank(addr, SE_BASE, se::BANK_SIZE) {
            return self.se.read(size, offset);
        }
        if let Some(offset) = Self::in_bank(addr, PMC_BASE, pmc::BANK_SIZE) {
            return self.pmc.read(size, offset);
        }
        let fault = BusError::LoadAccessFault;
        let offset = ram_offset(&self.ram, addr, access_len(size, fault)?, fault)?;
        self.ram.read(size, offset)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if let Some(offset) = Self::in_bank(addr, SE_BASE, se::BANK_SIZE) {
            self.se.write(size, offset, val, &mut RamPort(&mut self.ram))?;
            if let Some(srk) = self.se.take_srk_export() {
                self.pmc.set_srk_words(srk);
            }
            return Ok(());
        }
        if let Some(offset) = Self::in_bank(addr, PMC_BASE, pmc::BANK_SIZE) {
            return self.pmc.write(size, offset, val);
        }
        RamPort(&mut self.ram).write(size, addr, val)
    }

    fn read_bytes(&self, addr: RvAddr, data: &mut [u8]) -> Result<(), BusError> {
        let offset = ram_offset(&self.ram, addr, data.len(), BusError::LoadAccessFault)?;
        self.ram.read_bytes(offset, data)
    }

    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        RamPort(&mut self.ram).write_bytes(addr, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_decode() {
        let mut bus = SeRootBus::new(0x1000);
        bus.write(RvSize::Word, SE_BASE + se::CONFIG, 0x55).unwrap();
        assert_eq!(bus.se.read(RvSize::Word, se::CONFIG).unwrap(), 0x55);

        bus.write(RvSize::Word, PMC_BASE + pmc::SCRATCH43, RAM_BASE).unwrap();
        assert_eq!(bus.read(RvSize::Word, PMC_BASE + pmc::SCRATCH43).unwrap(), RAM_BASE);

        bus.write_bytes(RAM_BASE + 0x10, &[1, 2, 3, 4]).unwrap();
        assert_eq!(bus.read(RvSize::Word, RAM_BASE + 0x10).unwrap(), 0x0403_0201);
        assert_eq!(&bus.ram.data()[0x10..0x14], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_unmapped_access() {
        let mut bus = SeRootBus::new(0x100);
        assert_eq!(
            bus.read(RvSize::Word, RAM_BASE + 0x100),
            Err(BusError::LoadAccessFault)
        );
        assert_eq!(
            bus.write_bytes(RAM_BASE + 0xfe, &[0; 4]),
            Err(BusError::StoreAccessFault)
        );
        assert_eq!(bus.read(RvSize::Word, 0x1000), Err(BusError::LoadAccessFault));
    }
}
