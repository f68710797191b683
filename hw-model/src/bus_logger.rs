// Licensed under the Apache-2.0 license

use std::{cell::RefCell, thread::ThreadId};

use tegra_se_emu_bus::{Bus, BusError};
use tegra_se_emu_periph::SE_BASE;
use tegra_se_emu_types::{RvAddr, RvData, RvSize};
use tegra_se_registers::se;

/// Kind and value of one register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read { offset: u32, val: u32 },
    Write { offset: u32, val: u32 },
}

/// Register access made by the driver, tagged with the thread that made it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusAccess {
    pub thread: ThreadId,
    pub kind: AccessKind,
}

impl BusAccess {
    pub fn is_write_to(&self, offset: u32) -> bool {
        matches!(self.kind, AccessKind::Write { offset: o, .. } if o == offset)
    }

    pub fn is_read_of(&self, offset: u32) -> bool {
        matches!(self.kind, AccessKind::Read { offset: o, .. } if o == offset)
    }
}

/// Bus wrapper recording the Security Engine register accesses that pass through it
pub struct BusLogger<TBus: Bus> {
    pub bus: TBus,
    log: RefCell<Option<Vec<BusAccess>>>,
}

impl<TBus: Bus> BusLogger<TBus> {
    pub fn new(bus: TBus) -> Self {
        Self {
            bus,
            log: RefCell::new(None),
        }
    }

    /// Start recording, dropping anything recorded before
    pub fn start_log(&self) {
        *self.log.borrow_mut() = Some(Vec::new());
    }

    /// Stop recording and return what was recorded
    pub fn take_log(&self) -> Vec<BusAccess> {
        self.log.borrow_mut().take().unwrap_or_default()
    }

    fn se_offset(addr: RvAddr) -> Option<u32> {
        // Don't care about memory
        addr.checked_sub(SE_BASE).filter(|offset| *offset < se::BANK_SIZE)
    }

    fn record(&self, addr: RvAddr, kind: impl FnOnce(u32) -> AccessKind) {
        let Some(offset) = Self::se_offset(addr) else {
            return;
        };
        if let Some(log) = self.log.borrow_mut().as_mut() {
            log.push(BusAccess {
                thread: std::thread::current().id(),
                kind: kind(offset),
            });
        }
    }
}

impl<TBus: Bus> Bus for BusLogger<TBus> {
    fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        let result = self.bus.read(size, addr);
        if let Ok(val) = result {
            self.record(addr, |offset| AccessKind::Read { offset, val });
        }
        result
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        let result = self.bus.write(size, addr, val);
        if result.is_ok() {
            self.record(addr, |offset| AccessKind::Write { offset, val });
        }
        result
    }

    fn read_bytes(&self, addr: RvAddr, data: &mut [u8]) -> Result<(), BusError> {
        self.bus.read_bytes(addr, data)
    }

    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        self.bus.write_bytes(addr, data)
    }
}
