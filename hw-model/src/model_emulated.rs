// Licensed under the Apache-2.0 license

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tegra_se_drivers::{DmaRegion, IsrHandler, SeMmio, SePlatform};
use tegra_se_emu_bus::Bus;
use tegra_se_emu_periph::{SeKnobs, SeRootBus, SecurityEngine, PMC_BASE, RAM_BASE, SE_BASE};
use tegra_se_emu_types::RvSize;
use tegra_se_error::{SeError, SeResult};

use crate::bus_logger::{BusAccess, BusLogger};
use crate::InitParams;

/// Bump allocator over emulated RAM
#[derive(Debug, Default)]
struct DmaHeap {
    next: usize,
    live: Vec<DmaRegion>,
}

impl DmaHeap {
    fn alloc(&mut self, size: usize, align: usize, limit: usize) -> Option<DmaRegion> {
        let start = self.next.checked_next_multiple_of(align.max(1))?;
        let end = start.checked_add(size)?;
        if end > limit {
            return None;
        }
        self.next = end;
        let region = DmaRegion {
            phys: RAM_BASE + start as u32,
            size,
        };
        self.live.push(region);
        Some(region)
    }

    fn free(&mut self, region: DmaRegion) {
        self.live.retain(|r| *r != region);
        if self.live.is_empty() {
            self.next = 0;
        }
    }
}

/// Platform backed by the software emulator.
///
/// Interrupts are delivered synchronously: a register write that leaves an
/// enabled interrupt pending runs the installed handler before returning.
pub struct ModelEmulated {
    bus: Mutex<BusLogger<SeRootBus>>,
    isr: Mutex<Option<IsrHandler>>,
    heap: Mutex<DmaHeap>,
    ram_size: usize,
    fail_register_interrupt: AtomicBool,
    fail_interrupt_enable: AtomicBool,
}

impl ModelEmulated {
    pub fn new(params: InitParams) -> Self {
        let mut root = SeRootBus::new(params.ram_size);
        *root.se.knobs_mut() = params.knobs;
        Self {
            bus: Mutex::new(BusLogger::new(root)),
            isr: Mutex::new(None),
            heap: Mutex::new(DmaHeap::default()),
            ram_size: params.ram_size,
            fail_register_interrupt: AtomicBool::new(false),
            fail_interrupt_enable: AtomicBool::new(false),
        }
    }

    /// Run `f` on the emulated engine
    pub fn with_se<T>(&self, f: impl FnOnce(&mut SecurityEngine) -> T) -> T {
        f(&mut self.bus.lock().bus.se)
    }

    pub fn knobs(&self) -> SeKnobs {
        self.with_se(|se| *se.knobs())
    }

    pub fn set_knobs(&self, knobs: SeKnobs) {
        self.with_se(|se| *se.knobs_mut() = knobs);
    }

    pub fn set_fail_register_interrupt(&self, fail: bool) {
        self.fail_register_interrupt.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_interrupt_enable(&self, fail: bool) {
        self.fail_interrupt_enable.store(fail, Ordering::SeqCst);
    }

    pub fn is_interrupt_registered(&self) -> bool {
        self.isr.lock().is_some()
    }

    pub fn pmc_read(&self, offset: u32) -> u32 {
        let bus = self.bus.lock();
        bus.read(RvSize::Word, PMC_BASE + offset).unwrap_or_else(|err| {
            log::warn!("PMC read at {offset:#x} failed: {err:?}");
            0
        })
    }

    /// DMA regions allocated and not yet freed
    pub fn live_dma_regions(&self) -> Vec<DmaRegion> {
        self.heap.lock().live.clone()
    }

    /// Start recording register accesses
    pub fn start_access_log(&self) {
        self.bus.lock().start_log();
    }

    /// Stop recording and return the register accesses made since
    /// [`ModelEmulated::start_access_log`]
    pub fn take_access_log(&self) -> Vec<BusAccess> {
        self.bus.lock().take_log()
    }
}

impl SeMmio for ModelEmulated {
    fn read(&self, offset: u32) -> u32 {
        let bus = self.bus.lock();
        bus.read(RvSize::Word, SE_BASE + offset).unwrap_or_else(|err| {
            log::warn!("SE read at {offset:#x} failed: {err:?}");
            0
        })
    }

    fn write(&self, offset: u32, val: u32) {
        let irq = {
            let mut bus = self.bus.lock();
            if let Err(err) = bus.write(RvSize::Word, SE_BASE + offset, val) {
                log::warn!("SE write at {offset:#x} failed: {err:?}");
            }
            bus.bus.se.irq_pending()
        };
        if !irq {
            return;
        }
        let handler = self.isr.lock().clone();
        if let Some(handler) = handler {
            handler(self);
        }
    }
}

impl SePlatform for ModelEmulated {
    fn dma_alloc(&self, size: usize, align: usize) -> SeResult<DmaRegion> {
        self.heap
            .lock()
            .alloc(size, align, self.ram_size)
            .ok_or(SeError::ENGINE_DMA_ALLOC_FAILED)
    }

    fn dma_free(&self, region: DmaRegion) {
        self.heap.lock().free(region);
    }

    fn dma_write(&self, phys: u32, data: &[u8]) {
        if let Err(err) = self.bus.lock().write_bytes(phys, data) {
            log::warn!("DMA write at {phys:#010x} failed: {err:?}");
        }
    }

    fn dma_read(&self, phys: u32, data: &mut [u8]) {
        if let Err(err) = self.bus.lock().read_bytes(phys, data) {
            log::warn!("DMA read at {phys:#010x} failed: {err:?}");
        }
    }

    fn flush_write_combine(&self) {}

    fn register_interrupt(&self, handler: IsrHandler) -> SeResult<()> {
        if self.fail_register_interrupt.load(Ordering::SeqCst) {
            Err(SeError::ENGINE_INTERRUPT_REGISTER_FAILED)?;
        }
        *self.isr.lock() = Some(handler);
        Ok(())
    }

    fn unregister_interrupt(&self) {
        *self.isr.lock() = None;
    }

    fn interrupt_enable(&self) -> SeResult<()> {
        if self.fail_interrupt_enable.load(Ordering::SeqCst) {
            Err(SeError::ENGINE_INTERRUPT_ENABLE_FAILED)?;
        }
        Ok(())
    }

    fn pmc_write(&self, offset: u32, val: u32) {
        if let Err(err) = self.bus.lock().write(RvSize::Word, PMC_BASE + offset, val) {
            log::warn!("PMC write at {offset:#x} failed: {err:?}");
        }
    }
}
