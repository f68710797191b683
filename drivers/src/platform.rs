/*++

Licensed under the Apache-2.0 license.

File Name:

    platform.rs

Abstract:

    File contains the platform traits the Security Engine driver is built on:
    register access, DMA-coherent memory and interrupt plumbing.

--*/

use std::sync::Arc;

use tegra_se_error::SeResult;

/// Memory mapped access to the Security Engine register bank.
///
/// Offsets are byte offsets from the start of the bank.
pub trait SeMmio {
    /// Read the 32-bit register at `offset`
    fn read(&self, offset: u32) -> u32;

    /// Write `val` to the 32-bit register at `offset`
    fn write(&self, offset: u32, val: u32);
}

/// Interrupt service routine handed to [`SePlatform::register_interrupt`].
///
/// The routine receives register access only; it must not block.
pub type IsrHandler = Arc<dyn Fn(&dyn SeMmio) + Send + Sync>;

/// DMA-coherent memory region addressed by its bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRegion {
    /// Bus ("physical") address as seen by the engine
    pub phys: u32,

    /// Size in bytes
    pub size: usize,
}

impl DmaRegion {
    /// Bus address `offset` bytes into the region
    pub fn at(&self, offset: usize) -> u32 {
        self.phys + offset as u32
    }
}

/// Services the driver needs from the operating environment.
pub trait SePlatform: SeMmio + Send + Sync {
    /// Allocate a DMA-coherent region of `size` bytes aligned to `align`
    fn dma_alloc(&self, size: usize, align: usize) -> SeResult<DmaRegion>;

    /// Release a region returned by [`SePlatform::dma_alloc`]
    fn dma_free(&self, region: DmaRegion);

    /// Copy `data` into DMA memory at bus address `phys`
    fn dma_write(&self, phys: u32, data: &[u8]);

    /// Copy DMA memory at bus address `phys` into `data`
    fn dma_read(&self, phys: u32, data: &mut [u8]);

    /// Make CPU writes to DMA memory visible to the engine
    fn flush_write_combine(&self);

    /// Install the engine interrupt handler
    fn register_interrupt(&self, handler: IsrHandler) -> SeResult<()>;

    /// Remove the engine interrupt handler
    fn unregister_interrupt(&self);

    /// Re-arm the engine interrupt line
    fn interrupt_enable(&self) -> SeResult<()>;

    /// Write a power management controller register
    fn pmc_write(&self, offset: u32, val: u32);
}
