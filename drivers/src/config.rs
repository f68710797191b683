/*++

Licensed under the Apache-2.0 license.

File Name:

    config.rs

Abstract:

    File contains the engine configuration.

--*/

use std::time::Duration;

use tegra_se_error::{SeError, SeResult};

use crate::chip::ChipFamily;
use crate::context_save::ContextLayout;

/// Engine configuration, checked by [`SeConfig::validate`] at init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeConfig {
    /// Chip family the engine belongs to
    pub chip: ChipFamily,

    /// Capacity of each DMA buffer in bytes
    pub buffer_size: usize,

    /// Deadline for a regular hardware operation
    pub op_timeout: Duration,

    /// Deadline for each suspend context-save operation
    pub ctx_save_timeout: Duration,

    /// Deadline for the dual-buffer semaphore
    pub semaphore_timeout: Duration,

    /// Reseed interval handed to the RNG
    pub rng_reseed_counter: u32,
}

impl Default for SeConfig {
    fn default() -> Self {
        Self {
            chip: ChipFamily::T114,
            buffer_size: 4 * 1024 * 1024,
            op_timeout: Duration::from_secs(10),
            ctx_save_timeout: Duration::from_secs(1),
            semaphore_timeout: Duration::from_millis(10000),
            rng_reseed_counter: 100,
        }
    }
}

impl SeConfig {
    /// Chunk granularity; a multiple of every SHA block size
    pub const BUFFER_GRANULE: usize = 128;

    pub fn validate(&self) -> SeResult<()> {
        let layout = ContextLayout::for_chip(self.chip);
        if self.buffer_size == 0
            || self.buffer_size % Self::BUFFER_GRANULE != 0
            || self.buffer_size < layout.total_size()
        {
            log::error!("Invalid DMA buffer size {}", self.buffer_size);
            Err(SeError::ENGINE_INVALID_CONFIG)?;
        }
        if self.op_timeout.is_zero()
            || self.ctx_save_timeout.is_zero()
            || self.semaphore_timeout.is_zero()
        {
            log::error!("Engine timeouts must be non-zero");
            Err(SeError::ENGINE_INVALID_CONFIG)?;
        }
        if self.rng_reseed_counter == 0 {
            Err(SeError::ENGINE_INVALID_CONFIG)?;
        }
        Ok(())
    }
}
