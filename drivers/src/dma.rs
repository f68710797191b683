/*++

Licensed under the Apache-2.0 license.

File Name:

    dma.rs

Abstract:

    File contains the linked-list descriptor pool used to feed data to and
    from the Security Engine.

--*/

use tegra_se_error::{SeError, SeResult};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::platform::{DmaRegion, SePlatform};

const DESCRIPTOR_ALIGN: usize = 16;
const BUFFER_ALIGN: usize = 64;

/// Hardware linked-list descriptor with a single buffer entry.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LlDescriptor {
    /// Index of the last buffer entry; always zero for a single entry
    pub last_buff_num: u32,

    /// Bus address of the data buffer
    pub addr: u32,

    /// Size of the data buffer in bytes
    pub size: u32,
}

/// One of the two ping-pong buffers of each direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferId {
    A = 0,
    B = 1,
}

impl BufferId {
    /// The buffer not currently owned by hardware
    pub fn other(self) -> Self {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Descriptor and its backing buffer
#[derive(Debug, Clone, Copy)]
pub(crate) struct LlSlot {
    pub desc: DmaRegion,
    pub buffer: DmaRegion,
}

impl LlSlot {
    /// Point the descriptor at `offset` bytes into the buffer, covering `size` bytes
    pub fn program(&self, platform: &impl SePlatform, offset: usize, size: usize) {
        let desc = LlDescriptor {
            last_buff_num: 0,
            addr: self.buffer.at(offset),
            size: size as u32,
        };
        platform.dma_write(self.desc.phys, desc.as_bytes());
    }

    /// Bus address of the descriptor
    pub fn ll_addr(&self) -> u32 {
        self.desc.phys
    }
}

/// Two input and two output descriptors with fixed-size buffers.
pub(crate) struct DmaPool {
    pub input: [LlSlot; 2],
    pub output: [LlSlot; 2],
    pub buffer_size: usize,
}

impl DmaPool {
    /// Allocate the pool, releasing anything already allocated on failure
    pub fn alloc(platform: &impl SePlatform, buffer_size: usize) -> SeResult<Self> {
        let mut regions = Vec::with_capacity(8);
        match Self::alloc_slots(platform, buffer_size, &mut regions) {
            Ok((input, output)) => {
                let pool = Self {
                    input,
                    output,
                    buffer_size,
                };
                for slot in pool.input.iter().chain(pool.output.iter()) {
                    slot.program(platform, 0, 0);
                }
                Ok(pool)
            }
            Err(err) => {
                log::error!("DMA pool allocation failed: {err}");
                for region in regions {
                    platform.dma_free(region);
                }
                Err(SeError::ENGINE_DMA_ALLOC_FAILED)
            }
        }
    }

    fn alloc_slots(
        platform: &impl SePlatform,
        buffer_size: usize,
        regions: &mut Vec<DmaRegion>,
    ) -> SeResult<([LlSlot; 2], [LlSlot; 2])> {
        let mut slot = || -> SeResult<LlSlot> {
            let desc = platform.dma_alloc(core::mem::size_of::<LlDescriptor>(), DESCRIPTOR_ALIGN)?;
            regions.push(desc);
            let buffer = platform.dma_alloc(buffer_size, BUFFER_ALIGN)?;
            regions.push(buffer);
            Ok(LlSlot { desc, buffer })
        };
        let input = [slot()?, slot()?];
        let output = [slot()?, slot()?];
        Ok((input, output))
    }

    /// Release every descriptor and buffer
    pub fn free(self, platform: &impl SePlatform) {
        for slot in self.input.iter().chain(self.output.iter()) {
            platform.dma_free(slot.desc);
            platform.dma_free(slot.buffer);
        }
    }

    pub fn input(&self, id: BufferId) -> &LlSlot {
        &self.input[id.index()]
    }

    pub fn output(&self, id: BufferId) -> &LlSlot {
        &self.output[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_layout() {
        let desc = LlDescriptor {
            last_buff_num: 0,
            addr: 0x8000_1000,
            size: 0x40,
        };
        assert_eq!(core::mem::size_of::<LlDescriptor>(), 12);
        assert_eq!(
            desc.as_bytes(),
            &[0, 0, 0, 0, 0x00, 0x10, 0x00, 0x80, 0x40, 0, 0, 0]
        );
    }

    #[test]
    fn test_buffer_alternation() {
        assert_eq!(BufferId::A.other(), BufferId::B);
        assert_eq!(BufferId::B.other(), BufferId::A);
        assert_eq!(BufferId::B.index(), 1);
    }
}
