/*++

Licensed under the Apache-2.0 license.

File Name:

    engine.rs

Abstract:

    File contains the Security Engine handle: lifecycle, the engine lock and
    key slot bookkeeping.

--*/

use std::sync::Arc;

use parking_lot::Mutex;
use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::se;

use crate::chip::SeCapabilities;
use crate::config::SeConfig;
use crate::dma::{BufferId, DmaPool};
use crate::hw::SeHw;
use crate::key_slot::{KeySlotTable, NUM_KEY_SLOTS};
use crate::platform::{IsrHandler, SeMmio, SePlatform};
use crate::sync::IsrContext;

/// State that only exists between `init` and `deinit`
struct EngineState {
    pool: DmaPool,
    key_slots: KeySlotTable,
    buffer_in_use: BufferId,
}

/// Engine state borrowed for the duration of one locked operation
pub(crate) struct Locked<'a, P: SePlatform> {
    pub hw: SeHw<'a, P>,
    pub key_slots: &'a mut KeySlotTable,
    pub buffer_in_use: &'a mut BufferId,
}

/// Handle to one Security Engine instance.
///
/// Every operation takes the engine lock for its whole duration, so
/// operations from different threads never interleave on the hardware.
pub struct SeEngine<P: SePlatform> {
    platform: Arc<P>,
    config: SeConfig,
    isr: Arc<IsrContext>,
    state: Mutex<Option<EngineState>>,
}

impl<P: SePlatform> SeEngine<P> {
    pub fn new(platform: Arc<P>, config: SeConfig) -> Self {
        Self {
            platform,
            config,
            isr: Arc::new(IsrContext::default()),
            state: Mutex::new(None),
        }
    }

    /// Bring the engine up. Calling it again on a running engine is a no-op.
    pub fn init(&self) -> SeResult<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let pool = DmaPool::alloc(&*self.platform, self.config.buffer_size)?;

        let isr = self.isr.clone();
        let handler: IsrHandler = Arc::new(move |mmio: &dyn SeMmio| isr.service(mmio));
        if let Err(err) = self.platform.register_interrupt(handler) {
            log::error!("SE interrupt registration failed: {err}");
            pool.free(&*self.platform);
            return Err(SeError::ENGINE_INTERRUPT_REGISTER_FAILED);
        }

        let hw = SeHw {
            platform: &self.platform,
            pool: &pool,
            isr: &self.isr,
            config: &self.config,
        };
        hw.key_sched_read_disable();
        hw.clear_int_status();
        hw.write(se::INT_ENABLE, 0);

        *state = Some(EngineState {
            pool,
            key_slots: KeySlotTable::default(),
            buffer_in_use: BufferId::A,
        });
        log::info!("SE initialized for {:?}", self.config.chip);
        Ok(())
    }

    /// Release the DMA pool and the interrupt. Safe to call more than once.
    pub fn deinit(&self) {
        let Some(state) = self.state.lock().take() else {
            return;
        };
        self.platform.unregister_interrupt();
        state.pool.free(&*self.platform);
        log::info!("SE deinitialized");
    }

    pub fn is_init_done(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn config(&self) -> &SeConfig {
        &self.config
    }

    /// Optional features of this chip
    pub fn capabilities(&self) -> SeCapabilities {
        self.config.chip.capabilities()
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Run `f` with the engine lock held
    pub(crate) fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut Locked<'_, P>) -> SeResult<T>,
    ) -> SeResult<T> {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return Err(SeError::ENGINE_NOT_INITIALIZED);
        };
        let mut locked = Locked {
            hw: SeHw {
                platform: &self.platform,
                pool: &state.pool,
                isr: &self.isr,
                config: &self.config,
            },
            key_slots: &mut state.key_slots,
            buffer_in_use: &mut state.buffer_in_use,
        };
        f(&mut locked)
    }

    /// Reserve a free key slot
    pub fn allocate_key_slot(&self) -> SeResult<u32> {
        self.with_engine(|eng| {
            let slot = eng.key_slots.allocate()?;
            log::debug!("SE key slot {slot} allocated");
            Ok(slot)
        })
    }

    /// Return `slot` to the pool; reserved slots stay reserved
    pub fn release_key_slot(&self, slot: u32) -> SeResult<()> {
        self.with_engine(|eng| {
            eng.key_slots.release(slot);
            Ok(())
        })
    }

    /// Block further key updates of `slot` until reset
    pub fn write_lock_key_slot(&self, slot: u32) -> SeResult<()> {
        if slot >= NUM_KEY_SLOTS {
            Err(SeError::KEY_SLOT_OUT_OF_RANGE)?;
        }
        self.with_engine(|eng| {
            eng.hw.write_lock_key_slot(slot)?;
            log::debug!("SE key slot {slot} write locked");
            Ok(())
        })
    }
}

impl<P: SePlatform> Drop for SeEngine<P> {
    fn drop(&mut self) {
        self.deinit();
    }
}
