// Licensed under the Apache-2.0 license

use std::sync::Arc;

use tegra_se_drivers::{SeConfig, SeEngine};
use tegra_se_error::SeResult;

mod bus_logger;
mod model_emulated;

pub use bus_logger::{AccessKind, BusAccess, BusLogger};
pub use model_emulated::ModelEmulated;
pub use tegra_se_emu_periph::SeKnobs;

pub const DEFAULT_RAM_SIZE: usize = 32 * 1024 * 1024;

pub struct InitParams {
    // Size of the emulated system RAM the DMA buffers are carved from
    pub ram_size: usize,

    // Fault injection settings of the emulated engine
    pub knobs: SeKnobs,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            knobs: SeKnobs::default(),
        }
    }
}

/// Create an emulated platform and an engine initialized on top of it
pub fn new_engine(
    params: InitParams,
    config: SeConfig,
) -> SeResult<(Arc<ModelEmulated>, SeEngine<ModelEmulated>)> {
    let model = Arc::new(ModelEmulated::new(params));
    let engine = SeEngine::new(model.clone(), config);
    engine.init()?;
    Ok((model, engine))
}
