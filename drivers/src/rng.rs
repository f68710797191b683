/*++

Licensed under the Apache-2.0 license.

File Name:

    rng.rs

Abstract:

    File contains API for the hardware random number generator.

--*/

use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::{mode_pkt, se, Config, CryptoConfig, RngConfig};
use tock_registers::fields::FieldValue;

use crate::aes::AES_BLOCK_SIZE;
use crate::chip::SeCapabilities;
use crate::dma::BufferId;
use crate::engine::SeEngine;
use crate::hw::{SeHw, Submission};
use crate::platform::SePlatform;

/// Size of the input the engine reads when it restarts after a reseed
const RESEED_PATTERN_SIZE: usize = AES_BLOCK_SIZE;

/// DRBG initialization request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngInitMode {
    Normal,
    ForceInstantiation,
    ForceReseed,
}

/// Key size class of the DRBG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngKeySize {
    Aes128,
    Aes192,
    Aes256,
}

/// Seed source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngSource {
    /// Seeded from memory
    Memory,

    /// Hardware entropy source
    Entropy,
}

/// Where generated bytes go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngDestination {
    Memory,
    Srk,
}

/// RNG state of one client.
#[derive(Debug, Clone, Default)]
pub struct RngSession {
    context: Option<RngContext>,
}

#[derive(Debug, Clone, Copy)]
struct RngContext {
    mode: RngInitMode,
    key_size: RngKeySize,
    source: RngSource,
    reseed_counter: u32,
}

impl RngSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_context_set(&self) -> bool {
        self.context.is_some()
    }
}

impl RngContext {
    fn mode_pkt(&self) -> u32 {
        match self.key_size {
            RngKeySize::Aes128 => mode_pkt::AES_KEY128,
            RngKeySize::Aes192 => mode_pkt::AES_KEY192,
            RngKeySize::Aes256 => mode_pkt::AES_KEY256,
        }
    }

    fn rng_config(&self) -> FieldValue<u32, RngConfig::Register> {
        let mode = match self.mode {
            RngInitMode::Normal => RngConfig::MODE::NORMAL,
            RngInitMode::ForceInstantiation => RngConfig::MODE::FORCE_INSTANTIATION,
            RngInitMode::ForceReseed => RngConfig::MODE::FORCE_RESEED,
        };
        let src = match self.source {
            RngSource::Memory => RngConfig::SRC::NONE,
            RngSource::Entropy => RngConfig::SRC::ENTROPY,
        };
        mode + src
    }
}

impl<P: SePlatform> SeHw<'_, P> {
    fn rng_generate_chunk(&self, ctx: &RngContext, nbytes: usize) -> SeResult<()> {
        // Only consumed if the engine runs out of reseeds mid-operation
        let reseed = self.reseed_slot();
        self.load(reseed, &[0; RESEED_PATTERN_SIZE]);

        let out_slot = self.pool.output(BufferId::A);
        out_slot.program(&**self.platform, 0, nbytes);
        self.platform.flush_write_combine();

        self.write_fields(
            se::CONFIG,
            Config::ENC_MODE.val(ctx.mode_pkt())
                + Config::ENC_ALG::RNG
                + Config::DEC_ALG::NOP
                + Config::DST::MEMORY,
        );
        self.write_fields(
            se::CRYPTO_CONFIG,
            CryptoConfig::INPUT_SEL::RANDOM
                + CryptoConfig::XOR_POS::BYPASS
                + CryptoConfig::CORE_SEL::ENCRYPT,
        );
        if self.config.chip.capabilities().contains(SeCapabilities::RNG_SP800_90) {
            self.write_fields(se::RNG_CONFIG, ctx.rng_config());
            self.write(se::RNG_RESEED_INTERVAL, ctx.reseed_counter);
        }

        self.start_operation(Submission::start().output(out_slot.ll_addr()).bytes(nbytes))
            .map_err(|err| {
                if err == SeError::HW_ERROR_STATUS {
                    SeError::RNG_ENGINE_ERROR
                } else {
                    err
                }
            })
    }
}

impl<P: SePlatform> SeEngine<P> {
    /// Record how subsequent [`SeEngine::rng_generate`] calls drive the DRBG
    pub fn rng_set_up_context(
        &self,
        session: &mut RngSession,
        mode: RngInitMode,
        key_size: RngKeySize,
        source: RngSource,
        dest: RngDestination,
    ) -> SeResult<()> {
        if dest == RngDestination::Srk {
            Err(SeError::RNG_SRK_DEST_NOT_SUPPORTED)?;
        }
        let advanced = mode != RngInitMode::Normal || source == RngSource::Entropy;
        if advanced && !self.capabilities().contains(SeCapabilities::RNG_SP800_90) {
            Err(SeError::RNG_SP800_90_NOT_SUPPORTED)?;
        }
        session.context = Some(RngContext {
            mode,
            key_size,
            source,
            reseed_counter: self.config().rng_reseed_counter,
        });
        Ok(())
    }

    /// Fill `out` with random bytes
    pub fn rng_generate(&self, session: &RngSession, out: &mut [u8]) -> SeResult<()> {
        let Some(ctx) = session.context else {
            return Err(SeError::RNG_CONTEXT_NOT_SET);
        };
        if out.is_empty() {
            Err(SeError::RNG_ZERO_SIZE)?;
        }

        self.with_engine(|eng| {
            let hw = &eng.hw;
            let out_slot = hw.pool.output(BufferId::A);
            for chunk in out.chunks_mut(hw.pool.buffer_size) {
                let nbytes = chunk.len().next_multiple_of(AES_BLOCK_SIZE);
                hw.rng_generate_chunk(&ctx, nbytes)?;
                hw.unload(out_slot, chunk);
            }
            Ok(())
        })
    }
}
