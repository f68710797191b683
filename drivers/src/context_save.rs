/*++

Licensed under the Apache-2.0 license.

File Name:

    context_save.rs

Abstract:

    File contains the suspend sequence saving the engine's secret state,
    encrypted under a freshly generated secure root key.

--*/

use tegra_se_error::SeResult;
use tegra_se_registers::{
    mode_pkt, pmc, se, Config, CryptoConfig, CtxSaveConfig, KeyTableDst, RngConfig,
};
use tock_registers::fields::FieldValue;

use crate::aes::AES_BLOCK_SIZE;
use crate::chip::ChipFamily;
use crate::dma::{BufferId, LlSlot};
use crate::engine::SeEngine;
use crate::hw::{SeHw, Submission};
use crate::key_slot::{NUM_KEY_SLOTS, SRK_SLOT, SSK_SLOT};
use crate::platform::SePlatform;

/// Pattern encrypted last so the restore side can check the SRK
pub const KNOWN_PATTERN: [u8; AES_BLOCK_SIZE] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

const AES_KEY_QUADS: u32 = 2;
const RSA_KEY_INDICES: u32 = 4;
const RSA_WORD_QUADS: u32 = 16;

/// Byte layout of the suspend context buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLayout {
    pub random: usize,
    pub sticky_bits: usize,
    pub aes_keys: usize,
    pub original_ivs: usize,
    pub updated_ivs: usize,
    pub rsa_keys: usize,
    pub known_pattern: usize,
}

impl ContextLayout {
    pub fn for_chip(chip: ChipFamily) -> Self {
        let block = AES_BLOCK_SIZE;
        let slots = NUM_KEY_SLOTS as usize;
        Self {
            random: block,
            sticky_bits: chip.sticky_word_quads() as usize * block,
            aes_keys: slots * AES_KEY_QUADS as usize * block,
            original_ivs: slots * block,
            updated_ivs: slots * block,
            rsa_keys: if chip.saves_rsa_keytable() {
                (RSA_KEY_INDICES * RSA_WORD_QUADS) as usize * block
            } else {
                0
            },
            known_pattern: block,
        }
    }

    pub fn total_size(&self) -> usize {
        self.random
            + self.sticky_bits
            + self.aes_keys
            + self.original_ivs
            + self.updated_ivs
            + self.rsa_keys
            + self.known_pattern
    }

    /// Offset of the encrypted known pattern
    pub fn known_pattern_offset(&self) -> usize {
        self.total_size() - self.known_pattern
    }
}

/// Writes context-save output sequentially into one DMA buffer
struct ContextWriter<'h, 'a, P: SePlatform> {
    hw: &'h SeHw<'a, P>,
    slot: &'h LlSlot,
    pos: usize,
}

impl<'h, 'a, P: SePlatform> ContextWriter<'h, 'a, P> {
    /// Run one context-save operation writing `nbytes` at the current position
    fn save(
        &mut self,
        config: FieldValue<u32, CtxSaveConfig::Register>,
        nbytes: usize,
    ) -> SeResult<()> {
        self.hw.write_fields(se::CTX_SAVE_CONFIG, config);
        self.slot.program(&**self.hw.platform, self.pos, nbytes);
        self.hw.platform.flush_write_combine();
        let ll = self.slot.ll_addr();
        self.hw
            .start_operation(Submission::ctx_save().input(ll).output(ll).bytes(nbytes))?;
        self.pos += nbytes;
        Ok(())
    }

    /// Encrypt the block at the current position in place
    fn encrypt_block(&mut self) -> SeResult<()> {
        self.save(CtxSaveConfig::SRC::MEM, AES_BLOCK_SIZE)
    }

    fn start(&self, nbytes: usize) -> SeResult<()> {
        let ll = self.slot.ll_addr();
        self.hw
            .start_operation(Submission::start().input(ll).output(ll).bytes(nbytes))
    }
}

impl<P: SePlatform> SeHw<'_, P> {
    fn rng_crypto_config(&self, slot: u32) -> FieldValue<u32, CryptoConfig::Register> {
        CryptoConfig::INPUT_SEL::RANDOM
            + CryptoConfig::XOR_POS::BYPASS
            + CryptoConfig::CORE_SEL::ENCRYPT
            + CryptoConfig::KEY_INDEX.val(slot)
    }

    /// Generate a random key into the SRK key slot and latch it as the SRK
    fn generate_srk(&self, writer: &ContextWriter<'_, '_, P>, chip: ChipFamily) -> SeResult<()> {
        self.write_fields(
            se::CONFIG,
            Config::ENC_MODE.val(mode_pkt::AES_KEY128)
                + Config::ENC_ALG::RNG
                + Config::DEC_ALG::NOP
                + Config::DST::KEYTABLE,
        );
        self.write_fields(
            se::CRYPTO_KEYTABLE_DST,
            KeyTableDst::KEY_INDEX.val(SRK_SLOT) + KeyTableDst::WORD_QUAD::KEYS_0_3,
        );
        self.write_fields(
            se::CRYPTO_CONFIG,
            self.rng_crypto_config(SSK_SLOT) + CryptoConfig::IV_SELECT::ORIGINAL,
        );
        writer.start(AES_BLOCK_SIZE)?;

        self.write_fields(
            se::CONFIG,
            Config::ENC_MODE.val(mode_pkt::AES_KEY128)
                + Config::ENC_ALG::RNG
                + Config::DEC_ALG::NOP
                + Config::DST::SRK,
        );
        let crypto = CryptoConfig::XOR_POS::BYPASS
            + CryptoConfig::CORE_SEL::ENCRYPT
            + CryptoConfig::KEY_INDEX.val(SRK_SLOT)
            + CryptoConfig::IV_SELECT::UPDATED;
        if chip == ChipFamily::T114 {
            self.write_fields(se::CRYPTO_CONFIG, crypto + CryptoConfig::INPUT_SEL::RANDOM);
            self.write_fields(
                se::RNG_CONFIG,
                RngConfig::MODE::FORCE_RESEED + RngConfig::SRC::ENTROPY,
            );
            self.write(se::RNG_RESEED_INTERVAL, self.config.rng_reseed_counter);
        } else {
            self.write_fields(se::CRYPTO_CONFIG, crypto);
        }
        writer.start(AES_BLOCK_SIZE)
    }

    /// Fill the block at the writer's position with random data
    fn generate_random_block(
        &self,
        writer: &ContextWriter<'_, '_, P>,
        chip: ChipFamily,
    ) -> SeResult<()> {
        writer.slot.program(&**self.platform, writer.pos, AES_BLOCK_SIZE);
        self.write_fields(
            se::CONFIG,
            Config::ENC_MODE.val(mode_pkt::AES_KEY128)
                + Config::ENC_ALG::RNG
                + Config::DEC_ALG::NOP
                + Config::DST::MEMORY,
        );
        self.write_fields(
            se::CRYPTO_CONFIG,
            self.rng_crypto_config(SRK_SLOT) + CryptoConfig::IV_SELECT::ORIGINAL,
        );
        if chip == ChipFamily::T114 {
            self.write_fields(
                se::RNG_CONFIG,
                RngConfig::MODE::FORCE_RESEED + RngConfig::SRC::ENTROPY,
            );
        }
        writer.start(AES_BLOCK_SIZE)
    }

    /// Hand the SRK over to the PMC secure scratch registers
    fn save_srk(&self, chip: ChipFamily) -> SeResult<()> {
        self.write_fields(se::CTX_SAVE_CONFIG, CtxSaveConfig::SRC::SRK);
        self.start_operation(Submission::ctx_save().bytes(0))?;
        if chip == ChipFamily::T114 {
            self.write_fields(
                se::CONFIG,
                Config::ENC_ALG::NOP + Config::DEC_ALG::NOP,
            );
            self.start_operation(Submission::ctx_save())?;
        }
        Ok(())
    }

    fn suspend(&self, chip: ChipFamily) -> SeResult<u32> {
        let layout = ContextLayout::for_chip(chip);
        let slot = self.pool.output(BufferId::A);
        self.platform
            .dma_write(slot.buffer.phys, &vec![0u8; layout.total_size()]);
        let mut writer = ContextWriter {
            hw: self,
            slot,
            pos: 0,
        };

        self.generate_srk(&writer, chip)?;
        log::debug!("SE suspend: SRK generated");

        self.generate_random_block(&writer, chip)?;
        writer.encrypt_block()?;

        for quad in 0..chip.sticky_word_quads() {
            let config = if chip == ChipFamily::T114 {
                CtxSaveConfig::SRC::STICKY_BITS + CtxSaveConfig::STICKY_WORD_QUAD.val(quad)
            } else {
                CtxSaveConfig::SRC::STICKY_BITS
            };
            writer.save(config, AES_BLOCK_SIZE)?;
        }
        log::debug!("SE suspend: sticky bits saved");

        for key_slot in 0..NUM_KEY_SLOTS {
            for quad in 0..AES_KEY_QUADS {
                writer.save(
                    CtxSaveConfig::SRC::AES_KEYTABLE
                        + CtxSaveConfig::AES_KEY_INDEX.val(key_slot)
                        + CtxSaveConfig::AES_WORD_QUAD.val(quad),
                    AES_BLOCK_SIZE,
                )?;
            }
        }
        for iv_quad in [
            CtxSaveConfig::AES_WORD_QUAD::ORIGINAL_IVS,
            CtxSaveConfig::AES_WORD_QUAD::UPDATED_IVS,
        ] {
            for key_slot in 0..NUM_KEY_SLOTS {
                writer.save(
                    CtxSaveConfig::SRC::AES_KEYTABLE
                        + CtxSaveConfig::AES_KEY_INDEX.val(key_slot)
                        + iv_quad,
                    AES_BLOCK_SIZE,
                )?;
            }
        }
        log::debug!("SE suspend: AES key table saved");

        if chip.saves_rsa_keytable() {
            for index in 0..RSA_KEY_INDICES {
                for quad in 0..RSA_WORD_QUADS {
                    writer.save(
                        CtxSaveConfig::SRC::RSA_KEYTABLE
                            + CtxSaveConfig::RSA_KEY_INDEX.val(index)
                            + CtxSaveConfig::RSA_WORD_QUAD.val(quad),
                        AES_BLOCK_SIZE,
                    )?;
                }
            }
            log::debug!("SE suspend: RSA key table saved");
        }

        debug_assert_eq!(writer.pos, layout.known_pattern_offset());
        self.platform.dma_write(slot.buffer.at(writer.pos), &KNOWN_PATTERN);
        writer.encrypt_block()?;

        let context_addr = slot.buffer.phys;
        self.platform.pmc_write(pmc::SCRATCH43, context_addr);
        self.save_srk(chip)?;
        log::info!("SE context saved at {:#010x}", context_addr);
        Ok(context_addr)
    }
}

impl<P: SePlatform> SeEngine<P> {
    /// Save the engine state for a power suspend.
    ///
    /// Returns the bus address of the encrypted context, which is also left
    /// in the PMC scratch register read by the resume path.
    pub fn suspend(&self) -> SeResult<u32> {
        let chip = self.config().chip;
        self.with_engine(|eng| eng.hw.suspend(chip))
    }
}
