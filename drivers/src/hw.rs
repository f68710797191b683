/*++

Licensed under the Apache-2.0 license.

File Name:

    hw.rs

Abstract:

    File contains the register level operations shared by every algorithm:
    key table access, operation submission and completion polling.

--*/

use std::sync::Arc;
use std::time::Duration;

use tegra_se_error::{SeError, SeResult};
use tegra_se_registers::{
    se, Int, KeyTableAccess, KeyTableAddr, Operation, Security, Status,
};
use tock_registers::fields::FieldValue;
use tock_registers::{LocalRegisterCopy, RegisterLongName};
use zeroize::Zeroizing;

use crate::aes::AES_BLOCK_SIZE;
use crate::config::SeConfig;
use crate::dma::{BufferId, DmaPool, LlSlot};
use crate::key_slot::NUM_KEY_SLOTS;
use crate::platform::SePlatform;
use crate::sync::IsrContext;
use crate::wait::{self, Deadline};

/// Operation written to the OPERATION register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpKind {
    Start,
    CtxSave,
}

/// Everything needed to kick off one hardware operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Submission {
    pub in_ll: Option<u32>,
    pub out_ll: Option<u32>,
    pub nbytes: Option<usize>,
    pub op: OpKind,
}

impl Submission {
    pub fn start() -> Self {
        Self {
            in_ll: None,
            out_ll: None,
            nbytes: None,
            op: OpKind::Start,
        }
    }

    pub fn ctx_save() -> Self {
        Self {
            op: OpKind::CtxSave,
            ..Self::start()
        }
    }

    pub fn input(mut self, ll_addr: u32) -> Self {
        self.in_ll = Some(ll_addr);
        self
    }

    pub fn output(mut self, ll_addr: u32) -> Self {
        self.out_ll = Some(ll_addr);
        self
    }

    /// Program LAST_BLOCK for `nbytes` of data
    pub fn bytes(mut self, nbytes: usize) -> Self {
        self.nbytes = Some(nbytes);
        self
    }
}

/// Register level view of an initialized engine.
///
/// Only ever built while the engine lock is held.
pub(crate) struct SeHw<'a, P: SePlatform> {
    pub platform: &'a Arc<P>,
    pub pool: &'a DmaPool,
    pub isr: &'a IsrContext,
    pub config: &'a SeConfig,
}

impl<'a, P: SePlatform> SeHw<'a, P> {
    pub fn read(&self, offset: u32) -> u32 {
        self.platform.read(offset)
    }

    pub fn write(&self, offset: u32, val: u32) {
        self.platform.write(offset, val)
    }

    /// Write a register from its field values
    pub fn write_fields<R: RegisterLongName>(&self, offset: u32, fields: FieldValue<u32, R>) {
        self.write(offset, fields.value);
    }

    /// Acknowledge every pending interrupt
    pub fn clear_int_status(&self) {
        let status = self.read(se::INT_STATUS);
        self.write(se::INT_STATUS, status);
    }

    /// Stop software from reading back the expanded key schedule
    pub fn key_sched_read_disable(&self) {
        let mut reg = LocalRegisterCopy::<u32, Security::Register>::new(self.read(se::SE_SECURITY));
        reg.modify(Security::KEY_SCHED_READ::DISABLE);
        self.write(se::SE_SECURITY, reg.get());
    }

    /// Copy `data` to the start of `slot`'s buffer and point its descriptor at it
    pub fn load(&self, slot: &LlSlot, data: &[u8]) {
        self.platform.dma_write(slot.buffer.phys, data);
        slot.program(&**self.platform, 0, data.len());
    }

    /// Copy the start of `slot`'s buffer into `data`
    pub fn unload(&self, slot: &LlSlot, data: &mut [u8]) {
        self.platform.dma_read(slot.buffer.phys, data);
    }

    /// Descriptor the engine switches its input to when it needs a reseed
    pub fn reseed_slot(&self) -> &LlSlot {
        self.pool.input(BufferId::B)
    }

    fn keytable_commit(
        &self,
        slot: u32,
        quad: FieldValue<u32, KeyTableAddr::Register>,
        write: bool,
    ) {
        let op = if write {
            KeyTableAddr::OP::WRITE
        } else {
            KeyTableAddr::OP::READ
        };
        self.write_fields(
            se::CRYPTO_KEYTABLE_ADDR,
            KeyTableAddr::TABLE_SEL::KEYIV + op + KeyTableAddr::PKT_KEY_INDEX.val(slot) + quad,
        );
    }

    fn keytable_fill(&self, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write(se::CRYPTO_KEYTABLE_DATA + 4 * i as u32, *word);
        }
    }

    /// Write a 128, 192 or 256 bit key into `slot`, one word quad at a time
    pub fn set_key(&self, slot: u32, key: &[u8]) -> SeResult<()> {
        if slot >= NUM_KEY_SLOTS {
            Err(SeError::KEY_SLOT_OUT_OF_RANGE)?;
        }
        let mut words = Zeroizing::new([0u32; 8]);
        let nwords = le_words(key, &mut *words);
        for (quad, chunk) in words[..nwords].chunks(se::CRYPTO_KEYTABLE_DATA_WORDS).enumerate() {
            let mut data = Zeroizing::new([0u32; se::CRYPTO_KEYTABLE_DATA_WORDS]);
            data[..chunk.len()].copy_from_slice(chunk);
            self.keytable_fill(&*data);
            self.keytable_commit(slot, KeyTableAddr::PKT_WORD_QUAD.val(quad as u32), true);
        }
        Ok(())
    }

    /// Load the updated IV of `slot`
    pub fn set_iv(&self, slot: u32, iv: &[u8; AES_BLOCK_SIZE]) -> SeResult<()> {
        if slot >= NUM_KEY_SLOTS {
            Err(SeError::KEY_SLOT_OUT_OF_RANGE)?;
        }
        let mut words = [0u32; se::CRYPTO_KEYTABLE_DATA_WORDS];
        le_words(iv, &mut words);
        self.keytable_fill(&words);
        self.keytable_commit(slot, KeyTableAddr::PKT_WORD_QUAD::UPDATED_IVS, true);
        Ok(())
    }

    /// Read back the updated IV of `slot`
    pub fn get_iv(&self, slot: u32) -> SeResult<[u8; AES_BLOCK_SIZE]> {
        if slot >= NUM_KEY_SLOTS {
            Err(SeError::KEY_SLOT_OUT_OF_RANGE)?;
        }
        self.keytable_commit(slot, KeyTableAddr::PKT_WORD_QUAD::UPDATED_IVS, false);
        let mut iv = [0u8; AES_BLOCK_SIZE];
        for (i, bytes) in iv.chunks_exact_mut(4).enumerate() {
            let word = self.read(se::CRYPTO_KEYTABLE_DATA + 4 * i as u32);
            bytes.copy_from_slice(&word.to_le_bytes());
        }
        Ok(iv)
    }

    /// Block further key updates to `slot` until the next reset
    pub fn write_lock_key_slot(&self, slot: u32) -> SeResult<()> {
        if slot >= NUM_KEY_SLOTS {
            Err(SeError::KEY_SLOT_OUT_OF_RANGE)?;
        }
        let offset = se::keytable_access(slot);
        let mut reg = LocalRegisterCopy::<u32, KeyTableAccess::Register>::new(self.read(offset));
        reg.modify(KeyTableAccess::KEYUPDATE::DISABLE);
        self.write(offset, reg.get());
        // Read back so the write has landed before the caller relies on it
        self.read(offset);
        Ok(())
    }

    /// Submit one operation and wait for the engine to return to idle.
    pub fn start_operation(&self, sub: Submission) -> SeResult<()> {
        let nblocks = match sub.nbytes {
            Some(nbytes) => {
                if nbytes % AES_BLOCK_SIZE != 0 {
                    Err(SeError::HW_UNALIGNED_TRANSFER)?;
                }
                nbytes / AES_BLOCK_SIZE
            }
            None => 0,
        };
        if nblocks > se::MAX_LAST_BLOCK as usize + 1 {
            Err(SeError::HW_TOO_MANY_BLOCKS)?;
        }

        self.isr.clear_error();
        self.clear_int_status();
        if let Some(ll_addr) = sub.in_ll {
            self.write(se::IN_LL_ADDR, ll_addr);
        }
        if let Some(ll_addr) = sub.out_ll {
            self.write(se::OUT_LL_ADDR, ll_addr);
        }
        if nblocks > 0 {
            self.write(se::CRYPTO_LAST_BLOCK, nblocks as u32 - 1);
        }
        self.write_fields(se::INT_ENABLE, Int::SE_OP_DONE::SET + Int::ERR_STAT::SET);

        let (op, timeout) = match sub.op {
            OpKind::Start => (Operation::OP::START, self.config.op_timeout),
            OpKind::CtxSave => (Operation::OP::CTX_SAVE, self.config.ctx_save_timeout),
        };
        self.write_fields(se::OPERATION, op);
        self.wait_for_idle(timeout)
    }

    /// Poll STATUS until the engine is idle, servicing reseed requests.
    fn wait_for_idle(&self, timeout: Duration) -> SeResult<()> {
        let mut deadline = Deadline::after(timeout);
        let status = wait::until(&mut deadline, |deadline| {
            let int_status =
                LocalRegisterCopy::<u32, Int::Register>::new(self.read(se::INT_STATUS));
            if int_status.is_set(Int::RESEED_CNTR_EXHAUSTED) {
                log::debug!("SE reseed counter exhausted, restarting input");
                self.write_fields(se::INT_STATUS, Int::RESEED_CNTR_EXHAUSTED::SET);
                self.write(se::IN_LL_ADDR, self.reseed_slot().ll_addr());
                self.write_fields(se::OPERATION, Operation::OP::RESTART_IN);
                deadline.extend();
                return None;
            }
            let state = LocalRegisterCopy::<u32, Status::Register>::new(self.read(se::STATUS));
            state
                .matches_all(Status::STATE::IDLE)
                .then(|| self.read(se::INT_STATUS))
        });

        let Some(int_status) = status else {
            log::warn!("SE operation timed out after {:?}", timeout);
            return Err(SeError::HW_OP_TIMEOUT);
        };
        // The interrupt handler may already have acknowledged the status
        if int_status != 0 {
            self.write(se::INT_STATUS, int_status);
        }
        let int_status = LocalRegisterCopy::<u32, Int::Register>::new(int_status);
        if int_status.is_set(Int::ERR_STAT) || self.isr.error() {
            log::error!("SE operation failed, INT_STATUS {:#x}", int_status.get());
            Err(SeError::HW_ERROR_STATUS)?;
        }
        Ok(())
    }
}

/// Pack `bytes` into little-endian words, returning the number of words used
pub(crate) fn le_words(bytes: &[u8], words: &mut [u32]) -> usize {
    let mut count = 0;
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(4)) {
        let mut buf = [0u8; 4];
        buf[..chunk.len()].copy_from_slice(chunk);
        *word = u32::from_le_bytes(buf);
        count += 1;
    }
    count
}
