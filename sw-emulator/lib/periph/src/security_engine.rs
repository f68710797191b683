/*++

Licensed under the Apache-2.0 license.

File Name:

    security_engine.rs

Abstract:

    File contains the emulated Security Engine: register bank, key tables,
    linked-list DMA and the SHA, AES, RNG, RSA and context-save operations.

--*/

use std::fmt;

use rand::RngCore;
use tegra_se_emu_bus::{Bus, BusError};
use tegra_se_emu_crypto::{
    mod_exp, AesCipher, ModExpError, Sha, ShaAlgo, AES_BLOCK_SIZE, SHA_STATE_WORDS,
};
use tegra_se_emu_types::{RvAddr, RvData, RvSize};
use tegra_se_registers::{
    mode_pkt, se, Config, CryptoConfig, CtxSaveConfig, Int, KeyTableAccess, KeyTableAddr,
    KeyTableDst, Operation, RsaConfig, RsaKeyTableAddr, Security, ShaConfig, Status,
};
use tock_registers::{LocalRegisterCopy, RegisterLongName};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub const NUM_KEY_SLOTS: usize = 16;

/// Key words 0-7, original IV words 8-11, updated IV words 12-15
const KEY_SLOT_WORDS: usize = 16;
const ORIGINAL_IV_QUAD: usize = 2;
const UPDATED_IV_QUAD: usize = 3;

const RSA_KEY_SLOTS: usize = 2;
const RSA_MAX_BYTES: usize = se::RSA_OUTPUT_WORDS * 4;
const RSA_EXPONENT: usize = 0;
const RSA_MODULUS: usize = 1;

const STICKY_WORDS: usize = 8;
const REG_COUNT: usize = (se::BANK_SIZE / 4) as usize;
const KEYTABLE_ACCESS_RESET: u32 = 0xff;

/// Linked-list entry as the engine fetches it from memory
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Debug, Clone, Copy)]
struct LlEntry {
    last_buff_num: u32,
    addr: u32,
    size: u32,
}

/// Fault injection and timing controls for tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SeKnobs {
    /// Leave every started operation busy
    pub stall: bool,

    /// Leave context-save operations busy, other operations still run
    pub stall_ctx_save: bool,

    /// Flip a bit in everything written to memory
    pub corrupt_output: bool,

    /// Fail every operation with ERR_STAT
    pub inject_error: bool,

    /// Accept key writes to write-locked slots
    pub ignore_key_locks: bool,

    /// Request a reseed after this many RNG operations
    pub reseed_after: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Stalled,
    Reseed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Done,
    Waiting,
}

#[derive(Debug)]
enum OpFault {
    Dma(BusError),
    Config(&'static str),
    ModExp(ModExpError),
    Injected,
}

impl fmt::Display for OpFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpFault::Dma(err) => write!(f, "DMA access failed: {err:?}"),
            OpFault::Config(what) => write!(f, "bad configuration: {what}"),
            OpFault::ModExp(err) => write!(f, "modular exponentiation failed: {err:?}"),
            OpFault::Injected => write!(f, "injected error"),
        }
    }
}

impl From<BusError> for OpFault {
    fn from(err: BusError) -> Self {
        OpFault::Dma(err)
    }
}

impl From<ModExpError> for OpFault {
    fn from(err: ModExpError) -> Self {
        OpFault::ModExp(err)
    }
}

type OpResult<T = ()> = Result<T, OpFault>;

fn fields<R: RegisterLongName>(val: u32) -> LocalRegisterCopy<u32, R> {
    LocalRegisterCopy::new(val)
}

fn words_to_block(words: &[u32]) -> [u8; AES_BLOCK_SIZE] {
    let mut block = [0u8; AES_BLOCK_SIZE];
    for (bytes, word) in block.chunks_exact_mut(4).zip(words) {
        bytes.copy_from_slice(&word.to_le_bytes());
    }
    block
}

fn block_to_words(block: &[u8], words: &mut [u32]) {
    for (word, bytes) in words.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
}

/// Words stored least significant first to a big-endian number
fn words_to_be(words: &[u32]) -> Vec<u8> {
    words.iter().rev().flat_map(|word| word.to_be_bytes()).collect()
}

fn xor_block(block: &mut [u8; AES_BLOCK_SIZE], other: &[u8; AES_BLOCK_SIZE]) {
    block.iter_mut().zip(other).for_each(|(b, o)| *b ^= o);
}

/// Emulated Security Engine
pub struct SecurityEngine {
    regs: Vec<u32>,
    key_table: [[u32; KEY_SLOT_WORDS]; NUM_KEY_SLOTS],
    key_access: [u32; NUM_KEY_SLOTS],
    rsa_keys: [[[u32; se::RSA_OUTPUT_WORDS]; 2]; RSA_KEY_SLOTS],

    /// Secure root key and the CBC chain of context-save output
    srk: [u8; AES_BLOCK_SIZE],
    ctx_chain: [u8; AES_BLOCK_SIZE],
    srk_export: Option<[u32; 4]>,

    pending: Option<Pending>,
    rng_ops: u32,
    reseeds: u32,
    knobs: SeKnobs,
}

impl Default for SecurityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityEngine {
    pub fn new() -> Self {
        let mut regs = vec![0; REG_COUNT];
        regs[(se::SE_SECURITY / 4) as usize] = Security::KEY_SCHED_READ::ENABLE.value;
        Self {
            regs,
            key_table: [[0; KEY_SLOT_WORDS]; NUM_KEY_SLOTS],
            key_access: [KEYTABLE_ACCESS_RESET; NUM_KEY_SLOTS],
            rsa_keys: [[[0; se::RSA_OUTPUT_WORDS]; 2]; RSA_KEY_SLOTS],
            srk: [0; AES_BLOCK_SIZE],
            ctx_chain: [0; AES_BLOCK_SIZE],
            srk_export: None,
            pending: None,
            rng_ops: 0,
            reseeds: 0,
            knobs: SeKnobs::default(),
        }
    }

    pub fn knobs(&self) -> &SeKnobs {
        &self.knobs
    }

    pub fn knobs_mut(&mut self) -> &mut SeKnobs {
        &mut self.knobs
    }

    /// True while an enabled interrupt is pending
    pub fn irq_pending(&self) -> bool {
        self.reg(se::INT_STATUS) & self.reg(se::INT_ENABLE) != 0
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of reseeds serviced through RESTART_IN
    pub fn reseed_count(&self) -> u32 {
        self.reseeds
    }

    /// Key words of `slot`, least significant first
    pub fn key(&self, slot: usize) -> [u32; 8] {
        let mut key = [0u32; 8];
        key.copy_from_slice(&self.key_table[slot][..8]);
        key
    }

    /// Load key words into `slot` the way boot firmware provisions a fused key
    pub fn load_key(&mut self, slot: usize, key: &[u32; 8]) {
        self.key_table[slot][..8].copy_from_slice(key);
    }

    /// SRK handed to the PMC by the last context save, if not yet collected
    pub fn take_srk_export(&mut self) -> Option<[u32; 4]> {
        self.srk_export.take()
    }

    fn reg(&self, offset: u32) -> u32 {
        self.regs[(offset / 4) as usize]
    }

    fn set_reg(&mut self, offset: u32, val: u32) {
        self.regs[(offset / 4) as usize] = val;
    }

    fn set_int(&mut self, bits: u32) {
        self.set_reg(se::INT_STATUS, self.reg(se::INT_STATUS) | bits);
    }

    /// Two 32-bit registers holding a 64-bit count, low word first
    fn reg_u64(&self, offset: u32) -> u64 {
        (self.reg(offset + 4) as u64) << 32 | self.reg(offset) as u64
    }

    fn set_reg_u64(&mut self, offset: u32, val: u64) {
        self.set_reg(offset, val as u32);
        self.set_reg(offset + 4, (val >> 32) as u32);
    }

    fn keytable_access_index(offset: u32) -> Option<usize> {
        let start = se::CRYPTO_KEYTABLE_ACCESS;
        let end = se::keytable_access(NUM_KEY_SLOTS as u32);
        (start..end)
            .contains(&offset)
            .then(|| ((offset - start) / 4) as usize)
    }

    fn check_access(size: RvSize, offset: RvAddr, load: bool) -> Result<(), BusError> {
        let (misaligned, fault) = if load {
            (BusError::LoadAddrMisaligned, BusError::LoadAccessFault)
        } else {
            (BusError::StoreAddrMisaligned, BusError::StoreAccessFault)
        };
        if size != RvSize::Word || offset >= se::BANK_SIZE {
            Err(fault)?
        }
        if offset % 4 != 0 {
            Err(misaligned)?
        }
        Ok(())
    }

    /// Register read at `offset` into the bank
    pub fn read(&self, size: RvSize, offset: RvAddr) -> Result<RvData, BusError> {
        Self::check_access(size, offset, true)?;
        if let Some(slot) = Self::keytable_access_index(offset) {
            return Ok(self.key_access[slot]);
        }
        let val = match offset {
            se::STATUS if self.pending.is_some() => Status::STATE::BUSY.value,
            se::STATUS => Status::STATE::IDLE.value,
            se::RSA_KEYTABLE_DATA => 0,
            _ => self.reg(offset),
        };
        Ok(val)
    }

    /// Register write at `offset` into the bank; `dma` is the engine's view of memory
    pub fn write(
        &mut self,
        size: RvSize,
        offset: RvAddr,
        val: RvData,
        dma: &mut dyn Bus,
    ) -> Result<(), BusError> {
        Self::check_access(size, offset, false)?;
        if let Some(slot) = Self::keytable_access_index(offset) {
            // Access bits can only be cleared
            self.key_access[slot] &= val;
            return Ok(());
        }
        let rsa_output_end = se::RSA_OUTPUT + 4 * se::RSA_OUTPUT_WORDS as u32;
        match offset {
            se::INT_STATUS => self.set_reg(offset, self.reg(offset) & !val),
            se::OPERATION => self.operation(val, dma),
            se::CRYPTO_KEYTABLE_ADDR => {
                self.set_reg(offset, val);
                self.keytable_access(val);
            }
            se::RSA_KEYTABLE_DATA => self.rsa_keytable_write(val),
            se::STATUS => {}
            o if (se::RSA_OUTPUT..rsa_output_end).contains(&o) => {}
            _ => self.set_reg(offset, val),
        }
        Ok(())
    }

    fn keytable_access(&mut self, val: u32) {
        let addr = fields::<KeyTableAddr::Register>(val);
        let slot = addr.read(KeyTableAddr::PKT_KEY_INDEX) as usize;
        let quad = addr.read(KeyTableAddr::PKT_WORD_QUAD) as usize;
        let access = fields::<KeyTableAccess::Register>(self.key_access[slot]);
        let range = quad * 4..quad * 4 + 4;
        let data_index = (se::CRYPTO_KEYTABLE_DATA / 4) as usize;

        if addr.matches_all(KeyTableAddr::OP::WRITE) {
            let locked = quad < ORIGINAL_IV_QUAD
                && !access.is_set(KeyTableAccess::KEYUPDATE)
                && !self.knobs.ignore_key_locks;
            if locked {
                log::debug!("SE key slot {slot} is write locked");
                return;
            }
            let mut data = [0u32; 4];
            data.copy_from_slice(&self.regs[data_index..data_index + 4]);
            self.key_table[slot][range].copy_from_slice(&data);
        } else {
            let readable = quad >= ORIGINAL_IV_QUAD || access.is_set(KeyTableAccess::KEYREAD);
            let mut data = [0u32; 4];
            if readable {
                data.copy_from_slice(&self.key_table[slot][range]);
            }
            self.regs[data_index..data_index + 4].copy_from_slice(&data);
        }
    }

    fn rsa_keytable_write(&mut self, val: u32) {
        let addr = fields::<RsaKeyTableAddr::Register>(self.reg(se::RSA_KEYTABLE_ADDR));
        if !addr.matches_all(RsaKeyTableAddr::OP::WRITE) {
            return;
        }
        let slot = addr.read(RsaKeyTableAddr::KEY_SLOT) as usize;
        let sel = addr.read(RsaKeyTableAddr::EXPMOD_SEL) as usize;
        let word = addr.read(RsaKeyTableAddr::WORD_ADDR) as usize;
        self.rsa_keys[slot][sel][word] = val;
    }

    fn slot_block(&self, slot: usize, quad: usize) -> [u8; AES_BLOCK_SIZE] {
        words_to_block(&self.key_table[slot][quad * 4..quad * 4 + 4])
    }

    fn set_slot_block(&mut self, slot: usize, quad: usize, block: &[u8]) {
        block_to_words(block, &mut self.key_table[slot][quad * 4..quad * 4 + 4]);
    }

    fn operation(&mut self, val: u32, dma: &mut dyn Bus) {
        match fields::<Operation::Register>(val).read_as_enum(Operation::OP) {
            Some(Operation::OP::Value::START) => self.begin(false, dma),
            Some(Operation::OP::Value::CTX_SAVE) => self.begin(true, dma),
            Some(Operation::OP::Value::RESTART_IN) => self.restart_in(dma),
            Some(Operation::OP::Value::ABORT) => self.pending = None,
            _ => self.complete(Err(OpFault::Config("unsupported operation"))),
        }
    }

    fn begin(&mut self, ctx_save: bool, dma: &mut dyn Bus) {
        self.pending = None;
        if self.knobs.stall || (ctx_save && self.knobs.stall_ctx_save) {
            self.pending = Some(Pending::Stalled);
            return;
        }
        if self.knobs.inject_error {
            self.complete(Err(OpFault::Injected));
            return;
        }
        let result = if ctx_save {
            self.ctx_save(dma).map(|_| Progress::Done)
        } else {
            self.start(dma)
        };
        match result {
            Ok(Progress::Waiting) => {}
            Ok(Progress::Done) => self.complete(Ok(())),
            Err(fault) => self.complete(Err(fault)),
        }
    }

    fn complete(&mut self, result: OpResult) {
        self.pending = None;
        match result {
            Ok(()) => self.set_int(Int::SE_OP_DONE::SET.value),
            Err(fault) => {
                log::warn!("SE operation failed: {fault}");
                self.set_int(Int::ERR_STAT::SET.value);
            }
        }
    }

    fn restart_in(&mut self, dma: &mut dyn Bus) {
        if self.pending != Some(Pending::Reseed) {
            log::debug!("SE restart without a pending reseed");
            return;
        }
        let result = self.read_input(AES_BLOCK_SIZE, dma).and_then(|_seed| {
            self.reseeds += 1;
            self.rng_ops = 0;
            self.rng_to_memory(dma)
        });
        self.complete(result);
    }

    fn descriptor(&self, ll_offset: u32, dma: &mut dyn Bus) -> OpResult<LlEntry> {
        let mut entry = LlEntry::new_zeroed();
        dma.read_bytes(self.reg(ll_offset), entry.as_bytes_mut())?;
        Ok(entry)
    }

    fn read_input(&self, nbytes: usize, dma: &mut dyn Bus) -> OpResult<Vec<u8>> {
        let entry = self.descriptor(se::IN_LL_ADDR, dma)?;
        if (entry.size as usize) < nbytes {
            Err(OpFault::Config("input buffer too small"))?
        }
        let mut data = vec![0u8; nbytes];
        dma.read_bytes(entry.addr, &mut data)?;
        Ok(data)
    }

    fn write_output(&self, data: &[u8], dma: &mut dyn Bus) -> OpResult {
        let entry = self.descriptor(se::OUT_LL_ADDR, dma)?;
        if (entry.size as usize) < data.len() {
            Err(OpFault::Config("output buffer too small"))?
        }
        let mut data = data.to_vec();
        if self.knobs.corrupt_output {
            if let Some(byte) = data.first_mut() {
                *byte ^= 1;
            }
        }
        dma.write_bytes(entry.addr, &data)?;
        Ok(())
    }

    /// Bytes covered by CRYPTO_LAST_BLOCK
    fn crypto_nbytes(&self) -> usize {
        (self.reg(se::CRYPTO_LAST_BLOCK) as usize + 1) * AES_BLOCK_SIZE
    }

    fn start(&mut self, dma: &mut dyn Bus) -> OpResult<Progress> {
        let config = fields::<Config::Register>(self.reg(se::CONFIG));
        let enc = config.read_as_enum(Config::ENC_ALG);
        let dec = config.read_as_enum(Config::DEC_ALG);
        match (enc, dec) {
            (Some(Config::ENC_ALG::Value::SHA), _) => self.sha(config, dma)?,
            (Some(Config::ENC_ALG::Value::AES_ENC), _) => {
                self.aes(config.read(Config::ENC_MODE), config, dma)?
            }
            (_, Some(Config::DEC_ALG::Value::AES_DEC)) => {
                self.aes(config.read(Config::DEC_MODE), config, dma)?
            }
            (Some(Config::ENC_ALG::Value::RNG), _) => return self.rng(config, dma),
            (Some(Config::ENC_ALG::Value::RSA), _) => self.rsa(config, dma)?,
            (Some(Config::ENC_ALG::Value::NOP), Some(Config::DEC_ALG::Value::NOP)) => {}
            _ => Err(OpFault::Config("unsupported algorithm"))?,
        }
        Ok(Progress::Done)
    }

    fn sha(
        &mut self,
        config: LocalRegisterCopy<u32, Config::Register>,
        dma: &mut dyn Bus,
    ) -> OpResult {
        let algo = match config.read(Config::ENC_MODE) {
            mode_pkt::SHA1 => ShaAlgo::Sha1,
            mode_pkt::SHA224 => ShaAlgo::Sha224,
            mode_pkt::SHA256 => ShaAlgo::Sha256,
            mode_pkt::SHA384 => ShaAlgo::Sha384,
            mode_pkt::SHA512 => ShaAlgo::Sha512,
            _ => Err(OpFault::Config("unsupported SHA mode"))?,
        };
        let entry = self.descriptor(se::IN_LL_ADDR, dma)?;
        let mut data = vec![0u8; entry.size as usize];
        dma.read_bytes(entry.addr, &mut data)?;

        let msg_length = self.reg_u64(se::SHA_MSG_LENGTH);
        let msg_left = self.reg_u64(se::SHA_MSG_LEFT);
        let chunk_bits = data.len() as u64 * 8;
        if chunk_bits > msg_left {
            Err(OpFault::Config("chunk longer than the message left"))?
        }

        let sha_config = fields::<ShaConfig::Register>(self.reg(se::SHA_CONFIG));
        let mut sha = if sha_config.is_set(ShaConfig::HW_INIT_HASH) {
            Sha::new(algo)
        } else {
            let mut state = [0u32; SHA_STATE_WORDS];
            let base = (se::HASH_RESULT / 4) as usize;
            state.copy_from_slice(&self.regs[base..base + SHA_STATE_WORDS]);
            Sha::with_state(algo, state)
        };
        if chunk_bits == msg_left {
            sha.finish(&data, msg_length as u128);
        } else if data.len() % algo.block_size() != 0 {
            Err(OpFault::Config("partial SHA block before the end of the message"))?
        } else {
            sha.update(&data);
        }

        self.set_reg_u64(se::SHA_MSG_LEFT, msg_left - chunk_bits);
        let base = (se::HASH_RESULT / 4) as usize;
        self.regs[base..base + SHA_STATE_WORDS].copy_from_slice(&sha.state());
        Ok(())
    }

    fn aes(
        &mut self,
        pkt: u32,
        config: LocalRegisterCopy<u32, Config::Register>,
        dma: &mut dyn Bus,
    ) -> OpResult {
        let key_len = match pkt {
            mode_pkt::AES_KEY128 => 16,
            mode_pkt::AES_KEY192 => 24,
            mode_pkt::AES_KEY256 => 32,
            _ => Err(OpFault::Config("unsupported AES key size"))?,
        };
        let crypto = fields::<CryptoConfig::Register>(self.reg(se::CRYPTO_CONFIG));
        let slot = crypto.read(CryptoConfig::KEY_INDEX) as usize;
        let key = key_bytes(&self.key_table[slot][..8]);
        let cipher =
            AesCipher::new(&key[..key_len]).ok_or(OpFault::Config("bad AES key length"))?;
        let encrypt = crypto.matches_all(CryptoConfig::CORE_SEL::ENCRYPT);

        let iv_quad = if crypto.matches_all(CryptoConfig::IV_SELECT::UPDATED) {
            UPDATED_IV_QUAD
        } else {
            ORIGINAL_IV_QUAD
        };
        let mut chain = self.slot_block(slot, iv_quad);
        let xor_pos = crypto.read_as_enum(CryptoConfig::XOR_POS);

        let mut data = self.read_input(self.crypto_nbytes(), dma)?;
        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            let input = block;
            if xor_pos == Some(CryptoConfig::XOR_POS::Value::TOP) {
                xor_block(&mut block, &chain);
            }
            if encrypt {
                cipher.encrypt_block(&mut block);
            } else {
                cipher.decrypt_block(&mut block);
            }
            match xor_pos {
                Some(CryptoConfig::XOR_POS::Value::TOP) => chain = block,
                Some(CryptoConfig::XOR_POS::Value::BOTTOM) => {
                    xor_block(&mut block, &chain);
                    chain = input;
                }
                _ => {}
            }
            chunk.copy_from_slice(&block);
        }
        if xor_pos != Some(CryptoConfig::XOR_POS::Value::BYPASS) {
            self.set_slot_block(slot, UPDATED_IV_QUAD, &chain);
        }

        match config.read_as_enum(Config::DST) {
            Some(Config::DST::Value::MEMORY) => self.write_output(&data, dma),
            Some(Config::DST::Value::HASH_REG) => {
                let last = &data[data.len() - AES_BLOCK_SIZE..];
                let base = (se::HASH_RESULT / 4) as usize;
                block_to_words(last, &mut self.regs[base..base + 4]);
                Ok(())
            }
            _ => Err(OpFault::Config("unsupported AES destination")),
        }
    }

    fn rng(
        &mut self,
        config: LocalRegisterCopy<u32, Config::Register>,
        dma: &mut dyn Bus,
    ) -> OpResult<Progress> {
        match config.read_as_enum(Config::DST) {
            Some(Config::DST::Value::MEMORY) => {
                if let Some(limit) = self.knobs.reseed_after {
                    if self.rng_ops >= limit {
                        self.pending = Some(Pending::Reseed);
                        self.set_int(Int::RESEED_CNTR_EXHAUSTED::SET.value);
                        return Ok(Progress::Waiting);
                    }
                }
                self.rng_to_memory(dma)?;
            }
            Some(Config::DST::Value::KEYTABLE) => {
                let dst = fields::<KeyTableDst::Register>(self.reg(se::CRYPTO_KEYTABLE_DST));
                let slot = dst.read(KeyTableDst::KEY_INDEX) as usize;
                let quad = dst.read(KeyTableDst::WORD_QUAD) as usize;
                let mut block = [0u8; AES_BLOCK_SIZE];
                rand::thread_rng().fill_bytes(&mut block);
                self.set_slot_block(slot, quad, &block);
            }
            Some(Config::DST::Value::SRK) => {
                rand::thread_rng().fill_bytes(&mut self.srk);
                self.ctx_chain = [0; AES_BLOCK_SIZE];
            }
            _ => Err(OpFault::Config("unsupported RNG destination"))?,
        }
        Ok(Progress::Done)
    }

    fn rng_to_memory(&mut self, dma: &mut dyn Bus) -> OpResult {
        self.rng_ops += 1;
        let mut data = vec![0u8; self.crypto_nbytes()];
        rand::thread_rng().fill_bytes(&mut data);
        self.write_output(&data, dma)
    }

    fn rsa(
        &mut self,
        config: LocalRegisterCopy<u32, Config::Register>,
        dma: &mut dyn Bus,
    ) -> OpResult {
        let slot = fields::<RsaConfig::Register>(self.reg(se::RSA_CONFIG))
            .read(RsaConfig::KEY_SLOT) as usize;
        let nbytes = (self.reg(se::RSA_KEY_SIZE) as usize + 1) * 8;
        let exp_words = self.reg(se::RSA_EXP_SIZE) as usize;
        if nbytes > RSA_MAX_BYTES || exp_words == 0 || exp_words > se::RSA_OUTPUT_WORDS {
            Err(OpFault::Config("unsupported RSA key size"))?
        }

        let mut input = self.read_input(nbytes, dma)?;
        input.reverse();
        let key = &self.rsa_keys[slot];
        let modulus = words_to_be(&key[RSA_MODULUS][..nbytes / 4]);
        let exponent = words_to_be(&key[RSA_EXPONENT][..exp_words]);
        let mut result = vec![0u8; nbytes];
        mod_exp(&input, &exponent, &modulus, &mut result)?;

        match config.read_as_enum(Config::DST) {
            Some(Config::DST::Value::MEMORY) => {
                result.reverse();
                self.write_output(&result, dma)
            }
            Some(Config::DST::Value::RSA_REG) => {
                let base = (se::RSA_OUTPUT / 4) as usize;
                let out = &mut self.regs[base..base + se::RSA_OUTPUT_WORDS];
                out.fill(0);
                for (word, bytes) in out.iter_mut().zip(result.rchunks(4)) {
                    *word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
                Ok(())
            }
            _ => Err(OpFault::Config("unsupported RSA destination")),
        }
    }

    fn sticky_words(&self) -> [u32; STICKY_WORDS] {
        let mut words = [0u32; STICKY_WORDS];
        words[0] = self.reg(se::SE_SECURITY);
        for (i, access) in self.key_access.iter().enumerate() {
            words[1 + i / 4] |= (access & 0xff) << (8 * (i % 4));
        }
        words
    }

    fn ctx_save(&mut self, dma: &mut dyn Bus) -> OpResult {
        let cfg = fields::<CtxSaveConfig::Register>(self.reg(se::CTX_SAVE_CONFIG));
        let mut block = match cfg.read_as_enum(CtxSaveConfig::SRC) {
            Some(CtxSaveConfig::SRC::Value::STICKY_BITS) => {
                let quad = cfg.read(CtxSaveConfig::STICKY_WORD_QUAD) as usize;
                words_to_block(&self.sticky_words()[quad * 4..quad * 4 + 4])
            }
            Some(CtxSaveConfig::SRC::Value::AES_KEYTABLE) => self.slot_block(
                cfg.read(CtxSaveConfig::AES_KEY_INDEX) as usize,
                cfg.read(CtxSaveConfig::AES_WORD_QUAD) as usize,
            ),
            Some(CtxSaveConfig::SRC::Value::RSA_KEYTABLE) => {
                let index = cfg.read(CtxSaveConfig::RSA_KEY_INDEX) as usize;
                let quad = cfg.read(CtxSaveConfig::RSA_WORD_QUAD) as usize;
                words_to_block(&self.rsa_keys[index / 2][index % 2][quad * 4..quad * 4 + 4])
            }
            Some(CtxSaveConfig::SRC::Value::MEM) => {
                let mut block = [0u8; AES_BLOCK_SIZE];
                block.copy_from_slice(&self.read_input(AES_BLOCK_SIZE, dma)?);
                block
            }
            Some(CtxSaveConfig::SRC::Value::SRK) => {
                let mut words = [0u32; 4];
                block_to_words(&self.srk, &mut words);
                self.srk_export = Some(words);
                return Ok(());
            }
            None => Err(OpFault::Config("unsupported context save source"))?,
        };

        let cipher = AesCipher::new(&self.srk).ok_or(OpFault::Config("bad SRK"))?;
        xor_block(&mut block, &self.ctx_chain);
        cipher.encrypt_block(&mut block);
        self.ctx_chain = block;
        self.write_output(&block, dma)
    }
}

fn key_bytes(words: &[u32]) -> [u8; 32] {
    let mut key = [0u8; 32];
    for (bytes, word) in key.chunks_exact_mut(4).zip(words) {
        bytes.copy_from_slice(&word.to_le_bytes());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use tegra_se_emu_bus::Ram;

    const IN_LL: u32 = 0x00;
    const OUT_LL: u32 = 0x10;
    const IN_BUF: u32 = 0x100;
    const OUT_BUF: u32 = 0x800;

    fn program(ram: &mut Ram, ll: u32, addr: u32, size: usize) {
        let entry = LlEntry {
            last_buff_num: 0,
            addr,
            size: size as u32,
        };
        ram.write_bytes(ll, entry.as_bytes()).unwrap();
    }

    fn write(se: &mut SecurityEngine, ram: &mut Ram, offset: u32, val: u32) {
        se.write(RvSize::Word, offset, val, ram).unwrap();
    }

    fn read(se: &SecurityEngine, offset: u32) -> u32 {
        se.read(RvSize::Word, offset).unwrap()
    }

    fn set_key(se: &mut SecurityEngine, ram: &mut Ram, slot: u32, key: &[u8]) {
        for (quad, chunk) in key.chunks(16).enumerate() {
            let mut words = [0u32; 4];
            block_to_words(chunk, &mut words);
            for (i, word) in words.iter().enumerate() {
                write(se, ram, se::CRYPTO_KEYTABLE_DATA + 4 * i as u32, *word);
            }
            let addr = KeyTableAddr::OP::WRITE
                + KeyTableAddr::PKT_KEY_INDEX.val(slot)
                + KeyTableAddr::PKT_WORD_QUAD.val(quad as u32);
            write(se, ram, se::CRYPTO_KEYTABLE_ADDR, addr.value);
        }
    }

    fn start(se: &mut SecurityEngine, ram: &mut Ram) {
        write(se, ram, se::OPERATION, Operation::OP::START.value);
    }

    #[test]
    fn test_register_access() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x1000);
        assert_eq!(
            se.read(RvSize::Byte, se::CONFIG),
            Err(BusError::LoadAccessFault)
        );
        assert_eq!(
            se.read(RvSize::Word, se::CONFIG + 2),
            Err(BusError::LoadAddrMisaligned)
        );
        assert_eq!(
            se.write(RvSize::Word, se::BANK_SIZE, 0, &mut ram),
            Err(BusError::StoreAccessFault)
        );
        write(&mut se, &mut ram, se::CONFIG, 0x1234);
        assert_eq!(read(&se, se::CONFIG), 0x1234);
        assert_eq!(read(&se, se::STATUS), Status::STATE::IDLE.value);
    }

    #[test]
    fn test_int_status_write_one_to_clear() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x100);
        write(&mut se, &mut ram, se::CONFIG, 0);
        start(&mut se, &mut ram);
        assert_eq!(read(&se, se::INT_STATUS), Int::SE_OP_DONE::SET.value);
        assert!(!se.irq_pending());

        write(&mut se, &mut ram, se::INT_ENABLE, Int::SE_OP_DONE::SET.value);
        assert!(se.irq_pending());
        write(&mut se, &mut ram, se::INT_STATUS, Int::SE_OP_DONE::SET.value);
        assert_eq!(read(&se, se::INT_STATUS), 0);
    }

    #[test]
    fn test_aes_ecb_encrypt() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x1000);
        let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        set_key(&mut se, &mut ram, 3, &key);

        let plaintext = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        ram.write_bytes(IN_BUF, &plaintext).unwrap();
        program(&mut ram, IN_LL, IN_BUF, 16);
        program(&mut ram, OUT_LL, OUT_BUF, 16);
        write(&mut se, &mut ram, se::IN_LL_ADDR, IN_LL);
        write(&mut se, &mut ram, se::OUT_LL_ADDR, OUT_LL);
        write(&mut se, &mut ram, se::CRYPTO_LAST_BLOCK, 0);
        let config = Config::ENC_MODE.val(mode_pkt::AES_KEY128)
            + Config::ENC_ALG::AES_ENC
            + Config::DST::MEMORY;
        write(&mut se, &mut ram, se::CONFIG, config.value);
        let crypto = CryptoConfig::CORE_SEL::ENCRYPT + CryptoConfig::KEY_INDEX.val(3);
        write(&mut se, &mut ram, se::CRYPTO_CONFIG, crypto.value);
        start(&mut se, &mut ram);

        let mut out = [0u8; 16];
        ram.read_bytes(OUT_BUF, &mut out).unwrap();
        assert_eq!(hex::encode(out), "69c4e0d86a7b0430d8cdb78070b4c55a");
        assert_eq!(read(&se, se::INT_STATUS), Int::SE_OP_DONE::SET.value);
    }

    #[test]
    fn test_key_write_lock() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x100);
        set_key(&mut se, &mut ram, 5, &[0x11; 16]);
        let access = se::keytable_access(5);
        write(&mut se, &mut ram, access, KeyTableAccess::KEYREAD::SET.value);
        set_key(&mut se, &mut ram, 5, &[0x22; 16]);
        assert_eq!(se.key(5)[0], 0x1111_1111);

        // Cleared access bits stay cleared
        write(&mut se, &mut ram, access, KEYTABLE_ACCESS_RESET);
        assert!(!fields::<KeyTableAccess::Register>(read(&se, access))
            .is_set(KeyTableAccess::KEYUPDATE));

        se.knobs_mut().ignore_key_locks = true;
        set_key(&mut se, &mut ram, 5, &[0x22; 16]);
        assert_eq!(se.key(5)[0], 0x2222_2222);
    }

    #[test]
    fn test_sha_single_chunk() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x1000);
        ram.write_bytes(IN_BUF, b"abc").unwrap();
        program(&mut ram, IN_LL, IN_BUF, 3);
        write(&mut se, &mut ram, se::IN_LL_ADDR, IN_LL);
        let config = Config::ENC_MODE.val(mode_pkt::SHA256)
            + Config::ENC_ALG::SHA
            + Config::DST::HASH_REG;
        write(&mut se, &mut ram, se::CONFIG, config.value);
        write(&mut se, &mut ram, se::SHA_CONFIG, ShaConfig::HW_INIT_HASH::SET.value);
        write(&mut se, &mut ram, se::SHA_MSG_LENGTH, 24);
        write(&mut se, &mut ram, se::SHA_MSG_LEFT, 24);
        start(&mut se, &mut ram);

        assert_eq!(read(&se, se::SHA_MSG_LEFT), 0);
        assert_eq!(read(&se, se::HASH_RESULT), 0xba7816bf);
        assert_eq!(read(&se, se::HASH_RESULT + 28), 0xf20015ad);
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(
            OpFault::Config("bad SRK").to_string(),
            "bad configuration: bad SRK"
        );
        assert_eq!(OpFault::Injected.to_string(), "injected error");
        assert!(OpFault::Dma(BusError::LoadAccessFault)
            .to_string()
            .starts_with("DMA access failed"));
    }

    #[test]
    fn test_stall_and_injected_error() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x100);
        se.knobs_mut().stall = true;
        start(&mut se, &mut ram);
        assert_eq!(read(&se, se::STATUS), Status::STATE::BUSY.value);

        se.knobs_mut().stall = false;
        se.knobs_mut().inject_error = true;
        start(&mut se, &mut ram);
        assert_eq!(read(&se, se::STATUS), Status::STATE::IDLE.value);
        assert_eq!(read(&se, se::INT_STATUS), Int::ERR_STAT::SET.value);
    }

    #[test]
    fn test_rng_reseed() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x1000);
        se.knobs_mut().reseed_after = Some(0);
        program(&mut ram, IN_LL, IN_BUF, 16);
        program(&mut ram, OUT_LL, OUT_BUF, 32);
        write(&mut se, &mut ram, se::OUT_LL_ADDR, OUT_LL);
        write(&mut se, &mut ram, se::CRYPTO_LAST_BLOCK, 1);
        let config = Config::ENC_ALG::RNG + Config::DST::MEMORY;
        write(&mut se, &mut ram, se::CONFIG, config.value);
        start(&mut se, &mut ram);
        assert!(se.is_busy());
        assert_eq!(
            read(&se, se::INT_STATUS),
            Int::RESEED_CNTR_EXHAUSTED::SET.value
        );

        write(&mut se, &mut ram, se::IN_LL_ADDR, IN_LL);
        write(&mut se, &mut ram, se::OPERATION, Operation::OP::RESTART_IN.value);
        assert!(!se.is_busy());
        assert_eq!(se.reseed_count(), 1);
        assert!(fields::<Int::Register>(read(&se, se::INT_STATUS)).is_set(Int::SE_OP_DONE));
    }

    #[test]
    fn test_rsa_even_modulus_fails() {
        let mut se = SecurityEngine::new();
        let mut ram = Ram::new(0x1000);
        for i in 0..16 {
            let addr = RsaKeyTableAddr::OP::WRITE
                + RsaKeyTableAddr::EXPMOD_SEL::MODULUS
                + RsaKeyTableAddr::WORD_ADDR.val(i);
            write(&mut se, &mut ram, se::RSA_KEYTABLE_ADDR, addr.value);
            write(&mut se, &mut ram, se::RSA_KEYTABLE_DATA, 0xffff_fffe);
        }
        write(&mut se, &mut ram, se::RSA_KEYTABLE_ADDR, RsaKeyTableAddr::OP::WRITE.value);
        write(&mut se, &mut ram, se::RSA_KEYTABLE_DATA, 3);
        write(&mut se, &mut ram, se::RSA_EXP_SIZE, 1);
        program(&mut ram, IN_LL, IN_BUF, 64);
        program(&mut ram, OUT_LL, OUT_BUF, 64);
        write(&mut se, &mut ram, se::IN_LL_ADDR, IN_LL);
        write(&mut se, &mut ram, se::OUT_LL_ADDR, OUT_LL);
        write(&mut se, &mut ram, se::RSA_KEY_SIZE, 7);
        let config = Config::ENC_ALG::RSA + Config::DST::MEMORY;
        write(&mut se, &mut ram, se::CONFIG, config.value);
        start(&mut se, &mut ram);
        assert_eq!(read(&se, se::INT_STATUS), Int::ERR_STAT::SET.value);
    }
}
