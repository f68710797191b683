/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains register offsets and bitfield definitions for the
    Security Engine and the PMC scratch registers it uses.

--*/
#![no_std]

use tock_registers::register_bitfields;

/// Security Engine register offsets
pub mod se {
    pub const SE_SECURITY: u32 = 0x000;
    pub const OPERATION: u32 = 0x008;
    pub const INT_ENABLE: u32 = 0x00C;
    pub const INT_STATUS: u32 = 0x010;
    pub const CONFIG: u32 = 0x014;
    pub const IN_LL_ADDR: u32 = 0x018;
    pub const OUT_LL_ADDR: u32 = 0x024;

    /// First of 16 hash result words
    pub const HASH_RESULT: u32 = 0x030;
    pub const HASH_RESULT_WORDS: usize = 16;

    pub const CTX_SAVE_CONFIG: u32 = 0x070;

    pub const SHA_CONFIG: u32 = 0x200;
    /// First of 4 message length words, least significant first
    pub const SHA_MSG_LENGTH: u32 = 0x204;
    /// First of 4 message left words, least significant first
    pub const SHA_MSG_LEFT: u32 = 0x214;
    pub const SHA_MSG_WORDS: usize = 4;

    /// First of 16 per-slot key access registers
    pub const CRYPTO_KEYTABLE_ACCESS: u32 = 0x284;
    pub const CRYPTO_CONFIG: u32 = 0x304;
    pub const CRYPTO_LAST_BLOCK: u32 = 0x318;
    pub const CRYPTO_KEYTABLE_ADDR: u32 = 0x31C;
    /// First of 4 key table data registers
    pub const CRYPTO_KEYTABLE_DATA: u32 = 0x320;
    pub const CRYPTO_KEYTABLE_DATA_WORDS: usize = 4;
    pub const CRYPTO_KEYTABLE_DST: u32 = 0x330;

    pub const RNG_CONFIG: u32 = 0x340;
    pub const RNG_SRC_CONFIG: u32 = 0x344;
    pub const RNG_RESEED_INTERVAL: u32 = 0x348;

    pub const RSA_CONFIG: u32 = 0x400;
    pub const RSA_KEY_SIZE: u32 = 0x404;
    pub const RSA_EXP_SIZE: u32 = 0x408;
    pub const RSA_KEYTABLE_ADDR: u32 = 0x420;
    pub const RSA_KEYTABLE_DATA: u32 = 0x424;
    /// First of 64 RSA output words, least significant first
    pub const RSA_OUTPUT: u32 = 0x428;
    pub const RSA_OUTPUT_WORDS: usize = 64;

    pub const STATUS: u32 = 0x800;

    /// Size of the register bank
    pub const BANK_SIZE: u32 = 0x1000;

    /// Largest value CRYPTO_LAST_BLOCK can hold plus one
    pub const MAX_LAST_BLOCK: u32 = 0xFFFFF;

    /// Register offset of `CRYPTO_KEYTABLE_ACCESS` for a slot
    pub const fn keytable_access(slot: u32) -> u32 {
        CRYPTO_KEYTABLE_ACCESS + slot * 4
    }
}

/// PMC register offsets
pub mod pmc {
    /// First of 4 secure scratch words holding the SSK
    pub const SECURE_SCRATCH0: u32 = 0x0C0;
    /// First of 4 secure scratch words holding the SRK
    pub const SECURE_SCRATCH4: u32 = 0x0D0;
    /// Bus address of the encrypted SE context
    pub const SCRATCH43: u32 = 0x22C;

    pub const BANK_SIZE: u32 = 0x400;
}

/// Mode packet values written to `CONFIG.ENC_MODE`/`CONFIG.DEC_MODE`
pub mod mode_pkt {
    pub const AES_KEY128: u32 = 0;
    pub const AES_KEY192: u32 = 1;
    pub const AES_KEY256: u32 = 2;

    pub const SHA1: u32 = 0;
    pub const SHA224: u32 = 4;
    pub const SHA256: u32 = 5;
    pub const SHA384: u32 = 6;
    pub const SHA512: u32 = 7;
}

register_bitfields! [
    u32,

    /// SE_SECURITY Register Fields
    pub Security [
        KEY_SCHED_READ OFFSET(3) NUMBITS(1) [
            DISABLE = 0,
            ENABLE = 1,
        ],
    ],

    /// OPERATION Register Fields
    pub Operation [
        OP OFFSET(0) NUMBITS(3) [
            ABORT = 0,
            START = 1,
            RESTART_OUT = 2,
            CTX_SAVE = 3,
            RESTART_IN = 4,
        ],
    ],

    /// INT_ENABLE and INT_STATUS Register Fields
    pub Int [
        IN_LL_BUF_RD OFFSET(0) NUMBITS(1) [],
        IN_DONE OFFSET(1) NUMBITS(1) [],
        OUT_LL_BUF_WR OFFSET(2) NUMBITS(1) [],
        OUT_DONE OFFSET(3) NUMBITS(1) [],
        SE_OP_DONE OFFSET(4) NUMBITS(1) [],
        RESEED_CNTR_EXHAUSTED OFFSET(5) NUMBITS(1) [],
        ERR_STAT OFFSET(16) NUMBITS(1) [],
    ],

    /// CONFIG Register Fields
    pub Config [
        DST OFFSET(2) NUMBITS(3) [
            MEMORY = 0,
            HASH_REG = 1,
            KEYTABLE = 2,
            SRK = 3,
            RSA_REG = 4,
        ],
        DEC_ALG OFFSET(8) NUMBITS(4) [
            NOP = 0,
            AES_DEC = 1,
        ],
        ENC_ALG OFFSET(12) NUMBITS(4) [
            NOP = 0,
            AES_ENC = 1,
            RNG = 2,
            SHA = 3,
            RSA = 4,
        ],
        DEC_MODE OFFSET(16) NUMBITS(8) [],
        ENC_MODE OFFSET(24) NUMBITS(8) [],
    ],

    /// CTX_SAVE_CONFIG Register Fields
    pub CtxSaveConfig [
        AES_WORD_QUAD OFFSET(0) NUMBITS(2) [
            KEYS_0_3 = 0,
            KEYS_4_7 = 1,
            ORIGINAL_IVS = 2,
            UPDATED_IVS = 3,
        ],
        AES_KEY_INDEX OFFSET(8) NUMBITS(4) [],
        RSA_WORD_QUAD OFFSET(12) NUMBITS(4) [],
        RSA_KEY_INDEX OFFSET(16) NUMBITS(2) [
            SLOT0_EXPONENT = 0,
            SLOT0_MODULUS = 1,
            SLOT1_EXPONENT = 2,
            SLOT1_MODULUS = 3,
        ],
        STICKY_WORD_QUAD OFFSET(24) NUMBITS(1) [
            WORDS_0_3 = 0,
            WORDS_4_7 = 1,
        ],
        SRC OFFSET(29) NUMBITS(3) [
            STICKY_BITS = 0,
            RSA_KEYTABLE = 1,
            AES_KEYTABLE = 2,
            MEM = 4,
            SRK = 6,
        ],
    ],

    /// SHA_CONFIG Register Fields
    pub ShaConfig [
        HW_INIT_HASH OFFSET(0) NUMBITS(1) [],
    ],

    /// CRYPTO_KEYTABLE_ACCESS Register Fields
    pub KeyTableAccess [
        KEYREAD OFFSET(0) NUMBITS(1) [],
        KEYUPDATE OFFSET(1) NUMBITS(1) [
            DISABLE = 0,
            ENABLE = 1,
        ],
    ],

    /// CRYPTO_CONFIG Register Fields
    pub CryptoConfig [
        HASH_ENB OFFSET(0) NUMBITS(1) [],
        XOR_POS OFFSET(1) NUMBITS(2) [
            BYPASS = 0,
            TOP = 2,
            BOTTOM = 3,
        ],
        INPUT_SEL OFFSET(3) NUMBITS(2) [
            AHB = 0,
            RANDOM = 1,
        ],
        VCTRAM_SEL OFFSET(5) NUMBITS(2) [
            MEMORY = 0,
            AESOUT = 2,
            PREVAHB = 3,
        ],
        IV_SELECT OFFSET(7) NUMBITS(1) [
            ORIGINAL = 0,
            UPDATED = 1,
        ],
        CORE_SEL OFFSET(8) NUMBITS(1) [
            DECRYPT = 0,
            ENCRYPT = 1,
        ],
        KEY_INDEX OFFSET(24) NUMBITS(4) [],
    ],

    /// CRYPTO_KEYTABLE_ADDR Register Fields
    ///
    /// Word quads 2 and 3 select the IV half of a slot.
    pub KeyTableAddr [
        PKT_WORD_QUAD OFFSET(2) NUMBITS(2) [
            KEYS_0_3 = 0,
            KEYS_4_7 = 1,
            ORIGINAL_IVS = 2,
            UPDATED_IVS = 3,
        ],
        PKT_KEY_INDEX OFFSET(4) NUMBITS(4) [],
        TABLE_SEL OFFSET(8) NUMBITS(1) [
            KEYIV = 0,
        ],
        OP OFFSET(9) NUMBITS(1) [
            READ = 0,
            WRITE = 1,
        ],
    ],

    /// CRYPTO_KEYTABLE_DST Register Fields
    pub KeyTableDst [
        WORD_QUAD OFFSET(0) NUMBITS(2) [
            KEYS_0_3 = 0,
            KEYS_4_7 = 1,
        ],
        KEY_INDEX OFFSET(8) NUMBITS(4) [],
    ],

    /// RNG_CONFIG Register Fields
    pub RngConfig [
        MODE OFFSET(0) NUMBITS(2) [
            NORMAL = 0,
            FORCE_INSTANTIATION = 1,
            FORCE_RESEED = 2,
        ],
        SRC OFFSET(2) NUMBITS(2) [
            NONE = 0,
            ENTROPY = 1,
            LFSR = 2,
        ],
    ],

    /// RSA_KEYTABLE_ADDR Register Fields
    pub RsaKeyTableAddr [
        WORD_ADDR OFFSET(0) NUMBITS(6) [],
        EXPMOD_SEL OFFSET(6) NUMBITS(1) [
            EXPONENT = 0,
            MODULUS = 1,
        ],
        KEY_SLOT OFFSET(7) NUMBITS(1) [],
        INPUT_MODE OFFSET(8) NUMBITS(1) [
            REGISTER = 0,
            DMA = 1,
        ],
        OP OFFSET(10) NUMBITS(1) [
            READ = 0,
            WRITE = 1,
        ],
    ],

    /// RSA_CONFIG Register Fields
    pub RsaConfig [
        KEY_SLOT OFFSET(24) NUMBITS(1) [],
    ],

    /// STATUS Register Fields
    pub Status [
        STATE OFFSET(0) NUMBITS(2) [
            IDLE = 0,
            BUSY = 1,
            WAIT_OUT = 2,
            WAIT_IN = 3,
        ],
    ],
];
