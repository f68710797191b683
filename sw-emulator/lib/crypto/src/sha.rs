/*++

Licensed under the Apache-2.0 license.

File Name:

    sha.rs

Abstract:

    File contains the SHA-1 and SHA-2 compression the emulated engine runs.
    State is kept the way the engine's hash result registers hold it.

--*/

use crate::helpers::{pairs_to_u64, u64_to_pairs};
use sha2::digest::block_buffer::Block;
use sha2::digest::consts::{U128, U64};

/// Number of 32-bit words of hash state
pub const SHA_STATE_WORDS: usize = 16;

/// Hash algorithm
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaAlgo {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl ShaAlgo {
    /// Block size in bytes
    pub fn block_size(&self) -> usize {
        match self {
            ShaAlgo::Sha1 | ShaAlgo::Sha224 | ShaAlgo::Sha256 => 64,
            ShaAlgo::Sha384 | ShaAlgo::Sha512 => 128,
        }
    }

    /// Digest size in bytes
    pub fn digest_size(&self) -> usize {
        match self {
            ShaAlgo::Sha1 => 20,
            ShaAlgo::Sha224 => 28,
            ShaAlgo::Sha256 => 32,
            ShaAlgo::Sha384 => 48,
            ShaAlgo::Sha512 => 64,
        }
    }

    /// Size of the message length trailer
    fn length_size(&self) -> usize {
        self.block_size() / 8
    }

    fn is_sha512_family(&self) -> bool {
        matches!(self, ShaAlgo::Sha384 | ShaAlgo::Sha512)
    }
}

/// SHA-1 initial hash
#[cfg_attr(rustfmt, rustfmt_skip)]
const SHA1_IV: [u32; 5] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476, 0xc3d2e1f0];

/// SHA-224 initial hash
#[cfg_attr(rustfmt, rustfmt_skip)]
const SHA224_IV: [u32; 8] = [
    0xc1059ed8, 0x367cd507, 0x3070dd17, 0xf70e5939,
    0xffc00b31, 0x68581511, 0x64f98fa7, 0xbefa4fa4,
];

/// SHA-256 initial hash
#[cfg_attr(rustfmt, rustfmt_skip)]
const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a,
    0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// SHA-384 initial hash
#[cfg_attr(rustfmt, rustfmt_skip)]
const SHA384_IV: [u64; 8] = [
    0xcbbb9d5dc1059ed8, 0x629a292a367cd507, 0x9159015a3070dd17, 0x152fecd8f70e5939,
    0x67332667ffc00b31, 0x8eb44a8768581511, 0xdb0c2e0d64f98fa7, 0x47b5481dbefa4fa4,
];

/// SHA-512 initial hash
#[cfg_attr(rustfmt, rustfmt_skip)]
const SHA512_IV: [u64; 8] = [
    0x6a09e667f3bcc908, 0xbb67ae8584caa73b, 0x3c6ef372fe94f82b, 0xa54ff53a5f1d36f1,
    0x510e527fade682d1, 0x9b05688c2b3e6c1f, 0x1f83d9abfb41bd6b, 0x5be0cd19137e2179,
];

/// Resumable hash computation
#[derive(Debug, Clone)]
pub struct Sha {
    algo: ShaAlgo,

    /// Hash state; 64-bit state words are split low word first
    state: [u32; SHA_STATE_WORDS],
}

impl Sha {
    /// Start a new hash with the algorithm's initial value
    pub fn new(algo: ShaAlgo) -> Self {
        let mut state = [0u32; SHA_STATE_WORDS];
        match algo {
            ShaAlgo::Sha1 => state[..5].copy_from_slice(&SHA1_IV),
            ShaAlgo::Sha224 => state[..8].copy_from_slice(&SHA224_IV),
            ShaAlgo::Sha256 => state[..8].copy_from_slice(&SHA256_IV),
            ShaAlgo::Sha384 => u64_to_pairs(&SHA384_IV, &mut state),
            ShaAlgo::Sha512 => u64_to_pairs(&SHA512_IV, &mut state),
        }
        Self { algo, state }
    }

    /// Resume from an intermediate state
    pub fn with_state(algo: ShaAlgo, state: [u32; SHA_STATE_WORDS]) -> Self {
        Self { algo, state }
    }

    pub fn algo(&self) -> ShaAlgo {
        self.algo
    }

    pub fn state(&self) -> [u32; SHA_STATE_WORDS] {
        self.state
    }

    /// Compress every whole block of `data`; a trailing partial block is ignored
    pub fn update(&mut self, data: &[u8]) {
        for block in data.chunks_exact(self.algo.block_size()) {
            self.compress(block);
        }
    }

    /// Hash the last part of a message of `total_bits` bits, padding included
    pub fn finish(&mut self, data: &[u8], total_bits: u128) {
        let block_size = self.algo.block_size();
        let whole = data.len() - data.len() % block_size;
        self.update(&data[..whole]);

        let length_size = self.algo.length_size();
        let mut tail = data[whole..].to_vec();
        tail.push(0x80);
        while (tail.len() + length_size) % block_size != 0 {
            tail.push(0);
        }
        tail.extend_from_slice(&total_bits.to_be_bytes()[16 - length_size..]);
        self.update(&tail);
    }

    /// Big-endian digest of the current state
    pub fn digest(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        if self.algo.is_sha512_family() {
            let mut hash = [0u64; 8];
            pairs_to_u64(&self.state, &mut hash);
            hash.iter().for_each(|word| out.extend_from_slice(&word.to_be_bytes()));
        } else {
            self.state
                .iter()
                .for_each(|word| out.extend_from_slice(&word.to_be_bytes()));
        }
        out.truncate(self.algo.digest_size());
        out
    }

    /// One-shot digest of `data`
    pub fn hash(algo: ShaAlgo, data: &[u8]) -> Vec<u8> {
        let mut sha = Self::new(algo);
        sha.finish(data, data.len() as u128 * 8);
        sha.digest()
    }

    fn compress(&mut self, block: &[u8]) {
        match self.algo {
            ShaAlgo::Sha1 => {
                let mut hash = [0u32; 5];
                hash.copy_from_slice(&self.state[..5]);
                sha1_compress(&mut hash, block);
                self.state[..5].copy_from_slice(&hash);
            }
            ShaAlgo::Sha224 | ShaAlgo::Sha256 => {
                let mut hash = [0u32; 8];
                hash.copy_from_slice(&self.state[..8]);
                let block = *Block::<U64>::from_slice(block);
                sha2::compress256(&mut hash, &[block]);
                self.state[..8].copy_from_slice(&hash);
            }
            ShaAlgo::Sha384 | ShaAlgo::Sha512 => {
                let mut hash = [0u64; 8];
                pairs_to_u64(&self.state, &mut hash);
                let block = *Block::<U128>::from_slice(block);
                sha2::compress512(&mut hash, &[block]);
                u64_to_pairs(&hash, &mut self.state);
            }
        }
    }
}

/// SHA-1 block compression as described in RFC 3174
fn sha1_compress(hash: &mut [u32; 5], block: &[u8]) {
    const K: [u32; 4] = [0x5a827999, 0x6ed9eba1, 0x8f1bbcdc, 0xca62c1d6];
    let mut w = [0u32; 80];
    for (word, bytes) in w.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    for idx in 16..80 {
        w[idx] = (w[idx - 3] ^ w[idx - 8] ^ w[idx - 14] ^ w[idx - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *hash;
    for (idx, word) in w.iter().enumerate() {
        let (f, k) = match idx / 20 {
            0 => ((b & c) | (!b & d), K[0]),
            1 => (b ^ c ^ d, K[1]),
            2 => ((b & c) | (b & d) | (c & d), K[2]),
            _ => (b ^ c ^ d, K[3]),
        };
        let temp = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(*word)
            .wrapping_add(k);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    for (h, v) in hash.iter_mut().zip([a, b, c, d, e]) {
        *h = h.wrapping_add(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abc() {
        let cases = [
            (ShaAlgo::Sha1, "a9993e364706816aba3e25717850c26c9cd0d89d"),
            (
                ShaAlgo::Sha224,
                "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7",
            ),
            (
                ShaAlgo::Sha256,
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            ),
            (
                ShaAlgo::Sha384,
                "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
                 8086072ba1e7cc2358baeca134c825a7",
            ),
            (
                ShaAlgo::Sha512,
                "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                 2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f",
            ),
        ];
        for (algo, expected) in cases {
            assert_eq!(hex::encode(Sha::hash(algo, b"abc")), expected, "{algo:?}");
        }
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(
            hex::encode(Sha::hash(ShaAlgo::Sha1, b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            hex::encode(Sha::hash(ShaAlgo::Sha256, b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_resume_from_state() {
        let data = [0x5au8; 300];
        for algo in [ShaAlgo::Sha1, ShaAlgo::Sha256, ShaAlgo::Sha512] {
            let split = algo.block_size();
            let mut first = Sha::new(algo);
            first.update(&data[..split]);

            let mut second = Sha::with_state(algo, first.state());
            second.finish(&data[split..], data.len() as u128 * 8);
            assert_eq!(second.digest(), Sha::hash(algo, &data), "{algo:?}");
        }
    }

    #[test]
    fn test_two_block_padding() {
        // 56 bytes leaves no room for the length in the first block
        let msg = b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq";
        assert_eq!(
            hex::encode(Sha::hash(ShaAlgo::Sha256, msg)),
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
        );
    }
}
