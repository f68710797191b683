/*++

Licensed under the Apache-2.0 license.

File Name:

    helpers.rs

Abstract:

    File contains conversions between 64-bit values and the pairs of 32-bit
    registers holding them, least significant word first.

--*/

/// Split `vals` into `(low, high)` word pairs
pub fn u64_to_pairs(vals: &[u64], words: &mut [u32]) {
    for (val, pair) in vals.iter().zip(words.chunks_exact_mut(2)) {
        pair[0] = *val as u32;
        pair[1] = (*val >> 32) as u32;
    }
}

/// Join `(low, high)` word pairs into `vals`
pub fn pairs_to_u64(words: &[u32], vals: &mut [u64]) {
    for (val, pair) in vals.iter_mut().zip(words.chunks_exact(2)) {
        *val = (pair[1] as u64) << 32 | pair[0] as u64;
    }
}
