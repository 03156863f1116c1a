//! 64-bit SimHash fingerprinting and Hamming-distance near-duplicate tests.
//!
//! Content is normalized with [`canonical::normalize`] before tokenization so
//! that two texts differing only in case, whitespace, or HTML markup collapse
//! to the same token stream. Each whitespace-delimited token is hashed with a
//! seeded xxh3_64 and folded into a 64-slot weighted bit vote, following the
//! standard Charikar SimHash construction.

use xxhash_rust::xxh3::xxh3_64_with_seed;

const SIMHASH_BITS: usize = 64;
const TOKEN_SEED: u64 = 0x5EED_1234_ABCD_EF01;

/// Compute the 64-bit SimHash fingerprint of `text`.
///
/// `text` is normalized internally; callers should pass raw (or
/// already-split) content, not pre-normalized text. Empty or all-whitespace
/// input hashes to `0`.
pub fn fingerprint(text: &str) -> u64 {
    let normalized = canonical::normalize(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        return 0;
    }

    let mut votes = [0i64; SIMHASH_BITS];
    for token in tokens {
        let h = xxh3_64_with_seed(token.as_bytes(), TOKEN_SEED);
        for (bit, vote) in votes.iter_mut().enumerate() {
            if (h >> bit) & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }

    let mut out: u64 = 0;
    for (bit, vote) in votes.iter().enumerate() {
        if *vote > 0 {
            out |= 1 << bit;
        }
    }
    out
}

/// Number of differing bits between two fingerprints.
#[inline]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Whether two fingerprints are within `threshold` Hamming distance of each
/// other. `threshold` is inclusive.
#[inline]
pub fn near_duplicate(a: u64, b: u64, threshold: u32) -> bool {
    hamming_distance(a, b) <= threshold
}
