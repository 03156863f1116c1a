//! DistanceOracle (C4): near-duplicate classification under a configurable
//! Hamming-distance threshold.

use fingerprint::hamming_distance;

#[derive(Clone, Copy, Debug)]
pub struct DistanceOracle {
    threshold: u32,
}

impl DistanceOracle {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    #[inline]
    pub fn near_duplicate(&self, a: u64, b: u64) -> bool {
        hamming_distance(a, b) <= self.threshold
    }
}

impl Default for DistanceOracle {
    /// Default threshold of 3 bits, matching the commonly used SimHash
    /// near-duplicate cutoff.
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let oracle = DistanceOracle::new(2);
        assert!(oracle.near_duplicate(0b00, 0b11));
        assert!(!oracle.near_duplicate(0b000, 0b111));
    }
}
