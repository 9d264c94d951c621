//! Deterministic PRNG for puzzle generation and scattering.
//!
//! Uses the SplitMix64 algorithm: 8 bytes of state, good statistical
//! quality, and the same sequence on every platform, so a stored seed is
//! enough to regenerate a puzzle's geometry.

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PuzzleRng {
    state: u64,
}

impl PuzzleRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)` with 24 bits of precision.
    pub fn next_unit(&mut self) -> f32 {
        let top = (self.next_u64() >> 40) as u32;
        top as f32 / (1u32 << 24) as f32
    }

    /// Uniform value in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_unit()
    }

    /// Returns `true` with the given probability, clamped to `[0, 1]`.
    pub fn chance(&mut self, probability: f32) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.next_unit() < probability
    }

    /// Uniform index in `0..n`. Returns 0 for `n == 0`.
    pub fn index(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % n as u64) as usize
    }
}
