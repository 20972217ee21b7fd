//! Deterministic number stream derived from a string seed
//!
//! Every piece of apparent randomness in the engine (tip rotation,
//! tie-breaking) routes through this generator so that identical inputs
//! reproduce identical outputs across runs and process restarts.

use sha2::{Digest, Sha256};

/// Linear congruential generator seeded from a string
#[derive(Debug, Clone)]
pub struct SeededSequence {
    state: u32,
}

impl SeededSequence {
    /// Derive a generator from a seed string.
    ///
    /// The seed is folded with a rolling polynomial hash (h = h*31 + char,
    /// wrapped to 32 bits) and reduced to a non-negative 31-bit value.
    pub fn derive(seed: &str) -> Self {
        let mut h: i32 = 0;
        for c in seed.chars() {
            h = h.wrapping_mul(31).wrapping_add(c as i32);
        }
        let state = h.unsigned_abs() % 2_147_483_647;
        Self { state }
    }

    /// Next float in [0, 1)
    pub fn next(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.state as f64 / 4_294_967_296.0
    }

    /// Next integer in [0, bound)
    pub fn next_below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next() * bound as f64) as usize
    }

    /// Deterministic in-place Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}

/// Build the seed string for a (user, session, purpose) triple: the fields
/// are joined with ':' and SHA-256 hashed, truncated to 16 hex chars.
pub fn generate_seed(user_id: &str, session_id: &str, purpose: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(session_id.as_bytes());
    hasher.update(b":");
    hasher.update(purpose.as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// TESTS
// =============================================================================
