//! Deterministic pseudo-random sequence shared by all chains.
//!
//! The sequence is a process-wide resource: entering a top-level chain
//! resets it to a seed derived from the render key, so two chains that
//! render identical input draw identical values. A nested invocation
//! made from inside a running chain never resets it; the outer chain
//! resumes from wherever the sequence was left.

use quill_core::RngAlgorithm;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencePhase {
    Unseeded,
    Seeded,
    Consumed,
}

pub struct SequenceState {
    state: u64,
    position: u64,
    phase: SequencePhase,
}

impl SequenceState {
    pub fn new() -> Self {
        Self {
            state: 0,
            position: 0,
            phase: SequencePhase::Unseeded,
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.state = seed;
        self.position = 0;
        self.phase = SequencePhase::Seeded;
    }

    pub fn next(&mut self, algorithm: &dyn RngAlgorithm) -> u64 {
        self.position += 1;
        self.phase = SequencePhase::Consumed;
        algorithm.next_u64(&mut self.state)
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn phase(&self) -> SequencePhase {
        self.phase
    }
}

impl Default for SequenceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds a render key into a 64-bit seed. Stable for a given key, free
/// of wall-clock entropy.
pub fn derive_seed(render_key: &str) -> u64 {
    let mut acc: u64 = 0x9e3779b97f4a7c15;
    for &b in render_key.as_bytes() {
        acc = splitmix64(acc ^ u64::from(b));
    }
    splitmix64(acc)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Maps a raw draw onto [0, 1).
pub fn unit_interval(raw: u64) -> f64 {
    (raw >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}
