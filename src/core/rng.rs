//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ for fast, reproducible randomness. Every channel tick
//! gets its own generator seeded from the instance seed, the channel id and
//! the tick number, so a tick can be replayed exactly from its inputs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ids::ChannelId;

/// Source of random draws consumed by hazard generation and resolution.
///
/// Everything the engine rolls goes through this trait so tests can
/// substitute scripted values for a specific draw.
pub trait RollSource: Send {
    /// Next raw 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Uniform float in `[0, 1)`.
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[0, max)`. Returns 0 when `max == 0`.
    fn below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        ((self.unit() * max as f64) as u32).min(max - 1)
    }

    /// Uniform integer in `[min, max]`.
    fn range_inclusive(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let span = (max - min + 1) as u32;
        min + self.below(span) as i32
    }

    /// Uniform float in `[min, max)`.
    fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        min + self.unit() * (max - min)
    }

    /// True with the given probability.
    fn chance(&mut self, probability: f64) -> bool {
        self.unit() < probability
    }
}

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use deepmine::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let mut replay = DeterministicRng::new(12345);
/// assert_eq!(rng.next_u64(), replay.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create the generator for one channel tick.
    pub fn for_tick(instance_seed: u64, channel: ChannelId, tick: u64) -> Self {
        Self::new(derive_tick_seed(instance_seed, channel, tick))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Shuffle a slice in place using Fisher-Yates algorithm.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = RollSource::below(self, (i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }
}

impl RollSource for DeterministicRng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        DeterministicRng::next_u64(self)
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the seed for one channel tick.
///
/// Mixes the instance seed (fixed at generation), the channel id and the
/// tick number so that two channels sharing an instance seed still diverge.
pub fn derive_tick_seed(instance_seed: u64, channel: ChannelId, tick: u64) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"DEEPMINE_TICK_V1");
    hasher.update(instance_seed.to_le_bytes());
    hasher.update(channel.0.to_le_bytes());
    hasher.update(tick.to_le_bytes());

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

/// Scripted draws for tests: `unit()` pops queued values, then repeats the
/// fallback once the queue is exhausted.
#[cfg(test)]
pub(crate) struct ScriptedRolls {
    values: std::collections::VecDeque<f64>,
    fallback: f64,
}

#[cfg(test)]
impl ScriptedRolls {
    pub(crate) fn new(values: &[f64], fallback: f64) -> Self {
        Self {
            values: values.iter().copied().collect(),
            fallback,
        }
    }

    pub(crate) fn constant(value: f64) -> Self {
        Self::new(&[], value)
    }
}

#[cfg(test)]
impl RollSource for ScriptedRolls {
    fn next_u64(&mut self) -> u64 {
        (self.unit() * u64::MAX as f64) as u64
    }

    fn unit(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

// =============================================================================
// TESTS
// =============================================================================
