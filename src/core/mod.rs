//! Core primitives shared by every engine layer.
//!
//! Identifiers, grid positions and the deterministic random source.

pub mod ids;
pub mod rng;

pub use ids::{ChannelId, Direction, PlayerId, Position};
pub use rng::{derive_tick_seed, DeterministicRng, RollSource};
