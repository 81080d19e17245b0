//! # Deepmine Engine
//!
//! Tick-driven mine instances bound to voice channels.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DEEPMINE ENGINE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Ids, positions, deterministic RNG         │
//! │                                                              │
//! │  mine/           - Instance data and player actions          │
//! │  ├── tile.rs     - Tile grid                                 │
//! │  ├── encounter.rs- Encounter map and trigger states          │
//! │  ├── hazard.rs   - Hazard level and encounter generation     │
//! │  ├── loot.rs     - Shared loot pool                          │
//! │  ├── instance.rs - Channel-scoped mine instance              │
//! │  └── action.rs   - Movement and mining                       │
//! │                                                              │
//! │  resolve/        - Encounter resolution (compute, apply)     │
//! │  player/         - Gear bonuses, armor, damage, status       │
//! │  store/          - Collaborator traits + in-memory backends  │
//! │                                                              │
//! │  session/        - Scheduling                                │
//! │  ├── lock.rs     - Per-channel lock manager                  │
//! │  ├── script.rs   - Mine-type scripts and registry            │
//! │  └── scheduler.rs- Fixed-interval tick driver                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replayable Ticks
//!
//! Every roll in a tick comes from a Xorshift128+ generator seeded with
//! SHA-256 of the instance seed, channel id and tick number. Given the same
//! stored document and collaborator responses, a tick replays exactly.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod mine;
pub mod player;
pub mod resolve;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::{EngineConfig, HazardConfig, SchedulerConfig};
pub use crate::core::{ChannelId, DeterministicRng, PlayerId, Position};
pub use error::{EngineError, Result, StoreError};
pub use mine::{HazardGenerator, MineInstance};
pub use resolve::{ResolutionEngine, ResolveOutcome};
pub use session::{ChannelLockManager, ScriptRegistry, TickScheduler};
pub use store::Collaborators;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
