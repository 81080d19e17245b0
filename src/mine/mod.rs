//! Mine Module
//!
//! Passive mine data plus the hazard generator and player actions.
//!
//! - `tile`: tile grid
//! - `encounter`: encounter types and the one-per-tile encounter map
//! - `loot`: shared loot pool
//! - `instance`: channel-scoped mine instance and player positions
//! - `hazard`: hazard level and encounter set generation
//! - `events`: bounded event history
//! - `action`: movement and mining

pub mod action;
pub mod encounter;
pub mod events;
pub mod hazard;
pub mod instance;
pub mod loot;
pub mod tile;

pub use action::{ActionOutcome, ActionRunner};
pub use encounter::{Encounter, EncounterKind, EncounterMap, EncounterState};
pub use events::{EventHistory, MineEvent, MineEventKind};
pub use hazard::{EncounterSpec, HazardGenerator, HazardRoll};
pub use instance::{MineInstance, PlayerPosition, MAX_LEVEL};
pub use loot::{BurnReport, LootPool, PoolItem};
pub use tile::{Tile, TileGrid, TileKind};
