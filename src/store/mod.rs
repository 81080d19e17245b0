//! Collaborator contracts.
//!
//! The engine owns none of the persistent data it touches. Instance
//! documents, health records, equipment and economy counters are reached
//! through these traits; hosts plug in their own backends, and
//! [`memory`] provides in-process implementations for tests and the demo.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ChannelId, PlayerId};
use crate::error::StoreError;
use crate::mine::instance::MineInstance;
use crate::player::bonus::{EquippedItem, GearBonuses};
use crate::player::damage::DamageSource;

pub use memory::{in_memory, MemoryActivity, MemoryEquipment, MemoryHandles, MemoryHealthStore, MemoryInstanceStore};

/// Result alias for collaborator calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persisted mine instances.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Channels whose instance should be ticked.
    async fn active_channels(&self) -> StoreResult<Vec<ChannelId>>;

    /// Load the current document.
    async fn load(&self, channel: ChannelId) -> StoreResult<MineInstance>;

    /// Persist the mutable state (grid, encounters, loot, positions, history).
    async fn save(&self, channel: ChannelId, instance: &MineInstance) -> StoreResult<()>;

    /// Teardown.
    async fn remove(&self, channel: ChannelId) -> StoreResult<()>;
}

/// Health keyed by `(player, channel)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Current health.
    pub current: u32,
    /// Maximum health.
    pub max: u32,
    /// Waiting for revival.
    pub is_dead: bool,
}

/// Result of a health delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthChange {
    /// Health after the delta.
    pub new_health: u32,
    /// Health reached zero.
    pub is_dead: bool,
}

/// External health records. Never cached by the engine across ticks.
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Current record; players without one start at full health.
    async fn get_health(&self, player: PlayerId, channel: ChannelId) -> StoreResult<HealthRecord>;

    /// Add `delta` (negative for damage), clamped to `[0, max]`.
    async fn apply_delta(
        &self,
        player: PlayerId,
        channel: ChannelId,
        delta: i64,
        source: DamageSource,
    ) -> StoreResult<HealthChange>;

    /// Clear death and set health to `amount` (capped at max).
    async fn revive(&self, player: PlayerId, channel: ChannelId, amount: u32) -> StoreResult<HealthRecord>;
}

/// What a player has equipped and the bonuses it yields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Loadout {
    /// Equipped items.
    pub items: Vec<EquippedItem>,
    /// Folded bonuses.
    pub bonuses: GearBonuses,
}

/// Read-only equipment and stat lookups.
#[async_trait]
pub trait EquipmentProvider: Send + Sync {
    /// Equipped items and derived bonuses.
    async fn get_equipped(&self, player: PlayerId) -> StoreResult<Loadout>;
}

/// Outcome of durability damage on one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WearOutcome {
    /// Durability left on the current unit.
    pub remaining: u32,
    /// A unit broke.
    pub destroyed: bool,
    /// Units left in the stack.
    pub quantity_left: u32,
}

/// Inventory writes needed during resolution.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Reduce durability; a unit that reaches zero breaks.
    async fn wear_item(&self, player: PlayerId, item: &str, amount: u32) -> StoreResult<WearOutcome>;

    /// Use up one unit (auto-revive charms).
    async fn consume_item(&self, player: PlayerId, item: &str) -> StoreResult<()>;

    /// Add items to the personal inventory.
    async fn grant_items(&self, player: PlayerId, items: &[(String, u32)]) -> StoreResult<()>;
}

/// Counters the economy subsystem consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Tiles walked or mined into.
    TilesMoved,
    /// Seconds spent in an active mine.
    SecondsInChannel,
    /// Item units found.
    ItemsFound,
}

/// Economy/maintenance activity sink.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Increment a counter.
    async fn record(&self, player: PlayerId, channel: ChannelId, kind: ActivityKind, amount: u64) -> StoreResult<()>;
}

/// All collaborators, shared by the scheduler and every dispatch.
#[derive(Clone)]
pub struct Collaborators {
    /// Instance documents.
    pub instances: Arc<dyn InstanceStore>,
    /// Health records.
    pub health: Arc<dyn HealthStore>,
    /// Equipment lookups.
    pub equipment: Arc<dyn EquipmentProvider>,
    /// Inventory writes.
    pub inventory: Arc<dyn InventoryStore>,
    /// Activity counters.
    pub activity: Arc<dyn ActivitySink>,
}
