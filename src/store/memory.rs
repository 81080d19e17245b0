//! In-memory collaborators.
//!
//! Used by the demo binary and by tests. Instance documents are stored
//! bincode-encoded so every `load` returns a fresh copy, the same way a
//! real document store would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::{ChannelId, PlayerId};
use crate::error::StoreError;
use crate::mine::instance::MineInstance;
use crate::player::bonus::{BonusRegistry, EquippedItem};
use crate::player::damage::DamageSource;
use crate::store::{
    ActivityKind, ActivitySink, Collaborators, EquipmentProvider, HealthChange, HealthRecord, HealthStore,
    InstanceStore, InventoryStore, Loadout, StoreResult, WearOutcome,
};

/// Max health for players without a record.
pub const DEFAULT_MAX_HEALTH: u32 = 100;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// INSTANCES
// =============================================================================

/// Instance documents keyed by channel.
#[derive(Default)]
pub struct MemoryInstanceStore {
    documents: Mutex<BTreeMap<ChannelId, Vec<u8>>>,
    failing_saves: AtomicUsize,
    load_delay: Mutex<Option<Duration>>,
}

impl MemoryInstanceStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance directly (activation).
    pub fn insert(&self, instance: &MineInstance) -> StoreResult<()> {
        let bytes = encode(instance)?;
        guard(&self.documents).insert(instance.channel, bytes);
        Ok(())
    }

    /// Store already-encoded bytes as the channel's document.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, channel: ChannelId, bytes: Vec<u8>) {
        guard(&self.documents).insert(channel, bytes);
    }

    /// Decode the stored document, if any.
    pub fn get(&self, channel: ChannelId) -> Option<MineInstance> {
        guard(&self.documents)
            .get(&channel)
            .and_then(|bytes| bincode::deserialize(bytes).ok())
    }

    /// Make the next `n` saves fail with `Unavailable`.
    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Delay every load, simulating a slow backend.
    pub fn set_load_delay(&self, delay: Option<Duration>) {
        *guard(&self.load_delay) = delay;
    }
}

fn encode(instance: &MineInstance) -> StoreResult<Vec<u8>> {
    bincode::serialize(instance).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn active_channels(&self) -> StoreResult<Vec<ChannelId>> {
        Ok(guard(&self.documents).keys().copied().collect())
    }

    async fn load(&self, channel: ChannelId) -> StoreResult<MineInstance> {
        let delay = *guard(&self.load_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let documents = guard(&self.documents);
        let bytes = documents.get(&channel).ok_or(StoreError::InstanceNotFound(channel))?;
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn save(&self, channel: ChannelId, instance: &MineInstance) -> StoreResult<()> {
        let failing = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("injected save failure".into()));
        }
        let bytes = encode(instance)?;
        guard(&self.documents).insert(channel, bytes);
        Ok(())
    }

    async fn remove(&self, channel: ChannelId) -> StoreResult<()> {
        guard(&self.documents).remove(&channel);
        Ok(())
    }
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health records keyed by `(player, channel)`.
#[derive(Default)]
pub struct MemoryHealthStore {
    records: Mutex<BTreeMap<(PlayerId, ChannelId), HealthRecord>>,
}

impl MemoryHealthStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a record.
    pub fn set(&self, player: PlayerId, channel: ChannelId, current: u32, max: u32) {
        guard(&self.records).insert(
            (player, channel),
            HealthRecord {
                current: current.min(max),
                max,
                is_dead: current == 0,
            },
        );
    }

    fn fresh() -> HealthRecord {
        HealthRecord {
            current: DEFAULT_MAX_HEALTH,
            max: DEFAULT_MAX_HEALTH,
            is_dead: false,
        }
    }
}

#[async_trait]
impl HealthStore for MemoryHealthStore {
    async fn get_health(&self, player: PlayerId, channel: ChannelId) -> StoreResult<HealthRecord> {
        Ok(guard(&self.records)
            .get(&(player, channel))
            .copied()
            .unwrap_or_else(Self::fresh))
    }

    async fn apply_delta(
        &self,
        player: PlayerId,
        channel: ChannelId,
        delta: i64,
        _source: DamageSource,
    ) -> StoreResult<HealthChange> {
        let mut records = guard(&self.records);
        let record = records.entry((player, channel)).or_insert_with(Self::fresh);
        if !record.is_dead {
            let next = (record.current as i64 + delta).clamp(0, record.max as i64);
            record.current = next as u32;
            record.is_dead = record.current == 0;
        }
        Ok(HealthChange {
            new_health: record.current,
            is_dead: record.is_dead,
        })
    }

    async fn revive(&self, player: PlayerId, channel: ChannelId, amount: u32) -> StoreResult<HealthRecord> {
        let mut records = guard(&self.records);
        let record = records.entry((player, channel)).or_insert_with(Self::fresh);
        record.current = amount.clamp(1, record.max);
        record.is_dead = false;
        Ok(*record)
    }
}

// =============================================================================
// EQUIPMENT / INVENTORY
// =============================================================================

/// Equipped items plus a personal inventory of granted items.
pub struct MemoryEquipment {
    registry: BonusRegistry,
    equipped: Mutex<BTreeMap<PlayerId, Vec<EquippedItem>>>,
    granted: Mutex<BTreeMap<PlayerId, BTreeMap<String, u32>>>,
}

impl Default for MemoryEquipment {
    fn default() -> Self {
        Self::new(BonusRegistry::standard())
    }
}

impl MemoryEquipment {
    /// Store folding bonuses through `registry`.
    pub fn new(registry: BonusRegistry) -> Self {
        Self {
            registry,
            equipped: Mutex::new(BTreeMap::new()),
            granted: Mutex::new(BTreeMap::new()),
        }
    }

    /// Equip an item.
    pub fn equip(&self, player: PlayerId, item: EquippedItem) {
        guard(&self.equipped).entry(player).or_default().push(item);
    }

    /// Currently equipped items.
    pub fn items(&self, player: PlayerId) -> Vec<EquippedItem> {
        guard(&self.equipped).get(&player).cloned().unwrap_or_default()
    }

    /// Items granted to the personal inventory.
    pub fn granted(&self, player: PlayerId) -> BTreeMap<String, u32> {
        guard(&self.granted).get(&player).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl EquipmentProvider for MemoryEquipment {
    async fn get_equipped(&self, player: PlayerId) -> StoreResult<Loadout> {
        let items = self.items(player);
        let bonuses = self.registry.aggregate(&items);
        Ok(Loadout { items, bonuses })
    }
}

#[async_trait]
impl InventoryStore for MemoryEquipment {
    async fn wear_item(&self, player: PlayerId, item: &str, amount: u32) -> StoreResult<WearOutcome> {
        let mut equipped = guard(&self.equipped);
        let items = equipped.entry(player).or_default();
        let idx = items
            .iter()
            .position(|i| i.key == item)
            .ok_or_else(|| StoreError::ItemNotOwned { player, item: item.to_string() })?;

        let entry = &mut items[idx];
        if entry.unique {
            return Ok(WearOutcome {
                remaining: entry.durability,
                destroyed: false,
                quantity_left: entry.quantity,
            });
        }

        entry.durability = entry.durability.saturating_sub(amount);
        if entry.durability > 0 {
            return Ok(WearOutcome {
                remaining: entry.durability,
                destroyed: false,
                quantity_left: entry.quantity,
            });
        }

        // One unit broke; the next in the stack starts fresh.
        entry.quantity = entry.quantity.saturating_sub(1);
        let quantity_left = entry.quantity;
        if quantity_left == 0 {
            items.remove(idx);
        } else {
            entry.durability = entry.max_durability;
        }
        Ok(WearOutcome {
            remaining: 0,
            destroyed: true,
            quantity_left,
        })
    }

    async fn consume_item(&self, player: PlayerId, item: &str) -> StoreResult<()> {
        let mut equipped = guard(&self.equipped);
        let items = equipped.entry(player).or_default();
        let idx = items
            .iter()
            .position(|i| i.key == item)
            .ok_or_else(|| StoreError::ItemNotOwned { player, item: item.to_string() })?;
        items[idx].quantity = items[idx].quantity.saturating_sub(1);
        if items[idx].quantity == 0 {
            items.remove(idx);
        }
        Ok(())
    }

    async fn grant_items(&self, player: PlayerId, items: &[(String, u32)]) -> StoreResult<()> {
        let mut granted = guard(&self.granted);
        let inventory = granted.entry(player).or_default();
        for (item, quantity) in items {
            *inventory.entry(item.clone()).or_insert(0) += quantity;
        }
        Ok(())
    }
}

// =============================================================================
// ACTIVITY
// =============================================================================

/// Activity counters keyed by player and kind.
#[derive(Default)]
pub struct MemoryActivity {
    counters: Mutex<BTreeMap<(PlayerId, ActivityKind), u64>>,
}

impl MemoryActivity {
    /// Empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter value.
    pub fn total(&self, player: PlayerId, kind: ActivityKind) -> u64 {
        guard(&self.counters).get(&(player, kind)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ActivitySink for MemoryActivity {
    async fn record(&self, player: PlayerId, _channel: ChannelId, kind: ActivityKind, amount: u64) -> StoreResult<()> {
        *guard(&self.counters).entry((player, kind)).or_insert(0) += amount;
        Ok(())
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Concrete handles to the in-memory collaborators.
#[derive(Clone)]
pub struct MemoryHandles {
    /// Instances.
    pub instances: Arc<MemoryInstanceStore>,
    /// Health.
    pub health: Arc<MemoryHealthStore>,
    /// Equipment and inventory.
    pub equipment: Arc<MemoryEquipment>,
    /// Activity counters.
    pub activity: Arc<MemoryActivity>,
}

/// Fresh in-memory collaborators plus handles for inspection.
pub fn in_memory() -> (Collaborators, MemoryHandles) {
    let handles = MemoryHandles {
        instances: Arc::new(MemoryInstanceStore::new()),
        health: Arc::new(MemoryHealthStore::new()),
        equipment: Arc::new(MemoryEquipment::default()),
        activity: Arc::new(MemoryActivity::new()),
    };
    let collaborators = Collaborators {
        instances: handles.instances.clone(),
        health: handles.health.clone(),
        equipment: handles.equipment.clone(),
        inventory: handles.equipment.clone(),
        activity: handles.activity.clone(),
    };
    (collaborators, handles)
}
