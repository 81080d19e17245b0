//! Player status tracking.
//!
//! Applies damage through the external health store, wears and breaks
//! armor, and drives the death/revival transitions on the player's
//! position. Health is read fresh from the store on every call.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::HazardConfig;
use crate::core::{PlayerId, RollSource};
use crate::error::Result;
use crate::mine::events::MineEventKind;
use crate::mine::instance::MineInstance;
use crate::player::armor::best_armor;
use crate::player::damage::{roll_damage, DamageSource};
use crate::store::{Collaborators, EquipmentProvider, HealthRecord, HealthStore, InventoryStore};

/// Result of [`PlayerStatusTracker::apply_damage`].
#[derive(Clone, Debug, PartialEq)]
pub struct DamageOutcome {
    /// Health lost.
    pub actual_damage: u32,
    /// Health afterwards.
    pub new_health: u32,
    /// Player is dead after the hit.
    pub is_dead: bool,
    /// An auto-revive charm intercepted death.
    pub auto_revived: bool,
    /// Armor piece that broke on this hit.
    pub armor_broken: Option<String>,
}

/// Applies damage and status transitions for one channel's players.
#[derive(Clone)]
pub struct PlayerStatusTracker {
    health: Arc<dyn HealthStore>,
    equipment: Arc<dyn EquipmentProvider>,
    inventory: Arc<dyn InventoryStore>,
    config: Arc<HazardConfig>,
}

impl PlayerStatusTracker {
    /// Tracker over the shared collaborators.
    pub fn new(collaborators: &Collaborators, config: Arc<HazardConfig>) -> Self {
        Self {
            health: collaborators.health.clone(),
            equipment: collaborators.equipment.clone(),
            inventory: collaborators.inventory.clone(),
            config,
        }
    }

    /// Hazard tuning in use.
    pub fn config(&self) -> &HazardConfig {
        &self.config
    }

    /// Roll, mitigate and apply a hit.
    ///
    /// Death moves the player to the entrance, hidden and disabled, unless
    /// an equipped auto-revive effect intercepts it.
    pub async fn apply_damage(
        &self,
        instance: &mut MineInstance,
        player: PlayerId,
        base: u32,
        base_wear: u32,
        source: DamageSource,
        rng: &mut dyn RollSource,
    ) -> Result<DamageOutcome> {
        let channel = instance.channel;
        let power_level = instance.power_level;
        let loadout = self.equipment.get_equipped(player).await?;
        let armor = best_armor(&loadout.items).cloned();
        let armor_points = armor.as_ref().map(|a| a.armor_points).unwrap_or(0) + loadout.bonuses.armor_points;

        let roll = roll_damage(base, base_wear, power_level, armor_points, &self.config, rng);
        let change = self
            .health
            .apply_delta(player, channel, -(roll.actual as i64), source)
            .await?;

        let mut outcome = DamageOutcome {
            actual_damage: roll.actual,
            new_health: change.new_health,
            is_dead: change.is_dead,
            auto_revived: false,
            armor_broken: None,
        };

        // Unique armor never loses durability.
        if let Some(armor) = armor.filter(|a| !a.unique && roll.armor_wear > 0) {
            let wear = self.inventory.wear_item(player, &armor.key, roll.armor_wear).await?;
            if wear.destroyed {
                info!("{} armor {} broke", player, armor.key);
                instance.record(
                    Some(player),
                    MineEventKind::ItemBroken { item: armor.key.clone() },
                    format!("{}'s {} shattered", player, armor.key),
                );
                outcome.armor_broken = Some(armor.key);
            }
        }

        if change.is_dead {
            if let Some(revive) = loadout.bonuses.auto_revive {
                let record = self.health.get_health(player, channel).await?;
                let amount = ((record.max as f64 * revive.restore_fraction).ceil() as u32).max(1);
                let revived = self.health.revive(player, channel, amount).await?;
                self.inventory.consume_item(player, &revive.item).await?;
                info!("{} auto-revived by {} at {} hp", player, revive.item, revived.current);
                instance.record(
                    Some(player),
                    MineEventKind::AutoRevived,
                    format!("{}'s {} flared and pulled them back", player, revive.item),
                );
                outcome.new_health = revived.current;
                outcome.is_dead = false;
                outcome.auto_revived = true;
            } else {
                let entrance = instance.entrance();
                instance.player_mut(player)?.die(entrance);
                info!("{} died on {} ({:?})", player, channel, source);
                instance.record(Some(player), MineEventKind::PlayerDied, format!("{} was killed", player));
            }
        }

        debug!(
            "{} took {} ({} pre-armor, {:.0}% reduced) -> {} hp",
            player,
            roll.actual,
            roll.pre_armor,
            roll.reduction * 100.0,
            outcome.new_health
        );
        Ok(outcome)
    }

    /// Revive one player to `amount` health and clear their flags.
    pub async fn revive(&self, instance: &mut MineInstance, player: PlayerId, amount: u32) -> Result<HealthRecord> {
        let record = self.health.revive(player, instance.channel, amount).await?;
        instance.player_mut(player)?.revive();
        Ok(record)
    }

    async fn revive_to_full(&self, instance: &mut MineInstance, player: PlayerId) -> Result<HealthRecord> {
        let record = self.health.get_health(player, instance.channel).await?;
        self.revive(instance, player, record.max).await
    }

    /// Break time: every dead player returns at full health.
    ///
    /// A store failure for one player is logged and that player stays dead
    /// until the next break.
    pub async fn revive_all_dead(&self, instance: &mut MineInstance) -> usize {
        let channel = instance.channel;
        let mut revived = 0;
        for player in instance.dead_players() {
            match self.revive_to_full(instance, player).await {
                Ok(_) => revived += 1,
                Err(e) => warn!("failed to revive {} on {}: {}", player, channel, e),
            }
        }
        if revived > 0 {
            instance.record(
                None,
                MineEventKind::PlayersRevived { count: revived },
                format!("{revived} fallen miner(s) were carried back to their feet"),
            );
        }
        revived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedRolls;
    use crate::core::{ChannelId, Position};
    use crate::mine::tile::{TileGrid, TileKind};
    use crate::player::bonus::{EquippedItem, ItemSlot};
    use crate::store::memory::in_memory;

    fn mine(power: u8) -> MineInstance {
        let grid = TileGrid::filled(8, 8, TileKind::Floor, Position::new(0, 0)).unwrap();
        let mut mine = MineInstance::new(ChannelId(1), "standard", power, power, grid, 5);
        mine.add_player(PlayerId(7)).pos = Position::new(4, 4);
        mine
    }

    #[tokio::test]
    async fn test_apply_damage_unarmored() {
        let (collab, mem) = in_memory();
        let tracker = PlayerStatusTracker::new(&collab, Arc::new(HazardConfig::default()));
        let mut mine = mine(5);

        let outcome = tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 4, DamageSource::Fire, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert_eq!(outcome.actual_damage, 20);
        assert_eq!(outcome.new_health, 80);
        assert!(!outcome.is_dead);
        assert_eq!(mem.health.get_health(PlayerId(7), ChannelId(1)).await.unwrap().current, 80);
    }

    #[tokio::test]
    async fn test_armor_mitigates_and_wears() {
        let (collab, mem) = in_memory();
        mem.equipment
            .equip(PlayerId(7), EquippedItem::new("chainmail", ItemSlot::Armor, 10).with_armor(50));
        let tracker = PlayerStatusTracker::new(&collab, Arc::new(HazardConfig::default()));
        let mut mine = mine(5);

        let first = tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 4, DamageSource::Explosion, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert_eq!(first.actual_damage, 10);
        assert!(first.armor_broken.is_none());

        // Durability 10 - 8 = 2, the next hit breaks it.
        let second = tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 4, DamageSource::Explosion, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert_eq!(second.armor_broken.as_deref(), Some("chainmail"));
        assert!(mem.equipment.items(PlayerId(7)).is_empty());
    }

    #[tokio::test]
    async fn test_death_moves_to_entrance() {
        let (collab, mem) = in_memory();
        mem.health.set(PlayerId(7), ChannelId(1), 5, 100);
        let tracker = PlayerStatusTracker::new(&collab, Arc::new(HazardConfig::default()));
        let mut mine = mine(3);

        let outcome = tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 0, DamageSource::Crush, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert!(outcome.is_dead);
        assert_eq!(outcome.new_health, 0);

        let pos = mine.player(PlayerId(7)).unwrap();
        assert!(pos.dead && pos.invisible && pos.disabled);
        assert_eq!(pos.pos, mine.entrance());
        assert!(matches!(mine.history.last().unwrap().kind, MineEventKind::PlayerDied));
    }

    #[tokio::test]
    async fn test_auto_revive_intercepts_death_once() {
        let (collab, mem) = in_memory();
        mem.health.set(PlayerId(7), ChannelId(1), 5, 100);
        mem.equipment
            .equip(PlayerId(7), EquippedItem::new("phoenix_feather", ItemSlot::Accessory, 1));
        let tracker = PlayerStatusTracker::new(&collab, Arc::new(HazardConfig::default()));
        let mut mine = mine(3);

        let outcome = tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 0, DamageSource::Crush, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert!(outcome.auto_revived);
        assert!(!outcome.is_dead);
        assert_eq!(outcome.new_health, 50);
        assert!(!mine.player(PlayerId(7)).unwrap().dead);
        assert!(mem.equipment.items(PlayerId(7)).is_empty());

        // Charm is gone: the next lethal hit kills.
        mem.health.set(PlayerId(7), ChannelId(1), 1, 100);
        let outcome = tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 0, DamageSource::Crush, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert!(outcome.is_dead);
    }

    #[tokio::test]
    async fn test_revive_restores_health_and_flags() {
        let (collab, mem) = in_memory();
        mem.health.set(PlayerId(7), ChannelId(1), 1, 100);
        let tracker = PlayerStatusTracker::new(&collab, Arc::new(HazardConfig::default()));
        let mut mine = mine(1);

        tracker
            .apply_damage(&mut mine, PlayerId(7), 10, 0, DamageSource::Poison, &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert!(mem.health.get_health(PlayerId(7), ChannelId(1)).await.unwrap().is_dead);

        let record = tracker.revive(&mut mine, PlayerId(7), 40).await.unwrap();
        assert!(!record.is_dead);
        assert_eq!(record.current, 40);
        assert!(mine.player(PlayerId(7)).unwrap().can_act());
    }

    #[tokio::test]
    async fn test_revive_all_dead_at_break() {
        let (collab, mem) = in_memory();
        let tracker = PlayerStatusTracker::new(&collab, Arc::new(HazardConfig::default()));
        let mut mine = mine(2);
        mine.add_player(PlayerId(8));
        for id in [PlayerId(7), PlayerId(8)] {
            mem.health.set(id, ChannelId(1), 1, 120);
            tracker
                .apply_damage(&mut mine, id, 10, 0, DamageSource::Fire, &mut ScriptedRolls::constant(0.5))
                .await
                .unwrap();
        }
        assert_eq!(mine.dead_players().len(), 2);

        assert_eq!(tracker.revive_all_dead(&mut mine).await, 2);
        assert!(mine.dead_players().is_empty());
        let record = mem.health.get_health(PlayerId(8), ChannelId(1)).await.unwrap();
        assert_eq!(record.current, 120);
    }
}
