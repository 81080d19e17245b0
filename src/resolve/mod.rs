//! Encounter Resolution
//!
//! Fires the encounter on a tile when a player arrives:
//!
//! 1. Take the encounter out of the map (Untriggered → Triggered).
//! 2. Check gear immunity; an immune player only gets a log line.
//! 3. Compute the effect ([`traps::compute`]), touching nothing.
//! 4. Apply it: grid, position and flags, loot, item wear, damage.
//! 5. Mark the encounter Removed and append a history line.
//!
//! A removed encounter is gone from the map, so a second arrival on the
//! same tile finds nothing.

pub mod effect;
pub mod traps;
pub mod treasure;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::HazardConfig;
use crate::core::{PlayerId, Position, RollSource};
use crate::error::Result;
use crate::mine::encounter::EncounterKind;
use crate::mine::events::MineEventKind;
use crate::mine::instance::MineInstance;
use crate::player::status::{DamageOutcome, PlayerStatusTracker};
use crate::store::{ActivityKind, ActivitySink, Collaborators, EquipmentProvider, InventoryStore, Loadout};

pub use effect::{DamageSpec, Effect, EffectContext, LootShare};

/// What a resolution did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveOutcome {
    /// Encounter that fired, if any.
    pub kind: Option<EncounterKind>,
    /// Gear immunity cancelled it.
    pub resisted: bool,
    /// Tiles changed.
    pub map_changed: bool,
    /// Player was relocated.
    pub player_moved: bool,
    /// Player can no longer act (dead or disabled).
    pub player_disabled: bool,
    /// Player has no walkable neighbour.
    pub trapped: bool,
    /// Player is stunned.
    pub stunned: bool,
    /// Hit taken.
    pub damage: Option<DamageOutcome>,
    /// History line.
    pub message: String,
    /// Units found per item.
    pub items_found: Vec<(String, u32)>,
    /// Value of everything found.
    pub items_value: u64,
}

impl ResolveOutcome {
    /// Whether anything fired.
    pub fn fired(&self) -> bool {
        self.kind.is_some()
    }
}

/// Resolves encounters and chest openings for one instance at a time.
#[derive(Clone)]
pub struct ResolutionEngine {
    status: PlayerStatusTracker,
    equipment: Arc<dyn EquipmentProvider>,
    inventory: Arc<dyn InventoryStore>,
    activity: Arc<dyn ActivitySink>,
    config: Arc<HazardConfig>,
}

impl ResolutionEngine {
    /// Engine over the shared collaborators.
    pub fn new(collaborators: &Collaborators, config: Arc<HazardConfig>) -> Self {
        Self {
            status: PlayerStatusTracker::new(collaborators, config.clone()),
            equipment: collaborators.equipment.clone(),
            inventory: collaborators.inventory.clone(),
            activity: collaborators.activity.clone(),
            config,
        }
    }

    /// Status tracker used for damage and revival.
    pub fn status(&self) -> &PlayerStatusTracker {
        &self.status
    }

    /// Hazard tuning in use.
    pub fn config(&self) -> &HazardConfig {
        &self.config
    }

    /// Fire the encounter at `position` for `player`, if there is one.
    pub async fn resolve(
        &self,
        instance: &mut MineInstance,
        player: PlayerId,
        position: Position,
        rng: &mut dyn RollSource,
    ) -> Result<ResolveOutcome> {
        instance.player_mut(player)?;
        let Some(mut encounter) = instance.encounters.take_for_trigger(position) else {
            return Ok(ResolveOutcome::default());
        };
        let kind = encounter.kind;
        let loadout = self.equipment.get_equipped(player).await?;

        if loadout.bonuses.is_immune(kind) {
            encounter.mark_removed();
            let message = format!("{}'s gear shrugged off a {}", player, kind);
            info!("{} immune to {} at {}", player, kind, position);
            instance.record(Some(player), MineEventKind::HazardResisted { kind }, message.clone());
            return Ok(ResolveOutcome {
                kind: Some(kind),
                resisted: true,
                message,
                ..Default::default()
            });
        }

        let effect = self.compute(instance, player, position, kind, &loadout, rng)?;
        let outcome = self.apply(instance, player, effect, rng).await?;
        encounter.mark_removed();

        debug!("{} resolved {} at {}: {}", player, kind, position, outcome.message);
        instance.record(
            Some(player),
            MineEventKind::EncounterResolved { kind, position },
            outcome.message.clone(),
        );
        Ok(outcome)
    }

    /// Break open a treasure chest: a plain treasure find with no encounter.
    pub async fn open_chest(
        &self,
        instance: &mut MineInstance,
        player: PlayerId,
        position: Position,
        rng: &mut dyn RollSource,
    ) -> Result<ResolveOutcome> {
        let loadout = self.equipment.get_equipped(player).await?;
        let effect = self.compute(instance, player, position, EncounterKind::Treasure, &loadout, rng)?;
        let outcome = self.apply(instance, player, effect, rng).await?;
        instance.record(
            Some(player),
            MineEventKind::TileMined { position },
            format!("{} cracked open a chest: {}", player, outcome.message),
        );
        Ok(outcome)
    }

    fn compute(
        &self,
        instance: &MineInstance,
        player: PlayerId,
        position: Position,
        kind: EncounterKind,
        loadout: &Loadout,
        rng: &mut dyn RollSource,
    ) -> Result<Effect> {
        let ctx = EffectContext {
            config: &self.config,
            grid: &instance.grid,
            player,
            position,
            power_level: instance.power_level,
            loadout,
        };
        traps::compute(kind, &ctx, rng)
    }

    /// Apply a computed effect. Instance-local changes land first, then the
    /// collaborator writes.
    pub async fn apply(
        &self,
        instance: &mut MineInstance,
        player: PlayerId,
        effect: Effect,
        rng: &mut dyn RollSource,
    ) -> Result<ResolveOutcome> {
        let mut outcome = ResolveOutcome {
            kind: Some(effect.kind),
            map_changed: effect.changes_map(),
            player_moved: effect.relocate.is_some(),
            message: effect.message.clone(),
            ..Default::default()
        };

        for (pos, tile) in &effect.tile_changes {
            instance.grid.set(*pos, tile.clone())?;
        }

        {
            let state = instance.player_mut(player)?;
            if let Some(dest) = effect.relocate {
                state.pos = dest;
            }
            if let Some(actions) = effect.stun {
                state.stun(actions);
            }
        }

        // Geometry changes can free or trap anyone standing nearby.
        let grid = &instance.grid;
        for state in instance.players.values_mut().filter(|p| !p.dead) {
            state.refresh_geometry(grid);
        }

        if let Some(state) = instance.player(player) {
            outcome.trapped = state.trapped;
            outcome.stunned = state.is_stunned();
        }

        if let Some(fraction) = effect.burn_fraction {
            let report = instance.loot.burn(fraction);
            if report.units() > 0 {
                outcome.message = format!(
                    "{}; {} unit(s) of shared loot worth {} burned",
                    outcome.message,
                    report.units(),
                    report.value_lost
                );
            }
        }

        for (item, amount) in &effect.item_wear {
            let wear = self.inventory.wear_item(player, item, *amount).await?;
            if wear.destroyed {
                info!("{} lost {} to fog corrosion", player, item);
                instance.record(
                    Some(player),
                    MineEventKind::ItemBroken { item: item.clone() },
                    format!("{}'s {} corroded away", player, item),
                );
            }
        }

        if !effect.loot.is_empty() {
            let personal: Vec<(String, u32)> = effect
                .loot
                .iter()
                .filter(|s| s.personal > 0)
                .map(|s| (s.item.clone(), s.personal))
                .collect();
            if !personal.is_empty() {
                self.inventory.grant_items(player, &personal).await?;
            }
            for share in &effect.loot {
                instance.loot.deposit(player, &share.item, share.shared, share.unit_value);
            }
            self.activity
                .record(player, instance.channel, ActivityKind::ItemsFound, effect.items_found() as u64)
                .await?;
            outcome.items_value = effect.loot.iter().map(LootShare::value).sum();
            outcome.items_found = effect.loot.iter().map(|s| (s.item.clone(), s.quantity())).collect();
        }

        if let Some(hit) = effect.damage {
            let result = self
                .status
                .apply_damage(instance, player, hit.base, hit.armor_wear, hit.source, rng)
                .await?;
            outcome.message = format!("{} (-{} hp)", outcome.message, result.actual_damage);
            if result.is_dead {
                outcome.message.push_str(" and was killed");
            }
            outcome.damage = Some(result);
        }

        outcome.player_disabled = instance.player(player).is_some_and(|p| !p.can_act());
        Ok(outcome)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HealthStore;
    use crate::core::rng::ScriptedRolls;
    use crate::core::ChannelId;
    use crate::mine::encounter::Encounter;
    use crate::mine::tile::{TileGrid, TileKind};
    use crate::player::bonus::{EquippedItem, ItemSlot};
    use crate::store::memory::{in_memory, MemoryHandles};

    const P: PlayerId = PlayerId(7);
    const C: ChannelId = ChannelId(1);

    fn setup(config: HazardConfig) -> (ResolutionEngine, MemoryHandles) {
        let (collab, mem) = in_memory();
        (ResolutionEngine::new(&collab, Arc::new(config)), mem)
    }

    fn mine(power: u8, fill: TileKind, entrance: Position, at: Position) -> MineInstance {
        let grid = TileGrid::filled(9, 9, fill, entrance).unwrap();
        let mut mine = MineInstance::new(C, "standard", power, power, grid, 11);
        mine.add_player(P).pos = at;
        mine
    }

    fn place(mine: &mut MineInstance, pos: Position, kind: EncounterKind) {
        mine.encounters.insert(pos, Encounter::new(kind, 1.0)).unwrap();
    }

    #[tokio::test]
    async fn test_no_encounter_is_noop() {
        let (engine, _) = setup(HazardConfig::default());
        let mut mine = mine(1, TileKind::Floor, Position::new(0, 0), Position::new(4, 4));
        let outcome = engine
            .resolve(&mut mine, P, Position::new(4, 4), &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap();
        assert!(!outcome.fired());
        assert!(mine.history.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_is_one_shot() {
        let (engine, mem) = setup(HazardConfig::default());
        let at = Position::new(4, 4);
        let mut mine = mine(2, TileKind::Floor, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::FireBlast);

        let first = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert_eq!(first.kind, Some(EncounterKind::FireBlast));
        assert!(mine.encounters.get(at).is_none());

        let second = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert!(!second.fired());

        // Only one hit landed.
        let health = mem.health.get_health(P, C).await.unwrap();
        assert_eq!(100 - health.current, first.damage.unwrap().actual_damage);
    }

    #[tokio::test]
    async fn test_lightning_scenario_stuns_and_damages() {
        let config = HazardConfig {
            lightning_stun_chance: 0.8,
            ..HazardConfig::default()
        };
        let base = config.tuning(EncounterKind::LightningStrike).unwrap().base_damage;
        let stun_actions = config.lightning_stun_actions;
        let (engine, mem) = setup(config);
        let at = Position::new(4, 4);
        let mut mine = mine(3, TileKind::Floor, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::LightningStrike);

        let outcome = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert!(outcome.stunned);
        assert_eq!(mine.player(P).unwrap().stun_actions, stun_actions);

        // Draw 0.5 puts variance at exactly zero: scaled damage lands unchanged.
        let expected = (base as f64 * 1.5).ceil() as u32;
        assert_eq!(outcome.damage.unwrap().actual_damage, expected);
        assert_eq!(mem.health.get_health(P, C).await.unwrap().current, 100 - expected);
    }

    #[tokio::test]
    async fn test_wall_trap_scenario_traps_player() {
        let (engine, _) = setup(HazardConfig::default());
        let at = Position::new(4, 4);
        let mut mine = mine(2, TileKind::Floor, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::WallTrap);

        let outcome = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert!(outcome.trapped);
        assert!(outcome.map_changed);
        assert!(outcome.message.contains("trapped"));
        assert!(mine.player(P).unwrap().trapped);
        for n in at.neighbors8() {
            assert_eq!(mine.grid.kind_at(n), Some(TileKind::ReinforcedWall));
        }
    }

    #[tokio::test]
    async fn test_bomb_converts_every_wall_in_radius() {
        let (engine, _) = setup(HazardConfig::default());
        let at = Position::new(4, 4);
        let entrance = Position::new(4, 3);
        let mut mine = mine(1, TileKind::Wall, entrance, at);
        mine.grid.set(at, crate::mine::tile::Tile::new(TileKind::Floor)).unwrap();
        place(&mut mine, at, EncounterKind::BombTrap);

        let radius = engine.config().bomb_radius_at(1);
        let in_blast = mine.grid.positions_within(at, radius);
        let walls = in_blast
            .iter()
            .filter(|p| mine.grid.kind_at(**p).is_some_and(TileKind::is_wall_type))
            .count();

        let outcome = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert!(outcome.map_changed);
        assert!(!outcome.player_disabled);
        assert!(walls > 0);
        for p in in_blast {
            if p == entrance {
                assert_eq!(mine.grid.kind_at(p), Some(TileKind::Entrance));
            } else {
                assert_eq!(mine.grid.kind_at(p), Some(TileKind::Floor));
            }
        }
    }

    #[tokio::test]
    async fn test_fire_burn_bound() {
        let (engine, _) = setup(HazardConfig::default());
        let at = Position::new(4, 4);
        let power = 7;
        let mut mine = mine(power, TileKind::Floor, Position::new(0, 0), at);
        mine.loot.deposit(PlayerId(8), "iron_ore", 9, 8);
        mine.loot.deposit(P, "gemstone", 3, 60);
        place(&mut mine, at, EncounterKind::FireBlast);

        engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        let fraction = engine.config().burn_fraction_at(power);
        let max_burn = |q: u32| (q as f64 * fraction).ceil() as u32;
        assert!(9 - mine.loot.quantity("iron_ore") <= max_burn(9));
        assert!(3 - mine.loot.quantity("gemstone") <= max_burn(3));
        assert!(mine.loot.credited_value(PlayerId(8)) < 72);
    }

    #[tokio::test]
    async fn test_immunity_short_circuits() {
        let (engine, mem) = setup(HazardConfig::default());
        mem.equipment.equip(P, EquippedItem::new("blast_shield", ItemSlot::Accessory, 30));
        let at = Position::new(4, 4);
        let mut mine = mine(3, TileKind::Wall, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::BombTrap);
        let walls_before = mine.grid.count(TileKind::Wall);

        let outcome = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert!(outcome.resisted);
        assert!(!outcome.map_changed);
        assert_eq!(mine.grid.count(TileKind::Wall), walls_before);
        assert_eq!(mem.health.get_health(P, C).await.unwrap().current, 100);
        assert!(mine.encounters.get(at).is_none());
        assert!(matches!(
            mine.history.last().unwrap().kind,
            MineEventKind::HazardResisted { kind: EncounterKind::BombTrap }
        ));
    }

    #[tokio::test]
    async fn test_portal_into_rock_sets_stuck() {
        let (engine, _) = setup(HazardConfig::default());
        let at = Position::new(4, 4);
        let mut mine = mine(2, TileKind::Wall, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::PortalTrap);

        let outcome = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        assert!(outcome.player_moved);
        assert!(outcome.damage.is_some());
        let state = mine.player(P).unwrap();
        assert_ne!(state.pos, at);
        assert!(state.stuck);
        assert!(state.can_act());
    }

    #[tokio::test]
    async fn test_fog_wears_gear() {
        let (engine, mem) = setup(HazardConfig::default());
        mem.equipment.equip(P, EquippedItem::new("canvas_hood", ItemSlot::Accessory, 5));
        mem.equipment.equip(P, EquippedItem::new("earthshaker", ItemSlot::Tool, 10).unique());
        let at = Position::new(4, 4);
        let mut mine = mine(1, TileKind::Floor, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::GreenFog);

        engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.5)).await.unwrap();
        let items = mem.equipment.items(P);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "earthshaker");
        assert!(mine
            .history
            .iter()
            .any(|e| matches!(&e.kind, MineEventKind::ItemBroken { item } if item == "canvas_hood")));
    }

    #[tokio::test]
    async fn test_treasure_split_between_player_and_pool() {
        let (engine, mem) = setup(HazardConfig::default());
        let at = Position::new(4, 4);
        let mut mine = mine(1, TileKind::Floor, Position::new(0, 0), at);
        place(&mut mine, at, EncounterKind::Treasure);

        let outcome = engine.resolve(&mut mine, P, at, &mut ScriptedRolls::constant(0.0)).await.unwrap();
        // Low draws: one unit of the first table entry, which is split.
        assert_eq!(outcome.items_found, vec![("copper_coin".to_string(), 1)]);
        assert_eq!(outcome.items_value, 5);
        assert_eq!(mem.equipment.granted(P).get("copper_coin"), Some(&1));
        assert_eq!(mine.loot.quantity("copper_coin"), 0);
        assert_eq!(mem.activity.total(P, ActivityKind::ItemsFound), 1);
    }

    #[tokio::test]
    async fn test_unknown_player_is_domain_error() {
        let (engine, _) = setup(HazardConfig::default());
        let mut mine = mine(1, TileKind::Floor, Position::new(0, 0), Position::new(4, 4));
        let err = engine
            .resolve(&mut mine, PlayerId(99), Position::new(4, 4), &mut ScriptedRolls::constant(0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::EngineError::PlayerNotInMine { .. }));
    }
}
