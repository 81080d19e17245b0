//! Engine configuration.
//!
//! Every table has a working default. Hosts either load a JSON document
//! with [`EngineConfig::from_json_str`] or start from the defaults with
//! `DEEPMINE_*` environment overrides via [`EngineConfig::from_env`]. Both
//! paths validate before returning.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::mine::encounter::EncounterKind;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tick driver settings.
    pub scheduler: SchedulerConfig,
    /// Hazard, damage and treasure tuning.
    pub hazard: HazardConfig,
}

impl EngineConfig {
    /// Defaults plus `DEEPMINE_*` environment overrides, validated.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults plus overrides read through `lookup`, validated.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| -> Result<Option<u64>> {
            match lookup(name) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| EngineError::InvalidConfig(format!("{name}: `{raw}` is not a number"))),
            }
        };

        let s = &mut self.scheduler;
        if let Some(v) = var("DEEPMINE_TICK_INTERVAL_MS")? {
            s.tick_interval_ms = v;
        }
        if let Some(v) = var("DEEPMINE_MAX_PARALLEL")? {
            s.max_parallel = usize::try_from(v)
                .map_err(|_| EngineError::InvalidConfig(format!("DEEPMINE_MAX_PARALLEL: {v} is too large")))?;
        }
        if let Some(v) = var("DEEPMINE_LOCK_TIMEOUT_MS")? {
            s.lock_timeout_ms = v;
        }
        if let Some(v) = var("DEEPMINE_DISPATCH_TIMEOUT_MS")? {
            s.dispatch_timeout_ms = v;
        }
        if let Some(v) = var("DEEPMINE_BREAK_INTERVAL_TICKS")? {
            s.break_interval_ticks = v;
        }
        Ok(())
    }

    /// Reject tables the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.hazard.validate()
    }
}

/// Tick driver settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between cycles.
    pub tick_interval_ms: u64,
    /// Channels dispatched concurrently per batch.
    pub max_parallel: usize,
    /// Lease length for a channel lock.
    pub lock_timeout_ms: u64,
    /// Default per-dispatch budget for scripts that do not set their own.
    pub dispatch_timeout_ms: u64,
    /// Active expired-lock sweep every N cycles.
    pub sweep_every_cycles: u64,
    /// Dead players are revived every N instance ticks.
    pub break_interval_ticks: u64,
    /// Actions each player takes per tick.
    pub actions_per_tick: u32,
    /// Tiles revealed around a player after each action.
    pub sight_radius: i32,
    /// History lines kept per instance.
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            max_parallel: 32,
            lock_timeout_ms: 30_000,
            dispatch_timeout_ms: 10_000,
            sweep_every_cycles: 12,
            break_interval_ticks: 60,
            actions_per_tick: 2,
            sight_radius: 2,
            history_capacity: 50,
        }
    }
}

impl SchedulerConfig {
    /// Cycle interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Lease taken at acquire. Dispatch extends it once the script's own
    /// budget is known.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Default dispatch budget.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 || self.max_parallel == 0 {
            return Err(EngineError::InvalidConfig(
                "tick interval and max_parallel must be non-zero".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(EngineError::InvalidConfig("history capacity must be non-zero".into()));
        }
        if self.lock_timeout_ms < self.dispatch_timeout_ms {
            return Err(EngineError::InvalidConfig(
                "lock timeout must cover the dispatch timeout".into(),
            ));
        }
        Ok(())
    }
}

/// Per-encounter table row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncounterTuning {
    /// Selection weight.
    pub weight: f64,
    /// Below this hazard level the weight is halved.
    pub min_power: u8,
    /// Base damage before power scaling (0 for treasure).
    pub base_damage: u32,
    /// Base armor durability loss per hit.
    pub armor_wear: u32,
}

/// Where a treasure item goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootDestination {
    /// Finder keeps all of it.
    Personal,
    /// All of it goes to the group pool.
    Shared,
    /// Finder keeps the larger half, the pool gets the rest.
    Split,
}

/// Treasure table row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    /// Item key.
    pub item: String,
    /// Value per unit.
    pub value: u64,
    /// Base selection weight.
    pub weight: f64,
    /// Units per roll, at least 1.
    pub max_quantity: u32,
    /// Split rule.
    pub destination: LootDestination,
}

impl LootEntry {
    fn new(item: &str, value: u64, weight: f64, max_quantity: u32, destination: LootDestination) -> Self {
        Self {
            item: item.to_string(),
            value,
            weight,
            max_quantity,
            destination,
        }
    }
}

/// Hazard, damage and treasure tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// `(offset, probability)` pairs added to the base power.
    pub variance: Vec<(i32, f64)>,
    /// Bonus roll chance per hazard level.
    pub bonus_roll_per_level: f64,
    /// Encounter intensity per hazard level.
    pub intensity_per_level: f64,
    /// Intensity multiplier for bomb traps.
    pub bomb_intensity_modifier: f64,
    /// Intensity multiplier for green fog.
    pub fog_intensity_modifier: f64,
    /// Per-kind table.
    pub encounters: BTreeMap<EncounterKind, EncounterTuning>,
    /// Damage multiplier added per power level above 1.
    pub damage_scale_per_level: f64,
    /// ± fraction applied after scaling.
    pub damage_variance: f64,
    /// Armor points giving 50% reduction.
    pub armor_half_point: f64,
    /// Reduction ceiling.
    pub armor_max_reduction: f64,
    /// Blast radius at power 1.
    pub bomb_radius: i32,
    /// Radius grows by one every this many power levels.
    pub bomb_radius_levels_per_step: u8,
    /// Reinforced wall hardness at power 1.
    pub wall_trap_base_hardness: u32,
    /// Extra hardness per power level above 1.
    pub wall_trap_hardness_per_level: u32,
    /// Fog durability damage before power scaling.
    pub fog_durability_damage: u32,
    /// Burn fraction at power 1.
    pub fire_burn_base: f64,
    /// Burn fraction per power level above 1.
    pub fire_burn_per_level: f64,
    /// Burn fraction ceiling.
    pub fire_burn_cap: f64,
    /// Probability a lightning strike lands.
    pub lightning_stun_chance: f64,
    /// Action attempts a landed strike swallows.
    pub lightning_stun_actions: u32,
    /// Luck weight bonus per luck point per value tier.
    pub luck_weight_per_point: f64,
    /// Treasure table.
    pub treasure: Vec<LootEntry>,
    /// Item deposited when ore is mined.
    pub ore_item: String,
    /// Unit value of ore.
    pub ore_value: u64,
    /// Item deposited when rare ore is mined.
    pub rare_ore_item: String,
    /// Unit value of rare ore.
    pub rare_ore_value: u64,
}

impl Default for HazardConfig {
    fn default() -> Self {
        use EncounterKind::*;

        let row = |weight, min_power, base_damage, armor_wear| EncounterTuning {
            weight,
            min_power,
            base_damage,
            armor_wear,
        };
        let encounters = BTreeMap::from([
            (PortalTrap, row(15.0, 2, 8, 2)),
            (BombTrap, row(20.0, 1, 15, 5)),
            (GreenFog, row(15.0, 3, 6, 3)),
            (WallTrap, row(15.0, 2, 10, 3)),
            (FireBlast, row(10.0, 4, 12, 4)),
            (LightningStrike, row(10.0, 5, 20, 6)),
            (Treasure, row(25.0, 1, 0, 0)),
            (RareTreasure, row(8.0, 4, 0, 0)),
        ]);

        Self {
            variance: vec![(-1, 0.15), (0, 0.55), (1, 0.25), (2, 0.05)],
            bonus_roll_per_level: 0.1,
            intensity_per_level: 0.2,
            bomb_intensity_modifier: 1.25,
            fog_intensity_modifier: 0.85,
            encounters,
            damage_scale_per_level: 0.25,
            damage_variance: 0.25,
            armor_half_point: 50.0,
            armor_max_reduction: 0.8,
            bomb_radius: 2,
            bomb_radius_levels_per_step: 3,
            wall_trap_base_hardness: 3,
            wall_trap_hardness_per_level: 1,
            fog_durability_damage: 10,
            fire_burn_base: 0.1,
            fire_burn_per_level: 0.05,
            fire_burn_cap: 0.5,
            lightning_stun_chance: 0.35,
            lightning_stun_actions: 3,
            luck_weight_per_point: 0.1,
            treasure: vec![
                LootEntry::new("copper_coin", 5, 40.0, 5, LootDestination::Split),
                LootEntry::new("silver_coin", 15, 25.0, 3, LootDestination::Split),
                LootEntry::new("gold_nugget", 40, 15.0, 2, LootDestination::Shared),
                LootEntry::new("gemstone", 60, 12.0, 1, LootDestination::Personal),
                LootEntry::new("ancient_relic", 250, 3.0, 1, LootDestination::Personal),
            ],
            ore_item: "iron_ore".to_string(),
            ore_value: 8,
            rare_ore_item: "mythril_ore".to_string(),
            rare_ore_value: 45,
        }
    }
}

impl HazardConfig {
    /// Row for a kind, or a configuration error.
    pub fn tuning(&self, kind: EncounterKind) -> Result<&EncounterTuning> {
        self.encounters
            .get(&kind)
            .ok_or_else(|| EngineError::InvalidConfig(format!("no tuning for encounter `{kind}`")))
    }

    /// `1 + (power - 1) * damage_scale_per_level`.
    pub fn power_scale(&self, power_level: u8) -> f64 {
        1.0 + (power_level.max(1) - 1) as f64 * self.damage_scale_per_level
    }

    /// Bomb radius at a power level.
    pub fn bomb_radius_at(&self, power_level: u8) -> i32 {
        let step = self.bomb_radius_levels_per_step.max(1);
        self.bomb_radius + ((power_level.max(1) - 1) / step) as i32
    }

    /// Reinforced wall hardness at a power level.
    pub fn wall_trap_hardness_at(&self, power_level: u8) -> u32 {
        self.wall_trap_base_hardness + (power_level.max(1) - 1) as u32 * self.wall_trap_hardness_per_level
    }

    /// `min(cap, base + per_level * (power - 1))`.
    pub fn burn_fraction_at(&self, power_level: u8) -> f64 {
        let raw = self.fire_burn_base + self.fire_burn_per_level * (power_level.max(1) - 1) as f64;
        raw.min(self.fire_burn_cap)
    }

    fn validate(&self) -> Result<()> {
        let total: f64 = self.variance.iter().map(|(_, p)| *p).sum();
        if self.variance.is_empty() || (total - 1.0).abs() > 1e-6 {
            return Err(EngineError::InvalidConfig(format!(
                "variance probabilities must sum to 1, got {total}"
            )));
        }
        if self.encounters.values().all(|t| t.weight <= 0.0) {
            return Err(EngineError::InvalidConfig("encounter weights are all zero".into()));
        }
        for p in [
            self.lightning_stun_chance,
            self.fire_burn_base,
            self.fire_burn_cap,
            self.armor_max_reduction,
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(EngineError::InvalidConfig(format!("probability {p} outside [0, 1]")));
            }
        }
        if self.treasure.is_empty() || self.treasure.iter().all(|e| e.weight <= 0.0) {
            return Err(EngineError::InvalidConfig("treasure table is empty".into()));
        }
        if self.armor_half_point <= 0.0 {
            return Err(EngineError::InvalidConfig("armor_half_point must be positive".into()));
        }
        Ok(())
    }
}
