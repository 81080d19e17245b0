//! Gear bonus registry.
//!
//! Each item key maps to a pure contribution function. A player's derived
//! bonuses are a fold of the contributions of everything they have equipped,
//! so adding an item means adding a registry entry and nothing else.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::mine::encounter::EncounterKind;

/// Equipment slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSlot {
    /// Worn armor; the best piece absorbs hits.
    Armor,
    /// Pickaxes and other tools.
    Tool,
    /// Charms, amulets, trinkets.
    Accessory,
}

/// An item a player has equipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquippedItem {
    /// Item key.
    pub key: String,
    /// Slot.
    pub slot: ItemSlot,
    /// Armor rating (armor pieces only).
    pub armor_points: u32,
    /// Remaining durability.
    pub durability: u32,
    /// Durability when new.
    pub max_durability: u32,
    /// Legendary, one-of-a-kind; immune to durability loss.
    pub unique: bool,
    /// Stack size.
    pub quantity: u32,
}

impl EquippedItem {
    /// Single, non-unique item at full durability.
    pub fn new(key: impl Into<String>, slot: ItemSlot, max_durability: u32) -> Self {
        Self {
            key: key.into(),
            slot,
            armor_points: 0,
            durability: max_durability,
            max_durability,
            unique: false,
            quantity: 1,
        }
    }

    /// Builder: armor rating.
    pub fn with_armor(mut self, points: u32) -> Self {
        self.armor_points = points;
        self
    }

    /// Builder: unique flag.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Builder: stack size.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

/// One-time death interception.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutoRevive {
    /// Item consumed when it fires.
    pub item: String,
    /// Fraction of max health restored.
    pub restore_fraction: f64,
}

/// Bonuses derived from equipped gear.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GearBonuses {
    /// Extra armor points on top of the best armor piece.
    pub armor_points: u32,
    /// Encounter kinds that have no effect.
    pub immunities: BTreeSet<EncounterKind>,
    /// Fraction of durability damage prevented, 0..=0.9.
    pub durability_reduction: f64,
    /// Treasure luck.
    pub luck: u32,
    /// Extra mining hits per action.
    pub mining_power: u32,
    /// Strongest auto-revive effect.
    pub auto_revive: Option<AutoRevive>,
}

/// Cap on combined durability reduction.
pub const MAX_DURABILITY_REDUCTION: f64 = 0.9;

impl GearBonuses {
    /// Combine two contributions.
    pub fn combine(mut self, other: GearBonuses) -> GearBonuses {
        self.armor_points += other.armor_points;
        self.immunities.extend(other.immunities);
        let kept = (1.0 - self.durability_reduction) * (1.0 - other.durability_reduction);
        self.durability_reduction = (1.0 - kept).clamp(0.0, MAX_DURABILITY_REDUCTION);
        self.luck += other.luck;
        self.mining_power += other.mining_power;
        self.auto_revive = match (self.auto_revive, other.auto_revive) {
            (Some(a), Some(b)) if b.restore_fraction > a.restore_fraction => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        self
    }

    /// Fold many contributions.
    pub fn fold(parts: impl IntoIterator<Item = GearBonuses>) -> GearBonuses {
        parts.into_iter().fold(GearBonuses::default(), GearBonuses::combine)
    }

    /// Immune to this encounter kind.
    pub fn is_immune(&self, kind: EncounterKind) -> bool {
        !kind.is_treasure() && self.immunities.contains(&kind)
    }
}

/// Pure contribution function.
pub type BonusFn = fn(&EquippedItem) -> GearBonuses;

/// Item key → contribution.
#[derive(Clone)]
pub struct BonusRegistry {
    entries: BTreeMap<String, BonusFn>,
}

impl Default for BonusRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn immune(kinds: &[EncounterKind]) -> BTreeSet<EncounterKind> {
    kinds.iter().copied().collect()
}

impl BonusRegistry {
    /// Registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The stock item set.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("iron_bracers", |_| GearBonuses {
            armor_points: 10,
            ..Default::default()
        });
        registry.register("gas_mask", |_| GearBonuses {
            immunities: immune(&[EncounterKind::GreenFog]),
            durability_reduction: 0.25,
            ..Default::default()
        });
        registry.register("rubber_boots", |_| GearBonuses {
            immunities: immune(&[EncounterKind::LightningStrike]),
            ..Default::default()
        });
        registry.register("fireproof_cloak", |_| GearBonuses {
            immunities: immune(&[EncounterKind::FireBlast]),
            armor_points: 5,
            ..Default::default()
        });
        registry.register("blast_shield", |_| GearBonuses {
            immunities: immune(&[EncounterKind::BombTrap]),
            ..Default::default()
        });
        registry.register("warding_amulet", |_| GearBonuses {
            immunities: immune(&[EncounterKind::PortalTrap, EncounterKind::WallTrap]),
            ..Default::default()
        });
        registry.register("oilskin_gloves", |_| GearBonuses {
            durability_reduction: 0.5,
            ..Default::default()
        });
        registry.register("lucky_charm", |item| GearBonuses {
            luck: 3 * item.quantity.max(1),
            ..Default::default()
        });
        registry.register("steel_pickaxe", |_| GearBonuses {
            mining_power: 1,
            ..Default::default()
        });
        registry.register("phoenix_feather", |item| GearBonuses {
            auto_revive: Some(AutoRevive {
                item: item.key.clone(),
                restore_fraction: 0.5,
            }),
            ..Default::default()
        });
        registry.register("earthshaker", |_| GearBonuses {
            mining_power: 3,
            luck: 2,
            durability_reduction: 0.2,
            ..Default::default()
        });
        registry
    }

    /// Add or replace an entry.
    pub fn register(&mut self, key: &str, f: BonusFn) {
        self.entries.insert(key.to_string(), f);
    }

    /// Whether a key is known.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Contribution of one item; unknown keys contribute nothing.
    pub fn contribution(&self, item: &EquippedItem) -> GearBonuses {
        self.entries
            .get(&item.key)
            .map(|f| f(item))
            .unwrap_or_default()
    }

    /// Fold all equipped items.
    pub fn aggregate(&self, items: &[EquippedItem]) -> GearBonuses {
        GearBonuses::fold(items.iter().map(|i| self.contribution(i)))
    }
}
