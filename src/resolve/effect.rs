//! Computed encounter effects.
//!
//! Handlers never touch the instance. They read the grid and the player's
//! loadout and describe what should happen; [`super::ResolutionEngine`]
//! applies the description in one pass.

use crate::config::HazardConfig;
use crate::core::{PlayerId, Position};
use crate::mine::encounter::EncounterKind;
use crate::mine::tile::{Tile, TileGrid};
use crate::player::damage::DamageSource;
use crate::store::Loadout;

/// Read-only inputs for computing an effect.
#[derive(Clone, Copy)]
pub struct EffectContext<'a> {
    /// Hazard tuning.
    pub config: &'a HazardConfig,
    /// Grid as it stands before the effect.
    pub grid: &'a TileGrid,
    /// Player triggering the encounter.
    pub player: PlayerId,
    /// Tile the encounter sits on.
    pub position: Position,
    /// Instance power level.
    pub power_level: u8,
    /// Triggering player's gear.
    pub loadout: &'a Loadout,
}

/// A hit to apply through the status tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageSpec {
    /// Base damage before scaling.
    pub base: u32,
    /// Base armor wear before scaling.
    pub armor_wear: u32,
    /// Kind of harm.
    pub source: DamageSource,
}

/// One found item and where its units go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LootShare {
    /// Item key.
    pub item: String,
    /// Value per unit.
    pub unit_value: u64,
    /// Units for the finder's inventory.
    pub personal: u32,
    /// Units for the shared pool.
    pub shared: u32,
}

impl LootShare {
    /// Total units found.
    pub fn quantity(&self) -> u32 {
        self.personal + self.shared
    }

    /// Total value found.
    pub fn value(&self) -> u64 {
        self.unit_value * self.quantity() as u64
    }
}

/// Everything an encounter does, computed up front.
#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    /// Encounter that produced it.
    pub kind: EncounterKind,
    /// Tiles to overwrite.
    pub tile_changes: Vec<(Position, Tile)>,
    /// New position for the player.
    pub relocate: Option<Position>,
    /// Hit to apply.
    pub damage: Option<DamageSpec>,
    /// Actions to stun for.
    pub stun: Option<u32>,
    /// Fraction of the shared pool to burn.
    pub burn_fraction: Option<f64>,
    /// Durability damage per equipped item.
    pub item_wear: Vec<(String, u32)>,
    /// Found items.
    pub loot: Vec<LootShare>,
    /// History line.
    pub message: String,
}

impl Effect {
    /// An effect that changes nothing.
    pub fn nothing(kind: EncounterKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            tile_changes: Vec::new(),
            relocate: None,
            damage: None,
            stun: None,
            burn_fraction: None,
            item_wear: Vec::new(),
            loot: Vec::new(),
            message: message.into(),
        }
    }

    /// Builder: attach a hit.
    pub fn with_damage(mut self, damage: DamageSpec) -> Self {
        self.damage = Some(damage);
        self
    }

    /// Whether the grid changes.
    pub fn changes_map(&self) -> bool {
        !self.tile_changes.is_empty()
    }

    /// Total units of found items.
    pub fn items_found(&self) -> u32 {
        self.loot.iter().map(LootShare::quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loot_share_totals() {
        let share = LootShare {
            item: "gold_nugget".into(),
            unit_value: 40,
            personal: 1,
            shared: 2,
        };
        assert_eq!(share.quantity(), 3);
        assert_eq!(share.value(), 120);

        let mut effect = Effect::nothing(EncounterKind::Treasure, "found gold");
        effect.loot.push(share);
        assert_eq!(effect.items_found(), 3);
        assert!(!effect.changes_map());
    }
}
