//! Encounters and the per-tile encounter map.
//!
//! An encounter is strictly one-shot:
//!
//! ```text
//! Untriggered ──arrival──▶ Triggered ──resolved──▶ Removed
//! ```
//!
//! `EncounterMap::take_for_trigger` performs the first transition and
//! removes the encounter from the map in the same step, so a second arrival
//! on the tile finds nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::Position;
use crate::error::{EngineError, Result};

/// Hazard or treasure type.
///
/// Stored by [`name`](Self::name); decoding an unrecognised name fails with
/// [`EngineError::UnknownEncounterKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EncounterKind {
    /// Teleports the player somewhere random.
    PortalTrap,
    /// Blasts surrounding rock into floor.
    BombTrap,
    /// Poison that also corrodes gear.
    GreenFog,
    /// Raises reinforced walls around the player.
    WallTrap,
    /// Burns part of the shared loot pool.
    FireBlast,
    /// May stun the player for several actions.
    LightningStrike,
    /// Common treasure.
    Treasure,
    /// Treasure biased to valuable items.
    RareTreasure,
}

impl EncounterKind {
    /// Every kind, in table order.
    pub const ALL: [EncounterKind; 8] = [
        EncounterKind::PortalTrap,
        EncounterKind::BombTrap,
        EncounterKind::GreenFog,
        EncounterKind::WallTrap,
        EncounterKind::FireBlast,
        EncounterKind::LightningStrike,
        EncounterKind::Treasure,
        EncounterKind::RareTreasure,
    ];

    /// Stable snake_case name.
    pub const fn name(self) -> &'static str {
        match self {
            EncounterKind::PortalTrap => "portal_trap",
            EncounterKind::BombTrap => "bomb_trap",
            EncounterKind::GreenFog => "green_fog",
            EncounterKind::WallTrap => "wall_trap",
            EncounterKind::FireBlast => "fire_blast",
            EncounterKind::LightningStrike => "lightning_strike",
            EncounterKind::Treasure => "treasure",
            EncounterKind::RareTreasure => "rare_treasure",
        }
    }

    /// Treasure kinds are never blocked by immunities.
    pub const fn is_treasure(self) -> bool {
        matches!(self, EncounterKind::Treasure | EncounterKind::RareTreasure)
    }
}

impl fmt::Display for EncounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncounterKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        EncounterKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| EngineError::UnknownEncounterKind(s.to_string()))
    }
}

impl From<EncounterKind> for String {
    fn from(kind: EncounterKind) -> Self {
        kind.name().to_string()
    }
}

impl TryFrom<String> for EncounterKind {
    type Error = EngineError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

/// Trigger lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterState {
    /// Waiting on the tile.
    Untriggered,
    /// Taken off the map, being resolved.
    Triggered,
    /// Resolved; never fires again.
    Removed,
}

/// An encounter bound to one tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    /// Type.
    pub kind: EncounterKind,
    /// Lifecycle state.
    pub state: EncounterState,
    /// Visible on the map.
    pub revealed: bool,
    /// Strength rolled at generation.
    pub intensity: f64,
}

impl Encounter {
    /// Fresh, hidden encounter.
    pub fn new(kind: EncounterKind, intensity: f64) -> Self {
        Self {
            kind,
            state: EncounterState::Untriggered,
            revealed: false,
            intensity,
        }
    }

    /// Final transition after resolution.
    pub fn mark_removed(&mut self) {
        self.state = EncounterState::Removed;
    }
}

/// Position → encounter, at most one per tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterMap {
    entries: BTreeMap<Position, Encounter>,
}

impl EncounterMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an encounter. Fails if the tile already carries one.
    pub fn insert(&mut self, pos: Position, encounter: Encounter) -> Result<()> {
        if self.entries.contains_key(&pos) {
            return Err(EngineError::TileOccupied(pos));
        }
        self.entries.insert(pos, encounter);
        Ok(())
    }

    /// Peek without triggering.
    pub fn get(&self, pos: Position) -> Option<&Encounter> {
        self.entries.get(&pos)
    }

    /// Untriggered → Triggered, removing the encounter from the map.
    pub fn take_for_trigger(&mut self, pos: Position) -> Option<Encounter> {
        let mut encounter = self.entries.remove(&pos)?;
        encounter.state = EncounterState::Triggered;
        encounter.revealed = true;
        Some(encounter)
    }

    /// Reveal any encounter at the given positions. Returns how many changed.
    pub fn reveal(&mut self, positions: &[Position]) -> usize {
        let mut changed = 0;
        for pos in positions {
            if let Some(e) = self.entries.get_mut(pos) {
                if !e.revealed {
                    e.revealed = true;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Number of live encounters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No live encounters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (&Position, &Encounter)> {
        self.entries.iter()
    }
}
