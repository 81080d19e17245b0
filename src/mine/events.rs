//! Mine Events
//!
//! Best-effort history of what happened inside an instance. Hosts render the
//! most recent lines in the channel; nothing in the engine reads them back.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, Position};
use crate::mine::encounter::EncounterKind;

/// What kind of line this is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MineEventKind {
    /// An encounter fired.
    EncounterResolved {
        /// Encounter type.
        kind: EncounterKind,
        /// Tile.
        position: Position,
    },
    /// Gear immunity cancelled an encounter.
    HazardResisted {
        /// Encounter type.
        kind: EncounterKind,
    },
    /// Ore or chest broken open.
    TileMined {
        /// Tile.
        position: Position,
    },
    /// Player died.
    PlayerDied,
    /// Auto-revive charm saved a player.
    AutoRevived,
    /// Break-time bulk revival.
    PlayersRevived {
        /// How many came back.
        count: usize,
    },
    /// Armor or another item broke.
    ItemBroken {
        /// Item key.
        item: String,
    },
    /// A dispatch or persistence problem worth surfacing.
    Notice,
}

/// One history line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineEvent {
    /// Wall-clock time it was recorded.
    pub at: DateTime<Utc>,
    /// Instance tick.
    pub tick: u64,
    /// Player involved.
    pub player: Option<PlayerId>,
    /// Event data.
    pub kind: MineEventKind,
    /// Human-readable line.
    pub message: String,
}

impl MineEvent {
    /// Create an event stamped now.
    pub fn new(tick: u64, player: Option<PlayerId>, kind: MineEventKind, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            tick,
            player,
            kind,
            message: message.into(),
        }
    }
}

/// Bounded ring of recent events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventHistory {
    capacity: usize,
    events: VecDeque<MineEvent>,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(50)
    }
}

impl EventHistory {
    /// History keeping at most `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::new(),
        }
    }

    /// Append, dropping the oldest line when full.
    pub fn push(&mut self, event: MineEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Change the bound, dropping the oldest lines that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MineEvent> {
        self.events.iter()
    }

    /// Most recent line.
    pub fn last(&self) -> Option<&MineEvent> {
        self.events.back()
    }

    /// Line count.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// No lines yet.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
