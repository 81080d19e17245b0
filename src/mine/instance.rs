//! Mine instance state.
//!
//! One instance per active voice channel. The persisted document is the
//! source of truth: the scheduler loads it at the start of a dispatch,
//! mutates it while holding the channel lock, and saves it back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{ChannelId, Direction, PlayerId, Position};
use crate::error::{EngineError, Result};
use crate::mine::encounter::EncounterMap;
use crate::mine::events::{EventHistory, MineEvent, MineEventKind};
use crate::mine::loot::LootPool;
use crate::mine::tile::TileGrid;

/// Highest declared power / hazard level.
pub const MAX_LEVEL: u8 = 7;

/// A player's place and condition inside the mine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPosition {
    /// Tile the player occupies.
    pub pos: Position,
    /// Standing inside rock.
    pub stuck: bool,
    /// No walkable tile around.
    pub trapped: bool,
    /// Cannot act.
    pub disabled: bool,
    /// Waiting for revival.
    pub dead: bool,
    /// Hidden from the rendered map.
    pub invisible: bool,
    /// Remaining action attempts swallowed by a stun.
    pub stun_actions: u32,
    /// Direction the player keeps mining toward.
    pub heading: Option<Direction>,
}

impl PlayerPosition {
    /// Healthy player standing on `pos`.
    pub fn at(pos: Position) -> Self {
        Self {
            pos,
            stuck: false,
            trapped: false,
            disabled: false,
            dead: false,
            invisible: false,
            stun_actions: 0,
            heading: None,
        }
    }

    /// Neither dead nor disabled.
    pub fn can_act(&self) -> bool {
        !self.dead && !self.disabled
    }

    /// Currently stunned.
    pub fn is_stunned(&self) -> bool {
        self.stun_actions > 0
    }

    /// Stun for the next `actions` attempts. A longer running stun wins.
    pub fn stun(&mut self, actions: u32) {
        self.stun_actions = self.stun_actions.max(actions);
    }

    /// Spend one stunned attempt. Returns true if the attempt was swallowed.
    pub fn consume_stun(&mut self) -> bool {
        if self.stun_actions == 0 {
            return false;
        }
        self.stun_actions -= 1;
        true
    }

    /// Re-derive `stuck` and `trapped` from the grid.
    ///
    /// Stuck: the player's own tile is rock. Trapped: no neighbour is
    /// walkable. Both clear as soon as the geometry no longer holds.
    pub fn refresh_geometry(&mut self, grid: &TileGrid) {
        self.stuck = grid.kind_at(self.pos).is_some_and(|k| k.is_wall_type());
        self.trapped = !grid.has_walkable_neighbor(self.pos);
    }

    /// Dead: moved to the entrance, hidden and disabled until revived.
    pub fn die(&mut self, entrance: Position) {
        self.pos = entrance;
        self.dead = true;
        self.invisible = true;
        self.disabled = true;
        self.stuck = false;
        self.trapped = false;
        self.stun_actions = 0;
        self.heading = None;
    }

    /// Clear every status flag.
    pub fn revive(&mut self) {
        self.dead = false;
        self.invisible = false;
        self.disabled = false;
        self.stuck = false;
        self.trapped = false;
        self.stun_actions = 0;
    }
}

/// Channel-scoped mine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineInstance {
    /// Bound voice channel.
    pub channel: ChannelId,
    /// Shallower instance this one descends from.
    pub parent: Option<ChannelId>,
    /// 0 for a surface mine.
    pub depth: u8,
    /// Script key.
    pub mine_type: String,
    /// Seed fixed at generation; tick seeds derive from it.
    pub seed: u64,
    /// Declared power, 1..=7.
    pub power_level: u8,
    /// Rolled hazard level, 1..=7.
    pub hazard_level: u8,
    /// Tiles.
    pub grid: TileGrid,
    /// Live encounters.
    pub encounters: EncounterMap,
    /// Group loot.
    pub loot: LootPool,
    /// Players present.
    pub players: BTreeMap<PlayerId, PlayerPosition>,
    /// Ticks processed.
    pub tick: u64,
    /// Recent events.
    pub history: EventHistory,
}

impl MineInstance {
    /// New instance with no players.
    pub fn new(
        channel: ChannelId,
        mine_type: impl Into<String>,
        power_level: u8,
        hazard_level: u8,
        grid: TileGrid,
        seed: u64,
    ) -> Self {
        Self {
            channel,
            parent: None,
            depth: 0,
            mine_type: mine_type.into(),
            seed,
            power_level: power_level.clamp(1, MAX_LEVEL),
            hazard_level: hazard_level.clamp(1, MAX_LEVEL),
            grid,
            encounters: EncounterMap::new(),
            loot: LootPool::new(),
            players: BTreeMap::new(),
            tick: 0,
            history: EventHistory::default(),
        }
    }

    /// Deeper instance below this one: one level more powerful.
    pub fn child(&self, channel: ChannelId, grid: TileGrid, hazard_level: u8, seed: u64) -> Self {
        let mut child = Self::new(
            channel,
            self.mine_type.clone(),
            self.power_level.saturating_add(1),
            hazard_level,
            grid,
            seed,
        );
        child.parent = Some(self.channel);
        child.depth = self.depth.saturating_add(1);
        child
    }

    /// Entrance coordinate.
    pub fn entrance(&self) -> Position {
        self.grid.entrance()
    }

    /// Place a player on the entrance. Re-joining keeps the old position.
    pub fn add_player(&mut self, player: PlayerId) -> &mut PlayerPosition {
        let entrance = self.entrance();
        self.players
            .entry(player)
            .or_insert_with(|| PlayerPosition::at(entrance))
    }

    /// Remove a player, returning their last state.
    pub fn remove_player(&mut self, player: PlayerId) -> Option<PlayerPosition> {
        self.players.remove(&player)
    }

    /// Player state.
    pub fn player(&self, player: PlayerId) -> Option<&PlayerPosition> {
        self.players.get(&player)
    }

    /// Player state or a domain error.
    pub fn player_mut(&mut self, player: PlayerId) -> Result<&mut PlayerPosition> {
        let channel = self.channel;
        self.players
            .get_mut(&player)
            .ok_or(EngineError::PlayerNotInMine { player, channel })
    }

    /// Current position of every player.
    pub fn positions(&self) -> BTreeMap<PlayerId, Position> {
        self.players.iter().map(|(id, p)| (*id, p.pos)).collect()
    }

    /// Players that are not dead, in id order.
    pub fn alive_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, p)| !p.dead)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Players waiting for revival, in id order.
    pub fn dead_players(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, p)| p.dead)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Append a history line at the current tick.
    pub fn record(&mut self, player: Option<PlayerId>, kind: MineEventKind, message: impl Into<String>) {
        let event = MineEvent::new(self.tick, player, kind, message);
        self.history.push(event);
    }
}
