//! Player actions: moving and mining.
//!
//! One action is one step toward a neighbouring tile. Open ground is walked
//! onto; rock and chests take hits until their hardness runs out. Arriving
//! on a tile fires whatever encounter sits there.
//!
//! `stuck` and `trapped` are never set by hand. They are re-derived from the
//! grid after every action, so a player stops being stuck the moment their
//! own tile is no longer rock. A stuck player's action always goes into
//! their own tile first.

use std::sync::Arc;

use tracing::debug;

use crate::core::{Direction, PlayerId, Position, RollSource};
use crate::error::Result;
use crate::mine::events::MineEventKind;
use crate::mine::instance::MineInstance;
use crate::mine::tile::TileKind;
use crate::resolve::{ResolutionEngine, ResolveOutcome};
use crate::store::{ActivityKind, ActivitySink, Collaborators, EquipmentProvider};

/// What one action attempt did.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    /// Dead or disabled.
    Unable,
    /// Attempt swallowed by a stun.
    Stunned {
        /// Attempts still swallowed after this one.
        remaining: u32,
    },
    /// Edge of the grid.
    Blocked,
    /// Rock took a hit but still stands.
    Dug {
        /// Tile being mined.
        at: Position,
        /// Hits still needed.
        hardness_left: u32,
    },
    /// Broke out of the rock the player was stuck in.
    Freed {
        /// Player's tile.
        at: Position,
    },
    /// Stepped onto a tile, breaking it first if needed.
    Moved {
        /// New position.
        to: Position,
        /// Kind of tile broken on the way in.
        broke: Option<TileKind>,
        /// Encounter or chest resolution on arrival.
        resolution: ResolveOutcome,
    },
}

/// Runs movement and mining for players of one instance.
#[derive(Clone)]
pub struct ActionRunner {
    resolver: ResolutionEngine,
    equipment: Arc<dyn EquipmentProvider>,
    activity: Arc<dyn ActivitySink>,
    sight_radius: i32,
}

impl ActionRunner {
    /// Runner sharing the resolver's collaborators.
    pub fn new(collaborators: &Collaborators, resolver: ResolutionEngine, sight_radius: i32) -> Self {
        Self {
            resolver,
            equipment: collaborators.equipment.clone(),
            activity: collaborators.activity.clone(),
            sight_radius,
        }
    }

    /// Resolution engine used on arrival.
    pub fn resolver(&self) -> &ResolutionEngine {
        &self.resolver
    }

    /// One action toward `direction`.
    pub async fn perform(
        &self,
        instance: &mut MineInstance,
        player: PlayerId,
        direction: Direction,
        rng: &mut dyn RollSource,
    ) -> Result<ActionOutcome> {
        let state = instance.player_mut(player)?;
        if !state.can_act() {
            return Ok(ActionOutcome::Unable);
        }
        if state.consume_stun() {
            return Ok(ActionOutcome::Stunned {
                remaining: state.stun_actions,
            });
        }
        let from = state.pos;
        let target = if state.stuck { from } else { from.step(direction) };

        let Some(tile) = instance.grid.get(target).copied() else {
            return Ok(ActionOutcome::Blocked);
        };

        let mut broke = None;
        if !tile.kind.is_walkable() {
            let loadout = self.equipment.get_equipped(player).await?;
            let power = 1 + loadout.bonuses.mining_power;
            let left = tile.hardness.saturating_sub(power);
            if left > 0 {
                if let Some(t) = instance.grid.get_mut(target) {
                    t.hardness = left;
                }
                return Ok(ActionOutcome::Dug {
                    at: target,
                    hardness_left: left,
                });
            }
            self.break_tile(instance, player, target, tile.kind)?;
            broke = Some(tile.kind);
        }

        if target == from {
            self.settle(instance, player)?;
            return Ok(ActionOutcome::Freed { at: target });
        }

        instance.player_mut(player)?.pos = target;
        self.activity
            .record(player, instance.channel, ActivityKind::TilesMoved, 1)
            .await?;
        self.settle(instance, player)?;

        let resolution = if broke == Some(TileKind::TreasureChest) {
            self.resolver.open_chest(instance, player, target, rng).await?
        } else {
            self.resolver.resolve(instance, player, target, rng).await?
        };
        debug!("{} moved {} -> {}", player, from, target);
        Ok(ActionOutcome::Moved {
            to: target,
            broke,
            resolution,
        })
    }

    fn break_tile(&self, instance: &mut MineInstance, player: PlayerId, at: Position, kind: TileKind) -> Result<()> {
        if let Some(t) = instance.grid.get_mut(at) {
            t.clear();
        }
        let config = self.resolver.config();
        let ore = match kind {
            TileKind::WallWithOre => Some((config.ore_item.clone(), config.ore_value)),
            TileKind::RareOre => Some((config.rare_ore_item.clone(), config.rare_ore_value)),
            _ => None,
        };
        if let Some((item, value)) = ore {
            instance.loot.deposit(player, &item, 1, value);
            instance.record(
                Some(player),
                MineEventKind::TileMined { position: at },
                format!("{} dug out {} for the group", player, item),
            );
        }
        Ok(())
    }

    /// Reveal around the player and re-derive their geometry flags.
    fn settle(&self, instance: &mut MineInstance, player: PlayerId) -> Result<()> {
        let pos = instance.player_mut(player)?.pos;
        instance.grid.reveal_around(pos, self.sight_radius);
        let seen = instance.grid.positions_within(pos, self.sight_radius);
        instance.encounters.reveal(&seen);
        let grid = &instance.grid;
        if let Some(state) = instance.players.get_mut(&player) {
            state.refresh_geometry(grid);
        }
        Ok(())
    }
}
