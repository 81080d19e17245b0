//! Mine scripts.
//!
//! A script is what one scheduler tick does to one instance. Scripts are
//! looked up by mine type in a [`ScriptRegistry`] owned by the scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::{Direction, PlayerId, RollSource};
use crate::error::{EngineError, Result};
use crate::mine::action::{ActionOutcome, ActionRunner};
use crate::mine::instance::MineInstance;
use crate::store::{ActivityKind, ActivitySink};

/// Everything a script may touch during one tick.
pub struct TickContext<'a> {
    /// Instance loaded for this tick.
    pub instance: &'a mut MineInstance,
    /// Movement, mining and resolution.
    pub actions: &'a ActionRunner,
    /// Activity counters.
    pub activity: &'a dyn ActivitySink,
    /// Tick's roll source, seeded from instance seed, channel and tick.
    pub rng: &'a mut dyn RollSource,
}

/// Counters for one scripted tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Action attempts made.
    pub actions: u32,
    /// Successful moves.
    pub moves: u32,
    /// Encounters fired.
    pub encounters: u32,
    /// Players that died.
    pub deaths: u32,
    /// Players revived at a break.
    pub revived: usize,
}

/// Per-mine-type tick behaviour.
#[async_trait]
pub trait MineScript: Send + Sync {
    /// Mine type this script drives.
    fn mine_type(&self) -> &str;

    /// Budget for one dispatch of this mine type.
    fn timeout(&self) -> Duration;

    /// Advance the instance by one tick.
    async fn run(&self, ctx: TickContext<'_>) -> Result<TickSummary>;
}

/// Mine type → script.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, Arc<dyn MineScript>>,
}

impl ScriptRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `standard` script.
    pub fn with_standard(config: &SchedulerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StandardMineScript::new("standard", config)));
        registry
    }

    /// Add or replace the script for its mine type.
    pub fn register(&mut self, script: Arc<dyn MineScript>) {
        self.scripts.insert(script.mine_type().to_string(), script);
    }

    /// Script for a mine type.
    pub fn get(&self, mine_type: &str) -> Result<Arc<dyn MineScript>> {
        self.scripts
            .get(mine_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownMineType(mine_type.to_string()))
    }

    /// Registered mine types.
    pub fn mine_types(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }
}

/// Scripted miners: every living player keeps digging along a heading.
#[derive(Clone, Debug)]
pub struct StandardMineScript {
    mine_type: String,
    timeout: Duration,
    actions_per_tick: u32,
    break_interval_ticks: u64,
    seconds_per_tick: u64,
}

impl StandardMineScript {
    /// Script for `mine_type` tuned from the scheduler config.
    pub fn new(mine_type: impl Into<String>, config: &SchedulerConfig) -> Self {
        Self {
            mine_type: mine_type.into(),
            timeout: config.dispatch_timeout(),
            actions_per_tick: config.actions_per_tick,
            break_interval_ticks: config.break_interval_ticks,
            seconds_per_tick: config.tick_interval().as_secs().max(1),
        }
    }

    fn reroll(rng: &mut dyn RollSource, avoid: Option<Direction>) -> Direction {
        let choices: Vec<Direction> = Direction::ALL.iter().copied().filter(|d| Some(*d) != avoid).collect();
        choices[rng.below(choices.len() as u32) as usize]
    }

    async fn play(&self, ctx: &mut TickContext<'_>, player: PlayerId, summary: &mut TickSummary) -> Result<()> {
        for _ in 0..self.actions_per_tick {
            let heading = match ctx.instance.player(player).and_then(|p| p.heading) {
                Some(heading) => heading,
                None => Self::reroll(ctx.rng, None),
            };
            ctx.instance.player_mut(player)?.heading = Some(heading);

            summary.actions += 1;
            let mut outcome = ctx.actions.perform(ctx.instance, player, heading, ctx.rng).await?;
            if outcome == ActionOutcome::Blocked {
                let turned = Self::reroll(ctx.rng, Some(heading));
                ctx.instance.player_mut(player)?.heading = Some(turned);
                outcome = ctx.actions.perform(ctx.instance, player, turned, ctx.rng).await?;
            }

            match outcome {
                ActionOutcome::Unable => break,
                ActionOutcome::Moved { resolution, .. } => {
                    summary.moves += 1;
                    if resolution.fired() {
                        summary.encounters += 1;
                    }
                    if resolution.damage.is_some_and(|d| d.is_dead) {
                        summary.deaths += 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MineScript for StandardMineScript {
    fn mine_type(&self) -> &str {
        &self.mine_type
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, mut ctx: TickContext<'_>) -> Result<TickSummary> {
        let mut summary = TickSummary::default();
        let channel = ctx.instance.channel;

        for player in ctx.instance.alive_players() {
            ctx.activity
                .record(player, channel, ActivityKind::SecondsInChannel, self.seconds_per_tick)
                .await?;
            self.play(&mut ctx, player, &mut summary).await?;
        }

        let tick = ctx.instance.tick;
        if self.break_interval_ticks > 0 && tick % self.break_interval_ticks == 0 {
            summary.revived = ctx.actions.resolver().status().revive_all_dead(ctx.instance).await;
        }

        debug!(
            "{} tick {}: {} action(s), {} move(s), {} encounter(s)",
            channel, tick, summary.actions, summary.moves, summary.encounters
        );
        Ok(summary)
    }
}
