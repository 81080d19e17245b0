//! Tick Scheduler
//!
//! Fixed-interval driver for every active instance. Each cycle lists the
//! active channels and dispatches them in bounded-parallel batches
//! (dispatch all, await all). A dispatch:
//!
//! 1. takes the channel lease, or skips the channel this cycle;
//! 2. loads the instance and looks up the script for its mine type;
//! 3. extends the lease to cover the script's timeout, or drops the tick
//!    if the lease was already lost;
//! 4. runs the script and saves, raced against the script's timeout;
//! 5. drops the lease, whatever happened.
//!
//! Failures stay inside their channel. Nothing is saved for a failed or
//! abandoned tick; the stored document is retried next cycle.
//!
//! Delivery is at-least-once. Health, equipment and activity writes happen
//! while the script runs, before the instance is saved, so a tick whose
//! save fails is replayed from the old document with the same seed and
//! those writes land a second time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, SchedulerConfig};
use crate::core::{ChannelId, DeterministicRng};
use crate::error::{EngineError, Result};
use crate::mine::action::ActionRunner;
use crate::mine::events::MineEventKind;
use crate::resolve::ResolutionEngine;
use crate::session::lock::{ChannelLockManager, LockLease};
use crate::session::script::{ScriptRegistry, TickContext, TickSummary};
use crate::store::Collaborators;

/// What happened to one channel in one cycle.
#[derive(Clone, Debug)]
pub enum ChannelOutcome {
    /// Ticked and saved.
    Completed(TickSummary),
    /// Lock held elsewhere.
    Skipped,
    /// Abandoned after the time budget.
    TimedOut,
    /// Missing mine type or bad data; skipped without saving.
    Misconfigured(EngineError),
    /// Persistence or domain failure; nothing saved.
    Failed(EngineError),
}

impl ChannelOutcome {
    fn from_error(err: EngineError) -> Self {
        match err {
            EngineError::DispatchTimeout { .. } => ChannelOutcome::TimedOut,
            e if e.is_config() => ChannelOutcome::Misconfigured(e),
            e => ChannelOutcome::Failed(e),
        }
    }

    /// Ticked and saved.
    pub fn is_completed(&self) -> bool {
        matches!(self, ChannelOutcome::Completed(_))
    }
}

/// Summary of one scheduler cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Expired locks removed by this cycle's sweep.
    pub swept: usize,
    /// Per-channel outcomes in dispatch order.
    pub outcomes: Vec<(ChannelId, ChannelOutcome)>,
}

impl CycleReport {
    /// Outcome for one channel.
    pub fn outcome(&self, channel: ChannelId) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|(c, _)| *c == channel).map(|(_, o)| o)
    }

    /// Channels that completed.
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_completed()).count()
    }

    /// Channels skipped because they were locked.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ChannelOutcome::Skipped))
            .count()
    }
}

/// Drives every active instance on a fixed interval.
pub struct TickScheduler {
    config: SchedulerConfig,
    collaborators: Collaborators,
    scripts: Arc<ScriptRegistry>,
    locks: ChannelLockManager,
    actions: ActionRunner,
    owner: String,
    cycle: AtomicU64,
    shutdown_tx: broadcast::Sender<()>,
}

impl TickScheduler {
    /// Scheduler with its own lock table.
    pub fn new(config: &EngineConfig, collaborators: Collaborators, scripts: ScriptRegistry) -> Self {
        let resolver = ResolutionEngine::new(&collaborators, Arc::new(config.hazard.clone()));
        let actions = ActionRunner::new(&collaborators, resolver, config.scheduler.sight_radius);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config: config.scheduler.clone(),
            collaborators,
            scripts: Arc::new(scripts),
            locks: ChannelLockManager::new(),
            actions,
            owner: format!("scheduler-{}", Uuid::new_v4()),
            cycle: AtomicU64::new(0),
            shutdown_tx,
        }
    }

    /// Share a lock table with other schedulers.
    pub fn with_lock_manager(mut self, locks: ChannelLockManager) -> Self {
        self.locks = locks;
        self
    }

    /// Lock table in use.
    pub fn locks(&self) -> &ChannelLockManager {
        &self.locks
    }

    /// Owner tag written into lock entries.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn run(&self) {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Scheduler started, ticking every {:?}", self.config.tick_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    debug!(
                        "Cycle {}: {}/{} channels ticked, {} skipped",
                        report.cycle,
                        report.completed(),
                        report.outcomes.len(),
                        report.skipped()
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
    }

    /// Stop [`run`](Self::run) after the current cycle.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// One pass over every active channel.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        let sweep_every = self.config.sweep_every_cycles.max(1);
        if cycle % sweep_every == 0 {
            report.swept = self.locks.cleanup_expired();
            if report.swept > 0 {
                debug!("Swept {} expired lock(s)", report.swept);
            }
        }

        let channels = match self.collaborators.instances.active_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Could not list active channels: {}", e);
                return report;
            }
        };

        for batch in channels.chunks(self.config.max_parallel.max(1)) {
            let results = join_all(batch.iter().map(|channel| self.dispatch_channel(*channel))).await;
            report.outcomes.extend(batch.iter().copied().zip(results));
        }
        report
    }

    /// Lock, tick and release one channel.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn dispatch_channel(&self, channel: ChannelId) -> ChannelOutcome {
        let Some(lease) = self.locks.lease(channel, &self.owner, self.config.lock_timeout()) else {
            debug!("{} is locked, skipping this cycle", channel);
            return ChannelOutcome::Skipped;
        };

        let outcome = match self.tick_channel(&lease).await {
            Ok(summary) => ChannelOutcome::Completed(summary),
            Err(e) => ChannelOutcome::from_error(e),
        };

        match &outcome {
            ChannelOutcome::TimedOut => warn!("{} dispatch timed out, abandoned", channel),
            ChannelOutcome::Misconfigured(e) => {
                error!("{} skipped: {}", channel, e);
                self.note_failure(&lease, e).await;
            }
            ChannelOutcome::Failed(e) if e.is_transient() => warn!("{} tick dropped: {}", channel, e),
            ChannelOutcome::Failed(e) => {
                warn!("{} tick failed: {}", channel, e);
                self.note_failure(&lease, e).await;
            }
            ChannelOutcome::Completed(_) | ChannelOutcome::Skipped => {}
        }
        outcome
    }

    /// Append a notice to the stored document. Best effort: skipped when the
    /// lease cannot be extended, and a store failure here is only logged.
    async fn note_failure(&self, lease: &LockLease, err: &EngineError) {
        let channel = lease.channel();
        let instances = &self.collaborators.instances;
        let budget = self.config.dispatch_timeout();
        if !lease.extend(budget) {
            debug!("lost {} before noting failure", channel);
            return;
        }
        let noted = timeout(budget, async {
            let mut instance = instances.load(channel).await?;
            instance.history.set_capacity(self.config.history_capacity);
            instance.record(None, MineEventKind::Notice, format!("Tick skipped: {err}"));
            instances.save(channel, &instance).await
        })
        .await;
        match noted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("could not note failure on {}: {}", channel, e),
            Err(_) => debug!("noting failure on {} timed out", channel),
        }
    }

    async fn tick_channel(&self, lease: &LockLease) -> Result<TickSummary> {
        let channel = lease.channel();
        let instances = &self.collaborators.instances;

        let load_budget = self.config.dispatch_timeout();
        let mut instance = timeout(load_budget, instances.load(channel))
            .await
            .map_err(|_| EngineError::DispatchTimeout {
                channel,
                after: load_budget,
            })??;
        instance.history.set_capacity(self.config.history_capacity);

        let script = self.scripts.get(&instance.mine_type)?;
        let budget = script.timeout();

        // The hold must outlive the script's own budget, which may exceed
        // the acquire timeout.
        if !lease.extend(budget + self.config.dispatch_timeout()) {
            return Err(EngineError::LeaseLost(channel));
        }

        let work = async {
            instance.tick += 1;
            let mut rng = DeterministicRng::for_tick(instance.seed, channel, instance.tick);
            let summary = script
                .run(TickContext {
                    instance: &mut instance,
                    actions: &self.actions,
                    activity: self.collaborators.activity.as_ref(),
                    rng: &mut rng,
                })
                .await?;
            instances.save(channel, &instance).await?;
            Ok::<TickSummary, EngineError>(summary)
        };

        timeout(budget, work)
            .await
            .map_err(|_| EngineError::DispatchTimeout { channel, after: budget })?
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::{Direction, PlayerId, Position};
    use crate::mine::encounter::{Encounter, EncounterKind};
    use crate::mine::instance::MineInstance;
    use crate::mine::tile::{TileGrid, TileKind};
    use crate::session::script::MineScript;
    use crate::store::memory::{in_memory, MemoryHandles};
    use crate::store::HealthStore;

    struct SlowScript;

    #[async_trait]
    impl MineScript for SlowScript {
        fn mine_type(&self) -> &str {
            "slow"
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn run(&self, _ctx: TickContext<'_>) -> Result<TickSummary> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TickSummary::default())
        }
    }

    /// Runs longer than the lock timeout but inside its own budget.
    struct LongScript;

    #[async_trait]
    impl MineScript for LongScript {
        fn mine_type(&self) -> &str {
            "long"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(60)
        }

        async fn run(&self, _ctx: TickContext<'_>) -> Result<TickSummary> {
            tokio::time::sleep(Duration::from_secs(40)).await;
            Ok(TickSummary::default())
        }
    }

    fn instance(channel: u64, mine_type: &str) -> MineInstance {
        let grid = TileGrid::filled(8, 8, TileKind::Floor, Position::new(0, 0)).unwrap();
        let mut mine = MineInstance::new(ChannelId(channel), mine_type, 2, 2, grid, channel * 31);
        mine.add_player(PlayerId(channel * 10));
        mine
    }

    fn scheduler(config: EngineConfig) -> (TickScheduler, MemoryHandles) {
        let (collab, mem) = in_memory();
        let mut scripts = ScriptRegistry::with_standard(&config.scheduler);
        scripts.register(Arc::new(SlowScript));
        scripts.register(Arc::new(LongScript));
        (TickScheduler::new(&config, collab, scripts), mem)
    }

    fn stored_tick(mem: &MemoryHandles, channel: u64) -> u64 {
        mem.instances.get(ChannelId(channel)).unwrap().tick
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_ticks_and_saves() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        mem.instances.insert(&instance(1, "standard")).unwrap();
        mem.instances.insert(&instance(2, "standard")).unwrap();

        let report = scheduler.run_cycle().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.completed(), 2);
        assert_eq!(stored_tick(&mem, 1), 1);
        assert_eq!(stored_tick(&mem, 2), 1);
        assert!(!scheduler.locks().is_locked(ChannelId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_channel_is_skipped() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        mem.instances.insert(&instance(1, "standard")).unwrap();
        mem.instances.insert(&instance(2, "standard")).unwrap();
        assert!(scheduler.locks().acquire(ChannelId(1), "elsewhere", Duration::from_secs(60)));

        let report = scheduler.run_cycle().await;
        assert!(matches!(report.outcome(ChannelId(1)), Some(ChannelOutcome::Skipped)));
        assert!(report.outcome(ChannelId(2)).unwrap().is_completed());
        assert_eq!(stored_tick(&mem, 1), 0);

        // Still held by the other owner.
        assert_eq!(scheduler.locks().entry(ChannelId(1)).unwrap().owner, "elsewhere");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_lock_table_between_schedulers() {
        let locks = ChannelLockManager::new();
        let (first, mem) = scheduler(EngineConfig::default());
        let first = first.with_lock_manager(locks.clone());
        mem.instances.insert(&instance(1, "standard")).unwrap();

        let (second, _) = scheduler(EngineConfig::default());
        let second = second.with_lock_manager(locks.clone());
        assert_ne!(first.owner(), second.owner());

        let _held = locks.lease(ChannelId(1), second.owner(), Duration::from_secs(60)).unwrap();
        assert!(matches!(first.dispatch_channel(ChannelId(1)).await, ChannelOutcome::Skipped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_and_releases_lock() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        mem.instances.insert(&instance(1, "slow")).unwrap();
        mem.instances.insert(&instance(2, "standard")).unwrap();

        let report = scheduler.run_cycle().await;
        assert!(matches!(report.outcome(ChannelId(1)), Some(ChannelOutcome::TimedOut)));
        assert!(report.outcome(ChannelId(2)).unwrap().is_completed());
        assert!(!scheduler.locks().is_locked(ChannelId(1)));
        assert_eq!(stored_tick(&mem, 1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_load_times_out() {
        let config = EngineConfig {
            scheduler: SchedulerConfig {
                dispatch_timeout_ms: 50,
                ..SchedulerConfig::default()
            },
            ..EngineConfig::default()
        };
        let (scheduler, mem) = scheduler(config);
        mem.instances.insert(&instance(1, "standard")).unwrap();
        mem.instances.set_load_delay(Some(Duration::from_secs(1)));

        let outcome = scheduler.dispatch_channel(ChannelId(1)).await;
        assert!(matches!(outcome, ChannelOutcome::TimedOut));
        assert!(!scheduler.locks().is_locked(ChannelId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_drops_tick() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        mem.instances.insert(&instance(1, "standard")).unwrap();
        mem.instances.fail_next_saves(1);

        let outcome = scheduler.dispatch_channel(ChannelId(1)).await;
        match outcome {
            ChannelOutcome::Failed(e) => assert!(e.is_transient()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stored_tick(&mem, 1), 0);
        assert!(!scheduler.locks().is_locked(ChannelId(1)));

        // Retried from the stored document next time.
        assert!(scheduler.dispatch_channel(ChannelId(1)).await.is_completed());
        assert_eq!(stored_tick(&mem, 1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_mine_type_skips_only_that_channel() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        mem.instances.insert(&instance(1, "volcanic")).unwrap();
        mem.instances.insert(&instance(2, "standard")).unwrap();

        let report = scheduler.run_cycle().await;
        assert!(matches!(
            report.outcome(ChannelId(1)),
            Some(ChannelOutcome::Misconfigured(EngineError::UnknownMineType(_)))
        ));
        assert!(report.outcome(ChannelId(2)).unwrap().is_completed());
        assert_eq!(stored_tick(&mem, 1), 0);

        let stored = mem.instances.get(ChannelId(1)).unwrap();
        let notice = stored.history.last().unwrap();
        assert_eq!(notice.kind, MineEventKind::Notice);
        assert!(notice.message.contains("volcanic"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_capacity_applied_on_load() {
        let config = EngineConfig {
            scheduler: SchedulerConfig {
                history_capacity: 1,
                ..SchedulerConfig::default()
            },
            ..EngineConfig::default()
        };
        let (scheduler, mem) = scheduler(config);
        let mut mine = instance(1, "standard");
        for i in 0..5 {
            mine.record(None, MineEventKind::Notice, format!("old {i}"));
        }
        mem.instances.insert(&mine).unwrap();

        assert!(scheduler.dispatch_channel(ChannelId(1)).await.is_completed());
        assert!(mem.instances.get(ChannelId(1)).unwrap().history.len() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_cover_every_channel() {
        let config = EngineConfig {
            scheduler: SchedulerConfig {
                max_parallel: 2,
                ..SchedulerConfig::default()
            },
            ..EngineConfig::default()
        };
        let (scheduler, mem) = scheduler(config);
        for c in 1..=5 {
            mem.instances.insert(&instance(c, "standard")).unwrap();
        }
        let report = scheduler.run_cycle().await;
        assert_eq!(report.completed(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_on_schedule() {
        let config = EngineConfig {
            scheduler: SchedulerConfig {
                sweep_every_cycles: 2,
                ..SchedulerConfig::default()
            },
            ..EngineConfig::default()
        };
        let (scheduler, _) = scheduler(config);
        let scheduler = scheduler.with_lock_manager(ChannelLockManager::without_timers());
        scheduler.locks().acquire(ChannelId(77), "gone", Duration::from_millis(10));
        tokio::time::advance(Duration::from_secs(1)).await;

        assert_eq!(scheduler.run_cycle().await.swept, 0);
        assert_eq!(scheduler.run_cycle().await.swept, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let config = EngineConfig {
            scheduler: SchedulerConfig {
                tick_interval_ms: 1_000,
                ..SchedulerConfig::default()
            },
            ..EngineConfig::default()
        };
        let (scheduler, mem) = scheduler(config);
        mem.instances.insert(&instance(1, "standard")).unwrap();
        let scheduler = Arc::new(scheduler);

        let runner = scheduler.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        scheduler.shutdown();
        handle.await.unwrap();

        assert_eq!(stored_tick(&mem, 1), 3);
    }
    #[tokio::test(start_paused = true)]
    async fn test_long_script_keeps_channel_past_lock_timeout() {
        let config = EngineConfig::default();
        assert!(Duration::from_secs(40) > config.scheduler.lock_timeout());

        let (collab, mem) = in_memory();
        let locks = ChannelLockManager::new();
        let build = || {
            let mut scripts = ScriptRegistry::with_standard(&config.scheduler);
            scripts.register(Arc::new(LongScript));
            TickScheduler::new(&config, collab.clone(), scripts).with_lock_manager(locks.clone())
        };
        let first = Arc::new(build());
        let second = build();
        mem.instances.insert(&instance(1, "long")).unwrap();

        let runner = first.clone();
        let handle = tokio::spawn(async move { runner.dispatch_channel(ChannelId(1)).await });

        // Past the acquire timeout, still inside the script's budget.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(locks.is_locked(ChannelId(1)));
        assert!(matches!(second.dispatch_channel(ChannelId(1)).await, ChannelOutcome::Skipped));

        assert!(handle.await.unwrap().is_completed());
        assert_eq!(stored_tick(&mem, 1), 1);
        assert!(!locks.is_locked(ChannelId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_lease_drops_tick() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        mem.instances.insert(&instance(1, "standard")).unwrap();
        mem.instances.set_load_delay(Some(Duration::from_secs(5)));

        let lease = scheduler
            .locks()
            .lease(ChannelId(1), scheduler.owner(), Duration::from_secs(1))
            .unwrap();
        let result = scheduler.tick_channel(&lease).await;
        assert!(matches!(result, Err(EngineError::LeaseLost(ChannelId(1)))));
        assert_eq!(stored_tick(&mem, 1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_replays_external_writes() {
        let config = EngineConfig {
            scheduler: SchedulerConfig {
                actions_per_tick: 1,
                break_interval_ticks: 0,
                ..SchedulerConfig::default()
            },
            ..EngineConfig::default()
        };
        let (scheduler, mem) = scheduler(config);
        let player = PlayerId(10);
        let mut mine = instance(1, "standard");
        mine.player_mut(player).unwrap().heading = Some(Direction::South);
        mine.encounters
            .insert(Position::new(0, 1), Encounter::new(EncounterKind::FireBlast, 1.0))
            .unwrap();
        mem.instances.insert(&mine).unwrap();
        mem.instances.fail_next_saves(1);

        assert!(matches!(
            scheduler.dispatch_channel(ChannelId(1)).await,
            ChannelOutcome::Failed(_)
        ));
        let first = mem.health.get_health(player, ChannelId(1)).await.unwrap();
        let lost = 100 - first.current;
        assert!(lost > 0);

        // Same stored document, same seed: the blast lands again.
        assert!(scheduler.dispatch_channel(ChannelId(1)).await.is_completed());
        let second = mem.health.get_health(player, ChannelId(1)).await.unwrap();
        assert_eq!(100 - second.current, 2 * lost);
        assert_eq!(stored_tick(&mem, 1), 1);
        assert!(mem.instances.get(ChannelId(1)).unwrap().encounters.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_document_is_misconfigured() {
        let (scheduler, mem) = scheduler(EngineConfig::default());
        let mut mine = instance(1, "standard");
        mine.encounters
            .insert(Position::new(3, 3), Encounter::new(EncounterKind::FireBlast, 1.0))
            .unwrap();
        let bytes = bincode::serialize(&mine).unwrap();

        // Same length, so only the kind name is wrong.
        let at = bytes.windows(10).position(|w| w == b"fire_blast").unwrap();
        let mut corrupt = bytes.clone();
        corrupt[at..at + 10].copy_from_slice(b"lava_blast");
        mem.instances.insert_raw(ChannelId(1), corrupt);
        mem.instances.insert(&instance(2, "standard")).unwrap();

        let report = scheduler.run_cycle().await;
        match report.outcome(ChannelId(1)) {
            Some(ChannelOutcome::Misconfigured(EngineError::InvalidDocument(msg))) => {
                assert!(msg.contains("lava_blast"))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(report.outcome(ChannelId(2)).unwrap().is_completed());
        assert!(!scheduler.locks().is_locked(ChannelId(1)));
    }
}
