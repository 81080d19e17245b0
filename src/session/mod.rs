//! Session Module
//!
//! Everything that drives instances over time:
//!
//! - `lock`: per-channel, time-bounded, non-blocking locks
//! - `script`: per-mine-type tick scripts and their registry
//! - `scheduler`: the fixed-interval driver

pub mod lock;
pub mod scheduler;
pub mod script;

pub use lock::{ChannelLockManager, LockEntry, LockLease, LockToken};
pub use scheduler::{ChannelOutcome, CycleReport, TickScheduler};
pub use script::{MineScript, ScriptRegistry, StandardMineScript, TickContext, TickSummary};
