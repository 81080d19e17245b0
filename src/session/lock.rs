//! Channel Lock Manager
//!
//! Non-blocking, time-bounded mutual exclusion per channel. A failed
//! acquire means "skip this channel this cycle", never "wait".
//!
//! Every acquire bumps the channel's generation counter and the resulting
//! [`LockToken`] carries it. [`LockLease`] releases through
//! [`ChannelLockManager::release_if_current`], which compares generations,
//! so a late release can never clobber a newer lock. The deferred
//! auto-release additionally requires the entry to be past its expiry, so a
//! holder that called [`ChannelLockManager::extend`] keeps its lock when
//! the original timer fires.
//!
//! Expired entries are reclaimed by the next acquire, the auto-release
//! timer, or [`ChannelLockManager::cleanup_expired`], whichever runs first.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::core::ChannelId;

/// Identifies one specific acquisition of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockToken {
    /// Locked channel.
    pub channel: ChannelId,
    /// Generation assigned at acquire time.
    pub generation: u64,
}

/// A live lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockEntry {
    /// Locked channel.
    pub channel: ChannelId,
    /// Who holds it (scheduler instance tag).
    pub owner: String,
    /// Acquire time.
    pub acquired_at: Instant,
    /// Point after which the lock is reclaimable.
    pub expires_at: Instant,
    /// Generation of this acquisition.
    pub generation: u64,
}

impl LockEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Token for this entry.
    pub fn token(&self) -> LockToken {
        LockToken {
            channel: self.channel,
            generation: self.generation,
        }
    }
}

#[derive(Default)]
struct LockTable {
    entries: BTreeMap<ChannelId, LockEntry>,
    generations: BTreeMap<ChannelId, u64>,
}

impl LockTable {
    fn release_if_current(&mut self, token: LockToken) -> bool {
        match self.entries.get(&token.channel) {
            Some(entry) if entry.generation == token.generation => {
                self.entries.remove(&token.channel);
                true
            }
            _ => false,
        }
    }

    fn release_if_expired(&mut self, token: LockToken, now: Instant) -> bool {
        match self.entries.get(&token.channel) {
            Some(entry) if entry.generation == token.generation && entry.is_expired(now) => {
                self.entries.remove(&token.channel);
                true
            }
            _ => false,
        }
    }
}

fn guard(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-channel lock table shared by every dispatch of a scheduler.
///
/// The table is only touched synchronously; no lock on it is ever held
/// across an await point.
#[derive(Clone)]
pub struct ChannelLockManager {
    table: Arc<Mutex<LockTable>>,
    timers: bool,
}

impl Default for ChannelLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLockManager {
    /// Manager that schedules an auto-release for every acquire when
    /// running inside a tokio runtime.
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(LockTable::default())),
            timers: true,
        }
    }

    /// Manager that only reclaims expired locks on acquire and sweep.
    pub fn without_timers() -> Self {
        Self {
            timers: false,
            ..Self::new()
        }
    }

    /// Try to lock `channel` for `timeout`. Never blocks.
    pub fn acquire(&self, channel: ChannelId, owner: &str, timeout: Duration) -> bool {
        self.try_acquire(channel, owner, timeout).is_some()
    }

    /// Like [`acquire`](Self::acquire), returning the token on success.
    pub fn try_acquire(&self, channel: ChannelId, owner: &str, timeout: Duration) -> Option<LockToken> {
        let now = Instant::now();
        let expires_at = now + timeout;
        let token = {
            let mut table = guard(&self.table);
            if let Some(existing) = table.entries.get(&channel) {
                if !existing.is_expired(now) {
                    trace!("{} busy, held by {}", channel, existing.owner);
                    return None;
                }
                debug!("reclaiming expired lock on {} from {}", channel, existing.owner);
            }

            let generation = {
                let counter = table.generations.entry(channel).or_insert(0);
                *counter += 1;
                *counter
            };
            let entry = LockEntry {
                channel,
                owner: owner.to_string(),
                acquired_at: now,
                expires_at,
                generation,
            };
            let token = entry.token();
            table.entries.insert(channel, entry);
            token
        };

        if self.timers {
            self.schedule_release(token, expires_at);
        }
        Some(token)
    }

    /// Acquire and wrap the token in a guard that releases on drop.
    pub fn lease(&self, channel: ChannelId, owner: &str, timeout: Duration) -> Option<LockLease> {
        self.try_acquire(channel, owner, timeout).map(|token| LockLease {
            manager: self.clone(),
            token,
        })
    }

    fn schedule_release(&self, token: LockToken, expires_at: Instant) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let table: Weak<Mutex<LockTable>> = Arc::downgrade(&self.table);
        handle.spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            if let Some(table) = table.upgrade() {
                if guard(&table).release_if_expired(token, Instant::now()) {
                    debug!("auto-released {} (generation {})", token.channel, token.generation);
                }
            }
        });
    }

    /// Push the expiry of a still-held lock out to at least `now + extra`.
    ///
    /// Fails when the token is stale or the lock already expired; the caller
    /// has lost the channel and must not write to it.
    pub fn extend(&self, token: LockToken, extra: Duration) -> bool {
        let now = Instant::now();
        let expires_at = {
            let mut table = guard(&self.table);
            let Some(entry) = table.entries.get_mut(&token.channel) else {
                return false;
            };
            if entry.generation != token.generation || entry.is_expired(now) {
                return false;
            }
            entry.expires_at = entry.expires_at.max(now + extra);
            entry.expires_at
        };
        trace!("{} extended until {:?}", token.channel, expires_at);

        if self.timers {
            self.schedule_release(token, expires_at);
        }
        true
    }

    /// Unconditionally drop the channel's lock. Returns whether one existed.
    pub fn release(&self, channel: ChannelId) -> bool {
        guard(&self.table).entries.remove(&channel).is_some()
    }

    /// Release only if `token` still names the stored lock.
    pub fn release_if_current(&self, token: LockToken) -> bool {
        guard(&self.table).release_if_current(token)
    }

    /// Whether an unexpired lock exists.
    pub fn is_locked(&self, channel: ChannelId) -> bool {
        let now = Instant::now();
        guard(&self.table)
            .entries
            .get(&channel)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Current holder, expired or not.
    pub fn entry(&self, channel: ChannelId) -> Option<LockEntry> {
        guard(&self.table).entries.get(&channel).cloned()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut table = guard(&self.table);
        let before = table.entries.len();
        table.entries.retain(|_, e| !e.is_expired(now));
        before - table.entries.len()
    }

    /// Entries currently stored, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        guard(&self.table).entries.len()
    }

    /// No entries stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held lock that releases itself when dropped.
///
/// Release goes through the token, so a lease outliving its timeout never
/// removes a lock someone else acquired since.
pub struct LockLease {
    manager: ChannelLockManager,
    token: LockToken,
}

impl LockLease {
    /// Token of the held lock.
    pub fn token(&self) -> LockToken {
        self.token
    }

    /// Locked channel.
    pub fn channel(&self) -> ChannelId {
        self.token.channel
    }

    /// See [`ChannelLockManager::extend`].
    pub fn extend(&self, extra: Duration) -> bool {
        self.manager.extend(self.token, extra)
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        self.manager.release_if_current(self.token);
    }
}

// =============================================================================
// TESTS
// =============================================================================
