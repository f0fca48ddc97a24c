//! Per-sender, per-command cooldown tracking.
//!
//! Each sender gets a small map of command name to the millisecond timestamp
//! of its last accepted use. Features include:
//! - Integer-second elapsed comparison with no wraparound
//! - Rejected attempts never refresh the timestamp
//! - Periodic sweeping of entries whose cooldown has passed
//! - A cap on tracked senders, evicting the least recently active one

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::SenderId;

/// Default interval between expiry sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Default maximum number of senders tracked at once.
pub const DEFAULT_MAX_TRACKED_SENDERS: usize = 10_000;

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Clock backed by [`Instant`], counting from its creation.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    /// The command may run. A timestamp was recorded if the cooldown is enabled.
    Ready,
    /// The command is still cooling down.
    Cooling { remaining_seconds: i64 },
}

impl CooldownCheck {
    pub fn is_ready(&self) -> bool {
        matches!(self, CooldownCheck::Ready)
    }
}

#[derive(Debug, Clone, Copy)]
struct CooldownEntry {
    /// Millisecond timestamp of the last accepted use.
    last_used: u64,
    cooldown_seconds: i64,
}

impl CooldownEntry {
    fn elapsed_seconds(&self, now: u64) -> i64 {
        (now.saturating_sub(self.last_used) / 1000) as i64
    }

    fn is_expired(&self, now: u64) -> bool {
        self.elapsed_seconds(now) >= self.cooldown_seconds
    }
}

#[derive(Debug, Default)]
struct SenderCooldowns {
    entries: HashMap<String, CooldownEntry>,
    last_active: u64,
}

#[derive(Debug, Default)]
struct CooldownState {
    senders: HashMap<SenderId, SenderCooldowns>,
    last_sweep: u64,
}

/// Tracks when each sender last used each command.
pub struct CooldownTracker {
    state: Mutex<CooldownState>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    max_senders: usize,
}

impl CooldownTracker {
    /// Create a tracker with the default sweep interval and sender cap.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(
            clock,
            Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            DEFAULT_MAX_TRACKED_SENDERS,
        )
    }

    /// Create a tracker with a custom sweep interval and sender cap.
    ///
    /// A cap of zero disables the sender limit.
    pub fn with_limits(clock: Arc<dyn Clock>, sweep_interval: Duration, max_senders: usize) -> Self {
        Self {
            state: Mutex::new(CooldownState::default()),
            clock,
            sweep_interval,
            max_senders,
        }
    }

    /// Check whether `sender` may use `command` now, recording the use if so.
    ///
    /// A `cooldown_seconds` below 1 always allows and records nothing. A
    /// rejected attempt leaves the stored timestamp untouched.
    pub fn check(&self, sender: &SenderId, command: &str, cooldown_seconds: i64) -> CooldownCheck {
        if cooldown_seconds < 1 {
            return CooldownCheck::Ready;
        }

        let now = self.clock.now_millis();
        let mut state = self.lock();
        self.maybe_sweep(&mut state, now);

        if let Some(entry) = state
            .senders
            .get(sender)
            .and_then(|s| s.entries.get(command))
        {
            let elapsed = entry.elapsed_seconds(now);
            if elapsed < cooldown_seconds {
                let remaining_seconds = cooldown_seconds - elapsed;
                trace!(%sender, command, remaining_seconds, "Command still cooling down");
                return CooldownCheck::Cooling { remaining_seconds };
            }
        }

        if !state.senders.contains_key(sender) {
            self.make_room(&mut state, now);
        }

        let tracked = state.senders.entry(sender.clone()).or_default();
        tracked.last_active = now;
        tracked.entries.insert(
            command.to_string(),
            CooldownEntry {
                last_used: now,
                cooldown_seconds,
            },
        );

        CooldownCheck::Ready
    }

    /// Seconds left before `sender` may use `command` again, without recording.
    pub fn remaining(&self, sender: &SenderId, command: &str) -> Option<i64> {
        let now = self.clock.now_millis();
        let state = self.lock();
        let entry = state.senders.get(sender)?.entries.get(command)?;
        let elapsed = entry.elapsed_seconds(now);
        (elapsed < entry.cooldown_seconds).then(|| entry.cooldown_seconds - elapsed)
    }

    /// Drop all cooldowns of a sender, e.g. when a player leaves.
    pub fn forget_sender(&self, sender: &SenderId) -> bool {
        let removed = self.lock().senders.remove(sender).is_some();
        if removed {
            debug!(%sender, "Forgot sender cooldowns");
        }
        removed
    }

    /// Remove every entry whose cooldown has passed. Returns how many entries
    /// were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        Self::sweep(&mut state, now)
    }

    /// Number of senders with at least one tracked cooldown.
    pub fn tracked_senders(&self) -> usize {
        self.lock().senders.len()
    }

    /// Forget everything.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.senders.clear();
        debug!("Cleared all cooldowns");
    }

    fn lock(&self) -> MutexGuard<'_, CooldownState> {
        // A poisoned map only holds timestamps; keep using it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn maybe_sweep(&self, state: &mut CooldownState, now: u64) {
        if now.saturating_sub(state.last_sweep) >= self.sweep_interval.as_millis() as u64 {
            Self::sweep(state, now);
        }
    }

    fn sweep(state: &mut CooldownState, now: u64) -> usize {
        let mut dropped = 0;
        state.senders.retain(|_, tracked| {
            let before = tracked.entries.len();
            tracked.entries.retain(|_, entry| !entry.is_expired(now));
            dropped += before - tracked.entries.len();
            !tracked.entries.is_empty()
        });
        state.last_sweep = now;

        if dropped > 0 {
            debug!(dropped, remaining_senders = state.senders.len(), "Swept expired cooldowns");
        }
        dropped
    }

    /// Free a slot when at the cap. Expired entries go first; a sender
    /// still cooling down is only evicted if that frees nothing.
    fn make_room(&self, state: &mut CooldownState, now: u64) {
        if self.max_senders == 0 || state.senders.len() < self.max_senders {
            return;
        }

        Self::sweep(state, now);
        if state.senders.len() < self.max_senders {
            return;
        }

        let oldest = state
            .senders
            .iter()
            .min_by_key(|(_, tracked)| tracked.last_active)
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest {
            state.senders.remove(&id);
            debug!(sender = %id, "Evicted least recently active sender from cooldowns");
        }
    }
}
