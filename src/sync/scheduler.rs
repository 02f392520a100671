//! Timer seam for the debounced writer and the undo sweep.
//!
//! Schedulers hand out tokens instead of running callbacks: when a timer
//! fires, whoever owns the clock reports the token back to the service
//! (`SyncService::on_timer`), which decides what the token meant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CancelToken(pub u64);

/// Tokens are numbered process-wide, so a timer left over from a replaced
/// scheduler can never match one the new scheduler handed out.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl CancelToken {
    fn next() -> Self {
        CancelToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

pub trait Scheduler {
    /// Ask for a one-shot timer `delay_ms` from now.
    fn schedule(&mut self, delay_ms: u64) -> CancelToken;
    /// Cancel a timer. Unknown or already-fired tokens are ignored.
    fn cancel(&mut self, token: CancelToken);
}

/// A timer request the host has not picked up yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub token: CancelToken,
    pub delay_ms: u64,
}

/// Timer changes since the last `take_effects`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimerEffects {
    pub schedule: Vec<ScheduleRequest>,
    pub cancel: Vec<CancelToken>,
}

/// Scheduler that records requests for someone else to run.
///
/// The browser host drains the requests and sets real timeouts; tests
/// inspect `active()` and fire tokens by hand.
#[derive(Debug, Default)]
pub struct QueuedScheduler {
    active: BTreeMap<CancelToken, u64>,
    effects: TimerEffects,
}

impl QueuedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `token` as fired. Returns false if it was cancelled or unknown.
    pub fn fire(&mut self, token: CancelToken) -> bool {
        self.active.remove(&token).is_some()
    }

    pub fn is_active(&self, token: CancelToken) -> bool {
        self.active.contains_key(&token)
    }

    /// Live timers with their requested delays, oldest first.
    pub fn active(&self) -> Vec<(CancelToken, u64)> {
        self.active.iter().map(|(t, d)| (*t, *d)).collect()
    }

    pub fn take_effects(&mut self) -> TimerEffects {
        std::mem::take(&mut self.effects)
    }
}

impl Scheduler for QueuedScheduler {
    fn schedule(&mut self, delay_ms: u64) -> CancelToken {
        let token = CancelToken::next();
        self.active.insert(token, delay_ms);
        self.effects.schedule.push(ScheduleRequest { token, delay_ms });
        token
    }

    fn cancel(&mut self, token: CancelToken) {
        if self.active.remove(&token).is_some() {
            // a request the host never saw needs no cancel
            let before = self.effects.schedule.len();
            self.effects.schedule.retain(|r| r.token != token);
            if self.effects.schedule.len() == before {
                self.effects.cancel.push(token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_tracked() {
        let mut s = QueuedScheduler::new();
        let a = s.schedule(50);
        let b = s.schedule(50);
        assert_ne!(a, b);
        assert_eq!(s.active(), vec![(a, 50), (b, 50)]);
        assert!(s.fire(a));
        assert!(!s.fire(a));
        assert!(s.is_active(b));
    }

    #[test]
    fn separate_schedulers_never_share_tokens() {
        let mut old = QueuedScheduler::new();
        let stale = old.schedule(50);
        let mut fresh = QueuedScheduler::new();
        let token = fresh.schedule(50);
        assert_ne!(stale, token);
        assert!(!fresh.fire(stale));
        assert!(fresh.is_active(token));
    }

    #[test]
    fn cancel_before_pickup_drops_the_request() {
        let mut s = QueuedScheduler::new();
        let a = s.schedule(50);
        s.cancel(a);
        let effects = s.take_effects();
        assert!(effects.schedule.is_empty());
        assert!(effects.cancel.is_empty());
    }

    #[test]
    fn cancel_after_pickup_is_reported() {
        let mut s = QueuedScheduler::new();
        let a = s.schedule(50);
        let picked = s.take_effects();
        assert_eq!(picked.schedule, vec![ScheduleRequest { token: a, delay_ms: 50 }]);
        s.cancel(a);
        assert_eq!(s.take_effects().cancel, vec![a]);
        assert!(!s.fire(a));
    }

    #[test]
    fn cancelling_fired_token_is_ignored() {
        let mut s = QueuedScheduler::new();
        let a = s.schedule(10);
        s.take_effects();
        s.fire(a);
        s.cancel(a);
        assert_eq!(s.take_effects(), TimerEffects::default());
    }
}
