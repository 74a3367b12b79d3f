//! Per-client sliding-window admission control.
//!
//! Each key owns an exact log of recent admission instants. A request is
//! admitted while fewer than `max_calls` admissions fall inside the trailing
//! window `(now - period, now]`. Rejected requests are not recorded.
//!
//! # Concurrency
//! Windows live in a [`DashMap`], so the prune/compare/append step for one key
//! runs under that key's shard lock while other shards proceed in parallel.
//! [`AdmissionController::admit`] is synchronous and the lock is released
//! before it returns; callers must not hold anything from it across `.await`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

/// Errors raised while building a [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("max_calls must be greater than zero (got {0})")]
    InvalidMaxCalls(u32),
    #[error("period must be greater than zero (got {0:?})")]
    InvalidPeriod(Duration),
}

/// Admission quota: at most `max_calls` admissions per key per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    max_calls: u32,
    period: Duration,
}

impl Policy {
    pub fn new(max_calls: u32, period: Duration) -> Result<Self, PolicyError> {
        if max_calls == 0 {
            return Err(PolicyError::InvalidMaxCalls(max_calls));
        }
        if period.is_zero() {
            return Err(PolicyError::InvalidPeriod(period));
        }
        Ok(Self { max_calls, period })
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Outcome of a single admission check.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject,
}

impl Decision {
    pub fn is_admitted(self) -> bool {
        matches!(self, Decision::Admit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Admit => "admit",
            Decision::Reject => "reject",
        }
    }
}

/// Admission log for one key.
#[derive(Debug)]
struct RateWindow {
    /// Admission instants, oldest first.
    timestamps: VecDeque<Instant>,
    last_seen: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_seen: now,
        }
    }

    /// Drop every timestamp at least `period` old. Timestamps are ordered, so
    /// this stops at the first live one.
    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit(&mut self, now: Instant, policy: &Policy) -> Decision {
        self.last_seen = self.last_seen.max(now);
        self.prune(now, policy.period);

        if self.timestamps.len() >= policy.max_calls as usize {
            return Decision::Reject;
        }

        // Keep the log ordered even if a caller hands us an older instant.
        let at = self.timestamps.back().map_or(now, |&newest| newest.max(now));
        self.timestamps.push_back(at);
        Decision::Admit
    }
}

/// Sliding-window admission controller keyed by client identity.
#[derive(Debug)]
pub struct AdmissionController {
    policy: Policy,
    windows: DashMap<String, RateWindow>,
}

impl AdmissionController {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Decide whether a request from `key` arriving at `now` is admitted.
    ///
    /// Admitted requests are recorded against the key's window; rejected ones
    /// are not.
    pub fn admit(&self, key: &str, now: Instant) -> Decision {
        if let Some(mut window) = self.windows.get_mut(key) {
            return window.admit(now, &self.policy);
        }

        self.windows
            .entry(key.to_owned())
            .or_insert_with(|| RateWindow::new(now))
            .admit(now, &self.policy)
    }

    /// Number of admissions for `key` still inside the window at `now`.
    ///
    /// Read-only: nothing is pruned from the stored window.
    pub fn in_window(&self, key: &str, now: Instant) -> usize {
        self.windows.get(key).map_or(0, |window| {
            window
                .timestamps
                .iter()
                .filter(|&&ts| now.saturating_duration_since(ts) < self.policy.period)
                .count()
        })
    }

    /// Number of keys currently held in the registry.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Prune every window and evict keys that are empty and have not been
    /// seen for at least `retention`. Returns the number of evicted keys.
    ///
    /// An evicted key is indistinguishable from one never seen, so eviction
    /// never changes an admission outcome.
    pub fn sweep(&self, now: Instant, retention: Duration) -> usize {
        let before = self.windows.len();
        let period = self.policy.period;
        self.windows.retain(|_, window| {
            window.prune(now, period);
            !window.timestamps.is_empty()
                || now.saturating_duration_since(window.last_seen) < retention
        });
        before.saturating_sub(self.windows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(origin: Instant, millis: u64) -> Instant {
        origin + Duration::from_millis(millis)
    }

    fn controller(max_calls: u32, period: Duration) -> AdmissionController {
        AdmissionController::new(Policy::new(max_calls, period).unwrap())
    }

    #[test]
    fn rejects_zero_max_calls() {
        let err = Policy::new(0, Duration::from_secs(1)).expect_err("zero calls should be invalid");
        assert_eq!(err, PolicyError::InvalidMaxCalls(0));
    }

    #[test]
    fn rejects_zero_period() {
        let err = Policy::new(2, Duration::ZERO).expect_err("zero period should be invalid");
        assert_eq!(err, PolicyError::InvalidPeriod(Duration::ZERO));
    }

    #[test]
    fn third_call_inside_window_is_rejected() {
        let limiter = controller(2, Duration::from_secs(1));
        let t0 = Instant::now();

        assert_eq!(limiter.admit("10.0.0.1", at(t0, 0)), Decision::Admit);
        assert_eq!(limiter.admit("10.0.0.1", at(t0, 100)), Decision::Admit);
        assert_eq!(limiter.admit("10.0.0.1", at(t0, 200)), Decision::Reject);
        assert_eq!(limiter.admit("10.0.0.1", at(t0, 1200)), Decision::Admit);
    }

    #[test]
    fn rejected_calls_do_not_consume_slots() {
        let limiter = controller(2, Duration::from_secs(1));
        let t0 = Instant::now();

        let _ = limiter.admit("k", at(t0, 0));
        let _ = limiter.admit("k", at(t0, 100));
        assert_eq!(limiter.admit("k", at(t0, 200)), Decision::Reject);
        assert_eq!(limiter.in_window("k", at(t0, 200)), 2);

        assert_eq!(limiter.admit("k", at(t0, 900)), Decision::Reject);
        // 0.0 has expired at 1.0; 0.1 is still live, so one slot opens.
        assert_eq!(limiter.admit("k", at(t0, 1000)), Decision::Admit);
        assert_eq!(limiter.admit("k", at(t0, 1050)), Decision::Reject);
    }

    #[test]
    fn timestamp_exactly_one_period_old_is_expired() {
        let limiter = controller(1, Duration::from_secs(1));
        let t0 = Instant::now();

        assert_eq!(limiter.admit("k", t0), Decision::Admit);
        assert_eq!(limiter.admit("k", at(t0, 999)), Decision::Reject);
        assert_eq!(limiter.admit("k", at(t0, 1000)), Decision::Admit);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = controller(1, Duration::from_secs(60));
        let t0 = Instant::now();

        assert_eq!(limiter.admit("a", t0), Decision::Admit);
        for i in 0..50 {
            let _ = limiter.admit("b", at(t0, i));
        }
        assert_eq!(limiter.admit("a", at(t0, 10)), Decision::Reject);
        assert_eq!(limiter.admit("c", at(t0, 10)), Decision::Admit);
        assert_eq!(limiter.in_window("b", at(t0, 60)), 1);
    }

    #[test]
    fn quota_holds_over_any_trailing_window() {
        let period = Duration::from_millis(1000);
        let limiter = controller(3, period);
        let t0 = Instant::now();
        let mut admitted: Vec<Instant> = Vec::new();

        // Irregular arrivals, some bursty, some sparse.
        let mut offset = 0u64;
        for step in 0..400u64 {
            offset += (step * 37) % 170;
            let now = at(t0, offset);
            if limiter.admit("k", now).is_admitted() {
                admitted.push(now);
            }
            let live = admitted
                .iter()
                .filter(|&&ts| now.saturating_duration_since(ts) < period)
                .count();
            assert!(live <= 3, "{live} admissions inside one window at step {step}");
            assert_eq!(live, limiter.in_window("k", now));
        }
        assert!(admitted.len() > 3);
    }

    #[test]
    fn pruning_never_resurrects_stale_entries() {
        let limiter = controller(5, Duration::from_millis(100));
        let t0 = Instant::now();

        for ms in [0, 10, 20, 30] {
            let _ = limiter.admit("k", at(t0, ms));
        }
        let _ = limiter.admit("k", at(t0, 125));
        let stale = |now: Instant| {
            limiter
                .windows
                .get("k")
                .map(|w| {
                    w.timestamps
                        .iter()
                        .filter(|&&ts| now.saturating_duration_since(ts) >= Duration::from_millis(100))
                        .count()
                })
                .unwrap_or(0)
        };
        assert_eq!(stale(at(t0, 125)), 0);

        let _ = limiter.admit("k", at(t0, 300));
        assert_eq!(stale(at(t0, 300)), 0);
        assert_eq!(limiter.in_window("k", at(t0, 300)), 1);
    }

    #[test]
    fn earlier_instant_keeps_log_ordered() {
        let limiter = controller(3, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(limiter.admit("k", at(t0, 500)).is_admitted());
        assert!(limiter.admit("k", at(t0, 100)).is_admitted());
        let window = limiter.windows.get("k").unwrap();
        let ordered: Vec<_> = window.timestamps.iter().copied().collect();
        assert!(ordered.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn sweep_evicts_only_idle_empty_windows() {
        let limiter = controller(2, Duration::from_secs(1));
        let t0 = Instant::now();

        let _ = limiter.admit("idle", t0);
        let _ = limiter.admit("busy", at(t0, 9_500));
        assert_eq!(limiter.tracked_keys(), 2);

        let evicted = limiter.sweep(at(t0, 10_000), Duration::from_secs(5));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.in_window("busy", at(t0, 10_000)), 1);
    }

    #[test]
    fn sweep_keeps_recently_seen_empty_windows() {
        let limiter = controller(1, Duration::from_millis(100));
        let t0 = Instant::now();

        let _ = limiter.admit("k", t0);
        assert_eq!(limiter.sweep(at(t0, 200), Duration::from_secs(1)), 0);
        assert_eq!(limiter.in_window("k", at(t0, 200)), 0);
        assert_eq!(limiter.sweep(at(t0, 1_000), Duration::from_secs(1)), 1);
    }

    #[test]
    fn evicted_key_starts_fresh() {
        let limiter = controller(1, Duration::from_secs(1));
        let t0 = Instant::now();

        let _ = limiter.admit("k", t0);
        assert_eq!(limiter.sweep(at(t0, 5_000), Duration::ZERO), 1);
        assert_eq!(limiter.admit("k", at(t0, 5_000)), Decision::Admit);
        assert_eq!(limiter.admit("k", at(t0, 5_001)), Decision::Reject);
    }
}
