//! Capped exponential backoff with jitter.
//!
//! Used by the server-side confirmation watcher and the client poller.
//! Delays grow as `initial * 2^n` up to `cap`, each jittered uniformly
//! into `[d/2, d]`, and the schedule stops yielding once `max_elapsed`
//! has passed since it started.

use std::time::{Duration, Instant};

use rand::Rng;

/// Backoff parameters, typically read from `[orchestrator]` config.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// First (un-jittered) delay.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
    /// Total budget; `next_delay` returns `None` once this has elapsed.
    pub max_elapsed: Duration,
}

impl BackoffPolicy {
    /// Un-jittered delay for attempt `n`: `min(cap, initial * 2^n)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.cap)
    }
}

/// One polling session's backoff state.
pub struct BackoffSchedule {
    policy: BackoffPolicy,
    attempt: u32,
    started: Instant,
}

impl BackoffSchedule {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            started: Instant::now(),
        }
    }

    /// Next jittered delay, or `None` once the elapsed budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= self.policy.max_elapsed {
            return None;
        }
        let base = self.policy.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        let base_ms = base.as_millis() as u64;
        let half = base_ms.div_ceil(2);
        let jittered = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(half..=base_ms)
        };
        Some(Duration::from_millis(jittered))
    }

    /// Time left in the elapsed budget.
    pub fn remaining(&self) -> Duration {
        self.policy.max_elapsed.saturating_sub(self.started.elapsed())
    }

    /// Restart the sequence (fresh attempt counter and clock).
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.started = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(500),
            cap: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(600),
        }
    }

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let p = policy();
        assert_eq!(p.base_delay(0), Duration::from_millis(500));
        assert_eq!(p.base_delay(1), Duration::from_secs(1));
        assert_eq!(p.base_delay(3), Duration::from_secs(4));
        assert_eq!(p.base_delay(10), Duration::from_secs(30));
        assert_eq!(p.base_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut schedule = BackoffSchedule::new(policy());
        for attempt in 0..20 {
            let base = policy().base_delay(attempt);
            let delay = schedule.next_delay().unwrap();
            assert!(delay <= base, "delay {delay:?} above base {base:?}");
            assert!(delay >= base / 2, "delay {delay:?} below half base {base:?}");
        }
    }

    #[test]
    fn test_exhausted_budget_yields_none() {
        let mut schedule = BackoffSchedule::new(BackoffPolicy {
            initial: Duration::from_millis(1),
            cap: Duration::from_millis(10),
            max_elapsed: Duration::ZERO,
        });
        assert!(schedule.next_delay().is_none());
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut schedule = BackoffSchedule::new(policy());
        let _ = schedule.next_delay();
        let _ = schedule.next_delay();
        schedule.reset();
        let delay = schedule.next_delay().unwrap();
        assert!(delay <= policy().base_delay(0));
    }
}
