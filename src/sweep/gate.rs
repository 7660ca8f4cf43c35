//! Fixed pacing between batches.

use crate::config::TimingConfig;
use crate::models::GovernanceMode;
use std::sync::Mutex;
use std::time::Duration;

/// Sleep primitive, swappable in tests.
pub trait Sleeper {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested sleeps without blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps requested so far.
    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// Inserts a fixed delay after every batch but the last.
///
/// Governed batches wait longer: each one is three confirmed transactions
/// plus a status read against rate-limited upstreams.
#[derive(Debug, Clone, Copy)]
pub struct BackoffGate<S: Sleeper> {
    direct: Duration,
    governed: Duration,
    sleeper: S,
}

impl BackoffGate<ThreadSleeper> {
    /// Creates a gate that really sleeps.
    #[must_use]
    pub const fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(timing, ThreadSleeper)
    }
}

impl<S: Sleeper> BackoffGate<S> {
    /// Creates a gate with a custom sleeper.
    #[must_use]
    pub const fn new(timing: &TimingConfig, sleeper: S) -> Self {
        Self {
            direct: Duration::from_millis(timing.direct_delay_ms),
            governed: Duration::from_millis(timing.governed_delay_ms),
            sleeper,
        }
    }

    /// Delay used for `mode`.
    #[must_use]
    pub const fn delay_for(&self, mode: GovernanceMode) -> Duration {
        match mode {
            GovernanceMode::Personal => self.direct,
            GovernanceMode::Governed => self.governed,
        }
    }

    /// Waits after batch `index` of `total`; no wait after the last.
    pub fn wait_after_batch(&self, mode: GovernanceMode, index: usize, total: usize) {
        if index + 1 >= total {
            return;
        }
        let delay = self.delay_for(mode);
        if !delay.is_zero() {
            tracing::trace!(delay_ms = crate::duration_to_millis(delay), "Pacing");
            self.sleeper.sleep(delay);
        }
    }

    /// The underlying sleeper.
    #[must_use]
    pub const fn sleeper(&self) -> &S {
        &self.sleeper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_wait_after_last_batch() {
        let gate = BackoffGate::new(&TimingConfig::default(), RecordingSleeper::new());
        for i in 0..3 {
            gate.wait_after_batch(GovernanceMode::Personal, i, 3);
        }
        assert_eq!(
            gate.sleeper().slept(),
            vec![Duration::from_millis(2_000), Duration::from_millis(2_000)]
        );
    }

    #[test]
    fn test_governed_waits_longer() {
        let gate = BackoffGate::new(&TimingConfig::default(), RecordingSleeper::new());
        assert!(
            gate.delay_for(GovernanceMode::Governed) > gate.delay_for(GovernanceMode::Personal)
        );
        gate.wait_after_batch(GovernanceMode::Governed, 0, 2);
        assert_eq!(gate.sleeper().slept(), vec![Duration::from_millis(5_000)]);
    }
}
