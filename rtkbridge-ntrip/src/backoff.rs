//! Reconnection sweep spacing shared by both endpoints.

use crate::{MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY, SLOW_RECONNECT_DELAY};
use std::time::{Duration, Instant};

/// Decides when the next reconnection sweep may run.
///
/// The highest attempt count across endpoints decides the pace. A successful
/// connect resets it until some endpoint fails again.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    normal: Duration,
    slow: Duration,
    threshold: u32,
    previous_sweep: Option<Instant>,
    streak: u32,
    observed: u32,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_delays(RECONNECT_DELAY, SLOW_RECONNECT_DELAY, MAX_RECONNECT_ATTEMPTS)
    }

    pub fn with_delays(normal: Duration, slow: Duration, threshold: u32) -> Self {
        Self {
            normal,
            slow,
            threshold,
            previous_sweep: None,
            streak: 0,
            observed: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        if self.streak >= self.threshold {
            self.slow
        } else {
            self.normal
        }
    }

    /// The first sweep is always due.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.previous_sweep {
            None => true,
            Some(previous) => now.saturating_duration_since(previous) >= self.interval(),
        }
    }

    pub fn begin_sweep(&mut self, now: Instant) {
        self.previous_sweep = Some(now);
    }

    pub fn finish_sweep(&mut self, any_connected: bool, max_attempts: u32) {
        self.observed = max_attempts;
        self.set_streak(if any_connected { 0 } else { max_attempts });
    }

    /// Picks up failures counted between sweeps (health checks, writes).
    pub fn observe(&mut self, max_attempts: u32) {
        let grew = max_attempts > self.observed;
        self.observed = max_attempts;
        if grew {
            self.set_streak(max_attempts);
        }
    }

    fn set_streak(&mut self, streak: u32) {
        let was_slow = self.streak >= self.threshold;
        self.streak = streak;
        let is_slow = self.streak >= self.threshold;
        if is_slow && !was_slow {
            tracing::warn!(
                attempts = self.streak,
                "Too many reconnect attempts, backing off to {:?}",
                self.slow
            );
        } else if was_slow && !is_slow {
            tracing::info!("Reconnect pace restored to {:?}", self.normal);
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
