//! Capped exponential reconnect delay with random jitter.
//!
//! The first delay equals `initial`, each following one doubles until it reaches
//! `max`. Jitter in `[0, jitter_max)` is added on top of every delay.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter_max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, jitter_max: Duration) -> Self {
        let max = max.max(initial);
        Backoff {
            initial,
            max,
            jitter_max,
            current: initial,
            attempts: 0,
        }
    }

    pub fn from_millis(initial_ms: u64, max_ms: u64, jitter_max_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            Duration::from_millis(jitter_max_ms),
        )
    }

    /// Delay to wait before the next attempt, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        base + self.jitter()
    }

    /// Called after a session was established.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn jitter(&self) -> Duration {
        let jitter_max_ms = self.jitter_max.as_millis() as u64;
        if jitter_max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_max_ms))
    }
}
