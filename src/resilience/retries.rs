//! Retry policy.
//!
//! # Responsibilities
//! - Bound the number of attempts made against one endpoint
//! - Wait a fixed delay between failed attempts
//! - Abort the wait promptly on shutdown
//!
//! # Design Decisions
//! - The budget is per endpoint; every endpoint visit starts fresh
//! - No exponential growth; jitter is opt-in and defaults to zero
//! - No wait after the final attempt

use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::resilience::backoff::calculate_delay;

/// Raised when a retry wait is interrupted by shutdown.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Retry wait cancelled by shutdown")]
pub struct Cancelled;

/// Bounded attempts with a constant inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    limit: u32,
    delay: Duration,
    jitter: Duration,
}

impl RetryPolicy {
    /// Create a policy. A zero `limit` is raised to one attempt.
    pub fn new(limit: u32, delay: Duration) -> Self {
        Self {
            limit: limit.max(1),
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// Add a random extra wait of up to `jitter` to each delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Attempts allowed per endpoint.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Base delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Attempt numbers, starting at 1.
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.limit
    }

    /// Wait after failed `attempt`, unless it was the last one.
    pub async fn pause(&self, attempt: u32, signal: &mut ShutdownSignal) -> Result<(), Cancelled> {
        if attempt >= self.limit {
            return Ok(());
        }
        if signal.is_triggered() {
            return Err(Cancelled);
        }

        let wait = calculate_delay(self.delay, self.jitter);
        if wait.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = signal.recv() => Err(Cancelled),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(5000))
    }
}
