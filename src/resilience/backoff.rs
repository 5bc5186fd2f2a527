//! Constant retry delay with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate the delay before the next attempt.
///
/// The base delay never grows between attempts. A non-zero `max_jitter`
/// adds a uniformly random extra wait in `0..=max_jitter`.
pub fn calculate_delay(base: Duration, max_jitter: Duration) -> Duration {
    let jitter_ms = max_jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return base;
    }

    let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
    base.saturating_add(Duration::from_millis(jitter))
}
