//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every transport connect attempt with a deadline
//! - Surface expiry as a distinct transport error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - A timed-out attempt counts as one failed attempt, like any other

use std::future::Future;
use std::time::Duration;

use crate::transport::TransportError;

/// Run `fut` with a deadline, mapping expiry to [`TransportError::Timeout`].
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TransportError::Timeout(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_expires() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_completes_in_time() {
        let result = with_timeout(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
