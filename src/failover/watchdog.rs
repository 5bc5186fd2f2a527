//! Per-session fault detection.
//!
//! # Responsibilities
//! - Mark the session's endpoint down and raise an alert on a fault
//! - Hand recovery to the background worker
//!
//! # Design Decisions
//! - Runs on the transport's dispatch context, so it never awaits or blocks;
//!   the hand-off is an unbounded channel send
//! - Holds a recovery handle rather than the manager itself, so a live
//!   session never keeps a stopped manager alive

use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::failover::recovery::RecoveryHandle;
use crate::observability::{AlertChannel, MetricsSink};
use crate::transport::{FaultHandler, TransportError};

/// Fault handler bound to one session's endpoint.
pub struct FaultWatchdog {
    endpoint: Endpoint,
    index: usize,
    metrics: Arc<dyn MetricsSink>,
    alerts: Arc<dyn AlertChannel>,
    recovery: RecoveryHandle,
}

impl FaultWatchdog {
    pub(crate) fn new(
        endpoint: Endpoint,
        index: usize,
        metrics: Arc<dyn MetricsSink>,
        alerts: Arc<dyn AlertChannel>,
        recovery: RecoveryHandle,
    ) -> Self {
        Self {
            endpoint,
            index,
            metrics,
            alerts,
            recovery,
        }
    }

    /// Endpoint this watchdog guards.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// React to an asynchronous transport fault.
    pub fn on_fault(&self, error: &TransportError) {
        tracing::error!(endpoint = %self.endpoint, error = %error, "Broker session fault");
        self.metrics.mark_down(&self.endpoint);
        self.alerts
            .notify(&format!("Connection failed on {}: {}", self.endpoint, error));

        if !self.recovery.schedule(self.index) {
            tracing::debug!(
                endpoint = %self.endpoint,
                "Recovery worker stopped; fault not scheduled for recovery"
            );
        }
    }

    /// Convert into a handler for [`Session::set_fault_handler`](crate::transport::Session::set_fault_handler).
    pub fn into_handler(self) -> FaultHandler {
        Box::new(move |error| self.on_fault(&error))
    }
}

impl std::fmt::Debug for FaultWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultWatchdog")
            .field("endpoint", &self.endpoint)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{LogAlertChannel, NoopMetrics};

    #[tokio::test]
    async fn test_fault_enqueues_recovery_for_bound_endpoint() {
        let (handle, mut rx) = RecoveryHandle::channel();
        let watchdog = FaultWatchdog::new(
            Endpoint::new("b:1"),
            1,
            Arc::new(NoopMetrics),
            Arc::new(LogAlertChannel),
            handle,
        );

        let handler = watchdog.into_handler();
        handler(TransportError::ConnectionLost("reset by peer".to_string()));

        let request = rx.try_recv().unwrap();
        assert_eq!(request.index, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fault_after_worker_stopped_is_harmless() {
        let (handle, rx) = RecoveryHandle::channel();
        drop(rx);
        let watchdog = FaultWatchdog::new(
            Endpoint::new("a:1"),
            0,
            Arc::new(NoopMetrics),
            Arc::new(LogAlertChannel),
            handle,
        );
        watchdog.on_fault(&TransportError::ConnectionLost("gone".to_string()));
    }
}
