//! Background recovery of faulted endpoints.
//!
//! # Responsibilities
//! - Receive recovery requests from fault watchdogs
//! - Probe the failed endpoint (only that one) per the retry policy
//! - On exhaustion, alert and advance the active endpoint
//!
//! # Design Decisions
//! - A single supervised task owned by the manager; requests run one at a time
//! - Yields before each run so foreground acquisitions go first
//! - Probe sessions are dropped; callers pick up new sessions via the reset hook
//! - Outcomes are only visible through metrics, alerts, and state; nothing
//!   propagates back to the watchdog

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::failover::manager::{AttemptError, Shared};
use crate::lifecycle::ShutdownSignal;
use crate::transport::Transport;

/// Request to probe one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecoveryRequest {
    pub index: usize,
}

/// Sending side of the recovery queue.
#[derive(Debug, Clone)]
pub struct RecoveryHandle {
    tx: mpsc::UnboundedSender<RecoveryRequest>,
}

impl RecoveryHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<RecoveryRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue recovery of the endpoint at `index`. Never blocks.
    ///
    /// Returns false if the worker has stopped.
    pub fn schedule(&self, index: usize) -> bool {
        self.tx.send(RecoveryRequest { index }).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryOutcome {
    Recovered,
    Failed,
    Cancelled,
}

pub(crate) struct RecoveryWorker<T: Transport> {
    shared: Arc<Shared<T>>,
    requests: mpsc::UnboundedReceiver<RecoveryRequest>,
    signal: ShutdownSignal,
}

impl<T: Transport> RecoveryWorker<T> {
    /// Start the worker on the current Tokio runtime.
    pub(crate) fn spawn(shared: Arc<Shared<T>>) -> (RecoveryHandle, JoinHandle<()>) {
        let (handle, requests) = RecoveryHandle::channel();
        let signal = shared.shutdown.subscribe();
        let worker = Self {
            shared,
            requests,
            signal,
        };
        (handle, tokio::spawn(worker.run()))
    }

    async fn run(mut self) {
        tracing::debug!("Recovery worker started");

        loop {
            let request = tokio::select! {
                biased;
                _ = self.signal.recv() => break,
                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            tokio::task::yield_now().await;

            let Some(endpoint) = self.shared.endpoints.get(request.index).cloned() else {
                tracing::warn!(index = request.index, "Recovery requested for unknown endpoint");
                continue;
            };
            let span = tracing::info_span!("recovery", run_id = %Uuid::new_v4(), endpoint = %endpoint);
            let outcome = self.recover(request.index).instrument(span).await;
            if outcome == RecoveryOutcome::Cancelled {
                break;
            }
        }

        tracing::debug!("Recovery worker stopped");
    }

    async fn recover(&mut self, index: usize) -> RecoveryOutcome {
        let shared = &self.shared;
        let endpoint = &shared.endpoints[index];
        tracing::warn!(
            endpoint = %endpoint,
            limit = shared.policy.limit(),
            "Connection lost, probing endpoint"
        );

        match shared
            .connect_with_retry(index, &shared.credentials, &mut self.signal)
            .await
        {
            Ok(probe) => {
                drop(probe);
                shared.metrics.mark_up(endpoint);
                shared.state.reset_failures();
                tracing::info!(endpoint = %endpoint, "Endpoint recovered");
                RecoveryOutcome::Recovered
            }
            Err(AttemptError::Exhausted) => {
                shared
                    .alerts
                    .notify(&format!("Permanent failure on endpoint {}", endpoint));
                shared.fail_over(index);
                RecoveryOutcome::Failed
            }
            Err(AttemptError::Cancelled) => {
                tracing::info!(endpoint = %endpoint, "Recovery cancelled by shutdown");
                RecoveryOutcome::Cancelled
            }
        }
    }
}
