//! Failover connection manager.
//!
//! # Responsibilities
//! - Hand out working sessions, retrying and failing over transparently
//! - Keep the active endpoint current on success and exhaustion
//! - Attach a fault watchdog to every session it returns
//! - Own the recovery worker's lifecycle

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::endpoint::{Endpoint, EndpointList};
use crate::failover::recovery::{RecoveryHandle, RecoveryWorker};
use crate::failover::state::FailoverState;
use crate::failover::types::{
    AcknowledgeMode, Credentials, FailoverError, FailoverResult, SessionContext,
};
use crate::failover::watchdog::FaultWatchdog;
use crate::failover::ResetHook;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::{AlertChannel, LogAlertChannel, MetricsSink, PrometheusMetrics};
use crate::resilience::RetryPolicy;
use crate::transport::{Session, Transport};

/// How long `shutdown` waits for the recovery worker before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Why an endpoint's attempt loop ended without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptError {
    /// Every attempt failed.
    Exhausted,
    /// Shutdown interrupted a retry wait.
    Cancelled,
}

/// State shared between the manager and its recovery worker.
pub(crate) struct Shared<T: Transport> {
    pub(crate) endpoints: EndpointList,
    pub(crate) policy: RetryPolicy,
    pub(crate) credentials: Credentials,
    pub(crate) transport: T,
    pub(crate) state: FailoverState,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) alerts: Arc<dyn AlertChannel>,
    pub(crate) shutdown: Shutdown,
}

impl<T: Transport> Shared<T> {
    /// Try one endpoint up to the policy limit.
    pub(crate) async fn connect_with_retry(
        &self,
        index: usize,
        credentials: &Credentials,
        signal: &mut ShutdownSignal,
    ) -> Result<T::Session, AttemptError> {
        let endpoint = &self.endpoints[index];
        let limit = self.policy.limit();

        for attempt in self.policy.attempts() {
            tracing::info!(endpoint = %endpoint, attempt, limit, "Connecting to broker");

            match self.transport.connect(endpoint, credentials).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    self.metrics.mark_down(endpoint);
                    self.metrics.inc_failure(endpoint);
                    let failures = self.state.record_failure();
                    tracing::warn!(
                        endpoint = %endpoint,
                        attempt,
                        limit,
                        failures,
                        error = %e,
                        "Connection attempt failed"
                    );
                    self.policy
                        .pause(attempt, signal)
                        .await
                        .map_err(|_| AttemptError::Cancelled)?;
                }
            }
        }

        Err(AttemptError::Exhausted)
    }

    /// Advance the active endpoint away from `from`, if it is still active.
    pub(crate) fn fail_over(&self, from: usize) {
        match self.state.advance(from) {
            Some(switch) => tracing::warn!(
                from = %self.endpoints[switch.from],
                to = %self.endpoints[switch.to],
                "Switched active broker endpoint"
            ),
            None => tracing::debug!(
                from = %self.endpoints[from],
                "Endpoint switch skipped"
            ),
        }
    }
}

/// Hands out broker sessions, failing over across equivalent endpoints.
///
/// Must be built inside a Tokio runtime: construction starts the recovery
/// worker task. Dropping the manager signals the worker to stop; call
/// [`shutdown`](Self::shutdown) to wait for it.
pub struct FailoverManager<T: Transport> {
    shared: Arc<Shared<T>>,
    recovery: RecoveryHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> FailoverManager<T> {
    /// Start building a manager for `endpoints` over `transport`.
    pub fn builder(endpoints: EndpointList, transport: T) -> FailoverManagerBuilder<T> {
        FailoverManagerBuilder::new(endpoints, transport)
    }

    /// Acquire a working session.
    ///
    /// Uses the manager's default credentials when `credentials` is `None`.
    ///
    /// # Errors
    /// [`FailoverError::AllEndpointsExhausted`] when every endpoint's retry
    /// budget is spent; [`FailoverError::ShuttingDown`] after shutdown.
    pub async fn acquire(&self, credentials: Option<&Credentials>) -> FailoverResult<T::Session> {
        let (session, _) = self.acquire_traced(credentials).await?;
        Ok(session)
    }

    /// Acquire a session wrapped in a context with the given acknowledge mode.
    ///
    /// # Errors
    /// Same as [`acquire`](Self::acquire).
    pub async fn acquire_context(
        &self,
        credentials: Option<&Credentials>,
        mode: Option<AcknowledgeMode>,
    ) -> FailoverResult<SessionContext<T::Session>> {
        let (session, index) = self.acquire_traced(credentials).await?;
        let endpoint = self.shared.endpoints[index].clone();
        Ok(SessionContext::new(session, endpoint, mode.unwrap_or_default()))
    }

    /// Endpoint currently considered primary, or `None` if none has succeeded.
    pub fn active_endpoint(&self) -> Option<Endpoint> {
        self.shared
            .state
            .active_index()
            .and_then(|i| self.shared.endpoints.get(i).cloned())
    }

    /// Failed attempts since the last success or switch.
    pub fn failure_count(&self) -> u64 {
        self.shared.state.failure_count()
    }

    pub fn endpoints(&self) -> &EndpointList {
        &self.shared.endpoints
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.shared.policy
    }

    /// Stop the recovery worker and interrupt pending retry waits.
    ///
    /// Waits up to five seconds for the worker, then aborts it.
    pub async fn shutdown(&self) {
        self.shared.shutdown.trigger();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = worker else {
            return;
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(_) => tracing::info!("Recovery worker stopped"),
            Err(_) => {
                tracing::warn!("Recovery worker did not stop in time, aborting");
                handle.abort();
            }
        }
    }

    async fn acquire_traced(
        &self,
        credentials: Option<&Credentials>,
    ) -> FailoverResult<(T::Session, usize)> {
        let span = tracing::info_span!("acquire", run_id = %Uuid::new_v4());
        self.acquire_inner(credentials).instrument(span).await
    }

    async fn acquire_inner(
        &self,
        credentials: Option<&Credentials>,
    ) -> FailoverResult<(T::Session, usize)> {
        let shared = &self.shared;
        let credentials = credentials.unwrap_or(&shared.credentials);
        let mut signal = shared.shutdown.subscribe();
        if signal.is_triggered() {
            return Err(FailoverError::ShuttingDown);
        }

        let start = shared.state.active_index().unwrap_or(0);

        for index in shared.endpoints.cycle_from(start) {
            let endpoint = &shared.endpoints[index];

            match shared
                .connect_with_retry(index, credentials, &mut signal)
                .await
            {
                Ok(mut session) => {
                    shared.state.set_active(index);
                    shared.metrics.mark_up(endpoint);
                    let watchdog = FaultWatchdog::new(
                        endpoint.clone(),
                        index,
                        shared.metrics.clone(),
                        shared.alerts.clone(),
                        self.recovery.clone(),
                    );
                    session.set_fault_handler(watchdog.into_handler());

                    tracing::info!(
                        endpoint = %endpoint,
                        virtual_host = %credentials.virtual_host(),
                        "Connected to broker"
                    );
                    return Ok((session, index));
                }
                Err(AttemptError::Exhausted) => {
                    shared
                        .alerts
                        .notify(&format!("All retries failed for endpoint {}", endpoint));
                    shared.fail_over(index);
                }
                Err(AttemptError::Cancelled) => return Err(FailoverError::ShuttingDown),
            }
        }

        tracing::error!(endpoints = %shared.endpoints, "All broker endpoints failed");
        Err(FailoverError::AllEndpointsExhausted {
            endpoints: shared.endpoints.clone(),
        })
    }
}

impl<T: Transport> Drop for FailoverManager<T> {
    fn drop(&mut self) {
        self.shared.shutdown.trigger();
    }
}

impl<T: Transport> std::fmt::Debug for FailoverManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverManager")
            .field("endpoints", &self.shared.endpoints)
            .field("policy", &self.shared.policy)
            .field("state", &self.shared.state)
            .finish()
    }
}

/// Builder for [`FailoverManager`].
pub struct FailoverManagerBuilder<T: Transport> {
    endpoints: EndpointList,
    transport: T,
    credentials: Credentials,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
    alerts: Arc<dyn AlertChannel>,
    reset_hook: Option<Arc<dyn ResetHook>>,
}

impl<T: Transport> FailoverManagerBuilder<T> {
    pub fn new(endpoints: EndpointList, transport: T) -> Self {
        Self {
            endpoints,
            transport,
            credentials: Credentials::default(),
            policy: RetryPolicy::default(),
            metrics: Arc::new(PrometheusMetrics::new()),
            alerts: Arc::new(LogAlertChannel),
            reset_hook: None,
        }
    }

    /// Builder preloaded with the endpoints, credentials, and retry policy
    /// from a broker config section.
    ///
    /// # Errors
    /// [`FailoverError::Configuration`] if the endpoint list is empty.
    pub fn from_config(config: &BrokerConfig, transport: T) -> FailoverResult<Self> {
        Ok(Self::new(config.endpoint_list()?, transport)
            .credentials(config.credentials())
            .retry_policy(config.retry_policy()))
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertChannel>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Hook notified after every endpoint switch.
    pub fn reset_hook(mut self, hook: Arc<dyn ResetHook>) -> Self {
        self.reset_hook = Some(hook);
        self
    }

    /// Build the manager and start its recovery worker.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> FailoverManager<T> {
        let shared = Arc::new(Shared {
            state: FailoverState::new(self.endpoints.len(), self.reset_hook),
            endpoints: self.endpoints,
            policy: self.policy,
            credentials: self.credentials,
            transport: self.transport,
            metrics: self.metrics,
            alerts: self.alerts,
            shutdown: Shutdown::new(),
        });

        tracing::info!(
            endpoints = %shared.endpoints,
            retry_limit = shared.policy.limit(),
            retry_delay_ms = shared.policy.delay().as_millis() as u64,
            "Failover manager started"
        );

        let (recovery, worker) = RecoveryWorker::spawn(shared.clone());

        FailoverManager {
            shared,
            recovery,
            worker: Mutex::new(Some(worker)),
        }
    }
}
