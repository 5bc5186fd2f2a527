//! Shared stubs and helpers for failover integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use broker_failover::failover::FailoverManagerBuilder;
use broker_failover::observability::{AlertChannel, MetricsSink};
use broker_failover::resilience::RetryPolicy;
use broker_failover::{
    Credentials, Endpoint, EndpointList, FailoverManager, FaultHandler, ResetHook, Session,
    Transport, TransportError,
};

/// How the stub transport answers connects to one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Up,
    Down,
    /// Fail this many more attempts, then succeed.
    FailTimes(usize),
}

#[derive(Default)]
struct StubInner {
    behavior: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
    usernames: Mutex<Vec<String>>,
}

/// Scriptable transport. Unscripted endpoints are up.
#[derive(Clone, Default)]
pub struct StubTransport {
    inner: Arc<StubInner>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, endpoint: &str, behavior: Behavior) {
        self.inner
            .behavior
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), behavior);
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == endpoint).count()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.inner.usernames.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    type Session = StubSession;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<StubSession, TransportError> {
        self.inner.calls.lock().unwrap().push(endpoint.to_string());
        self.inner
            .usernames
            .lock()
            .unwrap()
            .push(credentials.username().to_string());

        let mut behavior = self.inner.behavior.lock().unwrap();
        let entry = behavior.entry(endpoint.to_string()).or_insert(Behavior::Up);
        let ok = match entry {
            Behavior::Up => true,
            Behavior::Down => false,
            Behavior::FailTimes(0) => true,
            Behavior::FailTimes(n) => {
                *n -= 1;
                false
            }
        };

        if ok {
            Ok(StubSession {
                endpoint: endpoint.clone(),
                handler: Arc::new(Mutex::new(None)),
                live: AtomicBool::new(true),
            })
        } else {
            Err(TransportError::Connect(format!("{} refused", endpoint)))
        }
    }
}

/// Session whose fault can be fired by the test.
pub struct StubSession {
    pub endpoint: Endpoint,
    handler: Arc<Mutex<Option<FaultHandler>>>,
    live: AtomicBool,
}

impl StubSession {
    /// Simulate the transport reporting connection loss.
    pub fn fire_fault(&self) {
        self.live.store(false, Ordering::SeqCst);
        let handler = self.handler.lock().unwrap();
        let handler = handler.as_ref().expect("manager attaches a fault handler");
        handler(TransportError::ConnectionLost("simulated".to_string()));
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

impl std::fmt::Debug for StubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubSession")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Session for StubSession {
    fn set_fault_handler(&mut self, handler: FaultHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    Up(String),
    Down(String),
    Failure(String),
}

#[derive(Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    pub fn count(&self, event: MetricEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| **e == event).count()
    }

    pub fn ups(&self, endpoint: &str) -> usize {
        self.count(MetricEvent::Up(endpoint.to_string()))
    }

    pub fn downs(&self, endpoint: &str) -> usize {
        self.count(MetricEvent::Down(endpoint.to_string()))
    }

    pub fn failures(&self, endpoint: &str) -> usize {
        self.count(MetricEvent::Failure(endpoint.to_string()))
    }
}

impl MetricsSink for RecordingMetrics {
    fn mark_up(&self, endpoint: &Endpoint) {
        self.events.lock().unwrap().push(MetricEvent::Up(endpoint.to_string()));
    }

    fn mark_down(&self, endpoint: &Endpoint) {
        self.events.lock().unwrap().push(MetricEvent::Down(endpoint.to_string()));
    }

    fn inc_failure(&self, endpoint: &Endpoint) {
        self.events
            .lock()
            .unwrap()
            .push(MetricEvent::Failure(endpoint.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

impl AlertChannel for RecordingAlerts {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct CountingResetHook {
    count: AtomicUsize,
}

impl CountingResetHook {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ResetHook for CountingResetHook {
    fn on_failover(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A manager wired to recording collaborators.
pub struct Harness<T: Transport> {
    pub manager: Arc<FailoverManager<T>>,
    pub metrics: Arc<RecordingMetrics>,
    pub alerts: Arc<RecordingAlerts>,
    pub resets: Arc<CountingResetHook>,
}

pub fn harness<T: Transport>(endpoints: &[&str], transport: T, policy: RetryPolicy) -> Harness<T> {
    let metrics = Arc::new(RecordingMetrics::default());
    let alerts = Arc::new(RecordingAlerts::default());
    let resets = Arc::new(CountingResetHook::default());

    let manager = FailoverManagerBuilder::new(
        EndpointList::new(endpoints.iter().copied()).unwrap(),
        transport,
    )
    .credentials(Credentials::new("app", "secret", "vpn"))
    .retry_policy(policy)
    .metrics(metrics.clone())
    .alerts(alerts.clone())
    .reset_hook(resets.clone())
    .build();

    Harness {
        manager: Arc::new(manager),
        metrics,
        alerts,
        resets,
    }
}

/// Poll `check` until it holds or `limit` elapses.
pub async fn wait_until<F: Fn() -> bool>(check: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Start a TCP listener that accepts connections and hands them to the test.
pub async fn start_mock_broker() -> (SocketAddr, mpsc::UnboundedReceiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    if tx.send(socket).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
