//! TCP reachability transport.
//!
//! # Responsibilities
//! - Resolve `host:port` or `scheme://host:port` endpoint addresses
//! - Open one TCP connection per attempt, bounded by a connect timeout
//! - Watch the connection and raise a fault when the broker drops it
//!
//! # Design Decisions
//! - No broker protocol is spoken; a session proves reachability only
//! - Inbound bytes are read and discarded so a close is noticed promptly
//! - Dropping the session stops the watcher without raising a fault

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use url::Url;

use crate::endpoint::Endpoint;
use crate::failover::Credentials;
use crate::resilience::timeouts::with_timeout;
use crate::transport::{FaultHandler, Session, Transport, TransportError};

/// Port used when an endpoint address does not name one.
pub const DEFAULT_BROKER_PORT: u16 = 55555;

/// Registered handler, or a fault that arrived before one was registered.
#[derive(Default)]
struct FaultSlot {
    handler: Option<FaultHandler>,
    pending: Option<TransportError>,
}

type HandlerSlot = Arc<Mutex<FaultSlot>>;

/// Transport that treats a live TCP connection as a broker session.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with the given per-attempt connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Split an endpoint address into a `host:port` target.
pub fn resolve_target(endpoint: &Endpoint) -> Result<String, TransportError> {
    let raw = endpoint.as_str();
    let invalid = || TransportError::InvalidEndpoint(raw.to_string());

    if raw.contains("://") {
        let url = Url::parse(raw).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?;
        let port = url.port().unwrap_or(DEFAULT_BROKER_PORT);
        return Ok(format!("{}:{}", host, port));
    }

    if raw.is_empty() {
        return Err(invalid());
    }

    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(raw.to_string())
        }
        Some(_) => Err(invalid()),
        None => Ok(format!("{}:{}", raw, DEFAULT_BROKER_PORT)),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Session = TcpSession;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<TcpSession, TransportError> {
        let target = resolve_target(endpoint)?;
        tracing::debug!(
            endpoint = %endpoint,
            target = %target,
            username = %credentials.username(),
            virtual_host = %credentials.virtual_host(),
            "Opening TCP session"
        );

        let stream = with_timeout(self.connect_timeout, TcpStream::connect(&target))
            .await?
            .map_err(|e| TransportError::Connect(format!("{}: {}", target, e)))?;
        let _ = stream.set_nodelay(true);

        Ok(TcpSession::start(endpoint.clone(), stream))
    }
}

/// A live TCP connection to a broker endpoint.
pub struct TcpSession {
    endpoint: Endpoint,
    peer: Option<SocketAddr>,
    writer: OwnedWriteHalf,
    handler: HandlerSlot,
    watcher: JoinHandle<()>,
}

impl TcpSession {
    fn start(endpoint: Endpoint, stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        let handler: HandlerSlot = Arc::new(Mutex::new(FaultSlot::default()));
        let watcher = tokio::spawn(watch_peer(reader, endpoint.clone(), handler.clone()));

        Self {
            endpoint,
            peer,
            writer,
            handler,
            watcher,
        }
    }

    /// Endpoint this session was established against.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Remote socket address, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Whether the broker is still connected.
    pub fn is_open(&self) -> bool {
        !self.watcher.is_finished()
    }

    /// Close the session without raising a fault.
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.watcher.abort();
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for TcpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSession")
            .field("endpoint", &self.endpoint)
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Session for TcpSession {
    fn set_fault_handler(&mut self, handler: FaultHandler) {
        let mut slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(error) = slot.pending.take() {
            tracing::debug!(endpoint = %self.endpoint, "Replaying fault raised before handler registration");
            handler(error);
        }
        slot.handler = Some(handler);
    }

    fn is_live(&self) -> bool {
        self.is_open()
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn watch_peer(mut reader: OwnedReadHalf, endpoint: Endpoint, handler: HandlerSlot) {
    let mut buf = [0u8; 1024];
    let error = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break TransportError::ConnectionLost("peer closed connection".to_string()),
            Ok(_) => continue,
            Err(e) => break TransportError::ConnectionLost(e.to_string()),
        }
    };

    tracing::debug!(endpoint = %endpoint, error = %error, "TCP session dropped by peer");

    let mut slot = handler.lock().unwrap_or_else(PoisonError::into_inner);
    match slot.handler.as_ref() {
        Some(on_fault) => on_fault(error),
        None => {
            tracing::debug!(endpoint = %endpoint, "Session fault held until a handler is registered");
            slot.pending = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(&"broker:1234".into()).unwrap(), "broker:1234");
        assert_eq!(resolve_target(&"broker".into()).unwrap(), "broker:55555");
        assert_eq!(resolve_target(&"tcp://broker:1".into()).unwrap(), "broker:1");
        assert_eq!(resolve_target(&"smf://broker".into()).unwrap(), "broker:55555");
        assert!(resolve_target(&"broker:notaport".into()).is_err());
        assert!(resolve_target(&":80".into()).is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpTransport::new(Duration::from_secs(2));
        let result = transport
            .connect(&Endpoint::new(addr.to_string()), &Credentials::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_peer_close_raises_fault() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpTransport::default();
        let endpoint = Endpoint::new(addr.to_string());
        let credentials = Credentials::default();
        let connect = transport.connect(&endpoint, &credentials);
        let (session, accepted) = tokio::join!(connect, listener.accept());
        let mut session = session.unwrap();
        let (server_side, _) = accepted.unwrap();

        let faults = Arc::new(AtomicUsize::new(0));
        let seen = faults.clone();
        session.set_fault_handler(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        drop(server_side);

        for _ in 0..50 {
            if faults.load(Ordering::SeqCst) > 0 && !session.is_open() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(faults.load(Ordering::SeqCst), 1);
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_fault_before_handler_is_replayed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TcpTransport::default();
        let endpoint = Endpoint::new(addr.to_string());
        let credentials = Credentials::default();
        let connect = transport.connect(&endpoint, &credentials);
        let (session, accepted) = tokio::join!(connect, listener.accept());
        let mut session = session.unwrap();
        let (server_side, _) = accepted.unwrap();

        drop(server_side);
        for _ in 0..50 {
            if !session.is_open() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!session.is_live());

        let faults = Arc::new(AtomicUsize::new(0));
        let seen = faults.clone();
        session.set_fault_handler(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(faults.load(Ordering::SeqCst), 1);
    }
}
