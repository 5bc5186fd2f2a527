//! Broker transport abstraction.
//!
//! # Data Flow
//! ```text
//! FailoverManager picks endpoint
//!     → Transport::connect(endpoint, credentials)
//!     → Session returned to caller
//!     → Session::set_fault_handler(watchdog)
//!
//! Connection lost later:
//!     transport dispatch context → FaultHandler(error)
//! ```
//!
//! # Design Decisions
//! - The failover core never knows how a session is established
//! - Fault handlers are plain callbacks so any transport's native
//!   listener mechanism can drive them
//! - Handlers must return quickly; they run on the transport's own context

pub mod tcp;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::endpoint::Endpoint;
use crate::failover::Credentials;

pub use tcp::{TcpSession, TcpTransport};

/// Callback invoked by a session when the transport reports a fault.
pub type FaultHandler = Box<dyn Fn(TransportError) + Send + Sync + 'static>;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("Connect error: {0}")]
    Connect(String),

    /// Connection attempt did not complete in time.
    #[error("Connect timeout after {0:?}")]
    Timeout(Duration),

    /// Endpoint address is not usable by this transport.
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Establishes sessions against a single endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Session type produced by a successful connect.
    type Session: Session;

    /// Make one connection attempt. Must not retry internally.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Self::Session, TransportError>;
}

/// An established broker session.
pub trait Session: Send + 'static {
    /// Register the handler to call on asynchronous connection loss.
    ///
    /// Replaces any previously registered handler.
    fn set_fault_handler(&mut self, handler: FaultHandler);

    /// Whether the session can still be used. Defaults to true for
    /// transports that cannot tell.
    fn is_live(&self) -> bool {
        true
    }
}
