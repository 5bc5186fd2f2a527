//! Multi-endpoint broker failover library

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod failover;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use cache::{CacheEpoch, SessionCache};
pub use config::schema::FailoverConfig;
pub use endpoint::{Endpoint, EndpointList};
pub use failover::{
    AcknowledgeMode, Credentials, FailoverError, FailoverManager, FailoverResult, ResetHook,
    SessionContext,
};
pub use lifecycle::Shutdown;
pub use transport::{FaultHandler, Session, Transport, TransportError};
