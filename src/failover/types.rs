//! Credentials, session contexts, and error definitions.

use thiserror::Error;

use crate::endpoint::{Endpoint, EndpointList};

/// Username/password/virtual-host triple used to open sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    virtual_host: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        virtual_host: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            virtual_host: virtual_host.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn virtual_host(&self) -> &str {
        &self.virtual_host
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("default", "", "default")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("virtual_host", &self.virtual_host)
            .finish()
    }
}

/// Acknowledgement mode of a session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcknowledgeMode {
    /// Messages are acknowledged on receipt.
    #[default]
    Auto,
    /// The client acknowledges explicitly.
    Client,
    /// Lazy acknowledgement; duplicates tolerated.
    DupsOk,
    /// Acknowledgement happens on commit.
    Transacted,
}

/// A session scoped to one acknowledgement mode.
#[derive(Debug)]
pub struct SessionContext<S> {
    session: S,
    endpoint: Endpoint,
    mode: AcknowledgeMode,
}

impl<S> SessionContext<S> {
    pub(crate) fn new(session: S, endpoint: Endpoint, mode: AcknowledgeMode) -> Self {
        Self {
            session,
            endpoint,
            mode,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Endpoint the session was established against.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> AcknowledgeMode {
        self.mode
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

/// Errors surfaced by the failover manager.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// Endpoint list or settings are unusable. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every endpoint's retry budget was spent in one cycle.
    #[error("All broker endpoints failed: {endpoints}")]
    AllEndpointsExhausted { endpoints: EndpointList },

    /// The manager was shut down while the call was waiting.
    #[error("Failover manager is shut down")]
    ShuttingDown,
}

/// Result type for failover operations.
pub type FailoverResult<T> = Result<T, FailoverError>;
