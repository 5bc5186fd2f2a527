//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls FailoverManager::shutdown
//!
//! Shutdown (shutdown.rs):
//!     trigger → retry waits abort → recovery worker exits → joined
//! ```
//!
//! # Design Decisions
//! - One coordinator per manager, owned by the manager
//! - Shutdown has a deadline: the worker is aborted if it does not exit

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
