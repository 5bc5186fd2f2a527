//! Failover connection management.
//!
//! # Data Flow
//! ```text
//! acquire():
//!     snapshot active index (state.rs)
//!     → manager.rs visits endpoints once around the list
//!     → per endpoint: RetryPolicy attempts via Transport
//!     → success: state.set_active, metrics up, attach watchdog.rs
//!     → exhaustion: alert, state.advance(from), next endpoint
//!
//! Session fault (transport context):
//!     watchdog.rs → metrics down, alert, enqueue request (never blocks)
//!     → recovery.rs worker task → probe same endpoint per RetryPolicy
//!     → exhaustion: alert, state.advance(from) → ResetHook
//! ```
//!
//! # Design Decisions
//! - Failover state is owned by the manager and never global
//! - Only `advance` and the set-on-success path write the active index
//! - Overlapping failovers away from one endpoint coalesce into one switch
//! - The recovery worker is a supervised task the manager starts and stops

pub mod manager;
pub mod recovery;
pub mod state;
pub mod types;
pub mod watchdog;

pub use manager::{FailoverManager, FailoverManagerBuilder};
pub use recovery::RecoveryHandle;
pub use state::{FailoverState, StateSnapshot, Switch};
pub use types::{AcknowledgeMode, Credentials, FailoverError, FailoverResult, SessionContext};
pub use watchdog::FaultWatchdog;

/// Notified after the active endpoint switches.
///
/// Implemented by caching or pooling layers above the manager so they can
/// drop sessions bound to the old endpoint. Called synchronously on the
/// task that performed the switch; keep it short.
pub trait ResetHook: Send + Sync {
    fn on_failover(&self);
}
