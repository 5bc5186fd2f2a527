//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt against an endpoint:
//!     → timeouts.rs (bound the connect attempt)
//!     → On failure: retries.rs (count attempt, wait fixed delay)
//!     → backoff.rs (constant delay, optional jitter)
//! ```
//!
//! # Design Decisions
//! - Every transport attempt has a deadline
//! - The same policy drives foreground acquisition and background recovery
//! - Waits are interruptible so shutdown never sits out a full delay

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{Cancelled, RetryPolicy};
