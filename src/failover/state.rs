//! Active-endpoint state and the switching protocol.
//!
//! # States
//! - Unset: no endpoint has ever accepted a connection
//! - Active(i): endpoint `i` is the preferred starting point
//!
//! # State Transitions
//! ```text
//! any → Active(i):        set_active(i) after a successful connect
//! Active(i) → Active(i+1): advance(i) after endpoint i is exhausted
//! ```
//!
//! # Design Decisions
//! - One mutex guards index and failure count; no `.await` while held
//! - `advance(from)` is a no-op unless `from` is still the active endpoint,
//!   which coalesces overlapping failovers
//! - Switches are serialized end to end, including the reset hook call,
//!   but the hook runs after the data lock is released so it may read state

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::failover::ResetHook;

#[derive(Debug, Default)]
struct StateInner {
    active: Option<usize>,
    failures: u64,
}

/// Point-in-time copy of the failover state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub active_index: Option<usize>,
    pub failure_count: u64,
}

/// A completed endpoint switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: usize,
    pub to: usize,
}

/// Active endpoint index and rolling failure counter.
pub struct FailoverState {
    len: usize,
    inner: Mutex<StateInner>,
    switching: Mutex<()>,
    reset_hook: Option<Arc<dyn ResetHook>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FailoverState {
    /// Create state for `len` endpoints, initially unset.
    pub fn new(len: usize, reset_hook: Option<Arc<dyn ResetHook>>) -> Self {
        Self {
            len: len.max(1),
            inner: Mutex::new(StateInner::default()),
            switching: Mutex::new(()),
            reset_hook,
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        lock(&self.inner).active
    }

    pub fn failure_count(&self) -> u64 {
        lock(&self.inner).failures
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = lock(&self.inner);
        StateSnapshot {
            active_index: inner.active,
            failure_count: inner.failures,
        }
    }

    /// Record a successful connect to `index`. Never calls the reset hook.
    ///
    /// Returns the previously active index.
    pub fn set_active(&self, index: usize) -> Option<usize> {
        let mut inner = lock(&self.inner);
        let previous = inner.active.replace(index % self.len);
        inner.failures = 0;
        previous
    }

    /// Count one failed attempt. Returns the new count.
    pub fn record_failure(&self) -> u64 {
        let mut inner = lock(&self.inner);
        inner.failures = inner.failures.saturating_add(1);
        inner.failures
    }

    pub fn reset_failures(&self) {
        lock(&self.inner).failures = 0;
    }

    /// Move the active endpoint past `from`.
    ///
    /// No-op when the list has one endpoint, when nothing was ever active,
    /// or when another caller already moved past `from`. On a real switch
    /// the failure count is cleared and the reset hook runs before return.
    pub fn advance(&self, from: usize) -> Option<Switch> {
        let _switching = lock(&self.switching);

        let switch = {
            let mut inner = lock(&self.inner);
            let to = (from + 1) % self.len;
            if to == from || inner.active != Some(from) {
                return None;
            }
            inner.active = Some(to);
            inner.failures = 0;
            Switch { from, to }
        };

        match &self.reset_hook {
            Some(hook) => hook.on_failover(),
            None => tracing::warn!("No reset hook registered; cached sessions are not reset"),
        }

        Some(switch)
    }
}

impl std::fmt::Debug for FailoverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverState")
            .field("len", &self.len)
            .field("state", &self.snapshot())
            .field("reset_hook", &self.reset_hook.is_some())
            .finish()
    }
}
