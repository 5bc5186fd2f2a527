//! Shared-session caching above the failover manager.
//!
//! # Responsibilities
//! - Keep one shared session and hand out clones of it
//! - Discard the cached session after an endpoint switch
//! - Discard a cached session that is no longer live, even when recovery
//!   brought its endpoint back without a switch
//!
//! # Design Decisions
//! - The manager only knows [`CacheEpoch`] (a reset hook); the cache holds
//!   the manager. No ownership cycle.
//! - A switch bumps the epoch; the next `get` sees the mismatch and reacquires

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::failover::{FailoverManager, FailoverResult, ResetHook};
use crate::transport::{Session, Transport};

#[derive(Debug, Default)]
struct EpochInner {
    value: AtomicU64,
    changed: Notify,
}

/// Generation counter bumped on every endpoint switch.
#[derive(Debug, Clone, Default)]
pub struct CacheEpoch(Arc<EpochInner>);

impl CacheEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.value.load(Ordering::SeqCst)
    }

    /// Wait until the epoch differs from `seen`. Returns at once if it already does.
    pub async fn changed_since(&self, seen: u64) {
        loop {
            let notified = self.0.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.current() != seen {
                return;
            }
            notified.await;
        }
    }
}

impl ResetHook for CacheEpoch {
    fn on_failover(&self) {
        let epoch = self.0.value.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.changed.notify_waiters();
        tracing::info!(epoch, "Discarding cached broker sessions");
    }
}

struct Cached<S> {
    epoch: u64,
    session: Arc<S>,
}

/// Caches one session from a [`FailoverManager`].
pub struct SessionCache<T: Transport> {
    manager: Arc<FailoverManager<T>>,
    epoch: CacheEpoch,
    slot: Mutex<Option<Cached<T::Session>>>,
}

impl<T: Transport> SessionCache<T> {
    /// Create a cache. `epoch` must be the hook registered on `manager`.
    pub fn new(manager: Arc<FailoverManager<T>>, epoch: CacheEpoch) -> Self {
        Self {
            manager,
            epoch,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached session, acquiring a new one if it is missing or stale.
    ///
    /// # Errors
    /// Propagates acquisition failures from the manager.
    pub async fn get(&self) -> FailoverResult<Arc<T::Session>> {
        let mut slot = self.slot.lock().await;
        let epoch = self.epoch.current();

        if let Some(cached) = slot.as_ref() {
            if cached.epoch != epoch {
                tracing::debug!(cached = cached.epoch, current = epoch, "Cached session is stale");
            } else if !cached.session.is_live() {
                tracing::debug!("Cached session is no longer live");
            } else {
                return Ok(cached.session.clone());
            }
        }

        *slot = None;
        let session = Arc::new(self.manager.acquire(None).await?);
        *slot = Some(Cached {
            epoch,
            session: session.clone(),
        });
        Ok(session)
    }

    /// Drop the cached session, if any.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub fn manager(&self) -> &Arc<FailoverManager<T>> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_bumps_on_failover() {
        let epoch = CacheEpoch::new();
        let hook: Arc<dyn ResetHook> = Arc::new(epoch.clone());
        assert_eq!(epoch.current(), 0);
        hook.on_failover();
        hook.on_failover();
        assert_eq!(epoch.current(), 2);
    }

    #[tokio::test]
    async fn test_changed_wakes_waiter() {
        let epoch = CacheEpoch::new();
        let waiter = epoch.clone();
        let task = tokio::spawn(async move { waiter.changed_since(0).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        epoch.on_failover();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_changed_since_returns_for_missed_switch() {
        let epoch = CacheEpoch::new();
        epoch.on_failover();
        tokio::time::timeout(std::time::Duration::from_secs(1), epoch.changed_since(0))
            .await
            .unwrap();
    }
}
