//! Per-pair lifecycle locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as PairLock, OwnedMutexGuard};

use crate::core::ConnectionKey;

/// One async lock per (participant, endpoint) pair.
///
/// An entry lives only while a lifecycle holds or waits for it. Idle
/// entries are swept on every acquire and release.
#[derive(Debug, Default)]
pub(crate) struct PairLocks {
    locks: Mutex<HashMap<ConnectionKey, Arc<PairLock<()>>>>,
}

impl PairLocks {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait for exclusive use of `key`.
    pub(crate) async fn acquire(self: &Arc<Self>, key: ConnectionKey) -> PairGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            sweep(&mut locks);
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = lock.lock_owned().await;
        PairGuard {
            locks: Arc::clone(self),
            guard: Some(guard),
        }
    }

    /// Pairs with a lifecycle running or waiting.
    pub(crate) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self) {
        sweep(&mut self.locks.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Drop entries nobody holds or waits for. The map's own `Arc` is the only
/// reference left on those.
fn sweep(locks: &mut HashMap<ConnectionKey, Arc<PairLock<()>>>) {
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
}

/// Exclusive use of one pair. Releases on drop.
#[derive(Debug)]
pub(crate) struct PairGuard {
    locks: Arc<PairLocks>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(p: &str, e: &str) -> ConnectionKey {
        ConnectionKey::new(p.into(), e.into())
    }

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = PairLocks::new();
        let guard = locks.acquire(key("alice", "food")).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_pending() {
        let locks = PairLocks::new();
        let first = locks.acquire(key("alice", "food")).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(key("alice", "food")).await;
            })
        };
        tokio::task::yield_now().await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_waiter_leaves_nothing() {
        let locks = PairLocks::new();
        let held = locks.acquire(key("alice", "food")).await;
        let waited = tokio::time::timeout(
            Duration::from_millis(10),
            locks.acquire(key("alice", "food")),
        )
        .await;
        assert!(waited.is_err());
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_swept_by_next_acquire() {
        let locks = PairLocks::new();
        let held = locks.acquire(key("alice", "food")).await;

        let mut waiter = Box::pin(locks.acquire(key("alice", "food")));
        tokio::select! {
            biased;
            _ = &mut waiter => panic!("pair is held"),
            _ = tokio::task::yield_now() => {}
        }
        drop(held);
        drop(waiter);
        assert_eq!(locks.len(), 1);

        drop(locks.acquire(key("bob", "food")).await);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_pairs_are_independent() {
        let locks = PairLocks::new();
        let _a = locks.acquire(key("alice", "food")).await;
        let _b = locks.acquire(key("alice", "travel")).await;
        assert_eq!(locks.len(), 2);
    }
}
