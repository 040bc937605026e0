//! A single global mutual-exclusion primitive guarding the integration
//! critical section: applying a fix, re-running diagnostics, and committing
//! the result must happen one file at a time even though fix generation
//! itself runs with many files in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Errors acquiring the integration lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock was not acquired within the requested timeout.
    #[error("timed out waiting {0:?} for the integration lock")]
    Timeout(Duration),
}

/// Guards the single-writer integration critical section.
///
/// Cloning an `IntegrationLock` shares the same underlying mutex; every
/// branch of the orchestrator holds a clone and calls [`IntegrationLock::acquire`]
/// before touching the working tree.
#[derive(Debug, Clone)]
pub struct IntegrationLock {
    inner: Arc<Mutex<()>>,
}

impl IntegrationLock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Blocks until the lock is free, with no upper bound. Used by branches
    /// that have already succeeded and must not give up on integration.
    pub async fn acquire(&self) -> IntegrationLockGuard {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        debug!("acquired integration lock");
        IntegrationLockGuard { _guard: guard }
    }

    /// Blocks until the lock is free or `timeout` elapses, whichever comes
    /// first.
    ///
    /// # Errors
    /// Returns [`LockError::Timeout`] if the lock is still held by another
    /// branch after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<IntegrationLockGuard, LockError> {
        match tokio::time::timeout(timeout, Arc::clone(&self.inner).lock_owned()).await {
            Ok(guard) => {
                debug!("acquired integration lock");
                Ok(IntegrationLockGuard { _guard: guard })
            }
            Err(_) => Err(LockError::Timeout(timeout)),
        }
    }
}

impl Default for IntegrationLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one integration critical section; releases the
/// lock automatically on drop.
#[derive(Debug)]
pub struct IntegrationLockGuard {
    _guard: OwnedMutexGuard<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn second_acquire_waits_for_first_release() {
        let lock = IntegrationLock::new();
        let guard = lock.acquire().await;
        let lock2 = lock.clone();
        let start = Instant::now();
        let handle = tokio::spawn(async move {
            let _g = lock2.acquire().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);
        handle.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn acquire_timeout_fails_while_held() {
        let lock = IntegrationLock::new();
        let _guard = lock.acquire().await;
        let result = lock.acquire_timeout(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(LockError::Timeout(_))));
    }
}
