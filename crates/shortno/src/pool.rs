//! The request-facing facade over a short number store.
//!
//! [`ShortnoPool`] bundles the [`Allocator`], the [`UsageRecorder`], and the
//! lifecycle of one [`Replenisher`] task. The hosting process owns the pool:
//! it decides when the loop starts and when it is shut down, and every
//! dependency is injected through [`ShortnoPool::new`].

use crate::{
    allocator::Allocator,
    config::PoolConfig,
    error::{Error, Result},
    record::{PoolStats, ShortnoRecord},
    replenish::Replenisher,
    store::ShortnoStore,
    usage::UsageRecorder,
};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A replenished pool of short numbers.
///
/// Cloning is cheap and every clone shares the same allocation gate and
/// replenishment task.
pub struct ShortnoPool<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ShortnoPool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    store: Arc<S>,
    config: PoolConfig,
    allocator: Allocator<S>,
    recorder: UsageRecorder<S>,
    started: AtomicBool,
    shutdown_token: CancellationToken,
    replenisher: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ShortnoStore> ShortnoPool<S> {
    /// Builds a pool over `store`. The replenishment loop is not running until
    /// [`start`](Self::start) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(store: Arc<S>, config: PoolConfig) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                allocator: Allocator::new(Arc::clone(&store), config.store_timeout),
                recorder: UsageRecorder::new(Arc::clone(&store), config.store_timeout),
                store,
                config,
                started: AtomicBool::new(false),
                shutdown_token: CancellationToken::new(),
                replenisher: Mutex::new(None),
            }),
        })
    }

    /// Spawns the replenishment loop on the current Tokio runtime.
    ///
    /// Only the first call spawns anything. Every later call, from any clone,
    /// returns `Ok(false)` without starting a second loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the replenisher cannot be built or
    /// [`Error::Cancelled`] if the pool was already shut down.
    pub fn start(&self) -> Result<bool> {
        if self.inner.shutdown_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Replenishment loop already running");
            return Ok(false);
        }

        let replenisher =
            match Replenisher::new(Arc::clone(&self.inner.store), self.inner.config.clone()) {
                Ok(replenisher) => replenisher,
                Err(e) => {
                    self.inner.started.store(false, Ordering::Release);
                    return Err(e);
                }
            };

        let handle = tokio::spawn(replenisher.run(self.inner.shutdown_token.child_token()));
        *self.inner.replenisher.lock() = Some(handle);
        Ok(true)
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .replenisher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the replenishment loop and waits up to `shutdown_timeout` for it
    /// to exit. Allocation keeps working against whatever the store holds.
    ///
    /// Calling this more than once, or on a pool that never started, is a
    /// no-op.
    pub async fn shutdown(&self) {
        self.inner.shutdown_token.cancel();

        let Some(handle) = self.inner.replenisher.lock().take() else {
            return;
        };

        match tokio::time::timeout(self.inner.config.shutdown_timeout, handle).await {
            Ok(Ok(())) => tracing::debug!("Replenishment loop shut down"),
            Ok(Err(e)) => tracing::error!(error = %e, "Replenishment task failed"),
            Err(_) => tracing::warn!(
                timeout = ?self.inner.config.shutdown_timeout,
                "Replenishment loop shutdown timed out"
            ),
        }
    }

    /// See [`Allocator::allocate`].
    pub async fn allocate(&self) -> Result<String> {
        self.inner.allocator.allocate().await
    }

    /// See [`Allocator::allocate_with`].
    pub async fn allocate_with(&self, token: &CancellationToken) -> Result<String> {
        self.inner.allocator.allocate_with(token).await
    }

    /// See [`UsageRecorder::record_used`].
    pub async fn record_used(&self, value: &str, owner: &str) -> Result<()> {
        self.inner.recorder.record_used(value, owner).await
    }

    pub async fn count_valid(&self) -> Result<u64> {
        self.inner.store.count_valid().await
    }

    pub async fn stats(&self) -> Result<PoolStats> {
        self.inner.store.stats().await
    }

    pub async fn get(&self, value: &str) -> Result<Option<ShortnoRecord>> {
        self.inner.store.get(value).await
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use core::time::Duration;

    fn config() -> PoolConfig {
        PoolConfig {
            digits: 6,
            low_water_mark: 50,
            batch_size: 20,
            refill_interval: Duration::from_secs(1),
            error_backoff: Duration::from_millis(100),
            ..PoolConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let pool = ShortnoPool::new(Arc::clone(&store), config()).unwrap();
        let other = pool.clone();

        assert!(pool.start().unwrap());
        assert!(!pool.start().unwrap());
        assert!(!other.start().unwrap());

        // A single loop inserts one batch per pass: t = 0s and 1s.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(pool.is_running());
        let total = store.len();
        assert!(total > 20 && total <= 40, "{total}");

        pool.shutdown().await;
        assert!(!pool.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn replenished_values_can_be_allocated_and_used() {
        let pool = ShortnoPool::new(Arc::new(MemoryStore::new()), config()).unwrap();
        assert_eq!(pool.allocate().await, Err(Error::Exhausted));

        pool.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let value = pool.allocate().await.unwrap();
        assert_eq!(value.len(), 6);
        pool.record_used(&value, "biz-a").await.unwrap();

        let record = pool.get(&value).await.unwrap().unwrap();
        assert!(record.locked && record.used);
        assert_eq!(pool.stats().await.unwrap().used, 1);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_prevents_restart() {
        let pool = ShortnoPool::new(Arc::new(MemoryStore::new()), config()).unwrap();
        pool.shutdown().await;
        pool.shutdown().await;
        assert_eq!(pool.start(), Err(Error::Cancelled));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PoolConfig {
            batch_size: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            ShortnoPool::new(Arc::new(MemoryStore::new()), config),
            Err(Error::InvalidConfig { .. })
        ));
    }
}
