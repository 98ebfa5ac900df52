use crate::{
    error::{Error, Result},
    store::ShortnoStore,
};
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Hands out each short number to at most one caller.
///
/// Claims are serialized through a process-wide gate: every caller in this
/// process acquires it before touching the store and releases it on every
/// exit path, so concurrent claims are totally ordered by acquisition order.
/// The gate is held only across the claim round trip, never across
/// generation, which happens on the [`Replenisher`](crate::Replenisher).
///
/// The gate does not reach other processes; there, exclusivity rests on
/// [`ShortnoStore::claim_one`] being atomic.
pub struct Allocator<S> {
    store: Arc<S>,
    gate: Mutex<()>,
    store_timeout: Option<Duration>,
}

impl<S: ShortnoStore> Allocator<S> {
    pub fn new(store: Arc<S>, store_timeout: Option<Duration>) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
            store_timeout,
        }
    }

    /// Claims one unlocked short number.
    ///
    /// # Errors
    ///
    /// - [`Error::Exhausted`] if the pool has no unlocked record. Callers
    ///   should retry later or surface a "try again" response.
    /// - [`Error::Store`] if the store fails or exceeds the configured
    ///   timeout.
    pub async fn allocate(&self) -> Result<String> {
        let _guard = self.gate.lock().await;
        self.claim().await
    }

    /// Like [`allocate`](Self::allocate), but gives up with
    /// [`Error::Cancelled`] as soon as `token` fires, whether the caller is
    /// still queued on the gate or already waiting on the store.
    ///
    /// If cancellation lands after the store committed the claim, that short
    /// number stays locked without having been returned to anyone. It is
    /// never handed out twice.
    ///
    /// # Errors
    ///
    /// As [`allocate`](Self::allocate), plus [`Error::Cancelled`].
    pub async fn allocate_with(&self, token: &CancellationToken) -> Result<String> {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            res = self.allocate() => res,
        }
    }

    async fn claim(&self) -> Result<String> {
        let claimed = match self.store_timeout {
            Some(after) => tokio::time::timeout(after, self.store.claim_one())
                .await
                .map_err(|_| Error::timed_out(after))??,
            None => self.store.claim_one().await?,
        };

        match claimed {
            Some(value) => {
                tracing::debug!(%value, "Allocated short number");
                Ok(value)
            }
            None => {
                tracing::warn!("Short number pool exhausted");
                Err(Error::Exhausted)
            }
        }
    }
}
