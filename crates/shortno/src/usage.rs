use crate::{
    error::{Error, Result},
    store::ShortnoStore,
};
use core::time::Duration;
use std::sync::Arc;

/// Marks allocated short numbers as consumed by a business owner.
///
/// No in-process gate is taken: the caller exclusively owns the value by the
/// time it records usage, and the store applies the update atomically.
pub struct UsageRecorder<S> {
    store: Arc<S>,
    store_timeout: Option<Duration>,
}

impl<S: ShortnoStore> UsageRecorder<S> {
    pub fn new(store: Arc<S>, store_timeout: Option<Duration>) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Records that `value` is now in use by `owner`.
    ///
    /// Recording the same owner twice succeeds both times.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`] if `value` is already used by another owner. This
    ///   points at a caller reusing someone else's short number and should be
    ///   reported, not retried.
    /// - [`Error::NotFound`] / [`Error::NotClaimed`] if `value` was never
    ///   allocated.
    /// - [`Error::Store`] on store failure or timeout.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn record_used(&self, value: &str, owner: &str) -> Result<()> {
        let res = match self.store_timeout {
            Some(after) => tokio::time::timeout(after, self.store.mark_used(value, owner))
                .await
                .map_err(|_| Error::timed_out(after))?,
            None => self.store.mark_used(value, owner).await,
        };

        if let Err(Error::Conflict { existing, .. }) = &res {
            tracing::error!(%value, %existing, requested = %owner, "Short number reused by a different owner");
        }
        res
    }
}
