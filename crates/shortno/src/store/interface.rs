use crate::{
    error::Result,
    record::{InsertReport, PoolStats, ShortnoRecord},
};
use core::future::Future;

/// The narrow query contract the pool needs from its persistence layer.
///
/// Implementations must make each method a single atomic operation against
/// the backing store. [`claim_one`](Self::claim_one) in particular must select
/// and lock a record in one step: the in-process allocation gate only
/// serializes callers within one process, so it is the store's atomicity that
/// keeps two processes from claiming the same record.
pub trait ShortnoStore: Send + Sync + 'static {
    /// Number of records with `locked = false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`](crate::Error::Store) on I/O failure.
    fn count_valid(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Inserts new unlocked, unused records.
    ///
    /// Values already present in the store, or repeated within `values`, are
    /// skipped and counted in [`InsertReport::skipped`]. Duplicates never fail
    /// the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`](crate::Error::Store) on I/O failure, in which
    /// case no record from the batch is inserted.
    fn insert_batch(&self, values: &[String]) -> impl Future<Output = Result<InsertReport>> + Send;

    /// Atomically locks one unlocked record and returns its value, or `None`
    /// when every record is locked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`](crate::Error::Store) on I/O failure.
    fn claim_one(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Marks a claimed record as used by `owner`.
    ///
    /// Repeating the call with the same owner is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`](crate::Error::Conflict) if the record is already
    ///   used by a different owner. The stored owner is left untouched.
    /// - [`Error::NotFound`](crate::Error::NotFound) if `value` was never
    ///   inserted.
    /// - [`Error::NotClaimed`](crate::Error::NotClaimed) if the record is
    ///   still unlocked.
    /// - [`Error::Store`](crate::Error::Store) on I/O failure.
    fn mark_used(&self, value: &str, owner: &str) -> impl Future<Output = Result<()>> + Send;

    /// Looks up a single record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`](crate::Error::Store) on I/O failure.
    fn get(&self, value: &str) -> impl Future<Output = Result<Option<ShortnoRecord>>> + Send;

    /// Counts records by lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`](crate::Error::Store) on I/O failure.
    fn stats(&self) -> impl Future<Output = Result<PoolStats>> + Send;
}

impl<S: ShortnoStore> ShortnoStore for std::sync::Arc<S> {
    fn count_valid(&self) -> impl Future<Output = Result<u64>> + Send {
        (**self).count_valid()
    }

    fn insert_batch(&self, values: &[String]) -> impl Future<Output = Result<InsertReport>> + Send {
        (**self).insert_batch(values)
    }

    fn claim_one(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        (**self).claim_one()
    }

    fn mark_used(&self, value: &str, owner: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).mark_used(value, owner)
    }

    fn get(&self, value: &str) -> impl Future<Output = Result<Option<ShortnoRecord>>> + Send {
        (**self).get(value)
    }

    fn stats(&self) -> impl Future<Output = Result<PoolStats>> + Send {
        (**self).stats()
    }
}
