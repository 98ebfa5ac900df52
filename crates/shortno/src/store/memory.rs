use crate::{
    error::{Error, Result},
    record::{InsertReport, PoolStats, ShortnoRecord},
    store::ShortnoStore,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// A process-local [`ShortnoStore`].
///
/// Every operation runs inside one critical section, which makes each of them
/// atomic with respect to the others. The store is lost when the process
/// exits, so it suits tests and single-process deployments that can tolerate
/// re-generating their pool on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, ShortnoRecord>,
    // Unlocked values in insertion order. Records never return to the
    // unlocked state, so entries are only ever popped from the front.
    unlocked: VecDeque<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `values` as unlocked records.
    pub fn with_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            let now = Utc::now();
            for value in values {
                inner.insert(value.into(), now);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn insert(&mut self, value: String, now: chrono::DateTime<Utc>) -> bool {
        if self.records.contains_key(&value) {
            return false;
        }
        self.unlocked.push_back(value.clone());
        self.records
            .insert(value.clone(), ShortnoRecord::unlocked(value, now));
        true
    }
}

impl ShortnoStore for MemoryStore {
    async fn count_valid(&self) -> Result<u64> {
        Ok(self.inner.lock().unlocked.len() as u64)
    }

    async fn insert_batch(&self, values: &[String]) -> Result<InsertReport> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let mut report = InsertReport::default();

        for value in values {
            if inner.insert(value.clone(), now) {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        Ok(report)
    }

    async fn claim_one(&self) -> Result<Option<String>> {
        let mut inner = self.inner.lock();
        let Some(value) = inner.unlocked.pop_front() else {
            return Ok(None);
        };

        let record = inner
            .records
            .get_mut(&value)
            .ok_or_else(|| Error::store(format!("unlocked queue references missing {value}")))?;
        record.locked = true;
        record.updated_at = Utc::now();

        Ok(Some(value))
    }

    async fn mark_used(&self, value: &str, owner: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(value).ok_or_else(|| Error::NotFound {
            value: value.to_string(),
        })?;

        if !record.locked {
            return Err(Error::NotClaimed {
                value: value.to_string(),
            });
        }

        if record.used {
            let existing = record.owner.as_deref().unwrap_or_default();
            if existing == owner {
                return Ok(());
            }
            return Err(Error::Conflict {
                value: value.to_string(),
                existing: existing.to_string(),
                requested: owner.to_string(),
            });
        }

        record.used = true;
        record.owner = Some(owner.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, value: &str) -> Result<Option<ShortnoRecord>> {
        Ok(self.inner.lock().records.get(value).cloned())
    }

    async fn stats(&self) -> Result<PoolStats> {
        let inner = self.inner.lock();
        let mut stats = PoolStats {
            total: inner.records.len() as u64,
            unlocked: inner.unlocked.len() as u64,
            ..PoolStats::default()
        };
        for record in inner.records.values() {
            match (record.locked, record.used) {
                (true, true) => stats.used += 1,
                (true, false) => stats.claimed += 1,
                (false, _) => {}
            }
        }
        Ok(stats)
    }
}
