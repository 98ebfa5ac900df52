use crate::{
    error::{Error, Result},
    record::{InsertReport, PoolStats, ShortnoRecord},
    store::ShortnoStore,
};
use chrono::Utc;
use core::time::Duration;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// How long a connection waits on another writer's lock before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS shortno (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        value      TEXT    NOT NULL UNIQUE,
        locked     INTEGER NOT NULL DEFAULT 0,
        used       INTEGER NOT NULL DEFAULT 0,
        owner      TEXT,
        created_at TEXT    NOT NULL,
        updated_at TEXT    NOT NULL,
        CHECK (locked = 1 OR used = 0)
    );
    CREATE INDEX IF NOT EXISTS shortno_locked_idx ON shortno (locked, id);
";

// Select and lock in one statement. The `locked = 0` re-check keeps the
// update a no-op if a concurrent writer won the row first.
const CLAIM_ONE: &str = "
    UPDATE shortno SET locked = 1, updated_at = ?1
    WHERE id = (SELECT id FROM shortno WHERE locked = 0 ORDER BY id LIMIT 1)
      AND locked = 0
    RETURNING value
";

const INSERT_OR_SKIP: &str = "
    INSERT OR IGNORE INTO shortno (value, locked, used, created_at, updated_at)
    VALUES (?1, 0, 0, ?2, ?2)
";

/// SQLite-backed [`ShortnoStore`].
///
/// Each process opens its own connection to a shared database file. Claims
/// are a single conditional `UPDATE ... RETURNING`, so SQLite's write lock
/// guarantees that no two connections, in this process or another, ever lock
/// the same record.
///
/// Blocking SQLite calls run on Tokio's blocking pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the file cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::store(format!("create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::configure(&conn)?;

        tracing::debug!(path = %path.display(), "Opened SQLite short number store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory database. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if SQLite fails to initialise.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure(conn: &Connection) -> Result<()> {
        // In-memory databases report "memory" and keep their journal mode.
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await?
    }
}

impl ShortnoStore for SqliteStore {
    async fn count_valid(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM shortno WHERE locked = 0", [], |row| {
                    row.get(0)
                })?;
            Ok(count as u64)
        })
        .await
    }

    async fn insert_batch(&self, values: &[String]) -> Result<InsertReport> {
        let values = values.to_vec();
        self.with_conn(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;
            let mut report = InsertReport::default();
            {
                let mut stmt = tx.prepare(INSERT_OR_SKIP)?;
                for value in &values {
                    if stmt.execute(params![value, now])? == 0 {
                        report.skipped += 1;
                    } else {
                        report.inserted += 1;
                    }
                }
            }
            tx.commit()?;
            Ok(report)
        })
        .await
    }

    async fn claim_one(&self) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(CLAIM_ONE, params![Utc::now()], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn mark_used(&self, value: &str, owner: &str) -> Result<()> {
        let value = value.to_string();
        let owner = owner.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let state: Option<(bool, bool, Option<String>)> = tx
                .query_row(
                    "SELECT locked, used, owner FROM shortno WHERE value = ?1",
                    params![value],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            match state {
                None => return Err(Error::NotFound { value }),
                Some((false, _, _)) => return Err(Error::NotClaimed { value }),
                Some((true, true, existing)) => {
                    let existing = existing.unwrap_or_default();
                    if existing == owner {
                        return Ok(());
                    }
                    return Err(Error::Conflict {
                        value,
                        existing,
                        requested: owner,
                    });
                }
                Some((true, false, _)) => {
                    tx.execute(
                        "UPDATE shortno SET used = 1, owner = ?2, updated_at = ?3
                         WHERE value = ?1 AND used = 0",
                        params![value, owner, Utc::now()],
                    )?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, value: &str) -> Result<Option<ShortnoRecord>> {
        let value = value.to_string();
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    "SELECT value, locked, used, owner, created_at, updated_at
                     FROM shortno WHERE value = ?1",
                    params![value],
                    |row| {
                        Ok(ShortnoRecord {
                            value: row.get(0)?,
                            locked: row.get(1)?,
                            used: row.get(2)?,
                            owner: row.get(3)?,
                            created_at: row.get(4)?,
                            updated_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn stats(&self) -> Result<PoolStats> {
        self.with_conn(|conn| {
            let (total, unlocked, claimed, used): (i64, i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(locked = 0), 0),
                        COALESCE(SUM(locked = 1 AND used = 0), 0),
                        COALESCE(SUM(used = 1), 0)
                 FROM shortno",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            Ok(PoolStats {
                total: total as u64,
                unlocked: unlocked as u64,
                claimed: claimed as u64,
                used: used as u64,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn values(list: &[&str]) -> Vec<String> {
        list.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn insert_skips_duplicates_within_and_across_batches() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = store
            .insert_batch(&values(&["0000001", "0000002", "0000002"]))
            .await
            .unwrap();
        assert_eq!(
            first,
            InsertReport {
                inserted: 2,
                skipped: 1
            }
        );

        let second = store
            .insert_batch(&values(&["0000002", "0000003"]))
            .await
            .unwrap();
        assert_eq!(
            second,
            InsertReport {
                inserted: 1,
                skipped: 1
            }
        );
        assert_eq!(store.count_valid().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn claims_oldest_first_and_reports_none_when_drained() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&values(&["0000009", "0000004"]))
            .await
            .unwrap();

        assert_eq!(store.claim_one().await.unwrap().as_deref(), Some("0000009"));
        assert_eq!(store.claim_one().await.unwrap().as_deref(), Some("0000004"));
        assert_eq!(store.claim_one().await.unwrap(), None);

        let record = store.get("0000004").await.unwrap().unwrap();
        assert!(record.locked);
        assert!(!record.used);
        assert_eq!(record.owner, None);
    }

    #[tokio::test]
    async fn mark_used_enforces_owner_and_claim() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_batch(&values(&["0000001", "0000002"]))
            .await
            .unwrap();
        let value = store.claim_one().await.unwrap().unwrap();

        store.mark_used(&value, "biz-a").await.unwrap();
        store.mark_used(&value, "biz-a").await.unwrap();
        assert!(matches!(
            store.mark_used(&value, "biz-b").await,
            Err(Error::Conflict { ref existing, .. }) if existing == "biz-a"
        ));
        assert!(matches!(
            store.mark_used("0000002", "biz-a").await,
            Err(Error::NotClaimed { .. })
        ));
        assert!(matches!(
            store.mark_used("7777777", "biz-a").await,
            Err(Error::NotFound { .. })
        ));

        let record = store.get(&value).await.unwrap().unwrap();
        assert!(record.used);
        assert_eq!(record.owner.as_deref(), Some("biz-a"));
        assert_eq!(
            store.stats().await.unwrap(),
            PoolStats {
                total: 2,
                unlocked: 1,
                claimed: 0,
                used: 1,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_connections_never_claim_the_same_row() {
        const RECORDS: usize = 200;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let a = Arc::new(SqliteStore::open(&path).unwrap());
        let b = Arc::new(SqliteStore::open(&path).unwrap());

        let seed: Vec<String> = (0..RECORDS).map(|n| format!("{n:07}")).collect();
        a.insert_batch(&seed).await.unwrap();

        let mut tasks = Vec::new();
        for store in [Arc::clone(&a), Arc::clone(&b)] {
            tasks.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(value) = store.claim_one().await.unwrap() {
                    claimed.push(value);
                }
                claimed
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            for value in task.await.unwrap() {
                assert!(seen.insert(value), "value claimed twice");
            }
        }
        assert_eq!(seen.len(), RECORDS);
        assert_eq!(b.count_valid().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reopening_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pool.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_batch(&values(&["0000001"])).await.unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_valid().await.unwrap(), 1);
    }
}
