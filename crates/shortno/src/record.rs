use chrono::{DateTime, Utc};

/// A single short number and its allocation state.
///
/// A record moves through its lifecycle in one direction only:
///
/// - created by the replenishment loop with `locked = false, used = false`
/// - claimed exactly once by an allocation (`locked = true`)
/// - consumed exactly once by a usage recording (`used = true`, `owner` set)
///
/// Records are never deleted or recycled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShortnoRecord {
    /// Exactly `digits` decimal characters, zero padded.
    pub value: String,
    pub locked: bool,
    pub used: bool,
    /// Business tag supplied when the short number was put to use.
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortnoRecord {
    /// A freshly generated, unclaimed record.
    pub fn unlocked(value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            locked: false,
            used: false,
            owner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the allocator may still hand this record out.
    pub const fn is_valid(&self) -> bool {
        !self.locked
    }
}

/// Outcome of [`ShortnoStore::insert_batch`](crate::ShortnoStore::insert_batch).
///
/// Duplicates are skipped rather than failing the batch, so
/// `inserted + skipped` always equals the number of offered values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsertReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Point-in-time counts across the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    pub total: u64,
    /// Records with `locked = false`.
    pub unlocked: u64,
    /// Records allocated but not yet marked used.
    pub claimed: u64,
    pub used: u64,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_rfc3339_timestamps() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = ShortnoRecord::unlocked("0012345", now);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["value"], "0012345");
        assert_eq!(json["locked"], false);
        assert_eq!(json["owner"], serde_json::Value::Null);
        assert_eq!(json["created_at"], "2024-05-01T08:00:00Z");

        let back: ShortnoRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
