//! Pool tuning knobs and their defaults.
//!
//! ## Key Concepts
//! - **Digits**: every short number is exactly `digits` decimal characters,
//!   zero padded.
//! - **Low-water mark**: replenishment only inserts when the unlocked count
//!   drops below this threshold.
//! - **Cadence**: the loop sleeps `refill_interval` after every pass, or the
//!   shorter `error_backoff` when the unlocked count could not be read.

use crate::error::{Error, Result};
use core::time::Duration;

/// Default number of decimal digits per short number.
pub const DEFAULT_DIGITS: u8 = 7;

/// Largest supported digit count. `10^18` still fits in a `u64`.
pub const MAX_DIGITS: u8 = 18;

/// Unlocked record count below which a refill batch is generated.
pub const DEFAULT_LOW_WATER_MARK: u64 = 10_000;

/// Number of candidates generated per refill pass.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Sleep between replenishment passes.
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(30);

/// Sleep after a failed unlocked count query.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Time `shutdown` waits for the replenishment task to stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Runtime configuration of a [`ShortnoPool`](crate::ShortnoPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub digits: u8,
    pub low_water_mark: u64,
    pub batch_size: usize,
    pub refill_interval: Duration,
    pub error_backoff: Duration,
    /// Upper bound on a single allocation or usage round trip. `None` waits
    /// for the store indefinitely.
    pub store_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            digits: DEFAULT_DIGITS,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            batch_size: DEFAULT_BATCH_SIZE,
            refill_interval: DEFAULT_REFILL_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            store_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Number of distinct values representable with the configured digits.
    pub const fn keyspace(&self) -> u64 {
        10_u64.saturating_pow(self.digits as u32)
    }

    /// Checks every setting and returns the config unchanged when usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - `digits` is 0 or above [`MAX_DIGITS`].
    /// - `batch_size` is 0 or larger than the keyspace.
    /// - `error_backoff` is zero or longer than `refill_interval`.
    /// - `store_timeout` is `Some(0)`.
    pub fn validate(self) -> Result<Self> {
        if self.digits == 0 || self.digits > MAX_DIGITS {
            return Err(invalid(format!(
                "digits must be between 1 and {MAX_DIGITS}, got {}",
                self.digits
            )));
        }

        if self.batch_size == 0 {
            return Err(invalid("batch_size must be greater than 0"));
        }

        if self.batch_size as u64 > self.keyspace() {
            return Err(invalid(format!(
                "batch_size ({}) exceeds the {}-digit keyspace ({})",
                self.batch_size,
                self.digits,
                self.keyspace()
            )));
        }

        if self.refill_interval.is_zero() {
            return Err(invalid("refill_interval must be greater than 0"));
        }

        if self.error_backoff.is_zero() || self.error_backoff > self.refill_interval {
            return Err(invalid(format!(
                "error_backoff ({:?}) must be non-zero and no longer than refill_interval ({:?})",
                self.error_backoff, self.refill_interval
            )));
        }

        if self.store_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("store_timeout must be greater than 0 when set"));
        }

        if self.keyspace() < self.low_water_mark {
            tracing::warn!(
                keyspace = self.keyspace(),
                low_water_mark = self.low_water_mark,
                "Keyspace is smaller than the low-water mark; the pool will refill on every pass"
            );
        }

        Ok(self)
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        reason: reason.into(),
    }
}
