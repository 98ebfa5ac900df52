//! Background refill of the short number pool.
//!
//! The [`Replenisher`] keeps the number of unlocked records above a
//! low-water mark. It follows a threshold-refill policy rather than a fixed
//! schedule: each pass reads the unlocked count, generates one batch only
//! when the count is below the mark, then sleeps. Refill volume therefore
//! tracks consumption, and the sleep interval bounds how long the pool can
//! sit below the mark.
//!
//! Store failures never stop the loop. A failed count backs off for the
//! shorter error interval and tries again; a failed insert is logged and the
//! loop carries on with its normal cadence.

use crate::{
    config::PoolConfig,
    error::Result,
    generator::DigitGenerator,
    rand::{RandSource, ThreadRandom},
    record::InsertReport,
    store::ShortnoStore,
};
use core::time::Duration;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of a single replenishment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The pool was below the low-water mark and a batch was offered.
    Refilled {
        /// Unlocked count observed before the insert.
        valid: u64,
        report: InsertReport,
    },
    /// The pool was at or above the low-water mark; nothing was generated.
    Sufficient { valid: u64 },
    /// The unlocked count could not be read; nothing was generated.
    CountFailed,
    /// The unlocked count was low but the batch insert failed.
    InsertFailed { valid: u64 },
}

impl Tick {
    /// How long the loop sleeps after this outcome.
    pub const fn delay(&self, config: &PoolConfig) -> Duration {
        match self {
            Self::CountFailed => config.error_backoff,
            Self::Refilled { .. } | Self::Sufficient { .. } | Self::InsertFailed { .. } => {
                config.refill_interval
            }
        }
    }
}

/// Drives the refill loop against a shared store.
pub struct Replenisher<S, R = ThreadRandom> {
    store: Arc<S>,
    generator: DigitGenerator<R>,
    config: PoolConfig,
}

impl<S: ShortnoStore> Replenisher<S, ThreadRandom> {
    /// Creates a replenisher generating `config.digits`-wide values with the
    /// thread-local RNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// configuration does not validate.
    pub fn new(store: Arc<S>, config: PoolConfig) -> Result<Self> {
        let config = config.validate()?;
        let generator = DigitGenerator::new(config.digits)?;
        Ok(Self {
            store,
            generator,
            config,
        })
    }
}

impl<S, R> Replenisher<S, R>
where
    S: ShortnoStore,
    R: RandSource + Send + Sync + 'static,
{
    /// Creates a replenisher around an existing generator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// configuration does not validate or the generator's width differs from
    /// `config.digits`.
    pub fn with_generator(
        store: Arc<S>,
        generator: DigitGenerator<R>,
        config: PoolConfig,
    ) -> Result<Self> {
        let config = config.validate()?;
        if generator.digits() != config.digits {
            return Err(crate::Error::InvalidConfig {
                reason: format!(
                    "generator width ({}) does not match configured digits ({})",
                    generator.digits(),
                    config.digits
                ),
            });
        }
        Ok(Self {
            store,
            generator,
            config,
        })
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Runs one pass of the loop body without sleeping.
    #[tracing::instrument(skip_all, level = "debug")]
    pub async fn tick(&self) -> Tick {
        let valid = match self.store.count_valid().await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    backoff = ?self.config.error_backoff,
                    "Failed to count unlocked short numbers"
                );
                return Tick::CountFailed;
            }
        };

        if valid >= self.config.low_water_mark {
            tracing::debug!(valid, "Short number pool above low-water mark");
            return Tick::Sufficient { valid };
        }

        let batch = self.generator.batch(self.config.batch_size);
        match self.store.insert_batch(&batch).await {
            Ok(report) => {
                tracing::info!(
                    valid,
                    inserted = report.inserted,
                    skipped = report.skipped,
                    "Replenished short number pool"
                );
                Tick::Refilled { valid, report }
            }
            Err(e) => {
                tracing::error!(error = %e, valid, "Failed to insert short numbers");
                Tick::InsertFailed { valid }
            }
        }
    }

    /// Runs the loop until `token` is cancelled.
    ///
    /// Cancellation interrupts both the sleep between passes and an in-flight
    /// store call.
    pub async fn run(self, token: CancellationToken) {
        tracing::info!(
            low_water_mark = self.config.low_water_mark,
            batch_size = self.config.batch_size,
            digits = self.config.digits,
            "Replenishment loop started"
        );

        loop {
            let tick = tokio::select! {
                () = token.cancelled() => break,
                tick = self.tick() => tick,
            };

            let delay = tick.delay(&self.config);
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Replenishment loop stopped");
    }
}
