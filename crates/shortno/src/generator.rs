use crate::{
    config::MAX_DIGITS,
    error::{Error, Result},
    rand::{RandSource, ThreadRandom},
};
use std::collections::HashSet;

/// Produces candidate short numbers of a fixed decimal width.
///
/// Every candidate is drawn uniformly from `0..10^digits` and zero padded, so
/// each digit position is independently uniform. Candidates within one batch
/// are distinct; collisions with values already in the store are left to the
/// store, which skips them on insert.
#[derive(Debug, Clone)]
pub struct DigitGenerator<R = ThreadRandom> {
    digits: u8,
    keyspace: u64,
    rng: R,
}

impl DigitGenerator<ThreadRandom> {
    /// Creates a generator backed by the thread-local RNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `digits` is outside
    /// `1..=MAX_DIGITS`.
    pub fn new(digits: u8) -> Result<Self> {
        Self::with_rng(digits, ThreadRandom)
    }
}

impl<R: RandSource> DigitGenerator<R> {
    /// Creates a generator over a custom random source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `digits` is outside
    /// `1..=MAX_DIGITS`.
    pub fn with_rng(digits: u8, rng: R) -> Result<Self> {
        if digits == 0 || digits > MAX_DIGITS {
            return Err(Error::InvalidConfig {
                reason: format!("digits must be between 1 and {MAX_DIGITS}, got {digits}"),
            });
        }
        Ok(Self {
            digits,
            keyspace: 10_u64.pow(digits as u32),
            rng,
        })
    }

    pub const fn digits(&self) -> u8 {
        self.digits
    }

    /// Draws one candidate.
    pub fn next_value(&self) -> String {
        let n = self.rng.below(self.keyspace);
        format!("{n:0width$}", width = self.digits as usize)
    }

    /// Draws `count` pairwise-distinct candidates.
    ///
    /// `count` is capped at the keyspace size; asking for more would never
    /// terminate.
    pub fn batch(&self, count: usize) -> Vec<String> {
        let count = count.min(usize::try_from(self.keyspace).unwrap_or(usize::MAX));
        let mut seen = HashSet::with_capacity(count);
        let mut values = Vec::with_capacity(count);

        while values.len() < count {
            let value = self.next_value();
            if seen.insert(value.clone()) {
                values.push(value);
            }
        }

        values
    }
}
