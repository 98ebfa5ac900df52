use ::rand::{Rng, rng};

/// A trait for random sources that return uniformly distributed integers.
///
/// This abstraction allows you to plug in a real random source or a mocked
/// random source in tests.
///
/// # Example
/// ```
/// use shortno::RandSource;
///
/// struct FixedRand;
/// impl RandSource for FixedRand {
///     fn below(&self, bound: u64) -> u64 {
///         42 % bound
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.below(10), 2);
/// ```
pub trait RandSource {
    /// Returns an integer drawn uniformly from `0..bound`.
    ///
    /// `bound` is always greater than zero.
    fn below(&self, bound: u64) -> u64;
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// This type does **not** store the RNG itself; it accesses the thread-local
/// generator on each call, so it is `Send + Sync` and may be shared freely
/// with the replenishment task.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn below(&self, bound: u64) -> u64 {
        rng().random_range(0..bound)
    }
}
