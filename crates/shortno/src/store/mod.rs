//! Persistence boundary for short number records.
//!
//! ## Structure
//!
//! - [`interface`] - the [`ShortnoStore`] contract the pool is written
//!   against.
//! - [`memory`] - [`MemoryStore`], a process-local implementation.
//! - [`sqlite`] - [`SqliteStore`], a durable implementation that is safe to
//!   share between processes (feature `sqlite`).

mod interface;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use interface::*;
pub use memory::*;
#[cfg(feature = "sqlite")]
pub use sqlite::*;
