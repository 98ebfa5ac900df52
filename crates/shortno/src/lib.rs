#![doc = include_str!("../README.md")]

mod allocator;
mod config;
mod error;
mod generator;
mod pool;
mod rand;
mod record;
mod replenish;
mod store;
mod usage;

pub use crate::allocator::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::pool::*;
pub use crate::rand::*;
pub use crate::record::*;
pub use crate::replenish::*;
pub use crate::store::*;
pub use crate::usage::*;
