//! Core data types and running statistics for real-time weather data
//!
//! This crate holds the single-threaded building blocks of the real-time
//! engine: the partial-packet cache, per-period accumulators, trailing wind
//! windows and the archive store contract they are merged against.

pub mod cache;
pub mod compass;
pub mod observations;
pub mod pipeline;
pub mod rollups;
pub mod types;
pub mod window;

pub use cache::*;
pub use compass::*;
pub use observations::*;
pub use pipeline::*;
pub use rollups::*;
pub use types::*;
pub use window::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unit system mismatch: cache uses {expected}, packet uses {found}")]
    UnitMismatch { expected: i32, found: i32 },
}
