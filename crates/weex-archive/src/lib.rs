//! Archive interval synthesis
//!
//! Folds loop packets into one archive record per interval, the way a
//! station's archive would if it had one.

pub mod aggregate;
pub mod aggregator;

pub use aggregate::*;
pub use aggregator::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(i32),

    #[error("Packet at {found} arrived after {last}")]
    OutOfOrder { last: i64, found: i64 },
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
