//! Real-time aggregation engine
//!
//! Consumes loop packets and archive-period boundaries from a bounded
//! queue, keeps today's highs/lows, short-term wind statistics, the windrose
//! and trends up to date, and hands a complete snapshot to an output sink.

pub mod engine;
pub mod queue;
pub mod snapshot;
pub mod store;
pub mod trend;
pub mod windrose;

pub use engine::*;
pub use queue::*;
pub use snapshot::*;
pub use store::*;
pub use trend::*;
pub use windrose::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Core error: {0}")]
    Core(#[from] weex_core::CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] weewx_config::ConfigError),

    #[error("Snapshot sink error: {0}")]
    Sink(#[source] anyhow::Error),

    #[error("Event queue closed without a shutdown event")]
    QueueClosed,

    #[error("Engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
