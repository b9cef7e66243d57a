//! WeeWX real-time daemon
//!
//! This binary wires together:
//! - a simulated station emitting partial loop packets
//! - archive interval synthesis into an in-memory archive
//! - the real-time engine, logging every snapshot

mod config;
mod scheduler;
mod simulator;
mod sink;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use weex_archive::IntervalAggregator;
use weex_realtime::{event_queue, Engine, MemoryArchiveStore};

use crate::config::DaemonConfig;
use crate::scheduler::Scheduler;
use crate::simulator::Simulator;
use crate::sink::LogSink;

#[tokio::main]
async fn main() -> Result<()> {
    weewx_obs::init("weexd");

    let config = DaemonConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let store = Arc::new(MemoryArchiveStore::new());
    let (events, receiver) = event_queue(config.realtime.backlog);
    let grace = Duration::from_secs(config.realtime.shutdown_grace_secs);

    let engine = Engine::new(config.realtime.clone(), store.clone(), Box::new(LogSink::new()))
        .context("Invalid real-time configuration")?;
    let handle = engine.spawn(receiver);
    info!("Real-time engine started for station {}", config.station_id);

    let aggregator = IntervalAggregator::new(config.archive_interval, config.unit_system)
        .context("Failed to create interval aggregator")?;
    let mut scheduler = Scheduler::new(
        Simulator::new(config.unit_system),
        aggregator,
        store,
        events.clone(),
        Duration::from_secs(config.poll_interval.max(1)),
    );

    info!("Daemon running - press Ctrl+C to stop");

    tokio::select! {
        result = scheduler.run() => {
            if let Err(e) = result {
                error!("Scheduler error: {:#}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    scheduler.stop().await;
    handle
        .shutdown(&events, grace)
        .await
        .context("Real-time engine failed")?;

    info!("WeeWX Daemon stopped");
    Ok(())
}
