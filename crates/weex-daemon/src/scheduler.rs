//! Drives the simulated station: loop packets to the engine, archive
//! records to the store

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use weex_archive::IntervalAggregator;
use weex_core::{ArchiveRecord, WeatherPacket};
use weex_realtime::{EngineEvent, EventSender, MemoryArchiveStore, StatsUpdate};

use crate::simulator::Simulator;

pub struct Scheduler {
    simulator: Simulator,
    aggregator: IntervalAggregator,
    store: Arc<MemoryArchiveStore>,
    events: EventSender,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(
        simulator: Simulator,
        aggregator: IntervalAggregator,
        store: Arc<MemoryArchiveStore>,
        events: EventSender,
        poll_interval: Duration,
    ) -> Self {
        Self {
            simulator,
            aggregator,
            store,
            events,
            poll_interval,
        }
    }

    /// Generate packets until the task is cancelled
    pub async fn run(&mut self) -> Result<()> {
        info!("Scheduler started");
        info!("Archive interval: {}s", self.aggregator.interval());
        info!("Unit system: {}", self.aggregator.unit_system());

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            let packet = self.simulator.next_packet(chrono::Utc::now().timestamp());
            if let Err(e) = self.process_packet(packet).await {
                error!("Error processing packet: {:#}", e);
            }
        }
    }

    async fn process_packet(&mut self, packet: WeatherPacket) -> Result<()> {
        debug!(
            "Loop packet: timestamp={}, observations={}",
            packet.date_time,
            packet.observations.len()
        );

        // archive first so the boundary precedes the packet that opened the
        // next interval
        let finished = self
            .aggregator
            .add_packet(&packet)
            .context("Failed to add packet to aggregator")?;
        if let Some(record) = finished {
            self.archive(record).await;
        }

        self.events.push(EngineEvent::Sample(packet));
        Ok(())
    }

    async fn archive(&mut self, record: ArchiveRecord) {
        let timestamp = record.date_time;
        self.store.insert(record).await;
        info!("Archive record stored for timestamp {}", timestamp);

        // windrose queries are half-open, so the boundary sits just past the
        // record it announces
        self.events.push(EngineEvent::PeriodBoundary {
            timestamp: timestamp + 1,
        });

        let (min, max) = self.store.all_time_extremes("barometer").await;
        self.events.push(EngineEvent::Stats(StatsUpdate {
            all_time_min_barometer: min,
            all_time_max_barometer: max,
            sensor_contact_lost: Some(false),
        }));
    }

    /// Archive whatever the open interval holds
    pub async fn stop(&mut self) {
        info!("Stopping scheduler...");
        if let Some(record) = self.aggregator.flush() {
            self.store.insert(record).await;
        }
        if self.events.dropped() > 0 {
            info!("Engine backlog dropped {} packets", self.events.dropped());
        }
        info!("Scheduler stopped");
    }
}
