//! Real-time aggregation engine
//!
//! A single tokio task owns every piece of engine state: the sample cache,
//! the per-period accumulators and wind windows, the day baseline and the
//! windrose. Producers talk to it only through the event queue.

use crate::queue::{EngineEvent, EventReceiver, EventSender};
use crate::snapshot::{Enrichment, Extremes, Snapshot, SnapshotSink, StatsUpdate, WindSummary};
use crate::trend::TrendCalculator;
use crate::windrose::WindroseAggregator;
use crate::{RealtimeError, RealtimeResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use weewx_config::RealtimeConfig;
use weex_core::{
    degree_to_compass, merged_max_dir, merged_vector_direction, merge_with_baseline,
    AccumulatorSet, ArchiveStore, DaySummary, SampleCache, Timestamp, WeatherPacket, WIND,
};

/// Lifecycle of the engine task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

pub struct Engine {
    config: RealtimeConfig,
    store: Arc<dyn ArchiveStore>,
    sink: Box<dyn SnapshotSink>,
    enrichment: Option<mpsc::Receiver<Enrichment>>,

    cache: SampleCache,
    accumulators: AccumulatorSet,
    baseline: DaySummary,
    windrose: Vec<f64>,
    windrose_agg: WindroseAggregator,
    trend: TrendCalculator,
    stats: StatsUpdate,
    forecast: Option<String>,

    last_bearing: f64,
    last_average_bearing: f64,
    last_emit: Option<Instant>,
    state: watch::Sender<EngineState>,
}

impl Engine {
    pub fn new(
        config: RealtimeConfig,
        store: Arc<dyn ArchiveStore>,
        sink: Box<dyn SnapshotSink>,
    ) -> RealtimeResult<Self> {
        config.validate()?;
        let cache = match &config.required_fields {
            Some(fields) => SampleCache::new(fields.iter().map(String::as_str)),
            None => SampleCache::default(),
        };
        let (state, _) = watch::channel(EngineState::Idle);
        Ok(Self {
            accumulators: AccumulatorSet::new(config.window_secs),
            windrose: vec![0.0; config.windrose_points],
            windrose_agg: WindroseAggregator::new(config.windrose_period, config.windrose_points),
            trend: TrendCalculator::new(config.trend.lookback, config.trend.grace),
            config,
            store,
            sink,
            enrichment: None,
            cache,
            baseline: DaySummary::default(),
            stats: StatsUpdate::default(),
            forecast: None,
            last_bearing: 0.0,
            last_average_bearing: 0.0,
            last_emit: None,
            state,
        })
    }

    /// Attach a side channel whose forecast text is copied into snapshots
    pub fn with_enrichment(mut self, enrichment: mpsc::Receiver<Enrichment>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Start the engine on its own task
    pub fn spawn(self, events: EventReceiver) -> EngineHandle {
        let state = self.subscribe();
        let task = tokio::spawn(self.run(events));
        EngineHandle { state, task }
    }

    #[instrument(skip_all, name = "realtime_engine")]
    async fn run(mut self, mut events: EventReceiver) -> RealtimeResult<()> {
        self.set_state(EngineState::Running);
        self.startup(chrono::Utc::now().timestamp()).await;

        let poll = Duration::from_millis(self.config.poll_timeout_ms);
        loop {
            self.poll_enrichment();

            let event = match events.recv_timeout(poll).await {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "event queue failed, engine stopping");
                    self.set_state(EngineState::Stopped);
                    return Err(e);
                }
            };

            match event {
                EngineEvent::Sample(packet) => self.process_packet(packet).await,
                EngineEvent::PeriodBoundary { timestamp } => self.end_archive_period(timestamp).await,
                EngineEvent::Stats(update) => {
                    debug!(?update, "stats update");
                    self.stats.merge(update);
                }
                EngineEvent::Shutdown => {
                    info!("shutdown requested");
                    self.set_state(EngineState::ShuttingDown);
                    break;
                }
            }
        }

        self.set_state(EngineState::Stopped);
        info!("engine stopped");
        Ok(())
    }

    fn set_state(&self, state: EngineState) {
        debug!(?state, "engine state");
        self.state.send_replace(state);
    }

    /// Load the day baseline and windrose, and seed the cache from the archive
    async fn startup(&mut self, now: Timestamp) {
        match self.store.day_summary(now).await {
            Ok(summary) => self.baseline = summary,
            Err(e) => warn!(error = %e, "could not load day baseline, starting empty"),
        }
        self.windrose = self.windrose_agg.compute(self.store.as_ref(), now).await;

        match self.store.latest_record().await {
            Ok(Some(record)) => {
                debug!(date_time = record.date_time, "priming cache from archive");
                self.cache.prime(&record);
            }
            Ok(None) => debug!("archive empty, cache not primed"),
            Err(e) => warn!(error = %e, "could not read latest archive record"),
        }
        info!(
            window_secs = self.config.window_secs,
            windrose_points = self.config.windrose_points,
            "engine running"
        );
    }

    fn poll_enrichment(&mut self) {
        let Some(rx) = self.enrichment.as_mut() else {
            return;
        };
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(Enrichment::Forecast(text)) => {
                    debug!("forecast updated");
                    self.forecast = Some(text);
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            debug!("enrichment channel closed");
            self.enrichment = None;
        }
    }

    #[instrument(skip_all, fields(date_time = packet.date_time))]
    async fn process_packet(&mut self, packet: WeatherPacket) {
        if let Err(e) = self.cache.update(&packet) {
            warn!(error = %e, "skipping sample");
            return;
        }
        self.accumulators.add_packet(&packet);
        if let Some(bearing) = packet.value("windDir") {
            self.last_bearing = bearing;
        }

        if !self.throttle_elapsed() {
            debug!("snapshot throttled");
            return;
        }
        let snapshot = self.build_snapshot(packet.date_time).await;
        if let Err(e) = self.sink.emit(&snapshot).await {
            warn!(error = %RealtimeError::Sink(e), "snapshot not delivered");
        }
        self.last_emit = Some(Instant::now());
    }

    fn throttle_elapsed(&self) -> bool {
        let min_interval = Duration::from_secs(self.config.min_interval);
        match self.last_emit {
            _ if min_interval.is_zero() => true,
            None => true,
            Some(last) => last.elapsed() >= min_interval,
        }
    }

    /// New baseline and windrose for the period just archived; the loop
    /// accumulators start over, windows and cache carry on.
    #[instrument(skip(self))]
    async fn end_archive_period(&mut self, timestamp: Timestamp) {
        match self.store.day_summary(timestamp).await {
            Ok(summary) => {
                self.baseline = summary;
                self.accumulators.reset();
            }
            Err(e) => {
                // the accumulators still cover everything since the old baseline
                warn!(error = %e, "baseline refresh failed, keeping accumulators");
            }
        }
        self.windrose = self.windrose_agg.compute(self.store.as_ref(), timestamp).await;
        info!("archive period closed");
    }

    async fn build_snapshot(&mut self, now: Timestamp) -> Snapshot {
        self.accumulators.expire_windows(now);
        let max_age = self.config.max_cache_age;
        let current = self.cache.get_packet(now, max_age);

        let extremes: BTreeMap<String, Extremes> = self
            .accumulators
            .day_stats(&self.baseline)
            .map(|(name, stats)| (name.to_string(), stats.into()))
            .collect();

        let wind = self.wind_summary(current.value("windSpeed"));

        let mut trends = BTreeMap::new();
        for name in &self.config.trend.observations {
            let value = self.cache.get_value(name, now, max_age);
            let delta = self
                .trend
                .delta(self.store.as_ref(), name, value, now)
                .await;
            trends.insert(name.clone(), delta);
        }

        Snapshot {
            date_time: now,
            us_units: self.cache.unit_system(),
            current,
            extremes,
            wind,
            windrose: self.windrose.clone(),
            trends,
            stats: self.stats.clone(),
            forecast: self.forecast.clone(),
        }
    }

    fn wind_summary(&mut self, latest: Option<f64>) -> WindSummary {
        // stations without a gust sensor only report windSpeed
        let (gust, gust_time) = self
            .accumulators
            .window("windGust")
            .and_then(|w| w.max_entry())
            .or_else(|| {
                self.accumulators
                    .window("windSpeed")
                    .and_then(|w| w.max_entry())
            })
            .map_or((0.0, None), |e| (e.value, Some(e.timestamp)));
        let average = self
            .accumulators
            .window("windSpeed")
            .map_or(0.0, |w| w.average());
        if let Some(bearing) = self
            .accumulators
            .window(WIND)
            .and_then(|w| w.vector_average_direction())
        {
            self.last_average_bearing = bearing;
        }

        let baseline = self.baseline.get(WIND);
        let mut summary = WindSummary {
            latest,
            bearing: self.last_bearing,
            gust,
            gust_time,
            average,
            average_bearing: self.last_average_bearing,
            windrun: baseline.map_or(0.0, |b| b.wsum / 3600.0) + self.accumulators.windrun(),
            ..Default::default()
        };

        if let Some(acc) = self.accumulators.get(WIND).and_then(|a| a.as_vector()) {
            let day = merge_with_baseline(baseline, acc.scalar());
            summary.high_today = day.high;
            summary.high_today_time = day.high_time;
            summary.day_average = day.average();
            summary.bearing_at_high = merged_max_dir(baseline, acc);
            summary.dominant_direction = merged_vector_direction(baseline, acc);
            summary.dominant_compass = summary.dominant_direction.map(degree_to_compass);
        }
        summary
    }
}

/// Handle to a running engine task
pub struct EngineHandle {
    state: watch::Receiver<EngineState>,
    task: JoinHandle<RealtimeResult<()>>,
}

impl EngineHandle {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    /// Wait for the task to finish on its own
    pub async fn join(self) -> RealtimeResult<()> {
        self.task.await?
    }

    /// Ask the engine to stop and wait up to `grace` for it, then abort
    pub async fn shutdown(self, sender: &EventSender, grace: Duration) -> RealtimeResult<()> {
        sender.shutdown();
        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => joined?,
            Err(_) => {
                error!(grace_secs = grace.as_secs(), "engine did not stop in time, aborting");
                task.abort();
                Ok(())
            }
        }
    }
}
