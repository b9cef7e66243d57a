use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use weex_core::{CachedPacket, DayStats, Timestamp};

/// Station-level values pushed into the engine outside the loop stream.
///
/// Each present field overwrites the engine's copy; absent fields leave it
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_time_min_barometer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_time_max_barometer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_contact_lost: Option<bool>,
}

impl StatsUpdate {
    pub fn merge(&mut self, update: StatsUpdate) {
        if update.all_time_min_barometer.is_some() {
            self.all_time_min_barometer = update.all_time_min_barometer;
        }
        if update.all_time_max_barometer.is_some() {
            self.all_time_max_barometer = update.all_time_max_barometer;
        }
        if update.sensor_contact_lost.is_some() {
            self.sensor_contact_lost = update.sensor_contact_lost;
        }
    }
}

/// Side-channel data the engine attaches to every snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Forecast(String),
}

/// Day high/low with the day average
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extremes {
    #[serde(flatten)]
    pub stats: DayStats,
    pub average: f64,
}

impl From<DayStats> for Extremes {
    fn from(stats: DayStats) -> Self {
        let average = stats.average();
        Self { stats, average }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindSummary {
    pub latest: Option<f64>,
    /// Last reported direction; holds its value while the wind is calm
    pub bearing: f64,
    pub gust: f64,
    pub gust_time: Option<Timestamp>,
    pub average: f64,
    pub average_bearing: f64,
    pub high_today: Option<f64>,
    pub high_today_time: Option<Timestamp>,
    pub bearing_at_high: Option<f64>,
    pub dominant_direction: Option<f64>,
    pub dominant_compass: Option<&'static str>,
    pub windrun: f64,
    pub day_average: f64,
}

/// Everything the engine knows at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(rename = "dateTime")]
    pub date_time: Timestamp,
    #[serde(rename = "usUnits")]
    pub us_units: Option<i32>,
    pub current: CachedPacket,
    pub extremes: BTreeMap<String, Extremes>,
    pub wind: WindSummary,
    pub windrose: Vec<f64>,
    pub trends: BTreeMap<String, Option<f64>>,
    pub stats: StatsUpdate,
    pub forecast: Option<String>,
}

/// Receives snapshots from the engine
#[async_trait::async_trait]
pub trait SnapshotSink: Send {
    async fn emit(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Forwards snapshots over a channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl SnapshotSink for ChannelSink {
    async fn emit(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.tx
            .send(snapshot.clone())
            .map_err(|_| anyhow::anyhow!("snapshot receiver dropped"))
    }
}
