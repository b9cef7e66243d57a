//! In-memory archive store
//!
//! Holds archive records in timestamp order and answers the same queries a
//! database-backed store would. Used by the demo daemon and in tests.

use crate::windrose::sector_index;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use weex_core::{
    components, ArchiveRecord, ArchiveStore, DaySummary, IntervalExtremes, ObsSummary, Timestamp,
    WindroseRow, WIND,
};

#[derive(Default)]
pub struct MemoryArchiveStore {
    records: RwLock<Vec<ArchiveRecord>>,
}

/// UTC midnight at or before `ts`
fn start_of_day(ts: Timestamp) -> Timestamp {
    Utc.timestamp_opt(ts, 0)
        .single()
        .and_then(|dt| dt.date_naive().and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight).timestamp())
        .unwrap_or(ts - ts.rem_euclid(86_400))
}

/// Fold one record's aggregate into a day summary. Lows and highs come from
/// the record's loop extremes when it carries them.
fn fold_value(
    summary: &mut ObsSummary,
    value: f64,
    ts: Timestamp,
    interval: f64,
    range: Option<&IntervalExtremes>,
) {
    let (low, low_time, high, high_time) = match range {
        Some(r) => (r.min, r.min_time, r.max, r.max_time),
        None => (value, ts, value, ts),
    };
    if summary.min.map_or(true, |min| low < min) {
        summary.min = Some(low);
        summary.mintime = Some(low_time);
    }
    if summary.max.map_or(true, |max| high > max) {
        summary.max = Some(high);
        summary.maxtime = Some(high_time);
    }
    summary.sum += value;
    summary.count += 1;
    summary.wsum += value * interval;
    summary.sumtime += interval;
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same timestamp
    pub async fn insert(&self, record: ArchiveRecord) {
        let mut records = self.records.write().await;
        match records.binary_search_by_key(&record.date_time, |r| r.date_time) {
            Ok(idx) => records[idx] = record,
            Err(idx) => records.insert(idx, record),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// All-time (min, max) of an observation across every record
    pub async fn all_time_extremes(&self, name: &str) -> (Option<f64>, Option<f64>) {
        let records = self.records.read().await;
        records
            .iter()
            .filter_map(|r| r.value(name))
            .fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), v| {
                (
                    Some(lo.map_or(v, |lo| lo.min(v))),
                    Some(hi.map_or(v, |hi| hi.max(v))),
                )
            })
    }
}

#[async_trait::async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn day_summary(&self, ts: Timestamp) -> Result<DaySummary> {
        let day_start = start_of_day(ts);
        let records = self.records.read().await;
        let mut summary = DaySummary {
            date_time: day_start,
            us_units: None,
            observations: Default::default(),
        };

        for record in records
            .iter()
            .filter(|r| r.date_time > day_start && r.date_time <= ts)
        {
            summary.us_units = Some(record.us_units);
            let interval = f64::from(record.interval);
            for (name, value) in &record.aggregates {
                if let Some(value) = value.as_f64() {
                    let obs = summary.observations.entry(name.clone()).or_default();
                    let range = record.extremes.get(name);
                    fold_value(obs, value, record.date_time, interval, range);
                }
            }

            if let Some(speed) = record.value("windSpeed") {
                let bearing = record.value("windDir");
                let wind = summary.observations.entry(WIND.to_string()).or_default();
                let previous_max = wind.max;
                let range = record.extremes.get("windSpeed");
                fold_value(wind, speed, record.date_time, interval, range);
                if wind.max != previous_max {
                    wind.max_dir = bearing;
                }
                if let Some(bearing) = bearing {
                    let (x, y) = components(speed, bearing);
                    wind.xsum += x;
                    wind.ysum += y;
                }
            }
        }
        Ok(summary)
    }

    async fn windrose_rows(
        &self,
        start: Timestamp,
        end: Timestamp,
        sector_width: f64,
    ) -> Result<Vec<WindroseRow>> {
        let records = self.records.read().await;
        let mut groups: BTreeMap<Option<i64>, Option<f64>> = BTreeMap::new();
        for record in records
            .iter()
            .filter(|r| r.date_time >= start && r.date_time < end)
        {
            let sector = record
                .value("windDir")
                .map(|dir| sector_index(dir, sector_width));
            let sum = groups.entry(sector).or_insert(None);
            if let Some(speed) = record.value("windSpeed") {
                *sum = Some(sum.unwrap_or(0.0) + speed);
            }
        }
        Ok(groups
            .into_iter()
            .map(|(sector, speed_sum)| WindroseRow { sector, speed_sum })
            .collect())
    }

    async fn nearest_record(&self, target: Timestamp, grace: i64) -> Result<Option<ArchiveRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| (r.date_time - target).abs() <= grace)
            .min_by_key(|r| (r.date_time - target).abs())
            .cloned())
    }

    async fn latest_record(&self) -> Result<Option<ArchiveRecord>> {
        Ok(self.records.read().await.last().cloned())
    }
}
