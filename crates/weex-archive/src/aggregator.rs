//! Interval bookkeeping: which archive period a packet falls into

use crate::{ArchiveError, ArchiveResult, FieldAggregate};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};
use weex_core::{ArchiveRecord, ObservationValue, Timestamp, WeatherPacket};

/// End of the interval containing `ts`; a timestamp on a boundary starts the
/// next interval
pub fn interval_end(ts: Timestamp, interval: i32) -> Timestamp {
    let interval = i64::from(interval);
    (ts.div_euclid(interval) + 1) * interval
}

/// Turns a packet stream into archive records
pub struct IntervalAggregator {
    interval: i32,
    unit_system: i32,
    current_end: Option<Timestamp>,
    last_ts: Option<Timestamp>,
    fields: BTreeMap<String, FieldAggregate>,
}

impl IntervalAggregator {
    pub fn new(interval: i32, unit_system: i32) -> ArchiveResult<Self> {
        if interval <= 0 {
            return Err(ArchiveError::InvalidInterval(interval));
        }
        Ok(Self {
            interval,
            unit_system,
            current_end: None,
            last_ts: None,
            fields: BTreeMap::new(),
        })
    }

    /// Fold a packet in; returns the finished record when the packet opens a
    /// new interval.
    #[instrument(skip(self, packet), fields(date_time = packet.date_time))]
    pub fn add_packet(&mut self, packet: &WeatherPacket) -> ArchiveResult<Option<ArchiveRecord>> {
        let ts = packet.date_time;
        if let Some(last) = self.last_ts {
            if ts < last {
                return Err(ArchiveError::OutOfOrder { last, found: ts });
            }
        }
        self.last_ts = Some(ts);

        let finished = match self.current_end {
            Some(end) if ts >= end => {
                let record = self.take_record(end);
                self.current_end = Some(interval_end(ts, self.interval));
                record
            }
            Some(_) => None,
            None => {
                self.current_end = Some(interval_end(ts, self.interval));
                None
            }
        };

        for (name, value) in &packet.observations {
            if let Some(value) = value.as_f64() {
                self.fields
                    .entry(name.clone())
                    .or_insert_with(|| FieldAggregate::for_field(name))
                    .add(value, ts);
            }
        }
        Ok(finished)
    }

    /// Close the open interval early, stamped with its scheduled end
    pub fn flush(&mut self) -> Option<ArchiveRecord> {
        let end = self.current_end.take()?;
        self.take_record(end)
    }

    fn take_record(&mut self, end: Timestamp) -> Option<ArchiveRecord> {
        if self.fields.is_empty() {
            debug!(end, "no values for interval");
            return None;
        }
        let mut aggregates = HashMap::with_capacity(self.fields.len());
        let mut extremes = HashMap::with_capacity(self.fields.len());
        for (name, agg) in std::mem::take(&mut self.fields) {
            if let Some(range) = agg.extremes() {
                extremes.insert(name.clone(), range);
            }
            let value = agg.result().map_or(ObservationValue::Null, ObservationValue::Float);
            aggregates.insert(name, value);
        }
        debug!(end, fields = aggregates.len(), "archive record synthesised");
        Some(ArchiveRecord {
            date_time: end,
            interval: self.interval,
            us_units: self.unit_system,
            extremes,
            aggregates,
        })
    }

    pub fn interval(&self) -> i32 {
        self.interval
    }

    pub fn unit_system(&self) -> i32 {
        self.unit_system
    }
}
