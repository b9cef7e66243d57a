//! Last-known-value cache that turns partial loop packets into complete ones
//!
//! Stations that emit only a subset of fields per packet would otherwise
//! make downstream consumers flip between present and missing fields. The
//! cache remembers the last non-null value of every field together with the
//! packet timestamp it came from, and serves a full-shaped packet on demand
//! in which anything older than the caller's max age reads as null.

use crate::types::{ArchiveRecord, Timestamp, WeatherPacket};
use crate::CoreError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Fields every cached packet carries, seen or not
pub const DEFAULT_REQUIRED_FIELDS: &[&str] = &[
    "cloudbase",
    "windDir",
    "windrun",
    "inHumidity",
    "outHumidity",
    "barometer",
    "radiation",
    "rain",
    "rainRate",
    "windSpeed",
    "appTemp",
    "dewpoint",
    "heatindex",
    "humidex",
    "inTemp",
    "outTemp",
    "windchill",
    "UV",
];

/// Default max age of a cached value (seconds)
pub const DEFAULT_MAX_CACHE_AGE: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheEntry {
    value: Option<f64>,
    ts: Timestamp,
}

/// Complete-shaped packet read back from the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedPacket {
    #[serde(rename = "dateTime")]
    pub date_time: Timestamp,
    #[serde(rename = "usUnits")]
    pub us_units: Option<i32>,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl CachedPacket {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct SampleCache {
    required: Vec<String>,
    entries: HashMap<String, CacheEntry>,
    unit_system: Option<i32>,
}

impl SampleCache {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            entries: HashMap::new(),
            unit_system: None,
        }
    }

    /// Seed required fields from an archive record so the first packets
    /// read back with ballpark values instead of nulls
    pub fn prime(&mut self, record: &ArchiveRecord) {
        for name in &self.required {
            self.entries.insert(
                name.clone(),
                CacheEntry {
                    value: record.value(name),
                    ts: record.date_time,
                },
            );
        }
        self.unit_system = Some(record.us_units);
    }

    /// Store every non-null field of the packet
    pub fn update(&mut self, packet: &WeatherPacket) -> Result<(), CoreError> {
        match (self.unit_system, packet.us_units) {
            (Some(cache), Some(incoming)) if cache != incoming => {
                return Err(CoreError::UnitMismatch {
                    expected: cache,
                    found: incoming,
                });
            }
            (None, incoming) => self.unit_system = incoming,
            _ => {}
        }

        for (name, value) in &packet.observations {
            if let Some(value) = value.as_f64() {
                self.entries.insert(
                    name.clone(),
                    CacheEntry {
                        value: Some(value),
                        ts: packet.date_time,
                    },
                );
            }
        }
        Ok(())
    }

    /// Cached value of `name`, or `None` if unseen or older than `max_age`
    pub fn get_value(&self, name: &str, as_of: Timestamp, max_age: i64) -> Option<f64> {
        self.entries
            .get(name)
            .filter(|e| as_of - e.ts <= max_age)
            .and_then(|e| e.value)
    }

    pub fn get_packet(&self, as_of: Timestamp, max_age: i64) -> CachedPacket {
        let mut values: BTreeMap<String, Option<f64>> = self
            .required
            .iter()
            .map(|name| (name.clone(), None))
            .collect();
        for name in self.entries.keys() {
            values.insert(name.clone(), self.get_value(name, as_of, max_age));
        }
        CachedPacket {
            date_time: as_of,
            us_units: self.unit_system,
            values,
        }
    }

    pub fn unit_system(&self) -> Option<i32> {
        self.unit_system
    }
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_FIELDS.iter().copied())
    }
}
