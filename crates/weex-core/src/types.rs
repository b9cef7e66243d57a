//! Core data types for weather observations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// Observation interval in seconds
pub type Interval = i32;

/// Loop packet from a station, possibly carrying only a subset of fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherPacket {
    /// Unix timestamp of observation
    #[serde(rename = "dateTime")]
    pub date_time: Timestamp,

    /// Unit system tag (1=US, 16=Metric, 17=MetricWX)
    #[serde(rename = "usUnits", skip_serializing_if = "Option::is_none")]
    pub us_units: Option<i32>,

    /// Weather observations (field name -> value)
    #[serde(flatten)]
    pub observations: HashMap<String, ObservationValue>,
}

impl WeatherPacket {
    pub fn new(date_time: Timestamp, us_units: Option<i32>) -> Self {
        Self {
            date_time,
            us_units,
            observations: HashMap::new(),
        }
    }

    /// Builder-style helper used by drivers and tests
    pub fn with(mut self, name: &str, value: Option<f64>) -> Self {
        let value = value.map_or(ObservationValue::Null, ObservationValue::Float);
        self.observations.insert(name.to_string(), value);
        self
    }

    /// Numeric value of a field; non-numeric and null values read as `None`
    pub fn value(&self, name: &str) -> Option<f64> {
        self.observations.get(name).and_then(ObservationValue::as_f64)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.observations.contains_key(name)
    }

    /// Split the packet into individual samples
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.observations.iter().map(move |(name, value)| Sample {
            name: name.clone(),
            value: value.as_f64(),
            timestamp: self.date_time,
        })
    }
}

/// A single observation tick
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub value: Option<f64>,
    pub timestamp: Timestamp,
}

/// An observation value with optional null handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ObservationValue {
    Float(f64),
    Integer(i64),
    String(String),
    Null,
}

impl ObservationValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObservationValue::Float(v) => Some(*v),
            ObservationValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ObservationValue::Integer(v) => Some(*v),
            ObservationValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ObservationValue::Null)
    }
}

/// Archive record with aggregated data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveRecord {
    /// Unix timestamp (end of interval)
    #[serde(rename = "dateTime")]
    pub date_time: Timestamp,

    /// Observation interval (seconds)
    pub interval: Interval,

    /// Unit system (1=US, 16=Metric, 17=MetricWX)
    #[serde(rename = "usUnits")]
    pub us_units: i32,

    /// Loop-level lows and highs per observation, when the record was
    /// synthesised from loop packets
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extremes: HashMap<String, IntervalExtremes>,

    /// Aggregated observations
    #[serde(flatten)]
    pub aggregates: HashMap<String, ObservationValue>,
}

/// Lowest and highest loop value seen inside one archive interval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntervalExtremes {
    pub min: f64,
    pub min_time: Timestamp,
    pub max: f64,
    pub max_time: Timestamp,
}

impl ArchiveRecord {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.aggregates.get(name).and_then(ObservationValue::as_f64)
    }
}

/// Day-to-date statistics for one observation, as persisted by the archive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObsSummary {
    pub min: Option<f64>,
    pub mintime: Option<Timestamp>,
    pub max: Option<f64>,
    pub maxtime: Option<Timestamp>,
    pub sum: f64,
    pub count: u64,
    /// Sum of value * interval seconds
    pub wsum: f64,
    pub sumtime: f64,
    /// Vector fields, only populated for wind
    pub max_dir: Option<f64>,
    pub xsum: f64,
    pub ysum: f64,
}

/// Day summary baseline: per-observation stats for the day containing `date_time`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Start of the summarised day
    #[serde(rename = "dateTime")]
    pub date_time: Timestamp,

    #[serde(rename = "usUnits")]
    pub us_units: Option<i32>,

    pub observations: HashMap<String, ObsSummary>,
}

impl DaySummary {
    pub fn get(&self, name: &str) -> Option<&ObsSummary> {
        self.observations.get(name)
    }
}

/// One row of a grouped "speed sum by direction sector" query.
///
/// `sector` is `round(windDir / sector_width)`, so a value equal to the
/// sector count is the northern wraparound. Either column may be null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindroseRow {
    pub sector: Option<i64>,
    pub speed_sum: Option<f64>,
}

/// Aggregation type for rollups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Min,
    Max,
    Sum,
    Avg,
    Last,
    First,
    Count,
}

/// Unit system identifiers carried in `usUnits`
pub mod unit_systems {
    pub const US: i32 = 1;
    pub const METRIC: i32 = 16;
    pub const METRICWX: i32 = 17;
}
