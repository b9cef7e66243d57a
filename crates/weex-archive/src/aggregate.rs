//! Per-field reduction of loop values into one archive value

use weex_core::{AggregateType, IntervalExtremes, Timestamp};

/// How an observation is reduced over an archive interval
pub fn default_aggregate_type(obs_type: &str) -> AggregateType {
    match obs_type {
        "rain" => AggregateType::Sum,
        "windGust" => AggregateType::Max,
        "windDir" | "windGustDir" => AggregateType::Last,
        "outTemp" | "inTemp" | "dewpoint" | "heatindex" | "windchill" | "appTemp" | "humidex" => {
            AggregateType::Avg
        }
        "barometer" | "pressure" | "altimeter" => AggregateType::Avg,
        "windSpeed" | "outHumidity" | "inHumidity" | "radiation" | "UV" | "cloudbase" => {
            AggregateType::Avg
        }
        _ => AggregateType::Last,
    }
}

/// Running reduction of one field; keeps no per-sample history
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAggregate {
    kind: AggregateType,
    first: Option<f64>,
    last: Option<f64>,
    min: f64,
    min_time: Timestamp,
    max: f64,
    max_time: Timestamp,
    sum: f64,
    count: u32,
}

impl FieldAggregate {
    pub fn new(kind: AggregateType) -> Self {
        Self {
            kind,
            first: None,
            last: None,
            min: f64::INFINITY,
            min_time: 0,
            max: f64::NEG_INFINITY,
            max_time: 0,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn for_field(name: &str) -> Self {
        Self::new(default_aggregate_type(name))
    }

    /// Fold in a value observed at `ts`; ties keep the earlier time
    pub fn add(&mut self, value: f64, ts: Timestamp) {
        self.first.get_or_insert(value);
        self.last = Some(value);
        if value < self.min {
            self.min = value;
            self.min_time = ts;
        }
        if value > self.max {
            self.max = value;
            self.max_time = ts;
        }
        self.sum += value;
        self.count += 1;
    }

    pub fn kind(&self) -> AggregateType {
        self.kind
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Lowest and highest raw value with their times, `None` until the
    /// first value
    pub fn extremes(&self) -> Option<IntervalExtremes> {
        (self.count > 0).then_some(IntervalExtremes {
            min: self.min,
            min_time: self.min_time,
            max: self.max,
            max_time: self.max_time,
        })
    }

    /// `None` until the first value
    pub fn result(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match self.kind {
            AggregateType::Min => Some(self.min),
            AggregateType::Max => Some(self.max),
            AggregateType::Sum => Some(self.sum),
            AggregateType::Avg => Some(self.sum / f64::from(self.count)),
            AggregateType::First => self.first,
            AggregateType::Last => self.last,
            AggregateType::Count => Some(f64::from(self.count)),
        }
    }
}
