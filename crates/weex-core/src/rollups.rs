//! Running per-period accumulators and their merge with the archive baseline

use crate::compass::{bearing_from_components, components};
use crate::observations::{AccumulatorKind, ObservationDescriptor, REGISTRY};
use crate::types::{DaySummary, ObsSummary, Timestamp, WeatherPacket};
use crate::window::WindowSeries;
use serde::Serialize;

/// Min/max/sum/count of a scalar observation for the current period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarAccumulator {
    min: Option<f64>,
    min_time: Option<Timestamp>,
    max: Option<f64>,
    max_time: Option<Timestamp>,
    sum: f64,
    count: u64,
    last: Option<f64>,
    last_time: Option<Timestamp>,
}

impl ScalarAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, value: Option<f64>, ts: Timestamp) {
        let Some(value) = value else {
            return;
        };
        if self.last_time.map_or(true, |last| ts >= last) {
            self.last = Some(value);
            self.last_time = Some(ts);
        }
        if self.min.map_or(true, |min| value < min) {
            self.min = Some(value);
            self.min_time = Some(ts);
        }
        if self.max.map_or(true, |max| value > max) {
            self.max = Some(value);
            self.max_time = Some(ts);
        }
        self.sum += value;
        self.count += 1;
    }

    /// Clear period stats; the latest value survives
    pub fn reset(&mut self) {
        *self = Self {
            last: self.last,
            last_time: self.last_time,
            ..Self::default()
        };
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn min_time(&self) -> Option<Timestamp> {
        self.min_time
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn max_time(&self) -> Option<Timestamp> {
        self.max_time
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn last_time(&self) -> Option<Timestamp> {
        self.last_time
    }
}

/// Scalar accumulator over wind speed plus the x/y decomposition of the vector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorAccumulator {
    scalar: ScalarAccumulator,
    max_dir: Option<f64>,
    xsum: f64,
    ysum: f64,
    dir_count: u64,
    sumtime: f64,
}

impl VectorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, speed: Option<f64>, bearing: Option<f64>, ts: Timestamp) {
        let Some(speed) = speed else {
            return;
        };
        if let Some(last) = self.scalar.last_time() {
            if ts > last {
                self.sumtime += (ts - last) as f64;
            }
        }
        let previous_max = self.scalar.max();
        self.scalar.add_sample(Some(speed), ts);
        if self.scalar.max() != previous_max {
            self.max_dir = bearing;
        }
        if let Some(bearing) = bearing {
            let (x, y) = components(speed, bearing);
            self.xsum += x;
            self.ysum += y;
            self.dir_count += 1;
        }
    }

    pub fn reset(&mut self) {
        self.scalar.reset();
        self.max_dir = None;
        self.xsum = 0.0;
        self.ysum = 0.0;
        self.dir_count = 0;
        self.sumtime = 0.0;
    }

    pub fn scalar(&self) -> &ScalarAccumulator {
        &self.scalar
    }

    /// Bearing recorded when the current max speed was set
    pub fn max_dir(&self) -> Option<f64> {
        self.max_dir
    }

    pub fn xsum(&self) -> f64 {
        self.xsum
    }

    pub fn ysum(&self) -> f64 {
        self.ysum
    }

    pub fn sumtime(&self) -> f64 {
        self.sumtime
    }

    /// Vector-average bearing, `None` until a directional sample arrives
    pub fn vector_direction(&self) -> Option<f64> {
        (self.dir_count > 0).then(|| bearing_from_components(self.xsum, self.ysum))
    }
}

/// Tagged accumulator held per registry descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum ObsAccumulator {
    Scalar(ScalarAccumulator),
    Vector(VectorAccumulator),
}

impl ObsAccumulator {
    pub fn for_kind(kind: AccumulatorKind) -> Self {
        match kind {
            AccumulatorKind::Scalar => Self::Scalar(ScalarAccumulator::new()),
            AccumulatorKind::Vector => Self::Vector(VectorAccumulator::new()),
        }
    }

    pub fn scalar(&self) -> &ScalarAccumulator {
        match self {
            Self::Scalar(acc) => acc,
            Self::Vector(acc) => acc.scalar(),
        }
    }

    pub fn as_vector(&self) -> Option<&VectorAccumulator> {
        match self {
            Self::Vector(acc) => Some(acc),
            Self::Scalar(_) => None,
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Scalar(acc) => acc.reset(),
            Self::Vector(acc) => acc.reset(),
        }
    }
}

/// Day high/low and totals after merging baseline and loop accumulator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayStats {
    pub low: Option<f64>,
    pub low_time: Option<Timestamp>,
    pub high: Option<f64>,
    pub high_time: Option<Timestamp>,
    pub sum: f64,
    pub count: u64,
}

impl DayStats {
    /// Mean over the day so far, 0.0 before the first sample
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Merge an archive baseline with the loop accumulator collected since it.
///
/// The more extreme value wins along with its own timestamp; on a tie the
/// baseline's timestamp is kept.
pub fn merge_with_baseline(baseline: Option<&ObsSummary>, acc: &ScalarAccumulator) -> DayStats {
    let base = baseline.cloned().unwrap_or_default();

    let (low, low_time) = match (base.min, acc.min()) {
        (Some(b), Some(a)) if a < b => (Some(a), acc.min_time()),
        (Some(b), _) => (Some(b), base.mintime),
        (None, a) => (a, acc.min_time()),
    };
    let (high, high_time) = match (base.max, acc.max()) {
        (Some(b), Some(a)) if a > b => (Some(a), acc.max_time()),
        (Some(b), _) => (Some(b), base.maxtime),
        (None, a) => (a, acc.max_time()),
    };

    DayStats {
        low,
        low_time,
        high,
        high_time,
        sum: base.sum + acc.sum(),
        count: base.count + acc.count(),
    }
}

/// Bearing at the day's high wind: the baseline's unless the loop beat it
pub fn merged_max_dir(baseline: Option<&ObsSummary>, acc: &VectorAccumulator) -> Option<f64> {
    match (baseline.and_then(|b| b.max), acc.scalar().max()) {
        (Some(b), Some(a)) if a > b => acc.max_dir(),
        (Some(_), _) => baseline.and_then(|b| b.max_dir),
        (None, _) => acc.max_dir(),
    }
}

/// Day vector-average bearing from baseline and loop x/y sums
pub fn merged_vector_direction(
    baseline: Option<&ObsSummary>,
    acc: &VectorAccumulator,
) -> Option<f64> {
    let (bx, by) = baseline.map_or((0.0, 0.0), |b| (b.xsum, b.ysum));
    let baseline_has_vector = bx != 0.0 || by != 0.0;
    if !baseline_has_vector && acc.vector_direction().is_none() {
        return None;
    }
    Some(bearing_from_components(bx + acc.xsum(), by + acc.ysum()))
}

struct Slot {
    descriptor: &'static ObservationDescriptor,
    accumulator: ObsAccumulator,
    window: Option<WindowSeries>,
}

/// Accumulators and trailing windows for every registry observation
pub struct AccumulatorSet {
    slots: Vec<Slot>,
    windrun: f64,
    last_wind_ts: Option<Timestamp>,
}

impl AccumulatorSet {
    pub fn new(window_secs: i64) -> Self {
        Self::with_registry(REGISTRY, window_secs)
    }

    pub fn with_registry(registry: &'static [ObservationDescriptor], window_secs: i64) -> Self {
        let slots = registry
            .iter()
            .map(|descriptor| Slot {
                descriptor,
                accumulator: ObsAccumulator::for_kind(descriptor.kind),
                window: descriptor
                    .short_window
                    .then(|| WindowSeries::new(window_secs)),
            })
            .collect();
        Self {
            slots,
            windrun: 0.0,
            last_wind_ts: None,
        }
    }

    /// Fold every registry field present in the packet into its accumulator
    pub fn add_packet(&mut self, packet: &WeatherPacket) {
        let ts = packet.date_time;
        for slot in &mut self.slots {
            let descriptor = slot.descriptor;
            if !packet.contains(descriptor.source) {
                continue;
            }
            let value = packet.value(descriptor.source);
            let bearing = descriptor.direction.and_then(|d| packet.value(d));
            match &mut slot.accumulator {
                ObsAccumulator::Scalar(acc) => acc.add_sample(value, ts),
                ObsAccumulator::Vector(acc) => acc.add_sample(value, bearing, ts),
            }
            if let (Some(window), Some(value)) = (slot.window.as_mut(), value) {
                // the vector window only tracks directional samples
                if !descriptor.is_vector() || bearing.is_some() {
                    window.add(value, bearing, ts);
                }
            }
        }
        self.add_windrun(packet);
    }

    fn add_windrun(&mut self, packet: &WeatherPacket) {
        if !packet.contains("windSpeed") {
            return;
        }
        let ts = packet.date_time;
        if let (Some(speed), Some(last)) = (packet.value("windSpeed"), self.last_wind_ts) {
            if ts > last {
                self.windrun += speed * (ts - last) as f64 / 3600.0;
            }
        }
        self.last_wind_ts = Some(ts);
    }

    /// Period-boundary reset: accumulators only, windows keep their history
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.accumulator.reset();
        }
        self.windrun = 0.0;
    }

    /// Expire window entries as of `now`
    pub fn expire_windows(&mut self, now: Timestamp) {
        for window in self.slots.iter_mut().filter_map(|s| s.window.as_mut()) {
            window.expire(now);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ObsAccumulator> {
        self.slot(name).map(|s| &s.accumulator)
    }

    pub fn window(&self, name: &str) -> Option<&WindowSeries> {
        self.slot(name).and_then(|s| s.window.as_ref())
    }

    /// Windrun accumulated since the last reset (speed units * hours)
    pub fn windrun(&self) -> f64 {
        self.windrun
    }

    /// Merged day stats for every scalar view in the registry
    pub fn day_stats<'a>(
        &'a self,
        baseline: &'a DaySummary,
    ) -> impl Iterator<Item = (&'static str, DayStats)> + 'a {
        self.slots.iter().map(move |slot| {
            let name = slot.descriptor.name;
            let stats = merge_with_baseline(baseline.get(name), slot.accumulator.scalar());
            (name, stats)
        })
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.descriptor.name == name)
    }
}
