//! Trailing time-window series for short-term wind statistics

use crate::compass::{bearing_from_components, components};
use crate::types::Timestamp;
use std::collections::VecDeque;

/// Default trailing window (seconds)
pub const DEFAULT_WINDOW_SECS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEntry {
    pub value: f64,
    pub bearing: Option<f64>,
    pub timestamp: Timestamp,
}

/// Values retained for the last `duration` seconds
#[derive(Debug, Clone)]
pub struct WindowSeries {
    duration: i64,
    entries: VecDeque<WindowEntry>,
}

impl WindowSeries {
    pub fn new(duration: i64) -> Self {
        Self {
            duration,
            entries: VecDeque::new(),
        }
    }

    /// Append a value and evict everything older than `timestamp - duration`
    pub fn add(&mut self, value: f64, bearing: Option<f64>, timestamp: Timestamp) {
        self.entries.push_back(WindowEntry {
            value,
            bearing,
            timestamp,
        });
        self.expire(timestamp);
    }

    /// Evict entries that have fallen out of the window as of `now`
    pub fn expire(&mut self, now: Timestamp) {
        let oldest = now - self.duration;
        self.entries.retain(|e| e.timestamp >= oldest);
    }

    /// Entry holding the largest retained value; the earliest one wins ties
    pub fn max_entry(&self) -> Option<&WindowEntry> {
        let mut best: Option<&WindowEntry> = None;
        for entry in &self.entries {
            match best {
                Some(b) if entry.value <= b.value => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    pub fn max(&self) -> Option<f64> {
        self.max_entry().map(|e| e.value)
    }

    /// Arithmetic mean of retained values, 0.0 when empty
    pub fn average(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.entries.iter().map(|e| e.value).sum();
        sum / self.entries.len() as f64
    }

    /// Vector-average bearing over retained entries that carry a bearing
    pub fn vector_average_direction(&self) -> Option<f64> {
        let mut seen = false;
        let (mut xsum, mut ysum) = (0.0, 0.0);
        for entry in &self.entries {
            if let Some(bearing) = entry.bearing {
                let (x, y) = components(entry.value, bearing);
                xsum += x;
                ysum += y;
                seen = true;
            }
        }
        seen.then(|| bearing_from_components(xsum, ysum))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for WindowSeries {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}
