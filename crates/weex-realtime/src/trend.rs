//! Trend: change of an observation against an archive record a fixed time ago

use tracing::{debug, warn};
use weex_core::{ArchiveStore, Timestamp};

#[derive(Debug, Clone, Copy)]
pub struct TrendCalculator {
    lookback: i64,
    grace: i64,
}

impl TrendCalculator {
    pub fn new(lookback: i64, grace: i64) -> Self {
        Self { lookback, grace }
    }

    /// `current - historical`, where historical is `name` in the record
    /// nearest `as_of - lookback` within `grace` seconds.
    ///
    /// `None` when there is no current value, no record in range, the record
    /// lacks the observation, or the lookup fails.
    pub async fn delta(
        &self,
        store: &dyn ArchiveStore,
        name: &str,
        current: Option<f64>,
        as_of: Timestamp,
    ) -> Option<f64> {
        let current = current?;
        let target = as_of - self.lookback;
        let record = match store.nearest_record(target, self.grace).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(obs = name, target, "no archive record for trend");
                return None;
            }
            Err(e) => {
                warn!(obs = name, error = %e, "trend lookup failed");
                return None;
            }
        };
        let then = record.value(name)?;
        Some(current - then)
    }
}
