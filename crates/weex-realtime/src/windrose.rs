//! Windrose: wind speed summed per compass sector over a trailing period

use tracing::{debug, warn};
use weex_core::{ArchiveStore, Timestamp, WindroseRow};

/// Compass sector index for a bearing, as archive stores group rows.
///
/// Returns `round(bearing / width)` without wrapping, so bearings within half
/// a sector of 360 yield the sector count; [`bucket_rows`] folds that back
/// into north.
pub fn sector_index(bearing: f64, width: f64) -> i64 {
    (bearing / width).round() as i64
}

/// Fold grouped archive rows into a `points`-length histogram.
///
/// Rows with a null sector or speed are calm/no-wind samples and are
/// skipped. The northern sector arrives split between index 0 and index
/// `points`; both land in sector 0. Values are rounded to one decimal.
pub fn bucket_rows(rows: &[WindroseRow], points: usize) -> Vec<f64> {
    let mut rose = vec![0.0; points];
    if points == 0 {
        return rose;
    }
    for row in rows {
        let (Some(sector), Some(speed_sum)) = (row.sector, row.speed_sum) else {
            continue;
        };
        let idx = sector.rem_euclid(points as i64) as usize;
        rose[idx] += speed_sum;
    }
    rose.into_iter().map(|v| (v * 10.0).round() / 10.0).collect()
}

/// Computes the windrose from the archive on demand; holds no data
#[derive(Debug, Clone, Copy)]
pub struct WindroseAggregator {
    period: i64,
    points: usize,
}

impl WindroseAggregator {
    pub fn new(period: i64, points: usize) -> Self {
        Self { period, points }
    }

    /// Histogram over `[now - period, now)`; all zeros if the store fails
    pub async fn compute(&self, store: &dyn ArchiveStore, now: Timestamp) -> Vec<f64> {
        let width = 360.0 / self.points as f64;
        match store.windrose_rows(now - self.period, now, width).await {
            Ok(rows) => {
                let rose = bucket_rows(&rows, self.points);
                debug!(rows = rows.len(), ?rose, "windrose calculated");
                rose
            }
            Err(e) => {
                warn!(error = %e, "windrose query failed, using empty windrose");
                vec![0.0; self.points]
            }
        }
    }
}
