use anyhow::Result;

use crate::{ArchiveRecord, DaySummary, Timestamp, WindroseRow};

/// Read access to the persisted archive the real-time engine merges against
#[async_trait::async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Day-to-date summary for the day containing `ts`
    async fn day_summary(&self, ts: Timestamp) -> Result<DaySummary>;

    /// Sum of windSpeed grouped by `round(windDir / sector_width)` over `[start, end)`
    async fn windrose_rows(
        &self,
        start: Timestamp,
        end: Timestamp,
        sector_width: f64,
    ) -> Result<Vec<WindroseRow>>;

    /// Record closest to `target`, if one lies within `grace` seconds of it
    async fn nearest_record(&self, target: Timestamp, grace: i64) -> Result<Option<ArchiveRecord>>;

    /// Most recent record in the archive
    async fn latest_record(&self) -> Result<Option<ArchiveRecord>>;
}
