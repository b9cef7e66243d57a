use anyhow::{Context, Result};
use tracing::{debug, info};
use weex_realtime::{Snapshot, SnapshotSink};

/// Writes every snapshot to the log
#[derive(Default)]
pub struct LogSink {
    emitted: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self { emitted: 0 }
    }
}

#[async_trait::async_trait]
impl SnapshotSink for LogSink {
    async fn emit(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.emitted += 1;
        info!(
            date_time = snapshot.date_time,
            out_temp = ?snapshot.current.value("outTemp"),
            wind = ?snapshot.wind.latest,
            gust = snapshot.wind.gust,
            compass = ?snapshot.wind.dominant_compass,
            windrun = snapshot.wind.windrun,
            "snapshot #{}",
            self.emitted
        );
        let json = serde_json::to_string(snapshot).context("Failed to serialise snapshot")?;
        debug!(snapshot = %json);
        Ok(())
    }
}
