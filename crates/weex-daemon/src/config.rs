//! Daemon configuration: config file plus environment overrides

use anyhow::{Context, Result};
use std::env;
use weewx_config::{AppConfig, RealtimeConfig};
use weex_core::unit_systems;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub station_id: String,

    /// Archive interval in seconds (default: 300 = 5 minutes)
    pub archive_interval: i32,

    /// Seconds between simulated loop packets (default: 2)
    pub poll_interval: u64,

    /// Unit system (1=US, 16=Metric, 17=MetricWX)
    pub unit_system: i32,

    pub realtime: RealtimeConfig,
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

impl DaemonConfig {
    /// Load `WEEWX_CONFIG` and apply environment overrides
    pub fn from_env() -> Result<Self> {
        let app = AppConfig::load().context("Failed to load configuration")?;
        Self::from_app(&app)
    }

    pub fn from_app(app: &AppConfig) -> Result<Self> {
        let archive_interval = env_or("ARCHIVE_INTERVAL", 300)?;
        if archive_interval <= 0 {
            anyhow::bail!("ARCHIVE_INTERVAL must be positive, got {}", archive_interval);
        }
        Ok(Self {
            station_id: app.station_id(),
            archive_interval,
            poll_interval: env_or("POLL_INTERVAL", 2)?,
            unit_system: env_or("UNIT_SYSTEM", unit_systems::METRIC)?,
            realtime: app.realtime(),
        })
    }
}
