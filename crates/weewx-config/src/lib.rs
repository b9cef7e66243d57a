use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: Option<String>,
}

/// Trend lookup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// How far back the comparison record lies (seconds)
    pub lookback: i64,
    /// Accepted distance between the wanted and the found record (seconds)
    pub grace: i64,
    pub observations: Vec<String>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            lookback: 3600,
            grace: 300,
            observations: vec!["outTemp".to_string(), "barometer".to_string()],
        }
    }
}

/// Settings of the real-time aggregation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Minimum seconds between snapshots; 0 emits on every sample
    pub min_interval: u64,
    pub max_cache_age: i64,
    /// Trailing window for gust/average/direction (seconds)
    pub window_secs: i64,
    pub windrose_period: i64,
    pub windrose_points: usize,
    /// Sample events kept queued before the oldest are dropped
    pub backlog: usize,
    pub poll_timeout_ms: u64,
    pub shutdown_grace_secs: u64,
    pub required_fields: Option<Vec<String>>,
    pub trend: TrendConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            min_interval: 0,
            max_cache_age: 600,
            window_secs: 600,
            windrose_period: 86400,
            windrose_points: 16,
            backlog: 5,
            poll_timeout_ms: 1000,
            shutdown_grace_secs: 15,
            required_fields: None,
            trend: TrendConfig::default(),
        }
    }
}

impl RealtimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.windrose_points == 0 {
            return Err(ConfigError::Invalid("windrose_points must be > 0".into()));
        }
        if self.backlog == 0 {
            return Err(ConfigError::Invalid("backlog must be > 0".into()));
        }
        if self.window_secs <= 0 {
            return Err(ConfigError::Invalid("window_secs must be > 0".into()));
        }
        if self.trend.grace < 0 {
            return Err(ConfigError::Invalid("trend.grace must be >= 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub station: Option<StationConfig>,
    pub realtime: Option<RealtimeConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from WEEWX_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WEEWX_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&s)?
        } else {
            AppConfig::default()
        };
        cfg.realtime().validate()?;
        Ok(cfg)
    }

    /// Real-time engine settings (defaults when the section is absent)
    pub fn realtime(&self) -> RealtimeConfig {
        self.realtime.clone().unwrap_or_default()
    }

    pub fn station_id(&self) -> String {
        self.station
            .as_ref()
            .and_then(|s| s.id.clone())
            .unwrap_or_else(|| "station".to_string())
    }
}
