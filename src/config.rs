/// Dashboard configuration.
///
/// Loaded from an optional TOML file; every field has a default so an empty
/// file (or none) yields a working local setup. A `.env` file is read first
/// and two environment variables override the file:
///
/// - `FLOMON_API_BASE_URL` → `api.base_url`
/// - `FLOMON_LOG_LEVEL`    → `logging.level`
///
/// ```toml
/// readings_limit = 100
///
/// [api]
/// base_url = "http://localhost:8000"
/// timeout_secs = 15
///
/// [polling]
/// sensors_secs = 60
/// trends_secs = 300
///
/// [chart]
/// default_range = "7d"
/// scaling = "normalized"
///
/// [scope]
/// municipality_id = 3
/// barangay_id = 12
/// ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogLevel;
use crate::model::{DataKind, Scope};
use crate::series::{ChartScaling, RangeKey};

pub const ENV_BASE_URL: &str = "FLOMON_API_BASE_URL";
pub const ENV_LOG_LEVEL: &str = "FLOMON_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Poll interval per data kind. Sensor gauges and alerts are cheap and
/// urgent; map and trends are heavier and change slowly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub sensors_secs: u64,
    pub alerts_secs: u64,
    pub map_secs: u64,
    pub trends_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sensors_secs: 60,
            alerts_secs: 60,
            map_secs: 300,
            trends_secs: 300,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self, kind: DataKind) -> Duration {
        let secs = match kind {
            DataKind::Sensors => self.sensors_secs,
            DataKind::Alerts => self.alerts_secs,
            DataKind::Map => self.map_secs,
            DataKind::Trends => self.trends_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Point count requested per series for the "latest" range.
    pub latest_points: usize,
    pub default_range: RangeKey,
    pub scaling: ChartScaling,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            latest_points: 50,
            default_range: RangeKey::Latest,
            scaling: ChartScaling::Raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Drop declared alerts that do not name the selected barangay.
    pub prefilter_by_barangay: bool,
    pub stale_after_minutes: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            prefilter_by_barangay: false,
            stale_after_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub readings_limit: usize,
    pub chart: ChartConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
    /// Scope selected at startup.
    pub scope: Scope,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            readings_limit: 100,
            chart: ChartConfig::default(),
            alerts: AlertsConfig::default(),
            logging: LoggingConfig::default(),
            scope: Scope::global(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl DashboardConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies environment overrides through `lookup` (`std::env::var` in
    /// production, a map in tests). Unrecognised log levels are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).as_deref().and_then(LogLevel::parse) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be > 0".to_string()));
        }
        for kind in DataKind::ALL {
            if self.polling.interval(kind).is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "polling interval for {} must be > 0",
                    kind
                )));
            }
        }
        if self.readings_limit == 0 || self.chart.latest_points == 0 {
            return Err(ConfigError::Invalid(
                "readings_limit and chart.latest_points must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads `.env`, the optional TOML file, then environment overrides, and
/// validates the result.
pub fn load_config(path: Option<&Path>) -> Result<DashboardConfig, ConfigError> {
    dotenv::dotenv().ok();

    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            DashboardConfig::from_toml_str(&raw)?
        }
        None => DashboardConfig::default(),
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
