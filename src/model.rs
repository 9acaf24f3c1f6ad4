/// Core data types for the flood monitoring dashboard.
///
/// This module defines the shared domain model imported by all other modules:
/// readings, aligned series, geographic scopes, severity levels and the
/// combined alert status. It holds no I/O; the few methods here are
/// constructors and lookups over the types themselves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// The five environmental parameters reported by field sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Humidity,
    Rainfall,
    WaterLevel,
    WindSpeed,
}

impl Parameter {
    /// All parameters in dashboard display order.
    pub const ALL: [Parameter; 5] = [
        Parameter::Temperature,
        Parameter::Humidity,
        Parameter::Rainfall,
        Parameter::WaterLevel,
        Parameter::WindSpeed,
    ];

    /// Wire key used by the read API (`sensor_type`, `parameter`).
    pub fn key(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Humidity => "humidity",
            Parameter::Rainfall => "rainfall",
            Parameter::WaterLevel => "water_level",
            Parameter::WindSpeed => "wind_speed",
        }
    }

    /// Parses a wire key, tolerating surrounding whitespace and case.
    pub fn from_key(key: &str) -> Option<Parameter> {
        let key = key.trim().to_ascii_lowercase();
        Parameter::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single sensor measurement as delivered by the read API.
///
/// `value` is `None` when the sensor reported no usable number; that is
/// "no reading", never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub parameter: Parameter,
    pub value: Option<f64>,
    pub timestamp: String, // ISO 8601, e.g. "2024-05-01T12:00:00+08:00"
    pub unit: String,
}

/// One labeled input series for alignment: parallel timestamp/value arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInput {
    pub key: String,
    pub labels: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl SeriesInput {
    pub fn new(key: impl Into<String>, labels: Vec<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            key: key.into(),
            labels,
            values,
        }
    }
}

/// A set of series index-aligned to one shared, strictly increasing label axis.
///
/// Every entry of `series` has exactly `labels.len()` elements. `None` marks
/// "no reading at this timestamp for this parameter".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSet {
    pub labels: Vec<String>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

impl SeriesSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// An empty label axis means "no data", not an error.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, key: &str) -> Option<&[Option<f64>]> {
        self.series.get(key).map(|v| v.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The geographic selection a request is made for.
///
/// A barangay may be set without its municipality; nothing here assumes the
/// barangay belongs to the municipality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub municipality_id: Option<u64>,
    pub barangay_id: Option<u64>,
}

/// How specific a scope is, from narrowest to broadest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Barangay,
    Municipality,
    Global,
}

impl Scope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn municipality(municipality_id: u64) -> Self {
        Self {
            municipality_id: Some(municipality_id),
            barangay_id: None,
        }
    }

    pub fn barangay(municipality_id: u64, barangay_id: u64) -> Self {
        Self {
            municipality_id: Some(municipality_id),
            barangay_id: Some(barangay_id),
        }
    }

    pub fn barangay_only(barangay_id: u64) -> Self {
        Self {
            municipality_id: None,
            barangay_id: Some(barangay_id),
        }
    }

    pub fn level(&self) -> ScopeLevel {
        match (self.municipality_id, self.barangay_id) {
            (_, Some(_)) => ScopeLevel::Barangay,
            (Some(_), None) => ScopeLevel::Municipality,
            (None, None) => ScopeLevel::Global,
        }
    }

    pub fn is_global(&self) -> bool {
        self.level() == ScopeLevel::Global
    }

    /// Query-string pairs for this scope, omitting unset ids.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.municipality_id {
            pairs.push(("municipality_id", id.to_string()));
        }
        if let Some(id) = self.barangay_id {
            pairs.push(("barangay_id", id.to_string()));
        }
        pairs
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.municipality_id, self.barangay_id) {
            (Some(m), Some(b)) => write!(f, "municipality {} / barangay {}", m, b),
            (None, Some(b)) => write!(f, "barangay {}", b),
            (Some(m), None) => write!(f, "municipality {}", m),
            (None, None) => write!(f, "all areas"),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity types
// ---------------------------------------------------------------------------

/// Ordinal flood severity, 0 (normal) through 5 (catastrophic).
///
/// Values outside the range are clamped on construction, so combining two
/// levels is always `max()`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "i64", into = "u8")]
pub struct SeverityLevel(u8);

impl SeverityLevel {
    pub const NORMAL: SeverityLevel = SeverityLevel(0);
    pub const ADVISORY: SeverityLevel = SeverityLevel(1);
    pub const WATCH: SeverityLevel = SeverityLevel(2);
    pub const WARNING: SeverityLevel = SeverityLevel(3);
    pub const EMERGENCY: SeverityLevel = SeverityLevel(4);
    pub const CATASTROPHIC: SeverityLevel = SeverityLevel(5);

    /// Alert levels in ascending order (excludes `NORMAL`).
    pub const ALERT_LEVELS: [SeverityLevel; 5] = [
        SeverityLevel::ADVISORY,
        SeverityLevel::WATCH,
        SeverityLevel::WARNING,
        SeverityLevel::EMERGENCY,
        SeverityLevel::CATASTROPHIC,
    ];

    pub fn new(raw: i64) -> Self {
        SeverityLevel(raw.clamp(0, 5) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_normal(self) -> bool {
        self.0 == 0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "Normal",
            1 => "Advisory",
            2 => "Watch",
            3 => "Warning",
            4 => "Emergency",
            _ => "Catastrophic",
        }
    }

    /// The next level up, or `None` at catastrophic.
    pub fn next(self) -> Option<SeverityLevel> {
        (self.0 < 5).then(|| SeverityLevel(self.0 + 1))
    }
}

impl From<i64> for SeverityLevel {
    fn from(raw: i64) -> Self {
        SeverityLevel::new(raw)
    }
}

impl From<SeverityLevel> for u8 {
    fn from(level: SeverityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Configured thresholds for one parameter, one per alert level.
///
/// Levels in ascending order:
///   advisory < watch < warning < emergency < catastrophic
/// Any level may be unset on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdLevels {
    pub advisory: Option<f64>,
    pub watch: Option<f64>,
    pub warning: Option<f64>,
    pub emergency: Option<f64>,
    pub catastrophic: Option<f64>,
}

impl ThresholdLevels {
    /// Threshold value for an alert level; `None` for `NORMAL` or unset levels.
    pub fn value_for(&self, level: SeverityLevel) -> Option<f64> {
        match level.value() {
            1 => self.advisory,
            2 => self.watch,
            3 => self.warning,
            4 => self.emergency,
            5 => self.catastrophic,
            _ => None,
        }
    }
}

/// Computed threshold state for one parameter in the current scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityItem {
    pub parameter: Parameter,
    pub unit: String,
    pub latest_value: Option<f64>,
    pub latest_timestamp: Option<String>,
    pub level: SeverityLevel,
    pub thresholds: ThresholdLevels,
}

/// The computed-threshold signal: every item plus the highest item level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThresholdSeverity {
    pub level: SeverityLevel,
    pub items: Vec<SeverityItem>,
}

impl ThresholdSeverity {
    pub fn from_items(items: Vec<SeverityItem>) -> Self {
        let level = items.iter().map(|i| i.level).max().unwrap_or_default();
        Self { level, items }
    }
}

/// An alert declared by the monitoring service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredAlert {
    pub id: Option<u64>,
    pub level: SeverityLevel,
    pub title: String,
    pub description: String,
    pub affected_ids: Vec<u64>,
    pub issued_at: Option<String>,
    pub predicted_flood_time: Option<String>,
}

/// Which signal decided the combined level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    None,
    Alert,
    Threshold,
    Both,
}

/// Banner title and body for the combined status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub title: String,
    pub description: String,
}

/// Declared alerts and computed thresholds merged into one status.
///
/// `source` is never `Both`; ties go to the declared alert.
/// Use `descriptive_source` for the "both" label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedStatus {
    pub level: SeverityLevel,
    pub declared_level: SeverityLevel,
    pub threshold_level: SeverityLevel,
    pub source: StatusSource,
    pub explanation: Vec<String>,
    pub headline: Option<Headline>,
}

impl CombinedStatus {
    pub fn normal() -> Self {
        Self {
            level: SeverityLevel::NORMAL,
            declared_level: SeverityLevel::NORMAL,
            threshold_level: SeverityLevel::NORMAL,
            source: StatusSource::None,
            explanation: Vec::new(),
            headline: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.level.name()
    }

    /// `Both` when both signals agree on a nonzero level, otherwise `source`.
    pub fn descriptive_source(&self) -> StatusSource {
        if !self.declared_level.is_normal() && self.declared_level == self.threshold_level {
            StatusSource::Both
        } else {
            self.source
        }
    }
}

// ---------------------------------------------------------------------------
// Data kinds
// ---------------------------------------------------------------------------

/// The independently refreshed parts of the dashboard. Each is its own
/// request stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Sensors,
    Alerts,
    Map,
    Trends,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Sensors,
        DataKind::Alerts,
        DataKind::Map,
        DataKind::Trends,
    ];
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Sensors => write!(f, "sensors"),
            DataKind::Alerts => write!(f, "alerts"),
            DataKind::Map => write!(f, "map"),
            DataKind::Trends => write!(f, "trends"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when calling the dashboard read API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// The request never produced a response (connect, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// 401/403: the session is not allowed to perform the call.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, FetchError::Http(401) | FetchError::Http(403))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
