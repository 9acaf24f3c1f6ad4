/// The abstract fetch capability and the wire payloads behind it.
///
/// The orchestrator only ever talks to `DashboardApi`; the live HTTP client,
/// the fixture-backed dev mode and the scripted test doubles all implement
/// it. Response bodies are parsed here so every implementation agrees on
/// the same lenient reading of the payloads:
///
/// - list endpoints may answer with a bare array or a paginated
///   `{"results": [...]}` object
/// - readings and thresholds for unknown parameters are skipped
/// - a threshold item with no severity level gets one computed locally

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::alert::thresholds::level_for_value;
use crate::model::{
    DeclaredAlert, FetchError, Parameter, Reading, Scope, SeriesInput, SeverityItem,
    SeverityLevel, ThresholdLevels, ThresholdSeverity,
};
use crate::series::WindowSpec;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Result of `apply_thresholds`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The server ran the threshold job; body as returned.
    Applied(serde_json::Value),
    /// 401/403. Not an error: the session simply may not trigger the job.
    Unauthorized,
}

/// The read operations the dashboard consumes.
///
/// Futures are not required to be `Send`; the orchestrator drives them on
/// one task.
#[async_trait(?Send)]
pub trait DashboardApi {
    async fn readings(&self, scope: Scope, limit: usize) -> Result<Vec<Reading>, FetchError>;

    async fn active_alerts(&self, scope: Scope) -> Result<Vec<DeclaredAlert>, FetchError>;

    async fn map_data(&self, scope: Scope) -> Result<MapPayload, FetchError>;

    async fn threshold_severity(
        &self,
        scope: Scope,
        parameters: &[Parameter],
    ) -> Result<ThresholdSeverity, FetchError>;

    async fn chart_series(
        &self,
        scope: Scope,
        parameter: Parameter,
        window: WindowSpec,
    ) -> Result<ChartSeriesPayload, FetchError>;

    /// Side-effecting: asks the server to evaluate thresholds and raise
    /// alerts. Must map 401/403 to `ApplyOutcome::Unauthorized`.
    async fn apply_thresholds(&self, scope: Scope, dry_run: bool)
        -> Result<ApplyOutcome, FetchError>;
}

// ---------------------------------------------------------------------------
// Listing envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Paged { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Paged { results } => results,
            Listing::Bare(items) => items,
        }
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(alias = "sensor_type", alias = "type")]
    parameter: String,
    value: Option<f64>,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    unit: String,
}

/// Parses a readings listing; entries for unknown parameters are dropped.
pub fn parse_readings(body: &str) -> Result<Vec<Reading>, FetchError> {
    let listing: Listing<RawReading> = parse_json(body)?;
    Ok(listing
        .into_vec()
        .into_iter()
        .filter_map(|raw| {
            Some(Reading {
                parameter: Parameter::from_key(&raw.parameter)?,
                value: raw.value,
                timestamp: raw.timestamp,
                unit: raw.unit,
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// `affected_barangays` arrives either as ids or as nested objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AffectedRef {
    Id(u64),
    Object { id: u64 },
}

impl AffectedRef {
    fn id(&self) -> u64 {
        match self {
            AffectedRef::Id(id) | AffectedRef::Object { id } => *id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    id: Option<u64>,
    #[serde(default)]
    severity_level: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    affected_barangays: Vec<AffectedRef>,
    issued_at: Option<String>,
    predicted_flood_time: Option<String>,
}

/// Parses the active-alerts listing, preserving fetch order.
pub fn parse_alerts(body: &str) -> Result<Vec<DeclaredAlert>, FetchError> {
    let listing: Listing<RawAlert> = parse_json(body)?;
    Ok(listing
        .into_vec()
        .into_iter()
        .map(|raw| DeclaredAlert {
            id: raw.id,
            level: SeverityLevel::new(raw.severity_level),
            title: raw.title,
            description: raw.description,
            affected_ids: raw.affected_barangays.iter().map(AffectedRef::id).collect(),
            issued_at: raw.issued_at,
            predicted_flood_time: raw.predicted_flood_time,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Map layer payload, handed to the renderer as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapPayload {
    pub zones: Vec<serde_json::Value>,
    pub sensors: Vec<serde_json::Value>,
    pub barangays: Vec<serde_json::Value>,
}

impl MapPayload {
    /// Zones are static overlays; a payload with only zones carries no data
    /// for the scope.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.barangays.is_empty()
    }
}

pub fn parse_map(body: &str) -> Result<MapPayload, FetchError> {
    parse_json(body)
}

// ---------------------------------------------------------------------------
// Threshold severity
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLatest {
    value: Option<f64>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSeverity {
    level: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawThresholdItem {
    parameter: String,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    latest: RawLatest,
    severity: Option<RawSeverity>,
    #[serde(default)]
    thresholds: ThresholdLevels,
}

#[derive(Debug, Deserialize)]
struct ThresholdPayload {
    #[serde(default)]
    data: Vec<RawThresholdItem>,
}

/// Parses the threshold-visualization payload into the threshold signal.
///
/// The overall level is the max over items. Items without a server level
/// are levelled locally from their latest value.
pub fn parse_threshold_severity(body: &str) -> Result<ThresholdSeverity, FetchError> {
    let payload: ThresholdPayload = parse_json(body)?;
    let items = payload
        .data
        .into_iter()
        .filter_map(|raw| {
            let parameter = Parameter::from_key(&raw.parameter)?;
            let level = raw
                .severity
                .and_then(|s| s.level)
                .map(SeverityLevel::new)
                .unwrap_or_else(|| level_for_value(raw.latest.value, &raw.thresholds));
            Some(SeverityItem {
                parameter,
                unit: raw.unit,
                latest_value: raw.latest.value,
                latest_timestamp: raw.latest.timestamp,
                level,
                thresholds: raw.thresholds,
            })
        })
        .collect();
    Ok(ThresholdSeverity::from_items(items))
}

// ---------------------------------------------------------------------------
// Chart series
// ---------------------------------------------------------------------------

/// One parameter's chart series: parallel label/value arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSeriesPayload {
    pub labels: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl ChartSeriesPayload {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn into_input(self, parameter: Parameter) -> SeriesInput {
        SeriesInput::new(parameter.key(), self.labels, self.values)
    }
}

pub fn parse_chart_series(body: &str) -> Result<ChartSeriesPayload, FetchError> {
    parse_json(body)
}

/// Parses an apply-thresholds response body; an empty body is `null`.
pub fn parse_apply(body: &str) -> Result<ApplyOutcome, FetchError> {
    if body.trim().is_empty() {
        return Ok(ApplyOutcome::Applied(serde_json::Value::Null));
    }
    parse_json(body).map(ApplyOutcome::Applied)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
