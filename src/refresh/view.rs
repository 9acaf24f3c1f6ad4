//! The renderer-facing view model.
//!
//! Every kind is wrapped in `Availability`: a failed refresh replaces the
//! kind's content with `Unavailable` rather than leaving the previous
//! (possibly other-scope) value on screen.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::thresholds::{format_value, ParameterStatus};
use crate::ingest::MapPayload;
use crate::model::{CombinedStatus, DeclaredAlert, Parameter, Scope, ScopeLevel, SeriesSet};
use crate::series::{ChartScaling, RangeKey};

pub const SENSORS_UNAVAILABLE: &str = "Sensor data unavailable";
pub const STATUS_UNAVAILABLE: &str = "Alert status unknown";
pub const MAP_UNAVAILABLE: &str = "Unable to load map data";
pub const TRENDS_UNAVAILABLE: &str = "Unable to load trend data";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum Availability<T> {
    /// Not loaded yet for the current scope.
    Pending,
    Ready(T),
    Unavailable { reason: String },
}

impl<T> Availability<T> {
    pub fn unavailable(reason: &str) -> Self {
        Availability::Unavailable {
            reason: reason.to_string(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Availability::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Availability::Unavailable { .. })
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Why a kind shows nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    /// The only scope tried had no data.
    NoDataInScope,
    /// Every scope in the fallback chain was tried and none had data.
    NoDataAcrossScopes,
}

impl EmptyState {
    pub fn for_chain_len(len: usize) -> Self {
        if len > 1 {
            EmptyState::NoDataAcrossScopes
        } else {
            EmptyState::NoDataInScope
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            EmptyState::NoDataInScope => "No data for the selected area",
            EmptyState::NoDataAcrossScopes => "No data available in any area",
        }
    }
}

/// Data shown for a broader scope than the one selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FallbackAnnotation {
    pub requested: Scope,
    pub used: Scope,
}

impl FallbackAnnotation {
    pub fn message(&self) -> &'static str {
        match self.used.level() {
            ScopeLevel::Municipality => "showing municipality-wide data",
            ScopeLevel::Global => "showing data from all areas",
            ScopeLevel::Barangay => "showing barangay data",
        }
    }
}

// ---------------------------------------------------------------------------
// Per-kind views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub parameter: Parameter,
    pub label: &'static str,
    pub value: Option<f64>,
    pub unit: String,
    pub timestamp: Option<String>,
    /// `None` when there is no timestamp to judge.
    pub stale: Option<bool>,
}

impl Gauge {
    /// `--` when the sensor has no value.
    pub fn display_value(&self) -> String {
        format_value(self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorsView {
    /// One gauge per parameter, registry order.
    pub gauges: Vec<Gauge>,
    pub annotation: Option<FallbackAnnotation>,
    pub empty: Option<EmptyState>,
}

impl SensorsView {
    pub fn gauge(&self, parameter: Parameter) -> Option<&Gauge> {
        self.gauges.iter().find(|g| g.parameter == parameter)
    }
}

/// Whether one of the two severity signals could be fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SignalState {
    Known,
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub combined: CombinedStatus,
    /// Uncapped per-parameter list with next-level progress.
    pub parameters: Vec<ParameterStatus>,
    /// Declared alerts used for `combined`, after any barangay pre-filter.
    pub alerts: Vec<DeclaredAlert>,
    pub declared_signal: SignalState,
    pub threshold_signal: SignalState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub payload: MapPayload,
    pub annotation: Option<FallbackAnnotation>,
    pub empty: Option<EmptyState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendsView {
    pub range: RangeKey,
    pub scaling: ChartScaling,
    /// Aligned, range-filtered and scaled.
    pub chart: SeriesSet,
    pub annotation: Option<FallbackAnnotation>,
    pub empty: Option<EmptyState>,
}

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub scope: Scope,
    pub sensors: Availability<SensorsView>,
    pub status: Availability<StatusView>,
    pub map: Availability<MapView>,
    pub trends: Availability<TrendsView>,
    /// Time of the most recent successful commit of any kind.
    pub last_updated: Option<DateTime<Utc>>,
}

impl ViewModel {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            sensors: Availability::Pending,
            status: Availability::Pending,
            map: Availability::Pending,
            trends: Availability::Pending,
            last_updated: None,
        }
    }

    /// Banner label. An unknown status reads "Normal" on the banner, but
    /// the status itself stays `Unavailable` so it is never mistaken for
    /// "no alerts".
    pub fn status_label(&self) -> &'static str {
        self.status
            .ready()
            .map(|s| s.combined.label())
            .unwrap_or("Normal")
    }

    /// One-line text summary, used by the headless binary.
    pub fn summary_line(&self) -> String {
        let status = match &self.status {
            Availability::Ready(s) => {
                format!("{} ({:?})", s.combined.label(), s.combined.descriptive_source())
            }
            Availability::Pending => "pending".to_string(),
            Availability::Unavailable { reason } => reason.clone(),
        };
        let gauges = match &self.sensors {
            Availability::Ready(s) => s
                .gauges
                .iter()
                .map(|g| format!("{}={}", g.parameter, g.display_value()))
                .collect::<Vec<_>>()
                .join(" "),
            Availability::Pending => "pending".to_string(),
            Availability::Unavailable { reason } => reason.clone(),
        };
        let points = match &self.trends {
            Availability::Ready(t) => format!("{} points", t.chart.len()),
            Availability::Pending => "pending".to_string(),
            Availability::Unavailable { reason } => reason.clone(),
        };
        format!("[{}] status: {} | sensors: {} | trends: {}", self.scope, status, gauges, points)
    }
}
