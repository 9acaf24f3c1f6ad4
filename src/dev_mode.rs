/// Development mode: serve the read API from JSON fixtures.
///
/// When the monitoring service is unavailable, point the dashboard at a
/// directory of captured responses instead. Each read operation maps to a
/// fixture file, optionally specialised per scope:
///
/// ```text
/// readings.json            all areas
/// readings.m3.json         municipality 3
/// readings.m3.b12.json     municipality 3, barangay 12
/// readings.b12.json        barangay 12 without municipality
/// ```
///
/// The same pattern applies to `alerts`, `map`, `thresholds` and
/// `chart_<parameter>` (e.g. `chart_water_level.m3.json`). Only the exact
/// scope's file is read; a missing file answers `Http(404)`, so the scope
/// fallback behaves as it would against a server with gaps.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::ingest::api::{self, ApplyOutcome, ChartSeriesPayload, DashboardApi, MapPayload};
use crate::model::{DeclaredAlert, FetchError, Parameter, Reading, Scope, ThresholdSeverity};
use crate::series::WindowSpec;

/// Fixture-backed `DashboardApi`.
pub struct DevModeApi {
    dir: PathBuf,
}

impl DevModeApi {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fixture path for `name` at exactly `scope`.
    pub fn fixture_path(&self, name: &str, scope: Scope) -> PathBuf {
        let mut file = name.to_string();
        if let Some(m) = scope.municipality_id {
            file.push_str(&format!(".m{}", m));
        }
        if let Some(b) = scope.barangay_id {
            file.push_str(&format!(".b{}", b));
        }
        file.push_str(".json");
        self.dir.join(file)
    }

    async fn read_fixture(&self, name: &str, scope: Scope) -> Result<String, FetchError> {
        let path = self.fixture_path(name, scope);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::Http(404)),
            Err(e) => Err(FetchError::Transport(format!("{}: {}", path.display(), e))),
        }
    }
}

#[async_trait(?Send)]
impl DashboardApi for DevModeApi {
    async fn readings(&self, scope: Scope, limit: usize) -> Result<Vec<Reading>, FetchError> {
        let body = self.read_fixture("readings", scope).await?;
        let mut readings = api::parse_readings(&body)?;
        readings.truncate(limit);
        Ok(readings)
    }

    async fn active_alerts(&self, scope: Scope) -> Result<Vec<DeclaredAlert>, FetchError> {
        let body = self.read_fixture("alerts", scope).await?;
        api::parse_alerts(&body)
    }

    async fn map_data(&self, scope: Scope) -> Result<MapPayload, FetchError> {
        let body = self.read_fixture("map", scope).await?;
        api::parse_map(&body)
    }

    async fn threshold_severity(
        &self,
        scope: Scope,
        parameters: &[Parameter],
    ) -> Result<ThresholdSeverity, FetchError> {
        let body = self.read_fixture("thresholds", scope).await?;
        let mut severity = api::parse_threshold_severity(&body)?;
        severity.items.retain(|item| parameters.contains(&item.parameter));
        Ok(ThresholdSeverity::from_items(severity.items))
    }

    /// `Latest { limit }` keeps the last `limit` points, as the server
    /// does; day windows return the fixture whole. Labels without a value
    /// (or values without a label) at the tail are dropped first.
    async fn chart_series(
        &self,
        scope: Scope,
        parameter: Parameter,
        window: WindowSpec,
    ) -> Result<ChartSeriesPayload, FetchError> {
        let name = format!("chart_{}", parameter.key());
        let body = self.read_fixture(&name, scope).await?;
        let mut payload = api::parse_chart_series(&body)?;
        if let WindowSpec::Latest { limit } = window {
            // Pair labels with values before trimming from the front.
            let paired = payload.labels.len().min(payload.values.len());
            payload.labels.truncate(paired);
            payload.values.truncate(paired);
            let skip = paired.saturating_sub(limit);
            payload.labels.drain(..skip);
            payload.values.drain(..skip);
        }
        Ok(payload)
    }

    /// Nothing to apply offline; reports what would have run.
    async fn apply_thresholds(
        &self,
        scope: Scope,
        dry_run: bool,
    ) -> Result<ApplyOutcome, FetchError> {
        Ok(ApplyOutcome::Applied(serde_json::json!({
            "dry_run": dry_run,
            "municipality_id": scope.municipality_id,
            "barangay_id": scope.barangay_id,
            "alerts_created": 0,
            "source": "dev_mode",
        })))
    }
}
