/// Live read-API client.
///
/// Thin reqwest wrapper: builds the scoped URL, maps transport and status
/// failures onto `FetchError`, and hands the body to the shared parsers in
/// `ingest::api`.
///
/// Endpoints (relative to the configured base URL):
///   GET  /api/sensor-data/?limit=N
///   GET  /api/flood-alerts/?active=true
///   GET  /api/map-data/
///   GET  /api/threshold-visualization/?parameter=a,b
///   GET  /api/chart-data/?type=P&days=N   (or &limit=N for "latest")
///   POST /api/apply-thresholds/
/// Every request carries `municipality_id` / `barangay_id` when set.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::config::ApiConfig;
use crate::ingest::api::{self, ApplyOutcome, ChartSeriesPayload, DashboardApi, MapPayload};
use crate::model::{DeclaredAlert, FetchError, Parameter, Reading, Scope, ThresholdSeverity};
use crate::series::WindowSpec;

const SENSOR_DATA_PATH: &str = "/api/sensor-data/";
const ALERTS_PATH: &str = "/api/flood-alerts/";
const MAP_DATA_PATH: &str = "/api/map-data/";
const THRESHOLD_PATH: &str = "/api/threshold-visualization/";
const CHART_DATA_PATH: &str = "/api/chart-data/";
const APPLY_THRESHOLDS_PATH: &str = "/api/apply-thresholds/";

pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_text(
        &self,
        path: &str,
        scope: Scope,
        extra: &[(&'static str, String)],
    ) -> Result<String, FetchError> {
        let mut query = extra.to_vec();
        query.extend(scope.query_pairs());

        debug!(path, scope = %scope, "GET");
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        read_success_body(response).await
    }
}

fn transport(err: reqwest::Error) -> FetchError {
    match err.status() {
        Some(status) => FetchError::Http(status.as_u16()),
        None => FetchError::Transport(err.to_string()),
    }
}

async fn read_success_body(response: Response) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http(status.as_u16()));
    }
    response.text().await.map_err(transport)
}

#[async_trait(?Send)]
impl DashboardApi for HttpApi {
    async fn readings(&self, scope: Scope, limit: usize) -> Result<Vec<Reading>, FetchError> {
        let body = self
            .get_text(SENSOR_DATA_PATH, scope, &[("limit", limit.to_string())])
            .await?;
        api::parse_readings(&body)
    }

    async fn active_alerts(&self, scope: Scope) -> Result<Vec<DeclaredAlert>, FetchError> {
        let body = self
            .get_text(ALERTS_PATH, scope, &[("active", "true".to_string())])
            .await?;
        api::parse_alerts(&body)
    }

    async fn map_data(&self, scope: Scope) -> Result<MapPayload, FetchError> {
        let body = self.get_text(MAP_DATA_PATH, scope, &[]).await?;
        api::parse_map(&body)
    }

    async fn threshold_severity(
        &self,
        scope: Scope,
        parameters: &[Parameter],
    ) -> Result<ThresholdSeverity, FetchError> {
        let keys: Vec<&str> = parameters.iter().map(|p| p.key()).collect();
        let body = self
            .get_text(THRESHOLD_PATH, scope, &[("parameter", keys.join(","))])
            .await?;
        api::parse_threshold_severity(&body)
    }

    async fn chart_series(
        &self,
        scope: Scope,
        parameter: Parameter,
        window: WindowSpec,
    ) -> Result<ChartSeriesPayload, FetchError> {
        let window_param = match window {
            WindowSpec::Latest { limit } => ("limit", limit.to_string()),
            WindowSpec::Days(days) => ("days", days.to_string()),
        };
        let body = self
            .get_text(
                CHART_DATA_PATH,
                scope,
                &[("type", parameter.key().to_string()), window_param],
            )
            .await?;
        api::parse_chart_series(&body)
    }

    async fn apply_thresholds(
        &self,
        scope: Scope,
        dry_run: bool,
    ) -> Result<ApplyOutcome, FetchError> {
        let body = serde_json::json!({
            "dry_run": dry_run,
            "municipality_id": scope.municipality_id,
            "barangay_id": scope.barangay_id,
        });
        let response = self
            .client
            .post(self.url(APPLY_THRESHOLDS_PATH))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(ApplyOutcome::Unauthorized);
        }
        let text = read_success_body(response).await?;
        api::parse_apply(&text)
    }
}
