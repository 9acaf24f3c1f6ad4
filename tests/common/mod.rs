//! Scripted in-memory read API shared by the integration tests.
//!
//! Responses are JSON bodies run through the same parsers as the live
//! client. Operations marked as gated do not answer on their own: each call
//! parks on a oneshot channel until the test releases it, which lets a test
//! choose the order in which concurrent responses arrive.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::oneshot;

use flomon_dashboard::ingest::api::{self, ApplyOutcome, ChartSeriesPayload, MapPayload};
use flomon_dashboard::ingest::DashboardApi;
use flomon_dashboard::model::{
    DeclaredAlert, FetchError, Parameter, Reading, Scope, ThresholdSeverity,
};
use flomon_dashboard::series::WindowSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Readings,
    Alerts,
    Map,
    Thresholds,
    Chart(Parameter),
    Apply,
}

pub struct Pending {
    pub op: Op,
    pub scope: Scope,
    reply: oneshot::Sender<Result<String, FetchError>>,
}

#[derive(Default)]
pub struct ScriptedApi {
    responses: RefCell<HashMap<(Op, Scope), Result<String, FetchError>>>,
    gated: RefCell<HashSet<Op>>,
    pending: RefCell<Vec<Pending>>,
    calls: RefCell<Vec<(Op, Scope)>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body (or error) returned for `op` at exactly `scope`.
    /// Unscripted calls answer `Http(404)`.
    pub fn respond(&self, op: Op, scope: Scope, response: Result<&str, FetchError>) {
        self.responses
            .borrow_mut()
            .insert((op, scope), response.map(str::to_string));
    }

    pub fn gate(&self, op: Op) {
        self.gated.borrow_mut().insert(op);
    }

    pub fn calls(&self) -> Vec<(Op, Scope)> {
        self.calls.borrow().clone()
    }

    pub fn calls_for(&self, op: Op) -> Vec<Scope> {
        self.calls
            .borrow()
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Answers the `index`-th parked call (in call order among those still
    /// parked).
    pub fn release(&self, index: usize, response: Result<&str, FetchError>) {
        let pending = self.pending.borrow_mut().remove(index);
        let _ = pending.reply.send(response.map(str::to_string));
    }

    /// Answers every parked call for `op` with `response`.
    pub fn release_all(&self, op: Op, response: Result<&str, FetchError>) {
        let mut pending = self.pending.borrow_mut();
        let (matching, rest): (Vec<_>, Vec<_>) = pending.drain(..).partition(|p| p.op == op);
        *pending = rest;
        drop(pending);
        for p in matching {
            let _ = p.reply.send(response.clone().map(str::to_string));
        }
    }

    async fn call(&self, op: Op, scope: Scope) -> Result<String, FetchError> {
        self.calls.borrow_mut().push((op, scope));

        let gated = self.gated.borrow().contains(&op);
        if gated {
            let (reply, rx) = oneshot::channel();
            self.pending.borrow_mut().push(Pending { op, scope, reply });
            return rx
                .await
                .unwrap_or_else(|_| Err(FetchError::Transport("reply dropped".to_string())));
        }

        self.responses
            .borrow()
            .get(&(op, scope))
            .cloned()
            .unwrap_or(Err(FetchError::Http(404)))
    }
}

#[async_trait(?Send)]
impl DashboardApi for ScriptedApi {
    async fn readings(&self, scope: Scope, limit: usize) -> Result<Vec<Reading>, FetchError> {
        let mut readings = api::parse_readings(&self.call(Op::Readings, scope).await?)?;
        readings.truncate(limit);
        Ok(readings)
    }

    async fn active_alerts(&self, scope: Scope) -> Result<Vec<DeclaredAlert>, FetchError> {
        api::parse_alerts(&self.call(Op::Alerts, scope).await?)
    }

    async fn map_data(&self, scope: Scope) -> Result<MapPayload, FetchError> {
        api::parse_map(&self.call(Op::Map, scope).await?)
    }

    async fn threshold_severity(
        &self,
        scope: Scope,
        _parameters: &[Parameter],
    ) -> Result<ThresholdSeverity, FetchError> {
        api::parse_threshold_severity(&self.call(Op::Thresholds, scope).await?)
    }

    async fn chart_series(
        &self,
        scope: Scope,
        parameter: Parameter,
        _window: WindowSpec,
    ) -> Result<ChartSeriesPayload, FetchError> {
        api::parse_chart_series(&self.call(Op::Chart(parameter), scope).await?)
    }

    async fn apply_thresholds(
        &self,
        scope: Scope,
        _dry_run: bool,
    ) -> Result<ApplyOutcome, FetchError> {
        match self.call(Op::Apply, scope).await {
            Ok(body) => api::parse_apply(&body),
            Err(e) if e.is_auth_rejection() => Ok(ApplyOutcome::Unauthorized),
            Err(e) => Err(e),
        }
    }
}

/// A fixed "now" used across tests: 2024-05-01 13:00:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
}

/// Lets every other branch of a `join!` run until it parks again.
pub async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

pub fn map_body(sensor_ids: &[u64]) -> String {
    let sensors: Vec<String> = sensor_ids.iter().map(|id| format!("{{\"id\": {}}}", id)).collect();
    format!(
        "{{\"zones\": [], \"sensors\": [{}], \"barangays\": []}}",
        sensors.join(", ")
    )
}

pub const EMPTY_MAP: &str = r#"{"zones": [{"id": 1}], "sensors": [], "barangays": []}"#;
pub const EMPTY_LIST: &str = r#"{"results": []}"#;
