/// Read-API access for the dashboard.
///
/// Submodules:
/// - `api`  — the `DashboardApi` capability and wire payload parsing.
/// - `http` — reqwest-backed implementation against the live service.

pub mod api;
pub mod http;

pub use api::{ApplyOutcome, ChartSeriesPayload, DashboardApi, MapPayload};
pub use http::HttpApi;
