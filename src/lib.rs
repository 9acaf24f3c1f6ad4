/// Flood monitoring dashboard core.
///
/// Polls the monitoring service's read API and reconciles sensor readings,
/// declared alerts, map layers and per-parameter trend series into one view
/// model that stays consistent under concurrent polling, out-of-order
/// responses and partial failures.
///
/// Layout:
/// - `model`, `parameters` — shared types and the parameter registry
/// - `series`              — alignment, range filtering and scaling of chart data
/// - `scope`               — barangay → municipality → global fallback
/// - `alert`               — threshold checks, staleness, severity reconciliation
/// - `fence`, `refresh`    — last-issued-wins commits and the refresh loop
/// - `ingest`, `dev_mode`  — live and fixture-backed read API
/// - `config`, `logging`, `verify` — ambient setup and diagnostics

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dev_mode;
pub mod fence;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod parameters;
pub mod refresh;
pub mod scope;
pub mod series;
pub mod verify;

pub use config::{load_config, DashboardConfig};
pub use ingest::DashboardApi;
pub use model::{DataKind, FetchError, Scope, SeverityLevel};
pub use refresh::{Command, RefreshOrchestrator, RefreshOutcome, ViewModel};
