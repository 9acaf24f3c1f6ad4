//! Endpoint Verification Module
//!
//! Calls every read operation once for a scope and reports which answer,
//! how much data they return, and why the others failed. Use this before
//! pointing a dashboard at a new deployment or fixture directory.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ingest::DashboardApi;
use crate::model::{FetchError, Parameter, Scope};
use crate::parameters;
use crate::series::WindowSpec;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub scope: Scope,
    pub results: Vec<EndpointVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointVerification {
    pub endpoint: String,
    pub status: VerificationStatus,
    pub item_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    /// Answered, but with no data for the scope.
    PartialSuccess,
    Failed,
}

fn verification(endpoint: &str, result: Result<usize, FetchError>) -> EndpointVerification {
    let (status, item_count, error_message) = match result {
        Ok(0) => (VerificationStatus::PartialSuccess, 0, None),
        Ok(count) => (VerificationStatus::Success, count, None),
        Err(e) => (VerificationStatus::Failed, 0, Some(e.to_string())),
    };
    EndpointVerification {
        endpoint: endpoint.to_string(),
        status,
        item_count,
        error_message,
    }
}

// ============================================================================
// Probing
// ============================================================================

/// Probes readings, alerts, map, thresholds and one chart series per
/// parameter. `apply_thresholds` is never called.
pub async fn probe_endpoints<A: DashboardApi>(api: &A, scope: Scope) -> VerificationReport {
    let mut results = Vec::new();

    results.push(verification(
        "readings",
        api.readings(scope, 10).await.map(|r| r.len()),
    ));
    results.push(verification(
        "active_alerts",
        api.active_alerts(scope).await.map(|a| a.len()),
    ));
    results.push(verification(
        "map_data",
        api.map_data(scope)
            .await
            .map(|m| m.sensors.len() + m.barangays.len()),
    ));
    results.push(verification(
        "threshold_severity",
        api.threshold_severity(scope, &parameters::threshold_request_order())
            .await
            .map(|t| t.items.len()),
    ));
    for parameter in Parameter::ALL {
        results.push(verification(
            &format!("chart_series/{}", parameter),
            api.chart_series(scope, parameter, WindowSpec::Days(7))
                .await
                .map(|c| c.labels.len()),
        ));
    }

    let working = results
        .iter()
        .filter(|r| r.status != VerificationStatus::Failed)
        .count();
    let summary = VerificationSummary {
        total: results.len(),
        working,
        failed: results.len() - working,
    };

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        scope,
        results,
        summary,
    }
}

impl VerificationReport {
    pub fn success_rate(&self) -> f64 {
        if self.summary.total > 0 {
            (self.summary.working as f64 / self.summary.total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n═══════════════════════════════════════════════════════════");
        println!("📊 ENDPOINT VERIFICATION ({})", self.scope);
        println!("═══════════════════════════════════════════════════════════");
        for result in &self.results {
            match result.status {
                VerificationStatus::Success => {
                    println!("  {:<28} ✓ OK ({} items)", result.endpoint, result.item_count)
                }
                VerificationStatus::PartialSuccess => {
                    println!("  {:<28} ⚠ Responsive but no data", result.endpoint)
                }
                VerificationStatus::Failed => println!(
                    "  {:<28} ✗ FAILED: {}",
                    result.endpoint,
                    result.error_message.as_deref().unwrap_or("Unknown")
                ),
            }
        }
        println!();
        println!(
            "Overall Success Rate: {:.1}% ({}/{})",
            self.success_rate(),
            self.summary.working,
            self.summary.total
        );
        println!("═══════════════════════════════════════════════════════════");
    }
}
