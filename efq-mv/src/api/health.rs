//! Health check endpoint
//!
//! Reports liveness plus the outcome of the most recent validation run, so a
//! scheduler can tell a quiet service from one whose runs keep failing.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::validation::ValidationReport;
use crate::AppState;

/// Headline figures of the last successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastRunSummary {
    pub timestamp: String,
    pub total_materials: usize,
    pub pass_rate: f64,
    pub critical_issues: usize,
    pub high_issues: usize,
}

impl From<&ValidationReport> for LastRunSummary {
    fn from(report: &ValidationReport) -> Self {
        Self {
            timestamp: report.timestamp.clone(),
            total_materials: report.total_materials,
            pass_rate: report.pass_rate,
            critical_issues: report.issue_counts.critical,
            high_issues: report.issue_counts.high,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" while the most recent run has failed
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<LastRunSummary>,
    /// Failure of the most recent run, cleared by the next successful run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let last_run = state.last_run.read().await.clone();
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: if last_error.is_some() { "degraded" } else { "ok" },
        module: "efq-mv",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        last_run,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
