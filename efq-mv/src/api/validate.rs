//! Validation run endpoint

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use efq_common::api::RunRequestBody;
use tracing::{error, warn};

use crate::api::health::LastRunSummary;
use crate::error::{ApiError, ApiResult};
use crate::services::{RunError, RunRequest};
use crate::validation::ValidationReport;
use crate::AppState;

/// POST /api/validate
///
/// Runs a full validation over every record and returns the report.
/// The body is optional; `{"scheduled": true}` marks a scheduler call.
pub async fn run_validation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ValidationReport>> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request = RunRequest::new(authorization, RunRequestBody::from_bytes(&body));

    match state.runner.run(request).await {
        Ok(report) => {
            *state.last_run.write().await = Some(LastRunSummary::from(&report));
            *state.last_error.write().await = None;
            Ok(Json(report))
        }
        Err(e) => {
            match &e {
                RunError::Unauthorized(_) | RunError::Forbidden => {
                    warn!(error = %e, "Validation request rejected");
                }
                _ => {
                    error!(error = %e, "Validation run failed");
                    *state.last_error.write().await = Some(e.to_string());
                }
            }
            Err(ApiError::from(e))
        }
    }
}

/// Build validation routes
pub fn validate_routes() -> Router<AppState> {
    Router::new().route("/api/validate", post(run_validation))
}
