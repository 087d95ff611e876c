//! efq-mv library interface
//!
//! Material-validation microservice: scores every emission-factor record
//! against six validation layers and reports aggregate data quality.
//! Exposed as a library so integration tests can drive the router and the
//! runner directly.

pub mod api;
pub mod error;
pub mod rules;
pub mod services;
pub mod validation;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::health::LastRunSummary;
use crate::services::ValidationRunner;

/// Build identification captured by build.rs
pub const BUILD_ID: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", ",
    env!("BUILD_PROFILE"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<ValidationRunner>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Summary of the most recent successful run
    pub last_run: Arc<RwLock<Option<LastRunSummary>>>,
    /// Failure of the most recent run
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(runner: ValidationRunner) -> Self {
        Self {
            runner: Arc::new(runner),
            startup_time: Utc::now(),
            last_run: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::validate_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
