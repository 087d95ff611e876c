//! Validation run orchestration
//!
//! A run progresses through fixed states:
//! AUTHORIZING → FETCHING → COMPUTING_STATS → VALIDATING → AGGREGATING →
//! NOTIFYING → DONE
//!
//! Only authorization and fetching can fail a run. Statistics, validation and
//! aggregation are pure and run on the blocking pool; they reach FAILED only
//! if a stage panics and its blocking task returns a join error. Notification is
//! best-effort; its outcome is logged and never changes the report.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use efq_common::api::auth::ADMIN_ROLE;
use efq_common::api::{bearer_token, service_key_matches, CallerClass, RunRequestBody};
use efq_common::db::BatchCursor;
use efq_common::MaterialRecord;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::authorizer::Authorizer;
use super::notifier::{NotificationOutcome, NotificationPort};
use super::store::{MaterialStore, StoreError};
use crate::validation::{aggregate, compute_category_stats, MaterialValidator, ValidationReport};

/// Default upper bound on the notification step
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Run workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Authorizing,
    Fetching,
    ComputingStats,
    Validating,
    Aggregating,
    Notifying,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Authorizing => "AUTHORIZING",
            RunState::Fetching => "FETCHING",
            RunState::ComputingStats => "COMPUTING_STATS",
            RunState::Validating => "VALIDATING",
            RunState::Aggregating => "AGGREGATING",
            RunState::Notifying => "NOTIFYING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// States visited by one run, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTrace {
    states: Vec<RunState>,
}

impl RunTrace {
    fn new() -> Self {
        Self {
            states: vec![RunState::Authorizing],
        }
    }

    fn transition_to(&mut self, new_state: RunState) {
        let old_state = self.state();
        debug!(from = old_state.as_str(), to = new_state.as_str(), "Run state transition");
        self.states.push(new_state);
    }

    pub fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Authorizing)
    }

    pub fn states(&self) -> &[RunState] {
        &self.states
    }
}

/// Incoming run request
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Raw `Authorization` header value
    pub authorization: Option<String>,
    pub body: RunRequestBody,
}

impl RunRequest {
    pub fn new(authorization: Option<String>, body: RunRequestBody) -> Self {
        Self {
            authorization,
            body,
        }
    }

    pub fn scheduled() -> Self {
        Self::new(None, RunRequestBody { scheduled: true })
    }

    pub fn with_bearer(token: &str) -> Self {
        Self::new(Some(format!("Bearer {}", token)), RunRequestBody::default())
    }
}

/// Run failure
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Admin access required")]
    Forbidden,

    #[error("Fetch failed: {0}")]
    Fetch(#[from] StoreError),

    #[error("Processing failed: {0}")]
    Processing(String),
}

/// Tunables for a runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub batch_size: usize,
    /// Internal trusted-service credential; `None` disables that caller class
    pub service_key: Option<String>,
    pub notify_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: efq_common::db::pagination::DEFAULT_BATCH_SIZE,
            service_key: None,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

/// Source of the run timestamp
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives one validation run per call; holds no state between runs
#[derive(Clone)]
pub struct ValidationRunner {
    store: Arc<dyn MaterialStore>,
    authorizer: Arc<dyn Authorizer>,
    notifier: Arc<dyn NotificationPort>,
    validator: Arc<MaterialValidator>,
    config: RunnerConfig,
    clock: Clock,
}

impl ValidationRunner {
    pub fn new(
        store: Arc<dyn MaterialStore>,
        authorizer: Arc<dyn Authorizer>,
        notifier: Arc<dyn NotificationPort>,
        validator: MaterialValidator,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            authorizer,
            notifier,
            validator: Arc::new(validator),
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (fixed clocks make runs reproducible)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run and return only the result
    pub async fn run(&self, request: RunRequest) -> Result<ValidationReport, RunError> {
        self.run_traced(request).await.1
    }

    /// Run and also return the visited states
    pub async fn run_traced(
        &self,
        request: RunRequest,
    ) -> (RunTrace, Result<ValidationReport, RunError>) {
        let mut trace = RunTrace::new();
        let result = self.execute(&request, &mut trace).await;
        if result.is_err() {
            trace.transition_to(RunState::Failed);
        }
        (trace, result)
    }

    async fn execute(
        &self,
        request: &RunRequest,
        trace: &mut RunTrace,
    ) -> Result<ValidationReport, RunError> {
        let caller = self.authorize(request).await?;
        info!(caller = caller.as_str(), "Starting full validation");

        trace.transition_to(RunState::Fetching);
        let records = self.fetch_all().await?;

        // One timestamp per run: expiry checks and the report share it
        let now = (self.clock)();
        let validator = Arc::clone(&self.validator);

        trace.transition_to(RunState::ComputingStats);
        let stats = tokio::task::spawn_blocking(move || {
            let stats = compute_category_stats(&records);
            (records, stats)
        });
        let (records, stats) = stats
            .await
            .map_err(|e| RunError::Processing(e.to_string()))?;

        trace.transition_to(RunState::Validating);
        let validations = tokio::task::spawn_blocking({
            let stats = stats.clone();
            move || validator.validate_all(&records, &stats, now)
        })
        .await
        .map_err(|e| RunError::Processing(e.to_string()))?;

        trace.transition_to(RunState::Aggregating);
        let report = tokio::task::spawn_blocking(move || aggregate(validations, &stats, now))
            .await
            .map_err(|e| RunError::Processing(e.to_string()))?;

        info!(
            total = report.total_materials,
            pass_rate = report.pass_rate,
            critical = report.issue_counts.critical,
            high = report.issue_counts.high,
            outliers = report.outlier_count,
            "Validation complete"
        );

        trace.transition_to(RunState::Notifying);
        self.notify(&report).await;

        trace.transition_to(RunState::Done);
        Ok(report)
    }

    /// Classify the caller or reject the request
    pub async fn authorize(&self, request: &RunRequest) -> Result<CallerClass, RunError> {
        let token = bearer_token(request.authorization.as_deref());

        if let Some(token) = token {
            if service_key_matches(token, self.config.service_key.as_deref()) {
                info!("Internal service call");
                return Ok(CallerClass::InternalService);
            }
        }

        if request.body.scheduled {
            info!("Scheduled run");
            return Ok(CallerClass::Scheduled);
        }

        let Some(token) = token else {
            return Err(RunError::Unauthorized("Missing authorization header".to_string()));
        };

        let user_id = match self.authorizer.resolve_user(token).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return Err(RunError::Unauthorized("Unauthorized".to_string())),
            Err(e) => {
                warn!(error = %e, "Token resolution failed");
                return Err(RunError::Unauthorized("Unauthorized".to_string()));
            }
        };

        match self.authorizer.has_role(&user_id, ADMIN_ROLE).await {
            Ok(true) => {
                let short: String = user_id.chars().take(8).collect();
                info!(user = %short, "Admin run");
                Ok(CallerClass::Admin { user_id })
            }
            Ok(false) => Err(RunError::Forbidden),
            Err(e) => {
                warn!(error = %e, "Role lookup failed");
                Err(RunError::Forbidden)
            }
        }
    }

    /// Read every record, page by page
    async fn fetch_all(&self) -> Result<Vec<MaterialRecord>, RunError> {
        let mut cursor = BatchCursor::new(self.config.batch_size);
        let mut records = Vec::new();

        loop {
            let batch = self
                .store
                .fetch_page(cursor.offset(), cursor.batch_size())
                .await
                .inspect_err(|e| warn!(offset = cursor.offset(), error = %e, "Fetch error"))?;

            let fetched = batch.len();
            records.extend(batch);
            debug!(fetched = records.len(), "Fetched materials");

            if !cursor.advance(fetched) {
                break;
            }
        }

        info!(total = records.len(), "Total materials fetched");
        Ok(records)
    }

    async fn notify(&self, report: &ValidationReport) {
        match tokio::time::timeout(self.config.notify_timeout, self.notifier.notify(report)).await {
            Ok(NotificationOutcome::Sent) => info!("Alert notification sent"),
            Ok(NotificationOutcome::Skipped(reason)) => debug!(reason = %reason, "Alert notification skipped"),
            Ok(NotificationOutcome::Failed(reason)) => warn!(reason = %reason, "Alert notification failed"),
            Err(_) => warn!(
                timeout_ms = self.config.notify_timeout.as_millis() as u64,
                "Alert notification timed out"
            ),
        }
    }
}
