//! efq-mv - Material Validation microservice
//!
//! **Module Identity:**
//! - Name: efq-mv (Material Validation)
//! - Port: 5760 (default)
//!
//! Runs the six-layer emission-factor validation over the reference database
//! on request (admin user, internal service or scheduler) and returns an
//! aggregate quality report. Alerts the operator by email when a run finds
//! critical issues or ten or more high issues.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use efq_common::config::{self, TomlConfig};
use efq_common::db::{self, materials, pagination::DEFAULT_BATCH_SIZE};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use efq_mv::rules::load_rules;
use efq_mv::services::{
    EmailSender, NotificationDispatcher, ResendClient, RunnerConfig, SqliteAuthorizer,
    SqliteMaterialStore, ValidationRunner,
};
use efq_mv::validation::MaterialValidator;
use efq_mv::{build_router, AppState, BUILD_ID};

const DEFAULT_PORT: u16 = 5760;
const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;

/// Command-line arguments for efq-mv
#[derive(Parser, Debug)]
#[command(name = "efq-mv")]
#[command(about = "Material emission-factor validation microservice")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "EFQ_MV_PORT")]
    port: Option<u16>,

    /// TOML config file (falls back to EFQ_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite record store
    #[arg(short, long, env = "EFQ_DATABASE")]
    database: Option<PathBuf>,

    /// Internal trusted-service credential (falls back to EFQ_SERVICE_KEY, then TOML)
    #[arg(long)]
    service_key: Option<String>,

    /// Recipient of threshold alerts
    #[arg(long, env = "EFQ_OPERATOR_EMAIL")]
    operator_email: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first so its log level can seed the filter; the outcome is logged below
    let (toml_config, config_source) = TomlConfig::load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting efq-mv (Material Validation) microservice");
    info!("Build: {}", BUILD_ID);
    config_source.log();

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let db_path = args
        .database
        .clone()
        .or_else(|| toml_config.database_path.clone())
        .unwrap_or_else(config::default_database_path);
    info!("Database: {}", db_path.display());

    let service_key = args
        .service_key
        .clone()
        .filter(|k| config::is_valid_key(k))
        .or_else(|| {
            config::resolve_secret(
                "Service key",
                "EFQ_SERVICE_KEY",
                toml_config.service_key.as_deref(),
            )
        });
    if service_key.is_none() {
        warn!("No service key configured; internal service calls will be rejected");
    }

    let (ranges, tiers) = load_rules(&toml_config).context("Invalid rule configuration")?;
    info!(
        "Rules: {} range categories, {} source tier patterns",
        ranges.categories().count(),
        tiers.len()
    );

    let pool = db::connect_readonly(&db_path).await?;
    match materials::count(&pool).await {
        Ok(total) => info!("Record store holds {} materials", total),
        Err(e) => warn!("Could not count materials: {}", e),
    }

    let notifier = build_notifier(&args, &toml_config);

    let runner_config = RunnerConfig {
        batch_size: toml_config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        service_key,
        notify_timeout: Duration::from_millis(
            toml_config
                .notify_timeout_ms
                .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_MS),
        ),
    };

    let runner = ValidationRunner::new(
        Arc::new(SqliteMaterialStore::new(pool.clone())),
        Arc::new(SqliteAuthorizer::new(pool)),
        Arc::new(notifier),
        MaterialValidator::new(ranges, tiers),
        runner_config,
    );

    let app = build_router(AppState::new(runner));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Alert dispatcher; email is disabled when no Resend key is configured
fn build_notifier(args: &Args, toml_config: &TomlConfig) -> NotificationDispatcher {
    let notification = &toml_config.notification;

    let sender: Option<Arc<dyn EmailSender>> = match config::resolve_secret(
        "Resend API key",
        "EFQ_RESEND_API_KEY",
        notification.resend_api_key.as_deref(),
    ) {
        Some(key) => match ResendClient::new(key) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Failed to create email client: {}", e);
                None
            }
        },
        None => {
            warn!("Resend API key not configured; alert emails disabled");
            None
        }
    };

    let operator_email = args
        .operator_email
        .clone()
        .or_else(|| notification.operator_email.clone());

    NotificationDispatcher::new(sender, operator_email, notification.from.clone())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
