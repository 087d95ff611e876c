//! Database access layer
//!
//! The record store is read-only for EFQ services. Table helpers that create
//! schema exist for fixtures and tests.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

pub mod access;
pub mod materials;
pub mod pagination;

pub use pagination::BatchCursor;

/// Connect to the record store in read-only mode
///
/// Uses SQLite `mode=ro` so no write can reach the material table.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {}\nRun the material import first to populate it.",
            db_path.display()
        );
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());

    let pool = SqlitePool::connect(&db_url)
        .await
        .context("Failed to connect to database in read-only mode")?;

    tracing::debug!("Connected to {} (read-only)", db_path.display());

    Ok(pool)
}
