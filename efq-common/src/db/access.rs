//! Access-token and role lookups
//!
//! Backing tables for the SQLite authorization adapter:
//! - `access_tokens(token, user_id)`: issued bearer tokens
//! - `user_roles(user_id, role)`: role grants

use sqlx::SqlitePool;

use crate::Result;

/// Resolve a bearer token to its user id
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> Result<Option<String>> {
    let user_id: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM access_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;
    Ok(user_id)
}

/// Check whether a user holds a role
pub async fn has_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM user_roles WHERE user_id = ? AND role = ? LIMIT 1")
            .bind(user_id)
            .bind(role)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Create the access tables (fixtures and tests only)
pub async fn create_access_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            PRIMARY KEY (user_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Issue a token for a user (fixtures and tests only)
pub async fn insert_token(pool: &SqlitePool, token: &str, user_id: &str) -> Result<()> {
    sqlx::query("INSERT INTO access_tokens (token, user_id) VALUES (?, ?)")
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Grant a role (fixtures and tests only)
pub async fn grant_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}
