//! Bearer-token authorization collaborator

use axum::async_trait;
use efq_common::db::access;
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthorizerError {
    #[error("Authorization backend error: {0}")]
    Backend(String),
}

impl From<efq_common::Error> for AuthorizerError {
    fn from(err: efq_common::Error) -> Self {
        AuthorizerError::Backend(err.to_string())
    }
}

/// Resolves tokens to users and checks role grants
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// User id for a bearer token, or `None` when the token is unknown
    async fn resolve_user(&self, token: &str) -> Result<Option<String>, AuthorizerError>;

    async fn has_role(&self, user_id: &str, role: &str) -> Result<bool, AuthorizerError>;
}

/// Authorizer backed by the `access_tokens` and `user_roles` tables
#[derive(Clone)]
pub struct SqliteAuthorizer {
    pool: SqlitePool,
}

impl SqliteAuthorizer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Authorizer for SqliteAuthorizer {
    async fn resolve_user(&self, token: &str) -> Result<Option<String>, AuthorizerError> {
        Ok(access::resolve_token(&self.pool, token).await?)
    }

    async fn has_role(&self, user_id: &str, role: &str) -> Result<bool, AuthorizerError> {
        Ok(access::has_role(&self.pool, user_id, role).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_authorizer() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        access::create_access_tables(&pool).await.unwrap();
        access::insert_token(&pool, "tok-admin", "u1").await.unwrap();
        access::insert_token(&pool, "tok-viewer", "u2").await.unwrap();
        access::grant_role(&pool, "u1", "admin").await.unwrap();

        let authorizer = SqliteAuthorizer::new(pool);

        assert_eq!(authorizer.resolve_user("tok-admin").await.unwrap().as_deref(), Some("u1"));
        assert_eq!(authorizer.resolve_user("nope").await.unwrap(), None);
        assert!(authorizer.has_role("u1", "admin").await.unwrap());
        assert!(!authorizer.has_role("u2", "admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_tables_is_backend_error() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let authorizer = SqliteAuthorizer::new(pool);
        assert!(authorizer.resolve_user("tok").await.is_err());
    }
}
