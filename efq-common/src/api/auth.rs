//! Caller credential helpers
//!
//! Three caller classes may start a validation run:
//! - Internal trusted service presenting the configured service key as a bearer token
//! - Scheduler presenting `{"scheduled": true}` in the request body
//! - Interactive user whose bearer token resolves to an account holding the admin role
//!
//! # Pure Functions
//!
//! Token resolution and role lookup live behind the service's `Authorizer`
//! collaborator. This module only parses and compares credentials.

use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Role required for interactive callers
pub const ADMIN_ROLE: &str = "admin";

/// Accepted caller, as established during authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerClass {
    /// Bearer token equal to the configured service key
    InternalService,
    /// Scheduled (cron) invocation flagged in the request body
    Scheduled,
    /// Interactive user holding the admin role
    Admin { user_id: String },
}

impl CallerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerClass::InternalService => "internal",
            CallerClass::Scheduled => "scheduled",
            CallerClass::Admin { .. } => "admin",
        }
    }
}

/// Optional JSON body of a run request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunRequestBody {
    #[serde(default)]
    pub scheduled: bool,
}

impl RunRequestBody {
    /// Parse a request body leniently
    ///
    /// An empty or malformed body is treated as a manual (non-scheduled) request.
    ///
    /// # Examples
    ///
    /// ```
    /// use efq_common::api::RunRequestBody;
    ///
    /// assert!(RunRequestBody::from_bytes(br#"{"scheduled": true}"#).scheduled);
    /// assert!(!RunRequestBody::from_bytes(b"").scheduled);
    /// assert!(!RunRequestBody::from_bytes(b"not json").scheduled);
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(bytes).unwrap_or_default()
    }
}

/// Extract the token from an `Authorization` header value
///
/// Strips a leading `Bearer` scheme when present. Returns `None` for a
/// missing or blank header, including a bare `Bearer` scheme.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let raw = header?.trim();
    let token = match raw.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => raw,
    };
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Compare a presented token with the configured service key
///
/// Both sides are hashed first so the comparison time does not depend on
/// the length of the common prefix. An unset or blank key never matches.
pub fn service_key_matches(presented: &str, configured: Option<&str>) -> bool {
    let Some(configured) = configured.filter(|k| !k.trim().is_empty()) else {
        return false;
    };

    let presented_digest = Sha256::digest(presented.as_bytes());
    let configured_digest = Sha256::digest(configured.as_bytes());

    presented_digest
        .iter()
        .zip(configured_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
