//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions and shared types.
//! No HTTP framework dependencies (Axum, etc.); services wrap these
//! with their own handlers.

pub mod auth;

pub use auth::{bearer_token, service_key_matches, CallerClass, RunRequestBody};
