//! # EFQ Common Library
//!
//! Shared code for the emission-factor quality services:
//! - Material record model
//! - Read-only record store access (paginated)
//! - Bearer credential helpers
//! - Configuration loading
//! - Common error type

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::MaterialRecord;
