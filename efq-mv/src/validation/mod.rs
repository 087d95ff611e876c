//! Validation pipeline stages
//!
//! Statistics, per-record validation and report aggregation are pure and
//! run in that order. Validation takes the finished statistics map, so the
//! statistics pass always completes first.

pub mod report;
pub mod statistics;
pub mod types;
pub mod validator;

pub use report::{
    aggregate, pass_rate, CategorySummary, ConfidenceLevelCounts, IssueCounts, SourceTierCounts,
    ValidationReport, FLAGGED_LIMIT, RULESET_VERSION,
};
pub use statistics::{compute_category_stats, CategoryStats, CategoryStatsMap};
pub use types::{
    ConfidenceColor, ConfidenceLevel, IssueCode, IssueValue, MaterialValidation, Severity,
    ValidationIssue,
};
pub use validator::{MaterialValidator, OUTLIER_Z_THRESHOLD};
