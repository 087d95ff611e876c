//! Aggregate validation report

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::statistics::CategoryStatsMap;
use super::types::{ConfidenceLevel, MaterialValidation, Severity};
use crate::rules::SourceTier;

/// Ruleset tag reported with every run
pub const RULESET_VERSION: &str = "v1.0";

/// Maximum number of flagged materials carried in a report
pub const FLAGGED_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfidenceLevelCounts {
    pub verified: usize,
    pub documented: usize,
    pub industry_average: usize,
    pub needs_review: usize,
}

impl ConfidenceLevelCounts {
    fn record(&mut self, level: ConfidenceLevel) {
        match level {
            ConfidenceLevel::Verified => self.verified += 1,
            ConfidenceLevel::Documented => self.documented += 1,
            ConfidenceLevel::IndustryAverage => self.industry_average += 1,
            ConfidenceLevel::NeedsReview => self.needs_review += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceTierCounts {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
}

impl SourceTierCounts {
    fn record(&mut self, tier: SourceTier) {
        match tier {
            SourceTier::Tier1 => self.tier1 += 1,
            SourceTier::Tier2 => self.tier2 += 1,
            SourceTier::Tier3 => self.tier3 += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl IssueCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Per-category summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    /// All validated records of the category
    pub count: usize,
    pub avg_ef: f64,
    pub min_ef: f64,
    pub max_ef: f64,
    pub std_dev: f64,
    pub outliers: usize,
}

/// Result of one validation run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub timestamp: String,
    pub version: String,
    pub total_materials: usize,
    /// Percent, one decimal
    pub pass_rate: f64,
    pub confidence_level_counts: ConfidenceLevelCounts,
    pub source_tier_counts: SourceTierCounts,
    pub issue_counts: IssueCounts,
    pub outlier_count: usize,
    pub flagged_materials: Vec<MaterialValidation>,
    pub category_stats: BTreeMap<String, CategorySummary>,
}

impl ValidationReport {
    /// Whether a run with these counts warrants an operator alert
    pub fn exceeds_alert_threshold(&self) -> bool {
        self.issue_counts.critical > 0 || self.issue_counts.high >= 10
    }
}

/// `round(passed / total × 1000) / 10`, or 0 for an empty run
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (passed as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Fold validations into a report
///
/// Flagged materials keep validation order and are truncated to the first
/// [`FLAGGED_LIMIT`].
pub fn aggregate(
    validations: Vec<MaterialValidation>,
    stats: &CategoryStatsMap,
    timestamp: DateTime<Utc>,
) -> ValidationReport {
    let mut confidence_level_counts = ConfidenceLevelCounts::default();
    let mut source_tier_counts = SourceTierCounts::default();
    let mut issue_counts = IssueCounts::default();
    let mut outlier_count = 0;
    // category -> (records, outliers)
    let mut per_category: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for validation in &validations {
        confidence_level_counts.record(validation.confidence_level);
        source_tier_counts.record(validation.source_tier);
        for issue in &validation.issues {
            issue_counts.record(issue.severity);
        }
        if validation.is_outlier {
            outlier_count += 1;
        }

        let entry = per_category
            .entry(validation.material_category.as_str())
            .or_default();
        entry.0 += 1;
        if validation.is_outlier {
            entry.1 += 1;
        }
    }

    let category_stats = stats
        .iter()
        .map(|(category, s)| {
            let (count, outliers) = per_category
                .get(category.as_str())
                .copied()
                .unwrap_or_default();
            let summary = CategorySummary {
                count,
                avg_ef: s.mean,
                min_ef: s.min(),
                max_ef: s.max(),
                std_dev: s.std_dev,
                outliers,
            };
            (category.clone(), summary)
        })
        .collect();

    let total_materials = validations.len();
    let passed = validations
        .iter()
        .filter(|v| v.confidence_level.is_passing())
        .count();
    let pass_rate = pass_rate(passed, total_materials);

    let flagged_materials = validations
        .into_iter()
        .filter(MaterialValidation::is_flagged)
        .take(FLAGGED_LIMIT)
        .collect();

    ValidationReport {
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        version: RULESET_VERSION.to_string(),
        total_materials,
        pass_rate,
        confidence_level_counts,
        source_tier_counts,
        issue_counts,
        outlier_count,
        flagged_materials,
        category_stats,
    }
}
