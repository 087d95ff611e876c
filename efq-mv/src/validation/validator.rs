//! Six-layer material validator
//!
//! Each record is scored independently against a finished statistics
//! snapshot. Layers run in fixed order:
//!
//! 1. Data integrity (missing/negative factor, missing unit)
//! 2. EPD registry verification (tier-1 sources only)
//! 3. Range validation against reference bands
//! 4. Unit consistency against the bands' declared units
//! 5. Source credibility tier
//! 6. Statistical outlier detection (z-score > 2)
//!
//! Confidence starts at `verified`. A downgrade only applies while the
//! record is still `verified`, so the first downgrade wins; Layer 1 forces
//! `needs_review` unconditionally. Bad data becomes issues, never errors.

use chrono::{DateTime, NaiveTime, Utc};
use efq_common::MaterialRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::statistics::CategoryStatsMap;
use super::types::{
    ConfidenceLevel, IssueCode, IssueValue, MaterialValidation, Severity, ValidationIssue,
};
use crate::rules::{normalize_unit, RangeTable, SourceTier, SourceTierTable};

/// EPD Australasia registration number prefix
static EPD_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S-P-\d{5}").expect("Invalid EPD number regex"));

/// z-score above which a factor is a statistical outlier
pub const OUTLIER_Z_THRESHOLD: f64 = 2.0;

/// Working state while the layers run
struct Assessment {
    confidence: ConfidenceLevel,
    is_outlier: bool,
    outlier_reason: Option<String>,
    issues: Vec<ValidationIssue>,
}

impl Assessment {
    fn new() -> Self {
        Self {
            confidence: ConfidenceLevel::Verified,
            is_outlier: false,
            outlier_reason: None,
            issues: Vec::new(),
        }
    }

    /// Apply a downgrade only while still verified
    fn downgrade(&mut self, level: ConfidenceLevel) {
        if self.confidence == ConfidenceLevel::Verified {
            self.confidence = level;
        }
    }

    fn force_review(&mut self) {
        self.confidence = ConfidenceLevel::NeedsReview;
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

/// Scores records against the range and source-tier tables
#[derive(Debug, Clone, Default)]
pub struct MaterialValidator {
    ranges: RangeTable,
    tiers: SourceTierTable,
}

impl MaterialValidator {
    pub fn new(ranges: RangeTable, tiers: SourceTierTable) -> Self {
        Self { ranges, tiers }
    }

    /// Validate every record, preserving input order
    ///
    /// Takes the finished statistics map, so it cannot run before the
    /// statistics pass is complete.
    pub fn validate_all(
        &self,
        records: &[MaterialRecord],
        stats: &CategoryStatsMap,
        now: DateTime<Utc>,
    ) -> Vec<MaterialValidation> {
        records
            .iter()
            .map(|record| self.validate(record, stats, now))
            .collect()
    }

    /// Validate one record
    pub fn validate(
        &self,
        record: &MaterialRecord,
        stats: &CategoryStatsMap,
        now: DateTime<Utc>,
    ) -> MaterialValidation {
        let tier = self.tiers.classify(record.data_source.as_deref());
        let mut assessment = Assessment::new();

        self.check_integrity(record, &mut assessment);
        if tier == SourceTier::Tier1 {
            self.check_registry(record, now, &mut assessment);
        }
        self.check_range(record, &mut assessment);
        self.check_unit(record, &mut assessment);
        self.check_source(record, tier, &mut assessment);
        self.check_outlier(record, stats, &mut assessment);

        if !assessment.issues.is_empty() {
            debug!(
                material_id = %record.id,
                issues = assessment.issues.len(),
                confidence = assessment.confidence.as_str(),
                "Material has validation issues"
            );
        }

        MaterialValidation {
            id: record.id.clone(),
            material_name: record.material_name.clone(),
            material_category: record.material_category.clone(),
            ef_total: record.ef_total,
            unit: record.unit.clone(),
            data_source: record.data_source.clone(),
            epd_number: record.epd_number.clone(),
            manufacturer: record.manufacturer.clone(),
            state: record.state.clone(),
            expiry_date: record.expiry_date,
            confidence_level: assessment.confidence,
            source_tier: tier,
            is_outlier: assessment.is_outlier,
            outlier_reason: assessment.outlier_reason,
            issues: assessment.issues,
        }
    }

    /// Layer 1
    fn check_integrity(&self, record: &MaterialRecord, a: &mut Assessment) {
        match record.ef_total {
            None => {
                a.push(ValidationIssue::new(
                    Severity::Critical,
                    IssueCode::NullEfTotal,
                    record,
                    "Missing emission factor value",
                    "Remove from database or correct source data",
                ));
                a.force_review();
            }
            Some(ef) if ef < 0.0 => {
                a.push(
                    ValidationIssue::new(
                        Severity::Critical,
                        IssueCode::NegativeFactor,
                        record,
                        format!("Negative carbon factor: {}", ef),
                        "Remove from database immediately",
                    )
                    .with_value(IssueValue::Number(ef)),
                );
                a.force_review();
            }
            Some(_) => {}
        }

        if record.unit_trimmed().is_none() {
            a.push(ValidationIssue::new(
                Severity::Critical,
                IssueCode::MissingUnit,
                record,
                "Missing unit field",
                "Add unit from EPD source",
            ));
            a.force_review();
        }
    }

    /// Layer 2, tier-1 records only
    fn check_registry(&self, record: &MaterialRecord, now: DateTime<Utc>, a: &mut Assessment) {
        match record.epd_number.as_deref().filter(|n| !n.is_empty()) {
            Some(number) if !EPD_NUMBER_REGEX.is_match(number) => {
                a.push(
                    ValidationIssue::new(
                        Severity::Medium,
                        IssueCode::InvalidEpdFormat,
                        record,
                        format!("Invalid EPD format: {}", number),
                        "Verify EPD registration format (S-P-XXXXX)",
                    )
                    .with_value(IssueValue::Text(number.to_string())),
                );
            }
            Some(_) => {}
            None => {
                a.push(ValidationIssue::new(
                    Severity::High,
                    IssueCode::MissingEpdNumber,
                    record,
                    "EPD-sourced material missing registration number",
                    "Verify with EPD Australasia registry",
                ));
                a.downgrade(ConfidenceLevel::Documented);
            }
        }

        if let Some(expiry) = record.expiry_date {
            // Expired once the run clock passes the start of the expiry day (UTC)
            if expiry.and_time(NaiveTime::MIN).and_utc() < now {
                let date = expiry.format("%Y-%m-%d").to_string();
                a.push(
                    ValidationIssue::new(
                        Severity::High,
                        IssueCode::ExpiredEpd,
                        record,
                        format!("EPD expired on {}", date),
                        "Replace with current EPD version",
                    )
                    .with_value(IssueValue::Text(date)),
                );
                a.downgrade(ConfidenceLevel::Documented);
            }
        }
    }

    /// Layer 3
    fn check_range(&self, record: &MaterialRecord, a: &mut Assessment) {
        let Some(ef) = record.ef_total.filter(|ef| *ef > 0.0) else {
            return;
        };
        let Some(range) = self.ranges.merged(&record.material_category) else {
            return;
        };

        if ef > range.max * self.ranges.upper_tolerance() {
            let pct = (ef - range.max) / range.max * 100.0;
            a.push(
                ValidationIssue::new(
                    Severity::High,
                    IssueCode::AboveNabersRange,
                    record,
                    format!(
                        "Value {} is {:.1}% above expected range (max {})",
                        ef, pct, range.max
                    ),
                    "Verify with manufacturer EPD or check grid/regional context",
                )
                .with_value(IssueValue::Number(ef))
                .with_expected_range(range.display()),
            );
            a.is_outlier = true;
            a.outlier_reason = Some(format!("{:.1}% above NABERS maximum", pct));
            a.downgrade(ConfidenceLevel::Documented);
        } else if range.min > 0.0 && ef < range.min * self.ranges.lower_tolerance() {
            let pct = (range.min - ef) / range.min * 100.0;
            a.push(
                ValidationIssue::new(
                    Severity::High,
                    IssueCode::BelowNabersRange,
                    record,
                    format!(
                        "Value {} is {:.1}% below expected range (min {})",
                        ef, pct, range.min
                    ),
                    "Verify recycled content or source documentation",
                )
                .with_value(IssueValue::Number(ef))
                .with_expected_range(range.display()),
            );
            a.is_outlier = true;
            a.outlier_reason = Some(format!("{:.1}% below NABERS minimum", pct));
            a.downgrade(ConfidenceLevel::Documented);
        }
    }

    /// Layer 4
    fn check_unit(&self, record: &MaterialRecord, a: &mut Assessment) {
        let Some(unit) = record.unit_trimmed() else {
            return;
        };
        let expected = self.ranges.expected_units(&record.material_category);
        if expected.is_empty() {
            return;
        }

        let normalized = normalize_unit(unit);
        if expected.iter().any(|u| normalized.contains(u.as_str())) {
            return;
        }

        let expected = expected.join(", ");
        a.push(
            ValidationIssue::new(
                Severity::Low,
                IssueCode::UnitMismatch,
                record,
                format!(
                    "Unit '{}' does not match expected unit for {} ({})",
                    unit, record.material_category, expected
                ),
                "Confirm declared unit against EPD source",
            )
            .with_value(IssueValue::Text(unit.to_string()))
            .with_expected_range(expected),
        );
    }

    /// Layer 5
    fn check_source(&self, record: &MaterialRecord, tier: SourceTier, a: &mut Assessment) {
        match tier {
            SourceTier::Tier1 => {}
            SourceTier::Tier2 => a.downgrade(ConfidenceLevel::IndustryAverage),
            SourceTier::Tier3 => {
                let source = record
                    .data_source
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .unwrap_or("null");
                a.push(
                    ValidationIssue::new(
                        Severity::Medium,
                        IssueCode::Tier3Source,
                        record,
                        format!("Unknown source requires verification: {}", source),
                        "Document source credibility or replace with Tier 1/2 source",
                    )
                    .with_value(IssueValue::Text(source.to_string())),
                );
                a.downgrade(ConfidenceLevel::Documented);
            }
        }
    }

    /// Layer 6
    fn check_outlier(&self, record: &MaterialRecord, stats: &CategoryStatsMap, a: &mut Assessment) {
        let Some(ef) = record.ef_total else {
            return;
        };
        let Some(category) = stats.get(&record.material_category) else {
            return;
        };
        let Some(z) = category.z_score(ef) else {
            return;
        };

        if z > OUTLIER_Z_THRESHOLD {
            a.push(
                ValidationIssue::new(
                    Severity::Medium,
                    IssueCode::StatisticalOutlier,
                    record,
                    format!(
                        "Value {} is {:.1}σ from category mean ({:.1})",
                        ef, z, category.mean
                    ),
                    "Investigate regional/manufacturing variations",
                )
                .with_value(IssueValue::Number(ef))
                .with_expected_range(format!(
                    "{:.1}-{:.1}",
                    category.mean - OUTLIER_Z_THRESHOLD * category.std_dev,
                    category.mean + OUTLIER_Z_THRESHOLD * category.std_dev
                )),
            );
            a.is_outlier = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::statistics::compute_category_stats;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn validate_alone(record: &MaterialRecord) -> MaterialValidation {
        MaterialValidator::default().validate(record, &CategoryStatsMap::new(), now())
    }

    fn codes(v: &MaterialValidation) -> Vec<IssueCode> {
        v.issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn test_clean_tier1_record_is_verified() {
        let record = MaterialRecord::new("m1", "Rebar", "Steel")
            .with_factor(1500.0)
            .with_unit("tonne")
            .with_source("EPD Australasia")
            .with_epd_number("S-P-01234")
            .with_expiry(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        let v = validate_alone(&record);

        assert_eq!(v.confidence_level, ConfidenceLevel::Verified);
        assert_eq!(v.source_tier, SourceTier::Tier1);
        assert!(v.issues.is_empty());
        assert!(!v.is_outlier);
    }

    #[test]
    fn test_null_factor_forces_review() {
        let record = MaterialRecord::new("m1", "Mystery", "Steel")
            .with_unit("tonne")
            .with_source("ICE V4");
        let v = validate_alone(&record);

        assert_eq!(v.confidence_level, ConfidenceLevel::NeedsReview);
        assert_eq!(codes(&v), vec![IssueCode::NullEfTotal]);
        assert_eq!(v.issues[0].severity, Severity::Critical);
        assert_eq!(v.issues[0].layer, 1);
    }

    #[test]
    fn test_negative_factor_forces_review_and_skips_range() {
        let record = MaterialRecord::new("m1", "Bad", "Steel")
            .with_factor(-5.0)
            .with_unit("tonne")
            .with_source("ICE V4");
        let v = validate_alone(&record);

        assert_eq!(v.confidence_level, ConfidenceLevel::NeedsReview);
        assert_eq!(codes(&v), vec![IssueCode::NegativeFactor]);
        assert_eq!(v.issues[0].message, "Negative carbon factor: -5");
        assert_eq!(v.issues[0].value, Some(IssueValue::Number(-5.0)));
    }

    #[test]
    fn test_blank_unit_is_missing() {
        let record = MaterialRecord::new("m1", "Glazing", "Glass")
            .with_factor(20.0)
            .with_unit("   ")
            .with_source("ICE V4");
        let v = validate_alone(&record);

        assert!(v.has_code(IssueCode::MissingUnit));
        assert_eq!(v.confidence_level, ConfidenceLevel::NeedsReview);
        // No unit, so no unit-consistency check
        assert!(!v.has_code(IssueCode::UnitMismatch));
    }

    #[test]
    fn test_registry_checks() {
        let missing = MaterialRecord::new("m1", "Slab", "Concrete")
            .with_factor(300.0)
            .with_unit("m³")
            .with_source("NABERS 2025");
        let v = validate_alone(&missing);
        assert_eq!(codes(&v), vec![IssueCode::MissingEpdNumber]);
        assert_eq!(v.confidence_level, ConfidenceLevel::Documented);

        let invalid = missing.clone().with_epd_number("EPD-123");
        let v = validate_alone(&invalid);
        assert_eq!(codes(&v), vec![IssueCode::InvalidEpdFormat]);
        assert_eq!(v.issues[0].severity, Severity::Medium);
        // Format problems do not downgrade
        assert_eq!(v.confidence_level, ConfidenceLevel::Verified);
    }

    #[test]
    fn test_registry_checks_skip_non_tier1() {
        let record = MaterialRecord::new("m1", "Slab", "Concrete")
            .with_factor(300.0)
            .with_unit("m³")
            .with_source("ICE V4")
            .with_expiry(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let v = validate_alone(&record);

        assert!(v.issues.is_empty());
        assert_eq!(v.confidence_level, ConfidenceLevel::IndustryAverage);
    }

    #[test]
    fn test_expiry_compares_against_run_clock() {
        let record = MaterialRecord::new("m1", "Slab", "Concrete")
            .with_factor(300.0)
            .with_unit("m³")
            .with_source("EPD Australasia")
            .with_epd_number("S-P-00001");

        let expired = record.clone().with_expiry(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        let v = validate_alone(&expired);
        assert_eq!(codes(&v), vec![IssueCode::ExpiredEpd]);
        assert_eq!(v.issues[0].message, "EPD expired on 2026-03-01");
        assert_eq!(v.confidence_level, ConfidenceLevel::Documented);

        let current = record.with_expiry(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert!(validate_alone(&current).issues.is_empty());
    }

    #[test]
    fn test_above_range() {
        let record = MaterialRecord::new("m1", "Hot rolled", "Steel")
            .with_factor(6000.0)
            .with_unit("tonne")
            .with_source("ICE V4");
        let v = validate_alone(&record);

        assert_eq!(codes(&v), vec![IssueCode::AboveNabersRange]);
        let issue = &v.issues[0];
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.message, "Value 6000 is 50.0% above expected range (max 4000)");
        assert_eq!(issue.expected_range.as_deref(), Some("400-4000"));
        assert!(v.is_outlier);
        assert_eq!(v.outlier_reason.as_deref(), Some("50.0% above NABERS maximum"));
        // Range downgrade happens before the source layer
        assert_eq!(v.confidence_level, ConfidenceLevel::Documented);
    }

    #[test]
    fn test_within_tolerance_is_not_out_of_range() {
        // 5000 is above the 4000 band maximum but inside the 30% tolerance
        let record = MaterialRecord::new("m1", "Hot rolled", "Steel")
            .with_factor(5000.0)
            .with_unit("tonne")
            .with_source("ICE V4");
        let v = validate_alone(&record);

        assert!(!v.has_code(IssueCode::AboveNabersRange));
        assert!(!v.is_outlier);
        assert_eq!(v.confidence_level, ConfidenceLevel::IndustryAverage);
    }

    #[test]
    fn test_below_range() {
        let record = MaterialRecord::new("m1", "Low carbon", "Cement")
            .with_factor(300.0)
            .with_unit("tonne")
            .with_source("ICE V4");
        let v = validate_alone(&record);

        assert_eq!(codes(&v), vec![IssueCode::BelowNabersRange]);
        assert_eq!(
            v.issues[0].message,
            "Value 300 is 40.0% below expected range (min 500)"
        );
        assert_eq!(v.outlier_reason.as_deref(), Some("40.0% below NABERS minimum"));
    }

    #[test]
    fn test_zero_minimum_never_below_range() {
        let record = MaterialRecord::new("m1", "Gravel", "Aggregate")
            .with_factor(0.01)
            .with_unit("tonne")
            .with_source("ICE V4");
        assert!(!validate_alone(&record).has_code(IssueCode::BelowNabersRange));
    }

    #[test]
    fn test_unknown_category_skips_range_and_unit() {
        let record = MaterialRecord::new("m1", "Thing", "Widgets")
            .with_factor(999999.0)
            .with_unit("each")
            .with_source("ICE V4");
        let v = validate_alone(&record);
        assert!(v.issues.is_empty());
    }

    #[test]
    fn test_unit_mismatch_is_low_and_keeps_confidence() {
        let record = MaterialRecord::new("m1", "Rebar", "Steel")
            .with_factor(1.5)
            .with_unit("kg")
            .with_source("EPD Australasia")
            .with_epd_number("S-P-00042");
        let v = validate_alone(&record);

        // 1.5 is far below the per-tonne band as well
        assert!(v.has_code(IssueCode::UnitMismatch));
        let issue = v.issues.iter().find(|i| i.code == IssueCode::UnitMismatch).unwrap();
        assert_eq!(issue.severity, Severity::Low);
        assert_eq!(issue.layer, 4);
        assert_eq!(issue.expected_range.as_deref(), Some("tonne"));

        let ok = MaterialRecord::new("m2", "Slab", "Concrete")
            .with_factor(300.0)
            .with_unit("kgCO2e/m3")
            .with_source("ICE V4");
        assert!(!validate_alone(&ok).has_code(IssueCode::UnitMismatch));
    }

    #[test]
    fn test_tier3_source() {
        let record = MaterialRecord::new("m1", "Panel", "Glass")
            .with_factor(20.0)
            .with_unit("m2");
        let v = validate_alone(&record);

        assert_eq!(codes(&v), vec![IssueCode::Tier3Source]);
        assert_eq!(v.issues[0].message, "Unknown source requires verification: null");
        assert_eq!(v.issues[0].value, Some(IssueValue::Text("null".into())));
        assert_eq!(v.source_tier, SourceTier::Tier3);
        assert_eq!(v.confidence_level, ConfidenceLevel::Documented);
    }

    #[test]
    fn test_statistical_outlier() {
        let mut records: Vec<MaterialRecord> = (0..10)
            .map(|i| {
                MaterialRecord::new(format!("t{}", i), "Pine", "Timber")
                    .with_factor(100.0)
                    .with_unit("m³")
                    .with_source("ICE V4")
            })
            .collect();
        records.push(
            MaterialRecord::new("hw", "Hardwood", "Timber")
                .with_factor(900.0)
                .with_unit("m³")
                .with_source("ICE V4"),
        );
        let stats = compute_category_stats(&records);
        let validator = MaterialValidator::default();

        let v = validator.validate(&records[10], &stats, now());
        assert_eq!(codes(&v), vec![IssueCode::StatisticalOutlier]);
        assert!(v.is_outlier);
        assert!(v.outlier_reason.is_none());
        // Outliers never change confidence
        assert_eq!(v.confidence_level, ConfidenceLevel::IndustryAverage);
        assert!(v.issues[0].message.starts_with("Value 900 is 3.2σ from category mean (172.7)"));

        let typical = validator.validate(&records[0], &stats, now());
        assert!(!typical.is_outlier);
    }

    #[test]
    fn test_validate_all_preserves_order() {
        let records = vec![
            MaterialRecord::new("b", "B", "Steel").with_factor(1000.0).with_unit("tonne"),
            MaterialRecord::new("a", "A", "Steel").with_factor(1200.0).with_unit("tonne"),
        ];
        let stats = compute_category_stats(&records);
        let out = MaterialValidator::default().validate_all(&records, &stats, now());
        let ids: Vec<&str> = out.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
