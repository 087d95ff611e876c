//! Validation result types
//!
//! Per-record output of the six-layer validator. Issues and validations are
//! created during a run and never persisted by this service.

use chrono::NaiveDate;
use efq_common::MaterialRecord;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::rules::SourceTier;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// High and critical issues put a record on the flagged list
    pub fn is_flagging(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

/// Four-point trust classification of a record's factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Verified,
    Documented,
    IndustryAverage,
    NeedsReview,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Verified => "verified",
            ConfidenceLevel::Documented => "documented",
            ConfidenceLevel::IndustryAverage => "industry_average",
            ConfidenceLevel::NeedsReview => "needs_review",
        }
    }

    pub fn color(&self) -> ConfidenceColor {
        match self {
            ConfidenceLevel::Verified => ConfidenceColor::Green,
            ConfidenceLevel::Documented => ConfidenceColor::Yellow,
            ConfidenceLevel::IndustryAverage => ConfidenceColor::Orange,
            ConfidenceLevel::NeedsReview => ConfidenceColor::Red,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLevel::Verified => "Verified EPD",
            ConfidenceLevel::Documented => "Documented Variant",
            ConfidenceLevel::IndustryAverage => "Industry Average",
            ConfidenceLevel::NeedsReview => "Needs Review",
        }
    }

    /// Every level except `needs_review` counts toward the pass rate
    pub fn is_passing(&self) -> bool {
        !matches!(self, ConfidenceLevel::NeedsReview)
    }
}

/// Display color, derived 1:1 from [`ConfidenceLevel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceColor {
    Green,
    Yellow,
    Orange,
    Red,
}

/// Symbolic issue code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCode {
    #[serde(rename = "NULL_EF_TOTAL")]
    NullEfTotal,
    #[serde(rename = "NEGATIVE_FACTOR")]
    NegativeFactor,
    #[serde(rename = "MISSING_UNIT")]
    MissingUnit,
    #[serde(rename = "INVALID_EPD_FORMAT")]
    InvalidEpdFormat,
    #[serde(rename = "MISSING_EPD_NUMBER")]
    MissingEpdNumber,
    #[serde(rename = "EXPIRED_EPD")]
    ExpiredEpd,
    #[serde(rename = "ABOVE_NABERS_RANGE")]
    AboveNabersRange,
    #[serde(rename = "BELOW_NABERS_RANGE")]
    BelowNabersRange,
    #[serde(rename = "UNIT_MISMATCH")]
    UnitMismatch,
    #[serde(rename = "TIER_3_SOURCE")]
    Tier3Source,
    #[serde(rename = "STATISTICAL_OUTLIER")]
    StatisticalOutlier,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::NullEfTotal => "NULL_EF_TOTAL",
            IssueCode::NegativeFactor => "NEGATIVE_FACTOR",
            IssueCode::MissingUnit => "MISSING_UNIT",
            IssueCode::InvalidEpdFormat => "INVALID_EPD_FORMAT",
            IssueCode::MissingEpdNumber => "MISSING_EPD_NUMBER",
            IssueCode::ExpiredEpd => "EXPIRED_EPD",
            IssueCode::AboveNabersRange => "ABOVE_NABERS_RANGE",
            IssueCode::BelowNabersRange => "BELOW_NABERS_RANGE",
            IssueCode::UnitMismatch => "UNIT_MISMATCH",
            IssueCode::Tier3Source => "TIER_3_SOURCE",
            IssueCode::StatisticalOutlier => "STATISTICAL_OUTLIER",
        }
    }

    /// Validation layer (1-6) that emits this code
    pub fn layer(&self) -> u8 {
        match self {
            IssueCode::NullEfTotal | IssueCode::NegativeFactor | IssueCode::MissingUnit => 1,
            IssueCode::InvalidEpdFormat | IssueCode::MissingEpdNumber | IssueCode::ExpiredEpd => 2,
            IssueCode::AboveNabersRange | IssueCode::BelowNabersRange => 3,
            IssueCode::UnitMismatch => 4,
            IssueCode::Tier3Source => 5,
            IssueCode::StatisticalOutlier => 6,
        }
    }
}

/// Observed value attached to an issue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IssueValue {
    Number(f64),
    Text(String),
}

/// One finding against one record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub layer: u8,
    pub code: IssueCode,
    pub message: String,
    pub material_id: String,
    pub material_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<IssueValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<String>,
    pub recommended_action: String,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        record: &MaterialRecord,
        message: impl Into<String>,
        recommended_action: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            layer: code.layer(),
            code,
            message: message.into(),
            material_id: record.id.clone(),
            material_name: record.material_name.clone(),
            value: None,
            expected_range: None,
            recommended_action: recommended_action.into(),
        }
    }

    pub fn with_value(mut self, value: IssueValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_expected_range(mut self, range: impl Into<String>) -> Self {
        self.expected_range = Some(range.into());
        self
    }
}

/// Validation outcome for one record
///
/// Serialized with the record's column names plus camelCase validation
/// fields. `confidenceColor` and `confidenceLabel` are derived from
/// `confidence_level` at serialization time, so they cannot disagree with it.
/// `sourceTierLabel` is derived from `source_tier` the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialValidation {
    pub id: String,
    pub material_name: String,
    pub material_category: String,
    pub ef_total: Option<f64>,
    pub unit: Option<String>,
    pub data_source: Option<String>,
    pub epd_number: Option<String>,
    pub manufacturer: Option<String>,
    pub state: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub confidence_level: ConfidenceLevel,
    pub source_tier: SourceTier,
    pub is_outlier: bool,
    pub outlier_reason: Option<String>,
    pub issues: Vec<ValidationIssue>,
}

impl MaterialValidation {
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.issues.iter().any(|i| i.severity == severity)
    }

    /// At least one high or critical issue
    pub fn is_flagged(&self) -> bool {
        self.issues.iter().any(|i| i.severity.is_flagging())
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl Serialize for MaterialValidation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MaterialValidation", 19)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("material_name", &self.material_name)?;
        s.serialize_field("material_category", &self.material_category)?;
        s.serialize_field("ef_total", &self.ef_total)?;
        s.serialize_field("unit", &self.unit)?;
        s.serialize_field("data_source", &self.data_source)?;
        s.serialize_field("epd_number", &self.epd_number)?;
        s.serialize_field("manufacturer", &self.manufacturer)?;
        s.serialize_field("state", &self.state)?;
        s.serialize_field("expiry_date", &self.expiry_date)?;
        s.serialize_field("confidenceLevel", &self.confidence_level)?;
        s.serialize_field("confidenceColor", &self.confidence_level.color())?;
        s.serialize_field("confidenceLabel", self.confidence_level.label())?;
        s.serialize_field("sourceTier", &self.source_tier)?;
        s.serialize_field("sourceTierLabel", self.source_tier.label())?;
        s.serialize_field("isOutlier", &self.is_outlier)?;
        s.serialize_field("outlierReason", &self.outlier_reason)?;
        s.serialize_field("validUntil", &self.expiry_date)?;
        s.serialize_field("issues", &self.issues)?;
        s.end()
    }
}
