//! Record models shared across EFQ services

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the emission-factor reference database
///
/// Owned by the import pipeline. EFQ services only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    pub material_name: String,
    /// Free-text category, matched exactly against the range table
    pub material_category: String,
    /// Emission factor (kgCO2e per declared unit)
    pub ef_total: Option<f64>,
    pub unit: Option<String>,
    pub data_source: Option<String>,
    /// EPD registration number (e.g. `S-P-01234`)
    pub epd_number: Option<String>,
    pub manufacturer: Option<String>,
    /// Region / state the factor applies to
    pub state: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl MaterialRecord {
    /// Minimal record with only the identifying fields set
    pub fn new(
        id: impl Into<String>,
        material_name: impl Into<String>,
        material_category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            material_name: material_name.into(),
            material_category: material_category.into(),
            ef_total: None,
            unit: None,
            data_source: None,
            epd_number: None,
            manufacturer: None,
            state: None,
            expiry_date: None,
        }
    }

    pub fn with_factor(mut self, ef_total: f64) -> Self {
        self.ef_total = Some(ef_total);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_epd_number(mut self, epd_number: impl Into<String>) -> Self {
        self.epd_number = Some(epd_number.into());
        self
    }

    pub fn with_expiry(mut self, expiry_date: NaiveDate) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    /// Unit with surrounding whitespace removed; `None` when missing or blank
    pub fn unit_trimmed(&self) -> Option<&str> {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}
