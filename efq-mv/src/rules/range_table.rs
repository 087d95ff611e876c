//! Expected emission-factor ranges by material category
//!
//! Bands follow NABERS v2025.1 reference ranges. A category may carry several
//! bands (one per product grade), each with its own declared unit. Range
//! checking merges them into one band per category; unit checking uses the
//! band units.

use std::collections::BTreeMap;

use efq_common::config::RangeCategoryConfig;

use super::RuleConfigError;

/// Factor above `max × 1.3` is out of range
pub const UPPER_TOLERANCE_MULTIPLIER: f64 = 1.3;

/// Factor below `min × 0.7` is out of range
pub const LOWER_TOLERANCE_MULTIPLIER: f64 = 0.7;

/// One reference band
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBand {
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

impl RangeBand {
    pub fn new(min: f64, max: f64, unit: impl Into<String>) -> Self {
        Self {
            min,
            max,
            unit: unit.into(),
        }
    }
}

/// Union of all bands of a category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedRange {
    /// Smallest band minimum
    pub min: f64,
    /// Largest band maximum
    pub max: f64,
}

impl MergedRange {
    /// `"{min}-{max}"`, as shown in issue expected-range fields
    pub fn display(&self) -> String {
        format!("{}-{}", self.min, self.max)
    }
}

/// Category → bands lookup with tolerance multipliers
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTable {
    categories: BTreeMap<String, Vec<RangeBand>>,
    upper_tolerance: f64,
    lower_tolerance: f64,
}

impl RangeTable {
    /// Empty table with default tolerances
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
            upper_tolerance: UPPER_TOLERANCE_MULTIPLIER,
            lower_tolerance: LOWER_TOLERANCE_MULTIPLIER,
        }
    }

    /// Add or replace a category's bands
    pub fn with_category(mut self, category: impl Into<String>, bands: Vec<RangeBand>) -> Self {
        self.categories.insert(category.into(), bands);
        self
    }

    pub fn upper_tolerance(&self) -> f64 {
        self.upper_tolerance
    }

    pub fn lower_tolerance(&self) -> f64 {
        self.lower_tolerance
    }

    /// Bands for a category (exact, case-sensitive category match)
    pub fn bands(&self, category: &str) -> Option<&[RangeBand]> {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .filter(|bands| !bands.is_empty())
    }

    /// Merged min/max across a category's bands
    pub fn merged(&self, category: &str) -> Option<MergedRange> {
        let bands = self.bands(category)?;
        let min = bands.iter().map(|b| b.min).fold(f64::INFINITY, f64::min);
        let max = bands.iter().map(|b| b.max).fold(f64::NEG_INFINITY, f64::max);
        Some(MergedRange { min, max })
    }

    /// Distinct normalized units declared by a category's bands, in band order
    pub fn expected_units(&self, category: &str) -> Vec<String> {
        let mut units: Vec<String> = Vec::new();
        for band in self.bands(category).unwrap_or(&[]) {
            let unit = normalize_unit(&band.unit);
            if !units.contains(&unit) {
                units.push(unit);
            }
        }
        units
    }

    /// Apply TOML overrides; each configured category replaces its built-in bands
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, RangeCategoryConfig>,
    ) -> Result<(), RuleConfigError> {
        for (category, config) in overrides {
            if config.bands.is_empty() {
                return Err(RuleConfigError::EmptyRange(category.clone()));
            }
            let mut bands = Vec::with_capacity(config.bands.len());
            for band in &config.bands {
                if !band.min.is_finite() || !band.max.is_finite() || band.min > band.max {
                    return Err(RuleConfigError::InvalidBand {
                        category: category.clone(),
                        min: band.min,
                        max: band.max,
                    });
                }
                bands.push(RangeBand::new(band.min, band.max, band.unit.clone()));
            }
            self.categories.insert(category.clone(), bands);
        }
        Ok(())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}

impl Default for RangeTable {
    /// NABERS v2025.1 reference bands
    fn default() -> Self {
        let concrete_in_situ = vec![
            RangeBand::new(136.0, 364.0, "m³"),
            RangeBand::new(149.0, 417.0, "m³"),
            RangeBand::new(167.0, 459.0, "m³"),
            RangeBand::new(198.0, 545.0, "m³"),
            RangeBand::new(101.0, 609.0, "m³"),
            RangeBand::new(205.0, 1270.0, "m³"),
        ];
        let steel = vec![RangeBand::new(400.0, 4000.0, "tonne")];
        let aluminium = vec![RangeBand::new(800.0, 28800.0, "tonne")];
        let insulation = vec![RangeBand::new(0.5, 30.0, "m²")];

        Self::empty()
            .with_category("Concrete (in-situ)", concrete_in_situ)
            .with_category("Concrete", vec![RangeBand::new(136.0, 1270.0, "m³")])
            .with_category("Concrete precast", vec![RangeBand::new(150.0, 500.0, "m³")])
            .with_category("Steel", steel.clone())
            .with_category("Metals - Steel", steel)
            .with_category("Aluminium", aluminium.clone())
            .with_category("Metals - Aluminium", aluminium)
            .with_category("Timber", vec![RangeBand::new(53.0, 1000.0, "m³")])
            .with_category("Glass", vec![RangeBand::new(0.8, 50.0, "m²")])
            .with_category("Asphalt", vec![RangeBand::new(40.0, 180.0, "tonne")])
            .with_category("Aggregate", vec![RangeBand::new(0.0, 25.0, "tonne")])
            .with_category("Cement", vec![RangeBand::new(500.0, 1000.0, "tonne")])
            .with_category("Masonry", vec![RangeBand::new(50.0, 500.0, "m³")])
            .with_category("Insulation", insulation.clone())
            .with_category("Insulation only", insulation)
    }
}

/// Normalize a declared unit for comparison
///
/// Lower-cases, folds `m3`/`m^3` to `m³` and `m2`/`m^2` to `m²`, keeps only
/// the part after the last `/` (so `kgCO2e/m³` becomes `m³`), and folds
/// tonne spellings.
pub fn normalize_unit(raw: &str) -> String {
    let lowered = raw
        .trim()
        .to_lowercase()
        .replace("m^3", "m³")
        .replace("m3", "m³")
        .replace("m^2", "m²")
        .replace("m2", "m²");

    let declared = lowered.rsplit('/').next().unwrap_or("").trim();
    let declared = declared.strip_prefix("per ").unwrap_or(declared).trim();

    match declared {
        "t" | "ton" | "tons" | "tonnes" | "metric ton" | "metric tonne" => "tonne".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efq_common::config::RangeBandConfig;

    #[test]
    fn test_merged_range_unions_bands() {
        let table = RangeTable::default();
        let merged = table.merged("Concrete (in-situ)").unwrap();
        assert_eq!(merged.min, 101.0);
        assert_eq!(merged.max, 1270.0);
        assert_eq!(merged.display(), "101-1270");
    }

    #[test]
    fn test_unknown_category_has_no_range() {
        let table = RangeTable::default();
        assert!(table.merged("Bricks").is_none());
        // Category lookup is exact
        assert!(table.merged("steel").is_none());
        assert!(table.expected_units("Bricks").is_empty());
    }

    #[test]
    fn test_expected_units_deduplicated() {
        let table = RangeTable::default();
        assert_eq!(table.expected_units("Concrete (in-situ)"), vec!["m³".to_string()]);
        assert_eq!(table.expected_units("Steel"), vec!["tonne".to_string()]);
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit("m3"), "m³");
        assert_eq!(normalize_unit("M^3"), "m³");
        assert_eq!(normalize_unit("kgCO2e/m3"), "m³");
        assert_eq!(normalize_unit(" per m2 "), "m²");
        assert_eq!(normalize_unit("Tonnes"), "tonne");
        assert_eq!(normalize_unit("kgCO2e/t"), "tonne");
        assert_eq!(normalize_unit("kg"), "kg");
    }

    #[test]
    fn test_apply_overrides_replaces_category() {
        let mut table = RangeTable::default();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "Steel".to_string(),
            RangeCategoryConfig {
                bands: vec![
                    RangeBandConfig { min: 2500.0, max: 3500.0, unit: "tonne".into() },
                    RangeBandConfig { min: 400.0, max: 1200.0, unit: "tonne".into() },
                ],
            },
        );
        overrides.insert(
            "Bricks".to_string(),
            RangeCategoryConfig {
                bands: vec![RangeBandConfig { min: 200.0, max: 400.0, unit: "m³".into() }],
            },
        );

        table.apply_overrides(&overrides).unwrap();

        let steel = table.merged("Steel").unwrap();
        assert_eq!((steel.min, steel.max), (400.0, 3500.0));
        assert!(table.merged("Bricks").is_some());
        // Untouched categories keep built-in bands
        assert_eq!(table.merged("Metals - Steel").unwrap().max, 4000.0);
    }

    #[test]
    fn test_apply_overrides_rejects_inverted_band() {
        let mut table = RangeTable::default();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "Glass".to_string(),
            RangeCategoryConfig {
                bands: vec![RangeBandConfig { min: 10.0, max: 1.0, unit: "m²".into() }],
            },
        );

        let err = table.apply_overrides(&overrides).unwrap_err();
        assert!(matches!(err, RuleConfigError::InvalidBand { .. }));
    }
}
