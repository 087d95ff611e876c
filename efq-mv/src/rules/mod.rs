//! Reference rule tables: expected ranges and source credibility tiers

pub mod range_table;
pub mod source_tiers;

pub use range_table::{
    normalize_unit, MergedRange, RangeBand, RangeTable, LOWER_TOLERANCE_MULTIPLIER,
    UPPER_TOLERANCE_MULTIPLIER,
};
pub use source_tiers::{SourceTier, SourceTierTable};

use efq_common::config::TomlConfig;
use thiserror::Error;
use tracing::info;

/// Invalid rule table configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleConfigError {
    #[error("Invalid source tier {0} (expected 1, 2 or 3)")]
    InvalidTier(u8),

    #[error("Source tier pattern must not be empty")]
    EmptyPattern,

    #[error("Range category '{0}' has no bands")]
    EmptyRange(String),

    #[error("Invalid range band for '{category}': min {min} > max {max}")]
    InvalidBand { category: String, min: f64, max: f64 },
}

/// Build both rule tables from configuration
///
/// A non-empty `[[source_tiers]]` list replaces the built-in table. Each
/// `[ranges.<category>]` entry replaces that category's built-in bands.
pub fn load_rules(config: &TomlConfig) -> Result<(RangeTable, SourceTierTable), RuleConfigError> {
    let tiers = if config.source_tiers.is_empty() {
        SourceTierTable::default()
    } else {
        let table = SourceTierTable::from_config(&config.source_tiers)?;
        info!("Using {} configured source tier rules", table.len());
        table
    };

    let mut ranges = RangeTable::default();
    if !config.ranges.is_empty() {
        ranges.apply_overrides(&config.ranges)?;
        info!("Applied {} configured range overrides", config.ranges.len());
    }

    Ok((ranges, tiers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rules_defaults() {
        let (ranges, tiers) = load_rules(&TomlConfig::default()).unwrap();
        assert_eq!(ranges, RangeTable::default());
        assert_eq!(tiers, SourceTierTable::default());
    }

    #[test]
    fn test_load_rules_rejects_bad_tier() {
        let config = TomlConfig::parse(
            r#"
            [[source_tiers]]
            pattern = "NABERS"
            tier = 0
            "#,
        )
        .unwrap();
        assert_eq!(load_rules(&config).unwrap_err(), RuleConfigError::InvalidTier(0));
    }
}
