//! Source credibility tiers
//!
//! A record's tier is decided by the first rule whose pattern occurs,
//! case-insensitively, anywhere in the record's `data_source`. No match, or
//! no source at all, is tier 3. Rule order matters: `"NABERS ICE"` is tier 1
//! because the NABERS rule precedes the ICE rule.

use efq_common::config::SourceTierRuleConfig;
use serde::Serialize;

use super::RuleConfigError;

/// Credibility ranking of where a factor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum SourceTier {
    /// Verified Australian sources (EPD Australasia, NABERS, NGER)
    Tier1,
    /// International and industry-average sources
    Tier2,
    /// Unknown source, requires verification
    Tier3,
}

impl SourceTier {
    pub fn number(&self) -> u8 {
        match self {
            SourceTier::Tier1 => 1,
            SourceTier::Tier2 => 2,
            SourceTier::Tier3 => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceTier::Tier1 => "Tier 1: Verified",
            SourceTier::Tier2 => "Tier 2: Industry Average",
            SourceTier::Tier3 => "Tier 3: Review Required",
        }
    }
}

impl From<SourceTier> for u8 {
    fn from(tier: SourceTier) -> Self {
        tier.number()
    }
}

impl TryFrom<u8> for SourceTier {
    type Error = RuleConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SourceTier::Tier1),
            2 => Ok(SourceTier::Tier2),
            3 => Ok(SourceTier::Tier3),
            other => Err(RuleConfigError::InvalidTier(other)),
        }
    }
}

/// Built-in rules, in match order
const DEFAULT_RULES: &[(&str, SourceTier)] = &[
    ("EPD Australasia", SourceTier::Tier1),
    ("NABERS", SourceTier::Tier1),
    ("NABERS EPD", SourceTier::Tier1),
    ("NABERS 2025", SourceTier::Tier1),
    ("NGER", SourceTier::Tier1),
    ("NGER Materials", SourceTier::Tier1),
    ("NGER Materials Database", SourceTier::Tier1),
    ("ICE", SourceTier::Tier2),
    ("ICE V4", SourceTier::Tier2),
    ("ICE Database", SourceTier::Tier2),
    ("Circular Ecology", SourceTier::Tier2),
    ("ICM Database", SourceTier::Tier2),
    ("ICM Database 2019", SourceTier::Tier2),
    ("AusLCI", SourceTier::Tier2),
    ("EPD International", SourceTier::Tier2),
    ("EC3", SourceTier::Tier2),
    ("BlueScope", SourceTier::Tier2),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceTierRule {
    /// Lower-cased once at construction
    needle: String,
    tier: SourceTier,
}

/// Ordered `(pattern, tier)` rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTierTable {
    rules: Vec<SourceTierRule>,
}

impl SourceTierTable {
    /// Build a table from rules in match order
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, SourceTier)>,
        S: AsRef<str>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(pattern, tier)| SourceTierRule {
                    needle: pattern.as_ref().to_lowercase(),
                    tier,
                })
                .collect(),
        }
    }

    /// Build a table from TOML rule rows
    pub fn from_config(rows: &[SourceTierRuleConfig]) -> Result<Self, RuleConfigError> {
        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            if row.pattern.trim().is_empty() {
                return Err(RuleConfigError::EmptyPattern);
            }
            rules.push((row.pattern.as_str(), SourceTier::try_from(row.tier)?));
        }
        Ok(Self::new(rules))
    }

    /// Classify a data source
    pub fn classify(&self, data_source: Option<&str>) -> SourceTier {
        let Some(source) = data_source.filter(|s| !s.is_empty()) else {
            return SourceTier::Tier3;
        };
        let haystack = source.to_lowercase();

        self.rules
            .iter()
            .find(|rule| haystack.contains(&rule.needle))
            .map(|rule| rule.tier)
            .unwrap_or(SourceTier::Tier3)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for SourceTierTable {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.iter().copied())
    }
}
