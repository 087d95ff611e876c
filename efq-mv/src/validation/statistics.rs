//! Per-category population statistics
//!
//! Only present, strictly positive factors contribute. Categories with no
//! qualifying value are absent from the map.

use std::collections::BTreeMap;

use efq_common::MaterialRecord;

/// Mean and population standard deviation of one category's factors
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub category: String,
    pub mean: f64,
    pub std_dev: f64,
    /// Qualifying values, in record order
    pub values: Vec<f64>,
}

impl CategoryStats {
    fn from_values(category: String, values: Vec<f64>) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            category,
            mean,
            std_dev: variance.sqrt(),
            values,
        }
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Distance from the mean in standard deviations; `None` when spread is zero
    pub fn z_score(&self, value: f64) -> Option<f64> {
        (self.std_dev > 0.0).then(|| (value - self.mean).abs() / self.std_dev)
    }
}

/// Finished statistics snapshot, keyed by category
pub type CategoryStatsMap = BTreeMap<String, CategoryStats>;

/// Group qualifying factors by category and compute mean / stddev
pub fn compute_category_stats(records: &[MaterialRecord]) -> CategoryStatsMap {
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for record in records {
        if let Some(ef) = record.ef_total.filter(|ef| *ef > 0.0) {
            grouped
                .entry(record.material_category.clone())
                .or_default()
                .push(ef);
        }
    }

    grouped
        .into_iter()
        .map(|(category, values)| {
            let stats = CategoryStats::from_values(category.clone(), values);
            (category, stats)
        })
        .collect()
}
