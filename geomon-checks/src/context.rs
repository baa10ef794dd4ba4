//! Per-dataset context for checks that compare against the dataset.
//!
//! Duplicate detection and size-anomaly baselines need a view over the
//! dataset's current snapshots. The orchestrator builds this once per run
//! and shares it across every snapshot's check battery, which keeps each
//! individual check a pure function.

use geomon_core::model::GeometrySnapshot;
use rustc_hash::FxHashMap;

/// Observed distribution of one measure (areas or lengths).
#[derive(Debug, Clone, Default)]
pub struct ExtentBaseline {
    /// Positive observations, sorted ascending.
    values: Vec<f64>,
}

impl ExtentBaseline {
    fn from_values(mut values: Vec<f64>) -> Self {
        values.retain(|v| *v > 0.0 && v.is_finite());
        values.sort_by(|a, b| a.total_cmp(b));
        Self { values }
    }

    /// Number of observations.
    pub fn samples(&self) -> usize {
        self.values.len()
    }

    /// Median of the observed values, if any.
    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mid = self.values.len() / 2;
        if self.values.len() % 2 == 1 {
            Some(self.values[mid])
        } else {
            Some((self.values[mid - 1] + self.values[mid]) / 2.0)
        }
    }
}

/// Dataset-wide baseline built from the current snapshot set.
#[derive(Debug, Clone, Default)]
pub struct DatasetContext {
    /// Geometry digest -> number of current snapshots carrying it.
    geometry_digest_counts: FxHashMap<String, usize>,
    /// Observed polygon areas.
    pub area_baseline: ExtentBaseline,
    /// Observed linestring lengths.
    pub length_baseline: ExtentBaseline,
}

impl DatasetContext {
    /// Build the context from a dataset's current snapshots.
    pub fn from_snapshots(snapshots: &[GeometrySnapshot]) -> Self {
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        let mut areas = Vec::new();
        let mut lengths = Vec::new();

        for snapshot in snapshots {
            *counts
                .entry(snapshot.fingerprint.geometry.clone())
                .or_default() += 1;
            if snapshot.metadata.geom_type.is_areal() {
                areas.push(snapshot.metadata.area);
            }
            if snapshot.metadata.geom_type.is_linear() {
                lengths.push(snapshot.metadata.length);
            }
        }

        Self {
            geometry_digest_counts: counts,
            area_baseline: ExtentBaseline::from_values(areas),
            length_baseline: ExtentBaseline::from_values(lengths),
        }
    }

    /// How many current snapshots share this geometry digest (including the
    /// snapshot under test, when it is part of the current set).
    pub fn geometry_occurrences(&self, geometry_digest: &str) -> usize {
        self.geometry_digest_counts
            .get(geometry_digest)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        let odd = ExtentBaseline::from_values(vec![3.0, 1.0, 2.0]);
        assert_eq!(odd.median(), Some(2.0));
        let even = ExtentBaseline::from_values(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(even.median(), Some(2.5));
        let empty = ExtentBaseline::from_values(vec![]);
        assert_eq!(empty.median(), None);
    }

    #[test]
    fn test_baseline_drops_nonpositive() {
        let baseline = ExtentBaseline::from_values(vec![0.0, -1.0, 5.0]);
        assert_eq!(baseline.samples(), 1);
        assert_eq!(baseline.median(), Some(5.0));
    }
}
