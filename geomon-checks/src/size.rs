//! Size-anomaly detection.
//!
//! Flags geometries whose planar extent is implausible: zero extent fails
//! outright, near-zero extent warns, and extents orders of magnitude away
//! from the dataset's median warn once the baseline has enough samples to
//! mean anything. Points and collections carry no extent and always pass.

use crate::context::ExtentBaseline;
use crate::registry::{CheckContext, CheckOutcome, QualityCheck};
use serde_json::json;

/// Thresholds for [`SizeAnomalyCheck`].
#[derive(Debug, Clone, Copy)]
pub struct SizeCheckConfig {
    /// Areas below this warn as near-zero (squared CRS units).
    pub small_area_threshold: f64,
    /// Lengths below this warn as near-zero (CRS units).
    pub small_length_threshold: f64,
    /// Warn when the extent is more than this factor away from the dataset
    /// median, in either direction.
    pub magnitude_ratio: f64,
    /// Minimum baseline observations before the median comparison applies.
    pub min_baseline_samples: usize,
}

impl Default for SizeCheckConfig {
    fn default() -> Self {
        Self {
            small_area_threshold: 1e-3,
            small_length_threshold: 1e-2,
            magnitude_ratio: 1000.0,
            min_baseline_samples: 5,
        }
    }
}

/// Extent-plausibility check (`size_anomaly`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeAnomalyCheck {
    pub config: SizeCheckConfig,
}

impl SizeAnomalyCheck {
    pub fn new(config: SizeCheckConfig) -> Self {
        Self { config }
    }

    fn evaluate(
        &self,
        measure: f64,
        small_threshold: f64,
        baseline: &ExtentBaseline,
        noun: &str,
    ) -> CheckOutcome {
        if measure == 0.0 {
            return CheckOutcome::fail(format!("zero {noun}"));
        }
        if measure < small_threshold {
            return CheckOutcome::warning(format!("near-zero {noun}: {measure}"))
                .with_details(json!({ "observed": measure }));
        }
        if baseline.samples() >= self.config.min_baseline_samples {
            if let Some(median) = baseline.median() {
                let ratio = self.config.magnitude_ratio;
                if measure > median * ratio || measure < median / ratio {
                    return CheckOutcome::warning(format!(
                        "{noun} {measure} is more than {ratio}x away from the dataset median {median}"
                    ))
                    .with_details(json!({ "observed": measure, "median": median }));
                }
            }
        }
        CheckOutcome::pass()
    }
}

impl QualityCheck for SizeAnomalyCheck {
    fn name(&self) -> &'static str {
        "size_anomaly"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        let meta = ctx.metadata;
        if meta.geom_type.is_areal() {
            self.evaluate(
                meta.area,
                self.config.small_area_threshold,
                &ctx.dataset.area_baseline,
                "area",
            )
        } else if meta.geom_type.is_linear() {
            self.evaluate(
                meta.length,
                self.config.small_length_threshold,
                &ctx.dataset.length_baseline,
                "length",
            )
        } else {
            // Points and collections have no meaningful extent.
            CheckOutcome::pass()
        }
    }
}
