//! Duplicate-geometry detection.
//!
//! Two rows with byte-identical normalized coordinate structure share a
//! geometry digest, so duplicate detection is a count over the dataset
//! context's digest index rather than a pairwise geometry comparison.
//! Duplicates warn instead of failing: legitimate sources sometimes carry
//! the same footprint under different attributes.

use crate::registry::{CheckContext, CheckOutcome, QualityCheck};
use serde_json::json;

/// Exact-duplicate check (`duplicate`).
pub struct DuplicateCheck;

impl QualityCheck for DuplicateCheck {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        let occurrences = ctx.dataset.geometry_occurrences(&ctx.fingerprint.geometry);
        // The snapshot under test is itself part of the current set.
        let duplicates = occurrences.saturating_sub(1);
        if duplicates == 0 {
            return CheckOutcome::pass();
        }
        CheckOutcome::warning(format!(
            "found {duplicates} other snapshot(s) with identical geometry"
        ))
        .with_details(json!({ "duplicate_count": duplicates }))
    }
}
