//! Diff review: the one mutable transition a diff ever takes.

use crate::error::{EngineError, Result};
use crate::Engine;
use chrono::Utc;
use geomon_core::id::{DatasetId, DiffId};
use geomon_core::model::{DiffFilter, DiffStats, GeometryDiff, Page, ReviewDecision};
use tracing::info;

impl Engine {
    /// Accept or reject one PENDING diff.
    ///
    /// The first decision stands: reviewing an already-reviewed diff is a
    /// conflict and leaves the stored decision untouched.
    pub fn review_diff(
        &self,
        id: DiffId,
        decision: ReviewDecision,
        reviewed_by: &str,
    ) -> Result<GeometryDiff> {
        let reviewer = reviewer_identity(reviewed_by)?;
        let diff = self.store.review_diff(id, decision, reviewer, Utc::now())?;
        info!(
            diff = %id,
            decision = ?decision,
            reviewed_by = reviewer,
            "diff reviewed"
        );
        Ok(diff)
    }

    /// Apply one decision to several diffs atomically: if any diff is
    /// missing or already reviewed, none are changed.
    pub fn review_batch(
        &self,
        ids: &[DiffId],
        decision: ReviewDecision,
        reviewed_by: &str,
    ) -> Result<Vec<GeometryDiff>> {
        let reviewer = reviewer_identity(reviewed_by)?;
        if ids.is_empty() {
            return Err(EngineError::InvalidInput("empty review batch".to_string()));
        }
        let reviewed = self
            .store
            .review_batch(ids, decision, reviewer, Utc::now())?;
        info!(
            count = reviewed.len(),
            decision = ?decision,
            reviewed_by = reviewer,
            "diff batch reviewed"
        );
        Ok(reviewed)
    }

    /// Look up a diff by id.
    pub fn diff(&self, id: DiffId) -> Result<GeometryDiff> {
        Ok(self.store.diff(id)?)
    }

    /// List diffs matching a filter, in creation order.
    pub fn list_diffs(&self, filter: &DiffFilter, page: Page) -> Result<Vec<GeometryDiff>> {
        Ok(self.store.list_diffs(filter, page)?)
    }

    /// Number of diffs awaiting review for a dataset.
    pub fn pending_diff_count(&self, dataset: DatasetId) -> Result<u64> {
        Ok(self.store.pending_diff_count(dataset)?)
    }

    /// Diff counters for a dataset.
    pub fn diff_stats(&self, dataset: DatasetId) -> Result<DiffStats> {
        Ok(self.store.diff_stats(dataset)?)
    }
}

fn reviewer_identity(reviewed_by: &str) -> Result<&str> {
    let trimmed = reviewed_by.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(
            "reviewer identity is required".to_string(),
        ));
    }
    Ok(trimmed)
}
