//! Storage seam: the `EngineStore` trait and its in-memory implementation.
//!
//! The relational store with spatial extensions lives outside this engine;
//! `EngineStore` is the boundary to it. `MemoryStore` implements the trait
//! behind a single `RwLock`, which doubles as the atomicity guarantee for
//! the two check-and-set transitions the engine relies on:
//!
//! - `record_snapshot` supersedes the row's current snapshot only when the
//!   composite fingerprint actually changed (idempotent no-op otherwise),
//! - `review_diff` takes a PENDING diff to ACCEPTED/REJECTED exactly once.
//!
//! A relational implementation would back these with row-level locks or a
//! compare-and-set update; callers never see an intermediate state.

use crate::error::{CoreError, Result};
use crate::id::{DatasetId, DiffId, SnapshotId};
use crate::model::{
    CheckFilter, CheckStats, Dataset, DiffFilter, DiffStats, GeometryDiff, GeometrySnapshot, Page,
    ReviewDecision, ReviewStatus, SpatialCheck,
};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Result of a snapshot record attempt.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// A new snapshot row was written (first sighting or fingerprint change).
    /// Carries the previous current snapshot when one was superseded.
    Created {
        snapshot: GeometrySnapshot,
        superseded: Option<GeometrySnapshot>,
    },
    /// The fingerprint matched the row's current snapshot; nothing written.
    Unchanged(GeometrySnapshot),
}

impl RecordOutcome {
    /// The row's current snapshot after the operation.
    pub fn snapshot(&self) -> &GeometrySnapshot {
        match self {
            RecordOutcome::Created { snapshot, .. } => snapshot,
            RecordOutcome::Unchanged(snapshot) => snapshot,
        }
    }

    /// Whether a new snapshot row was written.
    pub fn created(&self) -> bool {
        matches!(self, RecordOutcome::Created { .. })
    }
}

/// Storage operations the engine needs.
///
/// Append-mostly: snapshots and checks are insert-only, diffs carry exactly
/// one mutable transition (the review decision). Implementations must make
/// `record_snapshot`, `review_diff`, and `review_batch` atomic with respect
/// to concurrent callers.
pub trait EngineStore: Send + Sync {
    // -- datasets (read-mostly; upsert is the configuration subsystem's seam)

    /// Insert or replace a dataset descriptor.
    fn upsert_dataset(&self, dataset: Dataset) -> Result<()>;

    /// Look up a dataset.
    fn dataset(&self, id: DatasetId) -> Result<Dataset>;

    /// Stamp a dataset's `last_check_at` after a classification cycle.
    fn touch_dataset(&self, id: DatasetId, at: DateTime<Utc>) -> Result<()>;

    // -- snapshots

    /// Record a snapshot candidate for `(dataset, source row)`.
    ///
    /// Returns [`RecordOutcome::Unchanged`] with the existing snapshot when
    /// the candidate's composite fingerprint matches the row's current one;
    /// otherwise writes the candidate and supersedes the prior snapshot.
    fn record_snapshot(&self, candidate: GeometrySnapshot) -> Result<RecordOutcome>;

    /// Look up a snapshot by id (current or superseded).
    fn snapshot(&self, id: SnapshotId) -> Result<GeometrySnapshot>;

    /// All non-superseded snapshots of a dataset, ordered by source row id.
    fn current_snapshots(&self, dataset: DatasetId) -> Result<Vec<GeometrySnapshot>>;

    /// The non-superseded snapshot for one source row, if any.
    fn current_snapshot_for_row(
        &self,
        dataset: DatasetId,
        source_row_id: &str,
    ) -> Result<Option<GeometrySnapshot>>;

    /// Count of non-superseded snapshots for a dataset.
    fn snapshot_count(&self, dataset: DatasetId) -> Result<u64>;

    /// Retire a row's current snapshot after its source row disappeared.
    ///
    /// The snapshot stays readable by id for diff review; the row just no
    /// longer has a current snapshot. No-op when the row has none.
    fn retire_snapshot(&self, dataset: DatasetId, source_row_id: &str) -> Result<()>;

    // -- diffs

    /// Insert a freshly classified diff (must be PENDING).
    fn insert_diff(&self, diff: GeometryDiff) -> Result<()>;

    /// Look up a diff by id.
    fn diff(&self, id: DiffId) -> Result<GeometryDiff>;

    /// List diffs matching a filter, in creation order.
    fn list_diffs(&self, filter: &DiffFilter, page: Page) -> Result<Vec<GeometryDiff>>;

    /// Number of PENDING diffs for a dataset.
    fn pending_diff_count(&self, dataset: DatasetId) -> Result<u64>;

    /// Diff counters for a dataset.
    fn diff_stats(&self, dataset: DatasetId) -> Result<DiffStats>;

    /// Atomically transition a PENDING diff to the decided status, recording
    /// reviewer identity and timestamp.
    ///
    /// Errors: `NotFound` when the diff does not exist, `Conflict` when it
    /// is no longer PENDING (the first decision stands).
    fn review_diff(
        &self,
        id: DiffId,
        decision: ReviewDecision,
        reviewed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<GeometryDiff>;

    /// Review several diffs as one atomic all-or-nothing transition: if any
    /// diff is missing or already reviewed, none are changed.
    fn review_batch(
        &self,
        ids: &[DiffId],
        decision: ReviewDecision,
        reviewed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<GeometryDiff>>;

    // -- checks

    /// Append one check outcome.
    fn insert_check(&self, check: SpatialCheck) -> Result<()>;

    /// List check outcomes matching a filter, in creation order.
    fn list_checks(&self, filter: &CheckFilter, page: Page) -> Result<Vec<SpatialCheck>>;

    /// Check counters, optionally narrowed to one dataset.
    fn check_stats(&self, dataset: Option<DatasetId>) -> Result<CheckStats>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    datasets: FxHashMap<DatasetId, Dataset>,
    /// All snapshots ever written, current and superseded.
    snapshots: FxHashMap<SnapshotId, GeometrySnapshot>,
    /// (dataset, source row id) -> current snapshot id.
    current: FxHashMap<(DatasetId, String), SnapshotId>,
    diffs: FxHashMap<DiffId, GeometryDiff>,
    /// Diff insertion order, for stable listings.
    diff_order: Vec<DiffId>,
    checks: Vec<SpatialCheck>,
}

/// In-memory `EngineStore`.
///
/// Single-process store used in tests and embedded deployments; everything
/// lives behind one `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryInner>> {
        self.inner
            .read()
            .map_err(|_| CoreError::storage("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryInner>> {
        self.inner
            .write()
            .map_err(|_| CoreError::storage("store lock poisoned"))
    }
}

fn apply_review(
    diff: &mut GeometryDiff,
    decision: ReviewDecision,
    reviewed_by: &str,
    at: DateTime<Utc>,
) {
    diff.status = decision.target_status();
    diff.reviewed_by = Some(reviewed_by.to_string());
    diff.reviewed_at = Some(at);
}

impl EngineStore for MemoryStore {
    fn upsert_dataset(&self, dataset: Dataset) -> Result<()> {
        self.write()?.datasets.insert(dataset.id, dataset);
        Ok(())
    }

    fn dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.read()?
            .datasets
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("dataset {id}")))
    }

    fn touch_dataset(&self, id: DatasetId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.write()?;
        let dataset = inner
            .datasets
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("dataset {id}")))?;
        dataset.last_check_at = Some(at);
        Ok(())
    }

    fn record_snapshot(&self, candidate: GeometrySnapshot) -> Result<RecordOutcome> {
        let mut inner = self.write()?;
        let key = (candidate.dataset_id, candidate.source_row_id.clone());

        let superseded = match inner.current.get(&key) {
            Some(current_id) => {
                let current = inner
                    .snapshots
                    .get(current_id)
                    .cloned()
                    .ok_or_else(|| CoreError::storage("current snapshot missing from store"))?;
                if current.fingerprint.composite == candidate.fingerprint.composite {
                    // No-op, not an error: the row is unchanged.
                    return Ok(RecordOutcome::Unchanged(current));
                }
                Some(current)
            }
            None => None,
        };

        debug!(
            dataset = %candidate.dataset_id,
            source_row = %candidate.source_row_id,
            superseding = superseded.is_some(),
            "recording snapshot"
        );
        inner.current.insert(key, candidate.id);
        inner.snapshots.insert(candidate.id, candidate.clone());
        Ok(RecordOutcome::Created {
            snapshot: candidate,
            superseded,
        })
    }

    fn snapshot(&self, id: SnapshotId) -> Result<GeometrySnapshot> {
        self.read()?
            .snapshots
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("snapshot {id}")))
    }

    fn current_snapshots(&self, dataset: DatasetId) -> Result<Vec<GeometrySnapshot>> {
        let inner = self.read()?;
        let mut keyed: Vec<(&String, &SnapshotId)> = inner
            .current
            .iter()
            .filter(|((ds, _), _)| *ds == dataset)
            .map(|((_, row), id)| (row, id))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = Vec::with_capacity(keyed.len());
        for (_, id) in keyed {
            let snapshot = inner
                .snapshots
                .get(id)
                .cloned()
                .ok_or_else(|| CoreError::storage("current snapshot missing from store"))?;
            out.push(snapshot);
        }
        Ok(out)
    }

    fn current_snapshot_for_row(
        &self,
        dataset: DatasetId,
        source_row_id: &str,
    ) -> Result<Option<GeometrySnapshot>> {
        let inner = self.read()?;
        Ok(inner
            .current
            .get(&(dataset, source_row_id.to_string()))
            .and_then(|id| inner.snapshots.get(id))
            .cloned())
    }

    fn snapshot_count(&self, dataset: DatasetId) -> Result<u64> {
        Ok(self
            .read()?
            .current
            .keys()
            .filter(|(ds, _)| *ds == dataset)
            .count() as u64)
    }

    fn retire_snapshot(&self, dataset: DatasetId, source_row_id: &str) -> Result<()> {
        self.write()?
            .current
            .remove(&(dataset, source_row_id.to_string()));
        Ok(())
    }

    fn insert_diff(&self, diff: GeometryDiff) -> Result<()> {
        if diff.status != ReviewStatus::Pending {
            return Err(CoreError::conflict("diffs must be created PENDING"));
        }
        let mut inner = self.write()?;
        inner.diff_order.push(diff.id);
        inner.diffs.insert(diff.id, diff);
        Ok(())
    }

    fn diff(&self, id: DiffId) -> Result<GeometryDiff> {
        self.read()?
            .diffs
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("diff {id}")))
    }

    fn list_diffs(&self, filter: &DiffFilter, page: Page) -> Result<Vec<GeometryDiff>> {
        let inner = self.read()?;
        Ok(inner
            .diff_order
            .iter()
            .filter_map(|id| inner.diffs.get(id))
            .filter(|d| filter.dataset_id.is_none_or(|ds| d.dataset_id == ds))
            .filter(|d| filter.diff_type.is_none_or(|t| d.diff_type == t))
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    fn pending_diff_count(&self, dataset: DatasetId) -> Result<u64> {
        Ok(self
            .read()?
            .diffs
            .values()
            .filter(|d| d.dataset_id == dataset && d.status == ReviewStatus::Pending)
            .count() as u64)
    }

    fn diff_stats(&self, dataset: DatasetId) -> Result<DiffStats> {
        let inner = self.read()?;
        let mut stats = DiffStats::default();
        for diff in inner.diffs.values().filter(|d| d.dataset_id == dataset) {
            stats.record(diff);
        }
        Ok(stats)
    }

    fn review_diff(
        &self,
        id: DiffId,
        decision: ReviewDecision,
        reviewed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<GeometryDiff> {
        let mut inner = self.write()?;
        let diff = inner
            .diffs
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("diff {id}")))?;
        if diff.status != ReviewStatus::Pending {
            return Err(CoreError::conflict(format!(
                "diff {id} already reviewed ({:?})",
                diff.status
            )));
        }
        apply_review(diff, decision, reviewed_by, at);
        Ok(diff.clone())
    }

    fn review_batch(
        &self,
        ids: &[DiffId],
        decision: ReviewDecision,
        reviewed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<GeometryDiff>> {
        let mut inner = self.write()?;

        // Validate the whole batch before touching anything.
        for id in ids {
            match inner.diffs.get(id) {
                None => return Err(CoreError::not_found(format!("diff {id}"))),
                Some(diff) if diff.status != ReviewStatus::Pending => {
                    return Err(CoreError::conflict(format!(
                        "diff {id} already reviewed ({:?})",
                        diff.status
                    )));
                }
                Some(_) => {}
            }
        }

        let mut reviewed = Vec::with_capacity(ids.len());
        for id in ids {
            // Presence was checked above while the lock was held.
            if let Some(diff) = inner.diffs.get_mut(id) {
                apply_review(diff, decision, reviewed_by, at);
                reviewed.push(diff.clone());
            }
        }
        Ok(reviewed)
    }

    fn insert_check(&self, check: SpatialCheck) -> Result<()> {
        self.write()?.checks.push(check);
        Ok(())
    }

    fn list_checks(&self, filter: &CheckFilter, page: Page) -> Result<Vec<SpatialCheck>> {
        let inner = self.read()?;
        Ok(inner
            .checks
            .iter()
            .filter(|c| filter.dataset_id.is_none_or(|ds| c.dataset_id == ds))
            .filter(|c| {
                filter
                    .check_type
                    .as_deref()
                    .is_none_or(|t| c.check_type == t)
            })
            .filter(|c| filter.check_result.is_none_or(|r| c.check_result == r))
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    fn check_stats(&self, dataset: Option<DatasetId>) -> Result<CheckStats> {
        let inner = self.read()?;
        let mut stats = CheckStats::default();
        for check in inner
            .checks
            .iter()
            .filter(|c| dataset.is_none_or(|ds| c.dataset_id == ds))
        {
            stats.record(&check.check_type, check.check_result);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{fingerprint_wkt, AttributeMap};
    use crate::geometry::NormalizeConfig;
    use serde_json::json;

    fn snapshot_for(
        dataset_id: DatasetId,
        row: &str,
        wkt: &str,
        attrs: AttributeMap,
    ) -> GeometrySnapshot {
        let (fingerprint, metadata) =
            fingerprint_wkt(wkt, &attrs, &NormalizeConfig::default()).unwrap();
        GeometrySnapshot {
            id: SnapshotId::new(),
            dataset_id,
            source_row_id: row.to_string(),
            wkt: wkt.to_string(),
            attributes: attrs,
            fingerprint,
            metadata,
            created_at: Utc::now(),
        }
    }

    fn pending_diff(dataset_id: DatasetId) -> GeometryDiff {
        GeometryDiff {
            id: DiffId::new(),
            dataset_id,
            diff_type: crate::model::DiffType::New,
            old_snapshot_id: None,
            new_snapshot_id: Some(SnapshotId::new()),
            geometry_changed: true,
            attributes_changed: false,
            confidence: 1.0,
            status: ReviewStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_snapshot_idempotent() {
        let store = MemoryStore::new();
        let ds = DatasetId::new();
        let wkt = "POINT(1 2)";
        let attrs: AttributeMap = [("name".to_string(), json!("a"))].into_iter().collect();

        let first = store
            .record_snapshot(snapshot_for(ds, "r1", wkt, attrs.clone()))
            .unwrap();
        assert!(first.created());

        let second = store
            .record_snapshot(snapshot_for(ds, "r1", wkt, attrs))
            .unwrap();
        assert!(!second.created());
        assert_eq!(second.snapshot().id, first.snapshot().id);
        assert_eq!(store.snapshot_count(ds).unwrap(), 1);
    }

    #[test]
    fn test_record_snapshot_supersedes() {
        let store = MemoryStore::new();
        let ds = DatasetId::new();
        let attrs = AttributeMap::new();

        let first = store
            .record_snapshot(snapshot_for(ds, "r1", "POINT(1 2)", attrs.clone()))
            .unwrap();
        let second = store
            .record_snapshot(snapshot_for(ds, "r1", "POINT(3 4)", attrs))
            .unwrap();

        let RecordOutcome::Created {
            snapshot,
            superseded,
        } = second
        else {
            panic!("expected Created");
        };
        assert_eq!(superseded.unwrap().id, first.snapshot().id);

        // One current snapshot per row; the superseded one stays readable.
        assert_eq!(store.snapshot_count(ds).unwrap(), 1);
        assert_eq!(
            store.current_snapshot_for_row(ds, "r1").unwrap().unwrap().id,
            snapshot.id
        );
        assert!(store.snapshot(first.snapshot().id).is_ok());
    }

    #[test]
    fn test_retire_snapshot() {
        let store = MemoryStore::new();
        let ds = DatasetId::new();
        let outcome = store
            .record_snapshot(snapshot_for(ds, "r1", "POINT(1 2)", AttributeMap::new()))
            .unwrap();

        store.retire_snapshot(ds, "r1").unwrap();
        assert_eq!(store.snapshot_count(ds).unwrap(), 0);
        assert!(store.current_snapshot_for_row(ds, "r1").unwrap().is_none());
        // Still readable by id for review.
        assert!(store.snapshot(outcome.snapshot().id).is_ok());

        // Retiring an absent row is a no-op.
        store.retire_snapshot(ds, "missing").unwrap();
    }

    #[test]
    fn test_review_diff_single_use() {
        let store = MemoryStore::new();
        let ds = DatasetId::new();
        let diff = pending_diff(ds);
        let id = diff.id;
        store.insert_diff(diff).unwrap();

        let reviewed = store
            .review_diff(id, ReviewDecision::Accept, "alex", Utc::now())
            .unwrap();
        assert_eq!(reviewed.status, ReviewStatus::Accepted);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("alex"));

        // Second review is rejected and leaves the first decision in place.
        let err = store
            .review_diff(id, ReviewDecision::Reject, "sam", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(store.diff(id).unwrap().status, ReviewStatus::Accepted);
    }

    #[test]
    fn test_review_missing_diff_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .review_diff(DiffId::new(), ReviewDecision::Accept, "alex", Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn test_review_batch_all_or_nothing() {
        let store = MemoryStore::new();
        let ds = DatasetId::new();
        let a = pending_diff(ds);
        let a_id = a.id;
        store.insert_diff(a).unwrap();

        // Batch containing an unknown id changes nothing.
        let err = store
            .review_batch(
                &[a_id, DiffId::new()],
                ReviewDecision::Accept,
                "alex",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(store.diff(a_id).unwrap().status, ReviewStatus::Pending);

        let reviewed = store
            .review_batch(&[a_id], ReviewDecision::Reject, "alex", Utc::now())
            .unwrap();
        assert_eq!(reviewed.len(), 1);
        assert_eq!(store.diff(a_id).unwrap().status, ReviewStatus::Rejected);
    }

    #[test]
    fn test_check_stats_filterable_by_dataset() {
        use crate::model::{CheckResult, SpatialCheck};
        let store = MemoryStore::new();
        let ds_a = DatasetId::new();
        let ds_b = DatasetId::new();

        for (ds, result) in [
            (ds_a, CheckResult::Pass),
            (ds_a, CheckResult::Fail),
            (ds_b, CheckResult::Warning),
        ] {
            store
                .insert_check(SpatialCheck {
                    id: crate::id::CheckId::new(),
                    dataset_id: ds,
                    snapshot_id: SnapshotId::new(),
                    check_type: "validity".to_string(),
                    check_result: result,
                    error_message: None,
                    error_details: None,
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        let all = store.check_stats(None).unwrap();
        assert_eq!(all.total(), 3);
        let only_a = store.check_stats(Some(ds_a)).unwrap();
        assert_eq!(only_a.total(), 2);
        assert_eq!(only_a.failed(), 1);
    }
}
