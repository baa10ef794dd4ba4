//! Domain records: datasets, snapshots, diffs, and check outcomes.
//!
//! Snapshots and checks are append-only; a snapshot is superseded, never
//! mutated. A diff carries exactly one mutable field group — the review
//! decision — set once by the review transition.

use crate::fingerprint::{AttributeMap, Fingerprint};
use crate::geometry::GeometryMetadata;
use crate::id::{CheckId, DatasetId, DiffId, SnapshotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Dataset
// ============================================================================

/// A monitored spatial source.
///
/// Owned and mutated by the external configuration subsystem; this engine
/// only reads it (and stamps `last_check_at` after a classification cycle).
/// Connection identity and credentials stay outside the engine entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub description: Option<String>,
    /// Source schema name (e.g. "public").
    pub schema_name: String,
    /// Source table containing geometries.
    pub table_name: String,
    /// Name of the geometry column in the source table.
    pub geometry_column: String,
    /// Polling interval for the external scheduler.
    pub check_interval_minutes: u32,
    pub is_active: bool,
    pub last_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Dataset {
    /// Create an active dataset descriptor with defaults matching the
    /// common source layout.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            id: DatasetId::new(),
            name: name.into(),
            description: None,
            schema_name: "public".to_string(),
            table_name: table_name.into(),
            geometry_column: "geom".to_string(),
            check_interval_minutes: 60,
            is_active: true,
            last_check_at: None,
            created_at: Utc::now(),
        }
    }
}

/// One source row as delivered by the external enumeration: the only way
/// source data enters the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFeature {
    /// Stable row identity supplied by the source (primary key, gid, ...).
    pub source_row_id: String,
    /// Geometry payload as WKT.
    pub wkt: String,
    /// Non-geometry columns.
    pub attributes: AttributeMap,
}

impl SourceFeature {
    pub fn new(
        source_row_id: impl Into<String>,
        wkt: impl Into<String>,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            source_row_id: source_row_id.into(),
            wkt: wkt.into(),
            attributes,
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable point-in-time capture of one source geometry.
///
/// Created only when the composite fingerprint differs from the row's
/// current snapshot (or the row is first seen). Never mutated; a newer
/// snapshot for the same row supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub id: SnapshotId,
    pub dataset_id: DatasetId,
    pub source_row_id: String,
    /// Geometry payload, WKT source of truth.
    pub wkt: String,
    pub attributes: AttributeMap,
    pub fingerprint: Fingerprint,
    /// Precomputed measures for confidence scoring and size checks.
    pub metadata: GeometryMetadata,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Diff
// ============================================================================

/// Classification of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffType {
    New,
    Updated,
    Deleted,
}

/// Review state of a diff. `Pending` is the only creation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A reviewer's decision on a pending diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Accept,
    Reject,
}

impl ReviewDecision {
    /// The status this decision transitions a pending diff to.
    pub fn target_status(&self) -> ReviewStatus {
        match self {
            ReviewDecision::Accept => ReviewStatus::Accepted,
            ReviewDecision::Reject => ReviewStatus::Rejected,
        }
    }
}

/// A classified change between two snapshots (or a snapshot and its
/// absence). Created by the classifier; mutated only by the review
/// transition; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryDiff {
    pub id: DiffId,
    pub dataset_id: DatasetId,
    pub diff_type: DiffType,
    /// Absent for NEW diffs.
    pub old_snapshot_id: Option<SnapshotId>,
    /// Absent for DELETED diffs.
    pub new_snapshot_id: Option<SnapshotId>,
    pub geometry_changed: bool,
    pub attributes_changed: bool,
    /// Certainty in [0, 1] that this is a genuine change rather than
    /// measurement noise.
    pub confidence: f64,
    pub status: ReviewStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Checks
// ============================================================================

/// Outcome level of one spatial quality check.
///
/// `Error` is the internal-error outcome for payloads a check could not
/// evaluate at all — kept distinct from `Fail` so a parsing defect is never
/// mistaken for a genuine quality failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckResult {
    Pass,
    Fail,
    Warning,
    Error,
}

/// One persisted test outcome. Immutable once written; history accumulates
/// per snapshot with no latest-only invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialCheck {
    pub id: CheckId,
    pub dataset_id: DatasetId,
    pub snapshot_id: SnapshotId,
    /// Stable registry name of the check ("validity", "duplicate", ...).
    pub check_type: String,
    pub check_result: CheckResult,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Aggregates
// ============================================================================

/// Per-result counters for one check type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResultCounts {
    pub pass: u64,
    pub fail: u64,
    pub warning: u64,
    pub error: u64,
}

impl CheckResultCounts {
    /// Bump the counter for one result.
    pub fn record(&mut self, result: CheckResult) {
        match result {
            CheckResult::Pass => self.pass += 1,
            CheckResult::Fail => self.fail += 1,
            CheckResult::Warning => self.warning += 1,
            CheckResult::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.pass + self.fail + self.warning + self.error
    }
}

/// Check counts grouped by check type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStats {
    pub by_type: BTreeMap<String, CheckResultCounts>,
}

impl CheckStats {
    /// Bump the counter for one (type, result) pair.
    pub fn record(&mut self, check_type: &str, result: CheckResult) {
        self.by_type
            .entry(check_type.to_string())
            .or_default()
            .record(result);
    }

    /// Total failed checks across all types.
    pub fn failed(&self) -> u64 {
        self.by_type.values().map(|c| c.fail).sum()
    }

    /// Total recorded checks across all types.
    pub fn total(&self) -> u64 {
        self.by_type.values().map(|c| c.total()).sum()
    }
}

/// Diff counters for one dataset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiffStats {
    pub total: u64,
    pub pending: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub new: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl DiffStats {
    /// Fold one diff into the counters.
    pub fn record(&mut self, diff: &GeometryDiff) {
        self.total += 1;
        match diff.status {
            ReviewStatus::Pending => self.pending += 1,
            ReviewStatus::Accepted => self.accepted += 1,
            ReviewStatus::Rejected => self.rejected += 1,
        }
        match diff.diff_type {
            DiffType::New => self.new += 1,
            DiffType::Updated => self.updated += 1,
            DiffType::Deleted => self.deleted += 1,
        }
    }
}

/// Aggregate view over one dataset's monitoring state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub dataset_id: DatasetId,
    pub total_snapshots: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub diff_stats: DiffStats,
    pub check_stats: CheckStats,
}

// ============================================================================
// Query shapes
// ============================================================================

/// Filter for diff listings.
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    pub dataset_id: Option<DatasetId>,
    pub diff_type: Option<DiffType>,
    pub status: Option<ReviewStatus>,
}

/// Filter for check listings.
#[derive(Debug, Clone, Default)]
pub struct CheckFilter {
    pub dataset_id: Option<DatasetId>,
    pub check_type: Option<String>,
    pub check_result: Option<CheckResult>,
}

/// Offset/limit pagination.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}
