//! Change classification: one feed of source features against the stored
//! current snapshots of a dataset.
//!
//! Per source row the classifier fingerprints the payload, records a
//! snapshot when the composite fingerprint changed, and emits a PENDING
//! diff classified NEW / UPDATED / DELETED. Rows whose fingerprint matches
//! their current snapshot produce nothing. Unparseable rows are reported
//! in the cycle report and skipped; they never abort the cycle and never
//! count as deletions.

use crate::error::{EngineError, Result};
use crate::Engine;
use chrono::Utc;
use geomon_core::fingerprint::fingerprint_wkt;
use geomon_core::geometry::GeometryMetadata;
use geomon_core::id::{DatasetId, DiffId, SnapshotId};
use geomon_core::model::{
    DiffType, GeometryDiff, GeometrySnapshot, ReviewStatus, SourceFeature,
};
use geomon_core::store::RecordOutcome;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{info, warn};

/// Confidence-scoring thresholds for geometry changes.
///
/// A change whose centroid displacement or area delta reaches the threshold
/// scores full confidence; smaller changes scale down linearly toward
/// `min_confidence`, never below it. Units are the dataset's CRS units.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    pub displacement_threshold: f64,
    pub area_delta_threshold: f64,
    /// Floor for geometry-change confidence. Attribute-only changes are
    /// always 1.0: fingerprints make them exact.
    pub min_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            displacement_threshold: 1.0,
            area_delta_threshold: 1.0,
            min_confidence: 0.5,
        }
    }
}

impl ClassifierConfig {
    /// Score confidence for a geometry change between two snapshots.
    pub fn geometry_confidence(&self, old: &GeometryMetadata, new: &GeometryMetadata) -> f64 {
        let ratio = match old.centroid_displacement(new) {
            Some(displacement) => {
                let area_delta = (new.area - old.area).abs();
                (displacement / self.displacement_threshold)
                    .max(area_delta / self.area_delta_threshold)
            }
            // Either centroid undefined: the shape changed class entirely.
            None => 1.0,
        };
        self.min_confidence + (1.0 - self.min_confidence) * ratio.min(1.0)
    }
}

/// A source row the classifier could not fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct MalformedFeature {
    pub source_row_id: String,
    pub error: String,
}

/// Outcome of one classification cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifyReport {
    pub snapshots_created: u64,
    pub unchanged: u64,
    pub new_diffs: u64,
    pub updated_diffs: u64,
    pub deleted_diffs: u64,
    /// Later occurrences of a source row id repeated within one feed.
    pub skipped_duplicate_rows: u64,
    pub malformed: Vec<MalformedFeature>,
    /// Wall-clock duration of the cycle.
    pub duration_ms: u64,
}

impl Engine {
    /// Classify one feed of source features against the dataset's current
    /// snapshots.
    ///
    /// The feed is taken as the complete current state of the source: rows
    /// with a current snapshot that are absent from the feed are classified
    /// DELETED. Stamps the dataset's `last_check_at` on completion.
    pub fn classify(
        &self,
        dataset_id: DatasetId,
        features: &[SourceFeature],
    ) -> Result<ClassifyReport> {
        let dataset = self.store.dataset(dataset_id)?;
        if !dataset.is_active {
            return Err(EngineError::InactiveDataset(dataset_id));
        }

        let started = std::time::Instant::now();
        let prior = self.store.current_snapshots(dataset_id)?;
        let now = Utc::now();
        let mut report = ClassifyReport::default();
        let mut seen: FxHashSet<&str> = FxHashSet::default();

        for feature in features {
            // First occurrence of a row id wins; a repeat within one feed
            // is a source defect, not a change.
            if !seen.insert(&feature.source_row_id) {
                warn!(
                    dataset = %dataset_id,
                    source_row = %feature.source_row_id,
                    "duplicate source row id in feed, skipping"
                );
                report.skipped_duplicate_rows += 1;
                continue;
            }

            let (fingerprint, metadata) =
                match fingerprint_wkt(&feature.wkt, &feature.attributes, &self.config.normalize) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(
                            dataset = %dataset_id,
                            source_row = %feature.source_row_id,
                            error = %err,
                            "unparseable source geometry, skipping row"
                        );
                        report.malformed.push(MalformedFeature {
                            source_row_id: feature.source_row_id.clone(),
                            error: err.to_string(),
                        });
                        continue;
                    }
                };

            let candidate = GeometrySnapshot {
                id: SnapshotId::new(),
                dataset_id,
                source_row_id: feature.source_row_id.clone(),
                wkt: feature.wkt.clone(),
                attributes: feature.attributes.clone(),
                fingerprint,
                metadata,
                created_at: now,
            };

            match self.store.record_snapshot(candidate)? {
                RecordOutcome::Unchanged(_) => report.unchanged += 1,
                RecordOutcome::Created {
                    snapshot,
                    superseded,
                } => {
                    report.snapshots_created += 1;
                    let diff = match superseded {
                        None => {
                            report.new_diffs += 1;
                            // Change flags describe the delta between two
                            // snapshots; with no prior side there is no
                            // attribute delta to report.
                            self.make_diff(
                                dataset_id,
                                DiffType::New,
                                None,
                                Some(&snapshot),
                                true,
                                false,
                                1.0,
                            )
                        }
                        Some(old) => {
                            let geometry_changed =
                                old.fingerprint.geometry != snapshot.fingerprint.geometry;
                            let attributes_changed =
                                old.fingerprint.attributes != snapshot.fingerprint.attributes;
                            let confidence = if geometry_changed {
                                self.config
                                    .classifier
                                    .geometry_confidence(&old.metadata, &snapshot.metadata)
                            } else {
                                1.0
                            };
                            report.updated_diffs += 1;
                            self.make_diff(
                                dataset_id,
                                DiffType::Updated,
                                Some(old.id),
                                Some(&snapshot),
                                geometry_changed,
                                attributes_changed,
                                confidence,
                            )
                        }
                    };
                    self.store.insert_diff(diff)?;
                }
            }
        }

        // Rows with a current snapshot that the feed no longer carries.
        // Malformed rows were present in the feed, so they are not deletions.
        for snapshot in &prior {
            if !seen.contains(snapshot.source_row_id.as_str()) {
                report.deleted_diffs += 1;
                let diff = self.make_diff(
                    dataset_id,
                    DiffType::Deleted,
                    Some(snapshot.id),
                    None,
                    true,
                    false,
                    1.0,
                );
                self.store.insert_diff(diff)?;
                // The row no longer has a current snapshot; the retired one
                // stays readable for review. A later cycle will not
                // re-classify the same disappearance.
                self.store
                    .retire_snapshot(dataset_id, &snapshot.source_row_id)?;
            }
        }

        self.store.touch_dataset(dataset_id, now)?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            dataset = %dataset_id,
            new = report.new_diffs,
            updated = report.updated_diffs,
            deleted = report.deleted_diffs,
            unchanged = report.unchanged,
            malformed = report.malformed.len(),
            "classification cycle complete"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn make_diff(
        &self,
        dataset_id: DatasetId,
        diff_type: DiffType,
        old_snapshot_id: Option<SnapshotId>,
        new_snapshot: Option<&GeometrySnapshot>,
        geometry_changed: bool,
        attributes_changed: bool,
        confidence: f64,
    ) -> GeometryDiff {
        GeometryDiff {
            id: DiffId::new(),
            dataset_id,
            diff_type,
            old_snapshot_id,
            new_snapshot_id: new_snapshot.map(|s| s.id),
            geometry_changed,
            attributes_changed,
            confidence,
            status: ReviewStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }
}
