//! Quality-check run orchestration.
//!
//! A run walks every current snapshot of one dataset through the check
//! registry and persists the outcomes. Runs execute on a background task;
//! callers poll [`RunStatus`] for progress. One run per dataset at a time:
//! starting a second while one is running is a conflict. Terminal states
//! (completed/failed) stay pollable for a retention window, then collapse
//! back to idle.

use crate::error::{EngineError, Result};
use geomon_core::id::DatasetId;
use geomon_core::model::CheckResultCounts;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

/// Progress counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    /// Snapshots the run will evaluate; fixed when the run starts.
    pub total: u64,
    /// Snapshots evaluated so far. Never decreases.
    pub checked: u64,
}

impl RunProgress {
    /// Completion percentage in [0, 100]; 0 for an empty dataset.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.checked as f64 / self.total as f64 * 100.0
        }
    }
}

/// Aggregate result of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub snapshots_checked: u64,
    pub checks_written: u64,
    pub failed_checks: u64,
    /// Per-check-type result counters.
    pub by_check: BTreeMap<String, CheckResultCounts>,
}

/// Pollable state of a dataset's quality-check run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// No run active or retained.
    Idle,
    Running {
        progress: RunProgress,
    },
    Completed {
        progress: RunProgress,
        summary: RunSummary,
    },
    /// The run aborted; outcomes written before the failure remain stored.
    Failed {
        progress: RunProgress,
        error: String,
    },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed { .. } | RunStatus::Failed { .. })
    }
}

struct RunEntry {
    status: RunStatus,
    /// Set when the run reaches a terminal state; drives retention pruning.
    finished_at: Option<Instant>,
}

/// Per-dataset run registry enforcing single-flight.
///
/// All transitions happen under one mutex, so begin-if-idle is atomic with
/// respect to concurrent starters.
#[derive(Clone)]
pub struct RunTracker {
    inner: Arc<Mutex<FxHashMap<DatasetId, RunEntry>>>,
    retention: Duration,
}

impl RunTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FxHashMap::default())),
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<DatasetId, RunEntry>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // A panic mid-update can only have left a stale status behind,
            // never a torn one; keep serving.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn prune(&self, map: &mut FxHashMap<DatasetId, RunEntry>) {
        map.retain(|_, entry| match entry.finished_at {
            Some(at) => at.elapsed() < self.retention,
            None => true,
        });
    }

    /// Claim the dataset for a new run. Fails with a conflict if a run is
    /// already in flight.
    pub fn try_begin(&self, dataset: DatasetId, total: u64) -> Result<()> {
        let mut map = self.lock();
        self.prune(&mut map);
        if let Some(entry) = map.get(&dataset) {
            if !entry.status.is_terminal() {
                return Err(EngineError::Conflict(format!(
                    "a quality-check run is already in progress for dataset {dataset}"
                )));
            }
        }
        map.insert(
            dataset,
            RunEntry {
                status: RunStatus::Running {
                    progress: RunProgress { total, checked: 0 },
                },
                finished_at: None,
            },
        );
        Ok(())
    }

    /// Record progress. Counters only move forward.
    pub fn set_checked(&self, dataset: DatasetId, checked: u64) {
        let mut map = self.lock();
        if let Some(RunEntry {
            status: RunStatus::Running { progress },
            ..
        }) = map.get_mut(&dataset)
        {
            progress.checked = progress.checked.max(checked);
        }
    }

    /// Transition a running dataset to completed.
    pub fn complete(&self, dataset: DatasetId, summary: RunSummary) {
        self.finish(dataset, |progress| RunStatus::Completed { progress, summary });
    }

    /// Transition a running dataset to failed.
    pub fn fail(&self, dataset: DatasetId, error: String) {
        warn!(dataset = %dataset, error = %error, "quality-check run failed");
        self.finish(dataset, |progress| RunStatus::Failed { progress, error });
    }

    fn finish(&self, dataset: DatasetId, terminal: impl FnOnce(RunProgress) -> RunStatus) {
        let mut map = self.lock();
        if let Some(entry) = map.get_mut(&dataset) {
            if let RunStatus::Running { progress } = entry.status {
                entry.status = terminal(progress);
                entry.finished_at = Some(Instant::now());
            }
        }
    }

    /// Current status for a dataset. Terminal entries past the retention
    /// window read as idle.
    pub fn status(&self, dataset: DatasetId) -> RunStatus {
        let mut map = self.lock();
        self.prune(&mut map);
        map.get(&dataset)
            .map(|entry| entry.status.clone())
            .unwrap_or(RunStatus::Idle)
    }
}

impl crate::Engine {
    /// Start a background quality-check run over a dataset's current
    /// snapshots.
    ///
    /// Returns as soon as the run is claimed; poll [`Engine::run_status`]
    /// for progress. Fails with `NotFound` for an unknown dataset and
    /// `Conflict` when a run is already in flight for it.
    ///
    /// [`Engine::run_status`]: crate::Engine::run_status
    pub fn start_quality_check_run(&self, dataset_id: DatasetId) -> Result<()> {
        let dataset = self.store.dataset(dataset_id)?;
        let snapshots = self.store.current_snapshots(dataset_id)?;
        self.runs.try_begin(dataset_id, snapshots.len() as u64)?;
        tracing::info!(
            dataset = %dataset_id,
            name = %dataset.name,
            snapshots = snapshots.len(),
            "starting quality-check run"
        );

        let engine = self.clone();
        tokio::spawn(async move {
            engine.execute_run(dataset_id, snapshots);
        });
        Ok(())
    }

    /// Pollable status of a dataset's quality-check run.
    pub fn run_status(&self, dataset_id: DatasetId) -> RunStatus {
        self.runs.status(dataset_id)
    }

    fn execute_run(
        &self,
        dataset_id: DatasetId,
        snapshots: Vec<geomon_core::model::GeometrySnapshot>,
    ) {
        use geomon_checks::CheckContext;
        use geomon_core::geometry::parse_wkt;
        use geomon_core::id::CheckId;
        use geomon_core::model::{CheckResult, SpatialCheck};

        let dataset_ctx = geomon_checks::DatasetContext::from_snapshots(&snapshots);
        let mut summary = RunSummary::default();

        for (idx, snapshot) in snapshots.iter().enumerate() {
            let outcomes = match parse_wkt(&snapshot.wkt) {
                Ok(geometry) => {
                    let ctx = CheckContext {
                        geometry: &geometry,
                        attributes: &snapshot.attributes,
                        metadata: &snapshot.metadata,
                        fingerprint: &snapshot.fingerprint,
                        dataset: &dataset_ctx,
                    };
                    self.registry.run_all(&ctx)
                }
                // A stored snapshot that no longer parses is an internal
                // error per check, never a quality failure.
                Err(err) => self.registry.error_outcomes(&err.to_string()),
            };

            for (name, outcome) in outcomes {
                summary
                    .by_check
                    .entry(name.to_string())
                    .or_default()
                    .record(outcome.result);
                if outcome.result == CheckResult::Fail {
                    summary.failed_checks += 1;
                }
                summary.checks_written += 1;

                let check = SpatialCheck {
                    id: CheckId::new(),
                    dataset_id,
                    snapshot_id: snapshot.id,
                    check_type: name.to_string(),
                    check_result: outcome.result,
                    error_message: outcome.message,
                    error_details: outcome.details,
                    created_at: chrono::Utc::now(),
                };
                if let Err(err) = self.store.insert_check(check) {
                    // Outcomes written before the failure stay stored.
                    self.runs.fail(dataset_id, err.to_string());
                    return;
                }
            }

            summary.snapshots_checked += 1;
            self.runs.set_checked(dataset_id, (idx + 1) as u64);
        }

        self.runs.complete(dataset_id, summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RunTracker {
        RunTracker::new(Duration::from_secs(300))
    }

    #[test]
    fn test_single_flight() {
        let tracker = tracker();
        let ds = DatasetId::new();
        tracker.try_begin(ds, 10).unwrap();
        let err = tracker.try_begin(ds, 10).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        // A different dataset is unaffected.
        tracker.try_begin(DatasetId::new(), 3).unwrap();

        // After completion the dataset can run again.
        tracker.complete(ds, RunSummary::default());
        tracker.try_begin(ds, 10).unwrap();
    }

    #[test]
    fn test_progress_is_monotonic() {
        let tracker = tracker();
        let ds = DatasetId::new();
        tracker.try_begin(ds, 10).unwrap();
        tracker.set_checked(ds, 4);
        tracker.set_checked(ds, 2);
        let RunStatus::Running { progress } = tracker.status(ds) else {
            panic!("expected running");
        };
        assert_eq!(progress.checked, 4);
        assert_eq!(progress.total, 10);
    }

    #[test]
    fn test_terminal_state_retained_then_pruned() {
        let tracker = RunTracker::new(Duration::from_millis(20));
        let ds = DatasetId::new();
        tracker.try_begin(ds, 1).unwrap();
        tracker.fail(ds, "boom".to_string());

        assert!(matches!(tracker.status(ds), RunStatus::Failed { .. }));
        std::thread::sleep(Duration::from_millis(40));
        assert!(matches!(tracker.status(ds), RunStatus::Idle));
    }

    #[test]
    fn test_unknown_dataset_reads_idle() {
        assert!(matches!(tracker().status(DatasetId::new()), RunStatus::Idle));
    }

    #[test]
    fn test_finish_ignores_non_running() {
        let tracker = tracker();
        let ds = DatasetId::new();
        tracker.try_begin(ds, 1).unwrap();
        tracker.complete(ds, RunSummary::default());
        // A late failure report cannot overwrite the completed state.
        tracker.fail(ds, "late".to_string());
        assert!(matches!(tracker.status(ds), RunStatus::Completed { .. }));
    }
}
