//! Orchestration layer of the geomon change-detection engine.
//!
//! [`Engine`] ties the core domain layer and the check registry together:
//!
//! - [`classify`]: one feed of source features against stored snapshots,
//!   emitting PENDING diffs
//! - [`run`]: background quality-check runs with pollable progress and
//!   per-dataset single-flight
//! - [`review`]: the accept/reject transition on pending diffs
//! - [`view`]: GeoJSON rendering and aggregate statistics
//!
//! The engine is cheap to clone; clones share the store, registry, and run
//! tracker.

pub mod classify;
pub mod error;
pub mod review;
pub mod run;
pub mod view;

use geomon_checks::CheckRegistry;
use geomon_core::geometry::NormalizeConfig;
use geomon_core::id::DatasetId;
use geomon_core::model::Dataset;
use geomon_core::store::EngineStore;
use std::sync::Arc;
use std::time::Duration;

pub use classify::{ClassifierConfig, ClassifyReport, MalformedFeature};
pub use error::{EngineError, Result};
pub use run::{RunProgress, RunStatus, RunSummary};
pub use view::{geometry_to_geojson, DiffView, SnapshotView};

/// Engine-wide configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Normalization applied before fingerprinting.
    pub normalize: NormalizeConfig,
    /// Confidence-scoring thresholds.
    pub classifier: ClassifierConfig,
    /// How long completed/failed run states stay pollable.
    pub run_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            classifier: ClassifierConfig::default(),
            run_retention: Duration::from_secs(300),
        }
    }
}

/// The change-detection and quality-check engine.
#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Arc<dyn EngineStore>,
    pub(crate) registry: Arc<CheckRegistry>,
    pub(crate) runs: run::RunTracker,
    pub(crate) config: EngineConfig,
}

impl Engine {
    /// Engine with the default check registry and configuration.
    pub fn new(store: Arc<dyn EngineStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Engine with explicit configuration.
    pub fn with_config(store: Arc<dyn EngineStore>, config: EngineConfig) -> Self {
        Self {
            store,
            registry: Arc::new(CheckRegistry::with_defaults()),
            runs: run::RunTracker::new(config.run_retention),
            config,
        }
    }

    /// Replace the check registry (builder style).
    pub fn with_registry(mut self, registry: CheckRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn EngineStore> {
        &self.store
    }

    /// Insert or replace a dataset descriptor.
    pub fn upsert_dataset(&self, dataset: Dataset) -> Result<()> {
        Ok(self.store.upsert_dataset(dataset)?)
    }

    /// Look up a dataset.
    pub fn dataset(&self, id: DatasetId) -> Result<Dataset> {
        Ok(self.store.dataset(id)?)
    }
}
