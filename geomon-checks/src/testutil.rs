//! Shared fixtures for check tests.

use crate::context::DatasetContext;
use crate::registry::{CheckContext, CheckOutcome, QualityCheck};
use geo_types::Geometry;
use geomon_core::fingerprint::{AttributeMap, Fingerprint};
use geomon_core::geometry::{parse_wkt, GeometryMetadata, NormalizeConfig};
use geomon_core::id::{DatasetId, SnapshotId};
use geomon_core::model::GeometrySnapshot;

/// Everything a [`CheckContext`] borrows, owned in one place so tests can
/// build a context without wrestling lifetimes.
pub struct Fixture {
    pub attributes: AttributeMap,
    pub metadata: GeometryMetadata,
    pub fingerprint: Fingerprint,
    pub dataset: DatasetContext,
}

/// Parse `wkt` and build a fixture with empty attributes and an empty
/// dataset context.
pub fn context_for(wkt: &str) -> (Geometry<f64>, Fixture) {
    context_in_dataset(wkt, DatasetContext::default())
}

/// Parse `wkt` and build a fixture embedded in the given dataset context.
pub fn context_in_dataset(wkt: &str, dataset: DatasetContext) -> (Geometry<f64>, Fixture) {
    let config = NormalizeConfig::default();
    let geom = parse_wkt(wkt).unwrap();
    let attributes = AttributeMap::new();
    let fingerprint = Fingerprint::compute(&geom, &attributes, &config);
    let metadata = GeometryMetadata::compute(&geom);
    (
        geom,
        Fixture {
            attributes,
            metadata,
            fingerprint,
            dataset,
        },
    )
}

/// Run one check against a fixture.
pub fn run_named(
    check: &dyn QualityCheck,
    geometry: &Geometry<f64>,
    fixture: &Fixture,
) -> CheckOutcome {
    let ctx = CheckContext {
        geometry,
        attributes: &fixture.attributes,
        metadata: &fixture.metadata,
        fingerprint: &fixture.fingerprint,
        dataset: &fixture.dataset,
    };
    check.run(&ctx)
}

/// Build a snapshot for dataset-context tests.
pub fn snapshot_for(dataset_id: DatasetId, source_row_id: &str, wkt: &str) -> GeometrySnapshot {
    let config = NormalizeConfig::default();
    let geom = parse_wkt(wkt).unwrap();
    let attributes = AttributeMap::new();
    GeometrySnapshot {
        id: SnapshotId::new(),
        dataset_id,
        source_row_id: source_row_id.to_string(),
        wkt: wkt.to_string(),
        attributes: attributes.clone(),
        fingerprint: Fingerprint::compute(&geom, &attributes, &config),
        metadata: GeometryMetadata::compute(&geom),
        created_at: chrono::Utc::now(),
    }
}
