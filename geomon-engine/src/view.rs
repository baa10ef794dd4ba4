//! Read-side views: GeoJSON geometry rendering, snapshot and diff views,
//! dataset statistics.

use crate::error::Result;
use crate::Engine;
use chrono::{DateTime, Utc};
use geo_types::{Geometry, LineString, Polygon};
use geomon_core::fingerprint::AttributeMap;
use geomon_core::geometry::parse_wkt;
use geomon_core::id::{DatasetId, DiffId, SnapshotId};
use geomon_core::model::{
    CheckFilter, CheckStats, DatasetStats, GeometryDiff, GeometrySnapshot, Page, SpatialCheck,
};
use serde::Serialize;
use serde_json::{json, Value};

/// One snapshot rendered for display: GeoJSON geometry plus attributes.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    pub snapshot_id: SnapshotId,
    pub source_row_id: String,
    /// GeoJSON geometry object.
    pub geometry: Value,
    pub attributes: AttributeMap,
    pub created_at: DateTime<Utc>,
}

/// A diff with both sides rendered for side-by-side review.
#[derive(Debug, Clone, Serialize)]
pub struct DiffView {
    #[serde(flatten)]
    pub diff: GeometryDiff,
    /// Absent for NEW diffs.
    pub old_snapshot: Option<SnapshotView>,
    /// Absent for DELETED diffs.
    pub new_snapshot: Option<SnapshotView>,
}

impl Engine {
    /// Render one snapshot for display.
    pub fn snapshot_view(&self, id: SnapshotId) -> Result<SnapshotView> {
        snapshot_view(self.store.snapshot(id)?)
    }

    /// Render a diff with both snapshot sides resolved.
    pub fn diff_view(&self, id: DiffId) -> Result<DiffView> {
        let diff = self.store.diff(id)?;
        let old_snapshot = match diff.old_snapshot_id {
            Some(id) => Some(snapshot_view(self.store.snapshot(id)?)?),
            None => None,
        };
        let new_snapshot = match diff.new_snapshot_id {
            Some(id) => Some(snapshot_view(self.store.snapshot(id)?)?),
            None => None,
        };
        Ok(DiffView {
            diff,
            old_snapshot,
            new_snapshot,
        })
    }

    /// Aggregate monitoring statistics for one dataset.
    pub fn dataset_stats(&self, dataset_id: DatasetId) -> Result<DatasetStats> {
        let dataset = self.store.dataset(dataset_id)?;
        Ok(DatasetStats {
            dataset_id,
            total_snapshots: self.store.snapshot_count(dataset_id)?,
            last_check_at: dataset.last_check_at,
            diff_stats: self.store.diff_stats(dataset_id)?,
            check_stats: self.store.check_stats(Some(dataset_id))?,
        })
    }

    /// List stored check outcomes matching a filter, in creation order.
    pub fn list_checks(&self, filter: &CheckFilter, page: Page) -> Result<Vec<SpatialCheck>> {
        Ok(self.store.list_checks(filter, page)?)
    }

    /// Check counters, optionally narrowed to one dataset.
    pub fn check_stats(&self, dataset: Option<DatasetId>) -> Result<CheckStats> {
        Ok(self.store.check_stats(dataset)?)
    }
}

fn snapshot_view(snapshot: GeometrySnapshot) -> Result<SnapshotView> {
    let geometry = geometry_to_geojson(&parse_wkt(&snapshot.wkt)?);
    Ok(SnapshotView {
        snapshot_id: snapshot.id,
        source_row_id: snapshot.source_row_id,
        geometry,
        attributes: snapshot.attributes,
        created_at: snapshot.created_at,
    })
}

/// Render a geometry as a GeoJSON geometry object.
///
/// The segment, rect, and triangle primitives render as the LineString and
/// Polygon they are equivalent to; GeoJSON has no narrower type for them.
pub fn geometry_to_geojson(geom: &Geometry<f64>) -> Value {
    match geom {
        Geometry::Point(p) => json!({
            "type": "Point",
            "coordinates": [p.x(), p.y()],
        }),
        Geometry::Line(line) => json!({
            "type": "LineString",
            "coordinates": [[line.start.x, line.start.y], [line.end.x, line.end.y]],
        }),
        Geometry::LineString(ls) => json!({
            "type": "LineString",
            "coordinates": linestring_coords(ls),
        }),
        Geometry::Polygon(poly) => json!({
            "type": "Polygon",
            "coordinates": polygon_coords(poly),
        }),
        Geometry::Rect(rect) => geometry_to_geojson(&Geometry::Polygon(rect.to_polygon())),
        Geometry::Triangle(tri) => geometry_to_geojson(&Geometry::Polygon(tri.to_polygon())),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.iter().map(|p| json!([p.x(), p.y()])).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.iter().map(linestring_coords).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(mpoly) => json!({
            "type": "MultiPolygon",
            "coordinates": mpoly.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.iter().map(geometry_to_geojson).collect::<Vec<_>>(),
        }),
    }
}

fn linestring_coords(ls: &LineString<f64>) -> Vec<Value> {
    ls.coords().map(|c| json!([c.x, c.y])).collect()
}

fn polygon_coords(poly: &Polygon<f64>) -> Vec<Vec<Value>> {
    std::iter::once(poly.exterior())
        .chain(poly.interiors().iter())
        .map(linestring_coords)
        .collect()
}
