//! Geometry payload handling: WKT parsing, normalization, and metadata.
//!
//! WKT is the stored source of truth for every snapshot. Parsing happens at
//! capture time (fingerprinting, metadata) and again at check/display time.
//!
//! # Normalization
//!
//! Fingerprints must be stable under source formatting noise, so hashing
//! operates on a normalized form: coordinates rounded to a configured
//! decimal precision, with polygon rings closed. Ring closure is enforced
//! structurally — `geo_types::Polygon` closes its rings at construction, so
//! an unclosed ring in the source WKT and its closed equivalent normalize to
//! the same coordinate sequence. Normalization never reorients rings: ring
//! orientation is a quality signal, not formatting noise.

use crate::error::{CoreError, Result};
use geo::line_measures::LengthMeasurable;
use geo::{Area, Centroid, CoordsIter, Euclidean, MapCoords};
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Geometry type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryType {
    Point = 0,
    LineString = 1,
    Polygon = 2,
    MultiPoint = 3,
    MultiLineString = 4,
    MultiPolygon = 5,
    GeometryCollection = 6,
}

impl GeometryType {
    /// Classify a geo-types Geometry.
    pub fn from_geometry(geom: &Geometry<f64>) -> Self {
        match geom {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// Check if this is an areal type.
    pub fn is_areal(&self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }

    /// Check if this is a linear type.
    pub fn is_linear(&self) -> bool {
        matches!(
            self,
            GeometryType::LineString | GeometryType::MultiLineString
        )
    }
}

/// Normalization settings applied before fingerprinting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Decimal places coordinates are rounded to before hashing.
    /// Default: 9 (~0.1mm at the equator for degree coordinates), which
    /// absorbs float formatting noise without merging real edits.
    pub precision_decimals: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            precision_decimals: 9,
        }
    }
}

/// Parse a WKT string to a geo-types Geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    use std::str::FromStr;
    wkt::Wkt::from_str(wkt)
        .map_err(|e| CoreError::WktParse(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| CoreError::WktParse(format!("{:?}", e)))
        })
}

/// Round every coordinate to the configured precision.
///
/// Returns a new geometry; the input is unchanged. Polygon rings remain
/// closed because rounding maps equal endpoints to equal endpoints.
pub fn normalize(geom: &Geometry<f64>, config: &NormalizeConfig) -> Geometry<f64> {
    let factor = 10f64.powi(config.precision_decimals as i32);
    geom.clone().map_coords(|c: Coord<f64>| Coord {
        x: (c.x * factor).round() / factor,
        y: (c.y * factor).round() / factor,
    })
}

// ============================================================================
// Canonical byte form
// ============================================================================

// Type tags for the canonical serialization. These are part of the
// fingerprint definition: changing them changes every stored fingerprint.
const TAG_POINT: u8 = 0;
const TAG_LINESTRING: u8 = 1;
const TAG_POLYGON: u8 = 2;
const TAG_MULTIPOINT: u8 = 3;
const TAG_MULTILINESTRING: u8 = 4;
const TAG_MULTIPOLYGON: u8 = 5;
const TAG_COLLECTION: u8 = 6;

/// Deterministic byte serialization of a geometry's coordinate structure.
///
/// Layout: type tag (1B), then counts as u32 LE and coordinates as f64 LE
/// pairs, recursing for multi-part geometries. This is the hashing input for
/// the geometry fingerprint; callers normalize first.
pub fn canonical_bytes(geom: &Geometry<f64>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + geom.coords_count() * 16);
    write_geometry(&mut buf, geom);
    buf
}

fn write_coord(buf: &mut Vec<u8>, c: Coord<f64>) {
    buf.extend_from_slice(&c.x.to_le_bytes());
    buf.extend_from_slice(&c.y.to_le_bytes());
}

fn write_linestring(buf: &mut Vec<u8>, ls: &LineString<f64>) {
    buf.extend_from_slice(&(ls.0.len() as u32).to_le_bytes());
    for &c in &ls.0 {
        write_coord(buf, c);
    }
}

fn write_polygon(buf: &mut Vec<u8>, poly: &Polygon<f64>) {
    buf.extend_from_slice(&((1 + poly.interiors().len()) as u32).to_le_bytes());
    write_linestring(buf, poly.exterior());
    for ring in poly.interiors() {
        write_linestring(buf, ring);
    }
}

fn write_geometry(buf: &mut Vec<u8>, geom: &Geometry<f64>) {
    match geom {
        Geometry::Point(p) => {
            buf.push(TAG_POINT);
            write_coord(buf, p.0);
        }
        Geometry::Line(line) => {
            // Represent as a two-point linestring so LINESTRING(a b, c d)
            // and the segment primitive hash identically.
            buf.push(TAG_LINESTRING);
            buf.extend_from_slice(&2u32.to_le_bytes());
            write_coord(buf, line.start);
            write_coord(buf, line.end);
        }
        Geometry::LineString(ls) => {
            buf.push(TAG_LINESTRING);
            write_linestring(buf, ls);
        }
        Geometry::Polygon(poly) => {
            buf.push(TAG_POLYGON);
            write_polygon(buf, poly);
        }
        Geometry::Rect(rect) => {
            buf.push(TAG_POLYGON);
            write_polygon(buf, &rect.to_polygon());
        }
        Geometry::Triangle(tri) => {
            buf.push(TAG_POLYGON);
            write_polygon(buf, &tri.to_polygon());
        }
        Geometry::MultiPoint(mp) => {
            buf.push(TAG_MULTIPOINT);
            buf.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());
            for p in mp.iter() {
                write_coord(buf, p.0);
            }
        }
        Geometry::MultiLineString(mls) => {
            buf.push(TAG_MULTILINESTRING);
            buf.extend_from_slice(&(mls.0.len() as u32).to_le_bytes());
            for ls in mls.iter() {
                write_linestring(buf, ls);
            }
        }
        Geometry::MultiPolygon(mpoly) => {
            buf.push(TAG_MULTIPOLYGON);
            buf.extend_from_slice(&(mpoly.0.len() as u32).to_le_bytes());
            for poly in mpoly.iter() {
                write_polygon(buf, poly);
            }
        }
        Geometry::GeometryCollection(gc) => {
            buf.push(TAG_COLLECTION);
            buf.extend_from_slice(&(gc.0.len() as u32).to_le_bytes());
            for g in gc.iter() {
                write_geometry(buf, g);
            }
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Precomputed geometry metadata.
///
/// Captured once per snapshot and used for change-confidence scoring
/// (centroid displacement, area delta) and size-anomaly checks without
/// reparsing WKT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryMetadata {
    /// Geometry type.
    pub geom_type: GeometryType,

    /// Unsigned planar area (0 for non-areal types).
    pub area: f64,

    /// Euclidean length (0 for non-linear types).
    pub length: f64,

    /// Centroid (x, y), if defined for this geometry.
    pub centroid: Option<(f64, f64)>,

    /// Total coordinate count.
    pub vertex_count: usize,
}

impl GeometryMetadata {
    /// Compute metadata from a parsed geometry.
    pub fn compute(geom: &Geometry<f64>) -> Self {
        let geom_type = GeometryType::from_geometry(geom);

        // Planar measures: source data arrives in the dataset's own CRS, so
        // the engine compares like with like rather than converting units.
        let area = geom.unsigned_area();
        let length = match geom {
            Geometry::Line(line) => line.length(&Euclidean),
            Geometry::LineString(ls) => ls.length(&Euclidean),
            Geometry::MultiLineString(mls) => mls.length(&Euclidean),
            _ => 0.0,
        };
        let centroid = geom.centroid().map(|c| (c.x(), c.y()));

        Self {
            geom_type,
            area,
            length,
            centroid,
            vertex_count: geom.coords_count(),
        }
    }

    /// Planar distance between this geometry's centroid and another's.
    ///
    /// `None` when either centroid is undefined (empty geometry).
    pub fn centroid_displacement(&self, other: &GeometryMetadata) -> Option<f64> {
        let (ax, ay) = self.centroid?;
        let (bx, by) = other.centroid?;
        Some((ax - bx).hypot(ay - by))
    }
}
