//! OGC-style geometry validity check.
//!
//! Fails on the defects the review UI most needs surfaced: self-intersecting
//! rings and linestrings, degenerate rings (too few points or zero area),
//! non-finite coordinates, and interior rings that escape their shell. The
//! first defect found is reported with a descriptive message.

use crate::registry::{CheckContext, CheckOutcome, QualityCheck};
use geo::{Area, Intersects};
use geo_types::{Geometry, Line, LineString, Point, Polygon};

/// Geometry validity check (`validity`).
pub struct ValidityCheck;

impl QualityCheck for ValidityCheck {
    fn name(&self) -> &'static str {
        "validity"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        match first_defect(ctx.geometry) {
            Some(defect) => CheckOutcome::fail(defect),
            None => CheckOutcome::pass(),
        }
    }
}

/// Walk the geometry and report the first validity defect.
fn first_defect(geom: &Geometry<f64>) -> Option<String> {
    match geom {
        Geometry::Point(p) => finite_coord(p.0.x, p.0.y),
        Geometry::Line(line) => {
            finite_coord(line.start.x, line.start.y)
                .or_else(|| finite_coord(line.end.x, line.end.y))
        }
        Geometry::LineString(ls) => linestring_defect(ls),
        Geometry::Polygon(poly) => polygon_defect(poly),
        Geometry::Rect(rect) => polygon_defect(&rect.to_polygon()),
        Geometry::Triangle(tri) => polygon_defect(&tri.to_polygon()),
        Geometry::MultiPoint(mp) => mp.iter().find_map(|p| finite_coord(p.0.x, p.0.y)),
        Geometry::MultiLineString(mls) => mls.iter().find_map(linestring_defect),
        Geometry::MultiPolygon(mpoly) => mpoly.iter().find_map(polygon_defect),
        Geometry::GeometryCollection(gc) => gc.iter().find_map(first_defect),
    }
}

fn finite_coord(x: f64, y: f64) -> Option<String> {
    if x.is_finite() && y.is_finite() {
        None
    } else {
        Some(format!("non-finite coordinate ({x}, {y})"))
    }
}

fn linestring_defect(ls: &LineString<f64>) -> Option<String> {
    if let Some(msg) = ls.coords().find_map(|c| finite_coord(c.x, c.y)) {
        return Some(msg);
    }
    let distinct = distinct_points(ls);
    if distinct < 2 {
        return Some(format!(
            "degenerate linestring: {distinct} distinct point(s)"
        ));
    }
    self_intersection(ls).map(|(i, j)| format!("self-intersection between segments {i} and {j}"))
}

fn polygon_defect(poly: &Polygon<f64>) -> Option<String> {
    if let Some(msg) = ring_defect(poly.exterior(), "exterior") {
        return Some(msg);
    }
    for (idx, ring) in poly.interiors().iter().enumerate() {
        if let Some(msg) = ring_defect(ring, &format!("interior ring {idx}")) {
            return Some(msg);
        }
    }

    // Ring inversion: every interior ring must stay within the shell.
    let shell = Polygon::new(poly.exterior().clone(), vec![]);
    for (idx, ring) in poly.interiors().iter().enumerate() {
        let escaped = ring
            .points()
            .any(|p: Point<f64>| !shell.intersects(&p));
        if escaped {
            return Some(format!("interior ring {idx} lies outside the exterior ring"));
        }
    }
    None
}

fn ring_defect(ring: &LineString<f64>, label: &str) -> Option<String> {
    if let Some(msg) = ring.coords().find_map(|c| finite_coord(c.x, c.y)) {
        return Some(msg);
    }
    if ring.0.len() < 4 {
        return Some(format!(
            "degenerate {label} ring: {} point(s), need at least 4",
            ring.0.len()
        ));
    }
    // Self-intersection before the area test: a crossed ring (bowtie) can
    // have zero signed area and would otherwise be misreported as flat.
    if let Some((i, j)) = self_intersection(ring) {
        return Some(format!(
            "{label} ring self-intersects between segments {i} and {j}"
        ));
    }
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return Some(format!("degenerate {label} ring: zero area"));
    }
    None
}

/// Count coordinates that differ from their predecessor.
fn distinct_points(ls: &LineString<f64>) -> usize {
    let mut distinct = 0;
    let mut prev = None;
    for c in ls.coords() {
        if prev != Some(*c) {
            distinct += 1;
        }
        prev = Some(*c);
    }
    distinct
}

/// Pairwise segment intersection test.
///
/// Adjacent segments legitimately share an endpoint and are skipped, as is
/// the closing first/last pair of a closed ring. Zero-length segments
/// (repeated points) are ignored. O(n²) — fine for review-scale geometries.
fn self_intersection(ls: &LineString<f64>) -> Option<(usize, usize)> {
    let segments: Vec<Line<f64>> = ls.lines().collect();
    let n = segments.len();
    if n < 3 {
        return None;
    }
    let closed = ls.is_closed();

    for i in 0..n {
        if segments[i].start == segments[i].end {
            continue;
        }
        for j in (i + 2)..n {
            if segments[j].start == segments[j].end {
                continue;
            }
            // In a closed ring the last segment wraps around to touch the
            // first one at the shared start point.
            if closed && i == 0 && j == n - 1 {
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_for, run_named};

    #[test]
    fn test_clean_polygon_passes() {
        let (geom, ctx) = context_for("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))");
        let outcome = run_named(&ValidityCheck, &geom, &ctx);
        assert_eq!(outcome.result, geomon_core::CheckResult::Pass);
    }

    #[test]
    fn test_bowtie_polygon_fails() {
        // Classic self-intersecting "bowtie".
        let (geom, ctx) = context_for("POLYGON((0 0, 4 4, 4 0, 0 4, 0 0))");
        let outcome = run_named(&ValidityCheck, &geom, &ctx);
        assert_eq!(outcome.result, geomon_core::CheckResult::Fail);
        assert!(outcome.message.unwrap().contains("self-intersect"));
    }

    #[test]
    fn test_same_polygon_uncorrupted_passes() {
        // The bowtie's coordinates in non-crossing order.
        let (geom, ctx) = context_for("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))");
        assert_eq!(
            run_named(&ValidityCheck, &geom, &ctx).result,
            geomon_core::CheckResult::Pass
        );
    }

    #[test]
    fn test_zero_area_ring_fails() {
        let (geom, ctx) = context_for("POLYGON((0 0, 1 1, 2 2, 0 0))");
        let outcome = run_named(&ValidityCheck, &geom, &ctx);
        assert_eq!(outcome.result, geomon_core::CheckResult::Fail);
        assert!(outcome.message.unwrap().contains("zero area"));
    }

    #[test]
    fn test_escaped_hole_fails() {
        let (geom, ctx) = context_for(
            "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (20 20, 21 20, 21 21, 20 21, 20 20))",
        );
        let outcome = run_named(&ValidityCheck, &geom, &ctx);
        assert_eq!(outcome.result, geomon_core::CheckResult::Fail);
        assert!(outcome.message.unwrap().contains("outside"));
    }

    #[test]
    fn test_self_crossing_linestring_fails() {
        let (geom, ctx) = context_for("LINESTRING(0 0, 4 4, 4 0, 0 4)");
        let outcome = run_named(&ValidityCheck, &geom, &ctx);
        assert_eq!(outcome.result, geomon_core::CheckResult::Fail);
    }

    #[test]
    fn test_simple_linestring_passes() {
        let (geom, ctx) = context_for("LINESTRING(0 0, 1 1, 2 0, 3 1)");
        assert_eq!(
            run_named(&ValidityCheck, &geom, &ctx).result,
            geomon_core::CheckResult::Pass
        );
    }

    #[test]
    fn test_point_passes() {
        let (geom, ctx) = context_for("POINT(5 5)");
        assert_eq!(
            run_named(&ValidityCheck, &geom, &ctx).result,
            geomon_core::CheckResult::Pass
        );
    }
}
