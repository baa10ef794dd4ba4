//! Ring-orientation convention check.
//!
//! Polygon exteriors are expected counter-clockwise and holes clockwise
//! (the right-hand rule). Normalization deliberately never reorients rings,
//! so a source emitting the opposite winding shows up here instead of being
//! silently rewritten. Rings too degenerate to have a winding order are
//! validity's problem, not orientation's.

use crate::registry::{CheckContext, CheckOutcome, QualityCheck};
use geo::winding_order::WindingOrder;
use geo::Winding;
use geo_types::{Geometry, Polygon};

/// Winding-order check (`ring_orientation`).
pub struct RingOrientationCheck;

impl QualityCheck for RingOrientationCheck {
    fn name(&self) -> &'static str {
        "ring_orientation"
    }

    fn run(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        match orientation_defect(ctx.geometry) {
            Some(defect) => CheckOutcome::fail(defect),
            None => CheckOutcome::pass(),
        }
    }
}

fn orientation_defect(geom: &Geometry<f64>) -> Option<String> {
    match geom {
        Geometry::Polygon(poly) => polygon_orientation_defect(poly),
        Geometry::MultiPolygon(mpoly) => mpoly.iter().find_map(polygon_orientation_defect),
        Geometry::GeometryCollection(gc) => gc.iter().find_map(orientation_defect),
        _ => None,
    }
}

fn polygon_orientation_defect(poly: &Polygon<f64>) -> Option<String> {
    if poly.exterior().winding_order() == Some(WindingOrder::Clockwise) {
        return Some("exterior ring wound clockwise, expected counter-clockwise".to_string());
    }
    for (idx, ring) in poly.interiors().iter().enumerate() {
        if ring.winding_order() == Some(WindingOrder::CounterClockwise) {
            return Some(format!(
                "interior ring {idx} wound counter-clockwise, expected clockwise"
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_for, run_named};
    use geomon_core::model::CheckResult;

    #[test]
    fn test_ccw_exterior_passes() {
        let (geom, fixture) = context_for("POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))");
        let outcome = run_named(&RingOrientationCheck, &geom, &fixture);
        assert_eq!(outcome.result, CheckResult::Pass);
    }

    #[test]
    fn test_cw_exterior_fails() {
        let (geom, fixture) = context_for("POLYGON((0 0, 0 4, 4 4, 4 0, 0 0))");
        let outcome = run_named(&RingOrientationCheck, &geom, &fixture);
        assert_eq!(outcome.result, CheckResult::Fail);
        assert!(outcome.message.unwrap().contains("exterior"));
    }

    #[test]
    fn test_cw_hole_passes() {
        let (geom, fixture) = context_for(
            "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 2 4, 4 4, 4 2, 2 2))",
        );
        let outcome = run_named(&RingOrientationCheck, &geom, &fixture);
        assert_eq!(outcome.result, CheckResult::Pass);
    }

    #[test]
    fn test_ccw_hole_fails() {
        let (geom, fixture) = context_for(
            "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 4 2, 4 4, 2 4, 2 2))",
        );
        let outcome = run_named(&RingOrientationCheck, &geom, &fixture);
        assert_eq!(outcome.result, CheckResult::Fail);
        assert!(outcome.message.unwrap().contains("interior ring 0"));
    }

    #[test]
    fn test_non_polygon_passes() {
        let (geom, fixture) = context_for("LINESTRING(0 0, 1 1)");
        let outcome = run_named(&RingOrientationCheck, &geom, &fixture);
        assert_eq!(outcome.result, CheckResult::Pass);
    }
}
