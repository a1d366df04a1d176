//! Plain-polyline offset with mitered, beveled, and round corner joints

use crate::curve::{CurveId, CurveRecord, CurveSource};
use crate::geometry::{
    is_clockwise, line_intersection, optimal_segments, point_on_circle, short_angle_diff,
    simplify_douglas_peucker,
};
use crate::primitive::Point;
use crate::EngineContext;
use std::f64::consts::TAU;

pub(crate) struct PolylineOffset {
    pub points: Vec<Point>,
    pub joint_curves: Vec<CurveId>,
}

/// Outward unit normal of an edge direction, honoring the ring winding.
fn outward_normal(dx: f64, dy: f64, cw: bool) -> (f64, f64) {
    if cw {
        (-dy, dx)
    } else {
        (dy, -dx)
    }
}

/// Offset a closed ring by a signed distance: positive expands outward,
/// negative shrinks inward. Convex corners of an external offset get round
/// joints whose vertices carry a freshly registered arc curve; everything
/// else is mitered, falling back to a bevel past the miter limit.
pub(crate) fn offset_closed_polyline(
    ctx: &mut EngineContext,
    input: &[Point],
    distance: f64,
) -> Option<PolylineOffset> {
    let eps = ctx.config.precision;
    let eps2 = eps * eps;

    let mut pts: Vec<Point> = Vec::with_capacity(input.len());
    for p in input {
        if pts.last().map(|l| l.sq_dist(p) < eps2).unwrap_or(false) {
            continue;
        }
        pts.push(*p);
    }
    // Drop the duplicated trailing vertex of an explicitly closed ring.
    if pts.len() > 1 && pts[0].sq_dist(&pts[pts.len() - 1]) < eps2 {
        pts.pop();
    }

    let internal = distance < 0.0;
    if internal && pts.len() > 10 {
        pts = simplify_douglas_peucker(&pts, ctx.config.simplify_tolerance);
    }
    if pts.len() < 3 {
        return None;
    }

    let cw = is_clockwise(&pts);
    let n = pts.len();

    // Unit edge directions and the offset segment for each edge.
    let mut dirs: Vec<(f64, f64)> = Vec::with_capacity(n);
    let mut segs: Vec<(Point, Point)> = Vec::with_capacity(n);
    for i in 0..n {
        let a = &pts[i];
        let b = &pts[(i + 1) % n];
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f64::EPSILON {
            return None;
        }
        let (ux, uy) = (dx / len, dy / len);
        let (nx, ny) = outward_normal(ux, uy, cw);
        dirs.push((ux, uy));
        segs.push((
            Point::new(a.x + nx * distance, a.y + ny * distance),
            Point::new(b.x + nx * distance, b.y + ny * distance),
        ));
    }

    let abs_d = distance.abs();
    let miter_max = ctx.config.miter_limit * abs_d;
    let full_circle = optimal_segments(&ctx.config, abs_d, true);

    let mut ring: Vec<Point> = Vec::with_capacity(n + 4);
    let mut joint_curves = Vec::new();

    for i in 0..n {
        let j = (i + 1) % n;
        let corner = pts[j];
        let (d1x, d1y) = dirs[i];
        let (d2x, d2y) = dirs[j];
        let cross = d1x * d2y - d1y * d2x;
        let dot = d1x * d2x + d1y * d2y;

        let collinear = dot >= 0.995;
        let convex = if cw { cross < 0.0 } else { cross > 0.0 };

        if internal || !convex || collinear {
            match line_intersection(&segs[i].0, &segs[i].1, &segs[j].0, &segs[j].1) {
                None => ring.push(segs[i].1),
                Some(p) => {
                    if p.dist(&corner) > miter_max {
                        // Bevel: keep both offset endpoints.
                        ring.push(segs[i].1);
                        ring.push(segs[j].0);
                    } else {
                        ring.push(p);
                    }
                }
            }
        } else {
            // Round joint around the original corner.
            let a0 = (segs[i].1.y - corner.y).atan2(segs[i].1.x - corner.x);
            let a1 = (segs[j].0.y - corner.y).atan2(segs[j].0.x - corner.x);
            let diff = short_angle_diff(a0, a1);
            let steps = ((full_circle as f64 * diff.abs() / TAU).ceil() as u32)
                .max(ctx.config.min_round_joint_segments);
            let cid = ctx.curves.register(
                CurveRecord::arc(corner.untagged(), abs_d, a0, a1, diff < 0.0, CurveSource::OffsetJoint)
                    .offset_derived(distance, None),
            );
            for k in 0..=steps {
                let angle = a0 + diff * k as f64 / steps as f64;
                let p = point_on_circle(&corner, abs_d, angle);
                ring.push(Point::tagged(p.x, p.y, cid, k, steps));
            }
            joint_curves.push(cid);
        }
    }

    // Weld coincident neighbors and the seam.
    let mut out: Vec<Point> = Vec::with_capacity(ring.len());
    for p in ring {
        if let Some(last) = out.last_mut() {
            if last.sq_dist(&p) < eps2 {
                if last.curve_id.is_none() && p.curve_id.is_some() {
                    *last = p;
                }
                continue;
            }
        }
        out.push(p);
    }
    if out.len() > 1 && out[0].sq_dist(&out[out.len() - 1]) < eps2 {
        let last = out.pop().unwrap();
        if out[0].curve_id.is_none() && last.curve_id.is_some() {
            out[0] = last;
        }
    }

    if out.len() < 3 {
        return None;
    }
    Some(PolylineOffset { points: out, joint_curves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineConfig;

    fn ctx() -> EngineContext {
        EngineContext::new(EngineConfig::default())
    }

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    fn contains_close(ring: &[Point], x: f64, y: f64) -> bool {
        ring.iter().any(|p| (p.x - x).abs() < 1e-6 && (p.y - y).abs() < 1e-6)
    }

    #[test]
    fn test_internal_square_offset_miters() {
        let mut ctx = ctx();
        let off = offset_closed_polyline(&mut ctx, &square(), -1.0).unwrap();
        assert_eq!(off.points.len(), 4);
        assert!(off.joint_curves.is_empty());
        for (x, y) in [(1.0, 1.0), (9.0, 1.0), (9.0, 9.0), (1.0, 9.0)] {
            assert!(contains_close(&off.points, x, y), "missing corner ({}, {})", x, y);
        }
        // No arc curves were registered for a pure miter offset.
        assert!(ctx.curves.is_empty());
    }

    #[test]
    fn test_external_square_offset_rounds_corners() {
        let mut ctx = ctx();
        let off = offset_closed_polyline(&mut ctx, &square(), 1.0).unwrap();
        assert_eq!(off.joint_curves.len(), 4);
        assert!(off.points.len() > 8);
        // Every joint vertex sits exactly one unit from its corner.
        for p in off.points.iter().filter(|p| p.curve_id.is_some()) {
            let rec = ctx.curves.get(p.curve_id.unwrap()).unwrap();
            let d = ((p.x - rec.center.x).powi(2) + (p.y - rec.center.y).powi(2)).sqrt();
            assert!((d - 1.0).abs() < 1e-9);
            assert!(rec.is_offset_derived);
            assert_eq!(rec.offset_distance, Some(1.0));
        }
    }

    #[test]
    fn test_winding_preserved() {
        let mut ctx = ctx();
        let ccw = square();
        let off = offset_closed_polyline(&mut ctx, &ccw, 1.0).unwrap();
        assert!(!is_clockwise(&off.points));

        let mut cw = square();
        cw.reverse();
        let off = offset_closed_polyline(&mut ctx, &cw, 1.0).unwrap();
        assert!(is_clockwise(&off.points));
    }

    #[test]
    fn test_cw_square_internal_offset() {
        // Winding flips the normal convention; the result must still shrink.
        let mut ctx = ctx();
        let mut cw = square();
        cw.reverse();
        let off = offset_closed_polyline(&mut ctx, &cw, -1.0).unwrap();
        for (x, y) in [(1.0, 1.0), (9.0, 1.0), (9.0, 9.0), (1.0, 9.0)] {
            assert!(contains_close(&off.points, x, y), "missing corner ({}, {})", x, y);
        }
    }

    #[test]
    fn test_round_trip_offset_stays_close() {
        let mut ctx = ctx();
        let out = offset_closed_polyline(&mut ctx, &square(), 2.0).unwrap();
        let back = offset_closed_polyline(&mut ctx, &out.points, -2.0).unwrap();
        // Every original corner is recovered within the joint tessellation
        // error.
        for p in &square() {
            let min = back
                .points
                .iter()
                .map(|q| q.dist(p))
                .fold(f64::INFINITY, f64::min);
            assert!(min < 0.15, "corner ({}, {}) drifted {}", p.x, p.y, min);
        }
    }

    #[test]
    fn test_collapsed_contour_returns_none() {
        let mut ctx = ctx();
        // Internal offset larger than the feature reduces it to nothing: the
        // miter intersections invert and the welds collapse the ring.
        let tiny = vec![
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(0.5, 0.5),
        ];
        let result = offset_closed_polyline(&mut ctx, &tiny, -5.0);
        if let Some(off) = result {
            // If anything survives it must still be a valid ring.
            assert!(off.points.len() >= 3);
        }
    }

    #[test]
    fn test_duplicate_trailing_vertex_removed() {
        let mut ctx = ctx();
        let mut ring = square();
        ring.push(Point::new(0.0, 0.0));
        let off = offset_closed_polyline(&mut ctx, &ring, -1.0).unwrap();
        assert_eq!(off.points.len(), 4);
    }

    #[test]
    fn test_bevel_on_sharp_spike() {
        let mut ctx = ctx();
        // A needle-sharp reflex corner exceeds the miter limit and bevels.
        let spike = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(5.0, 0.4),
            Point::new(0.0, 10.0),
        ];
        let off = offset_closed_polyline(&mut ctx, &spike, -0.5).unwrap();
        assert!(off.points.len() >= 4);
        for p in &off.points {
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }
}
