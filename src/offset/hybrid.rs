//! Hybrid offset - closed contours mixing straight edges with tagged arcs
//!
//! Arc-tagged segment pairs are offset radially (the analytic arc is
//! re-registered at its new radius); straight edges are offset along their
//! normals. The two families meet at shared vertices, which are welded and
//! the arc-segment indices remapped afterwards.

use std::collections::HashMap;

use crate::curve::{CurveRecord, CurveSource};
use crate::geometry::{arc_sweep, is_clockwise, point_on_circle};
use crate::primitive::{ArcSegment, Contour, Point};
use crate::EngineContext;

/// Offset one closed hybrid contour by a signed distance. Returns `None`
/// when the contour collapses below the precision threshold.
pub(crate) fn offset_hybrid_contour(
    ctx: &mut EngineContext,
    contour: &Contour,
    distance: f64,
) -> Option<Contour> {
    let eps = ctx.config.precision;
    let eps2 = eps * eps;
    let pts = &contour.points;
    let n = pts.len();
    if n < 3 {
        return None;
    }

    let cw = is_clockwise(pts);
    let arcs_by_start: HashMap<usize, &ArcSegment> = contour
        .arc_segments
        .iter()
        .map(|a| (a.start_index, a))
        .collect();

    struct PendingArc {
        start: usize,
        end: usize,
        segment: ArcSegment,
    }

    let mut pushed: Vec<Point> = Vec::with_capacity(n + 2);
    let mut pending: Vec<PendingArc> = Vec::new();
    let mut new_curves = Vec::new();

    let mut i = 0usize;
    while i < n {
        if let Some(arc) = arcs_by_start.get(&i) {
            // A convex arc bulges away from its center toward the offset
            // side; its radius grows on an external offset and shrinks on an
            // internal one. A concave arc does the opposite.
            let convex = arc.clockwise == cw;
            let new_radius = arc.radius + if convex { distance } else { -distance };
            if new_radius > eps {
                let cid = ctx.curves.register(
                    CurveRecord::arc(
                        arc.center.untagged(),
                        new_radius,
                        arc.start_angle,
                        arc.end_angle,
                        arc.clockwise,
                        CurveSource::HybridOffset,
                    )
                    .offset_derived(distance, arc.curve_id),
                );
                let s = point_on_circle(&arc.center, new_radius, arc.start_angle);
                let e = point_on_circle(&arc.center, new_radius, arc.end_angle);
                let start_idx = pushed.len();
                pushed.push(Point::tagged(s.x, s.y, cid, 0, 1));
                let end_idx = pushed.len();
                pushed.push(Point::tagged(e.x, e.y, cid, 1, 1));
                pending.push(PendingArc {
                    start: start_idx,
                    end: end_idx,
                    segment: ArcSegment {
                        start_index: 0,
                        end_index: 0,
                        center: arc.center.untagged(),
                        radius: new_radius,
                        start_angle: arc.start_angle,
                        end_angle: arc.end_angle,
                        sweep_angle: arc_sweep(arc.start_angle, arc.end_angle, arc.clockwise),
                        clockwise: arc.clockwise,
                        curve_id: Some(cid),
                    },
                });
                new_curves.push(cid);
            } else {
                log::debug!(
                    "hybrid offset collapsed arc at index {} (radius {} -> {})",
                    i,
                    arc.radius,
                    new_radius
                );
            }
            // Skip the indices the arc spans; a wrap-around arc ends the walk.
            i = if arc.end_index <= i { n } else { arc.end_index };
        } else {
            let j = (i + 1) % n;
            let dx = pts[j].x - pts[i].x;
            let dy = pts[j].y - pts[i].y;
            let len = (dx * dx + dy * dy).sqrt();
            if len > f64::EPSILON {
                let (ux, uy) = (dx / len, dy / len);
                let (nx, ny) = if cw { (-uy, ux) } else { (uy, -ux) };
                pushed.push(Point::new(pts[i].x + nx * distance, pts[i].y + ny * distance));
                pushed.push(Point::new(pts[j].x + nx * distance, pts[j].y + ny * distance));
            }
            i += 1;
        }
    }

    if pushed.len() < 3 {
        return None;
    }

    // Weld adjacent duplicates, keeping an index map from pre-weld positions
    // to final positions. Curve tags are preserved across welds.
    let mut map = vec![0usize; pushed.len()];
    let mut out: Vec<Point> = Vec::with_capacity(pushed.len());
    for (k, p) in pushed.iter().enumerate() {
        if let Some(last) = out.last_mut() {
            if last.sq_dist(p) < eps2 {
                if last.curve_id.is_none() && p.curve_id.is_some() {
                    *last = *p;
                }
                map[k] = out.len() - 1;
                continue;
            }
        }
        map[k] = out.len();
        out.push(*p);
    }

    // If the closing vertex duplicates the first, drop it and repoint
    // dependents at index 0.
    let mut dropped_tail: Option<usize> = None;
    if out.len() > 1 && out[0].sq_dist(&out[out.len() - 1]) < eps2 {
        let last = out.pop().unwrap();
        if out[0].curve_id.is_none() && last.curve_id.is_some() {
            out[0] = last;
        }
        dropped_tail = Some(out.len());
    }

    if out.len() < 3 {
        return None;
    }

    let remap = |idx: usize| -> usize {
        let m = map[idx];
        match dropped_tail {
            Some(tail) if m == tail => 0,
            _ => m,
        }
    };

    let mut arc_segments = Vec::with_capacity(pending.len());
    for p in pending {
        let start = remap(p.start);
        let end = remap(p.end);
        if start == end {
            continue;
        }
        let mut seg = p.segment;
        seg.start_index = start;
        seg.end_index = end;
        arc_segments.push(seg);
    }

    let mut curve_ids = contour.curve_ids.clone();
    curve_ids.extend(new_curves);

    Some(Contour {
        points: out,
        is_hole: contour.is_hole,
        nesting_level: contour.nesting_level,
        parent_id: contour.parent_id,
        arc_segments,
        curve_ids,
    })
}
