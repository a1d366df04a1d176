//! Analytic-to-polygonal conversion
//!
//! Every vertex synthesized here is tagged with the id of the analytic curve
//! it samples, so the arc reconstructor can recover circles and arcs after
//! the clipping collaborator has flattened everything to polygons.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::curve::{CurveId, CurveRecord, CurveSource};
use crate::geometry::{arc_sweep, optimal_segments, point_on_circle};
use crate::primitive::{ArcSegment, Contour, Point, Primitive, Shape};
use crate::EngineContext;

/// Tessellate a full circle into a CCW ring tagged with `curve` (registered
/// fresh when not supplied). No duplicated closing vertex.
pub fn circle_ring(
    ctx: &mut EngineContext,
    center: Point,
    radius: f64,
    curve: Option<CurveId>,
    source: CurveSource,
) -> (Vec<Point>, CurveId) {
    let cid = curve.unwrap_or_else(|| {
        ctx.curves
            .register(CurveRecord::circle(center.untagged(), radius, source))
    });
    let n = optimal_segments(&ctx.config, radius, true);
    let mut points = Vec::with_capacity(n as usize);
    for i in 0..n {
        let angle = TAU * i as f64 / n as f64;
        let p = point_on_circle(&center, radius, angle);
        points.push(Point::tagged(p.x, p.y, cid, i, n));
    }
    (points, cid)
}

/// Tessellate a partial arc from `start_angle` to `end_angle` in the stated
/// direction, endpoints included, all vertices tagged with `curve`.
pub fn arc_points(
    ctx: &EngineContext,
    center: &Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    clockwise: bool,
    curve: CurveId,
) -> Vec<Point> {
    let sweep = arc_sweep(start_angle, end_angle, clockwise);
    let full = optimal_segments(&ctx.config, radius, true);
    let n = ((full as f64 * sweep.abs() / TAU).ceil() as u32).max(ctx.config.min_arc_segments);
    let mut points = Vec::with_capacity(n as usize + 1);
    for i in 0..=n {
        let angle = start_angle + sweep * i as f64 / n as f64;
        let p = point_on_circle(center, radius, angle);
        points.push(Point::tagged(p.x, p.y, curve, i, n));
    }
    points
}

/// Convert an analytic primitive into a path primitive whose vertices are
/// tagged with the analytic source curves. Path and bezier primitives are not
/// converted here.
pub fn primitive_to_path(ctx: &mut EngineContext, prim: &Primitive) -> Option<Primitive> {
    let shape = match &prim.shape {
        Shape::Circle { center, radius } => {
            let (points, cid) =
                circle_ring(ctx, *center, *radius, prim.curve_ids.first().copied(), CurveSource::Tessellation);
            let mut contour = Contour::from_points(points);
            contour.curve_ids.push(cid);
            return Some(
                Primitive::path(ctx.alloc_id(), vec![contour], true)
                    .with_props(prim.props.clone())
                    .with_curves(vec![cid]),
            );
        }
        Shape::Arc { center, radius, start_angle, end_angle, clockwise } => {
            let cid = prim.curve_ids.first().copied().unwrap_or_else(|| {
                ctx.curves.register(CurveRecord::arc(
                    center.untagged(),
                    *radius,
                    *start_angle,
                    *end_angle,
                    *clockwise,
                    CurveSource::Tessellation,
                ))
            });
            let points = arc_points(ctx, center, *radius, *start_angle, *end_angle, *clockwise, cid);
            let last = points.len() - 1;
            let mut contour = Contour::from_points(points);
            contour.arc_segments.push(ArcSegment {
                start_index: 0,
                end_index: last,
                center: center.untagged(),
                radius: *radius,
                start_angle: *start_angle,
                end_angle: *end_angle,
                sweep_angle: arc_sweep(*start_angle, *end_angle, *clockwise),
                clockwise: *clockwise,
                curve_id: Some(cid),
            });
            contour.curve_ids.push(cid);
            return Some(
                Primitive::path(ctx.alloc_id(), vec![contour], prim.props.fill)
                    .with_props(prim.props.clone())
                    .with_curves(vec![cid]),
            );
        }
        Shape::Rectangle { position, width, height } => {
            let (x, y, w, h) = (position.x, position.y, *width, *height);
            let points = vec![
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
            ];
            Shape::Path {
                contours: vec![Contour::from_points(points)],
                closed: true,
            }
        }
        Shape::Obround { position, width, height } => {
            let mut curves = Vec::new();
            let points = obround_ring(ctx, position, *width, *height, &mut curves)?;
            let mut contour = Contour::from_points(points);
            contour.curve_ids = curves.clone();
            return Some(
                Primitive::path(ctx.alloc_id(), vec![contour], true)
                    .with_props(prim.props.clone())
                    .with_curves(curves),
            );
        }
        Shape::Bezier { .. } | Shape::Path { .. } => return None,
    };
    Some(
        Primitive::new(ctx.alloc_id(), shape)
            .with_props(prim.props.clone())
            .with_curves(prim.curve_ids.clone()),
    )
}

/// CCW ring of an obround positioned by its center. Registers the two cap
/// arcs and appends their ids to `out_curves`. Starts at the start-cap
/// tangent point on the long side.
pub fn obround_ring(
    ctx: &mut EngineContext,
    position: &Point,
    width: f64,
    height: f64,
    out_curves: &mut Vec<CurveId>,
) -> Option<Vec<Point>> {
    let eps = ctx.config.precision;
    if width <= eps || height <= eps {
        return None;
    }
    let horizontal = width >= height;
    let r = if horizontal { height / 2.0 } else { width / 2.0 };
    let half_slot = if horizontal { width / 2.0 - r } else { height / 2.0 - r };
    let (c1, c2) = if horizontal {
        (
            Point::new(position.x - half_slot, position.y),
            Point::new(position.x + half_slot, position.y),
        )
    } else {
        (
            Point::new(position.x, position.y - half_slot),
            Point::new(position.x, position.y + half_slot),
        )
    };

    // Cap sweep angles for a CCW walk: the far cap bulges along the slot
    // axis, the near cap bulges back.
    let (a_far, a_near) = if horizontal {
        (-FRAC_PI_2, FRAC_PI_2)
    } else {
        (0.0, PI)
    };

    let mut points = Vec::new();
    // First straight edge, from the near-cap tangent to the far-cap tangent.
    points.push(point_on_circle(&c1, r, a_far));
    points.push(point_on_circle(&c2, r, a_far));
    // Far cap.
    let far = ctx.curves.register(CurveRecord::arc(
        c2, r, a_far, a_far + PI, false, CurveSource::StrokeCap,
    ));
    append_cap(ctx, &mut points, &c2, r, a_far, far);
    out_curves.push(far);
    // Second straight edge back.
    points.push(point_on_circle(&c2, r, a_near));
    points.push(point_on_circle(&c1, r, a_near));
    // Near cap, closing toward the start.
    let near = ctx.curves.register(CurveRecord::arc(
        c1, r, a_near, a_near + PI, false, CurveSource::StrokeCap,
    ));
    append_cap(ctx, &mut points, &c1, r, a_near, near);
    Some(points)
}

/// Interior vertices of a CCW semicircle starting at `from_angle`. The
/// endpoints are supplied by the adjoining straight edges.
fn append_cap(
    ctx: &EngineContext,
    points: &mut Vec<Point>,
    center: &Point,
    radius: f64,
    from_angle: f64,
    curve: CurveId,
) {
    let full = optimal_segments(&ctx.config, radius, true);
    let n = (full / 2).max(ctx.config.min_arc_segments);
    for i in 1..n {
        let angle = from_angle + PI * i as f64 / n as f64;
        let p = point_on_circle(center, radius, angle);
        points.push(Point::tagged(p.x, p.y, curve, i, n));
    }
}

/// Inflate an open polyline into a closed polygon of the given total width
/// with semicircular caps at both ends. Cap curves are registered and their
/// ids written to `out_curves`.
pub fn polyline_to_polygon(
    ctx: &mut EngineContext,
    points: &[Point],
    width: f64,
    out_curves: &mut Vec<CurveId>,
) -> Option<Vec<Point>> {
    let eps = ctx.config.precision;
    if points.len() < 2 || width <= eps {
        return None;
    }
    let half = width / 2.0;

    let forward = dedup_points(points, eps);
    if forward.len() < 2 {
        return None;
    }
    let mut backward = forward.clone();
    backward.reverse();

    let left = offset_side(&forward, half);
    let right = offset_side(&backward, half);
    if left.len() < 2 || right.len() < 2 {
        return None;
    }

    let mut ring = left;

    // End cap: clockwise semicircle from the left normal to the right normal
    // around the last centerline point.
    let last = forward[forward.len() - 1];
    let prev = forward[forward.len() - 2];
    let end_heading = (last.y - prev.y).atan2(last.x - prev.x);
    let end_cap = ctx.curves.register(
        CurveRecord::arc(
            last.untagged(),
            half,
            end_heading + FRAC_PI_2,
            end_heading - FRAC_PI_2,
            true,
            CurveSource::StrokeCap,
        )
        .offset_derived(half, None),
    );
    append_cap_cw(ctx, &mut ring, &last, half, end_heading + FRAC_PI_2, end_cap);
    out_curves.push(end_cap);

    ring.extend(right);

    // Start cap, closing the ring back to the left side's first vertex.
    let first = forward[0];
    let second = forward[1];
    let start_heading = (second.y - first.y).atan2(second.x - first.x);
    let start_cap = ctx.curves.register(
        CurveRecord::arc(
            first.untagged(),
            half,
            start_heading - FRAC_PI_2,
            start_heading + FRAC_PI_2,
            true,
            CurveSource::StrokeCap,
        )
        .offset_derived(half, None),
    );
    append_cap_cw(ctx, &mut ring, &first, half, start_heading - FRAC_PI_2, start_cap);
    out_curves.push(start_cap);

    if ring.len() < 3 {
        return None;
    }
    Some(ring)
}

/// Interior vertices of a clockwise semicircle starting at `from_angle`.
fn append_cap_cw(
    ctx: &EngineContext,
    points: &mut Vec<Point>,
    center: &Point,
    radius: f64,
    from_angle: f64,
    curve: CurveId,
) {
    let full = optimal_segments(&ctx.config, radius, true);
    let n = (full / 2).max(ctx.config.min_arc_segments);
    for i in 1..n {
        let angle = from_angle - PI * i as f64 / n as f64;
        let p = point_on_circle(center, radius, angle);
        points.push(Point::tagged(p.x, p.y, curve, i, n));
    }
}

/// Left-hand offset of an open polyline by `half`, miter-joined with a bevel
/// fallback at sharp corners.
fn offset_side(points: &[Point], half: f64) -> Vec<Point> {
    let mut segs: Vec<(Point, Point)> = Vec::new();
    for w in points.windows(2) {
        let dx = w[1].x - w[0].x;
        let dy = w[1].y - w[0].y;
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f64::EPSILON {
            continue;
        }
        // Left normal of the travel direction.
        let nx = -dy / len * half;
        let ny = dx / len * half;
        segs.push((
            Point::new(w[0].x + nx, w[0].y + ny),
            Point::new(w[1].x + nx, w[1].y + ny),
        ));
    }

    let mut out = Vec::new();
    if segs.is_empty() {
        return out;
    }
    out.push(segs[0].0);
    for i in 0..segs.len() - 1 {
        let (a1, a2) = segs[i];
        let (b1, b2) = segs[i + 1];
        match crate::geometry::line_intersection(&a1, &a2, &b1, &b2) {
            Some(p) if p.sq_dist(&a2) <= (2.0 * half) * (2.0 * half) => out.push(p),
            _ => {
                out.push(a2);
                out.push(b1);
            }
        }
    }
    out.push(segs[segs.len() - 1].1);
    out
}

fn dedup_points(points: &[Point], eps: f64) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map(|l| l.sq_dist(p) < eps * eps).unwrap_or(false) {
            continue;
        }
        out.push(*p);
    }
    out
}

/// Tessellate a stroked arc of total width `total_width` into a closed
/// polygon. Registers the outer, inner, and two end-cap curves.
#[allow(clippy::too_many_arguments)]
pub fn arc_to_polygon(
    ctx: &mut EngineContext,
    center: &Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    clockwise: bool,
    total_width: f64,
    out_curves: &mut Vec<CurveId>,
) -> Option<Vec<Point>> {
    let eps = ctx.config.precision;
    if total_width <= eps || radius <= eps {
        return None;
    }
    let half = total_width / 2.0;
    let r_out = radius + half;
    let r_in = radius - half;
    let sweep = arc_sweep(start_angle, end_angle, clockwise);
    let cap_dir = if sweep >= 0.0 { 1.0 } else { -1.0 };

    let outer = ctx.curves.register(CurveRecord::arc(
        center.untagged(),
        r_out,
        start_angle,
        end_angle,
        clockwise,
        CurveSource::Tessellation,
    ));
    let mut ring = arc_points(ctx, center, r_out, start_angle, end_angle, clockwise, outer);
    out_curves.push(outer);

    // End cap from the outer rim to the inner rim.
    let cap_center_end = point_on_circle(center, radius, end_angle);
    let end_cap = ctx.curves.register(
        CurveRecord::arc(
            cap_center_end,
            half,
            end_angle,
            end_angle + cap_dir * PI,
            cap_dir < 0.0,
            CurveSource::StrokeCap,
        )
        .offset_derived(half, None),
    );
    append_cap_directed(ctx, &mut ring, &cap_center_end, half, end_angle, cap_dir, end_cap);
    out_curves.push(end_cap);

    if r_in > eps {
        let inner = ctx.curves.register(CurveRecord::arc(
            center.untagged(),
            r_in,
            end_angle,
            start_angle,
            !clockwise,
            CurveSource::Tessellation,
        ));
        ring.extend(arc_points(ctx, center, r_in, end_angle, start_angle, !clockwise, inner));
        out_curves.push(inner);
    } else {
        // Stroke wider than the arc radius: the inner rim degenerates to the
        // arc center.
        ring.push(center.untagged());
    }

    // Start cap closing the ring.
    let cap_center_start = point_on_circle(center, radius, start_angle);
    let start_cap = ctx.curves.register(
        CurveRecord::arc(
            cap_center_start,
            half,
            start_angle + PI,
            start_angle + PI + cap_dir * PI,
            cap_dir < 0.0,
            CurveSource::StrokeCap,
        )
        .offset_derived(half, None),
    );
    append_cap_directed(
        ctx,
        &mut ring,
        &cap_center_start,
        half,
        start_angle + PI,
        cap_dir,
        start_cap,
    );
    out_curves.push(start_cap);

    if ring.len() < 3 {
        return None;
    }
    Some(ring)
}

fn append_cap_directed(
    ctx: &EngineContext,
    points: &mut Vec<Point>,
    center: &Point,
    radius: f64,
    from_angle: f64,
    direction: f64,
    curve: CurveId,
) {
    let full = optimal_segments(&ctx.config, radius, true);
    let n = (full / 2).max(ctx.config.min_arc_segments);
    for i in 1..n {
        let angle = from_angle + direction * PI * i as f64 / n as f64;
        let p = point_on_circle(center, radius, angle);
        points.push(Point::tagged(p.x, p.y, curve, i, n));
    }
}
