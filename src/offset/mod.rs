//! Geometry offsetter
//!
//! Inflates (positive distance) or shrinks (negative distance) primitives
//! into fresh path primitives with welded vertices and updated arc metadata.
//! Degenerate results are reported per primitive so the surrounding
//! operation can skip them and continue.

use crate::curve::{CurveId, CurveRecord, CurveSource};
use crate::error::OffsetError;
use crate::geometry::tessellate::{
    arc_to_polygon, circle_ring, obround_ring, polyline_to_polygon, primitive_to_path,
};
use crate::primitive::{Contour, OffsetKind, Point, Primitive, PrimitiveProps, Shape};
use crate::EngineContext;

mod hybrid;
mod polyline;

use hybrid::offset_hybrid_contour;
use polyline::offset_closed_polyline;

/// Offset a primitive by a signed distance: positive is outward (external),
/// negative inward (internal). Returns the offset primitives (a multi-contour
/// path yields one per contour). Appends to the curve registry as a side
/// effect.
pub fn offset_primitive(
    ctx: &mut EngineContext,
    prim: &Primitive,
    distance: f64,
) -> Result<Vec<Primitive>, OffsetError> {
    if prim.props.is_stroke() {
        return offset_stroke(ctx, prim, distance);
    }
    match &prim.shape {
        Shape::Circle { center, radius } => offset_circle(ctx, prim, *center, *radius, distance),
        Shape::Rectangle { width, height, .. } => {
            let eps = ctx.config.precision;
            if *width <= eps || *height <= eps {
                return Err(OffsetError::Degenerate(format!(
                    "rectangle {}x{} below precision",
                    width, height
                )));
            }
            let path = primitive_to_path(ctx, prim).ok_or_else(|| {
                OffsetError::Invariant(format!("rectangle {:?} failed to tessellate", prim.id))
            })?;
            offset_path(ctx, &path, distance)
        }
        Shape::Obround { position, width, height } => {
            offset_obround(ctx, prim, *position, *width, *height, distance)
        }
        Shape::Arc { .. } => {
            let path = primitive_to_path(ctx, prim).ok_or_else(|| {
                OffsetError::Invariant(format!("arc {:?} failed to tessellate", prim.id))
            })?;
            offset_path(ctx, &path, distance)
        }
        Shape::Path { .. } => offset_path(ctx, prim, distance),
        Shape::Bezier { .. } => Err(OffsetError::Unsupported("bezier".into())),
    }
}

fn offset_props(src: &PrimitiveProps, distance: f64) -> PrimitiveProps {
    let mut props = src.clone();
    props.offset_kind = Some(if distance >= 0.0 {
        OffsetKind::External
    } else {
        OffsetKind::Internal
    });
    props
}

/// Build a single-contour closed path primitive, attaching its curves to the
/// fresh primitive id in the registry.
fn path_from_contour(ctx: &mut EngineContext, contour: Contour, props: PrimitiveProps) -> Primitive {
    let id = ctx.alloc_id();
    for cid in &contour.curve_ids {
        ctx.curves.attach(id, *cid);
    }
    let curves = contour.curve_ids.clone();
    Primitive::path(id, vec![contour], true)
        .with_props(props)
        .with_curves(curves)
}

fn offset_circle(
    ctx: &mut EngineContext,
    prim: &Primitive,
    center: Point,
    radius: f64,
    distance: f64,
) -> Result<Vec<Primitive>, OffsetError> {
    let new_radius = radius + distance;
    if new_radius < ctx.config.precision {
        return Err(OffsetError::Degenerate(format!(
            "circle radius {} offset by {} collapses",
            radius, distance
        )));
    }
    let source_curve = prim.curve_ids.first().copied();
    let cid = ctx.curves.register(
        CurveRecord::circle(center.untagged(), new_radius, CurveSource::Offset)
            .offset_derived(distance, source_curve),
    );
    let (points, _) = circle_ring(ctx, center, new_radius, Some(cid), CurveSource::Offset);
    let mut contour = Contour::from_points(points);
    contour.curve_ids.push(cid);
    Ok(vec![path_from_contour(
        ctx,
        contour,
        offset_props(&prim.props, distance),
    )])
}

fn offset_obround(
    ctx: &mut EngineContext,
    prim: &Primitive,
    position: Point,
    width: f64,
    height: f64,
    distance: f64,
) -> Result<Vec<Primitive>, OffsetError> {
    let eps = ctx.config.precision;
    let new_w = width + 2.0 * distance;
    let new_h = height + 2.0 * distance;
    if width <= eps || height <= eps || new_w <= eps || new_h <= eps {
        return Err(OffsetError::Degenerate(format!(
            "obround {}x{} offset by {} collapses",
            width, height, distance
        )));
    }
    // The center and cap centers stay put; the cap radius and extents absorb
    // the distance.
    let mut curves = Vec::new();
    let points = obround_ring(ctx, &position, new_w, new_h, &mut curves).ok_or_else(|| {
        OffsetError::Degenerate(format!("obround {}x{} offset by {} collapses", width, height, distance))
    })?;
    let mut contour = Contour::from_points(points);
    contour.curve_ids = curves;
    Ok(vec![path_from_contour(
        ctx,
        contour,
        offset_props(&prim.props, distance),
    )])
}

fn offset_path(
    ctx: &mut EngineContext,
    prim: &Primitive,
    distance: f64,
) -> Result<Vec<Primitive>, OffsetError> {
    let (contours, closed) = match &prim.shape {
        Shape::Path { contours, closed } => (contours, *closed),
        _ => return Err(OffsetError::Invariant("offset_path on non-path".into())),
    };
    if contours.is_empty() {
        return Err(OffsetError::Degenerate("path with no contours".into()));
    }

    // Multi-contour paths offset each contour independently; holes flip the
    // sign so an external offset expands the outer ring and shrinks holes.
    // Compound re-assembly is deferred to the fusion stage.
    if contours.len() > 1 {
        let mut out = Vec::new();
        for contour in contours {
            let d = if contour.is_hole { -distance } else { distance };
            let single = Primitive::path(prim.id, vec![contour.clone()], closed)
                .with_props(prim.props.clone())
                .with_curves(prim.curve_ids.clone());
            match offset_path(ctx, &single, d) {
                Ok(prims) => out.extend(prims),
                Err(OffsetError::Degenerate(reason)) => {
                    log::warn!("contour of {:?} dropped: {}", prim.id, reason);
                }
                Err(e) => return Err(e),
            }
        }
        if out.is_empty() {
            return Err(OffsetError::Degenerate("all contours collapsed".into()));
        }
        return Ok(out);
    }

    let contour = &contours[0];

    // Centerline passes are cut on the line itself; the machine processor
    // recognizes them as slot macros.
    if prim.props.is_centerline_path && !closed {
        let id = ctx.alloc_id();
        let mut props = prim.props.clone();
        props.offset_kind = Some(OffsetKind::On);
        return Ok(vec![Primitive::path(id, vec![contour.clone()], false)
            .with_props(props)
            .with_curves(prim.curve_ids.clone())]);
    }
    if !closed {
        return Err(OffsetError::Unsupported("open non-centerline path".into()));
    }

    if contour.arc_segments.is_empty() {
        let off = offset_closed_polyline(ctx, &contour.points, distance).ok_or_else(|| {
            OffsetError::Degenerate(format!("contour of {:?} collapsed", prim.id))
        })?;
        let mut new_contour = Contour::from_points(off.points);
        new_contour.is_hole = contour.is_hole;
        new_contour.nesting_level = contour.nesting_level;
        new_contour.parent_id = contour.parent_id;
        new_contour.curve_ids = off.joint_curves;
        let mut props = offset_props(&prim.props, distance);
        props.polarity = prim.props.polarity;
        Ok(vec![path_from_contour(ctx, new_contour, props)])
    } else {
        let new_contour = offset_hybrid_contour(ctx, contour, distance).ok_or_else(|| {
            OffsetError::Degenerate(format!("hybrid contour of {:?} collapsed", prim.id))
        })?;
        Ok(vec![path_from_contour(
            ctx,
            new_contour,
            offset_props(&prim.props, distance),
        )])
    }
}

/// Offset of a stroked centerline: the stroke is polygonized at its total
/// width (stroke width plus the offset on both sides) with semicircular end
/// caps, and the result is a filled polygon.
fn offset_stroke(
    ctx: &mut EngineContext,
    prim: &Primitive,
    distance: f64,
) -> Result<Vec<Primitive>, OffsetError> {
    let eps = ctx.config.precision;
    let width = prim.props.stroke_width.unwrap_or(0.0);
    let total = width + 2.0 * distance;
    if total <= eps {
        return Err(OffsetError::Degenerate(format!(
            "stroke width {} offset by {} collapses",
            width, distance
        )));
    }

    let mut props = offset_props(&prim.props, distance);
    props.fill = true;
    props.stroke = false;
    props.stroke_width = None;
    props.polygonized = true;

    match &prim.shape {
        Shape::Path { contours, closed } => {
            let contour = contours
                .first()
                .ok_or_else(|| OffsetError::Degenerate("stroke path with no contours".into()))?;
            if *closed {
                stroke_ring(ctx, &contour.points, total, props)
            } else {
                let mut curves = Vec::new();
                let ring = polyline_to_polygon(ctx, &contour.points, total, &mut curves)
                    .ok_or_else(|| OffsetError::Degenerate("stroke centerline collapsed".into()))?;
                let mut new_contour = Contour::from_points(ring);
                new_contour.curve_ids = curves;
                Ok(vec![path_from_contour(ctx, new_contour, props)])
            }
        }
        Shape::Circle { center, radius } => {
            // A stroked circle becomes an annulus.
            let r_out = radius + total / 2.0;
            let r_in = radius - total / 2.0;
            let outer_cid = ctx.curves.register(
                CurveRecord::circle(center.untagged(), r_out, CurveSource::Offset)
                    .offset_derived(distance, prim.curve_ids.first().copied()),
            );
            let (outer_pts, _) = circle_ring(ctx, *center, r_out, Some(outer_cid), CurveSource::Offset);
            let mut outer = Contour::from_points(outer_pts);
            outer.curve_ids.push(outer_cid);

            let id = ctx.alloc_id();
            let mut contours = vec![outer];
            let mut curve_ids = vec![outer_cid];
            if r_in > eps {
                let inner_cid = ctx.curves.register(
                    CurveRecord::circle(center.untagged(), r_in, CurveSource::Offset)
                        .offset_derived(distance, prim.curve_ids.first().copied()),
                );
                let (inner_pts, _) =
                    circle_ring(ctx, *center, r_in, Some(inner_cid), CurveSource::Offset);
                let mut inner = Contour::from_points(inner_pts).hole();
                inner.curve_ids.push(inner_cid);
                contours.push(inner);
                curve_ids.push(inner_cid);
            }
            for cid in &curve_ids {
                ctx.curves.attach(id, *cid);
            }
            Ok(vec![Primitive::path(id, contours, true)
                .with_props(props)
                .with_curves(curve_ids)])
        }
        Shape::Arc { center, radius, start_angle, end_angle, clockwise } => {
            let mut curves = Vec::new();
            let ring = arc_to_polygon(
                ctx, center, *radius, *start_angle, *end_angle, *clockwise, total, &mut curves,
            )
            .ok_or_else(|| OffsetError::Degenerate("stroked arc collapsed".into()))?;
            let mut contour = Contour::from_points(ring);
            contour.curve_ids = curves;
            Ok(vec![path_from_contour(ctx, contour, props)])
        }
        Shape::Rectangle { .. } => {
            // Outline stroke of a rectangle: treat the corner ring as a
            // closed centerline.
            let path = primitive_to_path(ctx, prim).ok_or_else(|| {
                OffsetError::Invariant(format!("rectangle {:?} failed to tessellate", prim.id))
            })?;
            let points = path
                .outer_contour()
                .map(|c| c.points.clone())
                .unwrap_or_default();
            stroke_ring(ctx, &points, total, props)
        }
        _ => Err(OffsetError::Unsupported(format!(
            "stroke on {}",
            prim.shape.kind_name()
        ))),
    }
}

/// A stroked closed ring becomes a band: the centerline offset outward and
/// inward by half the total width, emitted as an outer contour with a hole.
fn stroke_ring(
    ctx: &mut EngineContext,
    centerline: &[Point],
    total: f64,
    props: PrimitiveProps,
) -> Result<Vec<Primitive>, OffsetError> {
    let half = total / 2.0;
    let outer = offset_closed_polyline(ctx, centerline, half)
        .ok_or_else(|| OffsetError::Degenerate("stroked ring outer collapsed".into()))?;
    let inner = offset_closed_polyline(ctx, centerline, -half);

    let id = ctx.alloc_id();
    let mut outer_contour = Contour::from_points(outer.points);
    outer_contour.curve_ids = outer.joint_curves;
    let mut contours = vec![outer_contour];
    let mut curve_ids: Vec<CurveId> = contours[0].curve_ids.clone();
    if let Some(inner) = inner {
        let mut inner_contour = Contour::from_points(inner.points).hole();
        inner_contour.curve_ids = inner.joint_curves;
        curve_ids.extend(inner_contour.curve_ids.iter().copied());
        contours.push(inner_contour);
    }
    for cid in &curve_ids {
        ctx.curves.attach(id, *cid);
    }
    Ok(vec![Primitive::path(id, contours, true)
        .with_props(props)
        .with_curves(curve_ids)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveKind;
    use crate::geometry::signed_area;
    use crate::primitive::PrimitiveId;
    use crate::EngineConfig;

    fn ctx() -> EngineContext {
        EngineContext::new(EngineConfig::default())
    }

    #[test]
    fn test_circle_external_offset() {
        let mut ctx = ctx();
        let src_curve = ctx
            .curves
            .register(CurveRecord::circle(Point::new(0.0, 0.0), 10.0, CurveSource::Import));
        let prim = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 10.0)
            .with_curves(vec![src_curve]);
        let out = offset_primitive(&mut ctx, &prim, 1.0).unwrap();
        assert_eq!(out.len(), 1);
        let cid = out[0].curve_ids[0];
        let rec = ctx.curves.get(cid).unwrap();
        assert_eq!(rec.kind, CurveKind::Circle);
        assert!((rec.radius - 11.0).abs() < 1e-9);
        assert!(rec.is_offset_derived);
        assert_eq!(rec.source_curve_id, Some(src_curve));
        // Every tessellated vertex lies on the offset circle at its
        // registered segment angle.
        if let Shape::Path { contours, closed } = &out[0].shape {
            assert!(*closed);
            for p in &contours[0].points {
                let idx = p.segment_index.unwrap() as f64;
                let total = p.total_segments.unwrap() as f64;
                let angle = std::f64::consts::TAU * idx / total;
                assert!((p.x - 11.0 * angle.cos()).abs() < 1e-9);
                assert!((p.y - 11.0 * angle.sin()).abs() < 1e-9);
            }
        } else {
            panic!("expected path");
        }
    }

    #[test]
    fn test_circle_collapse_is_degenerate() {
        let mut ctx = ctx();
        let prim = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 0.5);
        let err = offset_primitive(&mut ctx, &prim, -0.5).unwrap_err();
        assert!(matches!(err, OffsetError::Degenerate(_)));
    }

    #[test]
    fn test_square_internal_offset() {
        let mut ctx = ctx();
        let prim = Primitive::rectangle(PrimitiveId(1), Point::new(0.0, 0.0), 10.0, 10.0);
        let out = offset_primitive(&mut ctx, &prim, -1.0).unwrap();
        assert_eq!(out.len(), 1);
        if let Shape::Path { contours, .. } = &out[0].shape {
            let pts = &contours[0].points;
            assert_eq!(pts.len(), 4);
            assert!(contours[0].arc_segments.is_empty());
            assert!((signed_area(pts) - 64.0).abs() < 1e-9);
            for p in pts {
                assert!((p.x - 1.0).abs() < 1e-9 || (p.x - 9.0).abs() < 1e-9);
                assert!((p.y - 1.0).abs() < 1e-9 || (p.y - 9.0).abs() < 1e-9);
            }
        } else {
            panic!("expected path");
        }
        assert_eq!(out[0].props.offset_kind, Some(OffsetKind::Internal));
    }

    #[test]
    fn test_star_external_offset_rounds_tips() {
        use std::f64::consts::TAU;
        let mut ctx = ctx();
        // 5-point star, outer radius 10, inner radius 4.
        let mut pts = Vec::new();
        for i in 0..5 {
            let a_out = TAU * i as f64 / 5.0;
            let a_in = a_out + TAU / 10.0;
            pts.push(Point::new(10.0 * a_out.cos(), 10.0 * a_out.sin()));
            pts.push(Point::new(4.0 * a_in.cos(), 4.0 * a_in.sin()));
        }
        let prim = Primitive::path(PrimitiveId(1), vec![Contour::from_points(pts)], true);
        let out = offset_primitive(&mut ctx, &prim, 0.5).unwrap();
        let contour = out[0].outer_contour().unwrap();
        // One round joint per convex tip, at least.
        assert!(contour.curve_ids.len() >= 5, "expected >= 5 joint curves, got {}", contour.curve_ids.len());
        // Joint vertices share their curve id in consecutive runs of >= 2.
        for cid in &contour.curve_ids {
            let count = contour.points.iter().filter(|p| p.curve_id == Some(*cid)).count();
            assert!(count >= 2, "joint {:?} has {} tessellated vertices", cid, count);
        }
    }

    #[test]
    fn test_obround_offset_keeps_cap_centers() {
        let mut ctx = ctx();
        let prim = Primitive::obround(PrimitiveId(1), Point::new(0.0, 0.0), 20.0, 10.0);
        let out = offset_primitive(&mut ctx, &prim, 1.0).unwrap();
        let contour = out[0].outer_contour().unwrap();
        // Offset obround spans [-11, 11] x [-6, 6].
        let min_x = contour.points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = contour.points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        assert!((min_x + 11.0).abs() < 1e-6);
        assert!((max_x - 11.0).abs() < 1e-6);
        // Cap curves are centered on the original cap centers.
        for cid in &contour.curve_ids {
            let rec = ctx.curves.get(*cid).unwrap();
            assert!((rec.radius - 6.0).abs() < 1e-9);
            assert!(rec.center.y.abs() < 1e-9);
            assert!((rec.center.x + 5.0).abs() < 1e-9 || (rec.center.x - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_stroke_trace_polygonized() {
        let mut ctx = ctx();
        let mut props = PrimitiveProps::stroked(0.4);
        props.is_trace = true;
        let prim = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(0.0, 0.0),
                Point::new(5.0, 0.0),
            ])],
            false,
        )
        .with_props(props);
        let out = offset_primitive(&mut ctx, &prim, 0.3).unwrap();
        let result = &out[0];
        assert!(result.props.fill);
        assert!(!result.props.stroke);
        assert!(result.props.polygonized);
        // Total width 0.4 + 2*0.3 = 1.0; the capsule spans y in [-0.5, 0.5].
        let contour = result.outer_contour().unwrap();
        let max_y = contour.points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        assert!((max_y - 0.5).abs() < 1e-6);
        // Two cap curves registered.
        assert_eq!(contour.curve_ids.len(), 2);
    }

    #[test]
    fn test_stroke_collapse_is_degenerate() {
        let mut ctx = ctx();
        let prim = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(0.0, 0.0),
                Point::new(5.0, 0.0),
            ])],
            false,
        )
        .with_props(PrimitiveProps::stroked(0.4));
        let err = offset_primitive(&mut ctx, &prim, -0.2).unwrap_err();
        assert!(matches!(err, OffsetError::Degenerate(_)));
    }

    #[test]
    fn test_multi_contour_flips_hole_sign() {
        let mut ctx = ctx();
        let outer = Contour::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 20.0),
            Point::new(0.0, 20.0),
        ]);
        let hole = Contour::from_points(vec![
            Point::new(5.0, 5.0),
            Point::new(15.0, 5.0),
            Point::new(15.0, 15.0),
            Point::new(5.0, 15.0),
        ])
        .hole();
        let prim = Primitive::path(PrimitiveId(1), vec![outer, hole], true)
            .with_props(PrimitiveProps::filled());
        let out = offset_primitive(&mut ctx, &prim, 1.0).unwrap();
        assert_eq!(out.len(), 2);
        // The outer ring grew, the hole shrank.
        let outer_area = signed_area(&out[0].outer_contour().unwrap().points).abs();
        let hole_area = signed_area(&out[1].outer_contour().unwrap().points).abs();
        assert!(outer_area > 400.0);
        assert!(hole_area < 100.0);
        assert!(out[1].outer_contour().unwrap().is_hole);
    }

    #[test]
    fn test_centerline_passes_through() {
        let mut ctx = ctx();
        let mut props = PrimitiveProps::default();
        props.is_centerline_path = true;
        let prim = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(0.0, 0.0),
                Point::new(8.0, 0.0),
            ])],
            false,
        )
        .with_props(props);
        let out = offset_primitive(&mut ctx, &prim, 0.5).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].props.offset_kind, Some(OffsetKind::On));
        if let Shape::Path { closed, contours } = &out[0].shape {
            assert!(!closed);
            assert_eq!(contours[0].points.len(), 2);
        } else {
            panic!("expected path");
        }
    }

    #[test]
    fn test_bezier_is_unsupported() {
        let mut ctx = ctx();
        let prim = Primitive::new(
            PrimitiveId(1),
            Shape::Bezier {
                start: Point::new(0.0, 0.0),
                control1: Point::new(1.0, 1.0),
                control2: Point::new(2.0, -1.0),
                end: Point::new(3.0, 0.0),
            },
        );
        assert!(matches!(
            offset_primitive(&mut ctx, &prim, 1.0),
            Err(OffsetError::Unsupported(_))
        ));
    }
}
