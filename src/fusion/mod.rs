//! Boolean-fusion seam over the external clipping library
//!
//! The engine treats robust polygon clipping as a collaborator: primitives
//! are polygonized, snapped to the integer-scaled grid the clipper contract
//! calls for, and handed to `geo`'s boolean ops. The clipper strips vertex
//! curve tags, so matching tags are re-attached to coincident output
//! vertices here; the arc reconstructor then recovers circles and arc
//! metadata from them.

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use std::collections::HashMap;

use crate::geometry::tessellate::primitive_to_path;
use crate::primitive::{Contour, Point, Primitive, PrimitiveProps, Shape};
use crate::EngineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionOp {
    Union,
    Intersection,
    Difference,
}

/// Snap a coordinate onto the clip-scale grid.
fn snap(ctx: &EngineContext, v: f64) -> f64 {
    (v * ctx.config.clip_scale).round() / ctx.config.clip_scale
}

fn tag_key(ctx: &EngineContext, x: f64, y: f64) -> (i64, i64) {
    (
        (x * ctx.config.clip_scale).round() as i64,
        (y * ctx.config.clip_scale).round() as i64,
    )
}

/// Collect curve-tagged vertices keyed by snapped position so tags survive
/// the round trip through the clipper.
fn collect_tags(ctx: &EngineContext, prims: &[Primitive], into: &mut HashMap<(i64, i64), Point>) {
    for prim in prims {
        if let Shape::Path { contours, .. } = &prim.shape {
            for contour in contours {
                for p in &contour.points {
                    if p.curve_id.is_some() {
                        into.entry(tag_key(ctx, p.x, p.y)).or_insert(*p);
                    }
                }
            }
        }
    }
}

fn contour_to_ring(ctx: &EngineContext, contour: &Contour) -> LineString<f64> {
    LineString::from(
        contour
            .points
            .iter()
            .map(|p| Coord { x: snap(ctx, p.x), y: snap(ctx, p.y) })
            .collect::<Vec<_>>(),
    )
}

/// Polygonize a slice of primitives into a `MultiPolygon`. Hole contours
/// attach to the most recent outer contour of the same path.
fn to_multipolygon(ctx: &mut EngineContext, prims: &[Primitive]) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    for prim in prims {
        let path;
        let contours = match &prim.shape {
            Shape::Path { contours, .. } => contours,
            _ => match primitive_to_path(ctx, prim) {
                Some(p) => {
                    path = p;
                    match &path.shape {
                        Shape::Path { contours, .. } => contours,
                        _ => continue,
                    }
                }
                None => {
                    log::warn!("fusion skipped unpolygonizable {:?}", prim.id);
                    continue;
                }
            },
        };
        let mut exterior: Option<LineString<f64>> = None;
        let mut holes: Vec<LineString<f64>> = Vec::new();
        for contour in contours {
            if contour.points.len() < 3 {
                continue;
            }
            let ring = contour_to_ring(ctx, contour);
            if contour.is_hole {
                holes.push(ring);
            } else {
                if let Some(ext) = exterior.take() {
                    polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(ring);
            }
        }
        if let Some(ext) = exterior {
            polygons.push(Polygon::new(ext, holes));
        }
    }
    MultiPolygon(polygons)
}

/// Convert clipper output back into path primitives, re-attaching curve tags
/// to vertices that coincide with tagged input vertices.
fn from_multipolygon(
    ctx: &mut EngineContext,
    mp: MultiPolygon<f64>,
    tags: &HashMap<(i64, i64), Point>,
    props: &PrimitiveProps,
) -> Vec<Primitive> {
    let mut out = Vec::new();
    for poly in mp.0 {
        let mut contours = Vec::new();
        let exterior = ring_to_contour(ctx, poly.exterior(), false, tags);
        if exterior.points.len() < 3 {
            continue;
        }
        contours.push(exterior);
        for hole in poly.interiors() {
            let contour = ring_to_contour(ctx, hole, true, tags);
            if contour.points.len() >= 3 {
                contours.push(contour);
            }
        }
        let id = ctx.alloc_id();
        out.push(Primitive::path(id, contours, true).with_props(props.clone()));
    }
    out
}

fn ring_to_contour(
    ctx: &EngineContext,
    ring: &LineString<f64>,
    is_hole: bool,
    tags: &HashMap<(i64, i64), Point>,
) -> Contour {
    let mut coords = ring.0.clone();
    // geo rings carry a duplicated closing vertex.
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    let points = coords
        .into_iter()
        .map(|c| match tags.get(&tag_key(ctx, c.x, c.y)) {
            Some(tagged) => Point { x: c.x, y: c.y, ..*tagged },
            None => Point::new(c.x, c.y),
        })
        .collect();
    let mut contour = Contour::from_points(points);
    contour.is_hole = is_hole;
    contour.nesting_level = if is_hole { 1 } else { 0 };
    // Curve ids present on any tagged vertex are recorded on the contour.
    let mut ids: Vec<_> = contour.points.iter().filter_map(|p| p.curve_id).collect();
    ids.dedup();
    contour.curve_ids = ids;
    contour
}

/// Boolean-fuse two primitive groups.
pub fn fuse(
    ctx: &mut EngineContext,
    a: &[Primitive],
    b: &[Primitive],
    op: FusionOp,
) -> Vec<Primitive> {
    let mut tags = HashMap::new();
    collect_tags(ctx, a, &mut tags);
    collect_tags(ctx, b, &mut tags);
    let ma = to_multipolygon(ctx, a);
    let mb = to_multipolygon(ctx, b);
    let fused = match op {
        FusionOp::Union => ma.union(&mb),
        FusionOp::Intersection => ma.intersection(&mb),
        FusionOp::Difference => ma.difference(&mb),
    };
    let props = a
        .first()
        .map(|p| p.props.clone())
        .unwrap_or_else(PrimitiveProps::filled);
    from_multipolygon(ctx, fused, &tags, &props)
}

/// Union an entire primitive group into non-overlapping paths.
pub fn union_all(ctx: &mut EngineContext, prims: &[Primitive]) -> Vec<Primitive> {
    if prims.is_empty() {
        return Vec::new();
    }
    let mut tags = HashMap::new();
    collect_tags(ctx, prims, &mut tags);
    let mut acc = to_multipolygon(ctx, &prims[0..1]);
    for prim in &prims[1..] {
        let next = to_multipolygon(ctx, std::slice::from_ref(prim));
        acc = acc.union(&next);
    }
    let props = prims[0].props.clone();
    from_multipolygon(ctx, acc, &tags, &props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::PrimitiveId;
    use crate::EngineConfig;

    fn ctx() -> EngineContext {
        EngineContext::new(EngineConfig::default())
    }

    fn square_at(id: u64, x: f64, size: f64) -> Primitive {
        Primitive::path(
            PrimitiveId(id),
            vec![Contour::from_points(vec![
                Point::new(x, 0.0),
                Point::new(x + size, 0.0),
                Point::new(x + size, size),
                Point::new(x, size),
            ])],
            true,
        )
        .with_props(PrimitiveProps::filled())
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let mut ctx = ctx();
        let fused = union_all(&mut ctx, &[square_at(1, 0.0, 10.0), square_at(2, 5.0, 10.0)]);
        assert_eq!(fused.len(), 1);
        let area = crate::geometry::signed_area(&fused[0].outer_contour().unwrap().points).abs();
        // 10x10 + 10x10 - 5x10 overlap.
        assert!((area - 150.0).abs() < 1.0, "area {}", area);
    }

    #[test]
    fn test_disjoint_squares_stay_separate() {
        let mut ctx = ctx();
        let fused = union_all(&mut ctx, &[square_at(1, 0.0, 4.0), square_at(2, 10.0, 4.0)]);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_difference_cuts_hole() {
        let mut ctx = ctx();
        let outer = square_at(1, 0.0, 20.0);
        let inner = Primitive::path(
            PrimitiveId(2),
            vec![Contour::from_points(vec![
                Point::new(5.0, 5.0),
                Point::new(15.0, 5.0),
                Point::new(15.0, 15.0),
                Point::new(5.0, 15.0),
            ])],
            true,
        )
        .with_props(PrimitiveProps::filled());
        let fused = fuse(&mut ctx, &[outer], &[inner], FusionOp::Difference);
        assert_eq!(fused.len(), 1);
        if let Shape::Path { contours, .. } = &fused[0].shape {
            assert_eq!(contours.len(), 2);
            assert!(contours[1].is_hole);
        } else {
            panic!("expected path");
        }
    }

    #[test]
    fn test_tags_survive_union_of_disjoint_circles() {
        let mut ctx = ctx();
        let circle = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 5.0);
        let square = square_at(2, 20.0, 4.0);
        let path = primitive_to_path(&mut ctx, &circle).unwrap();
        let fused = union_all(&mut ctx, &[path, square]);
        assert_eq!(fused.len(), 2);
        // The circle's vertices keep their curve tags through the clipper.
        let tagged: usize = fused
            .iter()
            .flat_map(|p| match &p.shape {
                Shape::Path { contours, .. } => contours[0].points.iter(),
                _ => unreachable!(),
            })
            .filter(|p| p.curve_id.is_some())
            .count();
        assert!(tagged >= ctx.config.min_circle_segments as usize - 2,
            "only {} tagged vertices survived", tagged);
    }
}
