//! Arc reconstructor
//!
//! After offsetting and boolean fusion everything is polygons, but vertices
//! that sampled an analytic curve still carry its id. This pass regroups
//! those vertices and re-materializes full circles (when coverage is high
//! enough) or partial-arc metadata on the surviving paths. Reconstruction is
//! best-effort: anything that cannot be recovered passes through as a plain
//! path, and running the pass twice changes nothing.

use serde::Serialize;

use crate::curve::{CurveId, CurveKind};
use crate::geometry::arc_sweep;
use crate::primitive::{ArcSegment, Contour, Point, Primitive, Shape};
use crate::EngineContext;

/// Counters for one reconstruction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    /// Primitives that carried at least one curve-tagged vertex.
    pub registered: usize,
    /// Primitives that gained back analytic information.
    pub reconstructed: usize,
    pub partial_arcs: usize,
    pub full_circles: usize,
    pub wrapped_groups: usize,
    /// Tagged primitives where no curve survived grouping.
    pub failed: usize,
}

#[derive(Debug)]
struct VertexGroup {
    curve_id: Option<CurveId>,
    /// Indices into the contour's points array, in walk order.
    indices: Vec<usize>,
}

/// Reconstruct analytic curves on every path primitive of the slice. Other
/// primitives pass through untouched.
pub fn reconstruct_arcs(ctx: &EngineContext, prims: &[Primitive]) -> (Vec<Primitive>, ReconstructStats) {
    let mut stats = ReconstructStats::default();
    let mut out = Vec::with_capacity(prims.len());
    for prim in prims {
        out.push(reconstruct_primitive(ctx, prim, &mut stats));
    }
    log::info!(
        "arc reconstruction: {} tagged, {} reconstructed ({} circles, {} partial), {} wrapped, {} failed",
        stats.registered,
        stats.reconstructed,
        stats.full_circles,
        stats.partial_arcs,
        stats.wrapped_groups,
        stats.failed
    );
    (out, stats)
}

fn reconstruct_primitive(ctx: &EngineContext, prim: &Primitive, stats: &mut ReconstructStats) -> Primitive {
    let (contours, closed) = match &prim.shape {
        Shape::Path { contours, closed } => (contours, *closed),
        _ => return prim.clone(),
    };
    let Some(contour) = contours.first() else {
        return prim.clone();
    };
    if contours.len() != 1 || !contour.points.iter().any(|p| p.curve_id.is_some()) {
        return prim.clone();
    }
    stats.registered += 1;

    let mut groups = group_vertices(&contour.points);

    // A closed ring whose first and last groups sample the same curve is one
    // curve split across the seam.
    if closed && groups.len() >= 2 && try_wrap_merge(&contour.points, &mut groups) {
        stats.wrapped_groups += 1;
    }

    // A single circle group with enough coverage collapses back to a Circle.
    let curve_groups: Vec<&VertexGroup> = groups.iter().filter(|g| g.curve_id.is_some()).collect();
    if curve_groups.len() == 1 && groups.len() == 1 {
        let group = curve_groups[0];
        if let Some(record) = ctx.curves.get(group.curve_id.unwrap()) {
            if record.kind == CurveKind::Circle {
                let coverage = circle_coverage(ctx, &contour.points, group);
                let threshold = if group.indices.len() >= 20 { 0.90 } else { 0.80 };
                if coverage >= threshold {
                    stats.reconstructed += 1;
                    stats.full_circles += 1;
                    let mut props = prim.props.clone();
                    props.reconstructed = true;
                    return Primitive::circle(prim.id, record.center, record.radius)
                        .with_props(props)
                        .with_curves(vec![group.curve_id.unwrap()]);
                }
            }
        }
    }

    // Otherwise annotate the path with one arc segment per curve group.
    let mut arc_segments = Vec::new();
    for group in &groups {
        let Some(cid) = group.curve_id else { continue };
        if group.indices.len() < 3 {
            continue;
        }
        let Some(record) = ctx.curves.get(cid) else { continue };
        let start_idx = group.indices[0];
        let end_idx = *group.indices.last().unwrap();
        let start = &contour.points[start_idx];
        let end = &contour.points[end_idx];
        let start_angle = (start.y - record.center.y).atan2(start.x - record.center.x);
        let end_angle = (end.y - record.center.y).atan2(end.x - record.center.x);
        arc_segments.push(ArcSegment {
            start_index: start_idx,
            end_index: end_idx,
            center: record.center,
            radius: record.radius,
            start_angle,
            end_angle,
            sweep_angle: arc_sweep(start_angle, end_angle, record.clockwise),
            clockwise: record.clockwise,
            curve_id: Some(cid),
        });
    }

    if arc_segments.is_empty() {
        stats.failed += 1;
        return prim.clone();
    }

    stats.reconstructed += 1;
    stats.partial_arcs += arc_segments.len();

    let mut new_contour = Contour {
        points: contour.points.clone(),
        is_hole: contour.is_hole,
        nesting_level: contour.nesting_level,
        parent_id: contour.parent_id,
        arc_segments,
        curve_ids: contour.curve_ids.clone(),
    };
    if new_contour.curve_ids.is_empty() {
        new_contour.curve_ids = new_contour
            .arc_segments
            .iter()
            .filter_map(|a| a.curve_id)
            .collect();
    }
    let mut props = prim.props.clone();
    props.has_reconstructed_arcs = true;
    let curves = new_contour.curve_ids.clone();
    Primitive::path(prim.id, vec![new_contour], closed)
        .with_props(props)
        .with_curves(curves)
}

/// Group consecutive vertices by curve id; untagged runs form straight
/// groups.
fn group_vertices(points: &[Point]) -> Vec<VertexGroup> {
    let mut groups: Vec<VertexGroup> = Vec::new();
    for (i, p) in points.iter().enumerate() {
        match groups.last_mut() {
            Some(g) if g.curve_id == p.curve_id => g.indices.push(i),
            _ => groups.push(VertexGroup { curve_id: p.curve_id, indices: vec![i] }),
        }
    }
    groups
}

/// Merge the last group into the first when they continue the same curve
/// across the ring seam.
fn try_wrap_merge(points: &[Point], groups: &mut Vec<VertexGroup>) -> bool {
    let first = &groups[0];
    let last = &groups[groups.len() - 1];
    let (Some(a), Some(b)) = (first.curve_id, last.curve_id) else {
        return false;
    };
    if a != b {
        return false;
    }
    let first_seg = points[first.indices[0]].segment_index;
    let last_seg = points[*last.indices.last().unwrap()].segment_index;
    let continuous = match (first_seg, last_seg) {
        // The ring seam split the curve right at its parameter origin, or
        // between adjacent sample indices.
        (Some(0), _) => true,
        (Some(f), Some(l)) => f == l + 1 || f == l,
        _ => false,
    };
    if !continuous {
        return false;
    }
    let mut tail = groups.pop().unwrap();
    tail.indices.extend(groups[0].indices.iter().copied());
    groups[0] = tail;
    true
}

/// Fraction of the registered circle covered by the group's sample indices.
fn circle_coverage(ctx: &EngineContext, points: &[Point], group: &VertexGroup) -> f64 {
    let mut seen: Vec<u32> = group
        .indices
        .iter()
        .filter_map(|&i| points[i].segment_index)
        .collect();
    seen.sort_unstable();
    seen.dedup();
    let total = group
        .indices
        .iter()
        .filter_map(|&i| points[i].total_segments)
        .max();
    match total {
        Some(total) if total > 0 => (seen.len() as f64 / total as f64).min(1.0),
        _ => {
            // Unknown tessellation: estimate against the configured
            // full-circle resolution.
            (group.indices.len() as f64 / ctx.config.full_circle_estimate as f64).min(1.0)
        }
    }
}
