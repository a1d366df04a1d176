//! Geometry translator
//!
//! Turns offset primitives into per-depth [`ToolpathPlan`]s containing pure
//! cutting commands: `Linear` and `ArcCw`/`ArcCcw` only, all at the pass
//! depth. Rapids, plunges, and retracts are the machine processor's job.
//!
//! The geometric rotation sense (Y-up) is inverted exactly once, here, when
//! mapping onto the command variants: a geometrically counter-clockwise
//! motion emits `ArcCw`, matching the CNC convention where clockwise is G2
//! in a Y-down display.

use crate::context::{CutDirection, EntryType, OperationType, ToolpathContext};
use crate::error::{SkipWarning, TranslateError};
use crate::geometry::is_clockwise;
use crate::plan::{
    MotionCommand, ObroundData, PlanMetadata, PlanOptimization, PeckCycle, Point3, ToolInfo,
    ToolpathPlan,
};
use crate::primitive::{ArcSegment, Contour, DrillRole, Point, Primitive, Shape};
use crate::tabs;
use std::collections::HashMap;

#[derive(Debug)]
pub struct TranslateOutput {
    pub plans: Vec<ToolpathPlan>,
    pub warnings: Vec<SkipWarning>,
}

/// Translate one operation's offset primitives into plans, in
/// `(primitive, depth)` lexicographic order with depths shallow to deep.
pub fn translate_operation(
    ctx: &ToolpathContext,
    prims: &[Primitive],
) -> Result<TranslateOutput, TranslateError> {
    ctx.validate()?;
    let mut plans = Vec::new();
    let mut warnings = Vec::new();

    for prim in prims {
        if ctx.operation_type == OperationType::Drill && prim.props.drill_role.is_some() {
            translate_drill(ctx, prim, &mut plans, &mut warnings);
            continue;
        }
        for &depth in &ctx.computed.depth_levels {
            match build_plan(ctx, prim, depth) {
                Some(plan) => plans.push(plan),
                None => {
                    warnings.push(SkipWarning {
                        primitive_id: prim.id.0,
                        reason: format!("untranslatable {} primitive", prim.shape.kind_name()),
                    });
                    log::warn!("translator skipped {:?} ({})", prim.id, prim.shape.kind_name());
                    break;
                }
            }
        }
    }
    Ok(TranslateOutput { plans, warnings })
}

fn base_metadata(ctx: &ToolpathContext, prim: &Primitive, depth: f64) -> PlanMetadata {
    PlanMetadata {
        tool: ToolInfo { id: ctx.tool.id.clone(), diameter: ctx.tool.diameter },
        tool_diameter: ctx.tool.diameter,
        cut_depth: depth,
        feed_rate: ctx.cutting.feed_rate,
        plunge_rate: ctx.cutting.plunge_rate,
        depth_per_pass: ctx.strategy.depth_per_pass,
        step_over: ctx.strategy.step_over,
        entry_type: ctx.strategy.entry_type,
        direction: ctx.strategy.direction,
        operation_type: ctx.operation_type,
        primitive_type: prim.shape.kind_name().to_string(),
        group_key: format!(
            "T:{}_OP:{}_Z:{}",
            ctx.tool.diameter,
            ctx.operation_type.as_str(),
            depth
        ),
        is_centerline_path: prim.props.is_centerline_path,
        tab_height: ctx.strategy.cutout.tab_height,
        ..PlanMetadata::default()
    }
}

fn finish_plan(plan: &mut ToolpathPlan) {
    plan.metadata.bounding_box = plan.compute_bounding_box();
    plan.metadata.optimization = PlanOptimization {
        link_type: crate::plan::LinkType::Rapid,
        optimized_entry_point: plan.metadata.entry_point,
        entry_command_index: 0,
    };
}

fn build_plan(ctx: &ToolpathContext, prim: &Primitive, depth: f64) -> Option<ToolpathPlan> {
    let mut plan = ToolpathPlan::new(ctx.operation_id.clone());
    plan.metadata = base_metadata(ctx, prim, depth);
    let feed = ctx.cutting.feed_rate;

    match &prim.shape {
        Shape::Circle { center, radius } => {
            let start = Point::new(center.x + radius, center.y);
            // Emitted clockwise for conventional cutting; the geometric
            // motion is counter-clockwise (see the module inversion note).
            let emit_cw = ctx.strategy.direction == CutDirection::Conventional;
            plan.push(
                MotionCommand::arc(emit_cw, start.x, start.y, -radius, 0.0, feed).with_z(depth),
            );
            plan.metadata.entry_point = Point3::new(start.x, start.y, depth);
            plan.metadata.exit_point = plan.metadata.entry_point;
            plan.metadata.is_closed_loop = true;
            plan.metadata.is_simple_circle = true;
            plan.metadata.has_arcs = true;
            plan.metadata.center = Some(center.untagged());
            plan.metadata.radius = Some(*radius);
        }
        Shape::Obround { position, width, height } => {
            let (entry, exit, commands) =
                obround_commands(ctx, position, *width, *height, depth, feed)?;
            plan.metadata.entry_point = entry;
            plan.metadata.exit_point = exit;
            plan.metadata.is_closed_loop = true;
            plan.metadata.has_arcs = true;
            for cmd in commands {
                plan.push(cmd);
            }
        }
        Shape::Arc { center, radius, start_angle, end_angle, clockwise } => {
            let start = crate::geometry::point_on_circle(center, *radius, *start_angle);
            let end = crate::geometry::point_on_circle(center, *radius, *end_angle);
            plan.push(MotionCommand::linear_xy(start.x, start.y, feed).with_z(depth));
            plan.push(
                MotionCommand::arc(
                    !clockwise,
                    end.x,
                    end.y,
                    center.x - start.x,
                    center.y - start.y,
                    feed,
                )
                .with_z(depth),
            );
            plan.metadata.entry_point = Point3::new(start.x, start.y, depth);
            plan.metadata.exit_point = Point3::new(end.x, end.y, depth);
            plan.metadata.has_arcs = true;
        }
        Shape::Path { contours, closed } => {
            path_commands(ctx, prim, contours, *closed, depth, feed, &mut plan)?;
        }
        Shape::Bezier { .. } => return None,
        Shape::Rectangle { .. } => return None,
    }

    finish_plan(&mut plan);
    Some(plan)
}

/// Obround walk: from the midpoint of a straight edge, two straight legs and
/// two semicircular caps. Climb runs geometrically counter-clockwise (and so
/// emits the CW command variant per the module inversion); conventional is
/// the mirror. The walk ends half an edge from the entry.
fn obround_commands(
    ctx: &ToolpathContext,
    position: &Point,
    width: f64,
    height: f64,
    depth: f64,
    feed: f64,
) -> Option<(Point3, Point3, Vec<MotionCommand>)> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let horizontal = width >= height;
    let (cx, cy) = (position.x, position.y);
    let r = if horizontal { height / 2.0 } else { width / 2.0 };
    let half_slot = if horizontal { width / 2.0 - r } else { height / 2.0 - r };
    let (c1, c2) = if horizontal {
        (Point::new(cx - half_slot, cy), Point::new(cx + half_slot, cy))
    } else {
        (Point::new(cx, cy - half_slot), Point::new(cx, cy + half_slot))
    };

    // Entry at the midpoint of a straight edge: the top edge for horizontal
    // slots, the left edge for vertical ones. Cap tangent points sit on the
    // entry edge (near) and the opposite edge (far).
    let (entry, near1, near2, far1, far2) = if horizontal {
        (
            Point::new(cx, cy + r),
            Point::new(c1.x, cy + r),
            Point::new(c2.x, cy + r),
            Point::new(c1.x, cy - r),
            Point::new(c2.x, cy - r),
        )
    } else {
        (
            Point::new(cx - r, cy),
            Point::new(cx - r, c1.y),
            Point::new(cx - r, c2.y),
            Point::new(cx + r, c1.y),
            Point::new(cx + r, c2.y),
        )
    };

    let climb = ctx.strategy.direction == CutDirection::Climb;
    let emit_cw = climb;
    let seq: [(Point, Option<Point>); 4] = if climb {
        [(near1, None), (far1, Some(c1)), (far2, None), (near2, Some(c2))]
    } else {
        [(near2, None), (far2, Some(c2)), (far1, None), (near1, Some(c1))]
    };

    let mut commands = Vec::with_capacity(4);
    let mut pos = entry;
    for (to, cap) in seq {
        let cmd = match cap {
            None => MotionCommand::linear_xy(to.x, to.y, feed),
            Some(center) => MotionCommand::arc(
                emit_cw,
                to.x,
                to.y,
                center.x - pos.x,
                center.y - pos.y,
                feed,
            ),
        };
        commands.push(cmd.with_z(depth));
        pos = to;
    }
    Some((
        Point3::new(entry.x, entry.y, depth),
        Point3::new(pos.x, pos.y, depth),
        commands,
    ))
}

/// Walk a path's contours, emitting arcs where arc segments start and
/// linears elsewhere. Cutouts with tabs route through the tab planner.
fn path_commands(
    ctx: &ToolpathContext,
    prim: &Primitive,
    contours: &[Contour],
    closed: bool,
    depth: f64,
    feed: f64,
    plan: &mut ToolpathPlan,
) -> Option<()> {
    if contours.is_empty() || contours.iter().all(|c| c.points.len() < 2) {
        return None;
    }

    let mut entry: Option<Point3> = None;
    let mut exit = Point3::default();
    let mut has_arcs = false;

    for (ci, contour) in contours.iter().enumerate() {
        if contour.points.len() < 2 {
            continue;
        }
        // Conventional cuts walk counter-clockwise, climb clockwise.
        let wants_cw = ctx.strategy.direction == CutDirection::Climb;
        let oriented;
        let contour = if closed && is_clockwise(&contour.points) != wants_cw {
            oriented = reverse_contour(contour);
            &oriented
        } else {
            contour
        };

        let start = contour.points[0];
        if entry.is_none() {
            entry = Some(Point3::new(start.x, start.y, depth));
        } else {
            // Reposition between sub-contours with a feed move at depth.
            plan.push(MotionCommand::linear_xy(start.x, start.y, feed).with_z(depth));
        }

        let use_tabs = ci == 0
            && closed
            && ctx.operation_type == OperationType::Cutout
            && ctx.strategy.cutout.tabs > 0;
        if use_tabs {
            let positions = tabs::compute_tab_positions(
                contour,
                ctx.strategy.cutout.tabs,
                ctx.strategy.cutout.tab_width,
                ctx.strategy.cutout.tab_height,
                ctx.tool.diameter,
                &ctx.config.tabs,
            );
            if !positions.is_empty() {
                let commands = tabs::split_contour_at_tabs(contour, &positions, depth, feed);
                has_arcs |= commands.iter().any(|c| c.i.is_some());
                for cmd in commands {
                    plan.push(cmd);
                }
                plan.metadata.has_tabs = true;
                plan.metadata.tab_positions = positions;
                exit = Point3::new(start.x, start.y, depth);
                continue;
            }
        }

        let (commands, contour_arcs) = walk_contour(contour, closed, depth, feed);
        has_arcs |= contour_arcs;
        let last = commands
            .last()
            .map(|c| Point3::new(c.x.unwrap_or(start.x), c.y.unwrap_or(start.y), depth))
            .unwrap_or(Point3::new(start.x, start.y, depth));
        for cmd in commands {
            plan.push(cmd);
        }
        exit = last;
    }

    let entry = entry?;
    plan.metadata.entry_point = entry;
    plan.metadata.exit_point = exit;
    plan.metadata.is_closed_loop = closed;
    plan.metadata.has_arcs = has_arcs;
    if prim.props.is_centerline_path {
        plan.metadata.is_centerline_path = true;
    }
    Some(())
}

/// Emit commands along one contour: an `Arc` wherever an arc segment starts
/// at the current index (skipping the indices it spans), a `Linear`
/// otherwise, and a closing `Linear` when a closed ring does not end where
/// it began.
fn walk_contour(contour: &Contour, closed: bool, depth: f64, feed: f64) -> (Vec<MotionCommand>, bool) {
    let pts = &contour.points;
    let n = pts.len();
    let arcs_by_start: HashMap<usize, &ArcSegment> = contour
        .arc_segments
        .iter()
        .map(|a| (a.start_index, a))
        .collect();

    let mut commands = Vec::with_capacity(n);
    let mut has_arcs = false;
    let mut pos = pts[0];
    let mut i = 0usize;
    let limit = if closed { n } else { n - 1 };
    while i < limit {
        if let Some(arc) = arcs_by_start.get(&i) {
            let end = pts[arc.end_index];
            commands.push(
                MotionCommand::arc(
                    !arc.clockwise,
                    end.x,
                    end.y,
                    arc.center.x - pos.x,
                    arc.center.y - pos.y,
                    feed,
                )
                .with_z(depth),
            );
            has_arcs = true;
            pos = end;
            i = if arc.end_index <= i { n } else { arc.end_index };
        } else {
            let j = (i + 1) % n;
            let to = pts[j];
            if to.sq_dist(&pos) > f64::EPSILON {
                commands.push(MotionCommand::linear_xy(to.x, to.y, feed).with_z(depth));
            }
            pos = to;
            i += 1;
        }
    }
    if closed && pos.dist(&pts[0]) > 1e-3 {
        commands.push(MotionCommand::linear_xy(pts[0].x, pts[0].y, feed).with_z(depth));
    }
    (commands, has_arcs)
}

/// Reverse a contour's walk direction, remapping arc segments.
fn reverse_contour(contour: &Contour) -> Contour {
    let n = contour.points.len();
    let mut points = contour.points.clone();
    points.reverse();
    let arc_segments = contour
        .arc_segments
        .iter()
        .map(|a| ArcSegment {
            start_index: n - 1 - a.end_index,
            end_index: n - 1 - a.start_index,
            center: a.center,
            radius: a.radius,
            start_angle: a.end_angle,
            end_angle: a.start_angle,
            sweep_angle: -a.sweep_angle,
            clockwise: !a.clockwise,
            curve_id: a.curve_id,
        })
        .collect();
    Contour {
        points,
        is_hole: contour.is_hole,
        nesting_level: contour.nesting_level,
        parent_id: contour.parent_id,
        arc_segments,
        curve_ids: contour.curve_ids.clone(),
    }
}

/// Drill-operation translation: peck marks become single canned-cycle plans;
/// milling paths emit per depth level, or once at final depth for helical
/// entries.
fn translate_drill(
    ctx: &ToolpathContext,
    prim: &Primitive,
    plans: &mut Vec<ToolpathPlan>,
    warnings: &mut Vec<SkipWarning>,
) {
    let final_depth = ctx.final_depth();
    match prim.props.drill_role {
        Some(DrillRole::PeckMark) => {
            let center = match &prim.shape {
                Shape::Circle { center, .. } => center.untagged(),
                Shape::Path { contours, .. } => match contours.first().and_then(|c| c.points.first()) {
                    Some(p) => p.untagged(),
                    None => {
                        warnings.push(SkipWarning {
                            primitive_id: prim.id.0,
                            reason: "peck mark without a position".into(),
                        });
                        return;
                    }
                },
                _ => {
                    warnings.push(SkipWarning {
                        primitive_id: prim.id.0,
                        reason: format!("peck mark on {}", prim.shape.kind_name()),
                    });
                    return;
                }
            };
            let mut plan = ToolpathPlan::new(ctx.operation_id.clone());
            plan.metadata = base_metadata(ctx, prim, final_depth);
            plan.metadata.is_peck_mark = true;
            plan.metadata.center = Some(center);
            plan.metadata.entry_point = Point3::new(center.x, center.y, final_depth);
            plan.metadata.exit_point = plan.metadata.entry_point;
            plan.metadata.peck_cycle = Some(PeckCycle {
                canned_cycle: ctx.strategy.drill.canned_cycle,
                peck_depth: ctx.strategy.drill.peck_depth,
                dwell_time: ctx.strategy.drill.dwell_time,
                retract_height: ctx.strategy.drill.retract_height,
            });
            finish_plan(&mut plan);
            plans.push(plan);
        }
        Some(DrillRole::MillingPath) => {
            let helix = ctx.strategy.drill.entry_type == EntryType::Helix;
            let depths: Vec<f64> = if helix {
                vec![final_depth]
            } else {
                ctx.computed.depth_levels.clone()
            };
            for depth in depths {
                let Some(mut plan) = build_plan(ctx, prim, depth) else {
                    warnings.push(SkipWarning {
                        primitive_id: prim.id.0,
                        reason: "untranslatable drill milling path".into(),
                    });
                    return;
                };
                plan.metadata.is_drill_milling = true;
                plan.metadata.entry_type = ctx.strategy.drill.entry_type;
                if let Shape::Obround { position, width, height } = &prim.shape {
                    let horizontal = width >= height;
                    let r = if horizontal { height / 2.0 } else { width / 2.0 };
                    let half_slot = if horizontal {
                        width / 2.0 - r
                    } else {
                        height / 2.0 - r
                    };
                    let (start_cap, end_cap) = if horizontal {
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
                    plan.metadata.obround_data = Some(ObroundData {
                        position: position.untagged(),
                        width: *width,
                        height: *height,
                        is_horizontal: horizontal,
                        slot_radius: r,
                        start_cap_center: start_cap,
                        end_cap_center: end_cap,
                    });
                }
                plans.push(plan);
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        CannedCycle, Computed, CuttingParams, MachineParams, Strategy, Tool, ToolpathConfig,
    };
    use crate::plan::MotionKind;
    use crate::primitive::{PrimitiveId, PrimitiveProps};

    fn context(op: OperationType, direction: CutDirection) -> ToolpathContext {
        ToolpathContext {
            operation_id: "op-1".into(),
            operation_type: op,
            tool: Tool { id: "T1".into(), diameter: 2.0 },
            cutting: CuttingParams {
                feed_rate: 300.0,
                plunge_rate: 100.0,
                spindle_speed: 10000.0,
                spindle_dwell: 0.0,
            },
            strategy: Strategy { direction, ..Strategy::default() },
            machine: MachineParams::default(),
            computed: Computed { depth_levels: vec![-1.0], offset_distances: vec![] },
            config: ToolpathConfig::default(),
        }
    }

    #[test]
    fn test_circle_conventional_emits_cw_arc() {
        let ctx = context(OperationType::Isolation, CutDirection::Conventional);
        let prim = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 11.0);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        assert_eq!(out.plans.len(), 1);
        let plan = &out.plans[0];
        assert_eq!(plan.commands.len(), 1);
        let cmd = &plan.commands[0];
        assert_eq!(cmd.kind, MotionKind::ArcCw);
        assert_eq!((cmd.x.unwrap(), cmd.y.unwrap()), (11.0, 0.0));
        assert_eq!((cmd.i.unwrap(), cmd.j.unwrap()), (-11.0, 0.0));
        assert_eq!(cmd.z, Some(-1.0));
        assert!(plan.metadata.is_simple_circle);
        assert!(plan.metadata.is_closed_loop);
        let e = plan.metadata.entry_point;
        assert_eq!((e.x, e.y, e.z), (11.0, 0.0, -1.0));
    }

    #[test]
    fn test_circle_climb_emits_ccw_arc() {
        let ctx = context(OperationType::Isolation, CutDirection::Climb);
        let prim = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 5.0);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        assert_eq!(out.plans[0].commands[0].kind, MotionKind::ArcCcw);
    }

    #[test]
    fn test_obround_four_commands() {
        let mut ctx = context(OperationType::Drill, CutDirection::Climb);
        ctx.computed.depth_levels = vec![-1.0];
        let prim = Primitive::obround(PrimitiveId(1), Point::new(0.0, 0.0), 20.0, 10.0);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        let plan = &out.plans[0];
        assert_eq!(plan.commands.len(), 4);
        let kinds: Vec<MotionKind> = plan.commands.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![MotionKind::Linear, MotionKind::ArcCw, MotionKind::Linear, MotionKind::ArcCw]
        );
        assert!(plan.commands.iter().all(|c| c.z == Some(-1.0)));
        // Entry at the top-edge midpoint; climb heads counter-clockwise to
        // the left cap tangent first.
        let e = plan.metadata.entry_point;
        assert_eq!((e.x, e.y, e.z), (0.0, 5.0, -1.0));
        let first = &plan.commands[0];
        assert_eq!((first.x.unwrap(), first.y.unwrap()), (-5.0, 5.0));
        // Cap arcs carry (i, j) offsets to the cap centers at (-5, 0) and
        // (5, 0).
        let first_arc = &plan.commands[1];
        let acx = first.x.unwrap() + first_arc.i.unwrap();
        let acy = first.y.unwrap() + first_arc.j.unwrap();
        assert!((acx + 5.0).abs() < 1e-9 && acy.abs() < 1e-9);
        let second_arc = &plan.commands[3];
        let from = &plan.commands[2];
        let bcx = from.x.unwrap() + second_arc.i.unwrap();
        let bcy = from.y.unwrap() + second_arc.j.unwrap();
        assert!((bcx - 5.0).abs() < 1e-9 && bcy.abs() < 1e-9);
        // The walk ends half an edge from the entry.
        let exit = plan.metadata.exit_point;
        assert_eq!((exit.x, exit.y), (5.0, 5.0));
    }

    #[test]
    fn test_path_with_arc_segment_emits_arc() {
        use std::f64::consts::{FRAC_PI_2, PI};
        let ctx = context(OperationType::Isolation, CutDirection::Conventional);
        let mut contour = Contour::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        contour.arc_segments.push(ArcSegment {
            start_index: 1,
            end_index: 2,
            center: Point::new(10.0, 5.0),
            radius: 5.0,
            start_angle: -FRAC_PI_2,
            end_angle: FRAC_PI_2,
            sweep_angle: PI,
            clockwise: false,
            curve_id: None,
        });
        let prim = Primitive::path(PrimitiveId(1), vec![contour], true);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        let plan = &out.plans[0];
        assert!(plan.metadata.has_arcs);
        let arc_cmds: Vec<&MotionCommand> =
            plan.commands.iter().filter(|c| c.i.is_some()).collect();
        assert_eq!(arc_cmds.len(), 1);
        // Geometric CCW arc emits the CW variant.
        assert_eq!(arc_cmds[0].kind, MotionKind::ArcCw);
    }

    #[test]
    fn test_path_multi_depth_order() {
        let mut ctx = context(OperationType::Isolation, CutDirection::Conventional);
        ctx.computed.depth_levels = vec![-0.5, -1.0];
        let prim = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ])],
            true,
        );
        let out = translate_operation(&ctx, &[prim]).unwrap();
        assert_eq!(out.plans.len(), 2);
        assert_eq!(out.plans[0].metadata.cut_depth, -0.5);
        assert_eq!(out.plans[1].metadata.cut_depth, -1.0);
        assert!(out.plans[0]
            .metadata
            .group_key
            .contains("T:2_OP:isolation_Z:-0.5"));
    }

    #[test]
    fn test_cutout_with_tabs() {
        let mut ctx = context(OperationType::Cutout, CutDirection::Conventional);
        ctx.strategy.cutout.tabs = 2;
        ctx.strategy.cutout.tab_width = 1.0;
        ctx.strategy.cutout.tab_height = 0.5;
        ctx.computed.depth_levels = vec![-2.0];
        let prim = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 30.0),
                Point::new(0.0, 30.0),
            ])],
            true,
        )
        .with_props(PrimitiveProps { is_cutout: true, ..PrimitiveProps::filled() });
        let out = translate_operation(&ctx, &[prim]).unwrap();
        let plan = &out.plans[0];
        assert!(plan.metadata.has_tabs);
        assert_eq!(plan.metadata.tab_positions.len(), 2);
        assert_eq!(plan.commands.len(), 8);
        assert_eq!(plan.commands.iter().filter(|c| c.is_tab).count(), 2);
    }

    #[test]
    fn test_peck_mark_plan() {
        let mut ctx = context(OperationType::Drill, CutDirection::Conventional);
        ctx.strategy.drill.canned_cycle = CannedCycle::G83;
        ctx.strategy.drill.peck_depth = 0.4;
        ctx.computed.depth_levels = vec![-1.2];
        let mut props = PrimitiveProps::default();
        props.drill_role = Some(DrillRole::PeckMark);
        let prim = Primitive::circle(PrimitiveId(1), Point::new(3.0, 4.0), 0.4).with_props(props);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        assert_eq!(out.plans.len(), 1);
        let plan = &out.plans[0];
        assert!(plan.metadata.is_peck_mark);
        assert!(plan.commands.is_empty());
        let e = plan.metadata.entry_point;
        assert_eq!((e.x, e.y, e.z), (3.0, 4.0, -1.2));
        let pc = plan.metadata.peck_cycle.as_ref().unwrap();
        assert_eq!(pc.canned_cycle, CannedCycle::G83);
        assert_eq!(pc.peck_depth, 0.4);
    }

    #[test]
    fn test_drill_milling_helix_single_plan() {
        let mut ctx = context(OperationType::Drill, CutDirection::Conventional);
        ctx.strategy.drill.entry_type = EntryType::Helix;
        ctx.computed.depth_levels = vec![-0.5, -1.0, -1.6];
        let mut props = PrimitiveProps::default();
        props.drill_role = Some(DrillRole::MillingPath);
        let prim = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 1.5).with_props(props);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        // Helix handles Z internally: one plan at final depth.
        assert_eq!(out.plans.len(), 1);
        assert!(out.plans[0].metadata.is_drill_milling);
        assert_eq!(out.plans[0].metadata.cut_depth, -1.6);
    }

    #[test]
    fn test_drill_milling_plunge_per_depth() {
        let mut ctx = context(OperationType::Drill, CutDirection::Conventional);
        ctx.strategy.drill.entry_type = EntryType::Plunge;
        ctx.computed.depth_levels = vec![-0.5, -1.0];
        let mut props = PrimitiveProps::default();
        props.drill_role = Some(DrillRole::MillingPath);
        let prim = Primitive::obround(PrimitiveId(1), Point::new(0.0, 0.0), 4.0, 2.0).with_props(props);
        let out = translate_operation(&ctx, &[prim]).unwrap();
        assert_eq!(out.plans.len(), 2);
        let od = out.plans[0].metadata.obround_data.as_ref().unwrap();
        assert!(od.is_horizontal);
        assert_eq!(od.slot_radius, 1.0);
        assert_eq!((od.start_cap_center.x, od.start_cap_center.y), (-1.0, 0.0));
        assert_eq!((od.end_cap_center.x, od.end_cap_center.y), (1.0, 0.0));
    }

    #[test]
    fn test_bezier_skipped_with_warning() {
        let ctx = context(OperationType::Isolation, CutDirection::Conventional);
        let prim = Primitive::new(
            PrimitiveId(7),
            Shape::Bezier {
                start: Point::new(0.0, 0.0),
                control1: Point::new(1.0, 1.0),
                control2: Point::new(2.0, -1.0),
                end: Point::new(3.0, 0.0),
            },
        );
        let out = translate_operation(&ctx, &[prim]).unwrap();
        assert!(out.plans.is_empty());
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].primitive_id, 7);
    }

    #[test]
    fn test_invalid_context_fails_whole_operation() {
        let mut ctx = context(OperationType::Isolation, CutDirection::Conventional);
        ctx.cutting.feed_rate = 0.0;
        let prim = Primitive::circle(PrimitiveId(1), Point::new(0.0, 0.0), 5.0);
        assert!(matches!(
            translate_operation(&ctx, &[prim]),
            Err(TranslateError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_winding_invariance_of_direction() {
        // The same square stored CW or CCW walks identically for a given
        // direction.
        let ctx = context(OperationType::Isolation, CutDirection::Conventional);
        let ccw = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ])],
            true,
        );
        let cw = Primitive::path(
            PrimitiveId(2),
            vec![Contour::from_points(vec![
                Point::new(0.0, 10.0),
                Point::new(10.0, 10.0),
                Point::new(10.0, 0.0),
                Point::new(0.0, 0.0),
            ])],
            true,
        );
        let a = translate_operation(&ctx, &[ccw]).unwrap();
        let b = translate_operation(&ctx, &[cw]).unwrap();
        let walk = |p: &ToolpathPlan| -> Vec<(i64, i64)> {
            p.commands
                .iter()
                .map(|c| ((c.x.unwrap() * 1000.0) as i64, (c.y.unwrap() * 1000.0) as i64))
                .collect()
        };
        let mut wa = walk(&a.plans[0]);
        let wb = walk(&b.plans[0]);
        // Same cycle, possibly rotated.
        assert_eq!(wa.len(), wb.len());
        let rotations = wa.len();
        let mut matched = false;
        for _ in 0..rotations {
            if wa == wb {
                matched = true;
                break;
            }
            wa.rotate_left(1);
        }
        assert!(matched, "walks differ beyond rotation: {:?} vs {:?}", wa, wb);
    }
}
