//! Machine processor
//!
//! Sequences pure cutting plans into machine-ready motion: rapids between
//! features, plunge/helix/ramp entries, peck cycles for drills, helical
//! slot milling, tab lifts, and retracts, tracking the tool position across
//! the whole operation. Link decisions (multi-depth plunge vs. staydown vs.
//! rapid) are logged at debug level; the processor never reorders plans.

use std::f64::consts::TAU;

use crate::context::{CannedCycle, EntryType, ToolpathContext};
use crate::plan::{LinkType, MotionCommand, PeckCycle, Point3, ToolpathPlan};

/// Clearance above Z0 where rapid approach ends and feed moves begin, mm.
pub const FEED_HEIGHT: f64 = 1.0;
/// XY coincidence tolerance for multi-depth plunge links, mm.
const XY_MATCH_TOLERANCE: f64 = 0.01;
/// Rapid approach clearance above the previous peck bottom, mm.
const PECK_APPROACH_CLEARANCE: f64 = 0.1;

/// Sequence an ordered list of plans into executable plans. `initial` is the
/// tool position at operation start; it defaults to the safe plane over the
/// origin.
pub fn process_plans(
    ctx: &ToolpathContext,
    plans: &[ToolpathPlan],
    initial: Option<Point3>,
) -> Vec<ToolpathPlan> {
    let mut out: Vec<ToolpathPlan> = Vec::new();
    if plans.is_empty() {
        return out;
    }
    let safe_z = ctx.machine.safe_z;
    let travel_z = ctx.machine.travel_z;
    let mut pos = initial.unwrap_or(Point3::new(0.0, 0.0, safe_z));

    // Init plan: get to the safe plane and over the first entry.
    let mut init = ToolpathPlan::new(ctx.operation_id.clone());
    init.metadata = plans[0].metadata.clone();
    init.metadata.primitive_type = "init".into();
    if pos.z <= safe_z {
        init.push(MotionCommand::rapid_z(safe_z));
    }
    let first_entry = plans[0].metadata.optimization.optimized_entry_point;
    init.push(MotionCommand::rapid_xy(first_entry.x, first_entry.y));
    track_all(&mut pos, &init.commands);
    out.push(init);

    for idx in 0..plans.len() {
        let plan = &plans[idx];
        let prev = if idx > 0 { Some(&plans[idx - 1]) } else { None };
        let next = plans.get(idx + 1);

        let executed = if plan.metadata.is_peck_mark {
            let p = peck_cycle_plan(ctx, plan, &pos);
            track_all(&mut pos, &p.commands);
            p
        } else if plan.metadata.is_drill_milling
            && plan.metadata.entry_type == EntryType::Helix
            && matches!(plan.metadata.primitive_type.as_str(), "circle" | "obround")
        {
            let p = helical_drill_plan(ctx, plan, &pos);
            track_all(&mut pos, &p.commands);
            p
        } else if plan.metadata.is_centerline_path {
            let p = zigzag_slot_plan(ctx, plan, &pos);
            track_all(&mut pos, &p.commands);
            p
        } else {
            let p = milling_plan(ctx, plan, prev, next, &pos);
            track_all(&mut pos, &p.commands);
            p
        };
        out.push(executed);
    }

    // Final retract to the safe plane.
    if pos.z < safe_z {
        if let Some(last) = out.last_mut() {
            last.push(MotionCommand::rapid_z(safe_z));
        }
        pos.z = safe_z;
    }
    out
}

/// Concatenate executed plans into the flat command stream the emitter
/// consumes.
pub fn flatten(plans: &[ToolpathPlan]) -> Vec<MotionCommand> {
    plans.iter().flat_map(|p| p.commands.iter().cloned()).collect()
}

/// Tool position after executing every command of the given plans.
pub fn final_position(plans: &[ToolpathPlan], initial: Point3) -> Point3 {
    let mut pos = initial;
    for plan in plans {
        track_all(&mut pos, &plan.commands);
    }
    pos
}

fn track(pos: &mut Point3, cmd: &MotionCommand) {
    if let Some(x) = cmd.x {
        pos.x = x;
    }
    if let Some(y) = cmd.y {
        pos.y = y;
    }
    if let Some(z) = cmd.z {
        pos.z = z;
    }
}

fn track_all(pos: &mut Point3, commands: &[MotionCommand]) {
    for cmd in commands {
        track(pos, cmd);
    }
}

fn xy_matches(a: &Point3, b: &Point3) -> bool {
    (a.x - b.x).abs() <= XY_MATCH_TOLERANCE && (a.y - b.y).abs() <= XY_MATCH_TOLERANCE
}

/// Classify how `plan` connects to the plan before it.
fn classify_link(prev: Option<&ToolpathPlan>, plan: &ToolpathPlan) -> LinkType {
    if plan.metadata.optimization.link_type == LinkType::Staydown {
        return LinkType::Staydown;
    }
    if let Some(prev) = prev {
        let a = &prev.metadata;
        let b = &plan.metadata;
        if prev.operation_id == plan.operation_id
            && xy_matches(&a.entry_point, &b.entry_point)
            && b.cut_depth < a.cut_depth
            && !a.is_peck_mark
            && !b.is_peck_mark
            && !a.is_drill_milling
            && !b.is_drill_milling
        {
            return LinkType::Multidepth;
        }
    }
    LinkType::Rapid
}

/// General milling sequence: connection, entry, cutting with tab lifts,
/// retract.
fn milling_plan(
    ctx: &ToolpathContext,
    plan: &ToolpathPlan,
    prev: Option<&ToolpathPlan>,
    next: Option<&ToolpathPlan>,
    start_pos: &Point3,
) -> ToolpathPlan {
    let mut out = ToolpathPlan::new(plan.operation_id.clone());
    out.metadata = plan.metadata.clone();
    let mut pos = *start_pos;

    let depth = plan.metadata.cut_depth;
    let entry = plan.metadata.optimization.optimized_entry_point;
    let feed = plan.metadata.feed_rate;
    let plunge = plan.metadata.plunge_rate;
    let travel_z = ctx.machine.travel_z;

    let link = classify_link(prev, plan);
    log::debug!(
        "plan {} link={:?} entry={:?} depth={}",
        plan.operation_id,
        link,
        plan.metadata.entry_type,
        depth
    );

    match link {
        LinkType::Multidepth => {
            // Already on the loop at the previous pass depth: plunge in
            // place.
            out.push(MotionCommand::linear_xyz(entry.x, entry.y, depth, plunge));
        }
        LinkType::Staydown => {
            // The optimizer promised an unbroken feed path; keep Z.
            out.push(MotionCommand::linear_xy(entry.x, entry.y, feed));
        }
        LinkType::Rapid => {
            if pos.z < travel_z {
                out.push(MotionCommand::rapid_z(travel_z));
                pos.z = travel_z;
            }
            if (pos.x - entry.x).abs() > 1e-6 || (pos.y - entry.y).abs() > 1e-6 {
                out.push(MotionCommand::rapid_xy(entry.x, entry.y));
            }
            match plan.metadata.entry_type {
                EntryType::Plunge => {
                    out.push(MotionCommand::rapid_z(FEED_HEIGHT));
                    out.push(MotionCommand::linear_z(depth, plunge));
                }
                EntryType::Helix => helix_entry(ctx, plan, &entry, depth, &mut out),
                EntryType::Ramp => ramp_entry(ctx, plan, &entry, depth, &mut out),
            }
        }
    }

    // Cutting: the plan's commands verbatim, stamped to the pass depth, with
    // tab segments lifted to the tab ridge.
    let tab_top = ctx.final_depth() + plan.metadata.tab_height;
    for cmd in &plan.commands {
        let mut cmd = cmd.clone();
        if cmd.feed.is_none() && cmd.is_cutting() {
            cmd.feed = Some(feed);
        }
        if cmd.is_tab && depth < tab_top - 1e-9 {
            out.push(MotionCommand::linear_z(tab_top, plunge));
            out.push(cmd.clone().with_z(tab_top));
            out.push(MotionCommand::linear_z(depth, plunge));
        } else {
            out.push(cmd.with_z(depth));
        }
    }

    // Retract unless the next plan keeps the tool down.
    let suppress = next
        .map(|n| classify_link(Some(plan), n) != LinkType::Rapid)
        .unwrap_or(false);
    if !suppress {
        out.push(MotionCommand::rapid_z(travel_z));
    } else {
        log::debug!("retract suppressed before staydown/multidepth continuation");
    }
    out
}

/// Helical entry: feed to Z0, spiral around the entry point down to the pass
/// depth, recenter at the bottom.
fn helix_entry(
    ctx: &ToolpathContext,
    plan: &ToolpathPlan,
    entry: &Point3,
    depth: f64,
    out: &mut ToolpathPlan,
) {
    let cfg = &ctx.config.entry.helix;
    let radius = plan.metadata.tool_diameter * cfg.radius_factor;
    let plunge = plan.metadata.plunge_rate;

    out.push(MotionCommand::rapid_z(FEED_HEIGHT));
    out.push(MotionCommand::linear_z(0.0, plunge));

    let revolutions = (depth.abs() / cfg.pitch).max(1e-6);
    let total = (revolutions * cfg.segments_per_revolution as f64).ceil().max(1.0) as u32;
    out.push(MotionCommand::linear_xy(entry.x + radius, entry.y, plunge));
    for k in 1..=total {
        let angle = TAU * k as f64 / cfg.segments_per_revolution as f64;
        let z = depth * k as f64 / total as f64;
        out.push(MotionCommand::linear_xyz(
            entry.x + radius * angle.cos(),
            entry.y + radius * angle.sin(),
            z,
            plunge,
        ));
    }
    out.push(MotionCommand::linear_xyz(entry.x, entry.y, depth, plunge));
}

/// Ramp entry: feed to Z0, then descend along the contour's first commands
/// at the configured ramp slope, clamping at the pass depth.
fn ramp_entry(
    ctx: &ToolpathContext,
    plan: &ToolpathPlan,
    entry: &Point3,
    depth: f64,
    out: &mut ToolpathPlan,
) {
    let plunge = plan.metadata.plunge_rate;
    let slope = ctx.strategy.entry_ramp_angle.tan().max(1e-6);

    out.push(MotionCommand::rapid_z(FEED_HEIGHT));
    out.push(MotionCommand::linear_z(0.0, plunge));

    let mut z = 0.0;
    let (mut cx, mut cy) = (entry.x, entry.y);
    for cmd in &plan.commands {
        if z <= depth {
            break;
        }
        let (Some(x), Some(y)) = (cmd.x, cmd.y) else { continue };
        let dist = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
        if dist < 1e-9 {
            continue;
        }
        z = (z - slope * dist).max(depth);
        out.push(MotionCommand::linear_xyz(x, y, z, plunge));
        cx = x;
        cy = y;
    }
    if z > depth {
        // Contour shorter than one ramp lap; finish the descent in place.
        out.push(MotionCommand::linear_xyz(cx, cy, depth, plunge));
    }
}

/// Drill peck cycle, expanded long-form (G83-like) or as a single plunge for
/// shallow holes.
fn peck_cycle_plan(ctx: &ToolpathContext, plan: &ToolpathPlan, start_pos: &Point3) -> ToolpathPlan {
    let mut out = ToolpathPlan::new(plan.operation_id.clone());
    out.metadata = plan.metadata.clone();
    let entry = plan.metadata.entry_point;
    let final_depth = plan.metadata.cut_depth;
    let travel_z = ctx.machine.travel_z;
    let plunge = plan.metadata.plunge_rate;

    let cycle = plan.metadata.peck_cycle.clone().unwrap_or(PeckCycle {
        canned_cycle: ctx.strategy.drill.canned_cycle,
        peck_depth: ctx.strategy.drill.peck_depth,
        dwell_time: ctx.strategy.drill.dwell_time,
        retract_height: ctx.strategy.drill.retract_height,
    });

    if start_pos.z < travel_z {
        out.push(MotionCommand::rapid_z(travel_z));
    }
    out.push(MotionCommand::rapid_xy(entry.x, entry.y));
    out.push(MotionCommand::rapid_z(FEED_HEIGHT));

    let single_shot = cycle.canned_cycle == CannedCycle::None
        || cycle.peck_depth <= 0.0
        || cycle.peck_depth >= final_depth.abs();
    if single_shot {
        out.push(MotionCommand::plunge(final_depth, plunge));
        if cycle.dwell_time > 0.0 {
            out.push(MotionCommand::dwell(cycle.dwell_time));
        }
        out.push(MotionCommand::retract(travel_z));
        return out;
    }

    let mut last = 0.0;
    let mut first = true;
    loop {
        if !first {
            out.push(MotionCommand::rapid_z(last + PECK_APPROACH_CLEARANCE));
        }
        let next = (last - cycle.peck_depth).max(final_depth);
        out.push(MotionCommand::plunge(next, plunge));
        if cycle.dwell_time > 0.0 {
            out.push(MotionCommand::dwell(cycle.dwell_time));
        }
        if next <= final_depth + 1e-9 {
            break;
        }
        out.push(MotionCommand::retract(cycle.retract_height));
        last = next;
        first = false;
    }
    out.push(MotionCommand::retract(travel_z));
    out
}

/// Helical drill-milling of a circle or obround hole at final depth.
fn helical_drill_plan(ctx: &ToolpathContext, plan: &ToolpathPlan, start_pos: &Point3) -> ToolpathPlan {
    let mut out = ToolpathPlan::new(plan.operation_id.clone());
    out.metadata = plan.metadata.clone();
    let travel_z = ctx.machine.travel_z;
    if start_pos.z < travel_z {
        out.push(MotionCommand::rapid_z(travel_z));
    }
    match plan.metadata.primitive_type.as_str() {
        "circle" => helical_circle(ctx, plan, &mut out),
        "obround" => helical_obround(ctx, plan, &mut out),
        _ => unreachable!("helical drill milling dispatched on circle/obround only"),
    }
    out.push(MotionCommand::retract(travel_z));
    out
}

fn helical_circle(ctx: &ToolpathContext, plan: &ToolpathPlan, out: &mut ToolpathPlan) {
    let center = plan
        .metadata
        .center
        .unwrap_or(crate::primitive::Point::new(0.0, 0.0));
    let radius = plan.metadata.radius.unwrap_or(0.0);
    let final_depth = plan.metadata.cut_depth;
    let plunge = plan.metadata.plunge_rate;
    let feed = plan.metadata.feed_rate;
    let pitch = ctx.config.entry.helix.pitch;

    if 2.0 * radius < ctx.config.entry.drilling.min_helix_diameter {
        // Too small to helix; straight plunge at the hole center.
        log::debug!("helical milling degraded to plunge (diameter {})", 2.0 * radius);
        out.push(MotionCommand::rapid_xy(center.x, center.y));
        out.push(MotionCommand::rapid_z(FEED_HEIGHT));
        out.push(MotionCommand::plunge(final_depth, plunge));
        return;
    }

    let start_x = center.x + radius;
    out.push(MotionCommand::rapid_xy(start_x, center.y));
    out.push(MotionCommand::rapid_z(FEED_HEIGHT));
    out.push(MotionCommand::linear_z(0.0, plunge));

    // Clockwise geometric sweep, stepped in sixteenths of a revolution; the
    // command variant carries the translator's sign inversion.
    let revolutions = (final_depth.abs() / pitch).max(1e-6);
    let total = (revolutions * 16.0).ceil().max(1.0) as u32;
    let mut prev_angle = 0.0_f64;
    for k in 1..=total {
        let angle = -(TAU / 16.0) * k as f64;
        let z = final_depth * k as f64 / total as f64;
        let from = Point3::new(
            center.x + radius * prev_angle.cos(),
            center.y + radius * prev_angle.sin(),
            0.0,
        );
        let mut cmd = MotionCommand::arc(
            false,
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
            center.x - from.x,
            center.y - from.y,
            plunge,
        );
        cmd.z = Some(z);
        out.push(cmd);
        prev_angle = angle;
    }
    // Finishing pass: one full circle at the bottom to clean the floor wall.
    let from = Point3::new(
        center.x + radius * prev_angle.cos(),
        center.y + radius * prev_angle.sin(),
        final_depth,
    );
    let mut finish = MotionCommand::arc(
        false,
        from.x,
        from.y,
        center.x - from.x,
        center.y - from.y,
        feed,
    );
    finish.z = Some(final_depth);
    out.push(finish);
}

fn helical_obround(ctx: &ToolpathContext, plan: &ToolpathPlan, out: &mut ToolpathPlan) {
    let Some(od) = plan.metadata.obround_data.clone() else {
        log::warn!("obround drill milling without obround data; plunging at entry");
        let e = plan.metadata.entry_point;
        out.push(MotionCommand::rapid_xy(e.x, e.y));
        out.push(MotionCommand::rapid_z(FEED_HEIGHT));
        out.push(MotionCommand::plunge(plan.metadata.cut_depth, plan.metadata.plunge_rate));
        return;
    };
    let final_depth = plan.metadata.cut_depth;
    let plunge = plan.metadata.plunge_rate;
    let feed = plan.metadata.feed_rate;
    let pitch = ctx.config.entry.helix.pitch;
    let r = od.slot_radius;
    let (c1, c2) = (od.start_cap_center, od.end_cap_center);

    // Slot loop corners, geometric CW walk starting over the start cap.
    let quad: [Point3; 4] = if od.is_horizontal {
        [
            Point3::new(c1.x, c1.y + r, 0.0),
            Point3::new(c2.x, c2.y + r, 0.0),
            Point3::new(c2.x, c2.y - r, 0.0),
            Point3::new(c1.x, c1.y - r, 0.0),
        ]
    } else {
        [
            Point3::new(c1.x - r, c1.y, 0.0),
            Point3::new(c2.x - r, c2.y, 0.0),
            Point3::new(c2.x + r, c2.y, 0.0),
            Point3::new(c1.x + r, c1.y, 0.0),
        ]
    };

    out.push(MotionCommand::rapid_xy(quad[0].x, quad[0].y));
    out.push(MotionCommand::rapid_z(FEED_HEIGHT));
    out.push(MotionCommand::linear_z(0.0, plunge));

    // Each loop is two straights and two cap semicircles, advancing half a
    // pitch; every leg therefore advances an eighth.
    let mut z = 0.0;
    let mut pos = quad[0];
    let mut emit_loop = |out: &mut ToolpathPlan, z_start: f64, z_target: Option<f64>, rate: f64| -> f64 {
        let legs: [(usize, bool); 4] = [(1, false), (2, true), (3, false), (0, true)];
        let mut zz = z_start;
        for (leg, (idx, is_cap)) in legs.iter().enumerate() {
            if let Some(target) = z_target {
                let step = (target - z_start) / 4.0;
                zz = z_start + step * (leg as f64 + 1.0);
            }
            let to = quad[*idx];
            let mut cmd = if *is_cap {
                let cap = if *idx == 0 || *idx == 3 { c1 } else { c2 };
                MotionCommand::arc(false, to.x, to.y, cap.x - pos.x, cap.y - pos.y, rate)
            } else {
                MotionCommand::linear_xy(to.x, to.y, rate)
            };
            cmd.z = Some(zz);
            out.push(cmd);
            pos = to;
        }
        zz
    };

    while z > final_depth + 1e-9 {
        let target = (z - pitch / 2.0).max(final_depth);
        z = emit_loop(out, z, Some(target), plunge);
    }
    // Full slot at final depth to finish.
    emit_loop(out, final_depth, None, feed);
}

/// Centerline zig-zag slot macro: alternate feed passes between the two slot
/// endpoints, stepping down each pass.
fn zigzag_slot_plan(ctx: &ToolpathContext, plan: &ToolpathPlan, start_pos: &Point3) -> ToolpathPlan {
    let mut out = ToolpathPlan::new(plan.operation_id.clone());
    out.metadata = plan.metadata.clone();
    let travel_z = ctx.machine.travel_z;
    let final_depth = plan.metadata.cut_depth;
    let feed = plan.metadata.feed_rate;
    let plunge = plan.metadata.plunge_rate;
    let step = if plan.metadata.depth_per_pass > 0.0 {
        plan.metadata.depth_per_pass
    } else {
        final_depth.abs()
    };

    let start = plan.metadata.entry_point;
    let end = plan.metadata.exit_point;

    if start_pos.z < travel_z {
        out.push(MotionCommand::rapid_z(travel_z));
    }
    out.push(MotionCommand::rapid_xy(start.x, start.y));
    out.push(MotionCommand::rapid_z(FEED_HEIGHT));

    let mut z = 0.0;
    let mut toward_end = true;
    while z > final_depth + 1e-9 {
        z = (z - step).max(final_depth);
        out.push(MotionCommand::plunge(z, plunge));
        let target = if toward_end { end } else { start };
        out.push(MotionCommand::linear_xy(target.x, target.y, feed));
        toward_end = !toward_end;
    }
    out.push(MotionCommand::retract(travel_z));
    out
}
