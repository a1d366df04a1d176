//! Tab planner
//!
//! Chooses where to leave hold-down tabs on a closed cutout contour and
//! splits the contour walk into motion commands tagged as tab or cut. Tabs
//! prefer long straight sections away from corners; leftover tabs fall back
//! to equidistant placement. Ranges that cross the ring seam are wrapped
//! into two ranges.

use crate::context::TabConfig;
use crate::plan::{MotionCommand, SectionType, TabPosition};
use crate::primitive::{ArcSegment, Contour, Point};
use std::collections::HashMap;

/// Line-to-line turns sharper than this are corners for tab placement.
const CORNER_TURN_DEG: f64 = 30.0;

/// One leg of a closed contour walk: a straight edge or an analytic arc.
#[derive(Debug, Clone)]
enum WalkSeg {
    Line {
        from: Point,
        to: Point,
        len: f64,
    },
    Arc {
        from: Point,
        center: Point,
        radius: f64,
        start_angle: f64,
        sweep: f64,
        clockwise: bool,
        len: f64,
    },
}

impl WalkSeg {
    fn len(&self) -> f64 {
        match self {
            WalkSeg::Line { len, .. } | WalkSeg::Arc { len, .. } => *len,
        }
    }

    fn start(&self) -> Point {
        match self {
            WalkSeg::Line { from, .. } | WalkSeg::Arc { from, .. } => *from,
        }
    }

    /// Point at a distance along this segment.
    fn at(&self, dist: f64) -> Point {
        match self {
            WalkSeg::Line { from, to, len } => {
                let t = if *len > 0.0 { (dist / len).clamp(0.0, 1.0) } else { 0.0 };
                Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
            }
            WalkSeg::Arc { center, radius, start_angle, sweep, len, .. } => {
                let t = if *len > 0.0 { (dist / len).clamp(0.0, 1.0) } else { 0.0 };
                let angle = start_angle + sweep * t;
                Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
            }
        }
    }

    /// Outgoing direction at the start, for corner classification.
    fn heading(&self) -> (f64, f64) {
        match self {
            WalkSeg::Line { from, to, len } => {
                if *len > 0.0 {
                    ((to.x - from.x) / len, (to.y - from.y) / len)
                } else {
                    (1.0, 0.0)
                }
            }
            WalkSeg::Arc { start_angle, sweep, .. } => {
                let tangent = start_angle + std::f64::consts::FRAC_PI_2 * sweep.signum();
                (tangent.cos(), tangent.sin())
            }
        }
    }

    /// Incoming direction at the end.
    fn heading_out(&self) -> (f64, f64) {
        match self {
            WalkSeg::Line { .. } => self.heading(),
            WalkSeg::Arc { start_angle, sweep, .. } => {
                let end = start_angle + sweep;
                let tangent = end + std::f64::consts::FRAC_PI_2 * sweep.signum();
                (tangent.cos(), tangent.sin())
            }
        }
    }
}

/// Expand a closed contour into walk segments, folding arc-tagged spans into
/// single arc legs.
fn contour_walk(contour: &Contour) -> Vec<WalkSeg> {
    let pts = &contour.points;
    let n = pts.len();
    let arcs_by_start: HashMap<usize, &ArcSegment> = contour
        .arc_segments
        .iter()
        .map(|a| (a.start_index, a))
        .collect();

    let mut segs = Vec::new();
    let mut i = 0usize;
    while i < n {
        if let Some(arc) = arcs_by_start.get(&i) {
            let len = (arc.sweep_angle * arc.radius).abs();
            if len > 0.0 {
                segs.push(WalkSeg::Arc {
                    from: pts[i],
                    center: arc.center,
                    radius: arc.radius,
                    start_angle: arc.start_angle,
                    sweep: arc.sweep_angle,
                    clockwise: arc.clockwise,
                    len,
                });
            }
            i = if arc.end_index <= i { n } else { arc.end_index };
        } else {
            let j = (i + 1) % n;
            let len = pts[i].dist(&pts[j]);
            if len > f64::EPSILON {
                segs.push(WalkSeg::Line { from: pts[i], to: pts[j], len });
            }
            i += 1;
        }
    }
    segs
}

/// Total perimeter: straight edge lengths plus arc lengths.
pub fn contour_perimeter(contour: &Contour) -> f64 {
    contour_walk(contour).iter().map(|s| s.len()).sum()
}

#[derive(Debug)]
struct Section {
    section_type: SectionType,
    /// Perimeter distance of the usable midpoint.
    mid: f64,
    usable_len: f64,
}

/// Analyze a closed contour into tab-suitable sections and place up to
/// `tab_count` tabs. Returns an empty list when the contour is too small or
/// nothing qualifies.
pub fn compute_tab_positions(
    contour: &Contour,
    tab_count: u32,
    tab_width: f64,
    tab_height: f64,
    tool_diameter: f64,
    cfg: &TabConfig,
) -> Vec<TabPosition> {
    if tab_count == 0 || tab_width <= 0.0 {
        return Vec::new();
    }
    let segs = contour_walk(contour);
    if segs.is_empty() {
        return Vec::new();
    }
    let total: f64 = segs.iter().map(|s| s.len()).sum();
    let corner_margin = (tool_diameter * cfg.corner_margin_factor).max(tab_width);
    let min_segment_length = tab_width * cfg.min_tab_length_factor;
    if total < 2.0 * corner_margin {
        return Vec::new();
    }

    // A corner is any transition involving an arc, or a line-to-line turn
    // sharper than the threshold.
    let m = segs.len();
    let corner_at: Vec<bool> = (0..m)
        .map(|i| {
            let prev = &segs[(i + m - 1) % m];
            let cur = &segs[i];
            match (prev, cur) {
                (WalkSeg::Line { .. }, WalkSeg::Line { .. }) => {
                    let (ax, ay) = prev.heading_out();
                    let (bx, by) = cur.heading();
                    let dot = (ax * bx + ay * by).clamp(-1.0, 1.0);
                    dot.acos().to_degrees() > CORNER_TURN_DEG
                }
                _ => true,
            }
        })
        .collect();

    let mut sections = Vec::new();
    let mut dist = 0.0;
    for (i, seg) in segs.iter().enumerate() {
        let start_corner = corner_at[i];
        let end_corner = corner_at[(i + 1) % m];
        match seg {
            WalkSeg::Line { len, .. } => {
                let lead = if start_corner { corner_margin } else { 0.0 };
                let tail = if end_corner { corner_margin } else { 0.0 };
                let usable = len - lead - tail;
                if usable >= min_segment_length {
                    sections.push(Section {
                        section_type: SectionType::Straight,
                        mid: dist + lead + usable / 2.0,
                        usable_len: usable,
                    });
                }
            }
            WalkSeg::Arc { radius, len, .. } => {
                let usable = len - 2.0 * corner_margin;
                if *radius > 2.0 * min_segment_length && usable >= min_segment_length {
                    sections.push(Section {
                        section_type: SectionType::Curved,
                        mid: dist + len / 2.0,
                        usable_len: usable,
                    });
                }
            }
        }
        dist += seg.len();
    }

    if sections.is_empty() {
        return Vec::new();
    }

    // Straight beats curved; longer beats shorter.
    sections.sort_by(|a, b| {
        let rank = |s: &Section| match s.section_type {
            SectionType::Straight => 0,
            SectionType::Curved => 1,
        };
        rank(a)
            .cmp(&rank(b))
            .then(b.usable_len.partial_cmp(&a.usable_len).unwrap_or(std::cmp::Ordering::Equal))
    });

    let half = tab_width / 2.0;
    let mut tabs: Vec<TabPosition> = Vec::new();
    let point_at = |d: f64| point_at_distance(&segs, d.rem_euclid(total));

    for section in sections.iter().take(tab_count as usize) {
        tabs.push(TabPosition {
            start: section.mid - half,
            end: section.mid + half,
            position: point_at(section.mid),
            width: tab_width,
            height: tab_height,
            section_type: section.section_type,
        });
    }

    // Remaining tabs are spread equidistantly, rejecting overlaps with
    // already-placed tabs.
    let remaining = tab_count as usize - tabs.len();
    if remaining > 0 {
        for k in 0..tab_count as usize {
            if tabs.len() >= tab_count as usize {
                break;
            }
            let mid = total * (k as f64 + 0.5) / tab_count as f64;
            let overlaps = tabs
                .iter()
                .any(|t| (t.start - half..t.end + half).contains(&mid));
            if !overlaps {
                tabs.push(TabPosition {
                    start: mid - half,
                    end: mid + half,
                    position: point_at(mid),
                    width: tab_width,
                    height: tab_height,
                    section_type: SectionType::Straight,
                });
            }
        }
    }

    tabs.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    tabs
}

fn point_at_distance(segs: &[WalkSeg], dist: f64) -> Point {
    let mut d = dist;
    for seg in segs {
        if d <= seg.len() {
            return seg.at(d);
        }
        d -= seg.len();
    }
    segs.last().map(|s| s.at(s.len())).unwrap_or(Point::new(0.0, 0.0))
}

/// Split a closed contour at the tab ranges, emitting one motion command per
/// sub-segment with `is_tab` set inside tab ranges. Arc sub-segments
/// interpolate angularly and keep their center through `(i, j)` offsets
/// relative to each sub-segment's start; the geometric rotation sense is
/// inverted when mapping onto the command variants.
pub fn split_contour_at_tabs(
    contour: &Contour,
    tabs: &[TabPosition],
    z: f64,
    feed: f64,
) -> Vec<MotionCommand> {
    let segs = contour_walk(contour);
    if segs.is_empty() {
        return Vec::new();
    }
    let total: f64 = segs.iter().map(|s| s.len()).sum();

    // Wrap seam-crossing ranges into two, and clamp everything to [0, L].
    let mut ranges: Vec<(f64, f64)> = Vec::new();
    for tab in tabs {
        let (start, end) = (tab.start, tab.end);
        if start < 0.0 {
            ranges.push((start + total, total));
            ranges.push((0.0, end));
        } else if end > total {
            ranges.push((start, total));
            ranges.push((0.0, end - total));
        } else {
            ranges.push((start, end));
        }
    }
    ranges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let inside = |d: f64| ranges.iter().any(|(s, e)| d > *s && d < *e);

    let mut commands = Vec::new();
    let mut base = 0.0;
    for seg in &segs {
        let seg_len = seg.len();
        let seg_end = base + seg_len;

        // Range boundaries falling strictly inside this segment.
        let mut cuts: Vec<f64> = ranges
            .iter()
            .flat_map(|(s, e)| [*s, *e])
            .filter(|d| *d > base + 1e-9 && *d < seg_end - 1e-9)
            .collect();
        cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        let mut local_start = 0.0;
        let sub_start = seg.start();
        let mut sub_from = sub_start;
        for boundary in cuts.iter().copied().chain([seg_end]) {
            let local_end = boundary - base;
            if local_end - local_start < 1e-9 {
                continue;
            }
            let mid = base + (local_start + local_end) / 2.0;
            let to = seg.at(local_end);
            let mut cmd = match seg {
                WalkSeg::Line { .. } => MotionCommand::linear_xy(to.x, to.y, feed),
                WalkSeg::Arc { center, clockwise, .. } => MotionCommand::arc(
                    !clockwise,
                    to.x,
                    to.y,
                    center.x - sub_from.x,
                    center.y - sub_from.y,
                    feed,
                ),
            };
            cmd.z = Some(z);
            if inside(mid) {
                cmd = cmd.tab();
            }
            commands.push(cmd);
            local_start = local_end;
            sub_from = to;
        }
        base = seg_end;
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::MotionKind;
    use std::f64::consts::PI;

    fn rect_contour(w: f64, h: f64) -> Contour {
        Contour::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ])
    }

    fn cfg() -> TabConfig {
        TabConfig::default()
    }

    #[test]
    fn test_perimeter_of_rectangle() {
        assert!((contour_perimeter(&rect_contour(50.0, 30.0)) - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_perimeter_includes_arc_length() {
        // Slot contour: two straights of 10 and two semicircle arcs of r=5.
        let mut c = Contour::from_points(vec![
            Point::new(5.0, 0.0),
            Point::new(15.0, 0.0),
            Point::new(15.0, 10.0),
            Point::new(5.0, 10.0),
        ]);
        c.arc_segments.push(ArcSegment {
            start_index: 1,
            end_index: 2,
            center: Point::new(15.0, 5.0),
            radius: 5.0,
            start_angle: -PI / 2.0,
            end_angle: PI / 2.0,
            sweep_angle: PI,
            clockwise: false,
            curve_id: None,
        });
        c.arc_segments.push(ArcSegment {
            start_index: 3,
            end_index: 0,
            center: Point::new(5.0, 5.0),
            radius: 5.0,
            start_angle: PI / 2.0,
            end_angle: 3.0 * PI / 2.0,
            sweep_angle: PI,
            clockwise: false,
            curve_id: None,
        });
        let expect = 20.0 + 2.0 * PI * 5.0;
        assert!((contour_perimeter(&c) - expect).abs() < 1e-9);
    }

    #[test]
    fn test_two_tabs_on_long_edges() {
        let contour = rect_contour(50.0, 30.0);
        let tabs = compute_tab_positions(&contour, 2, 1.0, 0.5, 2.0, &cfg());
        assert_eq!(tabs.len(), 2);
        // Both tabs sit at the midpoints of the two long edges.
        let mut mids: Vec<(f64, f64)> = tabs.iter().map(|t| (t.position.x, t.position.y)).collect();
        mids.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        assert!((mids[0].0 - 25.0).abs() < 1e-6 && mids[0].1.abs() < 1e-6);
        assert!((mids[1].0 - 25.0).abs() < 1e-6 && (mids[1].1 - 30.0).abs() < 1e-6);
        for t in &tabs {
            assert_eq!(t.section_type, SectionType::Straight);
            assert!((t.end - t.start - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tiny_contour_gets_no_tabs() {
        let contour = rect_contour(2.0, 2.0);
        let tabs = compute_tab_positions(&contour, 2, 1.0, 0.5, 2.0, &cfg());
        assert!(tabs.is_empty());
    }

    #[test]
    fn test_split_counts_and_tab_lengths() {
        let contour = rect_contour(50.0, 30.0);
        let tabs = compute_tab_positions(&contour, 2, 1.0, 0.5, 2.0, &cfg());
        let commands = split_contour_at_tabs(&contour, &tabs, -2.0, 300.0);
        // Each long edge splits into 3 commands; short edges stay whole.
        assert_eq!(commands.len(), 8);
        let tab_cmds: Vec<&MotionCommand> = commands.iter().filter(|c| c.is_tab).collect();
        assert_eq!(tab_cmds.len(), 2);
        for cmd in &commands {
            assert_eq!(cmd.z, Some(-2.0));
            assert_eq!(cmd.kind, MotionKind::Linear);
        }
    }

    #[test]
    fn test_split_lengths_sum_to_perimeter() {
        let contour = rect_contour(50.0, 30.0);
        let tabs = compute_tab_positions(&contour, 3, 2.0, 0.5, 2.0, &cfg());
        let commands = split_contour_at_tabs(&contour, &tabs, -1.0, 300.0);
        let mut pos = contour.points[0];
        let mut sum = 0.0;
        let mut tab_sum = 0.0;
        for cmd in &commands {
            let to = Point::new(cmd.x.unwrap(), cmd.y.unwrap());
            let len = pos.dist(&to);
            sum += len;
            if cmd.is_tab {
                tab_sum += len;
            }
            pos = to;
        }
        assert!((sum - 160.0).abs() < 1e-6, "walk length {} != perimeter", sum);
        // Tab-tagged length never exceeds the requested tab material.
        assert!(tab_sum <= 3.0 * 2.0 + 1e-6);
    }

    #[test]
    fn test_seam_crossing_tab_wraps() {
        let contour = rect_contour(50.0, 30.0);
        // One artificial tab straddling the seam at distance 0.
        let tabs = vec![TabPosition {
            start: -1.0,
            end: 1.0,
            position: Point::new(0.0, 0.0),
            width: 2.0,
            height: 0.5,
            section_type: SectionType::Straight,
        }];
        let commands = split_contour_at_tabs(&contour, &tabs, -1.0, 300.0);
        let tab_len: f64 = {
            let mut pos = contour.points[0];
            let mut acc = 0.0;
            for cmd in &commands {
                let to = Point::new(cmd.x.unwrap(), cmd.y.unwrap());
                if cmd.is_tab {
                    acc += pos.dist(&to);
                }
                pos = to;
            }
            acc
        };
        // Both halves of the wrapped tab are tagged.
        assert!((tab_len - 2.0).abs() < 1e-6, "wrapped tab length {}", tab_len);
    }

    #[test]
    fn test_arc_split_preserves_center_offsets() {
        // Circle as a single wrapped arc segment.
        let mut c = Contour::from_points(vec![
            Point::new(10.0, 0.0),
            Point::new(-10.0, 0.0),
        ]);
        c.arc_segments.push(ArcSegment {
            start_index: 0,
            end_index: 1,
            center: Point::new(0.0, 0.0),
            radius: 10.0,
            start_angle: 0.0,
            end_angle: PI,
            sweep_angle: PI,
            clockwise: false,
            curve_id: None,
        });
        c.arc_segments.push(ArcSegment {
            start_index: 1,
            end_index: 0,
            center: Point::new(0.0, 0.0),
            radius: 10.0,
            start_angle: PI,
            end_angle: 0.0,
            sweep_angle: PI,
            clockwise: false,
            curve_id: None,
        });
        let tabs = vec![TabPosition {
            start: 5.0,
            end: 7.0,
            position: Point::new(0.0, 0.0),
            width: 2.0,
            height: 0.5,
            section_type: SectionType::Curved,
        }];
        let commands = split_contour_at_tabs(&c, &tabs, -1.0, 200.0);
        assert!(commands.len() >= 4);
        // Geometric CCW arcs emit the CW command variant.
        assert!(commands.iter().all(|cmd| cmd.kind == MotionKind::ArcCw));
        // Each command's (i, j) points from its start to the shared center.
        let mut pos = c.points[0];
        for cmd in &commands {
            let (i, j) = (cmd.i.unwrap(), cmd.j.unwrap());
            assert!((pos.x + i).abs() < 1e-9 && (pos.y + j).abs() < 1e-9,
                "center offset ({}, {}) from ({}, {})", i, j, pos.x, pos.y);
            pos = Point::new(cmd.x.unwrap(), cmd.y.unwrap());
        }
        // Sub-segment endpoints stay on the circle.
        for cmd in &commands {
            let r = (cmd.x.unwrap().powi(2) + cmd.y.unwrap().powi(2)).sqrt();
            assert!((r - 10.0).abs() < 1e-9);
        }
    }
}
