//! Motion commands and toolpath plans
//!
//! A [`ToolpathPlan`] is the unit handed from the translator to the machine
//! processor: pure cutting commands plus enough metadata to sequence them
//! without re-reading the primitive. Commands use absolute coordinates; a
//! `None` coordinate means "hold the current value". Arc centers are always
//! `(i, j)` offsets from the motion's start point, never the R form.

use serde::{Deserialize, Serialize};

use crate::context::{CannedCycle, CutDirection, EntryType, OperationType};
use crate::geometry::BoundingBox;
use crate::primitive::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionKind {
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
    Plunge,
    Retract,
    Dwell,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionCommand {
    pub kind: MotionKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub feed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub i: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub j: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dwell: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_tab: bool,
}

impl MotionCommand {
    fn blank(kind: MotionKind) -> Self {
        Self {
            kind,
            x: None,
            y: None,
            z: None,
            feed: None,
            i: None,
            j: None,
            dwell: None,
            is_tab: false,
        }
    }

    pub fn rapid_xy(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::blank(MotionKind::Rapid) }
    }

    pub fn rapid_z(z: f64) -> Self {
        Self { z: Some(z), ..Self::blank(MotionKind::Rapid) }
    }

    pub fn linear_xy(x: f64, y: f64, feed: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            feed: Some(feed),
            ..Self::blank(MotionKind::Linear)
        }
    }

    pub fn linear_xyz(x: f64, y: f64, z: f64, feed: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            feed: Some(feed),
            ..Self::blank(MotionKind::Linear)
        }
    }

    pub fn linear_z(z: f64, feed: f64) -> Self {
        Self { z: Some(z), feed: Some(feed), ..Self::blank(MotionKind::Linear) }
    }

    pub fn arc(clockwise: bool, x: f64, y: f64, i: f64, j: f64, feed: f64) -> Self {
        let kind = if clockwise { MotionKind::ArcCw } else { MotionKind::ArcCcw };
        Self {
            x: Some(x),
            y: Some(y),
            i: Some(i),
            j: Some(j),
            feed: Some(feed),
            ..Self::blank(kind)
        }
    }

    pub fn plunge(z: f64, feed: f64) -> Self {
        Self { z: Some(z), feed: Some(feed), ..Self::blank(MotionKind::Plunge) }
    }

    pub fn retract(z: f64) -> Self {
        Self { z: Some(z), ..Self::blank(MotionKind::Retract) }
    }

    pub fn dwell(seconds: f64) -> Self {
        Self { dwell: Some(seconds), ..Self::blank(MotionKind::Dwell) }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn tab(mut self) -> Self {
        self.is_tab = true;
        self
    }

    /// A command that removes material, as opposed to positioning.
    pub fn is_cutting(&self) -> bool {
        matches!(self.kind, MotionKind::Linear | MotionKind::ArcCw | MotionKind::ArcCcw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Retract, rapid over, re-enter.
    Rapid,
    /// Stay at depth and feed to the next plan (set by the upstream
    /// optimizer).
    Staydown,
    /// Same XY as the previous pass, just plunge deeper.
    Multidepth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOptimization {
    pub link_type: LinkType,
    pub optimized_entry_point: Point3,
    pub entry_command_index: usize,
}

impl Default for PlanOptimization {
    fn default() -> Self {
        Self {
            link_type: LinkType::Rapid,
            optimized_entry_point: Point3::default(),
            entry_command_index: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Straight,
    Curved,
}

/// A tab range along a contour's perimeter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPosition {
    /// Perimeter distance where the tab starts.
    pub start: f64,
    /// Perimeter distance where the tab ends.
    pub end: f64,
    /// Tab midpoint in the plane.
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub section_type: SectionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeckCycle {
    pub canned_cycle: CannedCycle,
    pub peck_depth: f64,
    pub dwell_time: f64,
    pub retract_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObroundData {
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub is_horizontal: bool,
    pub slot_radius: f64,
    pub start_cap_center: Point,
    pub end_cap_center: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub id: String,
    pub diameter: f64,
}

/// Everything the machine processor needs to interpret a plan without
/// re-reading the primitive it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanMetadata {
    pub tool: ToolInfo,
    pub tool_diameter: f64,
    /// Target depth of this plan's pass, negative.
    pub cut_depth: f64,
    pub feed_rate: f64,
    pub plunge_rate: f64,
    pub depth_per_pass: f64,
    pub step_over: f64,
    pub entry_type: EntryType,
    pub direction: CutDirection,
    pub operation_type: OperationType,
    pub primitive_type: String,
    pub group_key: String,
    pub entry_point: Point3,
    pub exit_point: Point3,
    pub is_closed_loop: bool,
    pub is_simple_circle: bool,
    pub has_arcs: bool,
    pub has_tabs: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tab_positions: Vec<TabPosition>,
    /// Tab ridge height above the final cut depth.
    pub tab_height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    pub optimization: PlanOptimization,
    pub is_peck_mark: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peck_cycle: Option<PeckCycle>,
    pub is_drill_milling: bool,
    pub is_centerline_path: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obround_data: Option<ObroundData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            tool: ToolInfo { id: String::new(), diameter: 0.0 },
            tool_diameter: 0.0,
            cut_depth: 0.0,
            feed_rate: 0.0,
            plunge_rate: 0.0,
            depth_per_pass: 0.0,
            step_over: 0.0,
            entry_type: EntryType::Plunge,
            direction: CutDirection::Climb,
            operation_type: OperationType::Isolation,
            primitive_type: String::new(),
            group_key: String::new(),
            entry_point: Point3::default(),
            exit_point: Point3::default(),
            is_closed_loop: false,
            is_simple_circle: false,
            has_arcs: false,
            has_tabs: false,
            tab_positions: Vec::new(),
            tab_height: 0.0,
            bounding_box: None,
            optimization: PlanOptimization::default(),
            is_peck_mark: false,
            peck_cycle: None,
            is_drill_milling: false,
            is_centerline_path: false,
            obround_data: None,
            center: None,
            radius: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolpathPlan {
    pub operation_id: String,
    pub commands: Vec<MotionCommand>,
    pub metadata: PlanMetadata,
}

impl ToolpathPlan {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            commands: Vec::new(),
            metadata: PlanMetadata::default(),
        }
    }

    pub fn push(&mut self, command: MotionCommand) {
        self.commands.push(command);
    }

    /// Bounding box over every command that carries XY coordinates.
    pub fn compute_bounding_box(&self) -> Option<BoundingBox> {
        let mut bb = BoundingBox::empty();
        for cmd in &self.commands {
            if let (Some(x), Some(y)) = (cmd.x, cmd.y) {
                bb.expand(x, y);
            }
        }
        if bb.is_empty() {
            None
        } else {
            Some(bb)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_coordinates_mean_hold() {
        let cmd = MotionCommand::rapid_z(5.0);
        assert!(cmd.x.is_none() && cmd.y.is_none());
        assert_eq!(cmd.z, Some(5.0));
    }

    #[test]
    fn test_arc_kind_from_flag() {
        assert_eq!(MotionCommand::arc(true, 1.0, 0.0, -1.0, 0.0, 100.0).kind, MotionKind::ArcCw);
        assert_eq!(MotionCommand::arc(false, 1.0, 0.0, -1.0, 0.0, 100.0).kind, MotionKind::ArcCcw);
    }

    #[test]
    fn test_bounding_box_ignores_z_only_moves() {
        let mut plan = ToolpathPlan::new("op");
        plan.push(MotionCommand::rapid_z(5.0));
        plan.push(MotionCommand::linear_xy(1.0, 2.0, 100.0));
        plan.push(MotionCommand::linear_xy(-3.0, 4.0, 100.0));
        let bb = plan.compute_bounding_box().unwrap();
        assert_eq!((bb.min_x, bb.max_x), (-3.0, 1.0));
        assert_eq!((bb.min_y, bb.max_y), (2.0, 4.0));
    }

    #[test]
    fn test_wire_format_skips_nulls() {
        let cmd = MotionCommand::rapid_z(5.0);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("\"x\""));
        assert!(!json.contains("isTab"));
        assert!(json.contains("\"kind\":\"rapid\""));
    }
}
