//! Per-operation compile context
//!
//! Everything the translator and machine processor need to turn offset
//! primitives into motion: tool, cutting parameters, strategy, machine
//! heights, precomputed depth levels, and tuning constants. The context is
//! read-only during a job; a bad context fails the whole operation up front.

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Isolation,
    Clear,
    Cutout,
    Drill,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Isolation => "isolation",
            OperationType::Clear => "clear",
            OperationType::Cutout => "cutout",
            OperationType::Drill => "drill",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutDirection {
    Climb,
    Conventional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Plunge,
    Ramp,
    Helix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CannedCycle {
    None,
    G81,
    G82,
    G83,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub diameter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuttingParams {
    pub feed_rate: f64,
    pub plunge_rate: f64,
    pub spindle_speed: f64,
    #[serde(default)]
    pub spindle_dwell: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CutoutStrategy {
    pub tabs: u32,
    pub tab_width: f64,
    pub tab_height: f64,
}

impl Default for CutoutStrategy {
    fn default() -> Self {
        Self { tabs: 0, tab_width: 2.0, tab_height: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrillStrategy {
    pub canned_cycle: CannedCycle,
    pub peck_depth: f64,
    pub dwell_time: f64,
    pub retract_height: f64,
    pub entry_type: EntryType,
}

impl Default for DrillStrategy {
    fn default() -> Self {
        Self {
            canned_cycle: CannedCycle::G83,
            peck_depth: 0.0,
            dwell_time: 0.0,
            retract_height: 0.5,
            entry_type: EntryType::Plunge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Strategy {
    pub direction: CutDirection,
    pub entry_type: EntryType,
    /// Depth removed per pass, as a positive magnitude. Zero means a single
    /// full-depth pass.
    pub depth_per_pass: f64,
    /// Fraction of the tool diameter between clearing passes.
    pub step_over: f64,
    pub cutout: CutoutStrategy,
    pub drill: DrillStrategy,
    /// Ramp entry angle in radians.
    pub entry_ramp_angle: f64,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            direction: CutDirection::Climb,
            entry_type: EntryType::Plunge,
            depth_per_pass: 0.0,
            step_over: 0.4,
            cutout: CutoutStrategy::default(),
            drill: DrillStrategy::default(),
            entry_ramp_angle: 3.0_f64.to_radians(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineParams {
    /// Free rapid plane, above everything on the table.
    pub safe_z: f64,
    /// Inter-feature transfer plane.
    pub travel_z: f64,
    pub rapid_feed_rate: f64,
    pub plunge_rate: f64,
}

impl Default for MachineParams {
    fn default() -> Self {
        Self {
            safe_z: 5.0,
            travel_z: 2.0,
            rapid_feed_rate: 1000.0,
            plunge_rate: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Computed {
    /// Cutting depths, shallow to deep, all negative.
    pub depth_levels: Vec<f64>,
    /// Offset distances for this operation, in application order.
    pub offset_distances: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabConfig {
    /// Corner keep-out as a multiple of the tool diameter.
    pub corner_margin_factor: f64,
    /// Minimum usable section length as a multiple of the tab width.
    pub min_tab_length_factor: f64,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self { corner_margin_factor: 1.5, min_tab_length_factor: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelixConfig {
    /// Helix radius as a fraction of the tool diameter.
    pub radius_factor: f64,
    /// Z advance per revolution, mm.
    pub pitch: f64,
    pub segments_per_revolution: u32,
}

impl Default for HelixConfig {
    fn default() -> Self {
        Self { radius_factor: 0.4, pitch: 0.5, segments_per_revolution: 16 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrillingEntryConfig {
    /// Below this hole diameter a helical entry degrades to a plunge.
    pub min_helix_diameter: f64,
}

impl Default for DrillingEntryConfig {
    fn default() -> Self {
        Self { min_helix_diameter: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryConfig {
    pub helix: HelixConfig,
    pub drilling: DrillingEntryConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolpathConfig {
    pub tabs: TabConfig,
    pub entry: EntryConfig,
}

/// The per-operation bundle handed to the translator and machine processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolpathContext {
    pub operation_id: String,
    pub operation_type: OperationType,
    pub tool: Tool,
    pub cutting: CuttingParams,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub machine: MachineParams,
    #[serde(default)]
    pub computed: Computed,
    #[serde(default)]
    pub config: ToolpathConfig,
}

impl ToolpathContext {
    pub fn validate(&self) -> Result<(), ContextError> {
        if !(self.cutting.feed_rate > 0.0) {
            return Err(ContextError::InvalidFeedRate(self.cutting.feed_rate));
        }
        if !(self.cutting.plunge_rate > 0.0) {
            return Err(ContextError::InvalidPlungeRate(self.cutting.plunge_rate));
        }
        if !(self.tool.diameter > 0.0) {
            return Err(ContextError::InvalidToolDiameter(self.tool.diameter));
        }
        if self.machine.safe_z < 0.0 {
            return Err(ContextError::NegativeSafeZ(self.machine.safe_z));
        }
        if self.machine.travel_z < 0.0 {
            return Err(ContextError::NegativeTravelZ(self.machine.travel_z));
        }
        if self.computed.depth_levels.is_empty() {
            return Err(ContextError::EmptyDepthLevels);
        }
        if let Some(&d) = self.computed.depth_levels.iter().find(|d| **d >= 0.0) {
            return Err(ContextError::InvalidCutDepth(d));
        }
        Ok(())
    }

    /// Final cutting depth of the operation (the deepest level).
    pub fn final_depth(&self) -> f64 {
        self.computed.depth_levels.last().copied().unwrap_or(0.0)
    }
}

/// Expand a total cut depth (negative) into per-pass depth levels, shallow to
/// deep, clamping the last pass to the exact target.
pub fn compute_depth_levels(cut_depth: f64, depth_per_pass: f64) -> Vec<f64> {
    let step = depth_per_pass.abs();
    if cut_depth >= 0.0 {
        return Vec::new();
    }
    if step <= 0.0 || step >= cut_depth.abs() {
        return vec![cut_depth];
    }
    let mut levels = Vec::new();
    let mut z = 0.0;
    while z > cut_depth + 1e-9 {
        z = (z - step).max(cut_depth);
        levels.push(z);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_context() -> ToolpathContext {
        ToolpathContext {
            operation_id: "op-1".into(),
            operation_type: OperationType::Isolation,
            tool: Tool { id: "T1".into(), diameter: 1.0 },
            cutting: CuttingParams {
                feed_rate: 300.0,
                plunge_rate: 100.0,
                spindle_speed: 12000.0,
                spindle_dwell: 0.0,
            },
            strategy: Strategy::default(),
            machine: MachineParams::default(),
            computed: Computed { depth_levels: vec![-0.1], offset_distances: vec![0.5] },
            config: ToolpathConfig::default(),
        }
    }

    #[test]
    fn test_valid_context_passes() {
        assert!(base_context().validate().is_ok());
    }

    #[test]
    fn test_missing_feed_rate_fails() {
        let mut ctx = base_context();
        ctx.cutting.feed_rate = 0.0;
        assert!(matches!(ctx.validate(), Err(ContextError::InvalidFeedRate(_))));
    }

    #[test]
    fn test_zero_tool_diameter_fails() {
        let mut ctx = base_context();
        ctx.tool.diameter = 0.0;
        assert!(matches!(ctx.validate(), Err(ContextError::InvalidToolDiameter(_))));
    }

    #[test]
    fn test_negative_safe_z_fails() {
        let mut ctx = base_context();
        ctx.machine.safe_z = -1.0;
        assert!(matches!(ctx.validate(), Err(ContextError::NegativeSafeZ(_))));
    }

    #[test]
    fn test_depth_levels_multi_pass() {
        let levels = compute_depth_levels(-1.8, 0.4);
        assert_eq!(levels.len(), 5);
        for (level, expect) in levels.iter().zip([-0.4, -0.8, -1.2, -1.6, -1.8]) {
            assert!((level - expect).abs() < 1e-9, "level {} != {}", level, expect);
        }
        // Shallow to deep, last pass exactly on target.
        assert!(levels.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*levels.last().unwrap(), -1.8);
    }

    #[test]
    fn test_depth_levels_single_pass() {
        assert_eq!(compute_depth_levels(-1.0, 0.0), vec![-1.0]);
        assert_eq!(compute_depth_levels(-1.0, 2.0), vec![-1.0]);
    }

    #[test]
    fn test_depth_levels_exact_multiple_has_no_spurious_pass() {
        let levels = compute_depth_levels(-1.2, 0.4);
        assert_eq!(levels.len(), 3);
        assert!((levels[2] + 1.2).abs() < 1e-12);
    }
}
