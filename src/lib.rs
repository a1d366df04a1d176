//! tracemill - 2D geometry and CAM engine for PCB fabrication
//!
//! Turns imported PCB artwork (filled regions, traced strokes, drill holes,
//! cutout outlines) into machine-ready toolpath plans: offsetting with arc
//! preservation, analytic-curve reconstruction after boolean fusion,
//! translation into pure cutting commands, tab placement, and machine
//! sequencing with entries, peck cycles, and retracts.
//!
//! The pipeline is single-threaded and cooperative: one job owns one
//! [`EngineContext`]; hosts may suspend between phases but each phase runs
//! synchronously. The curve registry is the only shared mutable state and is
//! append-only within a job.

pub mod context;
pub mod curve;
pub mod error;
pub mod fusion;
pub mod geometry;
pub mod machine;
pub mod offset;
pub mod plan;
pub mod primitive;
pub mod reconstruct;
pub mod tabs;
pub mod translate;

use serde::{Deserialize, Serialize};

use crate::context::ToolpathContext;
use crate::curve::CurveRegistry;
use crate::error::{SkipWarning, TranslateError};
use crate::plan::{Point3, ToolpathPlan};
use crate::primitive::{Primitive, PrimitiveId};
use crate::reconstruct::ReconstructStats;

/// Numeric tuning for the geometry passes. All distances in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Below this, geometry is degenerate.
    pub precision: f64,
    /// Miter joints longer than `miter_limit * |distance|` bevel instead.
    pub miter_limit: f64,
    /// Integer grid scale for the clipping collaborator.
    pub clip_scale: f64,
    /// Maximum chord length per tessellated arc segment.
    pub arc_tolerance: f64,
    pub min_circle_segments: u32,
    pub min_arc_segments: u32,
    pub min_round_joint_segments: u32,
    /// Squared tolerance for Douglas-Peucker simplification of internal
    /// offsets.
    pub simplify_tolerance: f64,
    /// Assumed full-circle tessellation when a tagged vertex does not record
    /// its total segment count.
    pub full_circle_estimate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            precision: 1e-3,
            miter_limit: 2.0,
            clip_scale: 1e4,
            arc_tolerance: 0.1,
            min_circle_segments: 16,
            min_arc_segments: 8,
            min_round_joint_segments: 4,
            simplify_tolerance: 1e-4,
            full_circle_estimate: 48,
        }
    }
}

/// Job-scoped engine state: configuration, the curve registry, and the
/// primitive id allocator. Cleared between independent jobs, never shared
/// across them.
#[derive(Debug)]
pub struct EngineContext {
    pub config: EngineConfig,
    pub curves: CurveRegistry,
    next_primitive_id: u64,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            curves: CurveRegistry::new(),
            // High range so engine-synthesized primitives never collide with
            // parser-assigned ids.
            next_primitive_id: 1 << 32,
        }
    }

    pub fn alloc_id(&mut self) -> PrimitiveId {
        let id = PrimitiveId(self.next_primitive_id);
        self.next_primitive_id += 1;
        id
    }

    /// Drop all job state. Only valid between independent jobs.
    pub fn reset(&mut self) {
        self.curves.clear();
        self.next_primitive_id = 1 << 32;
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// One machining operation: a compile context plus its source primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub context: ToolpathContext,
    pub primitives: Vec<Primitive>,
}

/// Result of a full job: sequenced plans across every operation, non-fatal
/// skip warnings, and reconstruction statistics.
#[derive(Debug)]
pub struct JobOutput {
    pub plans: Vec<ToolpathPlan>,
    pub warnings: Vec<SkipWarning>,
    pub stats: ReconstructStats,
}

/// Run the full pipeline over an operation sequence: offset each operation's
/// primitives, reconstruct analytic curves, translate to cutting plans, and
/// sequence them into machine motion. Operations run in order and the tool
/// position carries across them.
pub fn run_job(ctx: &mut EngineContext, operations: &[Operation]) -> Result<JobOutput, TranslateError> {
    let mut all_plans = Vec::new();
    let mut warnings = Vec::new();
    let mut stats = ReconstructStats::default();
    let mut pos: Option<Point3> = None;

    for op in operations {
        // Offset phase. An operation without offset distances cuts on the
        // source geometry itself (drills, pre-offset imports).
        let mut offset_prims: Vec<Primitive> = Vec::new();
        if op.context.computed.offset_distances.is_empty() {
            offset_prims.extend(op.primitives.iter().cloned());
        } else {
            for &distance in &op.context.computed.offset_distances {
                for prim in &op.primitives {
                    match offset::offset_primitive(ctx, prim, distance) {
                        Ok(prims) => offset_prims.extend(prims),
                        Err(err) => {
                            log::warn!("offset skipped {:?}: {}", prim.id, err);
                            warnings.push(SkipWarning {
                                primitive_id: prim.id.0,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }

        // Fusion phase: isolation and clearing passes union overlapping
        // offsets into single outlines before cutting. The clipper strips
        // vertex tags; coincident vertices get them back for the
        // reconstructor.
        let fusable = matches!(
            op.context.operation_type,
            context::OperationType::Isolation | context::OperationType::Clear
        ) && offset_prims.len() > 1
            && offset_prims.iter().all(|p| !p.props.is_centerline_path);
        if fusable {
            offset_prims = fusion::union_all(ctx, &offset_prims);
        }

        // Reconstruction phase: re-materialize circles and arc metadata.
        let (reconstructed, op_stats) = reconstruct::reconstruct_arcs(ctx, &offset_prims);
        stats.registered += op_stats.registered;
        stats.reconstructed += op_stats.reconstructed;
        stats.partial_arcs += op_stats.partial_arcs;
        stats.full_circles += op_stats.full_circles;
        stats.wrapped_groups += op_stats.wrapped_groups;
        stats.failed += op_stats.failed;

        // Translate and sequence.
        let translated = translate::translate_operation(&op.context, &reconstructed)?;
        warnings.extend(translated.warnings);
        let executed = machine::process_plans(&op.context, &translated.plans, pos);
        if !executed.is_empty() {
            let start = pos.unwrap_or(Point3::new(0.0, 0.0, op.context.machine.safe_z));
            pos = Some(machine::final_position(&executed, start));
        }
        all_plans.extend(executed);
    }

    Ok(JobOutput { plans: all_plans, warnings, stats })
}
