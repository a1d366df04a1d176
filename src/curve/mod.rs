//! Curve registry - process-scoped store of analytic curve records
//!
//! Every tessellated vertex that samples an analytic curve (a circle, an arc
//! cap, an offset joint) carries the id of the curve it came from, so
//! curvature information survives polygonal boolean operations. Ids are
//! monotonic and never reused within a job; the registry is cleared only
//! between independent jobs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::primitive::{Point, PrimitiveId};

/// Opaque handle to a registered analytic curve. Id 0 is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurveId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Arc,
    Circle,
}

/// Where a curve record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveSource {
    /// Carried in from the parsed artwork.
    Import,
    /// Registered while tessellating an analytic primitive into a path.
    Tessellation,
    /// Round joint synthesized at a convex corner during offsetting.
    OffsetJoint,
    /// Arc segment re-registered at its offset radius by the hybrid offsetter.
    HybridOffset,
    /// Semi-circular cap on a stroked centerline or slot end.
    StrokeCap,
    /// Whole-primitive offset (circle grown or shrunk by a distance).
    Offset,
}

/// A registered analytic curve. Angles are radians, Y-up; `clockwise` is the
/// geometric rotation sense (negative angular direction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveRecord {
    pub kind: CurveKind,
    pub center: Point,
    pub radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_angle: Option<f64>,
    pub clockwise: bool,
    pub source: CurveSource,
    pub is_offset_derived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_curve_id: Option<CurveId>,
}

impl CurveRecord {
    /// Full circle, not derived from an offset.
    pub fn circle(center: Point, radius: f64, source: CurveSource) -> Self {
        Self {
            kind: CurveKind::Circle,
            center,
            radius,
            start_angle: None,
            end_angle: None,
            clockwise: false,
            source,
            is_offset_derived: false,
            offset_distance: None,
            source_curve_id: None,
        }
    }

    /// Partial arc, not derived from an offset.
    pub fn arc(
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        clockwise: bool,
        source: CurveSource,
    ) -> Self {
        Self {
            kind: CurveKind::Arc,
            center,
            radius,
            start_angle: Some(start_angle),
            end_angle: Some(end_angle),
            clockwise,
            source,
            is_offset_derived: false,
            offset_distance: None,
            source_curve_id: None,
        }
    }

    pub fn offset_derived(mut self, distance: f64, source_curve: Option<CurveId>) -> Self {
        self.is_offset_derived = true;
        self.offset_distance = Some(distance);
        self.source_curve_id = source_curve;
        self
    }
}

/// Append-only store of curve records, addressed by [`CurveId`].
///
/// The registry exclusively owns records; primitives and points hold opaque
/// ids only. All writes are monotonic appends.
#[derive(Debug, Default)]
pub struct CurveRegistry {
    records: Vec<CurveRecord>,
    by_primitive: HashMap<PrimitiveId, Vec<CurveId>>,
}

impl CurveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its fresh id.
    pub fn register(&mut self, record: CurveRecord) -> CurveId {
        self.records.push(record);
        CurveId(self.records.len() as u64)
    }

    pub fn get(&self, id: CurveId) -> Option<&CurveRecord> {
        if id.0 == 0 {
            return None;
        }
        self.records.get((id.0 - 1) as usize)
    }

    /// Associate a curve with the primitive that contains it.
    pub fn attach(&mut self, primitive: PrimitiveId, curve: CurveId) {
        self.by_primitive.entry(primitive).or_default().push(curve);
    }

    pub fn curves_for_primitive(&self, primitive: PrimitiveId) -> &[CurveId] {
        self.by_primitive
            .get(&primitive)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all state. Only valid between independent jobs.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_primitive.clear();
    }
}
