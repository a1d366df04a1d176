//! Primitive model - immutable descriptions of the imported artwork
//!
//! A primitive couples an analytic shape (circle, arc, rectangle, obround,
//! bezier, path) with semantic properties (cutout, stroke, fill, polarity)
//! and the ids of the analytic curves it contains. Primitives are immutable
//! after construction; offsetting and reconstruction always produce fresh
//! ones.

use serde::{Deserialize, Serialize};

use crate::curve::CurveId;
use crate::geometry::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimitiveId(pub u64);

/// A 2D vertex, optionally tagged with the analytic curve it samples.
///
/// `segment_index` / `total_segments` encode the vertex position along the
/// tessellated curve; `t` is the normalized parameter in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub curve_id: Option<CurveId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub segment_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_segments: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            curve_id: None,
            segment_index: None,
            total_segments: None,
            t: None,
        }
    }

    pub fn tagged(x: f64, y: f64, curve: CurveId, index: u32, total: u32) -> Self {
        Self {
            x,
            y,
            curve_id: Some(curve),
            segment_index: Some(index),
            total_segments: Some(total),
            t: if total > 0 {
                Some(index as f64 / total as f64)
            } else {
                None
            },
        }
    }

    /// Copy of this point with all curve tags removed.
    pub fn untagged(&self) -> Self {
        Self::new(self.x, self.y)
    }

    pub fn sq_dist(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn dist(&self, other: &Point) -> f64 {
        self.sq_dist(other).sqrt()
    }
}

/// Contour-local annotation that two (or more) consecutive points sample an
/// analytic arc. `start_index` / `end_index` index into the owning contour's
/// points array; the points at those indices coincide with the arc's
/// endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcSegment {
    pub start_index: usize,
    pub end_index: usize,
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub sweep_angle: f64,
    pub clockwise: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub curve_id: Option<CurveId>,
}

impl ArcSegment {
    /// Arc length along the annotated segment.
    pub fn length(&self) -> f64 {
        (self.sweep_angle * self.radius).abs()
    }
}

/// One ring of a path. Points are stored without a duplicated closing vertex;
/// closure is a property of the owning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contour {
    pub points: Vec<Point>,
    pub is_hole: bool,
    pub nesting_level: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<PrimitiveId>,
    #[serde(default)]
    pub arc_segments: Vec<ArcSegment>,
    #[serde(default)]
    pub curve_ids: Vec<CurveId>,
}

impl Contour {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            is_hole: false,
            nesting_level: 0,
            parent_id: None,
            arc_segments: Vec::new(),
            curve_ids: Vec::new(),
        }
    }

    pub fn hole(mut self) -> Self {
        self.is_hole = true;
        self.nesting_level = 1;
        self
    }

    /// Every arc segment endpoint must index a valid point.
    pub fn arc_indices_valid(&self) -> bool {
        self.arc_segments
            .iter()
            .all(|a| a.start_index < self.points.len() && a.end_index < self.points.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Dark,
    Clear,
}

impl Default for Polarity {
    fn default() -> Self {
        Polarity::Dark
    }
}

/// Role of a primitive inside a drill operation's offset group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillRole {
    /// Pure point; the machine processor emits a canned-style peck cycle.
    PeckMark,
    /// Explicit path to mill the hole at a larger diameter.
    MillingPath,
}

/// Which side a primitive was offset to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetKind {
    External,
    Internal,
    /// Centerline pass-through; cut on the line itself.
    On,
}

/// Semantic flags carried by every primitive.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrimitiveProps {
    pub is_cutout: bool,
    pub stroke: bool,
    pub fill: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    pub is_trace: bool,
    pub is_centerline_path: bool,
    pub polarity: Polarity,
    /// Set once a stroke has been expanded into a filled polygon.
    pub polygonized: bool,
    /// Set by the arc reconstructor when a path collapsed back to a circle.
    pub reconstructed: bool,
    /// Set by the arc reconstructor when arc-segment metadata was recovered.
    pub has_reconstructed_arcs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill_role: Option<DrillRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_kind: Option<OffsetKind>,
}

impl PrimitiveProps {
    pub fn filled() -> Self {
        Self {
            fill: true,
            ..Self::default()
        }
    }

    pub fn stroked(width: f64) -> Self {
        Self {
            stroke: true,
            stroke_width: Some(width),
            ..Self::default()
        }
    }

    /// A stroke primitive has `stroke` (or `is_trace`) and a positive width.
    pub fn is_stroke(&self) -> bool {
        (self.stroke || self.is_trace)
            && !self.polygonized
            && self.stroke_width.map(|w| w > 0.0).unwrap_or(false)
    }
}

/// Analytic shape of a primitive. Angles are radians, Y-up; `clockwise`
/// means the negative angular direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Shape {
    Circle {
        center: Point,
        radius: f64,
    },
    Arc {
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        clockwise: bool,
    },
    Rectangle {
        position: Point,
        width: f64,
        height: f64,
    },
    /// Stadium shape positioned by its center, the way flashed apertures are
    /// located.
    Obround {
        position: Point,
        width: f64,
        height: f64,
    },
    Bezier {
        start: Point,
        control1: Point,
        control2: Point,
        end: Point,
    },
    Path {
        contours: Vec<Contour>,
        closed: bool,
    },
}

impl Shape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Circle { .. } => "circle",
            Shape::Arc { .. } => "arc",
            Shape::Rectangle { .. } => "rectangle",
            Shape::Obround { .. } => "obround",
            Shape::Bezier { .. } => "bezier",
            Shape::Path { .. } => "path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Primitive {
    pub id: PrimitiveId,
    pub shape: Shape,
    #[serde(default)]
    pub props: PrimitiveProps,
    #[serde(default)]
    pub curve_ids: Vec<CurveId>,
}

impl Primitive {
    pub fn new(id: PrimitiveId, shape: Shape) -> Self {
        Self {
            id,
            shape,
            props: PrimitiveProps::default(),
            curve_ids: Vec::new(),
        }
    }

    pub fn circle(id: PrimitiveId, center: Point, radius: f64) -> Self {
        Self::new(id, Shape::Circle { center, radius })
    }

    pub fn rectangle(id: PrimitiveId, position: Point, width: f64, height: f64) -> Self {
        Self::new(id, Shape::Rectangle { position, width, height })
    }

    pub fn obround(id: PrimitiveId, position: Point, width: f64, height: f64) -> Self {
        Self::new(id, Shape::Obround { position, width, height })
    }

    pub fn path(id: PrimitiveId, contours: Vec<Contour>, closed: bool) -> Self {
        Self::new(id, Shape::Path { contours, closed })
    }

    pub fn with_props(mut self, props: PrimitiveProps) -> Self {
        self.props = props;
        self
    }

    pub fn with_curves(mut self, curves: Vec<CurveId>) -> Self {
        self.curve_ids = curves;
        self
    }

    pub fn is_path(&self) -> bool {
        matches!(self.shape, Shape::Path { .. })
    }

    /// First contour of a path primitive, if any.
    pub fn outer_contour(&self) -> Option<&Contour> {
        match &self.shape {
            Shape::Path { contours, .. } => contours.first(),
            _ => None,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match &self.shape {
            Shape::Circle { center, radius } => BoundingBox::new(
                center.x - radius,
                center.y - radius,
                center.x + radius,
                center.y + radius,
            ),
            Shape::Arc { center, radius, .. } => BoundingBox::new(
                center.x - radius,
                center.y - radius,
                center.x + radius,
                center.y + radius,
            ),
            Shape::Rectangle { position, width, height } => BoundingBox::new(
                position.x,
                position.y,
                position.x + width,
                position.y + height,
            ),
            Shape::Obround { position, width, height } => BoundingBox::new(
                position.x - width / 2.0,
                position.y - height / 2.0,
                position.x + width / 2.0,
                position.y + height / 2.0,
            ),
            Shape::Bezier { start, control1, control2, end } => {
                let mut bb = BoundingBox::empty();
                for p in [start, control1, control2, end] {
                    bb.expand(p.x, p.y);
                }
                bb
            }
            Shape::Path { contours, .. } => {
                let mut bb = BoundingBox::empty();
                for c in contours {
                    for p in &c.points {
                        bb.expand(p.x, p.y);
                    }
                }
                bb
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_point_parameter() {
        let p = Point::tagged(1.0, 2.0, CurveId(5), 3, 12);
        assert_eq!(p.curve_id, Some(CurveId(5)));
        assert!((p.t.unwrap() - 0.25).abs() < 1e-12);
        let u = p.untagged();
        assert!(u.curve_id.is_none());
        assert_eq!(u.x, 1.0);
    }

    #[test]
    fn test_stroke_detection() {
        let mut props = PrimitiveProps::stroked(0.3);
        assert!(props.is_stroke());
        props.polygonized = true;
        assert!(!props.is_stroke());
        let zero = PrimitiveProps::stroked(0.0);
        assert!(!zero.is_stroke());
    }

    #[test]
    fn test_arc_index_validation() {
        let mut c = Contour::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        c.arc_segments.push(ArcSegment {
            start_index: 1,
            end_index: 2,
            center: Point::new(1.0, 0.5),
            radius: 0.5,
            start_angle: -std::f64::consts::FRAC_PI_2,
            end_angle: std::f64::consts::FRAC_PI_2,
            sweep_angle: std::f64::consts::PI,
            clockwise: false,
            curve_id: None,
        });
        assert!(c.arc_indices_valid());
        c.arc_segments[0].end_index = 9;
        assert!(!c.arc_indices_valid());
    }

    #[test]
    fn test_path_bounding_box() {
        let prim = Primitive::path(
            PrimitiveId(1),
            vec![Contour::from_points(vec![
                Point::new(-2.0, 1.0),
                Point::new(4.0, 1.0),
                Point::new(4.0, 6.0),
            ])],
            true,
        );
        let bb = prim.bounding_box();
        assert_eq!((bb.min_x, bb.min_y, bb.max_x, bb.max_y), (-2.0, 1.0, 4.0, 6.0));
    }
}
