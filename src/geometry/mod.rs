//! Geometry utilities - winding, bounds, tessellation resolution, simplification
//!
//! All angles are radians in a Y-up plane; `clockwise` is the negative
//! angular direction. Point comparisons always use squared distance against
//! a squared precision, never exact equality.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::primitive::Point;
use crate::EngineConfig;

pub mod tessellate;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    pub fn expand(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&mut self, other: &BoundingBox) {
        if !other.is_empty() {
            self.expand(other.min_x, other.min_y);
            self.expand(other.max_x, other.max_y);
        }
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }
}

/// Signed area of a ring via the shoelace formula. Positive for
/// counter-clockwise winding in Y-up coordinates.
pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let a = &points[i];
        let b = &points[(i + 1) % points.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

pub fn is_clockwise(points: &[Point]) -> bool {
    signed_area(points) < 0.0
}

/// Tessellation resolution for a circle or partial arc of the given radius:
/// enough segments that each chord stays under the configured arc tolerance,
/// with a floor so small features stay round.
pub fn optimal_segments(config: &EngineConfig, radius: f64, full_circle: bool) -> u32 {
    let floor = if full_circle {
        config.min_circle_segments
    } else {
        config.min_arc_segments
    };
    if !radius.is_finite() || radius <= 0.0 {
        return floor;
    }
    let by_tolerance = (TAU * radius / config.arc_tolerance).ceil() as u32;
    by_tolerance.max(floor)
}

/// Normalize an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a < 0.0 {
        a += TAU;
    }
    a
}

/// Shortest signed angular difference from `from` to `to`, in `(-π, π]`.
pub fn short_angle_diff(from: f64, to: f64) -> f64 {
    let mut d = (to - from) % TAU;
    if d > PI {
        d -= TAU;
    } else if d <= -PI {
        d += TAU;
    }
    d
}

/// Signed sweep from `start_angle` to `end_angle` in the stated rotation
/// direction: negative for clockwise, positive for counter-clockwise.
pub fn arc_sweep(start_angle: f64, end_angle: f64, clockwise: bool) -> f64 {
    let mut sweep = normalize_angle(end_angle) - normalize_angle(start_angle);
    if clockwise {
        if sweep > 0.0 {
            sweep -= TAU;
        }
        if sweep == 0.0 {
            sweep = -TAU;
        }
    } else {
        if sweep < 0.0 {
            sweep += TAU;
        }
        if sweep == 0.0 {
            sweep = TAU;
        }
    }
    sweep
}

pub fn point_on_circle(center: &Point, radius: f64, angle: f64) -> Point {
    Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// Intersection of the infinite lines through `(a1, a2)` and `(b1, b2)`.
/// Returns `None` when the lines are parallel within `1e-9`.
pub fn line_intersection(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> Option<Point> {
    let d1x = a2.x - a1.x;
    let d1y = a2.y - a1.y;
    let d2x = b2.x - b1.x;
    let d2y = b2.y - b1.y;
    let den = d1x * d2y - d1y * d2x;
    if den.abs() < 1e-9 {
        return None;
    }
    let t = ((b1.x - a1.x) * d2y - (b1.y - a1.y) * d2x) / den;
    Some(Point::new(a1.x + t * d1x, a1.y + t * d1y))
}

/// Squared distance from `p` to the segment `(a, b)`.
pub fn sq_dist_to_segment(p: &Point, a: &Point, b: &Point) -> f64 {
    let mut x = a.x;
    let mut y = a.y;
    let mut dx = b.x - x;
    let mut dy = b.y - y;

    if dx != 0.0 || dy != 0.0 {
        let t = ((p.x - x) * dx + (p.y - y) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = b.x;
            y = b.y;
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    dx = p.x - x;
    dy = p.y - y;
    dx * dx + dy * dy
}

/// Iterative Douglas–Peucker simplification against a squared tolerance.
pub fn simplify_douglas_peucker(points: &[Point], sq_tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }
        let mut max_sq = 0.0;
        let mut index = first;
        for i in (first + 1)..last {
            let sq = sq_dist_to_segment(&points[i], &points[first], &points[last]);
            if sq > max_sq {
                max_sq = sq;
                index = i;
            }
        }
        if max_sq > sq_tolerance {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    points
        .iter()
        .zip(keep.iter())
        .filter_map(|(p, &k)| if k { Some(*p) } else { None })
        .collect()
}
