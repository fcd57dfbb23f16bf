//! Grid policies
//!
//! A policy answers three questions for the rest of the engine: where does a
//! point snap to, which directions may a segment take, and how close is
//! "the same". Two policies ship with the crate:
//! - [`FreePolicy`]: continuous placement, any direction
//! - [`ManhattanGrid`]: axis-aligned segments on a square grid

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Point, Vector};
use crate::core::RouteGraphError;

/// Default tolerance of the continuous policy.
pub const FREE_EPSILON: f64 = 1e-6;

/// Fraction of the grid step used as tolerance when none is given.
pub const GRID_EPSILON_RATIO: f64 = 0.01;

/// Snapping and direction model of a drawing context.
pub trait GeometryPolicy: fmt::Debug {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Tolerance for "same position" and "aligned" comparisons.
    fn epsilon(&self) -> f64;

    /// Project a point onto the policy's lattice. Must be a fixed point:
    /// `snap(snap(p)) == snap(p)`.
    fn snap(&self, point: Point) -> Point;

    /// Unit directions a segment may take. Empty means unconstrained.
    fn admissible_directions(&self) -> Vec<Vector>;

    /// Unit direction of the segment `from -> to` if that segment is
    /// admissible, `None` for degenerate or forbidden segments.
    fn classify_direction(&self, from: Point, to: Point) -> Option<Vector>;

    /// Whether the segment `a -> b` runs along `direction` within tolerance.
    fn is_collinear(&self, a: Point, b: Point, direction: Vector) -> bool {
        match direction.normalized() {
            Some(unit) => (b - a).cross(unit).abs() <= self.epsilon(),
            None => false,
        }
    }

    /// Parameter of `point` along the ray `origin + t * direction`.
    fn project_param(&self, origin: Point, direction: Vector, point: Point) -> f64 {
        let len_sq = direction.dot(direction);
        if len_sq <= f64::EPSILON {
            return 0.0;
        }
        (point - origin).dot(direction) / len_sq
    }

    fn is_horizontal(&self, a: Point, b: Point) -> bool {
        (a.y - b.y).abs() <= self.epsilon()
    }

    fn is_vertical(&self, a: Point, b: Point) -> bool {
        (a.x - b.x).abs() <= self.epsilon()
    }

    fn coincident(&self, a: Point, b: Point) -> bool {
        a.distance(b) <= self.epsilon()
    }

    /// Corner point of a two-segment admissible path from `from` to `to`,
    /// or `None` when the direct segment is already admissible.
    fn elbow(&self, from: Point, to: Point) -> Option<Point> {
        let _ = (from, to);
        None
    }
}

/// Continuous placement: snapping is the identity, every direction is fine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreePolicy {
    epsilon: f64,
}

impl FreePolicy {
    pub fn new() -> Self {
        Self {
            epsilon: FREE_EPSILON,
        }
    }

    pub fn with_epsilon(epsilon: f64) -> Result<Self, RouteGraphError> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(RouteGraphError::InvalidPolicy(format!(
                "epsilon must be positive and finite, got {}",
                epsilon
            )));
        }
        Ok(Self { epsilon })
    }
}

impl Default for FreePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryPolicy for FreePolicy {
    fn name(&self) -> &str {
        "free"
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn snap(&self, point: Point) -> Point {
        point
    }

    fn admissible_directions(&self) -> Vec<Vector> {
        Vec::new()
    }

    fn classify_direction(&self, from: Point, to: Point) -> Option<Vector> {
        let d = to - from;
        if d.length() <= self.epsilon {
            return None;
        }
        d.normalized()
    }
}

/// Axis-constrained square grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManhattanGrid {
    step: f64,
    epsilon: f64,
}

impl ManhattanGrid {
    /// Grid with the default tolerance of `step * 0.01`.
    pub fn new(step: f64) -> Result<Self, RouteGraphError> {
        Self::with_epsilon(step, step * GRID_EPSILON_RATIO)
    }

    pub fn with_epsilon(step: f64, epsilon: f64) -> Result<Self, RouteGraphError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(RouteGraphError::InvalidPolicy(format!(
                "grid step must be positive and finite, got {}",
                step
            )));
        }
        if !epsilon.is_finite() || epsilon <= 0.0 || epsilon >= step / 2.0 {
            return Err(RouteGraphError::InvalidPolicy(format!(
                "grid epsilon must be in (0, step/2), got {} for step {}",
                epsilon, step
            )));
        }
        Ok(Self { step, epsilon })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    fn snap_axis(&self, v: f64) -> f64 {
        // `+ 0.0` folds negative zero so snapped output compares and prints cleanly
        (v / self.step).round() * self.step + 0.0
    }
}

impl GeometryPolicy for ManhattanGrid {
    fn name(&self) -> &str {
        "manhattan"
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn snap(&self, point: Point) -> Point {
        if !point.is_finite() {
            return point;
        }
        Point::new(self.snap_axis(point.x), self.snap_axis(point.y))
    }

    fn admissible_directions(&self) -> Vec<Vector> {
        vec![
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(-1.0, 0.0),
            Point::new(0.0, -1.0),
        ]
    }

    fn classify_direction(&self, from: Point, to: Point) -> Option<Vector> {
        let d = to - from;
        let flat_x = d.x.abs() <= self.epsilon;
        let flat_y = d.y.abs() <= self.epsilon;
        match (flat_x, flat_y) {
            (true, true) => None,
            (false, true) => Some(Point::new(d.x.signum(), 0.0)),
            (true, false) => Some(Point::new(0.0, d.y.signum())),
            (false, false) => None,
        }
    }

    fn elbow(&self, from: Point, to: Point) -> Option<Point> {
        if self.coincident(from, to) || self.classify_direction(from, to).is_some() {
            return None;
        }
        // Horizontal leg first
        Some(Point::new(to.x, from.y))
    }
}

/// Serializable description of a policy, as found in scripts and options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Free {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        epsilon: Option<f64>,
    },
    Manhattan {
        step: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        epsilon: Option<f64>,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Free { epsilon: None }
    }
}

impl PolicyConfig {
    pub fn manhattan(step: f64) -> Self {
        PolicyConfig::Manhattan {
            step,
            epsilon: None,
        }
    }

    pub fn build(&self) -> Result<Box<dyn GeometryPolicy>, RouteGraphError> {
        Ok(match *self {
            PolicyConfig::Free { epsilon: None } => Box::new(FreePolicy::new()),
            PolicyConfig::Free { epsilon: Some(e) } => Box::new(FreePolicy::with_epsilon(e)?),
            PolicyConfig::Manhattan {
                step,
                epsilon: None,
            } => Box::new(ManhattanGrid::new(step)?),
            PolicyConfig::Manhattan {
                step,
                epsilon: Some(e),
            } => Box::new(ManhattanGrid::with_epsilon(step, e)?),
        })
    }
}
