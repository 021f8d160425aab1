//! Parametric edge curves.

use crate::surface::wrap_angle;
use stepmesh_kernel_math::{Dir3, Point3, Vec3};

/// The kind of a curve (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle.
    Circle,
    /// Ellipse.
    Ellipse,
    /// Piecewise-linear polyline.
    Polyline,
}

/// A parametric curve in 3D space.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 3D point.
    fn evaluate(&self, t: f64) -> Point3;

    /// Parameter of the curve point closest to `p`.
    ///
    /// Periodic curves return a value in `(-π, π]`.
    fn parameter_of(&self, p: &Point3) -> f64;

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Whether the parameter wraps around with period `2π`.
    fn is_periodic(&self) -> bool {
        false
    }

    /// Largest radius of curvature, used to pick a sampling density.
    /// `None` for straight curves.
    fn sampling_radius(&self) -> Option<f64> {
        None
    }

    /// Vertices of a piecewise-linear curve, if it is one.
    fn vertices(&self) -> Option<&[Point3]> {
        None
    }

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve3d>;
}

impl Clone for Box<dyn Curve3d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`
#[derive(Debug, Clone)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (not necessarily unit length; magnitude sets speed).
    pub direction: Vec3,
}

impl Line3d {
    /// Create a line from two endpoints, parameterized so `t=0` gives `start` and `t=1` gives `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve3d for Line3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let len2 = self.direction.norm_squared();
        if len2 == 0.0 {
            return 0.0;
        }
        (p - self.origin).dot(&self.direction) / len2
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Circle3d
// =============================================================================

/// A circle in 3D space defined by center, frame, and radius.
///
/// Parameterization: `P(t) = center + radius * (cos(t) * x_dir + sin(t) * y_dir)`
#[derive(Debug, Clone)]
pub struct Circle3d {
    /// Center of the circle.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for t=0.
    pub x_dir: Dir3,
    /// Second in-plane direction (normal × x_dir).
    pub y_dir: Dir3,
}

impl Circle3d {
    /// Create a circle from its center, normal, reference direction and radius.
    pub fn new(center: Point3, normal: &Dir3, x_dir: &Dir3, radius: f64) -> Self {
        Self {
            center,
            radius,
            x_dir: *x_dir,
            y_dir: Dir3::new_normalize(normal.as_ref().cross(x_dir.as_ref())),
        }
    }
}

impl Curve3d for Circle3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + self.radius * (cos_t * self.x_dir.as_ref() + sin_t * self.y_dir.as_ref())
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let d = p - self.center;
        wrap_angle(d.dot(self.y_dir.as_ref()).atan2(d.dot(self.x_dir.as_ref())))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn sampling_radius(&self) -> Option<f64> {
        Some(self.radius.abs())
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Ellipse3d
// =============================================================================

/// An ellipse in 3D space.
///
/// Parameterization: `P(t) = center + a * cos(t) * x_dir + b * sin(t) * y_dir`
#[derive(Debug, Clone)]
pub struct Ellipse3d {
    /// Center of the ellipse.
    pub center: Point3,
    /// Semi-axis along `x_dir`.
    pub semi_axis_1: f64,
    /// Semi-axis along `y_dir`.
    pub semi_axis_2: f64,
    /// Reference direction for t=0.
    pub x_dir: Dir3,
    /// Second in-plane direction.
    pub y_dir: Dir3,
}

impl Curve3d for Ellipse3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center
            + self.semi_axis_1 * cos_t * self.x_dir.as_ref()
            + self.semi_axis_2 * sin_t * self.y_dir.as_ref()
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        let d = p - self.center;
        let x = d.dot(self.x_dir.as_ref()) / self.semi_axis_1;
        let y = d.dot(self.y_dir.as_ref()) / self.semi_axis_2;
        wrap_angle(y.atan2(x))
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Ellipse
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn sampling_radius(&self) -> Option<f64> {
        // Curvature peaks at the ends of the major axis: b² / a.
        let a = self.semi_axis_1.abs().max(self.semi_axis_2.abs());
        let b = self.semi_axis_1.abs().min(self.semi_axis_2.abs());
        Some(if a > 0.0 { b * b / a } else { 0.0 })
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Polyline3d
// =============================================================================

/// A piecewise-linear curve through an ordered list of points.
#[derive(Debug, Clone)]
pub struct Polyline3d {
    /// The points, in curve order.
    pub points: Vec<Point3>,
}

impl Curve3d for Polyline3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let n = self.points.len();
        if n == 0 {
            return Point3::origin();
        }
        let t = t.clamp(0.0, (n - 1) as f64);
        let i = (t.floor() as usize).min(n.saturating_sub(2));
        if n == 1 {
            return self.points[0];
        }
        let f = t - i as f64;
        self.points[i] + f * (self.points[i + 1] - self.points[i])
    }

    fn parameter_of(&self, p: &Point3) -> f64 {
        self.points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - p)
                    .norm_squared()
                    .total_cmp(&(*b - p).norm_squared())
            })
            .map(|(i, _)| i as f64)
            .unwrap_or(0.0)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Polyline
    }

    fn vertices(&self) -> Option<&[Point3]> {
        Some(&self.points)
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }
}
