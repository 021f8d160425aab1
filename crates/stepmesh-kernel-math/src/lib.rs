#![warn(missing_docs)]

//! Math types for the stepmesh B-rep kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for 3D CAD geometry, plus the chord-tolerance math used to turn
//! linear/angular tessellation tolerances into segment counts.

use nalgebra::{Unit, Vector2, Vector3};
use std::f64::consts::PI;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// Geometric tolerance for coincident points.
pub const EPSILON: f64 = 1e-9;

/// Upper bound on the segments generated for a single arc or surface span.
pub const MAX_SEGMENTS: usize = 4096;

/// Largest angular step (radians) that keeps the chord of a circle of
/// `radius` within `linear_tolerance` of the arc and the turn between
/// consecutive chords within `angular_tolerance`.
///
/// Sagitta of a chord spanning angle `θ` is `r (1 - cos(θ/2))`, so the
/// linear bound gives `θ = 2 acos(1 - tol / r)`.
pub fn max_angular_step(radius: f64, linear_tolerance: f64, angular_tolerance: f64) -> f64 {
    let radius = radius.abs();
    let by_angle = angular_tolerance.clamp(1e-6, PI);
    if radius < EPSILON || linear_tolerance >= radius {
        return by_angle;
    }
    let by_chord = 2.0 * (1.0 - linear_tolerance / radius).clamp(-1.0, 1.0).acos();
    by_chord.min(by_angle).max(1e-6)
}

/// Number of segments needed to span `sweep` radians of a circle with
/// the given radius under both tolerances. Always at least `min`.
pub fn arc_segments(
    radius: f64,
    sweep: f64,
    linear_tolerance: f64,
    angular_tolerance: f64,
    min: usize,
) -> usize {
    let step = max_angular_step(radius, linear_tolerance, angular_tolerance);
    let n = (sweep.abs() / step).ceil();
    if !n.is_finite() {
        return min.max(1);
    }
    (n as usize).clamp(min.max(1), MAX_SEGMENTS)
}

/// Returns an orthonormal direction perpendicular to `n`.
pub fn any_perpendicular(n: &Dir3) -> Dir3 {
    let arbitrary = if n.as_ref().x.abs() < 0.9 {
        Vec3::x()
    } else {
        Vec3::y()
    };
    Dir3::new_normalize(arbitrary - arbitrary.dot(n.as_ref()) * n.as_ref())
}

/// Signed area of a closed 2D polygon (positive when counter-clockwise).
pub fn signed_area_2d(pts: &[Point2]) -> f64 {
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
    }
    area * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_respects_angular_bound() {
        // Loose linear tolerance: the chord allows ~0.9 rad, so the angle wins.
        let step = max_angular_step(1e6, 1e5, 0.25);
        assert!((step - 0.25).abs() < 1e-12);

        // A tight linear tolerance on a huge radius still wins over the angle.
        let step = max_angular_step(1e6, 0.1, 0.25);
        assert!(step < 1e-3);
    }

    #[test]
    fn test_step_respects_linear_bound() {
        let r = 10.0;
        let tol = 0.01;
        let step = max_angular_step(r, tol, PI);
        let sagitta = r * (1.0 - (step / 2.0).cos());
        assert!(sagitta <= tol + 1e-9);
    }

    #[test]
    fn test_tolerance_larger_than_radius() {
        let step = max_angular_step(0.5, 2.0, 0.5);
        assert!((step - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_arc_segments_monotonic() {
        let coarse = arc_segments(10.0, 2.0 * PI, 0.5, 1.0, 3);
        let fine = arc_segments(10.0, 2.0 * PI, 0.01, 0.1, 3);
        assert!(fine > coarse);
        assert!(coarse >= 3);
    }

    #[test]
    fn test_arc_segments_minimum() {
        assert_eq!(arc_segments(1.0, 0.0, 0.1, 0.5, 1), 1);
        assert_eq!(arc_segments(1.0, 2.0 * PI, 10.0, PI, 3), 3);
    }

    #[test]
    fn test_perpendicular() {
        let z = Dir3::new_normalize(Vec3::z());
        let p = any_perpendicular(&z);
        assert!(p.as_ref().dot(z.as_ref()).abs() < 1e-12);
    }

    #[test]
    fn test_signed_area() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!((signed_area_2d(&square) - 1.0).abs() < 1e-12);
        let mut rev = square.to_vec();
        rev.reverse();
        assert!((signed_area_2d(&rev) + 1.0).abs() < 1e-12);
    }
}
