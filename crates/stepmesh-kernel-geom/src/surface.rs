//! Parametric surfaces.

use std::any::Any;
use std::f64::consts::PI;
use stepmesh_kernel_math::{any_perpendicular, Dir3, Point2, Point3, Vec3, EPSILON};

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface (infinite extent along axis).
    Cylinder,
    /// Conical surface.
    Cone,
    /// Spherical surface.
    Sphere,
    /// Toroidal surface.
    Torus,
}

/// A parametric surface in 3D space.
///
/// Every implementation orients `(u, v)` so that `∂P/∂u × ∂P/∂v` points
/// along [`Surface::normal`]; a counter-clockwise triangle in parameter
/// space therefore faces along the surface normal in 3D.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)` to get a 3D point.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Surface normal at parameter `(u, v)`.
    fn normal(&self, uv: Point2) -> Dir3;

    /// Parameter of the surface point closest to `p`.
    ///
    /// Periodic parameters are returned in `(-π, π]`.
    fn project(&self, p: &Point3) -> Point2;

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// Whether `u` wraps around with period `2π`.
    fn periodic_u(&self) -> bool {
        false
    }

    /// Whether `v` wraps around with period `2π`.
    fn periodic_v(&self) -> bool {
        false
    }

    /// Radius of curvature along `u` at height `v`, `None` when straight.
    fn u_radius(&self, _v: f64) -> Option<f64> {
        None
    }

    /// Radius of curvature along `v`, `None` when straight.
    fn v_radius(&self) -> Option<f64> {
        None
    }

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

fn angle_in_frame(d: &Vec3, x: &Dir3, y: &Vec3) -> f64 {
    d.dot(y).atan2(d.dot(x.as_ref()))
}

// =============================================================================
// Plane
// =============================================================================

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two orthogonal direction vectors.
    /// The vectors do not need to be normalized.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        Self {
            origin,
            x_dir: Dir3::new_normalize(x_dir),
            y_dir: Dir3::new_normalize(y_dir),
            normal_dir: Dir3::new_normalize(x_dir.cross(&y_dir)),
        }
    }

    /// Create a plane from origin and normal. X/Y directions are chosen arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let x = any_perpendicular(&n);
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.normal_dir
    }

    fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Cylinder
// =============================================================================

/// A cylindrical surface defined by an axis line and radius.
///
/// Parameterization: `P(u, v) = center + radius * (cos(u) * x_dir + sin(u) * y_dir) + v * axis`
#[derive(Debug, Clone)]
pub struct CylinderSurface {
    /// Point on the cylinder axis.
    pub center: Point3,
    /// Unit direction along the cylinder axis.
    pub axis: Dir3,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Radius of the cylinder.
    pub radius: f64,
}

impl CylinderSurface {
    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for CylinderSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.center
            + self.radius * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
            + uv.y * self.axis.as_ref()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        Dir3::new_normalize(cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
    }

    fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.center;
        Point2::new(
            angle_in_frame(&d, &self.ref_dir, &self.y_dir()),
            d.dot(self.axis.as_ref()),
        )
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn u_radius(&self, _v: f64) -> Option<f64> {
        Some(self.radius.abs())
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Cone
// =============================================================================

/// A conical surface, parameterized from its reference circle.
///
/// Parameterization: `P(u, v) = origin + v * axis + (radius + v * tan(half_angle)) * (cos(u) * x + sin(u) * y)`
///
/// `v` is the signed height above the reference circle of radius `radius`.
#[derive(Debug, Clone)]
pub struct ConeSurface {
    /// Center of the reference circle.
    pub origin: Point3,
    /// Unit direction along the cone axis.
    pub axis: Dir3,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Radius at `v = 0`.
    pub radius: f64,
    /// Half-angle of the cone in radians.
    pub half_angle: f64,
}

impl ConeSurface {
    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    /// Radius of the cross-section at height `v`.
    pub fn radius_at(&self, v: f64) -> f64 {
        self.radius + v * self.half_angle.tan()
    }
}

impl Surface for ConeSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.origin
            + uv.y * self.axis.as_ref()
            + self.radius_at(uv.y) * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let radial = cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir();
        Dir3::new_normalize(radial - self.half_angle.tan() * self.axis.as_ref())
    }

    fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(
            angle_in_frame(&d, &self.ref_dir, &self.y_dir()),
            d.dot(self.axis.as_ref()),
        )
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cone
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn u_radius(&self, v: f64) -> Option<f64> {
        Some(self.radius_at(v).abs().max(EPSILON))
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Sphere
// =============================================================================

/// A spherical surface.
///
/// Parameterization: `P(u, v) = center + radius * (cos(v) * (cos(u) * x + sin(u) * y) + sin(v) * z)`
///
/// Where `u` is longitude and `v ∈ [-π/2, π/2]` is latitude.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    /// Center of the sphere.
    pub center: Point3,
    /// Radius of the sphere.
    pub radius: f64,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Axis direction (north pole).
    pub axis: Dir3,
}

impl SphereSurface {
    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for SphereSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.center
            + self.radius
                * (cos_v * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
                    + sin_v * self.axis.as_ref())
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        Dir3::new_normalize(
            cos_v * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
                + sin_v * self.axis.as_ref(),
        )
    }

    fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.center;
        let len = d.norm();
        if len < EPSILON {
            return Point2::origin();
        }
        let lat = (d.dot(self.axis.as_ref()) / len).clamp(-1.0, 1.0).asin();
        // Longitude is undefined at the poles; callers patch it from neighbours.
        Point2::new(angle_in_frame(&d, &self.ref_dir, &self.y_dir()), lat)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn u_radius(&self, _v: f64) -> Option<f64> {
        Some(self.radius.abs())
    }

    fn v_radius(&self) -> Option<f64> {
        Some(self.radius.abs())
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Torus
// =============================================================================

/// A toroidal surface.
///
/// Parameterization: `P(u, v) = center + (R + r cos(v)) * (cos(u) * x + sin(u) * y) + r sin(v) * z`
#[derive(Debug, Clone)]
pub struct TorusSurface {
    /// Center of the torus.
    pub center: Point3,
    /// Axis of revolution.
    pub axis: Dir3,
    /// Reference direction for u=0.
    pub ref_dir: Dir3,
    /// Distance from the center to the tube center.
    pub major_radius: f64,
    /// Tube radius.
    pub minor_radius: f64,
}

impl TorusSurface {
    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for TorusSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        let radial = cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir();
        self.center
            + (self.major_radius + self.minor_radius * cos_v) * radial
            + self.minor_radius * sin_v * self.axis.as_ref()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        let radial = cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir();
        Dir3::new_normalize(cos_v * radial + sin_v * self.axis.as_ref())
    }

    fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.center;
        let y = self.y_dir();
        let u = angle_in_frame(&d, &self.ref_dir, &y);
        let height = d.dot(self.axis.as_ref());
        let planar = (d - height * self.axis.as_ref()).norm();
        Point2::new(u, height.atan2(planar - self.major_radius))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Torus
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn periodic_v(&self) -> bool {
        true
    }

    fn u_radius(&self, _v: f64) -> Option<f64> {
        Some(self.major_radius.abs() + self.minor_radius.abs())
    }

    fn v_radius(&self) -> Option<f64> {
        Some(self.minor_radius.abs())
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Wrap an angle into `(-π, π]`.
pub(crate) fn wrap_angle(a: f64) -> f64 {
    let mut a = a % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}
