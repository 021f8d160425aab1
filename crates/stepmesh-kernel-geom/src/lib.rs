#![warn(missing_docs)]

//! Analytic surface and curve types for the stepmesh kernel.
//!
//! Provides trait-based abstractions for parametric surfaces and curves,
//! with concrete implementations for the analytic types found in STEP
//! B-rep models (planes, cylinders, cones, spheres, tori, lines, circles,
//! ellipses and polylines), and the face/loop/edge model the STEP reader
//! produces and the tessellator consumes.

mod brep;
mod curve;
mod surface;

pub use brep::{BRepSolid, Face, FaceLoop, OrientedEdge};
pub use curve::{Circle3d, Curve3d, CurveKind, Ellipse3d, Line3d, Polyline3d};
pub use surface::{
    ConeSurface, CylinderSurface, Plane, SphereSurface, Surface, SurfaceKind, TorusSurface,
};
