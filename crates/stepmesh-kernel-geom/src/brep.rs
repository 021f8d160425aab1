//! Boundary representation produced by the STEP reader.
//!
//! Unlike a full half-edge topology, loops here are already resolved into
//! traversal order: every [`OrientedEdge`] runs from `start` to `end` in the
//! direction the loop walks it, so consumers never consult edge senses.

use crate::curve::Curve3d;
use crate::surface::Surface;
use stepmesh_kernel_math::Point3;

/// One edge of a face loop, in traversal order.
#[derive(Debug, Clone)]
pub struct OrientedEdge {
    /// Where the loop enters this edge.
    pub start: Point3,
    /// Where the loop leaves this edge.
    pub end: Point3,
    /// Underlying edge geometry.
    pub curve: Box<dyn Curve3d>,
    /// Whether traversal follows increasing curve parameter.
    pub forward: bool,
}

impl OrientedEdge {
    /// Whether the edge starts and ends at the same vertex (full circle, etc.).
    pub fn is_closed(&self) -> bool {
        (self.start - self.end).norm() < 1e-9
    }

    /// The same edge walked the other way.
    pub fn reversed(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
            curve: self.curve.clone(),
            forward: !self.forward,
        }
    }
}

/// A face boundary.
#[derive(Debug, Clone)]
pub enum FaceLoop {
    /// A closed chain of edges.
    Edges {
        /// Edges in traversal order.
        edges: Vec<OrientedEdge>,
        /// Marked as the outer bound in the source file.
        is_outer: bool,
    },
    /// A degenerate loop collapsed to a single point (cone apex, sphere pole).
    Vertex(Point3),
}

impl FaceLoop {
    /// Whether this loop was declared as the face's outer bound.
    pub fn is_outer(&self) -> bool {
        matches!(self, FaceLoop::Edges { is_outer: true, .. })
    }
}

/// A bounded region of a surface.
#[derive(Debug, Clone)]
pub struct Face {
    /// Carrier surface.
    pub surface: Box<dyn Surface>,
    /// Whether the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Boundary loops.
    pub loops: Vec<FaceLoop>,
}

/// A solid (or shell) made of faces.
#[derive(Debug, Clone, Default)]
pub struct BRepSolid {
    /// Name from the source file, possibly empty.
    pub name: String,
    /// Faces of the outer shell and any void shells.
    pub faces: Vec<Face>,
}

impl BRepSolid {
    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
}
