//! STEP file reader: resolves parsed entities into [`BRepSolid`]s.

use std::collections::HashMap;
use std::path::Path;

use crate::entities::{
    detect_angle_scale, detect_length_scale, parse_curve, parse_edge_curve, parse_face,
    parse_loop, parse_solid, parse_surface, StepLoop,
};
use crate::error::StepError;
use crate::parser::{Parser, StepFile};

use stepmesh_kernel_geom::{BRepSolid, Curve3d, Face, FaceLoop, Line3d, OrientedEdge, Surface};

/// Entity types that define a body.
const SOLID_TYPES: [&str; 3] = [
    "MANIFOLD_SOLID_BREP",
    "BREP_WITH_VOIDS",
    "SHELL_BASED_SURFACE_MODEL",
];

/// Read solids from a STEP file on disk.
///
/// Returns every body in entity-ID order, with coordinates in millimetres.
pub fn read_step(path: impl AsRef<Path>) -> Result<Vec<BRepSolid>, StepError> {
    let data = std::fs::read(path)?;
    read_step_from_buffer(&data)
}

/// Read solids from STEP file contents.
pub fn read_step_from_buffer(data: &[u8]) -> Result<Vec<BRepSolid>, StepError> {
    let mut file = Parser::parse(data)?;
    file.length_scale = detect_length_scale(&file)?;
    file.angle_scale = detect_angle_scale(&file)?;
    StepReader::new(&file).read_all_solids()
}

/// Resolution context. Curves and surfaces shared between faces are decoded
/// once per file.
struct StepReader<'a> {
    file: &'a StepFile,
    curves: HashMap<u64, Box<dyn Curve3d>>,
    surfaces: HashMap<u64, Box<dyn Surface>>,
}

impl<'a> StepReader<'a> {
    fn new(file: &'a StepFile) -> Self {
        Self {
            file,
            curves: HashMap::new(),
            surfaces: HashMap::new(),
        }
    }

    fn read_all_solids(&mut self) -> Result<Vec<BRepSolid>, StepError> {
        let mut ids: Vec<u64> = SOLID_TYPES
            .iter()
            .flat_map(|t| self.file.entities_of_type(t))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        if ids.is_empty() {
            return Err(StepError::NoSolids);
        }

        ids.into_iter().map(|id| self.read_solid(id)).collect()
    }

    fn read_solid(&mut self, id: u64) -> Result<BRepSolid, StepError> {
        let step_solid = parse_solid(self.file, id)?;
        let mut faces = Vec::new();
        for shell in &step_solid.shells {
            for &face_id in &shell.face_ids {
                let mut face = self.read_face(face_id)?;
                if !shell.orientation {
                    face.same_sense = !face.same_sense;
                }
                faces.push(face);
            }
        }
        if faces.is_empty() {
            return Err(StepError::InvalidTopology(format!("solid #{id} has no faces")));
        }
        Ok(BRepSolid {
            name: step_solid.name,
            faces,
        })
    }

    fn read_face(&mut self, id: u64) -> Result<Face, StepError> {
        let step_face = parse_face(self.file, id)?;
        let surface = self.surface(step_face.surface_id)?;

        let mut loops = Vec::with_capacity(step_face.bounds.len());
        for bound in &step_face.bounds {
            let face_loop = self.read_loop(bound.loop_id, bound.is_outer)?;
            loops.push(if bound.orientation {
                face_loop
            } else {
                reverse_loop(face_loop)
            });
        }

        Ok(Face {
            surface,
            same_sense: step_face.same_sense,
            loops,
        })
    }

    fn read_loop(&mut self, id: u64, is_outer: bool) -> Result<FaceLoop, StepError> {
        let edges = match parse_loop(self.file, id)? {
            StepLoop::Vertex(p) => return Ok(FaceLoop::Vertex(p)),
            StepLoop::Polygon(points) => {
                let n = points.len();
                (0..n)
                    .map(|i| {
                        let (a, b) = (points[i], points[(i + 1) % n]);
                        OrientedEdge {
                            start: a,
                            end: b,
                            curve: Box::new(Line3d::from_points(a, b)),
                            forward: true,
                        }
                    })
                    .collect()
            }
            StepLoop::Edges(oriented) => {
                let mut edges = Vec::with_capacity(oriented.len());
                for oe in oriented {
                    let edge = parse_edge_curve(self.file, oe.edge_id)?;
                    let (start, end) = if oe.orientation {
                        (edge.start, edge.end)
                    } else {
                        (edge.end, edge.start)
                    };
                    edges.push(OrientedEdge {
                        start,
                        end,
                        curve: self.curve(edge.curve_id)?,
                        forward: oe.orientation == edge.same_sense,
                    });
                }
                edges
            }
        };
        Ok(FaceLoop::Edges { edges, is_outer })
    }

    fn curve(&mut self, id: u64) -> Result<Box<dyn Curve3d>, StepError> {
        if let Some(c) = self.curves.get(&id) {
            return Ok(c.clone_box());
        }
        let c = parse_curve(self.file, id)?;
        self.curves.insert(id, c.clone_box());
        Ok(c)
    }

    fn surface(&mut self, id: u64) -> Result<Box<dyn Surface>, StepError> {
        if let Some(s) = self.surfaces.get(&id) {
            return Ok(s.clone_box());
        }
        let s = parse_surface(self.file, id)?;
        self.surfaces.insert(id, s.clone_box());
        Ok(s)
    }
}

/// Walk a loop the other way round.
fn reverse_loop(face_loop: FaceLoop) -> FaceLoop {
    match face_loop {
        FaceLoop::Edges { edges, is_outer } => FaceLoop::Edges {
            edges: edges.iter().rev().map(OrientedEdge::reversed).collect(),
            is_outer,
        },
        vertex => vertex,
    }
}
