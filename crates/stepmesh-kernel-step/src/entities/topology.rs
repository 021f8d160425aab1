//! Topology entities: vertex, edge, loop, face, shell and solid records.
//!
//! These are thin records of entity IDs and flags. The reader resolves them
//! into geometry.

use super::{parse_cartesian_point, EntityArgs};
use crate::error::StepError;
use crate::parser::StepFile;
use stepmesh_kernel_math::Point3;

/// Parsed EDGE_CURVE entity.
#[derive(Debug, Clone)]
pub struct StepEdge {
    /// Start vertex position.
    pub start: Point3,
    /// End vertex position.
    pub end: Point3,
    /// Edge geometry (curve) entity ID.
    pub curve_id: u64,
    /// Whether the curve direction matches the edge direction.
    pub same_sense: bool,
}

/// Parsed ORIENTED_EDGE entity.
#[derive(Debug, Clone, Copy)]
pub struct StepOrientedEdge {
    /// The underlying edge entity ID.
    pub edge_id: u64,
    /// Whether the loop walks the edge in its own direction.
    pub orientation: bool,
}

/// A parsed loop entity.
#[derive(Debug, Clone)]
pub enum StepLoop {
    /// EDGE_LOOP: oriented edges in loop order.
    Edges(Vec<StepOrientedEdge>),
    /// POLY_LOOP: polygon vertices in loop order.
    Polygon(Vec<Point3>),
    /// VERTEX_LOOP: a loop degenerated to one vertex.
    Vertex(Point3),
}

/// Parsed FACE_BOUND / FACE_OUTER_BOUND entity.
#[derive(Debug, Clone, Copy)]
pub struct StepFaceBound {
    /// The loop entity ID.
    pub loop_id: u64,
    /// Whether the loop is used in its own direction.
    pub orientation: bool,
    /// Whether this is an outer bound.
    pub is_outer: bool,
}

/// Parsed ADVANCED_FACE / FACE_SURFACE entity.
#[derive(Debug, Clone)]
pub struct StepFace {
    /// Face bounds (outer and inner loops).
    pub bounds: Vec<StepFaceBound>,
    /// Surface geometry entity ID.
    pub surface_id: u64,
    /// Whether the face normal matches the surface normal.
    pub same_sense: bool,
}

/// A shell reference with the orientation it is used in.
#[derive(Debug, Clone)]
pub struct StepShell {
    /// Face entity IDs.
    pub face_ids: Vec<u64>,
    /// False when the shell is used reversed (ORIENTED_CLOSED_SHELL `.F.`).
    pub orientation: bool,
}

/// A solid (or surface model) body.
#[derive(Debug, Clone)]
pub struct StepSolid {
    /// Entity name, possibly empty.
    pub name: String,
    /// Outer shell followed by any void or additional shells.
    pub shells: Vec<StepShell>,
}

/// Parse a VERTEX_POINT entity into its position.
pub fn parse_vertex_point(file: &StepFile, id: u64) -> Result<Point3, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "VERTEX_POINT" => parse_cartesian_point(file, entity.entity_ref(1)?),
        other => Err(StepError::type_mismatch("VERTEX_POINT", other)),
    }
}

/// Parse an EDGE_CURVE entity.
///
/// STEP syntax: `EDGE_CURVE(name, start, end, geometry, same_sense)`
pub fn parse_edge_curve(file: &StepFile, id: u64) -> Result<StepEdge, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "EDGE_CURVE" => Ok(StepEdge {
            start: parse_vertex_point(file, entity.entity_ref(1)?)?,
            end: parse_vertex_point(file, entity.entity_ref(2)?)?,
            curve_id: entity.entity_ref(3)?,
            same_sense: entity.boolean(4)?,
        }),
        other => Err(StepError::type_mismatch("EDGE_CURVE", other)),
    }
}

/// Parse an ORIENTED_EDGE entity.
///
/// STEP syntax: `ORIENTED_EDGE(name, *, *, edge_element, orientation)`
pub fn parse_oriented_edge(file: &StepFile, id: u64) -> Result<StepOrientedEdge, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "ORIENTED_EDGE" => Ok(StepOrientedEdge {
            edge_id: entity.entity_ref(3)?,
            orientation: entity.boolean(4)?,
        }),
        other => Err(StepError::type_mismatch("ORIENTED_EDGE", other)),
    }
}

/// Parse an EDGE_LOOP, POLY_LOOP or VERTEX_LOOP entity.
pub fn parse_loop(file: &StepFile, id: u64) -> Result<StepLoop, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "EDGE_LOOP" => {
            let edges = entity
                .entity_ref_list(1)?
                .into_iter()
                .map(|e| parse_oriented_edge(file, e))
                .collect::<Result<Vec<_>, _>>()?;
            if edges.is_empty() {
                return Err(StepError::InvalidTopology(format!("edge loop #{id} is empty")));
            }
            Ok(StepLoop::Edges(edges))
        }
        "POLY_LOOP" => {
            let points = entity
                .entity_ref_list(1)?
                .into_iter()
                .map(|p| parse_cartesian_point(file, p))
                .collect::<Result<Vec<_>, _>>()?;
            if points.len() < 3 {
                return Err(StepError::InvalidTopology(format!(
                    "poly loop #{id} has fewer than three points"
                )));
            }
            Ok(StepLoop::Polygon(points))
        }
        "VERTEX_LOOP" => Ok(StepLoop::Vertex(parse_vertex_point(
            file,
            entity.entity_ref(1)?,
        )?)),
        other => Err(StepError::type_mismatch("EDGE_LOOP", other)),
    }
}

/// Parse a FACE_BOUND or FACE_OUTER_BOUND entity.
///
/// STEP syntax: `FACE_BOUND(name, bound, orientation)`
pub fn parse_face_bound(file: &StepFile, id: u64) -> Result<StepFaceBound, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "FACE_BOUND" | "FACE_OUTER_BOUND" => Ok(StepFaceBound {
            loop_id: entity.entity_ref(1)?,
            orientation: entity.boolean(2)?,
            is_outer: entity.type_name == "FACE_OUTER_BOUND",
        }),
        other => Err(StepError::type_mismatch("FACE_BOUND", other)),
    }
}

/// Parse an ADVANCED_FACE or FACE_SURFACE entity.
///
/// STEP syntax: `ADVANCED_FACE(name, (bounds), face_geometry, same_sense)`
pub fn parse_face(file: &StepFile, id: u64) -> Result<StepFace, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "ADVANCED_FACE" | "FACE_SURFACE" => {
            let bounds = entity
                .entity_ref_list(1)?
                .into_iter()
                .map(|b| parse_face_bound(file, b))
                .collect::<Result<Vec<_>, _>>()?;
            if bounds.is_empty() {
                return Err(StepError::InvalidTopology(format!("face #{id} has no bounds")));
            }
            Ok(StepFace {
                bounds,
                surface_id: entity.entity_ref(2)?,
                same_sense: entity.boolean(3)?,
            })
        }
        other => Err(StepError::type_mismatch("ADVANCED_FACE", other)),
    }
}

/// Parse a CLOSED_SHELL, OPEN_SHELL or ORIENTED_CLOSED_SHELL entity.
pub fn parse_shell(file: &StepFile, id: u64) -> Result<StepShell, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "CLOSED_SHELL" | "OPEN_SHELL" => Ok(StepShell {
            face_ids: entity.entity_ref_list(1)?,
            orientation: true,
        }),
        // ORIENTED_CLOSED_SHELL(name, *, closed_shell_element, orientation)
        "ORIENTED_CLOSED_SHELL" | "ORIENTED_OPEN_SHELL" => {
            let inner = parse_shell(file, entity.entity_ref(2)?)?;
            Ok(StepShell {
                face_ids: inner.face_ids,
                orientation: inner.orientation == entity.boolean(3)?,
            })
        }
        other => Err(StepError::type_mismatch("CLOSED_SHELL", other)),
    }
}

/// Parse a solid body entity.
///
/// Supports `MANIFOLD_SOLID_BREP(name, outer)`,
/// `BREP_WITH_VOIDS(name, outer, (voids))` and
/// `SHELL_BASED_SURFACE_MODEL(name, (shells))`.
pub fn parse_solid(file: &StepFile, id: u64) -> Result<StepSolid, StepError> {
    let entity = file.require(id)?;
    let name = entity.string(0)?.to_string();
    let shells = match entity.type_name.as_str() {
        "MANIFOLD_SOLID_BREP" => vec![parse_shell(file, entity.entity_ref(1)?)?],
        "BREP_WITH_VOIDS" => {
            let mut shells = vec![parse_shell(file, entity.entity_ref(1)?)?];
            for void in entity.entity_ref_list(2)? {
                shells.push(parse_shell(file, void)?);
            }
            shells
        }
        "SHELL_BASED_SURFACE_MODEL" => entity
            .entity_ref_list(1)?
            .into_iter()
            .map(|s| parse_shell(file, s))
            .collect::<Result<Vec<_>, _>>()?,
        other => return Err(StepError::type_mismatch("MANIFOLD_SOLID_BREP", other)),
    };
    Ok(StepSolid { name, shells })
}
