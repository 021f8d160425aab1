//! Fundamental geometry entities: points, directions, vectors and placements.

use super::EntityArgs;
use crate::error::StepError;
use crate::parser::StepFile;
use stepmesh_kernel_math::{any_perpendicular, Dir3, Point3, Vec3};

/// Parse a CARTESIAN_POINT entity, scaled to millimetres.
///
/// STEP syntax: `CARTESIAN_POINT(name, (x, y, z))`. Two-coordinate points
/// get `z = 0`.
pub fn parse_cartesian_point(file: &StepFile, id: u64) -> Result<Point3, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "CARTESIAN_POINT" => {
            let c = entity.real_list(1)?;
            let s = file.length_scale;
            match c.as_slice() {
                [x, y, z, ..] => Ok(Point3::new(x * s, y * s, z * s)),
                [x, y] => Ok(Point3::new(x * s, y * s, 0.0)),
                _ => Err(StepError::parser(
                    Some(id),
                    format!("CARTESIAN_POINT needs 3 coordinates, got {}", c.len()),
                )),
            }
        }
        other => Err(StepError::type_mismatch("CARTESIAN_POINT", other)),
    }
}

/// Parse a DIRECTION entity.
///
/// STEP syntax: `DIRECTION(name, (x, y, z))`
pub fn parse_direction(file: &StepFile, id: u64) -> Result<Dir3, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "DIRECTION" => {
            let c = entity.real_list(1)?;
            let v = match c.as_slice() {
                [x, y, z, ..] => Vec3::new(*x, *y, *z),
                [x, y] => Vec3::new(*x, *y, 0.0),
                _ => {
                    return Err(StepError::parser(
                        Some(id),
                        format!("DIRECTION needs 3 components, got {}", c.len()),
                    ));
                }
            };
            Dir3::try_new(v, 1e-15).ok_or_else(|| {
                StepError::InvalidGeometry(format!("zero-length direction #{id}"))
            })
        }
        other => Err(StepError::type_mismatch("DIRECTION", other)),
    }
}

/// Parse a VECTOR entity into its unit direction and scaled magnitude.
///
/// STEP syntax: `VECTOR(name, direction, magnitude)`
pub fn parse_vector(file: &StepFile, id: u64) -> Result<(Dir3, f64), StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "VECTOR" => {
            let dir = parse_direction(file, entity.entity_ref(1)?)?;
            let magnitude = entity.real(2)? * file.length_scale;
            Ok((dir, magnitude))
        }
        other => Err(StepError::type_mismatch("VECTOR", other)),
    }
}

/// Axis placement data (origin + optional directions).
#[derive(Debug, Clone)]
pub struct AxisPlacement {
    /// Location point.
    pub location: Point3,
    /// Z-axis direction (normal).
    pub axis: Option<Dir3>,
    /// X-axis direction (reference).
    pub ref_direction: Option<Dir3>,
}

impl AxisPlacement {
    /// The Z axis, defaulting to +Z.
    pub fn z_axis(&self) -> Dir3 {
        self.axis.unwrap_or_else(Vec3::z_axis)
    }

    /// The X axis: the reference direction made orthogonal to Z, or an
    /// arbitrary perpendicular when absent or parallel to Z.
    pub fn x_axis(&self) -> Dir3 {
        let z = self.z_axis();
        self.ref_direction
            .and_then(|r| {
                let v = r.as_ref() - r.dot(z.as_ref()) * z.as_ref();
                Dir3::try_new(v, 1e-12)
            })
            .unwrap_or_else(|| any_perpendicular(&z))
    }

    /// The Y axis, `Z x X`.
    pub fn y_axis(&self) -> Dir3 {
        Dir3::new_normalize(self.z_axis().cross(self.x_axis().as_ref()))
    }
}

/// Parse an AXIS1_PLACEMENT or AXIS2_PLACEMENT_3D entity.
///
/// STEP syntax: `AXIS1_PLACEMENT(name, location, axis)` and
/// `AXIS2_PLACEMENT_3D(name, location, axis, ref_direction)`.
pub fn parse_axis_placement(file: &StepFile, id: u64) -> Result<AxisPlacement, StepError> {
    let entity = file.require(id)?;
    let has_ref = match entity.type_name.as_str() {
        "AXIS1_PLACEMENT" => false,
        "AXIS2_PLACEMENT_3D" => true,
        other => return Err(StepError::type_mismatch("AXIS2_PLACEMENT_3D", other)),
    };

    let location = parse_cartesian_point(file, entity.entity_ref(1)?)?;
    let axis = entity
        .optional_ref(2)?
        .map(|d| parse_direction(file, d))
        .transpose()?;
    let ref_direction = if has_ref {
        entity
            .optional_ref(3)?
            .map(|d| parse_direction(file, d))
            .transpose()?
    } else {
        None
    };

    Ok(AxisPlacement {
        location,
        axis,
        ref_direction,
    })
}
