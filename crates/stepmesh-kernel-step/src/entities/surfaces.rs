//! Surface entities: planes and the elementary analytic surfaces.

use super::{parse_axis_placement, AxisPlacement, EntityArgs};
use crate::error::StepError;
use crate::parser::StepFile;
use stepmesh_kernel_geom::{
    ConeSurface, CylinderSurface, Plane, SphereSurface, Surface, TorusSurface,
};

fn positive(value: f64, what: &str, id: u64) -> Result<f64, StepError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(StepError::InvalidGeometry(format!(
            "{what} of #{id} must be positive, got {value}"
        )))
    }
}

fn placement_at(file: &StepFile, id: u64, idx: usize) -> Result<AxisPlacement, StepError> {
    let entity = file.require(id)?;
    parse_axis_placement(file, entity.entity_ref(idx)?)
}

/// Parse a PLANE entity.
///
/// STEP syntax: `PLANE(name, position)`
pub fn parse_plane(file: &StepFile, id: u64) -> Result<Plane, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "PLANE" => {
            let p = placement_at(file, id, 1)?;
            Ok(Plane::new(
                p.location,
                p.x_axis().into_inner(),
                p.y_axis().into_inner(),
            ))
        }
        other => Err(StepError::type_mismatch("PLANE", other)),
    }
}

/// Parse a CYLINDRICAL_SURFACE entity.
///
/// STEP syntax: `CYLINDRICAL_SURFACE(name, position, radius)`
pub fn parse_cylinder(file: &StepFile, id: u64) -> Result<CylinderSurface, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "CYLINDRICAL_SURFACE" => {
            let p = placement_at(file, id, 1)?;
            let radius = positive(entity.real(2)? * file.length_scale, "radius", id)?;
            Ok(CylinderSurface {
                center: p.location,
                axis: p.z_axis(),
                ref_dir: p.x_axis(),
                radius,
            })
        }
        other => Err(StepError::type_mismatch("CYLINDRICAL_SURFACE", other)),
    }
}

/// Parse a CONICAL_SURFACE entity.
///
/// STEP syntax: `CONICAL_SURFACE(name, position, radius, semi_angle)`.
/// The radius is measured at the placement origin and may be zero (apex).
pub fn parse_cone(file: &StepFile, id: u64) -> Result<ConeSurface, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "CONICAL_SURFACE" => {
            let p = placement_at(file, id, 1)?;
            let radius = entity.real(2)? * file.length_scale;
            let half_angle = entity.real(3)? * file.angle_scale;
            if radius < 0.0 {
                return Err(StepError::InvalidGeometry(format!(
                    "radius of #{id} must not be negative"
                )));
            }
            if !(half_angle > 0.0 && half_angle < std::f64::consts::FRAC_PI_2) {
                return Err(StepError::InvalidGeometry(format!(
                    "semi-angle of #{id} out of range: {half_angle}"
                )));
            }
            Ok(ConeSurface {
                origin: p.location,
                axis: p.z_axis(),
                ref_dir: p.x_axis(),
                radius,
                half_angle,
            })
        }
        other => Err(StepError::type_mismatch("CONICAL_SURFACE", other)),
    }
}

/// Parse a SPHERICAL_SURFACE entity.
///
/// STEP syntax: `SPHERICAL_SURFACE(name, position, radius)`
pub fn parse_sphere(file: &StepFile, id: u64) -> Result<SphereSurface, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "SPHERICAL_SURFACE" => {
            let p = placement_at(file, id, 1)?;
            let radius = positive(entity.real(2)? * file.length_scale, "radius", id)?;
            Ok(SphereSurface {
                center: p.location,
                radius,
                ref_dir: p.x_axis(),
                axis: p.z_axis(),
            })
        }
        other => Err(StepError::type_mismatch("SPHERICAL_SURFACE", other)),
    }
}

/// Parse a TOROIDAL_SURFACE entity.
///
/// STEP syntax: `TOROIDAL_SURFACE(name, position, major_radius, minor_radius)`
pub fn parse_torus(file: &StepFile, id: u64) -> Result<TorusSurface, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "TOROIDAL_SURFACE" => {
            let p = placement_at(file, id, 1)?;
            let major = positive(entity.real(2)? * file.length_scale, "major radius", id)?;
            let minor = positive(entity.real(3)? * file.length_scale, "minor radius", id)?;
            Ok(TorusSurface {
                center: p.location,
                axis: p.z_axis(),
                ref_dir: p.x_axis(),
                major_radius: major,
                minor_radius: minor,
            })
        }
        other => Err(StepError::type_mismatch("TOROIDAL_SURFACE", other)),
    }
}

/// Parse any supported surface entity.
pub fn parse_surface(file: &StepFile, id: u64) -> Result<Box<dyn Surface>, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "PLANE" => Ok(Box::new(parse_plane(file, id)?)),
        "CYLINDRICAL_SURFACE" => Ok(Box::new(parse_cylinder(file, id)?)),
        "CONICAL_SURFACE" => Ok(Box::new(parse_cone(file, id)?)),
        "SPHERICAL_SURFACE" => Ok(Box::new(parse_sphere(file, id)?)),
        "TOROIDAL_SURFACE" => Ok(Box::new(parse_torus(file, id)?)),
        other => Err(StepError::UnsupportedEntity(format!("{other} (#{id})"))),
    }
}
