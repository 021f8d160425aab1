//! Length and plane angle unit detection.
//!
//! Units are declared as complex instances such as
//! `( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) )` or, for
//! imperial files and degrees, a `CONVERSION_BASED_UNIT` pointing at a
//! measure of an SI unit. Output meshes are always in millimetres and
//! angles are handled in radians.

use super::EntityArgs;
use crate::error::StepError;
use crate::parser::{StepEntity, StepFile};

/// Millimetres per metre.
const MM_PER_METRE: f64 = 1000.0;

/// Determine the factor converting the file's length unit to millimetres.
///
/// Uses the lowest-numbered `LENGTH_UNIT` instance. Files without any unit
/// declaration are taken to be in millimetres.
pub fn detect_length_scale(file: &StepFile) -> Result<f64, StepError> {
    match file.complex_with_part("LENGTH_UNIT").first() {
        Some(unit) => unit_scale(file, unit, &LENGTH, 0),
        None => Ok(1.0),
    }
}

/// Determine the factor converting the file's plane angle unit to radians.
///
/// Files without a `PLANE_ANGLE_UNIT` are taken to be in radians.
pub fn detect_angle_scale(file: &StepFile) -> Result<f64, StepError> {
    match file.complex_with_part("PLANE_ANGLE_UNIT").first() {
        Some(unit) => unit_scale(file, unit, &PLANE_ANGLE, 0),
        None => Ok(1.0),
    }
}

/// An SI base unit and the factor to the kernel's working unit.
struct BaseUnit {
    si_name: &'static str,
    factor: f64,
}

const LENGTH: BaseUnit = BaseUnit {
    si_name: "METRE",
    factor: MM_PER_METRE,
};

const PLANE_ANGLE: BaseUnit = BaseUnit {
    si_name: "RADIAN",
    factor: 1.0,
};

fn unit_scale(
    file: &StepFile,
    unit: &StepEntity,
    base: &BaseUnit,
    depth: usize,
) -> Result<f64, StepError> {
    if depth > 4 {
        return Err(StepError::Cycle(unit.id));
    }

    if let Some(si) = unit.part("SI_UNIT") {
        // SI_UNIT(prefix, name); NAMED_UNIT's dimensions are derived.
        let name = si.enumeration(1)?;
        if name != base.si_name {
            return Err(StepError::UnsupportedEntity(format!(
                "unit {name} in #{}, expected {}",
                unit.id, base.si_name
            )));
        }
        let prefix = if si.args.first().is_some_and(|v| v.is_null()) {
            1.0
        } else {
            si_prefix(si.enumeration(0)?).ok_or_else(|| {
                StepError::parser(Some(unit.id), "unknown SI prefix")
            })?
        };
        return Ok(prefix * base.factor);
    }

    if let Some(conv) = unit.part("CONVERSION_BASED_UNIT") {
        // CONVERSION_BASED_UNIT(name, conversion_factor)
        let measure = file.require(conv.entity_ref(1)?)?;
        let measure = measure
            .part("MEASURE_WITH_UNIT")
            .unwrap_or_else(|| measure.clone());
        let value = measure.real(0)?;
        let referenced = file.require(measure.entity_ref(1)?)?;
        return Ok(value * unit_scale(file, referenced, base, depth + 1)?);
    }

    Err(StepError::UnsupportedEntity(format!(
        "unit #{} has no SI or conversion-based part",
        unit.id
    )))
}

fn si_prefix(prefix: &str) -> Option<f64> {
    Some(match prefix {
        "EXA" => 1e18,
        "PETA" => 1e15,
        "TERA" => 1e12,
        "GIGA" => 1e9,
        "MEGA" => 1e6,
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        "NANO" => 1e-9,
        "PICO" => 1e-12,
        "FEMTO" => 1e-15,
        "ATTO" => 1e-18,
        _ => return None,
    })
}
