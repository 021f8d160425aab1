//! Edge curve entities: lines, conics, polylines and surface-curve wrappers.

use super::{parse_axis_placement, parse_cartesian_point, parse_vector, EntityArgs};
use crate::error::StepError;
use crate::parser::StepFile;
use stepmesh_kernel_geom::{Circle3d, Curve3d, Ellipse3d, Line3d, Polyline3d};

/// Parse a LINE entity.
///
/// STEP syntax: `LINE(name, point, vector)`
pub fn parse_line(file: &StepFile, id: u64) -> Result<Line3d, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "LINE" => {
            let origin = parse_cartesian_point(file, entity.entity_ref(1)?)?;
            let (dir, magnitude) = parse_vector(file, entity.entity_ref(2)?)?;
            // Some exporters write zero magnitudes; the direction is what matters.
            let speed = if magnitude > 0.0 { magnitude } else { 1.0 };
            Ok(Line3d {
                origin,
                direction: dir.into_inner() * speed,
            })
        }
        other => Err(StepError::type_mismatch("LINE", other)),
    }
}

/// Parse a CIRCLE entity.
///
/// STEP syntax: `CIRCLE(name, position, radius)`
pub fn parse_circle(file: &StepFile, id: u64) -> Result<Circle3d, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "CIRCLE" => {
            let placement = parse_axis_placement(file, entity.entity_ref(1)?)?;
            let radius = entity.real(2)? * file.length_scale;
            if radius <= 0.0 {
                return Err(StepError::InvalidGeometry(format!(
                    "circle #{id} has non-positive radius {radius}"
                )));
            }
            Ok(Circle3d::new(
                placement.location,
                &placement.z_axis(),
                &placement.x_axis(),
                radius,
            ))
        }
        other => Err(StepError::type_mismatch("CIRCLE", other)),
    }
}

/// Parse an ELLIPSE entity.
///
/// STEP syntax: `ELLIPSE(name, position, semi_axis_1, semi_axis_2)`
pub fn parse_ellipse(file: &StepFile, id: u64) -> Result<Ellipse3d, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "ELLIPSE" => {
            let placement = parse_axis_placement(file, entity.entity_ref(1)?)?;
            let a = entity.real(2)? * file.length_scale;
            let b = entity.real(3)? * file.length_scale;
            if a <= 0.0 || b <= 0.0 {
                return Err(StepError::InvalidGeometry(format!(
                    "ellipse #{id} has non-positive semi-axis"
                )));
            }
            Ok(Ellipse3d {
                center: placement.location,
                semi_axis_1: a,
                semi_axis_2: b,
                x_dir: placement.x_axis(),
                y_dir: placement.y_axis(),
            })
        }
        other => Err(StepError::type_mismatch("ELLIPSE", other)),
    }
}

/// Parse a POLYLINE entity.
///
/// STEP syntax: `POLYLINE(name, (points))`
pub fn parse_polyline(file: &StepFile, id: u64) -> Result<Polyline3d, StepError> {
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "POLYLINE" => {
            let points = entity
                .entity_ref_list(1)?
                .into_iter()
                .map(|p| parse_cartesian_point(file, p))
                .collect::<Result<Vec<_>, _>>()?;
            if points.len() < 2 {
                return Err(StepError::InvalidGeometry(format!(
                    "polyline #{id} has fewer than two points"
                )));
            }
            Ok(Polyline3d { points })
        }
        other => Err(StepError::type_mismatch("POLYLINE", other)),
    }
}

/// Parse any supported edge curve.
///
/// `SURFACE_CURVE`, `SEAM_CURVE` and `TRIMMED_CURVE` are unwrapped to their
/// 3D basis curve; trimming comes from the edge vertices.
pub fn parse_curve(file: &StepFile, id: u64) -> Result<Box<dyn Curve3d>, StepError> {
    parse_curve_depth(file, id, 0)
}

fn parse_curve_depth(
    file: &StepFile,
    id: u64,
    depth: usize,
) -> Result<Box<dyn Curve3d>, StepError> {
    if depth > 8 {
        return Err(StepError::Cycle(id));
    }
    let entity = file.require(id)?;
    match entity.type_name.as_str() {
        "LINE" => Ok(Box::new(parse_line(file, id)?)),
        "CIRCLE" => Ok(Box::new(parse_circle(file, id)?)),
        "ELLIPSE" => Ok(Box::new(parse_ellipse(file, id)?)),
        "POLYLINE" => Ok(Box::new(parse_polyline(file, id)?)),
        "SURFACE_CURVE" | "SEAM_CURVE" | "TRIMMED_CURVE" => {
            parse_curve_depth(file, entity.entity_ref(1)?, depth + 1)
        }
        other => Err(StepError::UnsupportedEntity(format!("{other} (#{id})"))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::parse_data;
    use super::*;
    use approx::assert_relative_eq;
    use stepmesh_kernel_geom::CurveKind;
    use stepmesh_kernel_math::Point3;

    const FRAME: &str = "#1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));\n\
                         #2 = DIRECTION('', (0.0, 0.0, 1.0));\n\
                         #3 = DIRECTION('', (1.0, 0.0, 0.0));\n\
                         #4 = AXIS2_PLACEMENT_3D('', #1, #2, #3);\n";

    #[test]
    fn test_parse_circle() {
        let file = parse_data(&format!("{FRAME}#10 = CIRCLE('', #4, 5.0);"));
        let c = parse_circle(&file, 10).unwrap();
        assert_relative_eq!(c.radius, 5.0);
        let p = c.evaluate(std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(p, Point3::new(0.0, 5.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_parse_line_through_surface_curve() {
        let file = parse_data(&format!(
            "{FRAME}#5 = VECTOR('', #3, 1.0);\n\
             #6 = LINE('', #1, #5);\n\
             #7 = SURFACE_CURVE('', #6, (), .CURVE_3D.);"
        ));
        let curve = parse_curve(&file, 7).unwrap();
        assert_eq!(curve.curve_type(), CurveKind::Line);
        assert_relative_eq!(curve.evaluate(2.0), Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_parse_ellipse_and_polyline() {
        let file = parse_data(&format!(
            "{FRAME}#10 = ELLIPSE('', #4, 4.0, 2.0);\n\
             #11 = CARTESIAN_POINT('', (1.0, 1.0, 0.0));\n\
             #12 = POLYLINE('', (#1, #11));"
        ));
        let e = parse_ellipse(&file, 10).unwrap();
        assert_relative_eq!(e.evaluate(0.0), Point3::new(4.0, 0.0, 0.0), epsilon = 1e-12);
        let p = parse_polyline(&file, 12).unwrap();
        assert_eq!(p.points.len(), 2);
    }

    #[test]
    fn test_unsupported_curve() {
        let file = parse_data(
            "#1 = B_SPLINE_CURVE_WITH_KNOTS('', 3, (), .UNSPECIFIED., .F., .F., (), (), .UNSPECIFIED.);",
        );
        let err = parse_curve(&file, 1).unwrap_err();
        assert!(matches!(err, StepError::UnsupportedEntity(ref s) if s.contains("B_SPLINE")));
    }
}
