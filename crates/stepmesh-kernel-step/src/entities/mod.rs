//! Decoding of AP203/AP214/AP242 entities from the raw entity graph.
//!
//! Each `parse_*` function takes the file and an entity ID, checks the type
//! name and returns a kernel value. Lengths are scaled to millimetres and
//! angles to radians using the factors stored on the `StepFile`.

pub mod curves;
pub mod geometry;
pub mod surfaces;
pub mod topology;
pub mod units;

pub use curves::parse_curve;
pub use geometry::*;
pub use surfaces::parse_surface;
pub use topology::*;
pub use units::{detect_angle_scale, detect_length_scale};

use crate::error::StepError;
use crate::parser::{StepEntity, StepValue};

/// Helper trait for extracting typed argument values from STEP entities.
pub trait EntityArgs {
    /// Get a required real argument at index.
    fn real(&self, idx: usize) -> Result<f64, StepError>;

    /// Get a string argument at index; unset values read as empty.
    fn string(&self, idx: usize) -> Result<&str, StepError>;

    /// Get a required enum argument at index.
    fn enumeration(&self, idx: usize) -> Result<&str, StepError>;

    /// Get a STEP boolean (`.T.` / `.F.`) at index.
    fn boolean(&self, idx: usize) -> Result<bool, StepError>;

    /// Get a required entity reference at index.
    fn entity_ref(&self, idx: usize) -> Result<u64, StepError>;

    /// Get an optional entity reference at index (`$` reads as `None`).
    fn optional_ref(&self, idx: usize) -> Result<Option<u64>, StepError>;

    /// Get a required list argument at index.
    fn list(&self, idx: usize) -> Result<&[StepValue], StepError>;

    /// Get a list of reals at index.
    fn real_list(&self, idx: usize) -> Result<Vec<f64>, StepError>;

    /// Get a list of entity references at index.
    fn entity_ref_list(&self, idx: usize) -> Result<Vec<u64>, StepError>;
}

impl StepEntity {
    fn arg_error(&self, what: &str, idx: usize) -> StepError {
        StepError::parser(
            Some(self.id),
            format!("expected {what} at arg {idx} in {}", self.type_name),
        )
    }
}

impl EntityArgs for StepEntity {
    fn real(&self, idx: usize) -> Result<f64, StepError> {
        self.args
            .get(idx)
            .and_then(StepValue::as_real)
            .ok_or_else(|| self.arg_error("real", idx))
    }

    fn string(&self, idx: usize) -> Result<&str, StepError> {
        match self.args.get(idx) {
            Some(StepValue::String(s)) => Ok(s),
            Some(StepValue::Null) => Ok(""),
            _ => Err(self.arg_error("string", idx)),
        }
    }

    fn enumeration(&self, idx: usize) -> Result<&str, StepError> {
        self.args
            .get(idx)
            .and_then(StepValue::as_enum)
            .ok_or_else(|| self.arg_error("enum", idx))
    }

    fn boolean(&self, idx: usize) -> Result<bool, StepError> {
        match self.enumeration(idx)? {
            "T" | "TRUE" => Ok(true),
            "F" | "FALSE" => Ok(false),
            _ => Err(self.arg_error("boolean", idx)),
        }
    }

    fn entity_ref(&self, idx: usize) -> Result<u64, StepError> {
        self.args
            .get(idx)
            .and_then(StepValue::as_entity_ref)
            .ok_or_else(|| self.arg_error("entity ref", idx))
    }

    fn optional_ref(&self, idx: usize) -> Result<Option<u64>, StepError> {
        match self.args.get(idx) {
            None | Some(StepValue::Null) => Ok(None),
            Some(v) => v
                .as_entity_ref()
                .map(Some)
                .ok_or_else(|| self.arg_error("entity ref", idx)),
        }
    }

    fn list(&self, idx: usize) -> Result<&[StepValue], StepError> {
        self.args
            .get(idx)
            .and_then(StepValue::as_list)
            .ok_or_else(|| self.arg_error("list", idx))
    }

    fn real_list(&self, idx: usize) -> Result<Vec<f64>, StepError> {
        self.list(idx)?
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_real().ok_or_else(|| {
                    StepError::parser(
                        Some(self.id),
                        format!("expected real at list[{i}] in arg {idx}"),
                    )
                })
            })
            .collect()
    }

    fn entity_ref_list(&self, idx: usize) -> Result<Vec<u64>, StepError> {
        self.list(idx)?
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_entity_ref().ok_or_else(|| {
                    StepError::parser(
                        Some(self.id),
                        format!("expected entity ref at list[{i}] in arg {idx}"),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::parser::{Parser, StepFile};

    /// Parse a DATA section body wrapped in a minimal Part 21 envelope.
    pub fn parse_data(data: &str) -> StepFile {
        let input = format!(
            "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n"
        );
        Parser::parse(input.as_bytes()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::parse_data;
    use super::*;

    #[test]
    fn test_arg_accessors() {
        let file = parse_data("#1 = THING('n', 2.5, .T., #4, $, (1, 2.0), (#5, #6));");
        let e = file.require(1).unwrap();
        assert_eq!(e.string(0).unwrap(), "n");
        assert_eq!(e.real(1).unwrap(), 2.5);
        assert!(e.boolean(2).unwrap());
        assert_eq!(e.entity_ref(3).unwrap(), 4);
        assert_eq!(e.optional_ref(4).unwrap(), None);
        assert_eq!(e.string(4).unwrap(), "");
        assert_eq!(e.real_list(5).unwrap(), vec![1.0, 2.0]);
        assert_eq!(e.entity_ref_list(6).unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_arg_errors_name_entity() {
        let file = parse_data("#8 = THING('n');");
        let e = file.require(8).unwrap();
        let err = e.real(0).unwrap_err();
        assert!(matches!(err, StepError::Parser { entity_id: Some(8), .. }));
        assert!(e.entity_ref(3).is_err());
        assert!(e.boolean(0).is_err());
    }
}
