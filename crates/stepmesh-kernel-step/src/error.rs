//! Failures of the Part 21 reader, from raw bytes to resolved solids.

use thiserror::Error;

/// Why a STEP file could not be turned into solids.
///
/// Lexer and parser variants describe malformed Part 21 text; the rest
/// describe a well-formed file whose entity graph the reader cannot use.
#[derive(Error, Debug)]
pub enum StepError {
    /// The file could not be read from disk.
    #[error("cannot read STEP file: {0}")]
    Io(#[from] std::io::Error),

    /// A character sequence that is not a Part 21 token.
    #[error("bad token at line {line}, column {col}: {message}")]
    Lexer {
        /// 1-based line of the offending character.
        line: usize,
        /// 1-based column of the offending character.
        col: usize,
        /// What the lexer expected or found.
        message: String,
    },

    /// Tokens that do not form a valid exchange structure.
    #[error("malformed STEP data{}: {message}", entity_id.map(|id| format!(" in #{id}")).unwrap_or_default())]
    Parser {
        /// Instance being parsed when the error was hit.
        entity_id: Option<u64>,
        /// What the parser expected or found.
        message: String,
    },

    /// A `#id` reference with no matching instance in the DATA section.
    #[error("reference to undefined instance #{0}")]
    MissingEntity(u64),

    /// An entity the reader has no geometry for, such as a B-spline surface.
    #[error("unsupported STEP entity {0}")]
    UnsupportedEntity(String),

    /// Geometry that cannot be evaluated: zero radius, zero-length axis.
    #[error("degenerate geometry: {0}")]
    InvalidGeometry(String),

    /// Topology that does not describe a closed face boundary.
    #[error("broken topology: {0}")]
    InvalidTopology(String),

    /// A reference that points at an instance of the wrong kind.
    #[error("{actual} where {expected} was expected")]
    TypeMismatch {
        /// Entity type the reference should resolve to.
        expected: String,
        /// Entity type it actually resolves to.
        actual: String,
    },

    /// Instances that reference each other in a loop.
    #[error("instance #{0} refers back to itself")]
    Cycle(u64),

    /// The file parsed but holds no solid or shell to mesh.
    #[error("STEP file contains no solids")]
    NoSolids,
}

impl StepError {
    pub(crate) fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    pub(crate) fn parser(entity_id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Parser {
            entity_id,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_message_names_instance() {
        let e = StepError::parser(Some(42), "bad arg");
        assert_eq!(e.to_string(), "malformed STEP data in #42: bad arg");
        let e = StepError::parser(None, "bad arg");
        assert_eq!(e.to_string(), "malformed STEP data: bad arg");
    }

    #[test]
    fn test_type_mismatch_message() {
        let e = StepError::type_mismatch("CARTESIAN_POINT", "DIRECTION");
        assert_eq!(
            e.to_string(),
            "DIRECTION where CARTESIAN_POINT was expected"
        );
    }
}
