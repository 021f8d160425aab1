//! Upload filename checks, run before anything is written to disk.

use std::fmt;

use thiserror::Error;

/// Accepted STEP file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// `.stp`
    Stp,
    /// `.step`
    Step,
}

impl Extension {
    /// Lowercase extension text, without the dot.
    pub fn as_str(self) -> &'static str {
        match self {
            Extension::Stp => "stp",
            Extension::Step => "step",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an upload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No file provided")]
    MissingFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file type. Only .stp and .step files are allowed")]
    InvalidExtension,
}

/// Check the declared filename of an upload.
///
/// The extension is the case-insensitive suffix after the last `.`.
pub fn validate(declared_filename: Option<&str>) -> Result<Extension, ValidationError> {
    let name = declared_filename.ok_or(ValidationError::MissingFile)?;
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    let (_, ext) = name
        .rsplit_once('.')
        .ok_or(ValidationError::InvalidExtension)?;
    match ext.to_ascii_lowercase().as_str() {
        "stp" => Ok(Extension::Stp),
        "step" => Ok(Extension::Step),
        _ => Err(ValidationError::InvalidExtension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_step_extensions() {
        assert_eq!(validate(Some("part.stp")), Ok(Extension::Stp));
        assert_eq!(validate(Some("part.step")), Ok(Extension::Step));
        assert_eq!(validate(Some("Part.STEP")), Ok(Extension::Step));
        assert_eq!(validate(Some("archive.tar.Stp")), Ok(Extension::Stp));
    }

    #[test]
    fn test_missing_and_empty() {
        assert_eq!(validate(None), Err(ValidationError::MissingFile));
        assert_eq!(validate(Some("")), Err(ValidationError::EmptyFilename));
        assert_eq!(validate(Some("   ")), Err(ValidationError::EmptyFilename));
    }

    #[test]
    fn test_rejects_other_extensions() {
        for name in ["part.stl", "part", "step", "part.step.txt", "part.", ".stpx"] {
            assert_eq!(
                validate(Some(name)),
                Err(ValidationError::InvalidExtension),
                "{name}"
            );
        }
    }
}
