//! Mesh export formats.

pub mod glb;
pub mod stl;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NamedMesh;

/// Errors raised while encoding a mesh.
#[derive(Error, Debug)]
pub enum ExportError {
    /// An I/O error occurred while writing the output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The geometry is empty (no triangles).
    #[error("Empty geometry")]
    EmptyGeometry,
    /// The mesh does not fit the format's size fields.
    #[error("mesh too large for export: {0} elements")]
    TooLarge(usize),
    /// The glTF document could not be encoded.
    #[error("glTF encoding failed: {0}")]
    Gltf(String),
}

/// Output format of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    /// Binary STL.
    #[default]
    Stl,
    /// Binary glTF 2.0.
    Glb,
}

impl MeshFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Glb => "glb",
        }
    }

    /// MIME type used when serving the file.
    pub fn content_type(self) -> &'static str {
        match self {
            MeshFormat::Stl => "application/octet-stream",
            MeshFormat::Glb => "model/gltf-binary",
        }
    }

    /// Format whose extension matches `ext` (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "stl" => Some(MeshFormat::Stl),
            "glb" => Some(MeshFormat::Glb),
            _ => None,
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MeshFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown mesh format '{s}'"))
    }
}

/// Encode named meshes in the requested format.
pub fn to_bytes(meshes: &[NamedMesh], format: MeshFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        MeshFormat::Stl => stl::to_stl_bytes(meshes.iter().map(|m| &m.mesh)),
        MeshFormat::Glb => glb::to_glb_bytes(meshes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("STL".parse::<MeshFormat>().unwrap(), MeshFormat::Stl);
        assert_eq!("glb".parse::<MeshFormat>().unwrap(), MeshFormat::Glb);
        assert!("obj".parse::<MeshFormat>().is_err());
        assert_eq!(MeshFormat::default(), MeshFormat::Stl);
    }

    #[test]
    fn test_format_serde() {
        let f: MeshFormat = serde_json::from_str("\"glb\"").unwrap();
        assert_eq!(f, MeshFormat::Glb);
        assert_eq!(serde_json::to_string(&MeshFormat::Stl).unwrap(), "\"stl\"");
        assert_eq!(MeshFormat::Glb.content_type(), "model/gltf-binary");
    }
}
