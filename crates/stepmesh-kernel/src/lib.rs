#![warn(missing_docs)]

//! STEP to triangle mesh kernel facade for stepmesh.
//!
//! Provides the [`Model`] type: the solids read from one STEP file, which
//! can be tessellated under linear/angular tolerances and exported as
//! binary STL or GLB.
//!
//! # Example
//!
//! ```no_run
//! use stepmesh_kernel::{export::MeshFormat, Model, TessellationParams};
//!
//! let model = Model::from_step("bracket.step").unwrap();
//! let meshes = model.tessellate(&TessellationParams::default()).unwrap();
//! let stl = stepmesh_kernel::export::to_bytes(&meshes, MeshFormat::Stl).unwrap();
//! std::fs::write("bracket.stl", stl).unwrap();
//! ```

pub use stepmesh_kernel_geom;
pub use stepmesh_kernel_math;
pub use stepmesh_kernel_step;
pub use stepmesh_kernel_tessellate;

pub mod export;

use std::path::Path;

use stepmesh_kernel_geom::BRepSolid;
use stepmesh_kernel_step::{read_step, read_step_from_buffer, StepError};
use thiserror::Error;

pub use export::{ExportError, MeshFormat};
pub use stepmesh_kernel_tessellate::{
    tessellate_solid, TessellationError, TessellationParams, TriangleMesh,
};

/// Errors returned by kernel operations.
#[derive(Error, Debug)]
pub enum KernelError {
    /// The STEP file could not be read.
    #[error("STEP import failed: {0}")]
    Step(#[from] StepError),
    /// A solid could not be tessellated.
    #[error("tessellation of solid '{solid}' failed: {source}")]
    Tessellation {
        /// Name (or index) of the failing solid.
        solid: String,
        /// Underlying error.
        #[source]
        source: TessellationError,
    },
    /// The result could not be encoded.
    #[error(transparent)]
    Export(#[from] ExportError),
    /// Tessellation produced no triangles at all.
    #[error("model produced an empty mesh")]
    EmptyMesh,
}

/// A tessellated solid, labelled with its name from the STEP file.
#[derive(Debug, Clone)]
pub struct NamedMesh {
    /// Solid name, possibly empty.
    pub name: String,
    /// The triangles.
    pub mesh: TriangleMesh,
}

/// Totals reported after an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    /// Number of solids written.
    pub solids: usize,
    /// Number of triangles written.
    pub triangles: usize,
    /// Size of the written file in bytes.
    pub bytes: usize,
}

/// The B-rep solids of one STEP file.
#[derive(Debug, Clone)]
pub struct Model {
    solids: Vec<BRepSolid>,
}

impl Model {
    /// Read every solid from a STEP file.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if the file cannot be read, parsed, or contains no solids.
    pub fn from_step(path: impl AsRef<Path>) -> Result<Self, KernelError> {
        Ok(Self {
            solids: read_step(path)?,
        })
    }

    /// Read every solid from STEP data in memory.
    pub fn from_step_buffer(data: &[u8]) -> Result<Self, KernelError> {
        Ok(Self {
            solids: read_step_from_buffer(data)?,
        })
    }

    /// The solids, in file order.
    pub fn solids(&self) -> &[BRepSolid] {
        &self.solids
    }

    /// Number of solids.
    pub fn num_solids(&self) -> usize {
        self.solids.len()
    }

    /// Tessellate every solid.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters, on the first face that cannot be
    /// triangulated, or when the whole model yields no triangles.
    pub fn tessellate(&self, params: &TessellationParams) -> Result<Vec<NamedMesh>, KernelError> {
        let meshes = self
            .solids
            .iter()
            .enumerate()
            .map(|(i, solid)| {
                let mesh = tessellate_solid(solid, params).map_err(|source| {
                    KernelError::Tessellation {
                        solid: if solid.name.is_empty() {
                            format!("#{i}")
                        } else {
                            solid.name.clone()
                        },
                        source,
                    }
                })?;
                Ok(NamedMesh {
                    name: solid.name.clone(),
                    mesh,
                })
            })
            .collect::<Result<Vec<_>, KernelError>>()?;

        if meshes.iter().all(|m| m.mesh.num_triangles() == 0) {
            return Err(KernelError::EmptyMesh);
        }
        Ok(meshes)
    }

    /// Tessellate and write the model to `path` in `format`.
    pub fn export(
        &self,
        params: &TessellationParams,
        format: MeshFormat,
        path: impl AsRef<Path>,
    ) -> Result<ExportSummary, KernelError> {
        let meshes = self.tessellate(params)?;
        let bytes = export::to_bytes(&meshes, format)?;
        std::fs::write(path, &bytes).map_err(ExportError::from)?;
        Ok(ExportSummary {
            solids: meshes.len(),
            triangles: meshes.iter().map(|m| m.mesh.num_triangles()).sum(),
            bytes: bytes.len(),
        })
    }
}
