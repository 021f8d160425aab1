//! Binary STL export.

use std::path::Path;

use stepmesh_kernel_tessellate::TriangleMesh;

use super::ExportError;

const HEADER: &[u8; 80] =
    b"stepmesh binary STL export                                                      ";

/// Serialize meshes as one binary STL body.
///
/// STL has no notion of separate objects, so every mesh lands in the same
/// triangle list. Facet normals are recomputed from the winding.
pub fn to_stl_bytes<'a>(
    meshes: impl IntoIterator<Item = &'a TriangleMesh>,
) -> Result<Vec<u8>, ExportError> {
    let meshes: Vec<&TriangleMesh> = meshes.into_iter().collect();
    let num_triangles: usize = meshes.iter().map(|m| m.num_triangles()).sum();
    if num_triangles == 0 {
        return Err(ExportError::EmptyGeometry);
    }
    let count = u32::try_from(num_triangles).map_err(|_| ExportError::TooLarge(num_triangles))?;

    let mut data = Vec::with_capacity(84 + num_triangles * 50);
    data.extend_from_slice(HEADER);
    data.extend_from_slice(&count.to_le_bytes());

    for mesh in meshes {
        let vertices = &mesh.vertices;
        for tri in mesh.indices.chunks_exact(3) {
            let vertex = |i: u32| {
                let i = i as usize * 3;
                [vertices[i], vertices[i + 1], vertices[i + 2]]
            };
            let (v0, v1, v2) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));

            let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
            let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
            let nx = e1[1] * e2[2] - e1[2] * e2[1];
            let ny = e1[2] * e2[0] - e1[0] * e2[2];
            let nz = e1[0] * e2[1] - e1[1] * e2[0];
            let len = (nx * nx + ny * ny + nz * nz).sqrt();
            let n = if len > 1e-10 {
                [nx / len, ny / len, nz / len]
            } else {
                [0.0, 0.0, 1.0]
            };

            for v in [n, v0, v1, v2] {
                data.extend_from_slice(&v[0].to_le_bytes());
                data.extend_from_slice(&v[1].to_le_bytes());
                data.extend_from_slice(&v[2].to_le_bytes());
            }
            // Attribute byte count
            data.extend_from_slice(&0u16.to_le_bytes());
        }
    }

    Ok(data)
}

/// Write meshes to a binary STL file.
pub fn export_stl<'a>(
    meshes: impl IntoIterator<Item = &'a TriangleMesh>,
    path: impl AsRef<Path>,
) -> Result<usize, ExportError> {
    let bytes = to_stl_bytes(meshes)?;
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        }
    }

    fn f32_at(data: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_layout() {
        let data = to_stl_bytes([&triangle()]).unwrap();
        assert_eq!(data.len(), 84 + 50);
        assert_eq!(u32::from_le_bytes([data[80], data[81], data[82], data[83]]), 1);
        // Facet normal is +Z for a counter-clockwise triangle in the XY plane.
        assert_eq!(f32_at(&data, 84 + 8), 1.0);
        // Second vertex x.
        assert_eq!(f32_at(&data, 84 + 24), 1.0);
    }

    #[test]
    fn test_meshes_are_concatenated() {
        let a = triangle();
        let b = triangle();
        let data = to_stl_bytes([&a, &b]).unwrap();
        assert_eq!(data.len(), 84 + 2 * 50);
        assert_eq!(u32::from_le_bytes([data[80], data[81], data[82], data[83]]), 2);
    }

    #[test]
    fn test_empty_rejected() {
        let err = to_stl_bytes([&TriangleMesh::new()]).unwrap_err();
        assert!(matches!(err, ExportError::EmptyGeometry));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.stl");
        let written = export_stl([&triangle()], &path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, written);
    }
}
