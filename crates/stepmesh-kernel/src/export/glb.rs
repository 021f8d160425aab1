//! Binary glTF 2.0 (GLB) export.
//!
//! Each solid becomes its own mesh and node so viewers keep the parts
//! apart. Positions and normals are interleaved per mesh in a single
//! binary buffer.

use std::borrow::Cow;

use gltf::binary::{Glb, Header};
use serde_json::{json, Value};

use super::ExportError;
use crate::NamedMesh;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;

fn pad_to_four(buf: &mut Vec<u8>, fill: u8) {
    while buf.len() % 4 != 0 {
        buf.push(fill);
    }
}

fn bounds(vertices: &[f32]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for v in vertices.chunks_exact(3) {
        for k in 0..3 {
            min[k] = min[k].min(v[k]);
            max[k] = max[k].max(v[k]);
        }
    }
    (min, max)
}

/// Serialize named meshes as a GLB file.
pub fn to_glb_bytes(meshes: &[NamedMesh]) -> Result<Vec<u8>, ExportError> {
    let meshes: Vec<&NamedMesh> = meshes
        .iter()
        .filter(|m| m.mesh.num_triangles() > 0)
        .collect();
    if meshes.is_empty() {
        return Err(ExportError::EmptyGeometry);
    }

    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views: Vec<Value> = Vec::new();
    let mut accessors: Vec<Value> = Vec::new();
    let mut gltf_meshes: Vec<Value> = Vec::new();
    let mut nodes: Vec<Value> = Vec::new();

    for (i, named) in meshes.iter().enumerate() {
        let mesh = &named.mesh;
        let name = if named.name.is_empty() {
            format!("solid_{i}")
        } else {
            named.name.clone()
        };

        let vertex_offset = bin.len();
        for f in &mesh.vertices {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        let normal_offset = bin.len();
        for f in &mesh.normals {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        let index_offset = bin.len();
        for idx in &mesh.indices {
            bin.extend_from_slice(&idx.to_le_bytes());
        }

        let view = buffer_views.len();
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": vertex_offset,
            "byteLength": normal_offset - vertex_offset,
            "target": ARRAY_BUFFER,
        }));
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": normal_offset,
            "byteLength": index_offset - normal_offset,
            "target": ARRAY_BUFFER,
        }));
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": index_offset,
            "byteLength": bin.len() - index_offset,
            "target": ELEMENT_ARRAY_BUFFER,
        }));

        let (min, max) = bounds(&mesh.vertices);
        let accessor = accessors.len();
        accessors.push(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": mesh.num_vertices(),
            "type": "VEC3",
            "min": min,
            "max": max,
        }));
        accessors.push(json!({
            "bufferView": view + 1,
            "componentType": FLOAT,
            "count": mesh.normals.len() / 3,
            "type": "VEC3",
        }));
        accessors.push(json!({
            "bufferView": view + 2,
            "componentType": UNSIGNED_INT,
            "count": mesh.indices.len(),
            "type": "SCALAR",
        }));

        gltf_meshes.push(json!({
            "name": name,
            "primitives": [{
                "attributes": { "POSITION": accessor, "NORMAL": accessor + 1 },
                "indices": accessor + 2,
                "mode": 4,
            }],
        }));
        nodes.push(json!({ "name": name, "mesh": i }));
    }

    let root = json!({
        "asset": { "version": "2.0", "generator": "stepmesh" },
        "scene": 0,
        "scenes": [{ "nodes": (0..nodes.len()).collect::<Vec<_>>() }],
        "nodes": nodes,
        "meshes": gltf_meshes,
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }],
    });

    let mut json_bytes =
        serde_json::to_vec(&root).map_err(|e| ExportError::Gltf(e.to_string()))?;
    pad_to_four(&mut json_bytes, b' ');
    pad_to_four(&mut bin, 0);

    // 12-byte header plus two 8-byte chunk headers.
    let length = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let length = u32::try_from(length).map_err(|_| ExportError::TooLarge(length))?;
    let glb = Glb {
        header: Header {
            magic: *b"glTF",
            version: 2,
            length,
        },
        json: Cow::Owned(json_bytes),
        bin: Some(Cow::Owned(bin)),
    };
    glb.to_vec().map_err(|e| ExportError::Gltf(e.to_string()))
}

/// Write named meshes to a GLB file.
pub fn export_glb(meshes: &[NamedMesh], path: impl AsRef<std::path::Path>) -> Result<usize, ExportError> {
    let bytes = to_glb_bytes(meshes)?;
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepmesh_kernel_tessellate::TriangleMesh;

    fn quad(name: &str, z: f32) -> NamedMesh {
        NamedMesh {
            name: name.to_string(),
            mesh: TriangleMesh {
                vertices: vec![
                    0.0, 0.0, z, 1.0, 0.0, z, 1.0, 1.0, z, 0.0, 1.0, z,
                ],
                indices: vec![0, 1, 2, 0, 2, 3],
                normals: vec![0.0, 0.0, 1.0].repeat(4),
            },
        }
    }

    #[test]
    fn test_glb_parses_back() {
        let bytes = to_glb_bytes(&[quad("base", 0.0), quad("lid", 2.0)]).unwrap();
        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            bytes.len()
        );

        let doc = gltf::Gltf::from_slice(&bytes).unwrap();
        let names: Vec<_> = doc.meshes().map(|m| m.name().unwrap_or("").to_string()).collect();
        assert_eq!(names, ["base", "lid"]);
        assert_eq!(doc.nodes().count(), 2);

        let prim = doc.meshes().next().unwrap().primitives().next().unwrap();
        assert_eq!(prim.indices().unwrap().count(), 6);
        let pos = prim.get(&gltf::Semantic::Positions).unwrap();
        assert_eq!(pos.count(), 4);
    }

    #[test]
    fn test_unnamed_solid_gets_default_name() {
        let bytes = to_glb_bytes(&[quad("", 0.0)]).unwrap();
        let doc = gltf::Gltf::from_slice(&bytes).unwrap();
        assert_eq!(doc.meshes().next().unwrap().name(), Some("solid_0"));
    }

    #[test]
    fn test_empty_rejected() {
        let empty = NamedMesh {
            name: "void".into(),
            mesh: TriangleMesh::new(),
        };
        assert!(matches!(
            to_glb_bytes(&[empty]),
            Err(ExportError::EmptyGeometry)
        ));
    }
}
