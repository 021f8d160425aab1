#![warn(missing_docs)]

//! B-rep to triangle mesh tessellation for the stepmesh kernel.
//!
//! Converts B-rep faces into triangle meshes by:
//! 1. Sampling face boundaries under the linear/angular tolerances
//! 2. Lifting the samples into the surface's parameter space
//! 3. Triangulating (ear-clipping for planes, refined Delaunay otherwise)
//! 4. Mapping back to 3D via surface evaluation

mod delaunay;
mod domain;
mod polygon;
mod sample;

use std::f64::consts::FRAC_1_SQRT_2;

use stepmesh_kernel_geom::{BRepSolid, Face, FaceLoop, Surface, SurfaceKind};
use stepmesh_kernel_math::{max_angular_step, signed_area_2d, Point2, Point3, Vec3, MAX_SEGMENTS};
use thiserror::Error;

use crate::domain::{build_domain, Domain, DomainPoint};
use crate::polygon::{point_in_rings, segment_distance_sq, triangulate_polygon};
use crate::sample::sample_loop;

/// Upper bound on interior points generated for one curved face.
const MAX_INTERIOR_POINTS: f64 = 4096.0;

/// Output triangle mesh for rendering and export.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    pub indices: Vec<u32>,
    /// Flat array of vertex normals: `[nx0, ny0, nz0, ...]` (f32). Same length as vertices.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + offset));
    }

    fn push_vertex(&mut self, p: &Point3, n: &Vec3) -> u32 {
        let index = self.num_vertices() as u32;
        self.vertices
            .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        self.normals
            .extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
        index
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while tessellating a solid.
#[derive(Debug, Error)]
pub enum TessellationError {
    /// Tolerances are not finite positive numbers.
    #[error("invalid tessellation parameters: {0}")]
    InvalidParams(String),

    /// A face could not be triangulated.
    #[error("face {index}: {message}")]
    Face {
        /// Position of the face in its solid.
        index: usize,
        /// What went wrong.
        message: String,
    },
}

/// Tessellation parameters controlling mesh quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessellationParams {
    /// Maximum distance between a chord and the true surface, in model units.
    pub linear_tolerance: f64,
    /// Maximum angle between adjacent segments, in radians.
    pub angular_tolerance: f64,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            linear_tolerance: 0.1,
            angular_tolerance: 0.5,
        }
    }
}

impl TessellationParams {
    /// Create validated params.
    pub fn new(linear_tolerance: f64, angular_tolerance: f64) -> Result<Self, TessellationError> {
        let params = Self {
            linear_tolerance,
            angular_tolerance,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that both tolerances are finite and positive.
    pub fn validate(&self) -> Result<(), TessellationError> {
        for (name, value) in [
            ("linear_tolerance", self.linear_tolerance),
            ("angular_tolerance", self.angular_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TessellationError::InvalidParams(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Tessellate an entire B-rep solid into a triangle mesh.
pub fn tessellate_solid(
    brep: &BRepSolid,
    params: &TessellationParams,
) -> Result<TriangleMesh, TessellationError> {
    params.validate()?;
    let mut mesh = TriangleMesh::new();
    for (index, face) in brep.faces.iter().enumerate() {
        let face_mesh = tessellate_face(face, index, params)?;
        mesh.merge(&face_mesh);
    }
    Ok(mesh)
}

/// Tessellate a single B-rep face.
fn tessellate_face(
    face: &Face,
    index: usize,
    params: &TessellationParams,
) -> Result<TriangleMesh, TessellationError> {
    match face.surface.surface_type() {
        SurfaceKind::Plane => tessellate_planar_face(face, index, params),
        _ => {
            let domain = build_domain(face, index, params)?;
            Ok(tessellate_curved_face(face, &domain, params))
        }
    }
}

fn face_error(index: usize, message: impl Into<String>) -> TessellationError {
    TessellationError::Face {
        index,
        message: message.into(),
    }
}

/// Planar faces: project each loop onto the plane and ear-clip.
fn tessellate_planar_face(
    face: &Face,
    index: usize,
    params: &TessellationParams,
) -> Result<TriangleMesh, TessellationError> {
    let surface: &dyn Surface = face.surface.as_ref();

    let mut rings: Vec<(Vec<Point3>, Vec<Point2>, bool)> = Vec::new();
    for lp in &face.loops {
        if let FaceLoop::Edges { edges, is_outer } = lp {
            let pts: Vec<Point3> = sample_loop(edges, params).into_iter().map(|b| b.xyz).collect();
            if pts.len() < 3 {
                continue;
            }
            let uv: Vec<Point2> = pts.iter().map(|p| surface.project(p)).collect();
            rings.push((pts, uv, *is_outer));
        }
    }
    if rings.is_empty() {
        return Err(face_error(index, "planar face has no boundary"));
    }

    let outer_pos = rings.iter().position(|r| r.2).unwrap_or_else(|| {
        (0..rings.len())
            .max_by(|&a, &b| {
                signed_area_2d(&rings[a].1)
                    .abs()
                    .total_cmp(&signed_area_2d(&rings[b].1).abs())
            })
            .unwrap_or(0)
    });
    rings.swap(0, outer_pos);

    // Outer ring counter-clockwise, holes clockwise.
    for (k, (pts, uv, _)) in rings.iter_mut().enumerate() {
        if (signed_area_2d(uv) > 0.0) != (k == 0) {
            pts.reverse();
            uv.reverse();
        }
    }

    let xyz: Vec<Point3> = rings.iter().flat_map(|r| r.0.iter().copied()).collect();
    let uv_rings: Vec<Vec<Point2>> = rings.into_iter().map(|r| r.1).collect();
    let outer = &uv_rings[0];
    let holes = &uv_rings[1..];

    let tris = match triangulate_polygon(outer, holes) {
        Some(tris) => tris,
        None => {
            let flat: Vec<Point2> = uv_rings.iter().flatten().copied().collect();
            delaunay::triangulate(&flat)
                .into_iter()
                .filter(|t| point_in_rings(centroid(&flat, t), &uv_rings))
                .collect()
        }
    };

    let mut normal = surface.normal(Point2::origin()).into_inner();
    if !face.same_sense {
        normal = -normal;
    }

    let mut mesh = TriangleMesh::new();
    for p in &xyz {
        mesh.push_vertex(p, &normal);
    }
    for t in tris {
        push_triangle(&mut mesh, [t[0] as u32, t[1] as u32, t[2] as u32], face.same_sense);
    }
    Ok(mesh)
}

fn centroid(pts: &[Point2], t: &[usize; 3]) -> Point2 {
    Point2::from((pts[t[0]].coords + pts[t[1]].coords + pts[t[2]].coords) / 3.0)
}

fn push_triangle(mesh: &mut TriangleMesh, t: [u32; 3], same_sense: bool) {
    if same_sense {
        mesh.indices.extend_from_slice(&t);
    } else {
        mesh.indices.extend_from_slice(&[t[0], t[2], t[1]]);
    }
}

/// A triangulation vertex on a curved face.
struct Node {
    /// Position in scaled parameter space.
    scaled: Point2,
    uv: Point2,
    xyz: Option<Point3>,
}

/// Curved faces: refine the parameter-space domain with interior points
/// spaced by the tolerances, Delaunay-triangulate, and evaluate.
fn tessellate_curved_face(face: &Face, domain: &Domain, params: &TessellationParams) -> TriangleMesh {
    let surface: &dyn Surface = face.surface.as_ref();
    let (lo, hi) = domain.outer.iter().fold(
        (
            Point2::new(f64::INFINITY, f64::INFINITY),
            Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(lo, hi), p| (lo.inf(&p.uv), hi.sup(&p.uv)),
    );

    // Scale parameters so distances approximate arc length on the surface.
    let su = match (surface.u_radius(lo.y), surface.u_radius(hi.y)) {
        (Some(a), Some(b)) => a.max(b),
        _ => 1.0,
    };
    let sv = surface.v_radius().unwrap_or(1.0);
    // Grid cells are split along a diagonal, which must stay within one step.
    let mut hx =
        FRAC_1_SQRT_2 * su * max_angular_step(su, params.linear_tolerance, params.angular_tolerance);
    let mut hy = match surface.v_radius() {
        Some(r) => {
            FRAC_1_SQRT_2 * r * max_angular_step(r, params.linear_tolerance, params.angular_tolerance)
        }
        None => hx,
    };
    let width = (hi.x - lo.x) * su;
    let height = (hi.y - lo.y) * sv;
    let estimate = width * height / (hx * hy);
    if estimate > MAX_INTERIOR_POINTS {
        let f = (estimate / MAX_INTERIOR_POINTS).sqrt();
        hx *= f;
        hy *= f;
    }
    let spacing = hx.min(hy);
    let scale = |uv: Point2| Point2::new(uv.x * su, uv.y * sv);

    // Boundary nodes, with straight segments subdivided to the spacing.
    let mut nodes: Vec<Node> = Vec::new();
    let mut scaled_rings: Vec<Vec<Point2>> = Vec::new();
    for ring in domain.rings() {
        let mut scaled_ring = Vec::with_capacity(ring.len());
        let n = ring.len();
        for i in 0..n {
            let p: &DomainPoint = &ring[i];
            let q = &ring[(i + 1) % n];
            nodes.push(Node {
                scaled: scale(p.uv),
                uv: p.uv,
                xyz: p.xyz,
            });
            scaled_ring.push(scale(p.uv));
            if !p.straight {
                continue;
            }
            let len = (scale(q.uv) - scale(p.uv)).norm();
            let k = ((len / spacing).ceil() as usize).clamp(1, MAX_SEGMENTS);
            for j in 1..k {
                let t = j as f64 / k as f64;
                let uv = p.uv + t * (q.uv - p.uv);
                nodes.push(Node {
                    scaled: scale(uv),
                    uv,
                    xyz: None,
                });
                scaled_ring.push(scale(uv));
            }
        }
        scaled_rings.push(scaled_ring);
    }

    // Interior grid, kept clear of the boundary.
    let (slo, shi) = (scale(lo), scale(hi));
    let nx = ((shi.x - slo.x) / hx).ceil().max(0.0) as usize;
    let ny = ((shi.y - slo.y) / hy).ceil().max(0.0) as usize;
    let clearance = (0.5 * spacing).powi(2);
    for i in 0..nx {
        for j in 0..ny {
            let jitter = 0.01 * ((i as f64 * 12.9898 + j as f64 * 78.233).sin() * 43758.5453).fract();
            let p = Point2::new(
                slo.x + (i as f64 + 0.5 + jitter) * hx,
                slo.y + (j as f64 + 0.5 - jitter) * hy,
            );
            if !point_in_rings(p, &scaled_rings) {
                continue;
            }
            let near_boundary = scaled_rings.iter().any(|ring| {
                (0..ring.len()).any(|k| {
                    segment_distance_sq(p, ring[k], ring[(k + 1) % ring.len()]) < clearance
                })
            });
            if near_boundary {
                continue;
            }
            let uv = Point2::new(p.x / su, p.y / sv);
            nodes.push(Node {
                scaled: p,
                uv,
                xyz: None,
            });
        }
    }

    let scaled: Vec<Point2> = nodes.iter().map(|n| n.scaled).collect();
    let tris = delaunay::triangulate(&scaled);

    let mut mesh = TriangleMesh::new();
    let mut remap: Vec<Option<u32>> = vec![None; nodes.len()];
    for t in tris {
        if !point_in_rings(centroid(&scaled, &t), &scaled_rings) {
            continue;
        }
        let xyz = t.map(|i| nodes[i].xyz.unwrap_or_else(|| surface.evaluate(nodes[i].uv)));
        let area = (xyz[1] - xyz[0]).cross(&(xyz[2] - xyz[0])).norm();
        if area <= 1e-12 * (xyz[1] - xyz[0]).norm_squared().max(1e-12) {
            continue;
        }
        let mut out = [0u32; 3];
        for k in 0..3 {
            let i = t[k];
            out[k] = match remap[i] {
                Some(v) => v,
                None => {
                    let mut n = surface.normal(nodes[i].uv).into_inner();
                    if !face.same_sense {
                        n = -n;
                    }
                    let v = mesh.push_vertex(&xyz[k], &n);
                    remap[i] = Some(v);
                    v
                }
            };
        }
        push_triangle(&mut mesh, out, face.same_sense);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;
    use stepmesh_kernel_geom::{
        Circle3d, CylinderSurface, Line3d, OrientedEdge, Plane, SphereSurface,
    };
    use stepmesh_kernel_math::Dir3;
    use stepmesh_kernel_step::read_step_from_buffer;

    const CUBE: &str = include_str!("../../../testdata/cube.step");
    const CYLINDER: &str = include_str!("../../../testdata/cylinder.step");

    /// Compute the volume of a closed triangle mesh using the divergence theorem.
    fn compute_mesh_volume(mesh: &TriangleMesh) -> f64 {
        let verts = &mesh.vertices;
        let mut vol = 0.0;
        for tri in mesh.indices.chunks(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let v0 = [
                verts[i0 * 3] as f64,
                verts[i0 * 3 + 1] as f64,
                verts[i0 * 3 + 2] as f64,
            ];
            let v1 = [
                verts[i1 * 3] as f64,
                verts[i1 * 3 + 1] as f64,
                verts[i1 * 3 + 2] as f64,
            ];
            let v2 = [
                verts[i2 * 3] as f64,
                verts[i2 * 3 + 1] as f64,
                verts[i2 * 3 + 2] as f64,
            ];
            vol += v0[0] * (v1[1] * v2[2] - v2[1] * v1[2])
                - v1[0] * (v0[1] * v2[2] - v2[1] * v0[2])
                + v2[0] * (v0[1] * v1[2] - v1[1] * v0[2]);
        }
        vol / 6.0
    }

    /// Compute the surface area of a triangle mesh.
    fn compute_mesh_surface_area(mesh: &TriangleMesh) -> f64 {
        let verts = &mesh.vertices;
        let mut area = 0.0;
        for tri in mesh.indices.chunks(3) {
            let p = |i: u32| {
                let i = i as usize * 3;
                Vec3::new(verts[i] as f64, verts[i + 1] as f64, verts[i + 2] as f64)
            };
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            area += 0.5 * (b - a).cross(&(c - a)).norm();
        }
        area
    }

    fn solid(src: &str) -> BRepSolid {
        read_step_from_buffer(src.as_bytes())
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    fn z() -> Dir3 {
        Dir3::new_normalize(Vec3::z())
    }

    fn x() -> Dir3 {
        Dir3::new_normalize(Vec3::x())
    }

    #[test]
    fn test_params_validation() {
        assert!(TessellationParams::new(0.1, 0.5).is_ok());
        assert!(TessellationParams::new(0.0, 0.5).is_err());
        assert!(TessellationParams::new(0.1, -1.0).is_err());
        assert!(TessellationParams::new(f64::NAN, 0.5).is_err());
        assert!(TessellationParams::new(0.1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_invalid_params_rejected_by_tessellate() {
        let params = TessellationParams {
            linear_tolerance: 0.0,
            angular_tolerance: 0.5,
        };
        let err = tessellate_solid(&solid(CUBE), &params).unwrap_err();
        assert!(matches!(err, TessellationError::InvalidParams(_)));
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = TriangleMesh::new();
        let p = Point3::origin();
        let n = Vec3::z();
        for _ in 0..3 {
            a.push_vertex(&p, &n);
        }
        a.indices.extend_from_slice(&[0, 1, 2]);
        let b = a.clone();
        a.merge(&b);
        assert_eq!(a.num_vertices(), 6);
        assert_eq!(&a.indices[3..], &[3, 4, 5]);
    }

    #[test]
    fn test_cube() {
        let mesh = tessellate_solid(&solid(CUBE), &TessellationParams::default()).unwrap();
        assert!(
            mesh.num_triangles() >= 12,
            "expected at least 12 triangles, got {}",
            mesh.num_triangles()
        );
        assert_eq!(mesh.normals.len(), mesh.vertices.len());

        assert_relative_eq!(compute_mesh_volume(&mesh), 1000.0, epsilon = 1e-3);
        assert_relative_eq!(compute_mesh_surface_area(&mesh), 600.0, epsilon = 1e-3);
    }

    #[test]
    fn test_cylinder_volume() {
        let mesh = tessellate_solid(&solid(CYLINDER), &TessellationParams::default()).unwrap();
        let expected = PI * 25.0 * 10.0;
        assert_relative_eq!(compute_mesh_volume(&mesh), expected, max_relative = 0.05);
        let expected_area = 2.0 * PI * 25.0 + 2.0 * PI * 5.0 * 10.0;
        assert_relative_eq!(
            compute_mesh_surface_area(&mesh),
            expected_area,
            max_relative = 0.05
        );
    }

    #[test]
    fn test_finer_tolerance_more_triangles() {
        let s = solid(CYLINDER);
        let coarse = tessellate_solid(&s, &TessellationParams::new(0.5, 1.0).unwrap()).unwrap();
        let fine = tessellate_solid(&s, &TessellationParams::new(0.01, 0.1).unwrap()).unwrap();
        assert!(
            fine.num_triangles() > coarse.num_triangles(),
            "fine {} <= coarse {}",
            fine.num_triangles(),
            coarse.num_triangles()
        );
    }

    #[test]
    fn test_reversed_face_flips_winding() {
        let mk = |same_sense| {
            let pts = [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ];
            let edges = (0..4)
                .map(|i| OrientedEdge {
                    start: pts[i],
                    end: pts[(i + 1) % 4],
                    curve: Box::new(Line3d::from_points(pts[i], pts[(i + 1) % 4])),
                    forward: true,
                })
                .collect();
            BRepSolid {
                name: "square".into(),
                faces: vec![Face {
                    surface: Box::new(Plane::from_normal(Point3::origin(), Vec3::z())),
                    same_sense,
                    loops: vec![FaceLoop::Edges {
                        edges,
                        is_outer: true,
                    }],
                }],
            }
        };
        let facing = |mesh: &TriangleMesh| {
            let v = &mesh.vertices;
            let i = |k: usize| mesh.indices[k] as usize * 3;
            let a = Vec3::new(v[i(0)] as f64, v[i(0) + 1] as f64, v[i(0) + 2] as f64);
            let b = Vec3::new(v[i(1)] as f64, v[i(1) + 1] as f64, v[i(1) + 2] as f64);
            let c = Vec3::new(v[i(2)] as f64, v[i(2) + 1] as f64, v[i(2) + 2] as f64);
            (b - a).cross(&(c - a)).z
        };
        let params = TessellationParams::default();
        let up = tessellate_solid(&mk(true), &params).unwrap();
        let down = tessellate_solid(&mk(false), &params).unwrap();
        assert_eq!(up.num_triangles(), 2);
        assert!(facing(&up) > 0.0);
        assert!(facing(&down) < 0.0);
        assert!(down.normals[2] < 0.0);
    }

    #[test]
    fn test_hemisphere_from_equator() {
        let r = 3.0;
        let start = Point3::new(r, 0.0, 0.0);
        let face = Face {
            surface: Box::new(SphereSurface {
                center: Point3::origin(),
                radius: r,
                ref_dir: x(),
                axis: z(),
            }),
            same_sense: true,
            loops: vec![FaceLoop::Edges {
                edges: vec![OrientedEdge {
                    start,
                    end: start,
                    curve: Box::new(Circle3d::new(Point3::origin(), &z(), &x(), r)),
                    forward: true,
                }],
                is_outer: true,
            }],
        };
        let s = BRepSolid {
            name: "dome".into(),
            faces: vec![face],
        };
        let mesh = tessellate_solid(&s, &TessellationParams::new(0.02, 0.2).unwrap()).unwrap();
        assert_relative_eq!(
            compute_mesh_surface_area(&mesh),
            2.0 * PI * r * r,
            max_relative = 0.05
        );
        // Every vertex lies on the upper half of the sphere.
        for p in mesh.vertices.chunks(3) {
            let len = Vec3::new(p[0] as f64, p[1] as f64, p[2] as f64).norm();
            assert!((len - r).abs() < 1e-4);
            assert!(p[2] > -1e-4);
        }
    }

    #[test]
    fn test_cylinder_band_between_two_circles() {
        let r = 2.0;
        let h = 4.0;
        let bottom = Point3::new(r, 0.0, 0.0);
        let top = Point3::new(r, 0.0, h);
        let circle = |z0: f64| Circle3d::new(Point3::new(0.0, 0.0, z0), &z(), &x(), r);
        let face = Face {
            surface: Box::new(CylinderSurface {
                center: Point3::origin(),
                axis: z(),
                ref_dir: x(),
                radius: r,
            }),
            same_sense: true,
            loops: vec![
                FaceLoop::Edges {
                    edges: vec![OrientedEdge {
                        start: bottom,
                        end: bottom,
                        curve: Box::new(circle(0.0)),
                        forward: true,
                    }],
                    is_outer: true,
                },
                FaceLoop::Edges {
                    edges: vec![OrientedEdge {
                        start: top,
                        end: top,
                        curve: Box::new(circle(h)),
                        forward: false,
                    }],
                    is_outer: false,
                },
            ],
        };
        let s = BRepSolid {
            name: "tube".into(),
            faces: vec![face],
        };
        let mesh = tessellate_solid(&s, &TessellationParams::new(0.02, 0.2).unwrap()).unwrap();
        assert_relative_eq!(
            compute_mesh_surface_area(&mesh),
            2.0 * PI * r * h,
            max_relative = 0.05
        );
        // Every vertex stays between the two boundary circles.
        for p in mesh.vertices.chunks(3) {
            assert!(p[2] > -1e-4 && p[2] < (h + 1e-4) as f32);
        }
        // Outward normals.
        for (p, n) in mesh.vertices.chunks(3).zip(mesh.normals.chunks(3)) {
            assert!(p[0] * n[0] + p[1] * n[1] > 0.0);
        }
    }

    #[test]
    fn test_unbounded_cylinder_face_fails() {
        let face = Face {
            surface: Box::new(CylinderSurface {
                center: Point3::origin(),
                axis: z(),
                ref_dir: x(),
                radius: 1.0,
            }),
            same_sense: true,
            loops: Vec::new(),
        };
        let s = BRepSolid {
            name: String::new(),
            faces: vec![face],
        };
        let err = tessellate_solid(&s, &TessellationParams::default()).unwrap_err();
        assert!(matches!(err, TessellationError::Face { index: 0, .. }));
    }
}
