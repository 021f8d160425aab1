//! Boundary sampling: turns face loops into point chains.

use std::f64::consts::TAU;

use stepmesh_kernel_geom::OrientedEdge;
use stepmesh_kernel_math::{arc_segments, Point3};

use crate::TessellationParams;

/// A sampled boundary point and whether the segment leaving it is straight
/// in 3D (line and polyline edges).
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundaryPoint {
    pub xyz: Point3,
    pub straight: bool,
}

/// Sample one edge from its start up to, but excluding, its end.
pub(crate) fn sample_edge(edge: &OrientedEdge, params: &TessellationParams) -> Vec<Point3> {
    let curve = edge.curve.as_ref();

    if let Some(verts) = curve.vertices() {
        let i0 = curve.parameter_of(&edge.start) as usize;
        let i1 = curve.parameter_of(&edge.end) as usize;
        let mut pts: Vec<Point3> = if edge.is_closed() || i0 == i1 {
            verts.to_vec()
        } else if i0 < i1 {
            verts[i0..=i1].to_vec()
        } else {
            verts[i1..=i0].iter().rev().copied().collect()
        };
        if edge.is_closed() && !edge.forward {
            pts.reverse();
        }
        pts.pop();
        match pts.first_mut() {
            Some(first) => *first = edge.start,
            None => pts.push(edge.start),
        }
        return pts;
    }

    if !curve.is_periodic() {
        return vec![edge.start];
    }

    let t0 = curve.parameter_of(&edge.start);
    let t1 = curve.parameter_of(&edge.end);
    let dir = if edge.forward { 1.0 } else { -1.0 };
    let sweep = if edge.is_closed() {
        TAU
    } else {
        (dir * (t1 - t0)).rem_euclid(TAU)
    };
    if sweep < 1e-12 {
        return vec![edge.start];
    }

    let radius = curve.sampling_radius().unwrap_or(1.0);
    let min = if edge.is_closed() { 3 } else { 1 };
    let n = arc_segments(
        radius,
        sweep,
        params.linear_tolerance,
        params.angular_tolerance,
        min,
    );
    let step = dir * sweep / n as f64;
    (0..n)
        .map(|k| {
            if k == 0 {
                edge.start
            } else {
                curve.evaluate(t0 + step * k as f64)
            }
        })
        .collect()
}

/// Sample a closed loop of edges, dropping consecutive duplicates.
pub(crate) fn sample_loop(edges: &[OrientedEdge], params: &TessellationParams) -> Vec<BoundaryPoint> {
    let mut out: Vec<BoundaryPoint> = Vec::new();
    for edge in edges {
        let straight = !edge.curve.is_periodic();
        for xyz in sample_edge(edge, params) {
            if out.last().is_some_and(|p| (p.xyz - xyz).norm() < 1e-12) {
                continue;
            }
            out.push(BoundaryPoint { xyz, straight });
        }
    }
    while out.len() > 1 && out.first().zip(out.last()).is_some_and(|(a, b)| (a.xyz - b.xyz).norm() < 1e-12) {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use stepmesh_kernel_geom::{Circle3d, Curve3d, Line3d, Polyline3d};
    use stepmesh_kernel_math::{Dir3, Vec3};

    fn circle() -> Circle3d {
        Circle3d::new(
            Point3::origin(),
            &Dir3::new_normalize(Vec3::z()),
            &Dir3::new_normalize(Vec3::x()),
            5.0,
        )
    }

    fn params() -> TessellationParams {
        TessellationParams::default()
    }

    #[test]
    fn test_line_edge_is_single_point() {
        let a = Point3::origin();
        let b = Point3::new(1.0, 0.0, 0.0);
        let edge = OrientedEdge {
            start: a,
            end: b,
            curve: Box::new(Line3d::from_points(a, b)),
            forward: true,
        };
        assert_eq!(sample_edge(&edge, &params()), vec![a]);
    }

    #[test]
    fn test_closed_circle_full_sweep() {
        let start = Point3::new(5.0, 0.0, 0.0);
        let edge = OrientedEdge {
            start,
            end: start,
            curve: Box::new(circle()),
            forward: true,
        };
        let pts = sample_edge(&edge, &params());
        assert!(pts.len() >= 3);
        assert!(pts.iter().all(|p| (p.coords.norm() - 5.0).abs() < 1e-9));
        // Counter-clockwise about +Z when forward.
        assert!(pts[1].y > 0.0);

        let back = sample_edge(&edge.reversed(), &params());
        assert_eq!(back.len(), pts.len());
        assert!(back[1].y < 0.0);
    }

    #[test]
    fn test_arc_respects_direction() {
        let c = circle();
        let start = c.evaluate(0.0);
        let end = c.evaluate(PI / 2.0);
        let fwd = OrientedEdge {
            start,
            end,
            curve: Box::new(c.clone()),
            forward: true,
        };
        // Forward quarter arc stays in the first quadrant.
        assert!(sample_edge(&fwd, &params())
            .iter()
            .all(|p| p.x >= -1e-9 && p.y >= -1e-9));

        // Walking the other way round from `start` covers three quarters.
        let long = OrientedEdge {
            forward: false,
            ..fwd.clone()
        };
        let n_long = sample_edge(&long, &params()).len();
        assert!(n_long > sample_edge(&fwd, &params()).len());
    }

    #[test]
    fn test_finer_tolerance_samples_more() {
        let start = Point3::new(5.0, 0.0, 0.0);
        let edge = OrientedEdge {
            start,
            end: start,
            curve: Box::new(circle()),
            forward: true,
        };
        let coarse = sample_edge(&edge, &TessellationParams::new(0.5, 1.0).unwrap()).len();
        let fine = sample_edge(&edge, &TessellationParams::new(0.01, 0.1).unwrap()).len();
        assert!(fine > coarse);
    }

    #[test]
    fn test_polyline_edge_subrange() {
        let pts = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let edge = OrientedEdge {
            start: pts[3],
            end: pts[1],
            curve: Box::new(Polyline3d { points: pts.clone() }),
            forward: false,
        };
        assert_eq!(sample_edge(&edge, &params()), vec![pts[3], pts[2]]);
    }

    #[test]
    fn test_loop_drops_duplicates() {
        let a = Point3::origin();
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let line = |p: Point3, q: Point3| OrientedEdge {
            start: p,
            end: q,
            curve: Box::new(Line3d::from_points(p, q)),
            forward: true,
        };
        let pts = sample_loop(&[line(a, b), line(b, b), line(b, c), line(c, a)], &params());
        assert_eq!(pts.len(), 3);
        assert!(pts.iter().all(|p| p.straight));
    }
}
