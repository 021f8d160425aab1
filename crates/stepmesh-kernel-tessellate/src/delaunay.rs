//! Incremental Bowyer–Watson Delaunay triangulation in the plane.

use stepmesh_kernel_math::Point2;

#[derive(Debug, Clone, Copy)]
struct Tri {
    v: [usize; 3],
    center: Point2,
    r2: f64,
}

fn orient(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn make_tri(pts: &[Point2], v: [usize; 3]) -> Tri {
    let (a, b, c) = (pts[v[0]], pts[v[1]], pts[v[2]]);
    let d = 2.0 * orient(a, b, c);
    let scale = (b - a).norm_squared().max((c - a).norm_squared());

    if d.abs() <= 1e-14 * scale {
        // Collinear: use the circle on the longest edge.
        let edges = [(a, b), (b, c), (c, a)];
        let (p, q) = edges
            .iter()
            .copied()
            .max_by(|x, y| (x.1 - x.0).norm_squared().total_cmp(&(y.1 - y.0).norm_squared()))
            .unwrap_or((a, b));
        let center = Point2::from((p.coords + q.coords) * 0.5);
        return Tri {
            v,
            center,
            r2: (p - center).norm_squared(),
        };
    }

    let (ba, ca) = (b - a, c - a);
    let (bl, cl) = (ba.norm_squared(), ca.norm_squared());
    let ux = (ca.y * bl - ba.y * cl) / d;
    let uy = (ba.x * cl - ca.x * bl) / d;
    Tri {
        v,
        center: Point2::new(a.x + ux, a.y + uy),
        r2: ux * ux + uy * uy,
    }
}

/// Delaunay-triangulate `points`.
///
/// Duplicate points are inserted once; triangles reference the first
/// occurrence. Every returned triangle is counter-clockwise.
pub(crate) fn triangulate(points: &[Point2]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }

    let (mut lo, mut hi) = (points[0], points[0]);
    for p in points {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    let span = (hi - lo).amax().max(1e-9);
    let mid = Point2::from((lo.coords + hi.coords) * 0.5);
    let dup_eps2 = (span * 1e-12).powi(2);

    let n = points.len();
    let mut pts: Vec<Point2> = points.to_vec();
    pts.push(Point2::new(mid.x - 20.0 * span, mid.y - 10.0 * span));
    pts.push(Point2::new(mid.x + 20.0 * span, mid.y - 10.0 * span));
    pts.push(Point2::new(mid.x, mid.y + 20.0 * span));

    let mut tris = vec![make_tri(&pts, [n, n + 1, n + 2])];
    let mut inserted: Vec<usize> = Vec::with_capacity(n);

    for i in 0..n {
        let p = pts[i];
        if inserted
            .iter()
            .any(|&j| (pts[j] - p).norm_squared() <= dup_eps2)
        {
            continue;
        }
        inserted.push(i);

        // Cavity boundary: edges of removed triangles not shared by two of them.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        tris.retain(|t| {
            if (p - t.center).norm_squared() >= t.r2 {
                return true;
            }
            for k in 0..3 {
                let (a, b) = (t.v[k], t.v[(k + 1) % 3]);
                match boundary.iter().position(|&e| e == (b, a)) {
                    Some(pos) => {
                        boundary.swap_remove(pos);
                    }
                    None => boundary.push((a, b)),
                }
            }
            false
        });

        for (a, b) in boundary {
            tris.push(make_tri(&pts, [a, b, i]));
        }
    }

    tris.into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .map(|t| t.v)
        .filter(|v| orient(pts[v[0]], pts[v[1]], pts[v[2]]) > 0.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepmesh_kernel_math::signed_area_2d;

    fn area(pts: &[Point2], tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| signed_area_2d(&[pts[t[0]], pts[t[1]], pts[t[2]]]))
            .sum()
    }

    #[test]
    fn test_too_few_points() {
        assert!(triangulate(&[Point2::origin(), Point2::new(1.0, 0.0)]).is_empty());
    }

    #[test]
    fn test_scattered_points_cover_hull() {
        let mut pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 1.5),
            Point2::new(0.0, 1.5),
        ];
        for k in 1..16 {
            let t = k as f64;
            pts.push(Point2::new(
                0.2 + 3.6 * (t * 0.618_034).fract(),
                0.1 + 1.3 * (t * 0.414_214).fract(),
            ));
        }
        let tris = triangulate(&pts);
        assert!((area(&pts, &tris) - 6.0).abs() < 1e-9);
        assert!(tris
            .iter()
            .all(|t| signed_area_2d(&[pts[t[0]], pts[t[1]], pts[t[2]]]) > 0.0));
    }

    #[test]
    fn test_duplicates_ignored() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 0.0),
        ];
        let tris = triangulate(&pts);
        assert_eq!(tris.len(), 1);
        assert!(tris[0].iter().all(|&i| i < 3));
    }

    #[test]
    fn test_empty_circumcircle() {
        let pts: Vec<Point2> = (0..40)
            .map(|k| {
                let t = k as f64 * 0.7;
                Point2::new((t * 3.1).sin() * 5.0 + t * 0.1, (t * 1.7).cos() * 3.0)
            })
            .collect();
        let tris = triangulate(&pts);
        assert!(!tris.is_empty());
        for t in &tris {
            let c = make_tri(&pts, *t);
            for (k, p) in pts.iter().enumerate() {
                if t.contains(&k) {
                    continue;
                }
                assert!((p - c.center).norm_squared() >= c.r2 * (1.0 - 1e-9));
            }
        }
    }
}
