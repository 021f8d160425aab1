//! 2D polygon utilities: containment tests and ear-clipping with holes.

use stepmesh_kernel_math::Point2;

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Whether `p` lies strictly inside triangle `abc` (either winding).
pub(crate) fn point_in_triangle_2d(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    barycentric(p, a, b, c).is_some_and(|(u, v)| {
        // Points on the boundary are not inside.
        let eps = 1e-10;
        u > eps && v > eps && (u + v) < 1.0 - eps
    })
}

/// Whether `p` lies inside triangle `abc` or on one of its edges.
fn point_on_or_in_triangle_2d(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    barycentric(p, a, b, c).is_some_and(|(u, v)| {
        let eps = 1e-10;
        u >= -eps && v >= -eps && (u + v) <= 1.0 + eps
    })
}

/// Barycentric `(u, v)` of `p` along `ac` and `ab`; `None` for a degenerate triangle.
fn barycentric(p: Point2, a: Point2, b: Point2, c: Point2) -> Option<(f64, f64)> {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let u = (dot11 * dot02 - dot01 * dot12) / denom;
    let v = (dot00 * dot12 - dot01 * dot02) / denom;
    Some((u, v))
}

/// Even-odd containment test against a set of closed rings.
pub(crate) fn point_in_rings(p: Point2, rings: &[Vec<Point2>]) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
    }
    inside
}

/// Squared distance from `p` to segment `ab`.
pub(crate) fn segment_distance_sq(p: Point2, a: Point2, b: Point2) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm_squared();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + t * ab)).norm_squared()
}

fn segments_cross(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Triangulate a polygon with holes by bridging each hole into the outer
/// ring and ear-clipping the result.
///
/// `outer` must be counter-clockwise and every hole clockwise. Indices in
/// the result refer to the concatenation of `outer` and all `holes`.
/// Returns `None` when ear-clipping gets stuck on a malformed polygon.
pub(crate) fn triangulate_polygon(outer: &[Point2], holes: &[Vec<Point2>]) -> Option<Vec<[usize; 3]>> {
    let mut verts: Vec<Point2> = outer.to_vec();
    let mut ring: Vec<usize> = (0..outer.len()).collect();

    let mut hole_rings: Vec<Vec<usize>> = Vec::with_capacity(holes.len());
    for hole in holes {
        let start = verts.len();
        verts.extend_from_slice(hole);
        hole_rings.push((start..verts.len()).collect());
    }

    // Bridge holes right to left so earlier bridges never cross later holes.
    let max_x = |h: &Vec<usize>| h.iter().map(|&i| verts[i].x).fold(f64::MIN, f64::max);
    hole_rings.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));

    for (k, hole) in hole_rings.iter().enumerate() {
        if hole.len() < 3 {
            continue;
        }
        let (m_pos, &m) = hole
            .iter()
            .enumerate()
            .max_by(|(_, &a), (_, &b)| verts[a].x.total_cmp(&verts[b].x))?;
        let mp = verts[m];

        // Nearest ring vertex whose bridge crosses no ring or pending hole edge.
        let mut candidates: Vec<usize> = (0..ring.len()).collect();
        candidates.sort_by(|&a, &b| {
            (verts[ring[a]] - mp)
                .norm_squared()
                .total_cmp(&(verts[ring[b]] - mp).norm_squared())
        });
        let visible = |pos: usize| {
            let vp = verts[ring[pos]];
            let crosses_ring = (0..ring.len()).any(|i| {
                let (a, b) = (verts[ring[i]], verts[ring[(i + 1) % ring.len()]]);
                segments_cross(mp, vp, a, b)
            });
            let crosses_hole = hole_rings[k..].iter().any(|h| {
                (0..h.len()).any(|i| {
                    let (a, b) = (verts[h[i]], verts[h[(i + 1) % h.len()]]);
                    segments_cross(mp, vp, a, b)
                })
            });
            !crosses_ring && !crosses_hole
        };
        let bridge_pos = candidates
            .iter()
            .copied()
            .find(|&pos| visible(pos))
            .or_else(|| candidates.first().copied())?;

        let bridge = ring[bridge_pos];
        let mut merged = Vec::with_capacity(ring.len() + hole.len() + 2);
        merged.extend_from_slice(&ring[..=bridge_pos]);
        merged.extend((0..hole.len()).map(|i| hole[(m_pos + i) % hole.len()]));
        merged.push(m);
        merged.push(bridge);
        merged.extend_from_slice(&ring[bridge_pos + 1..]);
        ring = merged;
    }

    ear_clip(&verts, ring)
}

/// Ear-clip a counter-clockwise ring of vertex indices.
fn ear_clip(verts: &[Point2], mut remaining: Vec<usize>) -> Option<Vec<[usize; 3]>> {
    let (mut lo, mut hi) = (Point2::new(f64::MAX, f64::MAX), Point2::new(f64::MIN, f64::MIN));
    for &i in &remaining {
        lo = lo.inf(&verts[i]);
        hi = hi.sup(&verts[i]);
    }
    let area_eps = 1e-12 * (hi - lo).norm_squared().max(f64::MIN_POSITIVE);

    let mut out = Vec::with_capacity(remaining.len().saturating_sub(2));
    while remaining.len() > 3 {
        // A vertex touching the candidate triangle blocks the ear. Only if
        // that leaves no ear at all (touching bridge edges) is touching allowed.
        let clipped = clip_one(verts, &mut remaining, &mut out, area_eps, true)
            || clip_one(verts, &mut remaining, &mut out, area_eps, false);
        if !clipped {
            return None;
        }
    }

    if remaining.len() == 3 {
        let (a, b, c) = (
            verts[remaining[0]],
            verts[remaining[1]],
            verts[remaining[2]],
        );
        if cross(a, b, c) > area_eps {
            out.push([remaining[0], remaining[1], remaining[2]]);
        }
    }
    Some(out)
}

/// Remove one ear (or one collinear vertex) from `remaining`.
fn clip_one(
    verts: &[Point2],
    remaining: &mut Vec<usize>,
    out: &mut Vec<[usize; 3]>,
    area_eps: f64,
    touching_blocks: bool,
) -> bool {
    let n = remaining.len();
    let coincident = |p: Point2, q: Point2| (p - q).norm_squared() <= area_eps;

    for i in 0..n {
        let prev = (i + n - 1) % n;
        let next = (i + 1) % n;
        let (a, b, c) = (
            verts[remaining[prev]],
            verts[remaining[i]],
            verts[remaining[next]],
        );

        let turn = cross(a, b, c);
        if turn.abs() <= area_eps {
            // Collinear or doubled-back vertex: drop it without a triangle.
            remaining.remove(i);
            return true;
        }
        if turn < 0.0 {
            continue;
        }

        let blocked = remaining.iter().enumerate().any(|(j, &vj)| {
            if j == prev || j == i || j == next {
                return false;
            }
            let p = verts[vj];
            if touching_blocks {
                // Bridge duplicates share a corner's position without blocking.
                !(coincident(p, a) || coincident(p, b) || coincident(p, c))
                    && point_on_or_in_triangle_2d(p, a, b, c)
            } else {
                point_in_triangle_2d(p, a, b, c)
            }
        });
        if !blocked {
            out.push([remaining[prev], remaining[i], remaining[next]]);
            remaining.remove(i);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepmesh_kernel_math::signed_area_2d;

    fn square(lo: f64, hi: f64) -> Vec<Point2> {
        vec![
            Point2::new(lo, lo),
            Point2::new(hi, lo),
            Point2::new(hi, hi),
            Point2::new(lo, hi),
        ]
    }

    fn total_area(verts: &[Point2], tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| signed_area_2d(&[verts[t[0]], verts[t[1]], verts[t[2]]]))
            .sum()
    }

    #[test]
    fn test_point_in_triangle() {
        let (a, b, c) = (
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        );
        assert!(point_in_triangle_2d(Point2::new(0.2, 0.2), a, b, c));
        assert!(!point_in_triangle_2d(Point2::new(1.0, 1.0), a, b, c));
        assert!(!point_in_triangle_2d(a, a, b, c));
    }

    #[test]
    fn test_point_in_rings_with_hole() {
        let mut hole = square(1.0, 2.0);
        hole.reverse();
        let rings = vec![square(0.0, 3.0), hole];
        assert!(point_in_rings(Point2::new(0.5, 0.5), &rings));
        assert!(!point_in_rings(Point2::new(1.5, 1.5), &rings));
        assert!(!point_in_rings(Point2::new(4.0, 1.5), &rings));
    }

    #[test]
    fn test_square() {
        let outer = square(0.0, 1.0);
        let tris = triangulate_polygon(&outer, &[]).unwrap();
        assert_eq!(tris.len(), 2);
        assert!((total_area(&outer, &tris) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_concave_l_shape() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let tris = triangulate_polygon(&outer, &[]).unwrap();
        assert_eq!(tris.len(), 4);
        assert!((total_area(&outer, &tris) - 3.0).abs() < 1e-12);
        // The reflex corner sits on the 5-1 diagonal, so neither triangle
        // spanning that diagonal may be emitted.
        for t in &tris {
            let mut sorted = *t;
            sorted.sort_unstable();
            assert_ne!(sorted, [0, 1, 5]);
            assert_ne!(sorted, [1, 2, 5]);
        }
    }

    #[test]
    fn test_concave_triangles_stay_inside() {
        // U-shaped profile whose notch corners line up with outer corners.
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(3.0, 3.0),
            Point2::new(2.0, 3.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        let tris = triangulate_polygon(&outer, &[]).unwrap();
        assert_eq!(tris.len(), outer.len() - 2);
        assert!((total_area(&outer, &tris) - 7.0).abs() < 1e-12);
        for t in &tris {
            let centroid = Point2::from(
                (outer[t[0]].coords + outer[t[1]].coords + outer[t[2]].coords) / 3.0,
            );
            assert!(point_in_rings(centroid, &[outer.clone()]), "{t:?}");
        }
    }

    #[test]
    fn test_point_on_edge_touches_triangle() {
        let (a, b, c) = (
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        );
        let on_edge = Point2::new(1.0, 1.0);
        assert!(!point_in_triangle_2d(on_edge, a, b, c));
        assert!(point_on_or_in_triangle_2d(on_edge, a, b, c));
        assert!(!point_on_or_in_triangle_2d(Point2::new(1.5, 1.5), a, b, c));
    }

    #[test]
    fn test_square_with_two_holes() {
        let outer = square(0.0, 10.0);
        let mut h1 = square(1.0, 3.0);
        h1.reverse();
        let mut h2: Vec<Point2> = square(6.0, 8.0);
        h2.reverse();
        let holes = vec![h1, h2];
        let tris = triangulate_polygon(&outer, &holes).unwrap();

        let mut verts = outer.clone();
        for h in &holes {
            verts.extend_from_slice(h);
        }
        assert!((total_area(&verts, &tris) - (100.0 - 8.0)).abs() < 1e-9);
        assert!(tris
            .iter()
            .all(|t| signed_area_2d(&[verts[t[0]], verts[t[1]], verts[t[2]]]) > 0.0));
    }

    #[test]
    fn test_collinear_vertices_dropped() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let tris = triangulate_polygon(&outer, &[]).unwrap();
        assert!((total_area(&outer, &tris) - 4.0).abs() < 1e-12);
    }
}
