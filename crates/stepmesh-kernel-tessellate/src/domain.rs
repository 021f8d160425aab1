//! Parameter-space domains of faces on periodic surfaces.
//!
//! A face on a cylinder, cone, sphere or torus is bounded by loops that
//! may wrap around the surface, pass through a pole, or consist of seam
//! edges only. [`build_domain`] turns those loops into one simple outer
//! polygon plus holes in `(u, v)`, unwrapped so the polygon covers the
//! face exactly once.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use stepmesh_kernel_geom::{ConeSurface, Face, FaceLoop, Surface, SurfaceKind};
use stepmesh_kernel_math::{signed_area_2d, Point2, Point3, Vec2};

use crate::sample::sample_loop;
use crate::{TessellationError, TessellationParams};

/// A vertex of a domain ring.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DomainPoint {
    pub uv: Point2,
    /// Exact boundary position when the point came from an edge.
    pub xyz: Option<Point3>,
    /// Whether the ring segment leaving this point may be subdivided.
    pub straight: bool,
}

impl DomainPoint {
    fn synthetic(u: f64, v: f64) -> Self {
        Self {
            uv: Point2::new(u, v),
            xyz: None,
            straight: true,
        }
    }
}

/// A face domain: a counter-clockwise outer ring and clockwise holes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Domain {
    pub outer: Vec<DomainPoint>,
    pub holes: Vec<Vec<DomainPoint>>,
}

impl Domain {
    pub fn rings(&self) -> impl Iterator<Item = &Vec<DomainPoint>> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }
}

/// A sampled loop lifted into parameter space.
#[derive(Debug, Clone)]
struct UvLoop {
    points: Vec<DomainPoint>,
    /// Net number of turns around the `u` period.
    winding: i64,
    /// Net number of turns around the `v` period (torus only).
    v_winding: i64,
    /// Parameter bounding box before seam excursions were collapsed.
    bounds: (Point2, Point2),
}

fn wrap(a: f64) -> f64 {
    (a + PI).rem_euclid(TAU) - PI
}

fn ring_area(points: &[DomainPoint]) -> f64 {
    let uv: Vec<Point2> = points.iter().map(|p| p.uv).collect();
    signed_area_2d(&uv)
}

fn mean(points: &[DomainPoint], f: impl Fn(&Point2) -> f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| f(&p.uv)).sum::<f64>() / points.len() as f64
}

fn is_singular(surface: &dyn Surface, uv: Point2) -> bool {
    let a = surface.evaluate(uv);
    let b = surface.evaluate(Point2::new(uv.x + 1.0, uv.y));
    (a - b).norm() < 1e-9
}

/// Project a sampled loop, unwrap periodic parameters and spread pole
/// points along the pole line between their neighbours.
fn lift_loop(surface: &dyn Surface, xyz: &[(Point3, bool)]) -> UvLoop {
    let periodic_v = surface.periodic_v();
    let raw: Vec<(Point2, bool)> = xyz
        .iter()
        .map(|(p, _)| {
            let uv = surface.project(p);
            (uv, is_singular(surface, uv))
        })
        .collect();

    // Unwrap regular points against the previous regular point.
    let mut unwrapped: Vec<Option<Point2>> = Vec::with_capacity(raw.len());
    let mut last: Option<Point2> = None;
    for &(uv, singular) in &raw {
        if singular {
            unwrapped.push(None);
            continue;
        }
        let uv = match last {
            Some(prev) => Point2::new(
                prev.x + wrap(uv.x - prev.x),
                if periodic_v {
                    prev.y + wrap(uv.y - prev.y)
                } else {
                    uv.y
                },
            ),
            None => uv,
        };
        last = Some(uv);
        unwrapped.push(Some(uv));
    }

    let regular: Vec<usize> = (0..raw.len()).filter(|&i| unwrapped[i].is_some()).collect();
    let mut points = Vec::with_capacity(raw.len() + 2);
    for (i, &(p, straight)) in xyz.iter().enumerate() {
        match unwrapped[i] {
            Some(uv) => points.push(DomainPoint {
                uv,
                xyz: Some(p),
                straight,
            }),
            None => {
                let v = raw[i].0.y;
                let prev = regular.iter().rev().find(|&&j| j < i).or(regular.last());
                let next = regular.iter().find(|&&j| j > i).or(regular.first());
                let mut us: Vec<f64> = Vec::with_capacity(2);
                if let Some(&j) = prev {
                    us.push(unwrapped[j].map_or(0.0, |q| q.x));
                }
                if let Some(&j) = next {
                    let u = unwrapped[j].map_or(0.0, |q| q.x);
                    if us.last().map_or(true, |&x| (x - u).abs() > 1e-12) {
                        us.push(u);
                    }
                }
                if us.is_empty() {
                    us.push(raw[i].0.x);
                }
                for u in us {
                    points.push(DomainPoint {
                        uv: Point2::new(u, v),
                        xyz: Some(p),
                        straight: true,
                    });
                }
            }
        }
    }

    let bounds = points.iter().fold(
        (
            Point2::new(f64::INFINITY, f64::INFINITY),
            Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(lo, hi), p| (lo.inf(&p.uv), hi.sup(&p.uv)),
    );
    // Winding comes first: the closing segment of a winding loop jumps back
    // by whole periods and is only a spike once that jump is undone.
    let winding = turns(&points, |p| p.x);
    let v_winding = if periodic_v { turns(&points, |p| p.y) } else { 0 };
    let period = Vec2::new(winding as f64 * TAU, v_winding as f64 * TAU);
    let mut points = remove_spikes(points, period);
    if points.len() > 1
        && points
            .first()
            .zip(points.last())
            .is_some_and(|(a, b)| match (a.xyz, b.xyz) {
                (Some(p), Some(q)) => (p - q).norm() < 1e-9,
                _ => false,
            })
    {
        points.pop();
    }

    UvLoop {
        points,
        winding,
        v_winding,
        bounds,
    }
}

/// Net travel of one coordinate around the closed ring, in whole periods.
fn turns(points: &[DomainPoint], coord: impl Fn(&Point2) -> f64) -> i64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 => {
            let (a, b) = (coord(&first.uv), coord(&last.uv));
            ((b - a + wrap(a - b)) / TAU).round() as i64
        }
        _ => 0,
    }
}

impl UvLoop {
    /// Swap the roles of `u` and `v`.
    fn transpose(&mut self) {
        for p in &mut self.points {
            p.uv = Point2::new(p.uv.y, p.uv.x);
        }
        std::mem::swap(&mut self.winding, &mut self.v_winding);
        let (lo, hi) = self.bounds;
        self.bounds = (Point2::new(lo.y, lo.x), Point2::new(hi.y, hi.x));
    }
}

fn same_uv(a: &DomainPoint, b: &DomainPoint) -> bool {
    (a.uv - b.uv).norm() < 1e-12
}

fn is_spike(a: Point2, b: Point2, c: Point2) -> bool {
    let (ab, bc) = (b - a, c - b);
    let cross = ab.x * bc.y - ab.y * bc.x;
    cross.abs() <= 1e-9 * ab.norm() * bc.norm() && ab.dot(&bc) < 0.0
}

/// Collapse zero-width excursions, such as a seam edge walked up and back
/// down at the same `u`, and repeated points.
///
/// `period` is the parameter offset between the first point and the point
/// that follows the last one around the ring.
fn remove_spikes(points: Vec<DomainPoint>, period: Vec2) -> Vec<DomainPoint> {
    let mut out: Vec<DomainPoint> = Vec::with_capacity(points.len());
    for p in points {
        out.push(p);
        loop {
            let n = out.len();
            if n >= 2 && same_uv(&out[n - 2], &out[n - 1]) {
                let straight = out[n - 1].straight;
                out.pop();
                out[n - 2].straight = straight;
                continue;
            }
            if n >= 3 && is_spike(out[n - 3].uv, out[n - 2].uv, out[n - 1].uv) {
                out.remove(n - 2);
                continue;
            }
            break;
        }
    }
    loop {
        let n = out.len();
        if n < 3 {
            break;
        }
        let after_last = out[0].uv + period;
        if (out[n - 1].uv - after_last).norm() < 1e-12
            || is_spike(out[n - 2].uv, out[n - 1].uv, after_last)
        {
            out.pop();
            continue;
        }
        if is_spike(out[n - 1].uv - period, out[0].uv, out[1].uv) {
            out.remove(0);
            continue;
        }
        break;
    }
    out
}

/// Reverse a ring in place, keeping each straightness flag on the
/// segment it described.
fn reverse_ring(ring: &mut [DomainPoint]) {
    let n = ring.len();
    if n == 0 {
        return;
    }
    let flags: Vec<bool> = ring.iter().map(|p| p.straight).collect();
    ring.reverse();
    for (i, p) in ring.iter_mut().enumerate() {
        // Point i now leaves along the segment that used to arrive at it.
        p.straight = flags[(2 * n - i - 2) % n];
    }
}

/// Rewrite a loop that winds once around `u` as a chain running in
/// increasing `u` from its leftmost point to that point shifted by `2π`.
fn open_winding_loop(lp: &UvLoop) -> Vec<DomainPoint> {
    let mut pts = lp.points.clone();
    if lp.winding < 0 {
        reverse_ring(&mut pts);
    }

    let start = (0..pts.len())
        .min_by(|&a, &b| {
            pts[a]
                .uv
                .x
                .rem_euclid(TAU)
                .total_cmp(&pts[b].uv.x.rem_euclid(TAU))
        })
        .unwrap_or(0);
    for p in &mut pts[..start] {
        p.uv.x += TAU;
    }
    pts.rotate_left(start);

    let shift = pts.first().map_or(0.0, |p| p.uv.x.rem_euclid(TAU) - p.uv.x);
    shift_u(&mut pts, shift);
    if let Some(first) = pts.first().copied() {
        let mut closing = first;
        closing.uv.x += TAU;
        closing.straight = true;
        pts.push(closing);
    }
    pts
}

fn orient_ring(mut ring: Vec<DomainPoint>, ccw: bool) -> Vec<DomainPoint> {
    if (ring_area(&ring) > 0.0) != ccw {
        reverse_ring(&mut ring);
    }
    ring
}

fn shift_u(ring: &mut [DomainPoint], du: f64) {
    for p in ring {
        p.uv.x += du;
    }
}

/// `v` of the pole or apex closing a face bounded by one winding loop.
fn pole_v(
    surface: &dyn Surface,
    vertex_loops: &[Point3],
    above: bool,
) -> Result<f64, String> {
    if let Some(p) = vertex_loops.first() {
        return Ok(surface.project(p).y);
    }
    match surface.surface_type() {
        SurfaceKind::Sphere => Ok(if above { FRAC_PI_2 } else { -FRAC_PI_2 }),
        SurfaceKind::Cone => surface
            .as_any()
            .downcast_ref::<ConeSurface>()
            .map(|c| -c.radius / c.half_angle.tan())
            .ok_or_else(|| "cone surface without cone geometry".to_string()),
        kind => Err(format!(
            "face loop wraps around {kind:?} surface without a closing boundary"
        )),
    }
}

fn band_domain(
    surface: &dyn Surface,
    face: &Face,
    winding: Vec<UvLoop>,
    vertex_loops: &[Point3],
) -> Result<Vec<DomainPoint>, String> {
    let mut chains: Vec<(Vec<DomainPoint>, UvLoop)> = winding
        .into_iter()
        .map(|lp| (open_winding_loop(&lp), lp))
        .collect();

    match chains.len() {
        2 => {
            chains.sort_by(|a, b| mean(&a.0, |p| p.y).total_cmp(&mean(&b.0, |p| p.y)));
            let (lower, upper) = (&chains[0].0, &chains[1].0);
            let mut ring: Vec<DomainPoint> = lower.clone();
            if let Some(last) = ring.last_mut() {
                last.straight = true;
            }
            let mut top: Vec<DomainPoint> = upper.iter().rev().copied().collect();
            let n = top.len();
            for i in 0..n {
                // Descending traversal leaves each point along the segment
                // that ascends into it.
                top[i].straight = if i + 1 < n { upper[n - 2 - i].straight } else { true };
            }
            ring.extend(top);
            Ok(ring)
        }
        1 => {
            let (chain, lp) = &chains[0];
            let above = (lp.winding > 0) == face.same_sense;
            let v = pole_v(surface, vertex_loops, above)?;
            let (u0, u1) = match (chain.first(), chain.last()) {
                (Some(a), Some(b)) => (a.uv.x, b.uv.x),
                _ => return Err("empty boundary loop".to_string()),
            };
            let chain_v = mean(chain, |p| p.y);
            if above != (v > chain_v) {
                return Err("pole lies on the wrong side of the face boundary".to_string());
            }
            let mut ring = Vec::with_capacity(chain.len() + 2);
            if above {
                ring.extend(chain.iter().copied());
                if let Some(last) = ring.last_mut() {
                    last.straight = true;
                }
                ring.push(DomainPoint::synthetic(u1, v));
                ring.push(DomainPoint::synthetic(u0, v));
            } else {
                ring.push(DomainPoint::synthetic(u0, v));
                ring.push(DomainPoint::synthetic(u1, v));
                let n = chain.len();
                for i in (0..n).rev() {
                    let mut p = chain[i];
                    p.straight = if i > 0 { chain[i - 1].straight } else { true };
                    ring.push(p);
                }
            }
            Ok(ring)
        }
        n => Err(format!("{n} boundary loops wrap around the surface")),
    }
}

/// Full periodic rectangle, for faces bounded only by seams (or nothing).
fn full_domain(
    surface: &dyn Surface,
    seam: Option<(Point2, Point2)>,
) -> Result<Vec<DomainPoint>, String> {
    let (u0, mut v0, mut v1) = match seam {
        Some((lo, hi)) if lo.x.is_finite() => (lo.x, lo.y, hi.y),
        _ => (-PI, f64::NAN, f64::NAN),
    };
    match surface.surface_type() {
        SurfaceKind::Sphere if !(v1 - v0 > 1e-9) => {
            v0 = -FRAC_PI_2;
            v1 = FRAC_PI_2;
        }
        SurfaceKind::Torus => {
            if !v0.is_finite() {
                v0 = -PI;
            }
            v1 = v0 + TAU;
        }
        _ if !(v1 - v0 > 1e-9) => {
            return Err(format!(
                "{:?} face has no bounded extent",
                surface.surface_type()
            ));
        }
        _ => {}
    }
    let u1 = u0 + TAU;
    Ok(vec![
        DomainPoint::synthetic(u0, v0),
        DomainPoint::synthetic(u1, v0),
        DomainPoint::synthetic(u1, v1),
        DomainPoint::synthetic(u0, v1),
    ])
}

/// Build the parameter-space domain of a face on a periodic surface.
pub(crate) fn build_domain(
    face: &Face,
    face_index: usize,
    params: &TessellationParams,
) -> Result<Domain, TessellationError> {
    let surface: &dyn Surface = face.surface.as_ref();
    let fail = |message: String| TessellationError::Face {
        index: face_index,
        message,
    };

    let mut vertex_loops = Vec::new();
    let mut lifted: Vec<(UvLoop, bool)> = Vec::new();
    for lp in &face.loops {
        match lp {
            FaceLoop::Vertex(p) => vertex_loops.push(*p),
            FaceLoop::Edges { edges, is_outer } => {
                let samples: Vec<(Point3, bool)> = sample_loop(edges, params)
                    .into_iter()
                    .map(|b| (b.xyz, b.straight))
                    .collect();
                if samples.len() < 2 {
                    continue;
                }
                lifted.push((lift_loop(surface, &samples), *is_outer));
            }
        }
    }

    // Loops circling a torus tube wind in v: solve with u and v swapped.
    let transposed = lifted.iter().all(|(lp, _)| lp.winding == 0)
        && lifted.iter().any(|(lp, _)| lp.v_winding != 0);
    if transposed {
        for (lp, _) in &mut lifted {
            lp.transpose();
        }
    }

    let (winding, mut plain): (Vec<_>, Vec<_>) =
        lifted.into_iter().partition(|(lp, _)| lp.winding != 0);

    let outer = if !winding.is_empty() {
        band_domain(
            surface,
            face,
            winding.into_iter().map(|(lp, _)| lp).collect(),
            &vertex_loops,
        )
        .map_err(fail)?
    } else {
        // Pick the declared outer loop, else the largest.
        let pick = plain.iter().position(|(_, outer)| *outer).or_else(|| {
            (0..plain.len()).max_by(|&a, &b| {
                ring_area(&plain[a].0.points)
                    .abs()
                    .total_cmp(&ring_area(&plain[b].0.points).abs())
            })
        });
        match pick {
            Some(i) => {
                let (lp, _) = plain.remove(i);
                if ring_area(&lp.points).abs() > 1e-9 {
                    lp.points
                } else {
                    full_domain(surface, Some(lp.bounds)).map_err(fail)?
                }
            }
            None => full_domain(surface, None).map_err(fail)?,
        }
    };
    let outer = orient_ring(outer, true);
    if outer.len() < 3 {
        return Err(fail("degenerate outer boundary".to_string()));
    }
    let center_u = mean(&outer, |p| p.x);

    let mut holes = Vec::new();
    for (lp, _) in plain {
        let mut ring = lp.points;
        if ring.len() < 3 || ring_area(&ring).abs() <= 1e-9 {
            continue;
        }
        let k = ((center_u - mean(&ring, |p| p.x)) / TAU).round();
        shift_u(&mut ring, k * TAU);
        holes.push(orient_ring(ring, false));
    }

    let mut domain = Domain { outer, holes };
    if transposed {
        // Swapping coordinates mirrors the rings; reversing restores winding.
        for ring in std::iter::once(&mut domain.outer).chain(domain.holes.iter_mut()) {
            for p in ring.iter_mut() {
                p.uv = Point2::new(p.uv.y, p.uv.x);
            }
            reverse_ring(ring);
        }
    }
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepmesh_kernel_geom::CylinderSurface;
    use stepmesh_kernel_math::{Dir3, Vec3};

    fn cylinder() -> CylinderSurface {
        CylinderSurface {
            center: Point3::origin(),
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            radius: 2.0,
        }
    }

    fn circle_at(z: f64, n: usize) -> Vec<(Point3, bool)> {
        (0..n)
            .map(|k| {
                let t = TAU * k as f64 / n as f64;
                (Point3::new(2.0 * t.cos(), 2.0 * t.sin(), z), false)
            })
            .collect()
    }

    #[test]
    fn test_full_circle_keeps_its_points_and_winds_once() {
        let lp = lift_loop(&cylinder(), &circle_at(1.5, 16));
        assert_eq!(lp.points.len(), 16);
        assert_eq!(lp.winding, 1);
        assert!(lp.points.iter().all(|p| (p.uv.y - 1.5).abs() < 1e-9));

        let mut reversed = circle_at(1.5, 16);
        reversed.reverse();
        assert_eq!(lift_loop(&cylinder(), &reversed).winding, -1);
    }

    #[test]
    fn test_seam_excursion_collapses() {
        // Up the seam at u = 0 and straight back down is a zero-width spike.
        let p = |u: f64, v: f64| DomainPoint::synthetic(u, v);
        let ring = vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(1.0, 2.0), p(1.0, 1.0), p(0.0, 1.0)];
        let out = remove_spikes(ring, Vec2::zeros());
        let uv: Vec<(f64, f64)> = out.iter().map(|p| (p.uv.x, p.uv.y)).collect();
        assert_eq!(uv, vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    }

    #[test]
    fn test_two_circles_make_a_band() {
        let surface = cylinder();
        let bottom = lift_loop(&surface, &circle_at(0.0, 16));
        let mut top_pts = circle_at(4.0, 16);
        top_pts.reverse();
        let top = lift_loop(&surface, &top_pts);

        let face = Face {
            surface: Box::new(surface.clone()),
            same_sense: true,
            loops: Vec::new(),
        };
        let ring = orient_ring(band_domain(&surface, &face, vec![bottom, top], &[]).unwrap(), true);
        let vs: Vec<f64> = ring.iter().map(|p| p.uv.y).collect();
        assert!(vs.iter().all(|&v| v.abs() < 1e-9 || (v - 4.0).abs() < 1e-9));
        assert!((ring_area(&ring) - TAU * 4.0).abs() < 1e-9);
    }
}
