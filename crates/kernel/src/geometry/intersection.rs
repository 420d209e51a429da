//! Curve/curve, curve/surface and ray/surface intersection.
//!
//! Curve/curve and curve/surface work on bounded parameter ranges and return
//! *common parts*: isolated contacts (`Vertex`) or stretches where the two
//! entities stay within tolerance of each other (`Edge`). Each vertex also
//! carries the parameter range around it where the distance stays within
//! tolerance, which callers use to widen vertex tolerances at near-tangent
//! contacts.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::GeometryError;

use super::curves::{Curve, Line3d};
use super::point::Point3d;
use super::surfaces::{Cylinder, Plane, Sphere, Surface};
use super::vector::Vec3;

/// Samples along the first curve's range used to bracket contacts.
pub const INTERSECTION_SAMPLES: usize = 64;

/// Default number of outward steps used to bracket a contact's common range.
pub const DEFAULT_RANGE_STEPS: usize = 16;

/// Common part of two curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommonPart {
    Vertex {
        param1: f64,
        param2: f64,
        point: Point3d,
        /// Range on the first curve where the curves stay within tolerance.
        range1: (f64, f64),
    },
    Edge {
        range1: (f64, f64),
        range2: (f64, f64),
    },
}

/// Common part of a curve and a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CurveSurfaceContact {
    Vertex {
        param: f64,
        uv: (f64, f64),
        point: Point3d,
        /// Range on the curve where it stays within tolerance of the surface.
        range: (f64, f64),
    },
    Edge { range: (f64, f64) },
}

/// A half-line used for parity classification.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Point3d, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f64) -> Point3d {
        self.origin + self.direction * t
    }
}

// ─── Scalar contact search ───────────────────────────────────────────────────

/// Contacts of a scalar distance function with zero, within `tol`.
#[derive(Debug, Default)]
struct ScalarContacts {
    /// Stretches spanning at least two consecutive samples.
    runs: Vec<(f64, f64)>,
    /// Isolated contacts: parameter and common range.
    points: Vec<(f64, (f64, f64))>,
}

fn bisect(mut inside: f64, mut outside: f64, pred: impl Fn(f64) -> bool) -> f64 {
    for _ in 0..60 {
        let mid = 0.5 * (inside + outside);
        if pred(mid) {
            inside = mid;
        } else {
            outside = mid;
        }
    }
    inside
}

fn golden_section_min(f: impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_9;
    let mut c = b - (b - a) * INV_PHI;
    let mut d = a + (b - a) * INV_PHI;
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..120 {
        if (b - a).abs() < 1e-15 * (1.0 + a.abs().max(b.abs())) {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - (b - a) * INV_PHI;
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + (b - a) * INV_PHI;
            fd = f(d);
        }
    }
    0.5 * (a + b)
}

/// Range around `t` where `|f| <= tol`, stepping outward in `steps` steps of
/// one sample width before bisecting the boundary.
fn common_range(
    f: &impl Fn(f64) -> f64,
    t: f64,
    bounds: (f64, f64),
    sample_step: f64,
    tol: f64,
    steps: usize,
) -> (f64, f64) {
    let h = sample_step / steps.max(1) as f64;
    let within = |x: f64| f(x).abs() <= tol;
    let walk = |dir: f64, limit: f64| -> f64 {
        let mut last_in = t;
        for k in 1..=steps.max(1) {
            let x = t + dir * h * k as f64;
            let beyond = if dir > 0.0 { x >= limit } else { x <= limit };
            if beyond {
                return if within(limit) {
                    limit
                } else {
                    bisect(last_in, limit, within)
                };
            }
            if !within(x) {
                return bisect(last_in, x, within);
            }
            last_in = x;
        }
        last_in
    };
    let lo = walk(-1.0, bounds.0);
    let hi = walk(1.0, bounds.1);
    (lo.min(t), hi.max(t))
}

/// Sample `f` over `[t0, t1]`, then split the contacts into runs and
/// isolated points. Sign changes are only looked for when `signed` is set.
/// On a `closed` range the two bounds are the same point, so a contact found
/// at both ends is reported once, at `t0`.
fn find_contacts(
    f: impl Fn(f64) -> f64,
    signed: bool,
    closed: bool,
    t0: f64,
    t1: f64,
    tol: f64,
    range_steps: usize,
) -> ScalarContacts {
    let n = INTERSECTION_SAMPLES;
    let step = (t1 - t0) / n as f64;
    let ts: Vec<f64> = (0..=n).map(|i| t0 + step * i as f64).collect();
    let vs: Vec<f64> = ts.iter().map(|&t| f(t)).collect();
    let within = |x: f64| f(x).abs() <= tol;
    let mut contacts = ScalarContacts::default();

    let mut in_run = vec![false; n + 1];
    let mut i = 0;
    while i <= n {
        if vs[i].abs() > tol {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < n && vs[j + 1].abs() <= tol {
            j += 1;
        }
        if j > i {
            let lo = if i == 0 { t0 } else { bisect(ts[i], ts[i - 1], within) };
            let hi = if j == n { t1 } else { bisect(ts[j], ts[j + 1], within) };
            contacts.runs.push((lo, hi));
            in_run[i..=j].iter_mut().for_each(|flag| *flag = true);
        }
        i = j + 1;
    }

    let mut candidates: Vec<f64> = Vec::new();
    if signed {
        for k in 0..n {
            if in_run[k] || in_run[k + 1] {
                continue;
            }
            if vs[k] * vs[k + 1] < 0.0 {
                let positive_first = vs[k] > 0.0;
                let root = bisect(ts[k], ts[k + 1], |x| (f(x) > 0.0) == positive_first);
                candidates.push(root);
            }
        }
    }
    let abs_f = |x: f64| f(x).abs();
    for k in 0..=n {
        if in_run[k] {
            continue;
        }
        let a = vs[k].abs();
        let left_ok = k == 0 || a <= vs[k - 1].abs();
        let right_ok = k == n || a <= vs[k + 1].abs();
        if !(left_ok && right_ok) {
            continue;
        }
        let lo = ts[k.saturating_sub(1)];
        let hi = ts[(k + 1).min(n)];
        let t = golden_section_min(abs_f, lo, hi);
        // Endpoint minima can sit exactly on the bound.
        let t = if abs_f(ts[k]) < abs_f(t) { ts[k] } else { t };
        candidates.push(t);
    }

    candidates.sort_by(|a, b| a.total_cmp(b));
    for t in candidates {
        if abs_f(t) > tol {
            continue;
        }
        if contacts.runs.iter().any(|&(lo, hi)| t >= lo && t <= hi) {
            continue;
        }
        if contacts
            .points
            .iter()
            .any(|&(_, (lo, hi))| t >= lo - step * 1e-9 && t <= hi + step * 1e-9)
        {
            continue;
        }
        let range = common_range(&f, t, (t0, t1), step, tol, range_steps);
        contacts.points.push((t, range));
    }

    if closed && contacts.points.len() > 1 {
        let first_at_start = contacts.points.first().is_some_and(|&(_, (lo, _))| lo <= t0);
        let last_at_end = contacts.points.last().is_some_and(|&(_, (_, hi))| hi >= t1);
        if first_at_start && last_at_end {
            contacts.points.pop();
        }
    }
    contacts
}

fn spans_period(curve: &Curve, range: (f64, f64)) -> bool {
    curve
        .period()
        .is_some_and(|p| range.1 - range.0 >= p - 1e-12)
}

// ─── Curve–Curve ─────────────────────────────────────────────────────────────

/// Closest points between two infinite lines; `None` if parallel.
/// Returns `(t1, t2, distance)`.
pub fn line_line_closest(l1: &Line3d, l2: &Line3d) -> Option<(f64, f64, f64)> {
    let w = l1.origin - l2.origin;
    let a = l1.direction.dot(&l1.direction);
    let b = l1.direction.dot(&l2.direction);
    let c = l2.direction.dot(&l2.direction);
    let d = l1.direction.dot(&w);
    let e = l2.direction.dot(&w);

    let denom = a * c - b * b;
    if denom.abs() < 1e-15 {
        return None;
    }

    let t1 = (b * e - c * d) / denom;
    let t2 = (a * e - b * d) / denom;
    let dist = l1.evaluate(t1).distance_to(&l2.evaluate(t2));
    Some((t1, t2, dist))
}

fn sorted(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn line_line(
    l1: &Line3d,
    r1: (f64, f64),
    l2: &Line3d,
    r2: (f64, f64),
    tol: f64,
) -> Vec<CommonPart> {
    let sin = l1.direction.cross(&l2.direction).length();
    if sin < 1e-12 {
        if l1.distance_to_point(&l2.origin) > tol {
            return Vec::new();
        }
        let (lo2, hi2) = sorted(
            l1.closest_point(&l2.evaluate(r2.0)).1,
            l1.closest_point(&l2.evaluate(r2.1)).1,
        );
        let lo = r1.0.max(lo2);
        let hi = r1.1.min(hi2);
        if hi - lo > tol {
            let range2 = sorted(
                l2.closest_point(&l1.evaluate(lo)).1,
                l2.closest_point(&l1.evaluate(hi)).1,
            );
            return vec![CommonPart::Edge {
                range1: (lo, hi),
                range2,
            }];
        }
        if hi - lo < -tol {
            return Vec::new();
        }
        let t1 = (0.5 * (lo + hi)).clamp(r1.0, r1.1);
        let p1 = l1.evaluate(t1);
        let t2 = l2.closest_point(&p1).1.clamp(r2.0, r2.1);
        let p2 = l2.evaluate(t2);
        if p1.distance_to(&p2) > tol {
            return Vec::new();
        }
        return vec![CommonPart::Vertex {
            param1: t1,
            param2: t2,
            point: p1.midpoint(&p2),
            range1: (t1, t1),
        }];
    }

    let Some((t1, _, _)) = line_line_closest(l1, l2) else {
        return Vec::new();
    };
    let t1 = t1.clamp(r1.0, r1.1);
    let t2 = l2.closest_point(&l1.evaluate(t1)).1.clamp(r2.0, r2.1);
    let t1 = l1.closest_point(&l2.evaluate(t2)).1.clamp(r1.0, r1.1);
    let p1 = l1.evaluate(t1);
    let p2 = l2.evaluate(t2);
    let dist = p1.distance_to(&p2);
    if dist > tol {
        return Vec::new();
    }
    let half_width = (tol * tol - dist * dist).max(0.0).sqrt() / sin;
    vec![CommonPart::Vertex {
        param1: t1,
        param2: t2,
        point: p1.midpoint(&p2),
        range1: ((t1 - half_width).max(r1.0), (t1 + half_width).min(r1.1)),
    }]
}

/// Gauss-Newton refinement of a pair of parameters minimising
/// `|c1(t1) - c2(t2)|`, kept inside the ranges.
fn refine_pair(
    c1: &Curve,
    r1: (f64, f64),
    c2: &Curve,
    r2: (f64, f64),
    mut t1: f64,
    mut t2: f64,
) -> (f64, f64) {
    for _ in 0..20 {
        let diff = c1.evaluate(t1) - c2.evaluate(t2);
        let d1 = c1.derivative(t1);
        let d2 = c2.derivative(t2);
        let jtj = Matrix2::new(d1.dot(&d1), -d1.dot(&d2), -d1.dot(&d2), d2.dot(&d2));
        let rhs = Vector2::new(-diff.dot(&d1), diff.dot(&d2));
        let Some(delta) = jtj.lu().solve(&rhs) else {
            break;
        };
        let n1 = (t1 + delta[0]).clamp(r1.0, r1.1);
        let n2 = (t2 + delta[1]).clamp(r2.0, r2.1);
        let done = (n1 - t1).abs() < 1e-14 && (n2 - t2).abs() < 1e-14;
        t1 = n1;
        t2 = n2;
        if done {
            break;
        }
    }
    (t1, t2)
}

/// Common parts of `c1` on `r1` and `c2` on `r2` within `tol`.
pub fn intersect_curves(
    c1: &Curve,
    r1: (f64, f64),
    c2: &Curve,
    r2: (f64, f64),
    tol: f64,
    range_steps: usize,
) -> Result<Vec<CommonPart>, GeometryError> {
    if r1.1 < r1.0 || r2.1 < r2.0 {
        return Err(GeometryError::Degenerate {
            reason: "inverted parameter range".into(),
        });
    }
    if let (Curve::Line(l1), Curve::Line(l2)) = (c1, c2) {
        return Ok(line_line(l1, r1, l2, r2, tol));
    }

    let distance = |t: f64| c2.closest_parameter(&c1.evaluate(t), r2.0, r2.1).1;
    let closed = spans_period(c1, r1);
    let contacts = find_contacts(distance, false, closed, r1.0, r1.1, tol, range_steps);

    let mut parts = Vec::new();
    for (lo, hi) in contacts.runs {
        let s0 = c2.closest_parameter(&c1.evaluate(lo), r2.0, r2.1).0;
        let s1 = c2.closest_parameter(&c1.evaluate(hi), r2.0, r2.1).0;
        parts.push(CommonPart::Edge {
            range1: (lo, hi),
            range2: sorted(s0, s1),
        });
    }
    for (t, range1) in contacts.points {
        let s = c2.closest_parameter(&c1.evaluate(t), r2.0, r2.1).0;
        let (t1, t2) = refine_pair(c1, r1, c2, r2, t, s);
        let (t1, t2) = if c1.evaluate(t1).distance_to(&c2.evaluate(t2))
            <= c1.evaluate(t).distance_to(&c2.evaluate(s))
        {
            (t1, t2)
        } else {
            (t, s)
        };
        let p1 = c1.evaluate(t1);
        let p2 = c2.evaluate(t2);
        if p1.distance_to(&p2) > tol {
            continue;
        }
        parts.push(CommonPart::Vertex {
            param1: t1,
            param2: t2,
            point: p1.midpoint(&p2),
            range1: (range1.0.min(t1), range1.1.max(t1)),
        });
    }
    Ok(parts)
}

// ─── Curve–Surface ───────────────────────────────────────────────────────────

/// Common parts of `curve` on `range` with `surface` within `tol`.
pub fn intersect_curve_surface(
    curve: &Curve,
    range: (f64, f64),
    surface: &Surface,
    tol: f64,
    range_steps: usize,
) -> Result<Vec<CurveSurfaceContact>, GeometryError> {
    if range.1 < range.0 {
        return Err(GeometryError::Degenerate {
            reason: "inverted parameter range".into(),
        });
    }
    let signed = |t: f64| surface.signed_distance(&curve.evaluate(t));
    let closed = spans_period(curve, range);
    let contacts = find_contacts(signed, true, closed, range.0, range.1, tol, range_steps);

    let mut parts: Vec<CurveSurfaceContact> = contacts
        .runs
        .into_iter()
        .map(|range| CurveSurfaceContact::Edge { range })
        .collect();
    for (t, common) in contacts.points {
        let point = curve.evaluate(t);
        let uv = surface.parameters_of(&point)?;
        parts.push(CurveSurfaceContact::Vertex {
            param: t,
            uv,
            point,
            range: common,
        });
    }
    Ok(parts)
}

// ─── Ray–Surface ─────────────────────────────────────────────────────────────

fn ray_plane(ray: &Ray, plane: &Plane) -> Vec<f64> {
    let denom = ray.direction.dot(&plane.normal);
    if denom.abs() < 1e-15 {
        return Vec::new();
    }
    let t = (plane.origin - ray.origin).dot(&plane.normal) / denom;
    if t < 0.0 {
        Vec::new()
    } else {
        vec![t]
    }
}

fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a.abs() < 1e-15 {
        return Vec::new();
    }
    let sqrt_disc = discriminant.sqrt();
    let mut roots: Vec<f64> = [-1.0, 1.0]
        .iter()
        .map(|sign| (-b + sign * sqrt_disc) / (2.0 * a))
        .filter(|t| *t >= 0.0)
        .collect();
    roots.sort_by(|a, b| a.total_cmp(b));
    roots.dedup_by(|a, b| (*a - *b).abs() < 1e-15);
    roots
}

fn ray_sphere(ray: &Ray, sphere: &Sphere) -> Vec<f64> {
    let oc = ray.origin - sphere.center;
    quadratic_roots(
        ray.direction.dot(&ray.direction),
        2.0 * oc.dot(&ray.direction),
        oc.dot(&oc) - sphere.radius * sphere.radius,
    )
}

fn ray_cylinder(ray: &Ray, cyl: &Cylinder) -> Vec<f64> {
    let oc = ray.origin - cyl.origin;
    let d_proj = ray.direction - cyl.axis * ray.direction.dot(&cyl.axis);
    let oc_proj = oc - cyl.axis * oc.dot(&cyl.axis);
    quadratic_roots(
        d_proj.dot(&d_proj),
        2.0 * d_proj.dot(&oc_proj),
        oc_proj.dot(&oc_proj) - cyl.radius * cyl.radius,
    )
}

/// Forward ray parameters where the ray crosses `surface`, ascending.
pub fn ray_surface(ray: &Ray, surface: &Surface) -> Vec<f64> {
    match surface {
        Surface::Plane(p) => ray_plane(ray, p),
        Surface::Sphere(s) => ray_sphere(ray, s),
        Surface::Cylinder(c) => ray_cylinder(ray, c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::Circle3d;
    use approx::assert_relative_eq;
    use std::f64::consts::{PI, TAU};

    fn line(a: (f64, f64, f64), b: (f64, f64, f64)) -> (Curve, (f64, f64)) {
        let pa = Point3d::new(a.0, a.1, a.2);
        let pb = Point3d::new(b.0, b.1, b.2);
        (Curve::Line(Line3d::from_points(pa, pb)), (0.0, pa.distance_to(&pb)))
    }

    #[test]
    fn crossing_segments_meet_in_one_vertex() {
        let (c1, r1) = line((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let (c2, r2) = line((4.0, -5.0, 0.0), (4.0, 5.0, 0.0));
        let parts = intersect_curves(&c1, r1, &c2, r2, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        assert_eq!(parts.len(), 1);
        match parts[0] {
            CommonPart::Vertex { param1, param2, point, .. } => {
                assert_relative_eq!(param1, 4.0, epsilon = 1e-9);
                assert_relative_eq!(param2, 5.0, epsilon = 1e-9);
                assert!(point.distance_to(&Point3d::new(4.0, 0.0, 0.0)) < 1e-9);
            }
            other => panic!("expected vertex, got {other:?}"),
        }
    }

    #[test]
    fn skew_segments_do_not_meet() {
        let (c1, r1) = line((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let (c2, r2) = line((4.0, -5.0, 1.0), (4.0, 5.0, 1.0));
        let parts = intersect_curves(&c1, r1, &c2, r2, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        assert!(parts.is_empty());
    }

    #[test]
    fn collinear_segments_share_an_edge() {
        let (c1, r1) = line((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let (c2, r2) = line((5.0, 0.0, 0.0), (15.0, 0.0, 0.0));
        let parts = intersect_curves(&c1, r1, &c2, r2, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        assert_eq!(
            parts,
            vec![CommonPart::Edge {
                range1: (5.0, 10.0),
                range2: (0.0, 5.0)
            }]
        );
    }

    #[test]
    fn circle_crossing_line_twice() {
        let circle = Curve::Circle(Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 5.0));
        let (l, r) = line((-10.0, 3.0, 0.0), (10.0, 3.0, 0.0));
        let parts = intersect_curves(&circle, (0.0, TAU), &l, r, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        let mut params: Vec<f64> = parts
            .iter()
            .map(|p| match p {
                CommonPart::Vertex { param1, .. } => *param1,
                CommonPart::Edge { .. } => panic!("unexpected overlap"),
            })
            .collect();
        params.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(params.len(), 2);
        assert_relative_eq!(params[0], (3.0f64 / 5.0).asin(), epsilon = 1e-7);
        assert_relative_eq!(params[1], PI - (3.0f64 / 5.0).asin(), epsilon = 1e-7);
    }

    #[test]
    fn segment_pierces_plane() {
        let (c, r) = line((0.0, 0.0, -5.0), (0.0, 0.0, 5.0));
        let plane = Surface::Plane(Plane::xy());
        let parts = intersect_curve_surface(&c, r, &plane, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        assert_eq!(parts.len(), 1);
        match parts[0] {
            CurveSurfaceContact::Vertex { param, range, .. } => {
                assert_relative_eq!(param, 5.0, epsilon = 1e-9);
                assert!(range.0 <= param && range.1 >= param);
                assert!(range.1 - range.0 < 1e-6);
            }
            other => panic!("expected vertex, got {other:?}"),
        }
    }

    #[test]
    fn segment_lying_in_plane_is_an_edge() {
        let (c, r) = line((0.0, 0.0, 0.0), (3.0, 4.0, 0.0));
        let plane = Surface::Plane(Plane::xy());
        let parts = intersect_curve_surface(&c, r, &plane, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        assert_eq!(parts, vec![CurveSurfaceContact::Edge { range: (0.0, 5.0) }]);
    }

    #[test]
    fn circle_tangent_to_plane() {
        let circle = Curve::Circle(Circle3d::with_axes(Point3d::ORIGIN, Vec3::Y, Vec3::Z, 2.0));
        let plane = Surface::Plane(Plane::new(Point3d::new(0.0, 0.0, 2.0), Vec3::Z));
        let parts =
            intersect_curve_surface(&circle, (0.0, TAU), &plane, 1e-7, DEFAULT_RANGE_STEPS).unwrap();
        assert_eq!(parts.len(), 1);
        match parts[0] {
            CurveSurfaceContact::Vertex { point, range, .. } => {
                assert!(point.distance_to(&Point3d::new(0.0, 0.0, 2.0)) < 1e-6);
                // The tangent contact keeps a visible common range.
                assert!(range.1 - range.0 > 1e-5);
            }
            other => panic!("expected vertex, got {other:?}"),
        }
    }

    #[test]
    fn ray_hits_sphere_twice() {
        let ray = Ray::new(Point3d::new(-10.0, 0.0, 0.0), Vec3::X);
        let hits = ray_surface(&ray, &Surface::Sphere(Sphere::new(Point3d::ORIGIN, 2.0)));
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0], 8.0, epsilon = 1e-12);
        assert_relative_eq!(hits[1], 12.0, epsilon = 1e-12);
    }

    #[test]
    fn ray_behind_plane_misses() {
        let ray = Ray::new(Point3d::new(0.0, 0.0, 1.0), Vec3::Z);
        assert!(ray_surface(&ray, &Surface::Plane(Plane::xy())).is_empty());
        let ray = Ray::new(Point3d::new(0.0, 0.0, 1.0), -Vec3::Z);
        assert_eq!(ray_surface(&ray, &Surface::Plane(Plane::xy())), vec![1.0]);
    }
}
