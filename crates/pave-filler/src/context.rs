//! Point classification against faces and solids.
//!
//! Face classifiers are built once per face and shared read-only by every
//! stage, including the parallel parts of EE and FF.

use std::collections::HashMap;

use bop_kernel::geometry::intersection::{ray_surface, Ray};
use bop_kernel::topology::shape::{FaceDomain, FaceId, SolidId};
use bop_kernel::{Curve, Point2d, Point3d, ShapeStore, Surface, Vec3};
use serde::Serialize;
use tracing::debug;

/// Position of a point relative to a face or a solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PointState {
    In,
    On,
    Out,
}

impl PointState {
    pub fn is_in_or_on(self) -> bool {
        matches!(self, PointState::In | PointState::On)
    }
}

/// Samples per curved boundary edge in the parametric polygon.
const BOUNDARY_SAMPLES: usize = 32;

#[derive(Debug, Clone)]
struct BoundaryEdge {
    curve: Curve,
    range: (f64, f64),
    tolerance: f64,
}

/// What is needed to classify points against one face.
#[derive(Debug, Clone)]
pub struct FaceClassifier {
    surface: Surface,
    tolerance: f64,
    boundary: Vec<BoundaryEdge>,
    /// One closed uv polygon per wire; holes included.
    loops: Vec<Vec<Point2d>>,
    domain: Option<FaceDomain>,
}

impl FaceClassifier {
    pub fn new(store: &ShapeStore, face: FaceId) -> Option<Self> {
        let f = store.faces.get(face)?;
        let mut boundary = Vec::new();
        let mut loops = Vec::new();
        for &wire_id in &f.wires {
            let wire = store.wires.get(wire_id)?;
            let mut polygon = Vec::new();
            for oe in &wire.edges {
                let edge = store.edges.get(oe.edge)?;
                if edge.degenerated {
                    continue;
                }
                boundary.push(BoundaryEdge {
                    curve: edge.curve,
                    range: edge.range(),
                    tolerance: edge.tolerance,
                });
                let n = match edge.curve {
                    Curve::Line(_) => 1,
                    _ => BOUNDARY_SAMPLES,
                };
                let (t0, t1) = edge.range();
                for k in 0..n {
                    let s = k as f64 / n as f64;
                    let t = if oe.forward {
                        t0 + (t1 - t0) * s
                    } else {
                        t1 - (t1 - t0) * s
                    };
                    let (u, v) = f.surface.parameters_of(&edge.curve.evaluate(t)).ok()?;
                    polygon.push(Point2d::new(u, v));
                }
            }
            if polygon.len() >= 3 {
                loops.push(polygon);
            }
        }
        Some(Self {
            surface: f.surface,
            tolerance: f.tolerance,
            boundary,
            loops,
            domain: f.domain,
        })
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Classify `p` with the larger of `tolerance` and the face tolerance.
    pub fn classify(&self, p: &Point3d, tolerance: f64) -> PointState {
        let tol = tolerance.max(self.tolerance);
        let Ok(((u, v), _, distance)) = self.surface.project(p) else {
            return PointState::Out;
        };
        if distance > tol {
            return PointState::Out;
        }
        let on_boundary = self.boundary.iter().any(|b| {
            let (_, d) = b.curve.closest_parameter(p, b.range.0, b.range.1);
            d <= tol.max(b.tolerance)
        });
        if on_boundary {
            return PointState::On;
        }
        if self.loops.is_empty() {
            return match self.domain {
                Some(domain) if !domain.contains(u, v, 0.0) => PointState::Out,
                _ => PointState::In,
            };
        }
        let inside = self
            .loops
            .iter()
            .filter(|polygon| point_in_polygon_2d(u, v, polygon))
            .count()
            % 2
            == 1;
        if inside {
            PointState::In
        } else {
            PointState::Out
        }
    }

    /// A point strictly inside the face, if one is found.
    pub fn interior_point(&self) -> Option<Point3d> {
        let tol = self.tolerance;
        let Some(outer) = self.loops.first() else {
            let ((u0, u1), (v0, v1)) = self
                .domain
                .map(|d| (d.u, d.v))
                .or_else(|| self.surface.natural_domain())?;
            return Some(self.surface.evaluate(0.5 * (u0 + u1), 0.5 * (v0 + v1)));
        };
        let n = outer.len();
        let centroid = Point2d::new(
            outer.iter().map(|p| p.x).sum::<f64>() / n as f64,
            outer.iter().map(|p| p.y).sum::<f64>() / n as f64,
        );
        let diagonals = (0..n).map(|i| outer[i].lerp(&outer[(i + 2) % n], 0.5));
        std::iter::once(centroid)
            .chain(diagonals)
            .map(|uv| self.surface.evaluate(uv.x, uv.y))
            .find(|p| self.classify(p, tol) == PointState::In)
    }
}

/// Even-odd test in the parametric plane.
fn point_in_polygon_2d(px: f64, py: f64, polygon: &[Point2d]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if ((a.y > py) != (b.y > py)) && (px < (b.x - a.x) * (py - a.y) / (b.y - a.y) + a.x) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Sort ray hit parameters and count the distinct ones.
fn deduplicate_crossings(ts: &mut [f64], tolerance: f64) -> usize {
    if ts.is_empty() {
        return 0;
    }
    ts.sort_by(|a, b| a.total_cmp(b));
    let mut count = 1;
    let mut last = ts[0];
    for &t in ts.iter().skip(1) {
        if (t - last).abs() > tolerance {
            count += 1;
        }
        last = t;
    }
    count
}

/// Shared classification caches for one run.
#[derive(Debug, Clone, Default)]
pub struct Context {
    faces: HashMap<FaceId, FaceClassifier>,
}

impl Context {
    /// Build classifiers for every face currently in the store.
    pub fn new(store: &ShapeStore) -> Self {
        let faces: HashMap<FaceId, FaceClassifier> = store
            .faces
            .keys()
            .filter_map(|id| FaceClassifier::new(store, id).map(|c| (id, c)))
            .collect();
        debug!(n_faces = faces.len(), "face classifiers built");
        Self { faces }
    }

    pub fn face_classifier(&self, face: FaceId) -> Option<&FaceClassifier> {
        self.faces.get(&face)
    }

    fn classifier<'a>(&'a self, store: &ShapeStore, face: FaceId) -> Option<std::borrow::Cow<'a, FaceClassifier>> {
        match self.faces.get(&face) {
            Some(c) => Some(std::borrow::Cow::Borrowed(c)),
            None => FaceClassifier::new(store, face).map(std::borrow::Cow::Owned),
        }
    }

    pub fn classify_point_in_face(&self, store: &ShapeStore, face: FaceId, p: &Point3d, tolerance: f64) -> PointState {
        self.classifier(store, face)
            .map_or(PointState::Out, |c| c.classify(p, tolerance))
    }

    /// Parameter of `p` on `curve` within `range` if it lies within `tolerance`.
    pub fn compute_ve(&self, p: &Point3d, curve: &Curve, range: (f64, f64), tolerance: f64) -> Option<(f64, f64)> {
        let (t, distance) = curve.closest_parameter(p, range.0, range.1);
        (distance <= tolerance).then_some((t, distance))
    }

    /// Surface parameters of `p` if it is IN or ON the face.
    pub fn compute_vf(&self, store: &ShapeStore, face: FaceId, p: &Point3d, tolerance: f64) -> Option<(f64, f64)> {
        let classifier = self.classifier(store, face)?;
        if !classifier.classify(p, tolerance).is_in_or_on() {
            return None;
        }
        classifier.surface().parameters_of(p).ok()
    }

    /// Classify `p` against a solid by ray parity, majority vote over five
    /// directions. Points within `tolerance` of a face are `On`.
    pub fn point_in_solid(&self, store: &ShapeStore, solid: SolidId, p: &Point3d, tolerance: f64) -> PointState {
        let faces = store.solid_faces(solid);
        let classifiers: Vec<_> = faces
            .iter()
            .filter_map(|&f| self.classifier(store, f))
            .collect();
        if classifiers
            .iter()
            .any(|c| c.classify(p, tolerance) != PointState::Out)
        {
            return PointState::On;
        }

        let directions = [
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
            Vec3::new(1.0, 1.0, 1.0).normalize(),
            Vec3::new(-1.0, 0.5, 0.3).normalize(),
        ];
        let inside_votes = directions
            .iter()
            .filter(|dir| {
                let ray = Ray::new(*p, **dir);
                let mut hits: Vec<f64> = classifiers
                    .iter()
                    .flat_map(|c| {
                        ray_surface(&ray, c.surface())
                            .into_iter()
                            .filter(|&t| t > tolerance)
                            .filter(|&t| c.classify(&ray.at(t), tolerance) != PointState::Out)
                            .collect::<Vec<_>>()
                    })
                    .collect();
                deduplicate_crossings(&mut hits, tolerance) % 2 == 1
            })
            .count();
        if inside_votes * 2 > directions.len() {
            PointState::In
        } else {
            PointState::Out
        }
    }
}
