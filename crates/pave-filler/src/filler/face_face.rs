//! Face/face stage: section curves and points, and the paves put on them.

use std::collections::BTreeSet;

use bop_kernel::geometry::surface_intersection::{intersect_surfaces, SurfaceIntersection};
use bop_kernel::topology::shape::FaceId;
use bop_kernel::{BoundingBox, Curve, GeometryError, Point3d, ShapeKind, ShapeRef, ShapeStore, Surface, Tolerance, CONFUSION};
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use super::PaveFiller;
use crate::context::Context;
use crate::ds::curve::{SectionCurve, SectionPoint};
use crate::ds::interf::FaceFace;
use crate::ds::pave::{Pave, PaveSource};
use crate::error::{FillerError, WarningCode};
use crate::iterator::candidate_pairs;

/// Samples used to decide whether a section curve touches both faces.
const SECTION_SAMPLES: usize = 32;

#[derive(Debug, Clone)]
struct FacePair {
    face1: usize,
    face2: usize,
    id1: FaceId,
    id2: FaceId,
    surface1: Surface,
    surface2: Surface,
    tolerance: f64,
    /// Overlap of the two face boxes.
    bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
enum Section {
    Disjoint,
    Coincident,
    Found {
        curves: Vec<(Curve, (f64, f64))>,
        points: Vec<Point3d>,
    },
}

/// Parallel planes are either coincident or disjoint; no need to intersect.
fn check_planes(pair: &FacePair) -> Option<Section> {
    let (p1, p2) = (pair.surface1.as_plane()?, pair.surface2.as_plane()?);
    if !p1.normal.is_parallel_to(&p2.normal, Tolerance::default().angular) {
        return None;
    }
    if p1.distance_to_point(&p2.origin).abs() <= pair.tolerance {
        Some(Section::Coincident)
    } else {
        Some(Section::Disjoint)
    }
}

/// Range of `curve` worth looking at: the overlap box for lines, one
/// period otherwise.
fn section_range(curve: &Curve, bbox: &BoundingBox) -> Option<(f64, f64)> {
    match curve {
        Curve::Line(line) => bbox.clip_line(&line.origin, &line.direction),
        _ => curve.natural_range(),
    }
}

fn compute_section(store: &ShapeStore, context: &Context, pair: &FacePair) -> Result<Section, GeometryError> {
    if let Some(section) = check_planes(pair) {
        return Ok(section);
    }
    let tolerance = Tolerance::with_coincidence(pair.tolerance);
    let on_both = |p: &Point3d| {
        context
            .classify_point_in_face(store, pair.id1, p, pair.tolerance)
            .is_in_or_on()
            && context
                .classify_point_in_face(store, pair.id2, p, pair.tolerance)
                .is_in_or_on()
    };
    let result = intersect_surfaces(&pair.surface1, &pair.surface2, &tolerance)?;
    match result {
        SurfaceIntersection::None => Ok(Section::Disjoint),
        SurfaceIntersection::Coincident => Ok(Section::Coincident),
        SurfaceIntersection::Point(p) => {
            let points = if on_both(&p) { vec![p] } else { Vec::new() };
            Ok(Section::Found {
                curves: Vec::new(),
                points,
            })
        }
        SurfaceIntersection::Curve(_) | SurfaceIntersection::TwoCurves(..) => {
            let curves = result
                .curves()
                .into_iter()
                .filter_map(|curve| {
                    let range = section_range(&curve, &pair.bbox)?;
                    let step = (range.1 - range.0) / SECTION_SAMPLES as f64;
                    (0..=SECTION_SAMPLES)
                        .any(|k| on_both(&curve.evaluate(range.0 + step * k as f64)))
                        .then_some((curve, range))
                })
                .collect();
            Ok(Section::Found {
                curves,
                points: Vec::new(),
            })
        }
    }
}

impl PaveFiller {
    fn collect_face_pairs(&mut self) -> Result<Vec<FacePair>, FillerError> {
        let mut tasks = Vec::new();
        for (f1, f2) in candidate_pairs(&self.ds, ShapeKind::Face, ShapeKind::Face) {
            self.ensure_face_info(f1);
            self.ensure_face_info(f2);
            let (ShapeRef::Face(id1), ShapeRef::Face(id2)) = (self.ds.shape_of(f1)?, self.ds.shape_of(f2)?) else {
                continue;
            };
            let (Some(c1), Some(c2)) = (self.context.face_classifier(id1), self.context.face_classifier(id2)) else {
                continue;
            };
            tasks.push(FacePair {
                face1: f1,
                face2: f2,
                id1,
                id2,
                surface1: *c1.surface(),
                surface2: *c2.surface(),
                tolerance: self.pair_tolerance(f1, f2),
                bbox: self.ds.bbox(f1).intersection(&self.ds.bbox(f2)),
            });
        }
        Ok(tasks)
    }

    /// Intersect faces of different arguments. Each section curve gets paves
    /// at every known vertex lying on it, plus bound and closing paves.
    #[instrument(skip(self))]
    pub(super) fn perform_ff(&mut self) -> Result<(), FillerError> {
        let tasks = self.collect_face_pairs()?;
        let (store, context, cancel) = (&self.store, &self.context, &self.cancel);
        let compute = |task: &FacePair| -> Result<Result<Section, GeometryError>, FillerError> {
            cancel.check()?;
            Ok(compute_section(store, context, task))
        };
        let results: Vec<_> = if self.config.run_parallel {
            tasks.par_iter().map(compute).collect::<Result<_, _>>()?
        } else {
            tasks.iter().map(compute).collect::<Result<_, _>>()?
        };

        let mut n_curves = 0;
        let mut n_points = 0;
        let mut section_vertices = Vec::new();
        for (task, result) in tasks.iter().zip(results) {
            self.cancel.check()?;
            let section = match result {
                Ok(section) => section,
                Err(err) => {
                    self.report.add_warning(
                        WarningCode::FaceFaceIntersectionFailed,
                        vec![task.face1, task.face2],
                        err.to_string(),
                    );
                    self.ds.add_ff(FaceFace {
                        face1: task.face1,
                        face2: task.face2,
                        coincident: false,
                        tolerance: task.tolerance,
                        curves: Vec::new(),
                        points: Vec::new(),
                    });
                    continue;
                }
            };
            let (curves, points) = match section {
                Section::Disjoint => continue,
                Section::Coincident => {
                    debug!(face1 = task.face1, face2 = task.face2, "coincident faces");
                    self.ds.add_ff(FaceFace {
                        face1: task.face1,
                        face2: task.face2,
                        coincident: true,
                        tolerance: task.tolerance,
                        curves: Vec::new(),
                        points: Vec::new(),
                    });
                    continue;
                }
                Section::Found { curves, points } if curves.is_empty() && points.is_empty() => continue,
                Section::Found { curves, points } => (curves, points),
            };

            let mut record = FaceFace {
                face1: task.face1,
                face2: task.face2,
                coincident: false,
                tolerance: task.tolerance,
                curves: Vec::new(),
                points: Vec::new(),
            };
            for point in points {
                let vertex = self.section_vertex(task, &mut section_vertices, point, task.tolerance)?;
                self.add_section_vertex(task, vertex);
                record.points.push(SectionPoint {
                    point,
                    vertex: Some(vertex),
                });
                n_points += 1;
            }
            for (curve, range) in curves {
                let mut sc = SectionCurve::new(curve, range, task.tolerance);
                self.put_paves_on_curve(task, &mut sc)?;
                self.put_stick_paves_on_curve(task, &mut sc)?;
                self.put_ef_paves_on_curve(task, &mut sc)?;
                self.put_bound_paves_on_curve(task, &mut sc, &mut section_vertices)?;
                self.put_closing_pave_on_curve(task, &mut sc, &mut section_vertices)?;
                trace!(face1 = task.face1, face2 = task.face2, n_paves = sc.paves.len(), "section curve");
                record.curves.push(sc);
                n_curves += 1;
            }
            self.ds.add_ff(record);
        }

        let faces: Vec<usize> = self.ds.faces_with_info().collect();
        for face in faces {
            self.ds.refine_face_info_in(face);
        }
        info!(
            n_face_pairs = tasks.len(),
            n_interferences = self.ds.interferences().ff.len(),
            n_curves,
            n_points,
            n_new_vertices = section_vertices.len(),
            "FF done"
        );
        Ok(())
    }

    // ─── Paves on section curves ─────────────────────────────────────────────

    /// Put `vertex` on `sc` if it lies within `reach` of the curve.
    fn try_put_pave(&mut self, task: &FacePair, sc: &mut SectionCurve, vertex: usize, reach: f64) -> Result<bool, FillerError> {
        let vertex = self.ds.same_domain_index(vertex);
        if sc.has_vertex(vertex) {
            return Ok(false);
        }
        let point = self.ds.vertex_point(&self.store, vertex)?;
        let (t, distance) = sc.curve.closest_parameter(&point, sc.range.0, sc.range.1);
        if distance > reach {
            return Ok(false);
        }
        self.ds.update_tolerance(vertex, distance);
        sc.add_pave(Pave::new(vertex, t, PaveSource::Section));
        self.add_section_vertex(task, vertex);
        Ok(true)
    }

    fn add_section_vertex(&mut self, task: &FacePair, vertex: usize) {
        self.ds.face_info_mut(task.face1).vertices_sc.insert(vertex);
        self.ds.face_info_mut(task.face2).vertices_sc.insert(vertex);
    }

    /// Vertices both faces know of.
    fn put_paves_on_curve(&mut self, task: &FacePair, sc: &mut SectionCurve) -> Result<(), FillerError> {
        let known = |f: usize| {
            self.ds
                .face_info(f)
                .map(|info| info.all_vertices())
                .unwrap_or_default()
        };
        let shared: BTreeSet<usize> = known(task.face1)
            .intersection(&known(task.face2))
            .copied()
            .collect();
        for v in shared {
            let reach = self.ds.tolerance(v).max(sc.tolerance);
            self.try_put_pave(task, sc, v, reach)?;
        }
        Ok(())
    }

    /// Boundary vertices of either face sitting at an end of the curve.
    fn put_stick_paves_on_curve(&mut self, task: &FacePair, sc: &mut SectionCurve) -> Result<(), FillerError> {
        if sc.is_closed() {
            return Ok(());
        }
        let mut candidates = BTreeSet::new();
        for f in [task.face1, task.face2] {
            if let Some(info) = self.ds.face_info(f) {
                candidates.extend(info.vertices_on.iter().copied());
            }
        }
        let ends = [sc.curve.evaluate(sc.range.0), sc.curve.evaluate(sc.range.1)];
        for v in candidates {
            let point = self.ds.vertex_point(&self.store, v)?;
            let reach = self.ds.tolerance(v).max(sc.tolerance);
            if !ends.iter().any(|end| end.distance_to(&point) <= reach + self.bound_margin(sc)) {
                continue;
            }
            let on_both = [task.id1, task.id2].iter().all(|&id| {
                self.context
                    .classify_point_in_face(&self.store, id, &point, reach)
                    .is_in_or_on()
            });
            if on_both {
                self.try_put_pave(task, sc, v, reach)?;
            }
        }
        Ok(())
    }

    /// Vertices of EF contacts between an edge of one face and the other
    /// face. Tangential contacts may use their extended tolerance.
    fn put_ef_paves_on_curve(&mut self, task: &FacePair, sc: &mut SectionCurve) -> Result<(), FillerError> {
        let edges1: BTreeSet<usize> = self.ds.sub_shapes_of_kind(task.face1, ShapeKind::Edge).into_iter().collect();
        let edges2: BTreeSet<usize> = self.ds.sub_shapes_of_kind(task.face2, ShapeKind::Edge).into_iter().collect();
        let vertices: BTreeSet<usize> = self
            .ds
            .interferences()
            .ef
            .iter()
            .filter(|r| {
                (r.face == task.face2 && edges1.contains(&r.edge))
                    || (r.face == task.face1 && edges2.contains(&r.edge))
            })
            .filter_map(|r| r.vertex)
            .map(|v| self.ds.same_domain_index(v))
            .collect();
        for v in vertices {
            let mut reach = self.ds.tolerance(v).max(sc.tolerance);
            if self.config.extended_tolerance {
                reach = reach.max(self.ds.extended_tolerance(v).unwrap_or(0.0));
            }
            self.try_put_pave(task, sc, v, reach)?;
        }
        Ok(())
    }

    /// Gap allowed between a curve end and a pave before the end needs a
    /// vertex of its own.
    fn bound_margin(&self, sc: &SectionCurve) -> f64 {
        2.0 * (sc.tolerance + 0.5 * self.config.fuzzy_value.max(CONFUSION))
    }

    /// Ends of an open curve that lie on both faces and carry no pave get a
    /// new vertex.
    fn put_bound_paves_on_curve(
        &mut self,
        task: &FacePair,
        sc: &mut SectionCurve,
        section_vertices: &mut Vec<(Point3d, usize)>,
    ) -> Result<(), FillerError> {
        if sc.is_closed() {
            return Ok(());
        }
        for t in [sc.range.0, sc.range.1] {
            let point = sc.curve.evaluate(t);
            let mut covered = false;
            for pave in &sc.paves {
                let reach = self.ds.tolerance(pave.index) + self.bound_margin(sc);
                if self.ds.vertex_point(&self.store, pave.index)?.distance_to(&point) <= reach {
                    covered = true;
                    break;
                }
            }
            if covered {
                continue;
            }
            let on_both = [task.id1, task.id2].iter().all(|&id| {
                self.context
                    .classify_point_in_face(&self.store, id, &point, sc.tolerance)
                    .is_in_or_on()
            });
            if !on_both {
                continue;
            }
            let vertex = self.section_vertex(task, section_vertices, point, sc.tolerance)?;
            if !sc.has_vertex(vertex) {
                sc.add_pave(Pave::new(vertex, t, PaveSource::Section));
                self.add_section_vertex(task, vertex);
            }
        }
        Ok(())
    }

    /// A closed curve is cut at its first pave and closed with a second pave
    /// of the same vertex one period later.
    fn put_closing_pave_on_curve(
        &mut self,
        task: &FacePair,
        sc: &mut SectionCurve,
        section_vertices: &mut Vec<(Point3d, usize)>,
    ) -> Result<(), FillerError> {
        let Some(period) = sc.curve.period().filter(|_| sc.is_closed()) else {
            return Ok(());
        };
        if sc.paves.is_empty() {
            let point = sc.curve.evaluate(sc.range.0);
            let on_both = [task.id1, task.id2].iter().all(|&id| {
                self.context
                    .classify_point_in_face(&self.store, id, &point, sc.tolerance)
                    .is_in_or_on()
            });
            if !on_both {
                return Ok(());
            }
            let vertex = self.section_vertex(task, section_vertices, point, sc.tolerance)?;
            self.add_section_vertex(task, vertex);
            sc.add_pave(Pave::new(vertex, sc.range.0, PaveSource::Section));
        }
        let first = sc.paves[0];
        sc.range = (first.parameter, first.parameter + period);
        sc.paves.push(Pave::new(first.index, first.parameter + period, PaveSource::Closing));
        Ok(())
    }

    /// Vertex for a section point. A vertex either face already knows of
    /// wins over one made earlier in this stage; a new vertex is the last
    /// resort.
    fn section_vertex(
        &mut self,
        task: &FacePair,
        section_vertices: &mut Vec<(Point3d, usize)>,
        point: Point3d,
        tolerance: f64,
    ) -> Result<usize, FillerError> {
        if let Some(vertex) = self.existing_vertex(task, &point, tolerance)? {
            return Ok(vertex);
        }
        let existing = section_vertices.iter().find(|(p, v)| {
            p.distance_to(&point) <= tolerance.max(self.ds.tolerance(*v))
        });
        if let Some(&(_, v)) = existing {
            return Ok(v);
        }
        let vertex = self.make_vertex(point, tolerance);
        section_vertices.push((point, vertex));
        Ok(vertex)
    }

    /// Closest ON/IN/SC vertex of either face within reach of `point`. Its
    /// tolerance grows to cover the gap.
    fn existing_vertex(&mut self, task: &FacePair, point: &Point3d, tolerance: f64) -> Result<Option<usize>, FillerError> {
        let mut known = BTreeSet::new();
        for f in [task.face1, task.face2] {
            if let Some(info) = self.ds.face_info(f) {
                known.extend(info.all_vertices());
            }
        }
        let mut best: Option<(f64, usize)> = None;
        for v in known {
            let v = self.ds.same_domain_index(v);
            let distance = self.ds.vertex_point(&self.store, v)?.distance_to(point);
            let reach = self.ds.tolerance(v).max(tolerance).max(self.config.fuzzy_value);
            if distance <= reach && best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, v));
            }
        }
        let Some((distance, vertex)) = best else {
            return Ok(None);
        };
        self.ds.update_tolerance(vertex, distance);
        trace!(vertex, distance, "section point on a known vertex");
        Ok(Some(vertex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bop_kernel::geometry::curves::Line3d;
    use bop_kernel::geometry::surfaces::Plane;
    use bop_kernel::Vec3;

    fn plane_pair(n1: Vec3, o2: Point3d, n2: Vec3) -> FacePair {
        let mut store = ShapeStore::new();
        let id = bop_kernel::topology::primitives::make_polygon_face(
            &mut store,
            &[
                Point3d::ORIGIN,
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
            ],
        )
        .unwrap();
        FacePair {
            face1: 0,
            face2: 1,
            id1: id,
            id2: id,
            surface1: Surface::Plane(Plane::new(Point3d::ORIGIN, n1)),
            surface2: Surface::Plane(Plane::new(o2, n2)),
            tolerance: 1e-7,
            bbox: BoundingBox::new(Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0)),
        }
    }

    #[test]
    fn parallel_planes_short_circuit() {
        let pair = plane_pair(Vec3::Z, Point3d::new(0.0, 0.0, 1.0), Vec3::Z);
        assert_eq!(check_planes(&pair), Some(Section::Disjoint));
        let pair = plane_pair(Vec3::Z, Point3d::new(3.0, 4.0, 0.0), -Vec3::Z);
        assert_eq!(check_planes(&pair), Some(Section::Coincident));
        let pair = plane_pair(Vec3::Z, Point3d::ORIGIN, Vec3::X);
        assert_eq!(check_planes(&pair), None);
    }

    #[test]
    fn line_range_is_clipped_to_the_overlap_box() {
        let bbox = BoundingBox::new(Point3d::ORIGIN, Point3d::new(10.0, 10.0, 10.0));
        let line = Curve::Line(Line3d::new(Point3d::new(5.0, 5.0, -20.0), Vec3::Z));
        let (t0, t1) = section_range(&line, &bbox).unwrap();
        approx::assert_relative_eq!(t0, 20.0, epsilon = 1e-12);
        approx::assert_relative_eq!(t1, 30.0, epsilon = 1e-12);
        let outside = Curve::Line(Line3d::new(Point3d::new(15.0, 5.0, 0.0), Vec3::Z));
        assert!(section_range(&outside, &bbox).is_none());
    }
}
