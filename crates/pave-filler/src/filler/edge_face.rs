//! Edge/face stage.

use bop_kernel::geometry::intersection::{intersect_curve_surface, CurveSurfaceContact};
use bop_kernel::topology::shape::FaceId;
use bop_kernel::{Curve, GeometryError, Point3d, ShapeKind, ShapeRef, Surface};
use rayon::prelude::*;
use tracing::{info, instrument, trace};

use super::PaveFiller;
use crate::context::PointState;
use crate::ds::interf::EdgeFace;
use crate::ds::pave::{Pave, PaveSource};
use crate::error::{FillerError, WarningCode};
use crate::iterator::candidate_pairs;

#[derive(Debug, Clone)]
struct BlockFace {
    edge: usize,
    face: usize,
    face_id: FaceId,
    pb: usize,
    curve: Curve,
    range: (f64, f64),
    surface: Surface,
    tolerance: f64,
}

struct NewVertexCandidate {
    record: usize,
    pb: usize,
    face: usize,
    param: f64,
    /// Distance from the contact point to the ends of its common range.
    reach: f64,
}

impl PaveFiller {
    fn collect_block_faces(&mut self) -> Result<Vec<BlockFace>, FillerError> {
        let mut tasks = Vec::new();
        for (e, f) in candidate_pairs(&self.ds, ShapeKind::Edge, ShapeKind::Face) {
            if self.ds.is_degenerated(e) {
                continue;
            }
            self.ensure_face_info(f);
            let ShapeRef::Face(face_id) = self.ds.shape_of(f)? else {
                continue;
            };
            let Some(surface) = self.context.face_classifier(face_id).map(|c| *c.surface()) else {
                continue;
            };
            let tolerance = self.pair_tolerance(e, f);
            let face_box = self.ds.bbox(f);
            for &pb in self.ds.pave_blocks_of(e) {
                let on_face = self
                    .ds
                    .face_info(f)
                    .is_some_and(|info| {
                        info.pave_blocks_on.contains(&pb) || info.pave_blocks_on.contains(&self.ds.real_pave_block(pb))
                    });
                if on_face {
                    continue;
                }
                let (curve, range, block_box) = self.block_bbox(pb)?;
                if !block_box.intersects(&face_box) {
                    continue;
                }
                tasks.push(BlockFace {
                    edge: e,
                    face: f,
                    face_id,
                    pb,
                    curve,
                    range,
                    surface,
                    tolerance,
                });
            }
        }
        Ok(tasks)
    }

    /// Intersect pave blocks with faces of other arguments. Piercing points
    /// inside a face become paves; blocks lying inside a face join its IN set.
    #[instrument(skip(self))]
    pub(super) fn perform_ef(&mut self) -> Result<(), FillerError> {
        let tasks = self.collect_block_faces()?;
        let steps = self.config.tangent_range_samples;
        let cancel = &self.cancel;
        let compute = |task: &BlockFace| -> Result<Result<Vec<CurveSurfaceContact>, GeometryError>, FillerError> {
            cancel.check()?;
            Ok(intersect_curve_surface(
                &task.curve,
                task.range,
                &task.surface,
                task.tolerance,
                steps,
            ))
        };
        let results: Vec<_> = if self.config.run_parallel {
            tasks.par_iter().map(compute).collect::<Result<_, _>>()?
        } else {
            tasks.iter().map(compute).collect::<Result<_, _>>()?
        };

        let mut candidates = Vec::new();
        let mut points = Vec::new();
        let mut n_blocks_in = 0;
        for (task, result) in tasks.iter().zip(results) {
            let contacts = match result {
                Ok(contacts) => contacts,
                Err(err) => {
                    self.report.add_warning(
                        WarningCode::EdgeFaceIntersectionFailed,
                        vec![task.edge, task.face],
                        err.to_string(),
                    );
                    continue;
                }
            };
            for contact in contacts {
                match contact {
                    CurveSurfaceContact::Vertex {
                        param, point, range, ..
                    } => {
                        if let Some(v) = self.pave_vertex_near(task.pb, &point, task.tolerance)? {
                            let p = self.ds.vertex_point(&self.store, v)?;
                            let state = self
                                .context
                                .classify_point_in_face(&self.store, task.face_id, &p, task.tolerance);
                            if state.is_in_or_on() {
                                self.ds.face_info_mut(task.face).vertices_in.insert(v);
                                self.ds.add_ef(EdgeFace {
                                    edge: task.edge,
                                    face: task.face,
                                    common: contact,
                                    vertex: Some(v),
                                });
                            }
                            continue;
                        }
                        let state = self
                            .context
                            .classify_point_in_face(&self.store, task.face_id, &point, task.tolerance);
                        if state == PointState::Out {
                            trace!(edge = task.edge, face = task.face, "contact outside the face");
                            continue;
                        }
                        let existing = self.ext_pave_near(task.pb, &point, task.tolerance)?;
                        let record = self.ds.add_ef(EdgeFace {
                            edge: task.edge,
                            face: task.face,
                            common: contact,
                            vertex: existing,
                        });
                        if let Some(v) = existing {
                            self.ds.face_info_mut(task.face).vertices_in.insert(v);
                            continue;
                        }
                        let reach = [range.0, range.1]
                            .iter()
                            .map(|&t| point.distance_to(&task.curve.evaluate(t)))
                            .fold(0.0, f64::max);
                        points.push((point, task.tolerance));
                        candidates.push(NewVertexCandidate {
                            record,
                            pb: task.pb,
                            face: task.face,
                            param,
                            reach,
                        });
                    }
                    CurveSurfaceContact::Edge { range } => {
                        let block = self.ds.pave_block(task.pb)?;
                        let (t1, t2) = block.range();
                        let slack = task.curve.parameter_step(t1, task.tolerance);
                        let covers = range.0 <= t1 + slack && range.1 >= t2 - slack;
                        let middle = task.curve.evaluate(block.middle_parameter());
                        let state = self
                            .context
                            .classify_point_in_face(&self.store, task.face_id, &middle, task.tolerance);
                        if covers && state == PointState::In {
                            self.ds.face_info_mut(task.face).pave_blocks_in.insert(task.pb);
                            n_blocks_in += 1;
                        }
                        self.ds.add_ef(EdgeFace {
                            edge: task.edge,
                            face: task.face,
                            common: contact,
                            vertex: None,
                        });
                    }
                }
            }
        }

        let vertices = self.make_new_vertices(&points);
        for (candidate, vertex) in candidates.iter().zip(vertices) {
            self.ds.interferences_mut().ef[candidate.record].vertex = Some(vertex);
            self.ds.append_ext_pave(
                &self.store,
                candidate.pb,
                Pave::new(vertex, candidate.param, PaveSource::EdgeFace),
            )?;
            self.ds.face_info_mut(candidate.face).vertices_in.insert(vertex);
            if self.config.extended_tolerance && candidate.reach > self.ds.tolerance(vertex) {
                self.ds.set_extended_tolerance(vertex, candidate.reach);
            }
        }

        let split = self.ds.split_pave_blocks(&self.store)?;
        self.refresh_face_infos();
        info!(
            n_block_faces = tasks.len(),
            n_interferences = self.ds.interferences().ef.len(),
            n_new_vertices = candidates.len(),
            n_blocks_in,
            n_split_edges = split.len(),
            "EF done"
        );
        Ok(())
    }

    /// Extra pave of `pb` whose vertex lies within reach of `point`.
    fn ext_pave_near(&self, pb: usize, point: &Point3d, tolerance: f64) -> Result<Option<usize>, FillerError> {
        let block = self.ds.pave_block(pb)?;
        for pave in &block.ext_paves {
            let v = self.ds.same_domain_index(pave.index);
            let reach = tolerance.max(self.ds.tolerance(v));
            if self.ds.vertex_point(&self.store, v)?.distance_to(point) <= reach {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}
