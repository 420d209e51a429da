//! Edge/edge stage.

use bop_kernel::geometry::intersection::{intersect_curves, CommonPart};
use bop_kernel::{BoundingBox, Curve, GeometryError, Point3d, ShapeKind, CONFUSION};
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use super::PaveFiller;
use crate::ds::interf::EdgeEdge;
use crate::ds::pave::{Pave, PaveSource};
use crate::error::{FillerError, WarningCode};
use crate::iterator::candidate_pairs;

/// Two pave blocks to intersect, with everything the computation needs.
#[derive(Debug, Clone)]
struct BlockPair {
    edge1: usize,
    edge2: usize,
    pb1: usize,
    pb2: usize,
    curve1: Curve,
    range1: (f64, f64),
    curve2: Curve,
    range2: (f64, f64),
    tolerance: f64,
}

/// A common point that needs a new vertex.
struct NewVertexCandidate {
    record: usize,
    pb1: usize,
    param1: f64,
    pb2: usize,
    param2: f64,
}

impl PaveFiller {
    /// Box of a pave block, grown by the edge tolerance.
    pub(super) fn block_bbox(&self, pb: usize) -> Result<(Curve, (f64, f64), BoundingBox), FillerError> {
        let block = self.ds.pave_block(pb)?;
        let (curve, _) = self.ds.edge_curve(&self.store, block.original_edge)?;
        let range = block.range();
        let margin = self.ds.tolerance(block.original_edge) + 0.5 * self.config.fuzzy_value.max(CONFUSION);
        Ok((curve, range, curve.bounding_box(range.0, range.1).expanded(margin)))
    }

    /// End vertex of `pb` that `point` falls on, if any.
    pub(super) fn pave_vertex_near(&self, pb: usize, point: &Point3d, tolerance: f64) -> Result<Option<usize>, FillerError> {
        let block = self.ds.pave_block(pb)?;
        for pave in [block.pave1, block.pave2] {
            let v = self.ds.same_domain_index(pave.index);
            let reach = tolerance.max(self.ds.tolerance(v));
            if self.ds.vertex_point(&self.store, v)?.distance_to(point) <= reach {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    fn collect_block_pairs(&self) -> Result<Vec<BlockPair>, FillerError> {
        let mut tasks = Vec::new();
        for (e1, e2) in candidate_pairs(&self.ds, ShapeKind::Edge, ShapeKind::Edge) {
            if self.ds.is_degenerated(e1) || self.ds.is_degenerated(e2) {
                continue;
            }
            let tolerance = self.pair_tolerance(e1, e2);
            for &pb1 in self.ds.pave_blocks_of(e1) {
                let (curve1, range1, box1) = self.block_bbox(pb1)?;
                for &pb2 in self.ds.pave_blocks_of(e2) {
                    let (curve2, range2, box2) = self.block_bbox(pb2)?;
                    if !box1.intersects(&box2) {
                        continue;
                    }
                    let cb1 = self.ds.pave_block(pb1)?.common_block;
                    if cb1.is_some() && cb1 == self.ds.pave_block(pb2)?.common_block {
                        continue;
                    }
                    tasks.push(BlockPair {
                        edge1: e1,
                        edge2: e2,
                        pb1,
                        pb2,
                        curve1,
                        range1,
                        curve2,
                        range2,
                        tolerance,
                    });
                }
            }
        }
        Ok(tasks)
    }

    /// Intersect pave blocks of edges from different arguments. Common
    /// points become paves on both edges; coinciding blocks with the same
    /// end vertices become common blocks.
    #[instrument(skip(self))]
    pub(super) fn perform_ee(&mut self) -> Result<(), FillerError> {
        let tasks = self.collect_block_pairs()?;
        let steps = self.config.tangent_range_samples;
        let cancel = &self.cancel;
        let compute = |task: &BlockPair| -> Result<Result<Vec<CommonPart>, GeometryError>, FillerError> {
            cancel.check()?;
            Ok(intersect_curves(
                &task.curve1,
                task.range1,
                &task.curve2,
                task.range2,
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
        let mut n_common_blocks = 0;
        for (task, result) in tasks.iter().zip(results) {
            let parts = match result {
                Ok(parts) => parts,
                Err(err) => {
                    self.report.add_warning(
                        WarningCode::EdgeEdgeIntersectionFailed,
                        vec![task.edge1, task.edge2],
                        err.to_string(),
                    );
                    continue;
                }
            };
            for part in parts {
                match part {
                    CommonPart::Vertex {
                        param1,
                        param2,
                        point,
                        ..
                    } => {
                        let on1 = self.pave_vertex_near(task.pb1, &point, task.tolerance)?;
                        let on2 = self.pave_vertex_near(task.pb2, &point, task.tolerance)?;
                        let vertex = match (on1, on2) {
                            // blocks meeting at a shared end vertex
                            (Some(a), Some(b)) if a == b => continue,
                            (Some(a), Some(b)) => {
                                self.ds.merge_vertices(&self.store, b, a)?;
                                Some(a)
                            }
                            (Some(a), None) => {
                                self.put_vertex_on_block(a, task.pb2, &task.curve2, param2)?;
                                Some(a)
                            }
                            (None, Some(b)) => {
                                self.put_vertex_on_block(b, task.pb1, &task.curve1, param1)?;
                                Some(b)
                            }
                            (None, None) => None,
                        };
                        let record = self.ds.add_ee(EdgeEdge {
                            edge1: task.edge1,
                            edge2: task.edge2,
                            common: part,
                            vertex,
                        });
                        if vertex.is_none() {
                            let gap = task.curve1.evaluate(param1).distance_to(&task.curve2.evaluate(param2));
                            points.push((point, task.tolerance.max(0.5 * gap)));
                            candidates.push(NewVertexCandidate {
                                record,
                                pb1: task.pb1,
                                param1,
                                pb2: task.pb2,
                                param2,
                            });
                        }
                    }
                    CommonPart::Edge { .. } => {
                        let b1 = self.ds.pave_block(task.pb1)?;
                        let b2 = self.ds.pave_block(task.pb2)?;
                        if b1.has_same_bounds(b2) {
                            self.ds.make_common_block(&[task.pb1, task.pb2], task.tolerance);
                            n_common_blocks += 1;
                        } else {
                            debug!(pb1 = task.pb1, pb2 = task.pb2, "partial overlap of blocks");
                        }
                        self.ds.add_ee(EdgeEdge {
                            edge1: task.edge1,
                            edge2: task.edge2,
                            common: part,
                            vertex: None,
                        });
                    }
                }
            }
        }

        let vertices = self.make_new_vertices(&points);
        for (candidate, vertex) in candidates.iter().zip(vertices) {
            self.ds.interferences_mut().ee[candidate.record].vertex = Some(vertex);
            self.ds.append_ext_pave(
                &self.store,
                candidate.pb1,
                Pave::new(vertex, candidate.param1, PaveSource::EdgeEdge),
            )?;
            self.ds.append_ext_pave(
                &self.store,
                candidate.pb2,
                Pave::new(vertex, candidate.param2, PaveSource::EdgeEdge),
            )?;
        }

        let split = self.ds.split_pave_blocks(&self.store)?;
        self.refresh_face_infos();
        info!(
            n_block_pairs = tasks.len(),
            n_interferences = self.ds.interferences().ee.len(),
            n_new_vertices = candidates.len(),
            n_common_blocks,
            n_split_edges = split.len(),
            "EE done"
        );
        Ok(())
    }

    /// Make an existing vertex a pave of `pb` at `param`, growing its
    /// tolerance to reach the curve.
    fn put_vertex_on_block(&mut self, vertex: usize, pb: usize, curve: &Curve, param: f64) -> Result<(), FillerError> {
        let block = self.ds.pave_block(pb)?;
        if !block.contains_parameter(param, 0.0) {
            return Ok(());
        }
        let distance = self
            .ds
            .vertex_point(&self.store, vertex)?
            .distance_to(&curve.evaluate(param));
        self.ds.update_tolerance(vertex, distance);
        self.ds
            .append_ext_pave(&self.store, pb, Pave::new(vertex, param, PaveSource::EdgeEdge))?;
        Ok(())
    }
}
