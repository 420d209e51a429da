//! Materialize split edges for the final pave blocks of every edge.

use bop_kernel::topology::shape::{Edge, VertexId};
use bop_kernel::{ShapeRef, Tolerance};
use tracing::{debug, info, instrument};

use super::PaveFiller;
use crate::ds::pave::{EdgeState, ShrunkData};
use crate::error::FillerError;

impl PaveFiller {
    /// Give every current pave block a split edge. Blocks of one common
    /// block share the edge of its real block; a block that is still the
    /// whole original edge keeps that edge.
    #[instrument(skip(self))]
    pub(super) fn make_split_edges(&mut self) -> Result<(), FillerError> {
        let edges: Vec<usize> = self
            .ds
            .edges_with_blocks()
            .filter(|&e| !self.ds.is_new_shape(e))
            .collect();
        let mut n_new = 0;
        let mut n_reused = 0;
        let mut shared = Vec::new();
        for &edge in &edges {
            self.cancel.check()?;
            let blocks = self.ds.pave_blocks_of(edge).to_vec();
            for &pb in &blocks {
                let real = self.ds.real_pave_block(pb);
                if real != pb {
                    shared.push((pb, real));
                    continue;
                }
                if self.ds.pave_block(pb)?.edge.is_some() {
                    continue;
                }
                let split = if blocks.len() == 1 && self.is_original_block(edge, pb)? {
                    n_reused += 1;
                    edge
                } else {
                    n_new += 1;
                    self.make_split_edge(pb)?
                };
                self.ds.pave_block_mut(pb)?.edge = Some(split);
                self.fill_shrunk_data(pb)?;
            }
            self.ds.set_edge_state(edge, EdgeState::Frozen);
        }
        for (pb, real) in shared {
            let split = self.ds.pave_block(real)?.edge;
            if split.is_none() {
                debug!(pb, real, "real block has no split edge");
            }
            self.ds.pave_block_mut(pb)?.edge = split;
            self.fill_shrunk_data(pb)?;
        }
        info!(n_edges = edges.len(), n_new, n_reused, "split edges made");
        Ok(())
    }

    /// The block spans its whole edge between the edge's own vertices and
    /// shares its geometry with nothing else.
    fn is_original_block(&self, edge: usize, pb: usize) -> Result<bool, FillerError> {
        let block = self.ds.pave_block(pb)?;
        if block.common_block.is_some() {
            return Ok(false);
        }
        let own: Vec<usize> = self.ds.shape_info(edge)?.sub_shapes.clone();
        let (v1, v2) = block.vertices();
        Ok(own.contains(&v1) && own.contains(&v2))
    }

    pub(super) fn vertex_id(&self, vertex: usize) -> Result<VertexId, FillerError> {
        match self.ds.shape_of(vertex)? {
            ShapeRef::Vertex(id) => Ok(id),
            other => Err(FillerError::InvalidArgument {
                index: vertex,
                reason: format!("{:?} is not a vertex", other.kind()),
            }),
        }
    }

    /// New store edge on the block's curve between its vertices.
    pub(super) fn make_split_edge(&mut self, pb: usize) -> Result<usize, FillerError> {
        let block = self.ds.pave_block(pb)?.clone();
        let (curve, _) = self.ds.edge_curve(&self.store, block.original_edge)?;
        let mut tolerance = self.ds.tolerance(block.original_edge);
        if let Some(cb) = block.common_block {
            tolerance = tolerance.max(self.ds.common_block(cb)?.tolerance);
        }
        let v1 = self.vertex_id(self.ds.same_domain_index(block.pave1.index))?;
        let v2 = self.vertex_id(self.ds.same_domain_index(block.pave2.index))?;
        let id = self
            .store
            .add_edge(Edge::new(curve, block.range(), v1, v2, tolerance));
        Ok(self.ds.append_shape(&self.store, ShapeRef::Edge(id), tolerance))
    }

    /// Range of the block clear of its end vertices' tolerance, and whether
    /// anything is left of it.
    pub(super) fn fill_shrunk_data(&mut self, pb: usize) -> Result<(), FillerError> {
        let block = self.ds.pave_block(pb)?;
        let (curve, _) = self.ds.edge_curve(&self.store, block.original_edge)?;
        let (t1, t2) = block.range();
        let tol_v1 = self.ds.tolerance(self.ds.same_domain_index(block.pave1.index));
        let tol_v2 = self.ds.tolerance(self.ds.same_domain_index(block.pave2.index));
        let tol_e = self.ds.tolerance(block.original_edge);
        let s1 = t1 + curve.parameter_step(t1, tol_v1);
        let s2 = t2 - curve.parameter_step(t2, tol_v2);
        let parametric = Tolerance::default().parametric;
        let valid = s2 - s1 > parametric && curve.approximate_length(s1, s2, 8) > tol_e;
        let range = if s1 < s2 {
            (s1, s2)
        } else {
            let middle = block.middle_parameter();
            (middle, middle)
        };
        let shrunk = ShrunkData {
            range,
            bbox: curve.bounding_box(range.0, range.1).expanded(tol_e),
            splittable: valid,
        };
        let block = self.ds.pave_block_mut(pb)?;
        block.shrunk = Some(shrunk);
        block.micro = !valid;
        Ok(())
    }
}
