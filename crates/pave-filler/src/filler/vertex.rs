//! Vertex/vertex, vertex/edge and vertex/face stages.

use bop_kernel::{Point3d, ShapeKind, ShapeRef};
use tracing::{debug, info, instrument};

use super::{connected_groups, PaveFiller};
use crate::ds::interf::{VertexEdge, VertexFace, VertexVertex};
use crate::ds::pave::{Pave, PaveSource};
use crate::error::FillerError;
use crate::iterator::candidate_pairs;

impl PaveFiller {
    /// Merge coincident vertices of different arguments. Each group gets one
    /// new vertex at its centroid, large enough to cover every member.
    #[instrument(skip(self))]
    pub(super) fn perform_vv(&mut self) -> Result<(), FillerError> {
        let pairs = candidate_pairs(&self.ds, ShapeKind::Vertex, ShapeKind::Vertex);
        let mut touching = Vec::new();
        for (i, j) in pairs {
            self.cancel.check()?;
            let pi = self.ds.vertex_point(&self.store, i)?;
            let pj = self.ds.vertex_point(&self.store, j)?;
            if pi.distance_to(&pj) <= self.pair_tolerance(i, j) {
                touching.push((i, j));
            }
        }

        let groups = connected_groups(&touching);
        for group in &groups {
            let points = group
                .iter()
                .map(|&k| self.ds.vertex_point(&self.store, k))
                .collect::<Result<Vec<Point3d>, _>>()?;
            let Some(center) = Point3d::centroid(&points) else {
                continue;
            };
            let tolerance = group
                .iter()
                .zip(&points)
                .map(|(&k, p)| center.distance_to(p) + self.ds.tolerance(k))
                .fold(0.0, f64::max);
            let vertex = self.make_vertex(center, tolerance);
            for &k in group {
                self.ds.set_same_domain(k, vertex);
            }
            debug!(?group, vertex, tolerance, "vertices merged");
        }
        for &(i, j) in &touching {
            let new_vertex = self.ds.same_domain_index(i);
            self.ds.add_vv(VertexVertex {
                index1: i,
                index2: j,
                new_vertex,
            });
        }
        self.ds.update_pave_blocks_with_sd();
        info!(n_interferences = touching.len(), n_groups = groups.len(), "VV done");
        Ok(())
    }

    /// Put vertices lying on edges of other arguments onto those edges as
    /// paves, then split.
    #[instrument(skip(self))]
    pub(super) fn perform_ve(&mut self) -> Result<(), FillerError> {
        let pairs = candidate_pairs(&self.ds, ShapeKind::Vertex, ShapeKind::Edge);
        let mut found = 0;
        for (v, e) in pairs {
            self.cancel.check()?;
            if self.ds.is_degenerated(e) {
                continue;
            }
            let nv = self.ds.same_domain_index(v);
            let blocks = self.ds.pave_blocks_of(e).to_vec();
            let already_paved = blocks
                .iter()
                .any(|&pb| self.ds.pave_block(pb).is_ok_and(|b| b.has_vertex(nv)));
            if already_paved {
                continue;
            }
            let point = self.ds.vertex_point(&self.store, nv)?;
            let (curve, range) = self.ds.edge_curve(&self.store, e)?;
            let tolerance = self.pair_tolerance(nv, e);
            let Some((t, distance)) = self.context.compute_ve(&point, &curve, range, tolerance) else {
                continue;
            };
            let Some(&pb) = blocks
                .iter()
                .find(|&&pb| self.ds.pave_block(pb).is_ok_and(|b| b.contains_parameter(t, 0.0)))
            else {
                continue;
            };
            self.ds.update_tolerance(nv, distance);
            self.ds.add_ve(VertexEdge {
                vertex: nv,
                edge: e,
                parameter: t,
            });
            self.ds
                .append_ext_pave(&self.store, pb, Pave::new(nv, t, PaveSource::VertexEdge))?;
            found += 1;
        }
        let split = self.ds.split_pave_blocks(&self.store)?;
        info!(n_interferences = found, n_split_edges = split.len(), "VE done");
        Ok(())
    }

    /// Classify vertices against faces of other arguments. Vertices IN or ON
    /// a face join its IN set.
    #[instrument(skip(self))]
    pub(super) fn perform_vf(&mut self) -> Result<(), FillerError> {
        let pairs = candidate_pairs(&self.ds, ShapeKind::Vertex, ShapeKind::Face);
        let mut found = 0;
        let mut faces = Vec::new();
        for (v, f) in pairs {
            self.cancel.check()?;
            self.ensure_face_info(f);
            let nv = self.ds.same_domain_index(v);
            let known = self
                .ds
                .face_info(f)
                .is_some_and(|info| info.vertices_on.contains(&nv) || info.vertices_in.contains(&nv));
            if known {
                continue;
            }
            let ShapeRef::Face(face_id) = self.ds.shape_of(f)? else {
                continue;
            };
            let point = self.ds.vertex_point(&self.store, nv)?;
            let tolerance = self.pair_tolerance(nv, f);
            let Some(uv) = self.context.compute_vf(&self.store, face_id, &point, tolerance) else {
                continue;
            };
            self.ds.add_vf(VertexFace {
                vertex: nv,
                face: f,
                uv,
            });
            self.ds.face_info_mut(f).vertices_in.insert(nv);
            faces.push(f);
            found += 1;
        }
        faces.sort_unstable();
        faces.dedup();
        for f in faces {
            self.ds.refine_face_info_in(f);
        }
        info!(n_interferences = found, "VF done");
        Ok(())
    }
}
