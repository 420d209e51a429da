//! Section edges from the paves of face/face curves.

use std::collections::BTreeSet;

use bop_kernel::topology::shape::Edge;
use bop_kernel::{ShapeRef, CONFUSION};
use tracing::{debug, info, instrument};

use super::PaveFiller;
use crate::ds::curve::SectionCurve;
use crate::ds::pave::{EdgeState, Pave, PaveBlock, PaveSource};
use crate::error::{FillerError, WarningCode};

/// Samples of a section block used for its length.
const LENGTH_SAMPLES: usize = 16;

impl PaveFiller {
    /// Turn consecutive paves of every section curve into pave blocks.
    /// A block matching an existing one of either face reuses it; the others
    /// get a new section edge.
    #[instrument(skip(self))]
    pub(super) fn make_blocks(&mut self) -> Result<(), FillerError> {
        let n_records = self.ds.interferences().ff.len();
        let mut n_new = 0;
        let mut n_reused = 0;
        for ff in 0..n_records {
            self.cancel.check()?;
            let record = &self.ds.interferences().ff[ff];
            let (face1, face2) = (record.face1, record.face2);
            let curves = record.curves.clone();
            for (ci, mut sc) in curves.into_iter().enumerate() {
                sc.pave_blocks.clear();
                let paves = sc.paves.clone();
                for pair in paves.windows(2) {
                    let (p1, p2) = (pair[0], pair[1]);
                    let Some(candidate) = self.section_block_candidate(ff, face1, face2, &sc, p1, p2)? else {
                        continue;
                    };
                    let pb = match self.find_existing_pave_block(face1, face2, &sc, &candidate)? {
                        Some(existing) => {
                            n_reused += 1;
                            self.share_with_faces(existing, face1, face2, sc.tolerance)?;
                            existing
                        }
                        None => {
                            n_new += 1;
                            self.make_section_edge(&sc, candidate)?
                        }
                    };
                    if !sc.pave_blocks.contains(&pb) {
                        sc.pave_blocks.push(pb);
                    }
                    for face in [face1, face2] {
                        self.ds.face_info_mut(face).pave_blocks_sc.insert(pb);
                    }
                }
                if let Some(slot) = self.ds.section_curve_mut(ff, ci) {
                    *slot = sc;
                }
            }
        }
        let faces: Vec<usize> = self.ds.faces_with_info().collect();
        for face in faces {
            self.ds.refine_face_info_in(face);
        }
        info!(n_records, n_new, n_reused, "section blocks made");
        Ok(())
    }

    /// Block between two consecutive paves, if it is worth an edge.
    fn section_block_candidate(
        &mut self,
        ff: usize,
        face1: usize,
        face2: usize,
        sc: &SectionCurve,
        p1: Pave,
        p2: Pave,
    ) -> Result<Option<PaveBlock>, FillerError> {
        let (t1, t2) = (p1.parameter, p2.parameter);
        let length = sc.curve.approximate_length(t1, t2, LENGTH_SAMPLES);
        let (v1, v2) = (self.ds.same_domain_index(p1.index), self.ds.same_domain_index(p2.index));
        if v1 == v2 && p2.source != PaveSource::Closing {
            if length > sc.tolerance.max(self.ds.tolerance(v1)) {
                self.report.add_warning(
                    WarningCode::SectionEdgeRejected,
                    vec![face1, face2],
                    format!("section curve {ff} starts and ends at vertex {v1} over length {length:.3e}"),
                );
            }
            return Ok(None);
        }
        if length <= sc.tolerance {
            return Ok(None);
        }
        let middle = sc.curve.evaluate(0.5 * (t1 + t2));
        for face in [face1, face2] {
            let ShapeRef::Face(id) = self.ds.shape_of(face)? else {
                return Ok(None);
            };
            let state = self
                .context
                .classify_point_in_face(&self.store, id, &middle, sc.tolerance);
            if !state.is_in_or_on() {
                debug!(ff, t1, t2, "section block outside the faces");
                return Ok(None);
            }
        }
        // original edge is not known yet
        Ok(Some(PaveBlock::new(
            usize::MAX,
            Pave { index: v1, ..p1 },
            Pave { index: v2, ..p2 },
        )))
    }

    /// A block of either face with the same end vertices whose curve stays
    /// within tolerance of the section block at every interior sample.
    fn find_existing_pave_block(
        &self,
        face1: usize,
        face2: usize,
        sc: &SectionCurve,
        candidate: &PaveBlock,
    ) -> Result<Option<usize>, FillerError> {
        let mut known = BTreeSet::new();
        for face in [face1, face2] {
            if let Some(info) = self.ds.face_info(face) {
                known.extend(info.all_pave_blocks());
            }
        }
        let (t1, t2) = candidate.range();
        let n = self.config.post_treat_samples;
        let samples: Vec<_> = (1..=n)
            .map(|k| sc.curve.evaluate(t1 + (t2 - t1) * k as f64 / (n + 1) as f64))
            .collect();
        for pb in known {
            let pb = self.ds.real_pave_block(pb);
            let block = self.ds.pave_block(pb)?;
            if !block.has_same_bounds(candidate) {
                continue;
            }
            let (curve, _) = self.ds.edge_curve(&self.store, block.original_edge)?;
            let (b1, b2) = block.range();
            let reach = sc.tolerance.max(self.ds.tolerance(block.original_edge)) + self.config.fuzzy_value.max(CONFUSION);
            let close = samples
                .iter()
                .all(|p| curve.closest_parameter(p, b1.min(b2), b1.max(b2)).1 <= reach);
            if close {
                return Ok(Some(pb));
            }
        }
        Ok(None)
    }

    /// Record that an existing block also lies on both faces.
    fn share_with_faces(&mut self, pb: usize, face1: usize, face2: usize, tolerance: f64) -> Result<(), FillerError> {
        let cb = match self.ds.pave_block(pb)?.common_block {
            Some(cb) => cb,
            None => self.ds.make_common_block(&[pb], tolerance),
        };
        self.ds.common_block_mut(cb)?.faces.extend([face1, face2]);
        Ok(())
    }

    /// New edge on the section curve carrying the candidate block.
    fn make_section_edge(&mut self, sc: &SectionCurve, mut candidate: PaveBlock) -> Result<usize, FillerError> {
        let v1 = self.vertex_id(candidate.pave1.index)?;
        let v2 = self.vertex_id(candidate.pave2.index)?;
        let mut tolerance = sc.tolerance;
        for v in [candidate.pave1.index, candidate.pave2.index] {
            tolerance = tolerance.max(self.ds.tolerance(v));
        }
        let id = self
            .store
            .add_edge(Edge::new(sc.curve, candidate.range(), v1, v2, tolerance));
        let edge = self.ds.append_shape(&self.store, ShapeRef::Edge(id), tolerance);
        candidate.original_edge = edge;
        candidate.edge = Some(edge);
        let pb = self.ds.add_edge_block(edge, candidate);
        self.ds.set_edge_state(edge, EdgeState::Frozen);
        self.fill_shrunk_data(pb)?;
        Ok(pb)
    }
}
