//! Sub-shapes of one argument lying inside a solid of another.

use bop_kernel::{Point3d, ShapeKind, ShapeRef};
use tracing::{info, instrument, trace};

use super::PaveFiller;
use crate::context::PointState;
use crate::ds::interf::{InterfKind, ShapeSolid};
use crate::error::FillerError;
use crate::iterator::candidate_pairs;

impl PaveFiller {
    #[instrument(skip(self))]
    pub(super) fn perform_vz(&mut self) -> Result<(), FillerError> {
        self.perform_shape_solid(ShapeKind::Vertex, InterfKind::VertexSolid)
    }

    #[instrument(skip(self))]
    pub(super) fn perform_ez(&mut self) -> Result<(), FillerError> {
        self.perform_shape_solid(ShapeKind::Edge, InterfKind::EdgeSolid)
    }

    #[instrument(skip(self))]
    pub(super) fn perform_fz(&mut self) -> Result<(), FillerError> {
        self.perform_shape_solid(ShapeKind::Face, InterfKind::FaceSolid)
    }

    /// Solids are tested both ways; the first face of each stands in for it.
    #[instrument(skip(self))]
    pub(super) fn perform_zz(&mut self) -> Result<(), FillerError> {
        let pairs = candidate_pairs(&self.ds, ShapeKind::Solid, ShapeKind::Solid);
        let mut found = 0;
        for (z1, z2) in pairs {
            self.cancel.check()?;
            if self.boundaries_touch(z1, z2) {
                continue;
            }
            for (shape, solid) in [(z1, z2), (z2, z1)] {
                let Some(face) = self.ds.sub_shapes_of_kind(shape, ShapeKind::Face).first().copied() else {
                    continue;
                };
                if self.strictly_inside(face, solid)? {
                    self.ds
                        .add_shape_solid(InterfKind::SolidSolid, ShapeSolid { shape, solid });
                    found += 1;
                }
            }
        }
        info!(n_interferences = found, "ZZ done");
        Ok(())
    }

    fn perform_shape_solid(&mut self, kind: ShapeKind, interf: InterfKind) -> Result<(), FillerError> {
        let pairs = candidate_pairs(&self.ds, kind, ShapeKind::Solid);
        let mut found = 0;
        for (shape, solid) in pairs {
            self.cancel.check()?;
            let sd = self.ds.same_domain_index(shape);
            if self.ds.has_interf_shape_subshapes(shape, solid) || self.ds.has_interf_shape_subshapes(sd, solid) {
                continue;
            }
            if self.strictly_inside(shape, solid)? {
                self.ds.add_shape_solid(interf, ShapeSolid { shape, solid });
                found += 1;
            }
        }
        info!(%interf, n_interferences = found, "shape/solid stage done");
        Ok(())
    }

    /// Sub-shapes of two shapes touch, or are shared.
    fn boundaries_touch(&self, i: usize, j: usize) -> bool {
        let left = self.ds.all_sub_shapes(i);
        let right = self.ds.all_sub_shapes(j);
        left.intersection(&right).next().is_some()
            || left.iter().any(|&a| right.iter().any(|&b| self.ds.has_interf(a, b)))
    }

    /// A representative point of `shape` classifies strictly inside `solid`.
    fn strictly_inside(&self, shape: usize, solid: usize) -> Result<bool, FillerError> {
        let ShapeRef::Solid(solid_id) = self.ds.shape_of(solid)? else {
            return Ok(false);
        };
        let Some(point) = self.representative_point(shape)? else {
            trace!(shape, "no representative point");
            return Ok(false);
        };
        let tolerance = self.pair_tolerance(shape, solid);
        let state = self
            .context
            .point_in_solid(&self.store, solid_id, &point, tolerance);
        Ok(state == PointState::In)
    }

    fn representative_point(&self, shape: usize) -> Result<Option<Point3d>, FillerError> {
        match self.ds.shape_of(shape)? {
            ShapeRef::Vertex(_) => {
                let v = self.ds.same_domain_index(shape);
                self.ds.vertex_point(&self.store, v).map(Some)
            }
            ShapeRef::Edge(_) => {
                let (curve, (t1, t2)) = self.ds.edge_curve(&self.store, shape)?;
                Ok(Some(curve.evaluate(0.5 * (t1 + t2))))
            }
            ShapeRef::Face(id) => Ok(self
                .context
                .face_classifier(id)
                .and_then(|c| c.interior_point())),
            _ => Ok(None),
        }
    }
}
