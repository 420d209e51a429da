//! What became of each source sub-shape after a run.

use std::collections::{HashMap, HashSet};

use bop_kernel::{ShapeKind, ShapeRef};
use tracing::debug;

use crate::ds::DataStructure;
use crate::error::FillerError;

/// Images of modified source shapes and the set of deleted ones. Shapes
/// that were neither keep their identity.
#[derive(Debug, Clone, Default)]
pub struct History {
    images: HashMap<ShapeRef, Vec<ShapeRef>>,
    deleted: HashSet<ShapeRef>,
}

impl History {
    pub fn build(ds: &DataStructure) -> Result<Self, FillerError> {
        let mut history = Self::default();
        for i in ds.source_indices(ShapeKind::Vertex) {
            let sd = ds.same_domain_index(i);
            if sd != i {
                history.images.insert(ds.shape_of(i)?, vec![ds.shape_of(sd)?]);
            }
        }
        for i in ds.source_indices(ShapeKind::Edge) {
            let shape = ds.shape_of(i)?;
            if ds.is_degenerated(i) {
                history.deleted.insert(shape);
                continue;
            }
            let mut images = Vec::new();
            for &pb in ds.pave_blocks_of(i) {
                let real = ds.real_pave_block(pb);
                let Some(edge) = ds.pave_block(real)?.edge else {
                    continue;
                };
                if ds.is_degenerated(edge) {
                    continue;
                }
                let image = ds.shape_of(edge)?;
                if !images.contains(&image) {
                    images.push(image);
                }
            }
            match images.as_slice() {
                [] => {
                    history.deleted.insert(shape);
                }
                [only] if *only == shape => {}
                _ => {
                    history.images.insert(shape, images);
                }
            }
        }
        debug!(
            n_modified = history.images.len(),
            n_deleted = history.deleted.len(),
            "history built"
        );
        Ok(history)
    }

    /// Shapes that replace `shape`; empty if it was kept as is or deleted.
    pub fn modified(&self, shape: &ShapeRef) -> &[ShapeRef] {
        self.images.get(shape).map_or(&[], |v| v.as_slice())
    }

    /// True if `shape` has no surviving image.
    pub fn is_deleted(&self, shape: &ShapeRef) -> bool {
        self.deleted.contains(shape)
    }

    pub fn has_modified(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = (&ShapeRef, &[ShapeRef])> {
        self.images.iter().map(|(k, v)| (k, v.as_slice()))
    }
}
