use std::collections::BTreeSet;

use serde::Serialize;

/// What a face knows about the pave blocks and vertices touching it.
///
/// `on` entries lie on the face boundary, `in` entries inside it (from VF/EF),
/// `sc` entries come from section curves with other faces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaceInfo {
    pub face: usize,
    pub pave_blocks_on: BTreeSet<usize>,
    pub pave_blocks_in: BTreeSet<usize>,
    pub pave_blocks_sc: BTreeSet<usize>,
    pub vertices_on: BTreeSet<usize>,
    pub vertices_in: BTreeSet<usize>,
    pub vertices_sc: BTreeSet<usize>,
}

impl FaceInfo {
    pub fn new(face: usize) -> Self {
        Self {
            face,
            ..Self::default()
        }
    }

    /// Vertices ON or IN the face.
    pub fn vertices_on_in(&self) -> BTreeSet<usize> {
        self.vertices_on.union(&self.vertices_in).copied().collect()
    }

    /// Every vertex the face knows of.
    pub fn all_vertices(&self) -> BTreeSet<usize> {
        let mut all = self.vertices_on_in();
        all.extend(self.vertices_sc.iter().copied());
        all
    }

    pub fn all_pave_blocks(&self) -> BTreeSet<usize> {
        self.pave_blocks_on
            .iter()
            .chain(&self.pave_blocks_in)
            .chain(&self.pave_blocks_sc)
            .copied()
            .collect()
    }

    pub fn knows_pave_block(&self, pave_block: usize) -> bool {
        self.pave_blocks_on.contains(&pave_block)
            || self.pave_blocks_in.contains(&pave_block)
            || self.pave_blocks_sc.contains(&pave_block)
    }
}
