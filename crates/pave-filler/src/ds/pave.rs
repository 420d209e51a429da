use std::collections::BTreeSet;

use bop_kernel::BoundingBox;
use serde::Serialize;

/// Interference kind that put a pave on its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PaveSource {
    /// The edge's own end vertex.
    Bound,
    VertexEdge,
    EdgeEdge,
    EdgeFace,
    /// Placed on a section curve.
    Section,
    /// Second pave of a closed section curve.
    Closing,
}

/// A split point: vertex `index` at `parameter` on the edge curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pave {
    pub index: usize,
    pub parameter: f64,
    pub source: PaveSource,
}

impl Pave {
    pub fn new(index: usize, parameter: f64, source: PaveSource) -> Self {
        Self {
            index,
            parameter,
            source,
        }
    }
}

/// Sub-range of a pave block that stays clear of its end vertices' tolerance
/// spheres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShrunkData {
    pub range: (f64, f64),
    pub bbox: BoundingBox,
    /// False when the block is too short to be split any further.
    pub splittable: bool,
}

/// Part of an edge between two consecutive paves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaveBlock {
    /// Edge whose curve carries the block.
    pub original_edge: usize,
    /// Split edge materialized for this block.
    pub edge: Option<usize>,
    pub pave1: Pave,
    pub pave2: Pave,
    /// Paves found strictly inside the block, not yet split on.
    pub ext_paves: Vec<Pave>,
    pub shrunk: Option<ShrunkData>,
    pub common_block: Option<usize>,
    /// Block no longer than its tolerance.
    pub micro: bool,
}

impl PaveBlock {
    pub fn new(original_edge: usize, pave1: Pave, pave2: Pave) -> Self {
        Self {
            original_edge,
            edge: None,
            pave1,
            pave2,
            ext_paves: Vec::new(),
            shrunk: None,
            common_block: None,
            micro: false,
        }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.pave1.parameter, self.pave2.parameter)
    }

    pub fn middle_parameter(&self) -> f64 {
        0.5 * (self.pave1.parameter + self.pave2.parameter)
    }

    pub fn vertices(&self) -> (usize, usize) {
        (self.pave1.index, self.pave2.index)
    }

    /// Both blocks are bounded by the same two vertices, in either order.
    pub fn has_same_bounds(&self, other: &PaveBlock) -> bool {
        let (a1, a2) = self.vertices();
        let (b1, b2) = other.vertices();
        (a1 == b1 && a2 == b2) || (a1 == b2 && a2 == b1)
    }

    pub fn has_vertex(&self, index: usize) -> bool {
        self.pave1.index == index
            || self.pave2.index == index
            || self.ext_paves.iter().any(|p| p.index == index)
    }

    /// Record a pave to split on later. Returns false if the vertex is
    /// already a pave of this block.
    pub fn append_ext_pave(&mut self, pave: Pave) -> bool {
        if self.has_vertex(pave.index) {
            return false;
        }
        self.ext_paves.push(pave);
        true
    }

    pub fn contains_parameter(&self, t: f64, slack: f64) -> bool {
        let (t1, t2) = self.range();
        t > t1 + slack && t < t2 - slack
    }
}

/// Pave blocks of different edges that are geometrically the same and share
/// one split edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommonBlock {
    pub pave_blocks: Vec<usize>,
    /// Faces the common block lies on.
    pub faces: BTreeSet<usize>,
    pub tolerance: f64,
}

impl CommonBlock {
    /// Block whose edge carries the shared split edge.
    pub fn real_pave_block(&self) -> Option<usize> {
        self.pave_blocks.first().copied()
    }

    pub fn contains(&self, pave_block: usize) -> bool {
        self.pave_blocks.contains(&pave_block)
    }
}

/// Lifecycle of an edge's pave list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum EdgeState {
    /// One block between the edge's own vertices.
    Unsplit,
    /// Extra paves recorded, not yet split on.
    Paved,
    /// Blocks partition the edge.
    SplitBlocks,
    /// Split edges and shrunk data are computed.
    Frozen,
}
