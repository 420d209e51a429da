//! Shape index and interference data structure.
//!
//! Every sub-shape of every argument gets a stable `usize` index at init;
//! shapes created by the filler are appended after them. All interference
//! records, paves and pave blocks refer to shapes by these indices only.

pub mod curve;
pub mod face_info;
pub mod interf;
pub mod pave;
pub mod shape_info;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;

use bop_kernel::geometry::curve2d::Curve2d;
use bop_kernel::{BoundingBox, Curve, Point3d, ShapeKind, ShapeRef, ShapeStore, CONFUSION};
use tracing::{debug, instrument};

use crate::error::FillerError;
use curve::SectionCurve;
use face_info::FaceInfo;
use interf::*;
use pave::*;
use shape_info::ShapeInfo;

#[derive(Debug, Clone, Default)]
pub struct DataStructure {
    shapes: Vec<ShapeInfo>,
    index: HashMap<ShapeRef, usize>,
    ranges: Vec<Range<usize>>,
    n_source: usize,
    fuzzy_value: f64,
    ancestors: Vec<Vec<usize>>,
    same_domain: BTreeMap<usize, usize>,
    pave_blocks: Vec<PaveBlock>,
    edge_blocks: BTreeMap<usize, Vec<usize>>,
    edge_states: BTreeMap<usize, EdgeState>,
    replaced: BTreeMap<usize, Vec<usize>>,
    common_blocks: Vec<CommonBlock>,
    face_infos: BTreeMap<usize, FaceInfo>,
    interf: Interferences,
    interf_with: BTreeMap<usize, BTreeSet<usize>>,
    extended_tolerances: BTreeMap<usize, f64>,
    degenerated: BTreeSet<usize>,
    pcurves: BTreeMap<(usize, usize), Curve2d>,
}

impl DataStructure {
    // ─── Shape index ─────────────────────────────────────────────────────────

    /// Index every sub-shape of every argument, shape first, then its
    /// sub-shapes depth first. Each edge starts with one pave block.
    #[instrument(skip(store, arguments), fields(n_arguments = arguments.len()))]
    pub fn init(
        store: &ShapeStore,
        arguments: &[ShapeRef],
        fuzzy_value: f64,
    ) -> Result<Self, FillerError> {
        if arguments.is_empty() {
            return Err(FillerError::NoArguments);
        }
        if !fuzzy_value.is_finite() || fuzzy_value < 0.0 {
            return Err(FillerError::InvalidFuzzyValue(fuzzy_value));
        }
        let mut ds = Self {
            fuzzy_value,
            ..Self::default()
        };
        for (rank, &argument) in arguments.iter().enumerate() {
            if !store.contains(argument) {
                return Err(FillerError::InvalidArgument {
                    index: rank,
                    reason: format!("{argument:?} is not in the shape store"),
                });
            }
            let start = ds.shapes.len();
            ds.index_shape(store, argument, rank);
            ds.ranges.push(start..ds.shapes.len());
        }
        ds.n_source = ds.shapes.len();
        ds.init_pave_blocks(store)?;
        debug!(n_shapes = ds.n_source, "shape index built");
        Ok(ds)
    }

    fn box_gap(&self) -> f64 {
        0.5 * self.fuzzy_value.max(CONFUSION)
    }

    fn index_shape(&mut self, store: &ShapeStore, shape: ShapeRef, rank: usize) -> usize {
        if let Some(&i) = self.index.get(&shape) {
            return i;
        }
        let tolerance = store.tolerance(shape).unwrap_or(0.0);
        let i = self.shapes.len();
        self.shapes.push(ShapeInfo::new(shape, Some(rank), tolerance));
        self.ancestors.push(Vec::new());
        self.index.insert(shape, i);

        let sub_shapes: Vec<usize> = store
            .children(shape)
            .into_iter()
            .map(|child| self.index_shape(store, child, rank))
            .collect();
        for &s in &sub_shapes {
            self.ancestors[s].push(i);
        }
        self.shapes[i].bbox = self.compute_box(store, shape, tolerance, &sub_shapes);
        self.shapes[i].sub_shapes = sub_shapes;
        i
    }

    fn compute_box(&self, store: &ShapeStore, shape: ShapeRef, tolerance: f64, sub_shapes: &[usize]) -> BoundingBox {
        let own = match shape.kind() {
            ShapeKind::Vertex | ShapeKind::Edge | ShapeKind::Face => {
                store.bounding_box(shape).expanded(tolerance + self.box_gap())
            }
            _ => BoundingBox::empty(),
        };
        sub_shapes
            .iter()
            .fold(own, |bb, &s| bb.union(&self.shapes[s].bbox))
    }

    /// Register a shape created during the run. Its sub-shapes must already
    /// be indexed.
    pub fn append_shape(&mut self, store: &ShapeStore, shape: ShapeRef, tolerance: f64) -> usize {
        if let Some(&i) = self.index.get(&shape) {
            return i;
        }
        let sub_shapes: Vec<usize> = store
            .children(shape)
            .into_iter()
            .filter_map(|c| self.index.get(&c).copied())
            .collect();
        let i = self.shapes.len();
        let mut info = ShapeInfo::new(shape, None, tolerance);
        info.bbox = self.compute_box(store, shape, tolerance, &sub_shapes);
        info.sub_shapes = sub_shapes.clone();
        self.shapes.push(info);
        self.ancestors.push(Vec::new());
        self.index.insert(shape, i);
        for s in sub_shapes {
            self.ancestors[s].push(i);
        }
        i
    }

    pub fn n_shapes(&self) -> usize {
        self.shapes.len()
    }

    pub fn n_source_shapes(&self) -> usize {
        self.n_source
    }

    pub fn is_new_shape(&self, i: usize) -> bool {
        i >= self.n_source
    }

    pub fn n_ranks(&self) -> usize {
        self.ranges.len()
    }

    /// Index range of the shapes first met while indexing argument `rank`.
    pub fn argument_range(&self, rank: usize) -> Result<Range<usize>, FillerError> {
        self.ranges
            .get(rank)
            .cloned()
            .ok_or(FillerError::IndexOutOfRange {
                index: rank,
                len: self.ranges.len(),
            })
    }

    pub fn fuzzy_value(&self) -> f64 {
        self.fuzzy_value
    }

    pub fn shape_info(&self, i: usize) -> Result<&ShapeInfo, FillerError> {
        self.shapes.get(i).ok_or(FillerError::IndexOutOfRange {
            index: i,
            len: self.shapes.len(),
        })
    }

    pub fn shape_of(&self, i: usize) -> Result<ShapeRef, FillerError> {
        self.shape_info(i).map(|info| info.shape)
    }

    pub fn index_of(&self, shape: &ShapeRef) -> Option<usize> {
        self.index.get(shape).copied()
    }

    pub fn rank(&self, i: usize) -> Option<usize> {
        self.shapes.get(i).and_then(|info| info.rank)
    }

    pub fn kind(&self, i: usize) -> Option<ShapeKind> {
        self.shapes.get(i).map(|info| info.kind)
    }

    pub fn tolerance(&self, i: usize) -> f64 {
        self.shapes.get(i).map_or(0.0, |info| info.tolerance)
    }

    pub fn bbox(&self, i: usize) -> BoundingBox {
        self.shapes.get(i).map_or_else(BoundingBox::empty, |info| info.bbox)
    }

    /// Grow the working tolerance of `i` (never shrinks it).
    pub fn update_tolerance(&mut self, i: usize, tolerance: f64) {
        if let Some(info) = self.shapes.get_mut(i) {
            if tolerance > info.tolerance {
                info.bbox = info.bbox.expanded(tolerance - info.tolerance);
                info.tolerance = tolerance;
            }
        }
    }

    /// Source shapes of `kind`, in index order.
    pub fn source_indices(&self, kind: ShapeKind) -> Vec<usize> {
        (0..self.n_source)
            .filter(|&i| self.shapes[i].kind == kind)
            .collect()
    }

    pub fn ancestors(&self, i: usize) -> &[usize] {
        self.ancestors.get(i).map_or(&[], |a| a.as_slice())
    }

    /// All sub-shapes of `i` at any depth, `i` excluded.
    pub fn all_sub_shapes(&self, i: usize) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        let mut stack: Vec<usize> = self.shapes.get(i).map(|s| s.sub_shapes.clone()).unwrap_or_default();
        while let Some(s) = stack.pop() {
            if found.insert(s) {
                stack.extend(self.shapes[s].sub_shapes.iter().copied());
            }
        }
        found
    }

    /// Sub-shapes of `i` of the given kind, in index order.
    pub fn sub_shapes_of_kind(&self, i: usize, kind: ShapeKind) -> Vec<usize> {
        self.all_sub_shapes(i)
            .into_iter()
            .filter(|&s| self.shapes[s].kind == kind)
            .collect()
    }

    /// Point of vertex `i`.
    pub fn vertex_point(&self, store: &ShapeStore, i: usize) -> Result<Point3d, FillerError> {
        match self.shape_of(i)? {
            ShapeRef::Vertex(id) => store
                .vertices
                .get(id)
                .map(|v| v.point)
                .ok_or_else(|| missing(i)),
            other => Err(FillerError::InvalidArgument {
                index: i,
                reason: format!("{:?} is not a vertex", other.kind()),
            }),
        }
    }

    /// Curve and vertex-to-vertex range of edge `i`.
    pub fn edge_curve(&self, store: &ShapeStore, i: usize) -> Result<(Curve, (f64, f64)), FillerError> {
        match self.shape_of(i)? {
            ShapeRef::Edge(id) => store
                .edges
                .get(id)
                .map(|e| (e.curve, e.range()))
                .ok_or_else(|| missing(i)),
            other => Err(FillerError::InvalidArgument {
                index: i,
                reason: format!("{:?} is not an edge", other.kind()),
            }),
        }
    }

    // ─── Same-domain vertices ────────────────────────────────────────────────

    /// Representative of the group `i` was merged into (`i` itself if none).
    pub fn same_domain_index(&self, i: usize) -> usize {
        let mut current = i;
        while let Some(&next) = self.same_domain.get(&current) {
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    pub fn has_same_domain(&self, i: usize) -> bool {
        self.same_domain_index(i) != i
    }

    pub fn set_same_domain(&mut self, i: usize, target: usize) {
        let from = self.same_domain_index(i);
        let to = self.same_domain_index(target);
        if from != to {
            self.same_domain.insert(from, to);
        }
    }

    /// Merge vertex `from` into `into`, growing the survivor's tolerance so
    /// that it still covers `from`.
    pub fn merge_vertices(&mut self, store: &ShapeStore, from: usize, into: usize) -> Result<(), FillerError> {
        let from = self.same_domain_index(from);
        let into = self.same_domain_index(into);
        if from == into {
            return Ok(());
        }
        let distance = self
            .vertex_point(store, from)?
            .distance_to(&self.vertex_point(store, into)?);
        let needed = distance + self.tolerance(from);
        self.update_tolerance(into, needed);
        self.set_same_domain(from, into);
        Ok(())
    }

    /// Vertices within `max(tol_a, tol_b)` of each other, after SD mapping.
    pub fn vertices_coincide(&self, store: &ShapeStore, a: usize, b: usize) -> Result<bool, FillerError> {
        let a = self.same_domain_index(a);
        let b = self.same_domain_index(b);
        if a == b {
            return Ok(true);
        }
        let distance = self
            .vertex_point(store, a)?
            .distance_to(&self.vertex_point(store, b)?);
        Ok(distance <= self.tolerance(a).max(self.tolerance(b)).max(self.fuzzy_value))
    }

    pub fn set_extended_tolerance(&mut self, vertex: usize, tolerance: f64) {
        let entry = self.extended_tolerances.entry(vertex).or_insert(0.0);
        *entry = entry.max(tolerance);
    }

    /// Reach of a vertex created on a tangential contact.
    pub fn extended_tolerance(&self, vertex: usize) -> Option<f64> {
        self.extended_tolerances.get(&vertex).copied()
    }

    // ─── Pave blocks ─────────────────────────────────────────────────────────

    fn init_pave_blocks(&mut self, store: &ShapeStore) -> Result<(), FillerError> {
        for i in self.source_indices(ShapeKind::Edge) {
            let ShapeRef::Edge(id) = self.shapes[i].shape else {
                continue;
            };
            let Some(edge) = store.edges.get(id) else {
                return Err(missing(i));
            };
            if edge.degenerated {
                self.degenerated.insert(i);
                continue;
            }
            let (Some(v1), Some(v2)) = (
                self.index_of(&ShapeRef::Vertex(edge.start)),
                self.index_of(&ShapeRef::Vertex(edge.end)),
            ) else {
                return Err(missing(i));
            };
            let pb = PaveBlock::new(
                i,
                Pave::new(v1, edge.t_first, PaveSource::Bound),
                Pave::new(v2, edge.t_last, PaveSource::Bound),
            );
            self.pave_blocks.push(pb);
            self.edge_blocks.insert(i, vec![self.pave_blocks.len() - 1]);
            self.edge_states.insert(i, EdgeState::Unsplit);
        }
        Ok(())
    }

    /// Edge whose blocks are the given single block; used for section edges.
    pub fn add_edge_block(&mut self, edge: usize, pave_block: PaveBlock) -> usize {
        self.pave_blocks.push(pave_block);
        let id = self.pave_blocks.len() - 1;
        self.edge_blocks.entry(edge).or_default().push(id);
        self.edge_states.insert(edge, EdgeState::SplitBlocks);
        id
    }

    pub fn n_pave_blocks(&self) -> usize {
        self.pave_blocks.len()
    }

    pub fn pave_block(&self, id: usize) -> Result<&PaveBlock, FillerError> {
        self.pave_blocks.get(id).ok_or(FillerError::IndexOutOfRange {
            index: id,
            len: self.pave_blocks.len(),
        })
    }

    pub fn pave_block_mut(&mut self, id: usize) -> Result<&mut PaveBlock, FillerError> {
        let len = self.pave_blocks.len();
        self.pave_blocks
            .get_mut(id)
            .ok_or(FillerError::IndexOutOfRange { index: id, len })
    }

    /// Current blocks of edge `edge`, ordered along the curve.
    pub fn pave_blocks_of(&self, edge: usize) -> &[usize] {
        self.edge_blocks.get(&edge).map_or(&[], |v| v.as_slice())
    }

    /// Edges that own pave blocks, in index order.
    pub fn edges_with_blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.edge_blocks.keys().copied()
    }

    pub fn edge_state(&self, edge: usize) -> Option<EdgeState> {
        self.edge_states.get(&edge).copied()
    }

    pub fn set_edge_state(&mut self, edge: usize, state: EdgeState) {
        self.edge_states.insert(edge, state);
    }

    pub fn is_degenerated(&self, edge: usize) -> bool {
        self.degenerated.contains(&edge)
    }

    pub fn degenerated_edges(&self) -> &BTreeSet<usize> {
        &self.degenerated
    }

    /// Tag an edge the builder should leave out.
    pub fn mark_degenerated(&mut self, edge: usize) {
        self.degenerated.insert(edge);
    }

    /// True unless the block was split into others.
    pub fn is_current(&self, pave_block: usize) -> bool {
        !self.replaced.contains_key(&pave_block)
    }

    /// Current blocks that a (possibly split) block became.
    pub fn descendants(&self, pave_block: usize) -> Vec<usize> {
        match self.replaced.get(&pave_block) {
            None => vec![pave_block],
            Some(children) => children.iter().flat_map(|&c| self.descendants(c)).collect(),
        }
    }

    /// Add a pave inside a block. Blocks sharing a common block get the
    /// vertex too, at its projection on their own curve.
    pub fn append_ext_pave(&mut self, store: &ShapeStore, pave_block: usize, pave: Pave) -> Result<bool, FillerError> {
        let pave = Pave {
            index: self.same_domain_index(pave.index),
            ..pave
        };
        let block = self.pave_block_mut(pave_block)?;
        let added = block.append_ext_pave(pave);
        let (edge, common_block) = (block.original_edge, block.common_block);
        if added {
            self.edge_states.insert(edge, EdgeState::Paved);
        }
        let Some(cb) = common_block else {
            return Ok(added);
        };
        let point = self.vertex_point(store, pave.index)?;
        let others: Vec<usize> = self.common_blocks[cb]
            .pave_blocks
            .iter()
            .copied()
            .filter(|&pb| pb != pave_block)
            .collect();
        for other in others {
            let other_edge = self.pave_blocks[other].original_edge;
            let (curve, _) = self.edge_curve(store, other_edge)?;
            let (t1, t2) = self.pave_blocks[other].range();
            let (t, _) = curve.closest_parameter(&point, t1, t2);
            let block = &mut self.pave_blocks[other];
            if block.contains_parameter(t, 0.0) && block.append_ext_pave(Pave { parameter: t, ..pave }) {
                self.edge_states.insert(other_edge, EdgeState::Paved);
            }
        }
        Ok(added)
    }

    /// Split every block that has extra paves. Coincident paves are merged
    /// into one vertex first. Returns the edges whose blocks changed.
    pub fn split_pave_blocks(&mut self, store: &ShapeStore) -> Result<Vec<usize>, FillerError> {
        let pending: Vec<(usize, usize)> = self
            .edge_blocks
            .iter()
            .flat_map(|(&edge, blocks)| blocks.iter().map(move |&pb| (edge, pb)))
            .filter(|&(_, pb)| !self.pave_blocks[pb].ext_paves.is_empty())
            .collect();

        let mut touched_edges = BTreeSet::new();
        let mut touched_common_blocks = BTreeSet::new();
        for (edge, pb) in pending {
            let Some(children) = self.split_pave_block(store, pb)? else {
                continue;
            };
            if let Some(cb) = self.pave_blocks[pb].common_block {
                touched_common_blocks.insert(cb);
            }
            if let Some(blocks) = self.edge_blocks.get_mut(&edge) {
                if let Some(at) = blocks.iter().position(|&b| b == pb) {
                    blocks.splice(at..=at, children.iter().copied());
                }
            }
            self.replaced.insert(pb, children);
            touched_edges.insert(edge);
        }
        for &edge in &touched_edges {
            self.edge_states.insert(edge, EdgeState::SplitBlocks);
        }
        for cb in touched_common_blocks {
            self.regroup_common_block(cb);
        }
        self.update_pave_blocks_with_sd();
        Ok(touched_edges.into_iter().collect())
    }

    fn split_pave_block(&mut self, store: &ShapeStore, id: usize) -> Result<Option<Vec<usize>>, FillerError> {
        let block = self.pave_blocks[id].clone();
        let mut ext = block.ext_paves.clone();
        ext.sort_by(|a, b| a.parameter.total_cmp(&b.parameter));
        self.pave_blocks[id].ext_paves.clear();

        let mut kept = vec![block.pave1];
        for pave in ext {
            let last = kept[kept.len() - 1];
            if self.vertices_coincide(store, last.index, pave.index)? {
                self.merge_vertices(store, pave.index, last.index)?;
                continue;
            }
            kept.push(pave);
        }
        while kept.len() > 1 {
            let last = kept[kept.len() - 1];
            if !self.vertices_coincide(store, last.index, block.pave2.index)? {
                break;
            }
            self.merge_vertices(store, last.index, block.pave2.index)?;
            kept.pop();
        }
        kept.push(block.pave2);
        if kept.len() == 2 {
            return Ok(None);
        }

        let children = kept
            .windows(2)
            .map(|w| {
                self.pave_blocks.push(PaveBlock::new(block.original_edge, w[0], w[1]));
                self.pave_blocks.len() - 1
            })
            .collect();
        Ok(Some(children))
    }

    /// Rewrite every pave to its same-domain representative.
    pub fn update_pave_blocks_with_sd(&mut self) {
        let sd = |ds: &Self, p: &Pave| Pave {
            index: ds.same_domain_index(p.index),
            ..*p
        };
        for i in 0..self.pave_blocks.len() {
            let block = &self.pave_blocks[i];
            let pave1 = sd(self, &block.pave1);
            let pave2 = sd(self, &block.pave2);
            let ext: Vec<Pave> = block.ext_paves.iter().map(|p| sd(self, p)).collect();
            let block = &mut self.pave_blocks[i];
            block.pave1 = pave1;
            block.pave2 = pave2;
            block.ext_paves = ext;
        }
        let mut ff = std::mem::take(&mut self.interf.ff);
        for record in &mut ff {
            for sc in &mut record.curves {
                for pave in &mut sc.paves {
                    pave.index = self.same_domain_index(pave.index);
                }
            }
        }
        self.interf.ff = ff;
    }

    // ─── Common blocks ───────────────────────────────────────────────────────

    /// Put the blocks into one common block, joining any they already
    /// belong to.
    pub fn make_common_block(&mut self, pave_blocks: &[usize], tolerance: f64) -> usize {
        let existing = pave_blocks
            .iter()
            .find_map(|&pb| self.pave_blocks.get(pb).and_then(|b| b.common_block));
        let cb = match existing {
            Some(cb) => cb,
            None => {
                self.common_blocks.push(CommonBlock::default());
                self.common_blocks.len() - 1
            }
        };
        for &pb in pave_blocks {
            if let Some(old) = self.pave_blocks[pb].common_block.filter(|&old| old != cb) {
                let moved = std::mem::take(&mut self.common_blocks[old]);
                for other in &moved.pave_blocks {
                    self.pave_blocks[*other].common_block = Some(cb);
                }
                let target = &mut self.common_blocks[cb];
                target.pave_blocks.extend(moved.pave_blocks);
                target.faces.extend(moved.faces);
                target.tolerance = target.tolerance.max(moved.tolerance);
            }
            if !self.common_blocks[cb].contains(pb) {
                self.common_blocks[cb].pave_blocks.push(pb);
            }
            self.pave_blocks[pb].common_block = Some(cb);
        }
        let target = &mut self.common_blocks[cb];
        target.tolerance = target.tolerance.max(tolerance);
        cb
    }

    fn regroup_common_block(&mut self, cb: usize) {
        let old = std::mem::take(&mut self.common_blocks[cb]);
        let mut groups: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for &pb in &old.pave_blocks {
            for child in self.descendants(pb) {
                let (a, b) = self.pave_blocks[child].vertices();
                let (a, b) = (self.same_domain_index(a), self.same_domain_index(b));
                self.pave_blocks[child].common_block = None;
                groups.entry((a.min(b), a.max(b))).or_default().push(child);
            }
        }
        for (_, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let new_cb = self.make_common_block(&members, old.tolerance);
            self.common_blocks[new_cb].faces.extend(old.faces.iter().copied());
        }
    }

    pub fn common_block(&self, id: usize) -> Result<&CommonBlock, FillerError> {
        self.common_blocks.get(id).ok_or(FillerError::IndexOutOfRange {
            index: id,
            len: self.common_blocks.len(),
        })
    }

    pub fn common_block_mut(&mut self, id: usize) -> Result<&mut CommonBlock, FillerError> {
        let len = self.common_blocks.len();
        self.common_blocks
            .get_mut(id)
            .ok_or(FillerError::IndexOutOfRange { index: id, len })
    }

    /// Common blocks still holding blocks.
    pub fn common_blocks(&self) -> impl Iterator<Item = (usize, &CommonBlock)> {
        self.common_blocks
            .iter()
            .enumerate()
            .filter(|(_, cb)| !cb.pave_blocks.is_empty())
    }

    /// Block that carries the split edge of `pave_block`: the common block's
    /// real block if it has one, else itself.
    pub fn real_pave_block(&self, pave_block: usize) -> usize {
        self.pave_blocks
            .get(pave_block)
            .and_then(|b| b.common_block)
            .and_then(|cb| self.common_blocks.get(cb))
            .and_then(|cb| cb.real_pave_block())
            .unwrap_or(pave_block)
    }

    // ─── Face infos ──────────────────────────────────────────────────────────

    pub fn face_info(&self, face: usize) -> Option<&FaceInfo> {
        self.face_infos.get(&face)
    }

    pub fn face_info_mut(&mut self, face: usize) -> &mut FaceInfo {
        self.face_infos
            .entry(face)
            .or_insert_with(|| FaceInfo::new(face))
    }

    pub fn has_face_info(&self, face: usize) -> bool {
        self.face_infos.contains_key(&face)
    }

    pub fn init_face_info(&mut self, face: usize) {
        self.face_info_mut(face);
        self.update_face_info_on(face);
    }

    /// Boundary blocks and vertices of `face` from the current split state.
    pub fn update_face_info_on(&mut self, face: usize) {
        let mut blocks = BTreeSet::new();
        let mut vertices = BTreeSet::new();
        for edge in self.sub_shapes_of_kind(face, ShapeKind::Edge) {
            for &pb in self.pave_blocks_of(edge) {
                blocks.insert(pb);
                let (a, b) = self.pave_blocks[pb].vertices();
                vertices.insert(self.same_domain_index(a));
                vertices.insert(self.same_domain_index(b));
            }
        }
        for v in self.sub_shapes_of_kind(face, ShapeKind::Vertex) {
            vertices.insert(self.same_domain_index(v));
        }
        let info = self.face_info_mut(face);
        info.pave_blocks_on = blocks;
        info.vertices_on = vertices;
    }

    /// Vertices found inside `face` by VF and EF.
    pub fn update_face_info_in(&mut self, face: usize) {
        let mut vertices: BTreeSet<usize> = self
            .interf
            .vf
            .iter()
            .filter(|r| r.face == face)
            .map(|r| self.same_domain_index(r.vertex))
            .collect();
        vertices.extend(
            self.interf
                .ef
                .iter()
                .filter(|r| r.face == face)
                .filter_map(|r| r.vertex)
                .map(|v| self.same_domain_index(v)),
        );
        self.face_info_mut(face).vertices_in.extend(vertices);
        self.refine_face_info_in(face);
    }

    fn current_blocks(&self, blocks: &BTreeSet<usize>) -> BTreeSet<usize> {
        blocks.iter().flat_map(|&pb| self.descendants(pb)).collect()
    }

    pub fn refine_face_info_on(&mut self, face: usize) {
        let Some(info) = self.face_infos.get(&face) else {
            return;
        };
        let on = self.current_blocks(&info.pave_blocks_on);
        let mut vertices: BTreeSet<usize> = info
            .vertices_on
            .iter()
            .map(|&v| self.same_domain_index(v))
            .collect();
        for &pb in &on {
            let (a, b) = self.pave_blocks[pb].vertices();
            vertices.insert(self.same_domain_index(a));
            vertices.insert(self.same_domain_index(b));
        }
        let info = self.face_info_mut(face);
        info.pave_blocks_on = on;
        info.vertices_on = vertices;
    }

    /// Drop from IN and SC whatever is already known to be ON.
    pub fn refine_face_info_in(&mut self, face: usize) {
        let Some(info) = self.face_infos.get(&face) else {
            return;
        };
        let on = self.current_blocks(&info.pave_blocks_on);
        let pbs_in: BTreeSet<usize> = self
            .current_blocks(&info.pave_blocks_in)
            .difference(&on)
            .copied()
            .collect();
        let pbs_sc: BTreeSet<usize> = self
            .current_blocks(&info.pave_blocks_sc)
            .into_iter()
            .filter(|pb| !on.contains(pb) && !pbs_in.contains(pb))
            .collect();
        let sd = |set: &BTreeSet<usize>| -> BTreeSet<usize> {
            set.iter().map(|&v| self.same_domain_index(v)).collect()
        };
        let v_on = sd(&info.vertices_on);
        let v_in: BTreeSet<usize> = sd(&info.vertices_in).difference(&v_on).copied().collect();
        let v_sc: BTreeSet<usize> = sd(&info.vertices_sc)
            .into_iter()
            .filter(|v| !v_on.contains(v) && !v_in.contains(v))
            .collect();
        let info = self.face_info_mut(face);
        info.pave_blocks_on = on;
        info.pave_blocks_in = pbs_in;
        info.pave_blocks_sc = pbs_sc;
        info.vertices_on = v_on;
        info.vertices_in = v_in;
        info.vertices_sc = v_sc;
    }

    /// Faces with face info, in index order.
    pub fn faces_with_info(&self) -> impl Iterator<Item = usize> + '_ {
        self.face_infos.keys().copied()
    }

    // ─── Interferences ───────────────────────────────────────────────────────

    pub fn interferences(&self) -> &Interferences {
        &self.interf
    }

    pub fn interferences_mut(&mut self) -> &mut Interferences {
        &mut self.interf
    }

    /// Record that `i` and `j` interfere. Returns false if already known.
    pub fn add_interf(&mut self, i: usize, j: usize) -> bool {
        let added = self.interf_with.entry(i).or_default().insert(j);
        self.interf_with.entry(j).or_default().insert(i);
        added
    }

    pub fn has_interf(&self, i: usize, j: usize) -> bool {
        self.interf_with.get(&i).is_some_and(|s| s.contains(&j))
    }

    pub fn has_any_interf(&self, i: usize) -> bool {
        self.interf_with.get(&i).is_some_and(|s| !s.is_empty())
    }

    /// `i` or one of its sub-shapes touches a sub-shape of `j`. Shared
    /// sub-shapes count as touching.
    pub fn has_interf_shape_subshapes(&self, i: usize, j: usize) -> bool {
        let mut left = self.all_sub_shapes(i);
        left.insert(i);
        let right = self.all_sub_shapes(j);
        if left.intersection(&right).next().is_some() {
            return true;
        }
        left.iter()
            .any(|&a| right.iter().any(|&b| self.has_interf(a, b)))
    }

    pub fn add_vv(&mut self, record: VertexVertex) {
        self.add_interf(record.index1, record.index2);
        self.interf.vv.push(record);
    }

    pub fn add_ve(&mut self, record: VertexEdge) {
        self.add_interf(record.vertex, record.edge);
        self.interf.ve.push(record);
    }

    pub fn add_vf(&mut self, record: VertexFace) {
        self.add_interf(record.vertex, record.face);
        self.interf.vf.push(record);
    }

    pub fn add_ee(&mut self, record: EdgeEdge) -> usize {
        self.add_interf(record.edge1, record.edge2);
        self.interf.ee.push(record);
        self.interf.ee.len() - 1
    }

    pub fn add_ef(&mut self, record: EdgeFace) -> usize {
        self.add_interf(record.edge, record.face);
        self.interf.ef.push(record);
        self.interf.ef.len() - 1
    }

    pub fn add_ff(&mut self, record: FaceFace) -> usize {
        self.add_interf(record.face1, record.face2);
        self.interf.ff.push(record);
        self.interf.ff.len() - 1
    }

    pub fn add_shape_solid(&mut self, kind: InterfKind, record: ShapeSolid) {
        self.add_interf(record.shape, record.solid);
        let table = match kind {
            InterfKind::VertexSolid => &mut self.interf.vz,
            InterfKind::EdgeSolid => &mut self.interf.ez,
            InterfKind::FaceSolid => &mut self.interf.fz,
            _ => &mut self.interf.zz,
        };
        table.push(record);
    }

    pub fn section_curve_mut(&mut self, ff: usize, curve: usize) -> Option<&mut SectionCurve> {
        self.interf.ff.get_mut(ff).and_then(|r| r.curves.get_mut(curve))
    }

    // ─── 2D curves ───────────────────────────────────────────────────────────

    pub fn set_pcurve(&mut self, edge: usize, face: usize, pcurve: Curve2d) {
        self.pcurves.insert((edge, face), pcurve);
    }

    pub fn pcurve(&self, edge: usize, face: usize) -> Option<&Curve2d> {
        self.pcurves.get(&(edge, face))
    }

    pub fn pcurves(&self) -> impl Iterator<Item = (&(usize, usize), &Curve2d)> {
        self.pcurves.iter()
    }
}

fn missing(i: usize) -> FillerError {
    FillerError::InvalidArgument {
        index: i,
        reason: "shape missing from the store".into(),
    }
}

impl fmt::Display for DataStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "DS: {} shapes ({} source), {} ranks, fuzzy {:e}",
            self.shapes.len(),
            self.n_source,
            self.ranges.len(),
            self.fuzzy_value
        )?;
        for kind in InterfKind::ALL {
            let n = self.interf.count(kind);
            if n > 0 {
                writeln!(f, "  {kind}: {n}")?;
            }
        }
        let current = (0..self.pave_blocks.len()).filter(|&pb| self.is_current(pb)).count();
        writeln!(
            f,
            "  pave blocks: {current} current, common blocks: {}",
            self.common_blocks().count()
        )?;
        write!(f, "  same-domain vertices: {}", self.same_domain.len())
    }
}
