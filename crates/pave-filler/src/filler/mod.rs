//! The pave filler: runs every interference stage over the arguments and
//! materializes split edges and section edges.

mod degenerated;
mod edge_edge;
mod edge_face;
mod face_face;
mod pcurves;
mod post_treat;
mod solid;
mod split_edges;
mod vertex;

use std::collections::BTreeMap;

use bop_kernel::{Point3d, ShapeRef, ShapeStore};
use tracing::{info, instrument, warn};

use crate::config::FillerConfig;
use crate::context::Context;
use crate::ds::DataStructure;
use crate::error::{FillerError, Report};
use crate::history::History;
use crate::progress::{CancelToken, Stage, StageObserver};

/// Intersection stage of a Boolean operation, as seen by the builders that
/// consume its results.
///
/// Implement this trait to feed a builder from another intersection engine
/// or from a prepared DS in tests.
pub trait IntersectionFiller {
    /// Run every stage. Fatal failures are returned and also recorded in
    /// the report.
    fn perform(&mut self) -> Result<(), FillerError>;

    fn ds(&self) -> &DataStructure;

    fn context(&self) -> &Context;

    fn report(&self) -> &Report;

    /// The last run completed every stage.
    fn is_done(&self) -> bool;

    fn has_errors(&self) -> bool {
        self.report().has_errors()
    }

    fn has_warnings(&self) -> bool {
        self.report().has_warnings()
    }
}

impl IntersectionFiller for PaveFiller {
    fn perform(&mut self) -> Result<(), FillerError> {
        PaveFiller::perform(self)
    }

    fn ds(&self) -> &DataStructure {
        &self.ds
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn report(&self) -> &Report {
        &self.report
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// Intersects a set of arguments and records every interference between
/// them in a [`DataStructure`].
pub struct PaveFiller {
    store: ShapeStore,
    arguments: Vec<ShapeRef>,
    config: FillerConfig,
    ds: DataStructure,
    context: Context,
    report: Report,
    history: History,
    cancel: CancelToken,
    observer: Option<StageObserver>,
    done: bool,
}

impl PaveFiller {
    /// The filler takes the store so it can add the vertices and edges it
    /// creates; shapes already in it are never modified.
    pub fn new(store: ShapeStore, arguments: Vec<ShapeRef>) -> Self {
        Self {
            store,
            arguments,
            config: FillerConfig::default(),
            ds: DataStructure::default(),
            context: Context::default(),
            report: Report::default(),
            history: History::default(),
            cancel: CancelToken::new(),
            observer: None,
            done: false,
        }
    }

    pub fn with_config(mut self, config: FillerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Call `observer` at the start of every stage.
    pub fn with_observer(mut self, observer: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    pub fn into_store(self) -> ShapeStore {
        self.store
    }

    pub fn arguments(&self) -> &[ShapeRef] {
        &self.arguments
    }

    pub fn config(&self) -> &FillerConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn ds(&self) -> &DataStructure {
        &self.ds
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// What became of each source sub-shape. Empty until a run completes.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run all stages. Fatal failures are also recorded in the report.
    #[instrument(skip(self), fields(n_arguments = self.arguments.len()))]
    pub fn perform(&mut self) -> Result<(), FillerError> {
        self.done = false;
        self.report.clear();
        self.history = History::default();
        match self.run() {
            Ok(()) => {
                self.done = true;
                info!(ds = %self.ds, "pave filler done");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "pave filler stopped");
                self.report.add_error(err.clone());
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<(), FillerError> {
        self.enter(Stage::Init)?;
        self.config.validate()?;
        self.ds = DataStructure::init(&self.store, &self.arguments, self.config.fuzzy_value)?;
        self.context = Context::new(&self.store);

        self.enter(Stage::VertexVertex)?;
        self.perform_vv()?;
        self.enter(Stage::VertexEdge)?;
        self.perform_ve()?;
        self.enter(Stage::VertexFace)?;
        self.perform_vf()?;
        self.enter(Stage::EdgeEdge)?;
        self.perform_ee()?;
        self.enter(Stage::EdgeFace)?;
        self.perform_ef()?;
        self.enter(Stage::FaceFace)?;
        self.perform_ff()?;

        self.enter(Stage::VertexSolid)?;
        self.perform_vz()?;
        self.enter(Stage::EdgeSolid)?;
        self.perform_ez()?;
        self.enter(Stage::FaceSolid)?;
        self.perform_fz()?;
        self.enter(Stage::SolidSolid)?;
        self.perform_zz()?;

        self.enter(Stage::MakeSplitEdges)?;
        self.make_split_edges()?;
        self.enter(Stage::MakeBlocks)?;
        self.make_blocks()?;
        self.enter(Stage::MakePCurves)?;
        self.make_pcurves()?;
        self.enter(Stage::ProcessDegenerated)?;
        self.process_degenerated()?;

        self.history = History::build(&self.ds)?;
        if !self.config.non_destructive {
            self.write_back_tolerances();
        }
        Ok(())
    }

    fn enter(&self, stage: Stage) -> Result<(), FillerError> {
        if let Some(observer) = &self.observer {
            observer(stage);
        }
        self.cancel.check()
    }

    // ─── Shared helpers ──────────────────────────────────────────────────────

    /// `max(tol_i, tol_j, fuzzy)`.
    fn pair_tolerance(&self, i: usize, j: usize) -> f64 {
        self.ds
            .tolerance(i)
            .max(self.ds.tolerance(j))
            .max(self.config.fuzzy_value)
    }

    /// Add a vertex to the store and index it.
    fn make_vertex(&mut self, point: Point3d, tolerance: f64) -> usize {
        let id = self.store.add_vertex(point, tolerance);
        self.ds
            .append_shape(&self.store, ShapeRef::Vertex(id), tolerance)
    }

    /// One vertex per group of coincident points. Returns the vertex index
    /// for each input point.
    fn make_new_vertices(&mut self, points: &[(Point3d, f64)]) -> Vec<usize> {
        let mut touching = Vec::new();
        for a in 0..points.len() {
            for b in a + 1..points.len() {
                let ((pa, ta), (pb, tb)) = (points[a], points[b]);
                if pa.distance_to(&pb) <= ta.max(tb).max(self.config.fuzzy_value) {
                    touching.push((a, b));
                }
            }
        }
        let mut groups = connected_groups(&touching);
        let grouped: Vec<usize> = groups.iter().flatten().copied().collect();
        groups.extend(
            (0..points.len())
                .filter(|k| !grouped.contains(k))
                .map(|k| vec![k]),
        );
        groups.sort();

        let mut result = vec![0; points.len()];
        for group in groups {
            let members: Vec<Point3d> = group.iter().map(|&k| points[k].0).collect();
            let center = Point3d::centroid(&members).unwrap_or(members[0]);
            let tolerance = group
                .iter()
                .map(|&k| center.distance_to(&points[k].0) + points[k].1)
                .fold(0.0, f64::max);
            let vertex = self.make_vertex(center, tolerance);
            for k in group {
                result[k] = vertex;
            }
        }
        result
    }

    /// Recompute the ON sets of every known face after edges were split.
    fn refresh_face_infos(&mut self) {
        let faces: Vec<usize> = self.ds.faces_with_info().collect();
        for face in faces {
            self.ds.update_face_info_on(face);
            self.ds.refine_face_info_in(face);
        }
    }

    fn ensure_face_info(&mut self, face: usize) {
        if !self.ds.has_face_info(face) {
            self.ds.init_face_info(face);
        }
    }

    /// Copy grown tolerances of source vertices and edges into the store.
    fn write_back_tolerances(&mut self) {
        for i in 0..self.ds.n_source_shapes() {
            let tolerance = self.ds.tolerance(i);
            match self.ds.shape_of(i) {
                Ok(ShapeRef::Vertex(id)) => {
                    if let Some(v) = self.store.vertices.get_mut(id) {
                        v.tolerance = v.tolerance.max(tolerance);
                    }
                }
                Ok(ShapeRef::Edge(id)) => {
                    if let Some(e) = self.store.edges.get_mut(id) {
                        e.tolerance = e.tolerance.max(tolerance);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Connected components of the graph given by `pairs`, each sorted, in
/// order of their smallest member.
pub(crate) fn connected_groups(pairs: &[(usize, usize)]) -> Vec<Vec<usize>> {
    fn find(parent: &mut BTreeMap<usize, usize>, x: usize) -> usize {
        let mut root = x;
        while let Some(&p) = parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        let mut current = x;
        while current != root {
            let next = parent.get(&current).copied().unwrap_or(root);
            parent.insert(current, root);
            current = next;
        }
        root
    }

    let mut parent = BTreeMap::new();
    for &(a, b) in pairs {
        parent.entry(a).or_insert(a);
        parent.entry(b).or_insert(b);
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent.insert(ra.max(rb), ra.min(rb));
        }
    }
    let nodes: Vec<usize> = parent.keys().copied().collect();
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for node in nodes {
        let root = find(&mut parent, node);
        groups.entry(root).or_default().push(node);
    }
    groups.into_values().collect()
}
