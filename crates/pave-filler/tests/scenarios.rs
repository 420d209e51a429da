//! End-to-end runs of the pave filler on small models.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bop_kernel::geometry::curves::Circle3d;
use bop_kernel::geometry::surfaces::Cylinder;
use bop_kernel::topology::primitives::{
    make_box, make_cylinder_face, make_disk_face, make_polygon_face, make_segment, make_sphere, make_vertex,
};
use bop_kernel::topology::shape::{EdgeId, FaceId, SolidId};
use bop_kernel::{Curve, Point3d, ShapeKind, ShapeRef, ShapeStore, Vec3};
use pave_filler::ds::interf::InterfKind;
use pave_filler::ds::pave::PaveSource;
use pave_filler::{CancelToken, FillerConfig, FillerError, IntersectionFiller, PaveFiller, Stage, WarningCode};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn p(x: f64, y: f64, z: f64) -> Point3d {
    Point3d::new(x, y, z)
}

fn two_boxes(a: (Point3d, Point3d), b: (Point3d, Point3d)) -> (ShapeStore, SolidId, SolidId) {
    let mut store = ShapeStore::new();
    let sa = make_box(&mut store, a.0, a.1);
    let sb = make_box(&mut store, b.0, b.1);
    (store, sa, sb)
}

fn run(store: ShapeStore, arguments: Vec<ShapeRef>, config: FillerConfig) -> PaveFiller {
    let mut filler = PaveFiller::new(store, arguments).with_config(config);
    filler.perform().expect("pave filler failed");
    filler
}

/// Face of an axis-aligned box lying in the plane `coord(axis) == value`.
fn box_face(store: &ShapeStore, solid: SolidId, axis: usize, value: f64) -> FaceId {
    store
        .solid_faces(solid)
        .into_iter()
        .find(|&f| {
            let bb = store.bounding_box(ShapeRef::Face(f));
            (bb.min.coord(axis) - value).abs() < 1e-6 && (bb.max.coord(axis) - value).abs() < 1e-6
        })
        .expect("no such box face")
}

/// Edge of a solid joining the two given corners.
fn box_edge(store: &ShapeStore, solid: SolidId, a: Point3d, b: Point3d) -> EdgeId {
    store
        .explore(ShapeRef::Solid(solid), ShapeKind::Edge)
        .into_iter()
        .find_map(|shape| {
            let ShapeRef::Edge(id) = shape else {
                return None;
            };
            let edge = &store.edges[id];
            let (s, e) = (store.vertices[edge.start].point, store.vertices[edge.end].point);
            let matches = (s.distance_to(&a) < 1e-9 && e.distance_to(&b) < 1e-9)
                || (s.distance_to(&b) < 1e-9 && e.distance_to(&a) < 1e-9);
            matches.then_some(id)
        })
        .expect("no such box edge")
}

// ---------------------------------------------------------------------------
// Overlapping boxes
// ---------------------------------------------------------------------------

#[test]
fn overlapping_boxes_section_edges() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(5.0, 5.0, 5.0), p(15.0, 15.0, 15.0)));
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert!(filler.is_done());
    assert!(!filler.report().has_errors());
    assert_eq!(interf.count(InterfKind::VertexVertex), 0);
    assert_eq!(interf.count(InterfKind::EdgeEdge), 0);
    assert_eq!(interf.count(InterfKind::EdgeFace), 6);
    assert_eq!(interf.count(InterfKind::FaceFace), 6);
    assert_eq!(interf.count(InterfKind::VertexSolid), 2);
    assert_eq!(interf.count(InterfKind::SolidSolid), 0);

    let mut section_edges = Vec::new();
    for ff in &interf.ff {
        assert!(!ff.coincident);
        assert_eq!(ff.curves.len(), 1);
        let sc = &ff.curves[0];
        assert_eq!(sc.paves.len(), 2);
        assert_eq!(sc.pave_blocks.len(), 1);
        let block = ds.pave_block(sc.pave_blocks[0]).unwrap();
        let edge = block.edge.expect("section block without edge");
        assert!(ds.is_new_shape(edge));
        let (curve, range) = ds.edge_curve(filler.store(), edge).unwrap();
        let length = curve.evaluate(range.0).distance_to(&curve.evaluate(range.1));
        assert!((length - 5.0).abs() < 1e-6);
        section_edges.push(edge);
    }
    section_edges.sort_unstable();
    section_edges.dedup();
    assert_eq!(section_edges.len(), 6);
}

#[test]
fn overlapping_boxes_split_edges_and_history() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(5.0, 5.0, 5.0), p(15.0, 15.0, 15.0)));
    let piercing = box_edge(&store, a, p(10.0, 10.0, 0.0), p(10.0, 10.0, 10.0));
    let untouched = box_edge(&store, a, p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0));
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let ds = filler.ds();

    let i = ds.index_of(&ShapeRef::Edge(piercing)).unwrap();
    let blocks = ds.pave_blocks_of(i);
    assert_eq!(blocks.len(), 2);
    let first = ds.pave_block(blocks[0]).unwrap();
    let second = ds.pave_block(blocks[1]).unwrap();
    assert_eq!(first.pave2.index, second.pave1.index);
    assert!((first.pave2.parameter - 5.0).abs() < 1e-6);

    let history = filler.history();
    assert_eq!(history.modified(&ShapeRef::Edge(piercing)).len(), 2);
    assert!(history.modified(&ShapeRef::Edge(untouched)).is_empty());
    assert!(!history.is_deleted(&ShapeRef::Edge(untouched)));
}

#[test]
fn overlapping_boxes_face_infos_and_pcurves() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(5.0, 5.0, 5.0), p(15.0, 15.0, 15.0)));
    let top = box_face(&store, a, 2, 10.0);
    let bottom = box_face(&store, a, 2, 0.0);
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let ds = filler.ds();

    let top = ds.index_of(&ShapeRef::Face(top)).unwrap();
    let info = ds.face_info(top).expect("face info of a cut face");
    assert_eq!(info.pave_blocks_sc.len(), 2);
    for &pb in &info.pave_blocks_sc {
        let edge = ds.pave_block(pb).unwrap().edge.unwrap();
        assert!(ds.pcurve(edge, top).is_some());
    }

    let bottom = ds.index_of(&ShapeRef::Face(bottom)).unwrap();
    assert!(ds
        .face_info(bottom)
        .map_or(true, |info| info.pave_blocks_sc.is_empty()));
    assert!(!filler.report().has_warnings());
}

// ---------------------------------------------------------------------------
// Existing geometry reused as a section edge
// ---------------------------------------------------------------------------

#[test]
fn section_reuses_edge_lying_in_both_faces() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(5.0, 0.0, 5.0), p(15.0, 10.0, 15.0)));
    let a_front = box_face(&store, a, 1, 0.0);
    let b_bottom = box_face(&store, b, 2, 5.0);
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::EdgeEdge), 4);
    assert!(interf.ee.iter().all(|ee| ee.vertex.is_some()));
    assert!(interf.ff.iter().filter(|ff| ff.coincident).count() >= 2);

    let fa = ds.index_of(&ShapeRef::Face(a_front)).unwrap();
    let fb = ds.index_of(&ShapeRef::Face(b_bottom)).unwrap();
    let ff = interf
        .ff
        .iter()
        .find(|ff| (ff.face1, ff.face2) == (fa, fb) || (ff.face1, ff.face2) == (fb, fa))
        .expect("faces intersect");
    assert_eq!(ff.curves.len(), 1);
    assert_eq!(ff.curves[0].pave_blocks.len(), 1);

    let block = ds.pave_block(ff.curves[0].pave_blocks[0]).unwrap();
    assert!(!ds.is_new_shape(block.original_edge));
    assert_eq!(ds.rank(block.original_edge), Some(1));
    let cb = block.common_block.expect("reused block is shared with the faces");
    let faces = &ds.common_block(cb).unwrap().faces;
    assert!(faces.contains(&fa) || faces.contains(&fb));
}

// ---------------------------------------------------------------------------
// Edges and vertices
// ---------------------------------------------------------------------------

#[test]
fn overlapping_collinear_edges_share_a_split_edge() {
    let mut store = ShapeStore::new();
    let ea = make_segment(&mut store, p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0));
    let eb = make_segment(&mut store, p(5.0, 0.0, 0.0), p(15.0, 0.0, 0.0));
    let filler = run(store, vec![ShapeRef::Edge(ea), ShapeRef::Edge(eb)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::VertexEdge), 2);
    assert_eq!(interf.count(InterfKind::EdgeEdge), 1);
    assert_eq!(ds.common_blocks().count(), 1);

    let history = filler.history();
    let images_a = history.modified(&ShapeRef::Edge(ea));
    let images_b = history.modified(&ShapeRef::Edge(eb));
    assert_eq!(images_a.len(), 2);
    assert_eq!(images_b.len(), 2);
    let shared: Vec<&ShapeRef> = images_a.iter().filter(|s| images_b.contains(s)).collect();
    assert_eq!(shared.len(), 1);

    let ShapeRef::Edge(common) = *shared[0] else {
        panic!("image is not an edge");
    };
    let edge = &filler.store().edges[common];
    let length = edge.curve.evaluate(edge.t_first).distance_to(&edge.curve.evaluate(edge.t_last));
    assert!((length - 5.0).abs() < 1e-9);
}

#[test]
fn touching_collinear_edges_stay_whole() {
    let mut store = ShapeStore::new();
    let ea = make_segment(&mut store, p(0.0, 0.0, 0.0), p(5.0, 0.0, 0.0));
    let eb = make_segment(&mut store, p(5.0, 0.0, 0.0), p(9.0, 0.0, 0.0));
    let filler = run(store, vec![ShapeRef::Edge(ea), ShapeRef::Edge(eb)], FillerConfig::default());
    let ds = filler.ds();

    assert_eq!(ds.interferences().count(InterfKind::VertexVertex), 1);
    assert_eq!(ds.interferences().count(InterfKind::EdgeEdge), 0);
    assert_eq!(ds.common_blocks().count(), 0);

    // both edges end on the merged vertex, so each gets a single new image
    let ia = ds.index_of(&ShapeRef::Edge(ea)).unwrap();
    let ib = ds.index_of(&ShapeRef::Edge(eb)).unwrap();
    let last_a = ds.pave_block(*ds.pave_blocks_of(ia).last().unwrap()).unwrap().pave2.index;
    let first_b = ds.pave_block(ds.pave_blocks_of(ib)[0]).unwrap().pave1.index;
    assert_eq!(last_a, first_b);
    assert!(ds.is_new_shape(last_a));
    assert_eq!(filler.history().modified(&ShapeRef::Edge(ea)).len(), 1);
    assert_eq!(filler.history().modified(&ShapeRef::Edge(eb)).len(), 1);
}

#[test]
fn crossing_edges_get_one_vertex() {
    let mut store = ShapeStore::new();
    let ea = make_segment(&mut store, p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0));
    let eb = make_segment(&mut store, p(4.0, -3.0, 0.0), p(4.0, 3.0, 0.0));
    let filler = run(store, vec![ShapeRef::Edge(ea), ShapeRef::Edge(eb)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::EdgeEdge), 1);
    let vertex = interf.ee[0].vertex.expect("crossing point vertex");
    let point = ds.vertex_point(filler.store(), vertex).unwrap();
    assert!(point.distance_to(&p(4.0, 0.0, 0.0)) < 1e-9);

    for edge in [ea, eb] {
        let i = ds.index_of(&ShapeRef::Edge(edge)).unwrap();
        let blocks = ds.pave_blocks_of(i);
        assert_eq!(blocks.len(), 2);
        assert_eq!(ds.pave_block(blocks[0]).unwrap().pave2.index, vertex);
        assert_eq!(ds.pave_block(blocks[0]).unwrap().pave2.source, PaveSource::EdgeEdge);
    }
}

#[test]
fn coincident_vertices_split_an_edge_once() {
    let mut store = ShapeStore::new();
    let edge = make_segment(&mut store, p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0));
    let v1 = make_vertex(&mut store, p(5.0, 0.0, 0.0));
    let v2 = make_vertex(&mut store, p(5.0, 2e-8, 0.0));
    let arguments = vec![ShapeRef::Edge(edge), ShapeRef::Vertex(v1), ShapeRef::Vertex(v2)];
    let filler = run(store, arguments, FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::VertexVertex), 1);
    assert_eq!(interf.count(InterfKind::VertexEdge), 1);
    let merged = interf.vv[0].new_vertex;

    let i = ds.index_of(&ShapeRef::Edge(edge)).unwrap();
    let blocks = ds.pave_blocks_of(i);
    assert_eq!(blocks.len(), 2);
    assert_eq!(ds.pave_block(blocks[0]).unwrap().pave2.index, merged);

    let history = filler.history();
    let image = ds.shape_of(merged).unwrap();
    assert_eq!(history.modified(&ShapeRef::Vertex(v1)), &[image]);
    assert_eq!(history.modified(&ShapeRef::Vertex(v2)), &[image]);
}

#[test]
fn vertex_on_face_joins_its_in_set() {
    let mut store = ShapeStore::new();
    let face = make_polygon_face(
        &mut store,
        &[p(0.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(4.0, 4.0, 0.0), p(0.0, 4.0, 0.0)],
    )
    .unwrap();
    let inside = make_vertex(&mut store, p(1.0, 2.0, 0.0));
    let outside = make_vertex(&mut store, p(3.0, 3.0, 0.5));
    let arguments = vec![ShapeRef::Face(face), ShapeRef::Vertex(inside), ShapeRef::Vertex(outside)];
    let filler = run(store, arguments, FillerConfig::default());
    let ds = filler.ds();

    assert_eq!(ds.interferences().count(InterfKind::VertexFace), 1);
    let f = ds.index_of(&ShapeRef::Face(face)).unwrap();
    let v = ds.index_of(&ShapeRef::Vertex(inside)).unwrap();
    let info = ds.face_info(f).unwrap();
    assert!(info.vertices_in.contains(&v));
    assert_eq!(info.vertices_in.len(), 1);
}

// ---------------------------------------------------------------------------
// Curved and parallel faces
// ---------------------------------------------------------------------------

#[test]
fn tangent_spheres_touch_at_a_point() {
    let mut store = ShapeStore::new();
    let a = make_sphere(&mut store, p(0.0, 0.0, 0.0), 5.0);
    let b = make_sphere(&mut store, p(10.0, 0.0, 0.0), 5.0);
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let interf = filler.ds().interferences();

    assert_eq!(interf.count(InterfKind::FaceFace), 1);
    let ff = &interf.ff[0];
    assert!(ff.curves.is_empty());
    assert_eq!(ff.points.len(), 1);
    assert!(ff.points[0].point.distance_to(&p(5.0, 0.0, 0.0)) < 1e-9);
    assert!(ff.points[0].vertex.is_some());
    assert_eq!(interf.count(InterfKind::SolidSolid), 0);
}

#[test]
fn overlapping_spheres_meet_along_a_closed_curve() {
    let mut store = ShapeStore::new();
    let a = make_sphere(&mut store, p(0.0, 0.0, 0.0), 5.0);
    let b = make_sphere(&mut store, p(6.0, 0.0, 0.0), 5.0);
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::FaceFace), 1);
    let ff = &interf.ff[0];
    assert_eq!(ff.curves.len(), 1);
    let sc = &ff.curves[0];
    assert!(sc.is_closed());
    assert_eq!(sc.paves.len(), 2);
    assert_eq!(sc.paves[0].index, sc.paves[1].index);
    assert_eq!(sc.paves[1].source, PaveSource::Closing);
    assert_eq!(sc.pave_blocks.len(), 1);
    assert!(ds.pave_block(sc.pave_blocks[0]).unwrap().edge.is_some());
}

#[test]
fn parallel_planar_faces_do_not_intersect() {
    let mut store = ShapeStore::new();
    let a = make_polygon_face(
        &mut store,
        &[p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0), p(10.0, 5.0, -5.0), p(0.0, 5.0, -5.0)],
    )
    .unwrap();
    let b = make_polygon_face(
        &mut store,
        &[p(0.0, 0.5, 0.5), p(10.0, 0.5, 0.5), p(10.0, 5.5, -4.5), p(0.0, 5.5, -4.5)],
    )
    .unwrap();
    let filler = run(store, vec![ShapeRef::Face(a), ShapeRef::Face(b)], FillerConfig::default());

    assert_eq!(filler.ds().interferences().total(), 0);
    assert!(!filler.report().has_warnings());
}

// ---------------------------------------------------------------------------
// Solids
// ---------------------------------------------------------------------------

#[test]
fn disjoint_boxes_have_no_interferences() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)), (p(3.0, 3.0, 3.0), p(4.0, 4.0, 4.0)));
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());

    assert!(filler.is_done());
    assert_eq!(filler.ds().interferences().total(), 0);
    assert!(!filler.history().has_modified());
}

#[test]
fn box_inside_box_is_classified() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(3.0, 3.0, 3.0), p(7.0, 7.0, 7.0)));
    let filler = run(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::VertexSolid), 8);
    assert_eq!(interf.count(InterfKind::EdgeSolid), 12);
    assert_eq!(interf.count(InterfKind::FaceSolid), 6);
    assert_eq!(interf.count(InterfKind::SolidSolid), 1);
    assert_eq!(interf.count(InterfKind::FaceFace), 0);

    let outer = ds.index_of(&ShapeRef::Solid(a)).unwrap();
    assert!(interf.vz.iter().all(|r| r.solid == outer));
    let inner = ds.index_of(&ShapeRef::Solid(b)).unwrap();
    let zz = &interf.zz[0];
    assert_eq!((zz.shape, zz.solid), (inner, outer));
}

// ---------------------------------------------------------------------------
// Configuration, cancellation and determinism
// ---------------------------------------------------------------------------

#[test]
fn empty_arguments_fail() {
    let mut filler = PaveFiller::new(ShapeStore::new(), Vec::new());
    assert_eq!(filler.perform(), Err(FillerError::NoArguments));
    assert!(!filler.is_done());
    assert!(filler.has_errors());
}

#[test]
fn cancelled_at_face_face_stage() {
    let (store, a, b) = two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(5.0, 5.0, 5.0), p(15.0, 15.0, 15.0)));
    let token = CancelToken::new();
    let trigger = token.clone();
    let stages = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&stages);
    let mut filler = PaveFiller::new(store, vec![ShapeRef::Solid(a), ShapeRef::Solid(b)])
        .with_cancel_token(token)
        .with_observer(move |stage| {
            seen.fetch_add(1, Ordering::SeqCst);
            if stage == Stage::FaceFace {
                trigger.cancel();
            }
        });

    assert_eq!(filler.perform(), Err(FillerError::Cancelled));
    assert!(!filler.is_done());
    assert!(filler.report().has_errors());
    assert_eq!(stages.load(Ordering::SeqCst), 7);
    assert_eq!(filler.ds().interferences().count(InterfKind::FaceFace), 0);
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let build = || two_boxes((p(0.0, 0.0, 0.0), p(10.0, 10.0, 10.0)), (p(5.0, 5.0, 5.0), p(15.0, 15.0, 15.0)));

    let (store, a, b) = build();
    let sequential = run(
        store,
        vec![ShapeRef::Solid(a), ShapeRef::Solid(b)],
        FillerConfig::default().with_run_parallel(false),
    );
    let (store, a, b) = build();
    let parallel = run(
        store,
        vec![ShapeRef::Solid(a), ShapeRef::Solid(b)],
        FillerConfig::default().with_run_parallel(true),
    );

    let (s, q) = (sequential.ds(), parallel.ds());
    for kind in InterfKind::ALL {
        assert_eq!(s.interferences().count(kind), q.interferences().count(kind), "{kind}");
    }
    assert_eq!(s.n_shapes(), q.n_shapes());
    assert_eq!(s.n_pave_blocks(), q.n_pave_blocks());
    assert_eq!(s.to_string(), q.to_string());
    for (x, y) in s.interferences().ef.iter().zip(&q.interferences().ef) {
        assert_eq!((x.edge, x.face, x.vertex), (y.edge, y.face, y.vertex));
    }
}

#[test]
fn fuzzy_value_merges_nearby_vertices() {
    let build = || {
        let mut store = ShapeStore::new();
        let v1 = make_vertex(&mut store, p(0.0, 0.0, 0.0));
        let v2 = make_vertex(&mut store, p(1e-3, 0.0, 0.0));
        (store, vec![ShapeRef::Vertex(v1), ShapeRef::Vertex(v2)])
    };

    let (store, arguments) = build();
    let strict = run(store, arguments, FillerConfig::default());
    assert_eq!(strict.ds().interferences().count(InterfKind::VertexVertex), 0);

    let (store, arguments) = build();
    let fuzzy = run(store, arguments, FillerConfig::default().with_fuzzy_value(1e-2));
    assert_eq!(fuzzy.ds().interferences().count(InterfKind::VertexVertex), 1);
    let merged = fuzzy.ds().interferences().vv[0].new_vertex;
    assert!(fuzzy.ds().tolerance(merged) >= 5e-4);
}

#[test]
fn non_destructive_run_keeps_source_tolerances() {
    let build = || {
        let mut store = ShapeStore::new();
        let edge = make_segment(&mut store, p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0));
        let vertex = make_vertex(&mut store, p(5.0, 1e-3, 0.0));
        (store, edge, vertex)
    };
    let config = FillerConfig::default().with_fuzzy_value(1e-2);

    let (store, edge, vertex) = build();
    let kept = run(store, vec![ShapeRef::Edge(edge), ShapeRef::Vertex(vertex)], config.clone());
    assert_eq!(kept.ds().interferences().count(InterfKind::VertexEdge), 1);
    assert!(kept.store().vertices[vertex].tolerance < 1e-6);
    let i = kept.ds().index_of(&ShapeRef::Vertex(vertex)).unwrap();
    assert!(kept.ds().tolerance(i) >= 1e-3 - 1e-12);

    let (store, edge, vertex) = build();
    let mut destructive = config;
    destructive.non_destructive = false;
    let written = run(store, vec![ShapeRef::Edge(edge), ShapeRef::Vertex(vertex)], destructive);
    assert!(written.store().vertices[vertex].tolerance >= 1e-3 - 1e-12);
}

// ---------------------------------------------------------------------------
// Section vertices on known vertices
// ---------------------------------------------------------------------------

#[test]
fn tangent_point_on_a_box_corner_reuses_the_corner() {
    let mut store = ShapeStore::new();
    let ball = make_sphere(&mut store, p(0.0, 0.0, 0.0), 5.0);
    let cube = make_box(&mut store, p(5.0, 0.0, 0.0), p(7.0, 2.0, 2.0));
    let tangent = p(5.0, 0.0, 0.0);
    let corner = store
        .explore(ShapeRef::Solid(cube), ShapeKind::Vertex)
        .into_iter()
        .find(|shape| matches!(shape, ShapeRef::Vertex(id) if store.vertices[*id].point.distance_to(&tangent) < 1e-12))
        .expect("no box corner at the tangent point");
    let filler = run(store, vec![ShapeRef::Solid(ball), ShapeRef::Solid(cube)], FillerConfig::default());
    let ds = filler.ds();
    let corner = ds.same_domain_index(ds.index_of(&corner).unwrap());
    let at_tangent = |v: usize| ds.vertex_point(filler.store(), v).unwrap().distance_to(&tangent) < 1e-6;

    let mut found = BTreeSet::new();
    for ff in &ds.interferences().ff {
        for point in ff.points.iter().filter(|sp| sp.point.distance_to(&tangent) < 1e-6) {
            found.insert(ds.same_domain_index(point.vertex.expect("section point without vertex")));
        }
        for sc in &ff.curves {
            for pave in &sc.paves {
                let v = ds.same_domain_index(pave.index);
                if at_tangent(v) {
                    found.insert(v);
                }
            }
        }
    }
    assert!(!found.is_empty());
    assert_eq!(found, BTreeSet::from([corner]));
}

// ---------------------------------------------------------------------------
// Extended tolerance
// ---------------------------------------------------------------------------

/// Square face tilted about the line `y = 0, z = 5 + gap`, grazing the
/// sphere of radius 5 at the origin along that line. The plane cuts the
/// sphere in a small circle passing a few gaps away from the grazing point.
fn grazing_face_and_sphere(gap: f64) -> (ShapeStore, FaceId, SolidId) {
    let mut store = ShapeStore::new();
    let top = 5.0 + gap;
    let slope = 0.25 / (1.0f64 - 0.0625).sqrt();
    let face = make_polygon_face(
        &mut store,
        &[
            p(-3.0, 0.0, top),
            p(3.0, 0.0, top),
            p(3.0, -3.0, top - 3.0 * slope),
            p(-3.0, -3.0, top - 3.0 * slope),
        ],
    )
    .unwrap();
    let ball = make_sphere(&mut store, p(0.0, 0.0, 0.0), 5.0);
    (store, face, ball)
}

#[test]
fn extended_tolerance_puts_grazing_vertex_on_the_section() {
    let config = FillerConfig::default().with_fuzzy_value(1e-3);
    for extended in [true, false] {
        let (store, face, ball) = grazing_face_and_sphere(8e-4);
        let arguments = vec![ShapeRef::Face(face), ShapeRef::Solid(ball)];
        let filler = run(store, arguments, config.clone().with_extended_tolerance(extended));
        let ds = filler.ds();
        let interf = ds.interferences();

        assert_eq!(interf.count(InterfKind::EdgeFace), 1);
        let grazing = interf.ef[0].vertex.expect("grazing contact without vertex");
        assert!(ds.vertex_point(filler.store(), grazing).unwrap().distance_to(&p(0.0, 0.0, 5.0008)) < 1e-3);

        assert_eq!(interf.count(InterfKind::FaceFace), 1);
        let ff = &interf.ff[0];
        assert_eq!(ff.curves.len(), 1);
        let sc = &ff.curves[0];
        assert!(sc.is_closed());
        let on_section = sc.paves.iter().any(|pave| ds.same_domain_index(pave.index) == ds.same_domain_index(grazing));
        assert_eq!(on_section, extended, "extended tolerance {extended}");
        match ds.extended_tolerance(grazing) {
            Some(reach) => {
                assert!(extended);
                assert!(reach > 3e-3);
            }
            None => assert!(!extended),
        }
    }
}

// ---------------------------------------------------------------------------
// Existing edges sharing only their ends with a section
// ---------------------------------------------------------------------------

#[test]
fn section_between_rim_vertices_gets_its_own_edge() {
    let mut store = ShapeStore::new();
    let disk = make_disk_face(&mut store, Circle3d::with_axes(p(0.0, 0.0, 0.0), Vec3::Z, Vec3::X, 5.0));
    let rim_edge = store.face_edges(disk)[0];
    let wall = make_polygon_face(
        &mut store,
        &[p(-6.0, 0.0, -1.0), p(6.0, 0.0, -1.0), p(6.0, 0.0, 1.0), p(-6.0, 0.0, 1.0)],
    )
    .unwrap();
    let filler = run(store, vec![ShapeRef::Face(disk), ShapeRef::Face(wall)], FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::FaceFace), 1);
    let ff = &interf.ff[0];
    assert_eq!(ff.curves.len(), 1);
    let sc = &ff.curves[0];
    assert_eq!(sc.pave_blocks.len(), 1);
    let section = ds.pave_block(sc.pave_blocks[0]).unwrap();
    let edge = section.edge.expect("section without edge");
    assert!(ds.is_new_shape(edge));
    assert_eq!(section.original_edge, edge);
    assert!(section.common_block.is_none());
    let (curve, range) = ds.edge_curve(filler.store(), edge).unwrap();
    assert!(matches!(curve, Curve::Line(_)));
    let length = curve.evaluate(range.0).distance_to(&curve.evaluate(range.1));
    assert!((length - 10.0).abs() < 1e-6);

    // Both half rims end where the section does, yet bow away from it.
    let rim = ds.index_of(&ShapeRef::Edge(rim_edge)).unwrap();
    let arcs = ds.pave_blocks_of(rim);
    assert_eq!(arcs.len(), 2);
    for &arc in arcs {
        let arc = ds.pave_block(arc).unwrap();
        assert!(arc.has_same_bounds(section));
        assert!(arc.common_block.is_none());
        assert_ne!(arc.edge, Some(edge));
    }
    assert!(ds.common_blocks().next().is_none());
    let images = filler.history().modified(&ShapeRef::Edge(rim_edge));
    assert_eq!(images.len(), 2);
    assert!(!images.contains(&ds.shape_of(edge).unwrap()));
}

// ---------------------------------------------------------------------------
// Failing face pairs
// ---------------------------------------------------------------------------

#[test]
fn unsupported_surface_pair_is_reported_and_skipped() {
    let mut store = ShapeStore::new();
    let tube = make_cylinder_face(&mut store, Cylinder::new(p(0.0, 0.0, 0.0), Vec3::Z, 2.0), 4.0);
    let ball = make_sphere(&mut store, p(0.0, 0.0, 2.0), 3.0);
    let ball = store.solid_faces(ball)[0];
    let floor = make_polygon_face(
        &mut store,
        &[p(100.0, 0.0, 0.0), p(110.0, 0.0, 0.0), p(110.0, 10.0, 0.0), p(100.0, 10.0, 0.0)],
    )
    .unwrap();
    let wall = make_polygon_face(
        &mut store,
        &[p(102.0, 5.0, -5.0), p(108.0, 5.0, -5.0), p(108.0, 5.0, 5.0), p(102.0, 5.0, 5.0)],
    )
    .unwrap();
    let arguments = vec![
        ShapeRef::Face(tube),
        ShapeRef::Face(floor),
        ShapeRef::Face(ball),
        ShapeRef::Face(wall),
    ];
    let filler = run(store, arguments, FillerConfig::default());
    let ds = filler.ds();
    let index = |face: FaceId| ds.index_of(&ShapeRef::Face(face)).unwrap();

    assert!(filler.is_done());
    assert!(!filler.has_errors());
    let failed: Vec<_> = filler
        .report()
        .warnings()
        .iter()
        .filter(|w| w.code == WarningCode::FaceFaceIntersectionFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    let mut named = failed[0].indices.clone();
    named.sort_unstable();
    let (t, b) = (index(tube), index(ball));
    assert_eq!(named, vec![t.min(b), t.max(b)]);

    let (f, w) = (index(floor), index(wall));
    let good = ds
        .interferences()
        .ff
        .iter()
        .find(|ff| (ff.face1 == f && ff.face2 == w) || (ff.face1 == w && ff.face2 == f))
        .expect("no section of the planar pair");
    assert_eq!(good.curves.len(), 1);
    assert_eq!(good.curves[0].pave_blocks.len(), 1);
    let edge = ds.pave_block(good.curves[0].pave_blocks[0]).unwrap().edge.expect("section without edge");
    let (curve, range) = ds.edge_curve(filler.store(), edge).unwrap();
    let length = curve.evaluate(range.0).distance_to(&curve.evaluate(range.1));
    assert!((length - 6.0).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Micro blocks
// ---------------------------------------------------------------------------

#[test]
fn block_inside_vertex_tolerances_is_degenerated() {
    let mut store = ShapeStore::new();
    let edge = make_segment(&mut store, p(0.0, 0.0, 0.0), p(10.0, 0.0, 0.0));
    let near = store.add_vertex(p(5.0, 0.0, 0.0), 0.6);
    let far = store.add_vertex(p(6.0, 0.0, 0.0), 0.6);
    let arguments = vec![ShapeRef::Edge(edge), ShapeRef::Vertex(near), ShapeRef::Vertex(far)];
    let filler = run(store, arguments, FillerConfig::default());
    let ds = filler.ds();
    let interf = ds.interferences();

    assert_eq!(interf.count(InterfKind::VertexVertex), 0);
    assert_eq!(interf.count(InterfKind::VertexEdge), 2);
    let i = ds.index_of(&ShapeRef::Edge(edge)).unwrap();
    let blocks = ds.pave_blocks_of(i);
    assert_eq!(blocks.len(), 3);
    let micro: Vec<bool> = blocks.iter().map(|&pb| ds.pave_block(pb).unwrap().micro).collect();
    assert_eq!(micro, vec![false, true, false]);

    let short = ds.pave_block(blocks[1]).unwrap().edge.expect("micro block without edge");
    assert!(ds.is_new_shape(short));
    assert!(ds.is_degenerated(short));
    assert_eq!(ds.degenerated_edges().len(), 1);

    let history = filler.history();
    let images = history.modified(&ShapeRef::Edge(edge));
    assert_eq!(images.len(), 2);
    assert!(!images.contains(&ds.shape_of(short).unwrap()));
    assert!(!history.is_deleted(&ShapeRef::Edge(edge)));
}

#[test]
fn edge_left_with_micro_blocks_only_is_deleted() {
    let mut store = ShapeStore::new();
    let edge = make_segment(&mut store, p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
    let (start, end) = (store.edges[edge].start, store.edges[edge].end);
    store.vertices[start].tolerance = 0.3;
    store.vertices[end].tolerance = 0.3;
    let middle = store.add_vertex(p(0.5, 0.0, 0.0), 0.3);
    let filler = run(store, vec![ShapeRef::Edge(edge), ShapeRef::Vertex(middle)], FillerConfig::default());
    let ds = filler.ds();

    assert_eq!(ds.interferences().count(InterfKind::VertexVertex), 0);
    assert_eq!(ds.interferences().count(InterfKind::VertexEdge), 1);
    let i = ds.index_of(&ShapeRef::Edge(edge)).unwrap();
    let blocks = ds.pave_blocks_of(i);
    assert_eq!(blocks.len(), 2);
    for &pb in blocks {
        let block = ds.pave_block(pb).unwrap();
        assert!(block.micro);
        assert!(ds.is_degenerated(block.edge.expect("micro block without edge")));
    }

    let history = filler.history();
    assert!(history.is_deleted(&ShapeRef::Edge(edge)));
    assert!(history.modified(&ShapeRef::Edge(edge)).is_empty());
}
