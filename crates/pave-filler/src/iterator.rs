//! Candidate pairs for the interference stages.

use bop_kernel::ShapeKind;
use tracing::trace;

use crate::ds::DataStructure;

/// Source shapes of `kind1` and `kind2` from different arguments whose boxes
/// overlap, as `(kind1 index, kind2 index)` sorted by index.
///
/// For equal kinds each pair is listed once with the smaller index first.
pub fn candidate_pairs(ds: &DataStructure, kind1: ShapeKind, kind2: ShapeKind) -> Vec<(usize, usize)> {
    let first = ds.source_indices(kind1);
    let mut second = ds.source_indices(kind2);
    // sweep along x
    second.sort_by(|&a, &b| ds.bbox(a).min.x.total_cmp(&ds.bbox(b).min.x));

    let mut pairs = Vec::new();
    for &i in &first {
        let bi = ds.bbox(i);
        if bi.is_void() {
            continue;
        }
        for &j in &second {
            let bj = ds.bbox(j);
            if bj.min.x > bi.max.x {
                break;
            }
            if i == j || ds.rank(i) == ds.rank(j) || !bi.intersects(&bj) {
                continue;
            }
            if kind1 == kind2 && j < i {
                continue;
            }
            pairs.push((i, j));
        }
    }
    pairs.sort_unstable();
    trace!(?kind1, ?kind2, n = pairs.len(), "candidate pairs");
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use bop_kernel::topology::primitives::{make_box, make_vertex};
    use bop_kernel::{Point3d, ShapeRef, ShapeStore};

    #[test]
    fn pairs_cross_arguments_only() {
        let mut store = ShapeStore::new();
        let a = make_vertex(&mut store, Point3d::ORIGIN);
        let b = make_vertex(&mut store, Point3d::ORIGIN);
        let c = make_vertex(&mut store, Point3d::new(5.0, 0.0, 0.0));
        let args = vec![ShapeRef::Vertex(a), ShapeRef::Vertex(b), ShapeRef::Vertex(c)];
        let ds = DataStructure::init(&store, &args, 0.0).unwrap();
        assert_eq!(candidate_pairs(&ds, ShapeKind::Vertex, ShapeKind::Vertex), vec![(0, 1)]);
    }

    #[test]
    fn box_faces_touching_a_second_box() {
        let mut store = ShapeStore::new();
        let a = make_box(&mut store, Point3d::ORIGIN, Point3d::new(10.0, 10.0, 10.0));
        let b = make_box(&mut store, Point3d::new(5.0, 5.0, 5.0), Point3d::new(15.0, 15.0, 15.0));
        let args = vec![ShapeRef::Solid(a), ShapeRef::Solid(b)];
        let ds = DataStructure::init(&store, &args, 0.0).unwrap();
        let pairs = candidate_pairs(&ds, ShapeKind::Face, ShapeKind::Face);
        assert_eq!(pairs.len(), 6);
        for (i, j) in pairs {
            assert_eq!(ds.rank(i), Some(0));
            assert_eq!(ds.rank(j), Some(1));
        }
    }

    #[test]
    fn disjoint_boxes_have_no_pairs() {
        let mut store = ShapeStore::new();
        let a = make_box(&mut store, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0));
        let b = make_box(&mut store, Point3d::new(3.0, 3.0, 3.0), Point3d::new(4.0, 4.0, 4.0));
        let args = vec![ShapeRef::Solid(a), ShapeRef::Solid(b)];
        let ds = DataStructure::init(&store, &args, 0.0).unwrap();
        for kind in [ShapeKind::Vertex, ShapeKind::Edge, ShapeKind::Face, ShapeKind::Solid] {
            assert!(candidate_pairs(&ds, kind, kind).is_empty());
        }
    }
}
