use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::curves::Curve;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::Surface;
use crate::geometry::vector::Vec3;

// ─── Entity Keys ─────────────────────────────────────────────────────────────

new_key_type! {
    pub struct VertexId;
    pub struct EdgeId;
    pub struct WireId;
    pub struct FaceId;
    pub struct ShellId;
    pub struct SolidId;
    pub struct CompoundId;
}

/// Shape categories, ordered from the most composite to the simplest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Compound,
    Solid,
    Shell,
    Face,
    Wire,
    Edge,
    Vertex,
}

/// Typed handle to any shape in a [`ShapeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeRef {
    Vertex(VertexId),
    Edge(EdgeId),
    Wire(WireId),
    Face(FaceId),
    Shell(ShellId),
    Solid(SolidId),
    Compound(CompoundId),
}

impl ShapeRef {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeRef::Vertex(_) => ShapeKind::Vertex,
            ShapeRef::Edge(_) => ShapeKind::Edge,
            ShapeRef::Wire(_) => ShapeKind::Wire,
            ShapeRef::Face(_) => ShapeKind::Face,
            ShapeRef::Shell(_) => ShapeKind::Shell,
            ShapeRef::Solid(_) => ShapeKind::Solid,
            ShapeRef::Compound(_) => ShapeKind::Compound,
        }
    }
}

// ─── Topological Entities ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub point: Point3d,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub curve: Curve,
    pub t_first: f64,
    pub t_last: f64,
    pub start: VertexId,
    pub end: VertexId,
    pub tolerance: f64,
    /// Zero-length edge kept for topology only (e.g. a pole seam).
    pub degenerated: bool,
}

impl Edge {
    pub fn new(curve: Curve, range: (f64, f64), start: VertexId, end: VertexId, tolerance: f64) -> Self {
        Self {
            curve,
            t_first: range.0,
            t_last: range.1,
            start,
            end,
            tolerance,
            degenerated: false,
        }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.t_first, self.t_last)
    }

    pub fn is_closed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientedEdge {
    pub edge: EdgeId,
    /// true if the wire traverses the edge along its curve parameter.
    pub forward: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wire {
    pub edges: Vec<OrientedEdge>,
}

/// Parametric bounds of a face on a closed surface that has no boundary wires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDomain {
    pub u: (f64, f64),
    pub v: (f64, f64),
}

impl FaceDomain {
    pub fn contains(&self, u: f64, v: f64, slack: f64) -> bool {
        u >= self.u.0 - slack && u <= self.u.1 + slack && v >= self.v.0 - slack && v <= self.v.1 + slack
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub surface: Surface,
    /// First wire is the outer boundary, the rest are holes.
    pub wires: Vec<WireId>,
    pub domain: Option<FaceDomain>,
    pub tolerance: f64,
    /// true if the face normal agrees with the surface normal.
    pub same_sense: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shell {
    pub faces: Vec<FaceId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Solid {
    pub shells: Vec<ShellId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Compound {
    pub children: Vec<ShapeRef>,
}

// ─── Shape Store ─────────────────────────────────────────────────────────────

/// Arena-based storage for all shapes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeStore {
    pub vertices: SlotMap<VertexId, Vertex>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub wires: SlotMap<WireId, Wire>,
    pub faces: SlotMap<FaceId, Face>,
    pub shells: SlotMap<ShellId, Shell>,
    pub solids: SlotMap<SolidId, Solid>,
    pub compounds: SlotMap<CompoundId, Compound>,
}

impl ShapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, point: Point3d, tolerance: f64) -> VertexId {
        self.vertices.insert(Vertex { point, tolerance })
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        self.edges.insert(edge)
    }

    pub fn contains(&self, shape: ShapeRef) -> bool {
        match shape {
            ShapeRef::Vertex(id) => self.vertices.contains_key(id),
            ShapeRef::Edge(id) => self.edges.contains_key(id),
            ShapeRef::Wire(id) => self.wires.contains_key(id),
            ShapeRef::Face(id) => self.faces.contains_key(id),
            ShapeRef::Shell(id) => self.shells.contains_key(id),
            ShapeRef::Solid(id) => self.solids.contains_key(id),
            ShapeRef::Compound(id) => self.compounds.contains_key(id),
        }
    }

    /// Direct sub-shapes, in storage order. A closed edge lists its vertex once.
    /// Unknown handles have no children.
    pub fn children(&self, shape: ShapeRef) -> Vec<ShapeRef> {
        match shape {
            ShapeRef::Vertex(_) => Vec::new(),
            ShapeRef::Edge(id) => match self.edges.get(id) {
                Some(e) if e.start == e.end => vec![ShapeRef::Vertex(e.start)],
                Some(e) => vec![ShapeRef::Vertex(e.start), ShapeRef::Vertex(e.end)],
                None => Vec::new(),
            },
            ShapeRef::Wire(id) => self
                .wires
                .get(id)
                .map(|w| w.edges.iter().map(|oe| ShapeRef::Edge(oe.edge)).collect())
                .unwrap_or_default(),
            ShapeRef::Face(id) => self
                .faces
                .get(id)
                .map(|f| f.wires.iter().map(|&w| ShapeRef::Wire(w)).collect())
                .unwrap_or_default(),
            ShapeRef::Shell(id) => self
                .shells
                .get(id)
                .map(|s| s.faces.iter().map(|&f| ShapeRef::Face(f)).collect())
                .unwrap_or_default(),
            ShapeRef::Solid(id) => self
                .solids
                .get(id)
                .map(|s| s.shells.iter().map(|&sh| ShapeRef::Shell(sh)).collect())
                .unwrap_or_default(),
            ShapeRef::Compound(id) => self
                .compounds
                .get(id)
                .map(|c| c.children.clone())
                .unwrap_or_default(),
        }
    }

    /// All distinct sub-shapes of `kind` below `shape` (including `shape`
    /// itself if it matches), in depth-first order of first appearance.
    pub fn explore(&self, shape: ShapeRef, kind: ShapeKind) -> Vec<ShapeRef> {
        let mut found = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.explore_into(shape, kind, &mut found, &mut seen);
        found
    }

    fn explore_into(
        &self,
        shape: ShapeRef,
        kind: ShapeKind,
        found: &mut Vec<ShapeRef>,
        seen: &mut std::collections::HashSet<ShapeRef>,
    ) {
        if !seen.insert(shape) {
            return;
        }
        if shape.kind() == kind {
            found.push(shape);
            return;
        }
        if shape.kind() > kind {
            return;
        }
        for child in self.children(shape) {
            self.explore_into(child, kind, found, seen);
        }
    }

    pub fn face_edges(&self, face: FaceId) -> Vec<EdgeId> {
        self.explore(ShapeRef::Face(face), ShapeKind::Edge)
            .into_iter()
            .filter_map(|s| match s {
                ShapeRef::Edge(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn solid_faces(&self, solid: SolidId) -> Vec<FaceId> {
        self.explore(ShapeRef::Solid(solid), ShapeKind::Face)
            .into_iter()
            .filter_map(|s| match s {
                ShapeRef::Face(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// Own tolerance of a vertex, edge or face.
    pub fn tolerance(&self, shape: ShapeRef) -> Option<f64> {
        match shape {
            ShapeRef::Vertex(id) => self.vertices.get(id).map(|v| v.tolerance),
            ShapeRef::Edge(id) => self.edges.get(id).map(|e| e.tolerance),
            ShapeRef::Face(id) => self.faces.get(id).map(|f| f.tolerance),
            _ => None,
        }
    }

    /// Geometric bounding box, not enlarged by tolerances except for the
    /// sub-shapes' own vertex tolerances.
    pub fn bounding_box(&self, shape: ShapeRef) -> BoundingBox {
        match shape {
            ShapeRef::Vertex(id) => self
                .vertices
                .get(id)
                .map(|v| BoundingBox::from_points(&[v.point]))
                .unwrap_or_default(),
            ShapeRef::Edge(id) => {
                let Some(e) = self.edges.get(id) else {
                    return BoundingBox::empty();
                };
                let mut bb = if e.degenerated {
                    BoundingBox::empty()
                } else {
                    e.curve.bounding_box(e.t_first, e.t_last)
                };
                for v in self.children(shape) {
                    bb = bb.union(&self.bounding_box(v));
                }
                bb
            }
            ShapeRef::Face(id) => {
                let Some(f) = self.faces.get(id) else {
                    return BoundingBox::empty();
                };
                if f.wires.is_empty() {
                    return surface_box(&f.surface, f.domain);
                }
                self.children(shape)
                    .into_iter()
                    .fold(BoundingBox::empty(), |bb, w| bb.union(&self.bounding_box(w)))
            }
            _ => self
                .children(shape)
                .into_iter()
                .fold(BoundingBox::empty(), |bb, c| bb.union(&self.bounding_box(c))),
        }
    }
}

/// Box of the bounded part of a closed surface; void for unbounded ones.
/// A cylinder is bounded by the axial range of its domain.
fn surface_box(surface: &Surface, domain: Option<FaceDomain>) -> BoundingBox {
    match (surface, domain) {
        (Surface::Sphere(s), _) => {
            let r = Vec3::new(s.radius, s.radius, s.radius);
            BoundingBox::new(s.center - r, s.center + r)
        }
        (Surface::Cylinder(c), Some(domain)) => {
            let ends = [c.origin + c.axis * domain.v.0, c.origin + c.axis * domain.v.1];
            BoundingBox::from_points(&ends).expanded(c.radius)
        }
        (Surface::Plane(_) | Surface::Cylinder(_), _) => BoundingBox::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::primitives::{make_box, make_segment};

    #[test]
    fn explore_box_counts() {
        let mut store = ShapeStore::new();
        let solid = ShapeRef::Solid(make_box(&mut store, Point3d::ORIGIN, Point3d::new(1.0, 2.0, 3.0)));
        assert_eq!(store.explore(solid, ShapeKind::Face).len(), 6);
        assert_eq!(store.explore(solid, ShapeKind::Edge).len(), 12);
        assert_eq!(store.explore(solid, ShapeKind::Vertex).len(), 8);
    }

    #[test]
    fn explore_is_stable() {
        let mut store = ShapeStore::new();
        let solid = ShapeRef::Solid(make_box(&mut store, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0)));
        let a = store.explore(solid, ShapeKind::Vertex);
        let b = store.explore(solid, ShapeKind::Vertex);
        assert_eq!(a, b);
    }

    #[test]
    fn edge_box_includes_vertices() {
        let mut store = ShapeStore::new();
        let e = make_segment(&mut store, Point3d::new(0.0, 0.0, 0.0), Point3d::new(4.0, 0.0, 0.0));
        let bb = store.bounding_box(ShapeRef::Edge(e));
        assert!((bb.max.x - 4.0).abs() < 1e-12);
        assert!(bb.min.y.abs() < 1e-12);
    }

    #[test]
    fn unknown_handles_have_no_children() {
        let store = ShapeStore::new();
        assert!(store.children(ShapeRef::Face(FaceId::default())).is_empty());
        assert!(store.bounding_box(ShapeRef::Face(FaceId::default())).is_void());
    }
}
