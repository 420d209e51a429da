use std::collections::HashMap;
use std::f64::consts::TAU;

use tracing::{info, instrument};

use super::shape::*;
use crate::geometry::curves::{Circle3d, Curve, Line3d};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Cylinder, Plane, Sphere, Surface};
use crate::geometry::vector::Vec3;
use crate::GeometryError;

fn default_tolerance() -> f64 {
    crate::Tolerance::default().coincidence
}

pub fn make_vertex(store: &mut ShapeStore, point: Point3d) -> VertexId {
    store.add_vertex(point, default_tolerance())
}

/// Straight edge between two existing vertices. The curve parameter runs
/// from 0 at `start` to the segment length at `end`.
pub fn make_line_edge(store: &mut ShapeStore, start: VertexId, end: VertexId) -> Result<EdgeId, GeometryError> {
    let (Some(a), Some(b)) = (store.vertices.get(start), store.vertices.get(end)) else {
        return Err(GeometryError::Degenerate {
            reason: "edge vertex is not in the store".into(),
        });
    };
    let (a, b) = (a.point, b.point);
    let length = a.distance_to(&b);
    if length <= default_tolerance() {
        return Err(GeometryError::Degenerate {
            reason: format!("segment of length {length:e}"),
        });
    }
    let curve = Curve::Line(Line3d::from_points(a, b));
    Ok(store.add_edge(Edge::new(curve, (0.0, length), start, end, default_tolerance())))
}

/// Straight edge with fresh end vertices. Coincident end points yield a
/// degenerated edge.
pub fn make_segment(store: &mut ShapeStore, a: Point3d, b: Point3d) -> EdgeId {
    let start = make_vertex(store, a);
    let end = make_vertex(store, b);
    match make_line_edge(store, start, end) {
        Ok(e) => e,
        Err(_) => {
            let mut edge = Edge::new(
                Curve::Line(Line3d::new(a, Vec3::X)),
                (0.0, 0.0),
                start,
                end,
                default_tolerance(),
            );
            edge.degenerated = true;
            store.add_edge(edge)
        }
    }
}

/// Full circle as a closed edge whose single vertex sits at parameter 0.
pub fn make_circle_edge(store: &mut ShapeStore, circle: Circle3d) -> EdgeId {
    let v = make_vertex(store, circle.evaluate(0.0));
    store.add_edge(Edge::new(Curve::Circle(circle), (0.0, TAU), v, v, default_tolerance()))
}

/// Planar face bounded by the closed polygon through `points`.
#[instrument(skip(store, points), fields(n = points.len()))]
pub fn make_polygon_face(store: &mut ShapeStore, points: &[Point3d]) -> Result<FaceId, GeometryError> {
    if points.len() < 3 {
        return Err(GeometryError::Degenerate {
            reason: format!("polygon with {} points", points.len()),
        });
    }
    // Newell normal
    let mut normal = Vec3::ZERO;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    let Some(normal) = normal.normalized() else {
        return Err(GeometryError::Degenerate {
            reason: "collinear polygon".into(),
        });
    };

    let vertices: Vec<VertexId> = points.iter().map(|p| make_vertex(store, *p)).collect();
    let mut wire = Wire::default();
    for i in 0..vertices.len() {
        let edge = make_line_edge(store, vertices[i], vertices[(i + 1) % vertices.len()])?;
        wire.edges.push(OrientedEdge { edge, forward: true });
    }
    let wire = store.wires.insert(wire);
    Ok(store.faces.insert(Face {
        surface: Surface::Plane(Plane::new(points[0], normal)),
        wires: vec![wire],
        domain: None,
        tolerance: default_tolerance(),
        same_sense: true,
    }))
}

/// Planar face bounded by a full circle.
pub fn make_disk_face(store: &mut ShapeStore, circle: Circle3d) -> FaceId {
    let edge = make_circle_edge(store, circle);
    let wire = store.wires.insert(Wire {
        edges: vec![OrientedEdge { edge, forward: true }],
    });
    store.faces.insert(Face {
        surface: Surface::Plane(Plane::new(circle.center, circle.normal)),
        wires: vec![wire],
        domain: None,
        tolerance: default_tolerance(),
        same_sense: true,
    })
}

/// Lateral face of a cylinder between axial heights 0 and `height`. It has
/// no boundary wires; the domain bounds it.
pub fn make_cylinder_face(store: &mut ShapeStore, cylinder: Cylinder, height: f64) -> FaceId {
    store.faces.insert(Face {
        surface: Surface::Cylinder(cylinder),
        wires: Vec::new(),
        domain: Some(FaceDomain {
            u: (0.0, TAU),
            v: (0.0, height),
        }),
        tolerance: default_tolerance(),
        same_sense: true,
    })
}

/// Build an axis-aligned box solid from two opposite corners.
/// Adjacent faces share their edges and vertices.
#[instrument(skip(store))]
pub fn make_box(store: &mut ShapeStore, min: Point3d, max: Point3d) -> SolidId {
    info!(
        min = ?[min.x, min.y, min.z],
        max = ?[max.x, max.y, max.z],
        "creating box primitive"
    );
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (max.x, max.y, max.z);
    let v = [
        Point3d::new(x0, y0, z0),
        Point3d::new(x1, y0, z0),
        Point3d::new(x1, y1, z0),
        Point3d::new(x0, y1, z0),
        Point3d::new(x0, y0, z1),
        Point3d::new(x1, y0, z1),
        Point3d::new(x1, y1, z1),
        Point3d::new(x0, y1, z1),
    ];
    let vertex_ids: Vec<VertexId> = v.iter().map(|p| make_vertex(store, *p)).collect();

    // Corner indices in boundary order (outward normals via CCW winding)
    let face_defs: [(usize, usize, usize, usize, Vec3); 6] = [
        (0, 3, 2, 1, -Vec3::Z), // z = z0
        (4, 5, 6, 7, Vec3::Z),  // z = z1
        (0, 4, 7, 3, -Vec3::X), // x = x0
        (1, 2, 6, 5, Vec3::X),  // x = x1
        (0, 1, 5, 4, -Vec3::Y), // y = y0
        (3, 7, 6, 2, Vec3::Y),  // y = y1
    ];

    let mut shared: HashMap<(usize, usize), EdgeId> = HashMap::new();
    let mut faces = Vec::with_capacity(6);
    for &(a, b, c, d, normal) in &face_defs {
        let corners = [a, b, c, d];
        let mut wire = Wire::default();
        for i in 0..4 {
            let (from, to) = (corners[i], corners[(i + 1) % 4]);
            let key = (from.min(to), from.max(to));
            let edge = match shared.get(&key) {
                Some(&e) => e,
                None => {
                    let curve = Curve::Line(Line3d::from_points(v[key.0], v[key.1]));
                    let length = v[key.0].distance_to(&v[key.1]);
                    let e = store.add_edge(Edge::new(
                        curve,
                        (0.0, length),
                        vertex_ids[key.0],
                        vertex_ids[key.1],
                        default_tolerance(),
                    ));
                    shared.insert(key, e);
                    e
                }
            };
            wire.edges.push(OrientedEdge {
                edge,
                forward: from == key.0,
            });
        }
        let wire = store.wires.insert(wire);
        let center = v[a].midpoint(&v[c]);
        faces.push(store.faces.insert(Face {
            surface: Surface::Plane(Plane::new(center, normal)),
            wires: vec![wire],
            domain: None,
            tolerance: default_tolerance(),
            same_sense: true,
        }));
    }

    let shell = store.shells.insert(Shell { faces });
    store.solids.insert(Solid { shells: vec![shell] })
}

/// Sphere solid bounded by a single face that covers the whole surface.
#[instrument(skip(store))]
pub fn make_sphere(store: &mut ShapeStore, center: Point3d, radius: f64) -> SolidId {
    info!(center = ?[center.x, center.y, center.z], radius, "creating sphere primitive");
    let surface = Surface::Sphere(Sphere::new(center, radius));
    let domain = surface
        .natural_domain()
        .map(|(u, v)| FaceDomain { u, v });
    let face = store.faces.insert(Face {
        surface,
        wires: Vec::new(),
        domain,
        tolerance: default_tolerance(),
        same_sense: true,
    });
    let shell = store.shells.insert(Shell { faces: vec![face] });
    store.solids.insert(Solid { shells: vec![shell] })
}

pub fn make_compound(store: &mut ShapeStore, children: Vec<ShapeRef>) -> CompoundId {
    store.compounds.insert(Compound { children })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_shares_edges() {
        let mut store = ShapeStore::new();
        let solid = make_box(&mut store, Point3d::ORIGIN, Point3d::new(2.0, 3.0, 4.0));
        assert_eq!(store.edges.len(), 12);
        assert_eq!(store.vertices.len(), 8);
        for face in store.solid_faces(solid) {
            assert_eq!(store.face_edges(face).len(), 4);
        }
    }

    #[test]
    fn test_box_face_normals_point_outward() {
        let mut store = ShapeStore::new();
        let solid = make_box(&mut store, Point3d::ORIGIN, Point3d::new(2.0, 2.0, 2.0));
        let center = Point3d::new(1.0, 1.0, 1.0);
        for face in store.solid_faces(solid) {
            let surface = store.faces[face].surface;
            assert!(surface.signed_distance(&center) < 0.0);
        }
    }

    #[test]
    fn test_box_wires_are_connected() {
        let mut store = ShapeStore::new();
        let solid = make_box(&mut store, Point3d::ORIGIN, Point3d::new(1.0, 1.0, 1.0));
        for face in store.solid_faces(solid) {
            let wire = &store.wires[store.faces[face].wires[0]];
            let ends: Vec<(VertexId, VertexId)> = wire
                .edges
                .iter()
                .map(|oe| {
                    let e = &store.edges[oe.edge];
                    if oe.forward { (e.start, e.end) } else { (e.end, e.start) }
                })
                .collect();
            for i in 0..ends.len() {
                assert_eq!(ends[i].1, ends[(i + 1) % ends.len()].0);
            }
        }
    }

    #[test]
    fn test_line_edge_parameterization() {
        let mut store = ShapeStore::new();
        let e = make_segment(&mut store, Point3d::new(1.0, 0.0, 0.0), Point3d::new(1.0, 3.0, 4.0));
        let edge = &store.edges[e];
        assert_relative_eq!(edge.t_last, 5.0, epsilon = 1e-12);
        let end = edge.curve.evaluate(edge.t_last);
        assert!(end.distance_to(&Point3d::new(1.0, 3.0, 4.0)) < 1e-12);
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let mut store = ShapeStore::new();
        let pts = [Point3d::ORIGIN, Point3d::new(1.0, 0.0, 0.0), Point3d::new(2.0, 0.0, 0.0)];
        assert!(make_polygon_face(&mut store, &pts).is_err());
    }

    #[test]
    fn test_sphere_face_has_domain() {
        let mut store = ShapeStore::new();
        let solid = make_sphere(&mut store, Point3d::ORIGIN, 2.0);
        let faces = store.solid_faces(solid);
        assert_eq!(faces.len(), 1);
        assert!(store.faces[faces[0]].wires.is_empty());
        assert!(store.faces[faces[0]].domain.is_some());
        let bb = store.bounding_box(ShapeRef::Solid(solid));
        assert_relative_eq!(bb.max.z, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_edge_is_closed() {
        let mut store = ShapeStore::new();
        let e = make_circle_edge(&mut store, Circle3d::new(Point3d::ORIGIN, Vec3::Z, 1.0));
        assert!(store.edges[e].is_closed());
        assert_eq!(store.children(ShapeRef::Edge(e)).len(), 1);
    }

    #[test]
    fn test_disk_face_has_one_circular_edge() {
        let mut store = ShapeStore::new();
        let circle = Circle3d::with_axes(Point3d::ORIGIN, Vec3::Z, Vec3::X, 3.0);
        let face = make_disk_face(&mut store, circle);
        let edges = store.face_edges(face);
        assert_eq!(edges.len(), 1);
        let start = store.vertices[store.edges[edges[0]].start].point;
        assert!(start.distance_to(&Point3d::new(3.0, 0.0, 0.0)) < 1e-12);
        let bb = store.bounding_box(ShapeRef::Face(face));
        assert!(bb.min.y <= -3.0 + 1e-9 && bb.min.y > -3.1);
        assert!(bb.max.z.abs() < 0.1);
    }

    #[test]
    fn test_cylinder_face_box_follows_its_height() {
        let mut store = ShapeStore::new();
        let face = make_cylinder_face(&mut store, Cylinder::new(Point3d::ORIGIN, Vec3::Z, 1.0), 4.0);
        assert!(store.faces[face].wires.is_empty());
        let bb = store.bounding_box(ShapeRef::Face(face));
        assert!(!bb.is_void());
        assert_relative_eq!(bb.min.z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(bb.max.z, 5.0, epsilon = 1e-12);
        assert_relative_eq!(bb.max.x, 1.0, epsilon = 1e-12);
    }
}
