use crate::{GeometryError, Tolerance};

use super::curves::{Circle3d, Curve, Ellipse3d, Line3d};
use super::point::Point3d;
use super::surfaces::{Cylinder, Plane, Sphere, Surface};

/// Result of intersecting two analytic surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceIntersection {
    /// Surfaces do not intersect.
    None,
    /// Surfaces touch at a single point (tangent case).
    Point(Point3d),
    /// Surfaces intersect along a curve.
    Curve(Curve),
    /// Surfaces intersect along two separate curves (e.g. plane cutting a
    /// cylinder parallel to its axis).
    TwoCurves(Curve, Curve),
    /// Surfaces are coincident (identical geometric locus).
    Coincident,
}

impl SurfaceIntersection {
    /// All curves of the result, in a stable order.
    pub fn curves(&self) -> Vec<Curve> {
        match self {
            SurfaceIntersection::Curve(c) => vec![*c],
            SurfaceIntersection::TwoCurves(a, b) => vec![*a, *b],
            _ => Vec::new(),
        }
    }
}

/// Intersect two surfaces. Pairs without an analytic solution are reported
/// as [`GeometryError::Unsupported`].
pub fn intersect_surfaces(
    s1: &Surface,
    s2: &Surface,
    tol: &Tolerance,
) -> Result<SurfaceIntersection, GeometryError> {
    match (s1, s2) {
        (Surface::Plane(a), Surface::Plane(b)) => Ok(plane_plane(a, b, tol)),
        (Surface::Plane(p), Surface::Cylinder(c)) | (Surface::Cylinder(c), Surface::Plane(p)) => {
            Ok(plane_cylinder(p, c, tol))
        }
        (Surface::Plane(p), Surface::Sphere(s)) | (Surface::Sphere(s), Surface::Plane(p)) => {
            Ok(plane_sphere(p, s, tol))
        }
        (Surface::Sphere(a), Surface::Sphere(b)) => Ok(sphere_sphere(a, b, tol)),
        _ => Err(GeometryError::Unsupported {
            first: s1.surface_type_name(),
            second: s2.surface_type_name(),
        }),
    }
}

// ─── Plane–Plane ─────────────────────────────────────────────────────────────

/// Intersect two infinite planes.
///
/// - Parallel, non-coincident -> `None`
/// - Coincident -> `Coincident`
/// - Transverse -> `Curve(Line3d)`
pub fn plane_plane(p1: &Plane, p2: &Plane, tol: &Tolerance) -> SurfaceIntersection {
    let cross = p1.normal.cross(&p2.normal);
    let cross_len = cross.length();

    if cross_len < tol.angular {
        let dist = p1.distance_to_point(&p2.origin).abs();
        if dist <= tol.coincidence {
            return SurfaceIntersection::Coincident;
        }
        return SurfaceIntersection::None;
    }

    let dir = cross / cross_len;

    // Plane i: n_i . P = d_i
    let d1 = p1.origin.to_vec3().dot(&p1.normal);
    let d2 = p2.origin.to_vec3().dot(&p2.normal);

    let n1n2 = p1.normal.dot(&p2.normal);
    let denom = 1.0 - n1n2 * n1n2;
    let c1 = (d1 - d2 * n1n2) / denom;
    let c2 = (d2 - d1 * n1n2) / denom;
    let origin = Point3d::ORIGIN + p1.normal * c1 + p2.normal * c2;

    SurfaceIntersection::Curve(Curve::Line(Line3d {
        origin,
        direction: dir,
    }))
}

// ─── Plane–Cylinder ──────────────────────────────────────────────────────────

/// Intersect an infinite plane with an infinite cylinder.
///
/// Cases (let `theta` be the angle between the plane normal and the cylinder axis):
///
/// - `theta ~ 0` (plane perpendicular to axis) -> `Circle3d`
/// - `theta ~ PI/2` (plane parallel to axis):
///   - distance from axis to plane > radius -> `None`
///   - distance == radius (tangent) -> single `Line3d`
///   - distance < radius -> `TwoCurves(Line3d, Line3d)`
/// - otherwise -> `Ellipse3d`
pub fn plane_cylinder(plane: &Plane, cyl: &Cylinder, tol: &Tolerance) -> SurfaceIntersection {
    let cos_theta = plane.normal.dot(&cyl.axis).abs();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    if sin_theta < tol.angular {
        let center = plane.project_point(&cyl.origin);
        let circle = Circle3d::new(center, plane.normal, cyl.radius);
        return SurfaceIntersection::Curve(Curve::Circle(circle));
    }

    if cos_theta < tol.angular {
        let dist = plane.distance_to_point(&cyl.origin).abs();
        if dist > cyl.radius + tol.coincidence {
            return SurfaceIntersection::None;
        }

        let foot = plane.project_point(&cyl.origin);
        if (dist - cyl.radius).abs() <= tol.coincidence {
            return SurfaceIntersection::Curve(Curve::Line(Line3d {
                origin: foot,
                direction: cyl.axis,
            }));
        }

        // The two rulings sit symmetrically about the axis' foot point,
        // offset across the axis within the plane.
        let half_chord = (cyl.radius * cyl.radius - dist * dist).max(0.0).sqrt();
        let lateral = cyl.axis.cross(&plane.normal).normalize();
        return SurfaceIntersection::TwoCurves(
            Curve::Line(Line3d {
                origin: foot + lateral * half_chord,
                direction: cyl.axis,
            }),
            Curve::Line(Line3d {
                origin: foot - lateral * half_chord,
                direction: cyl.axis,
            }),
        );
    }

    // Oblique plane: an ellipse centered where the axis pierces the plane,
    // minor radius R, major radius R / cos(theta) along the projected axis.
    let denom = plane.normal.dot(&cyl.axis);
    let t = (plane.origin - cyl.origin).dot(&plane.normal) / denom;
    let center = cyl.origin + cyl.axis * t;

    let axis_in_plane = cyl.axis - plane.normal * plane.normal.dot(&cyl.axis);
    let Some(major_axis) = axis_in_plane.normalized() else {
        return SurfaceIntersection::None;
    };

    let ellipse = Ellipse3d::new(
        center,
        plane.normal,
        major_axis,
        cyl.radius / cos_theta,
        cyl.radius,
    );
    SurfaceIntersection::Curve(Curve::Ellipse(ellipse))
}

// ─── Plane–Sphere ────────────────────────────────────────────────────────────

/// Intersect an infinite plane with a sphere.
///
/// - Plane outside sphere -> `None`
/// - Plane tangent to sphere -> `Point`
/// - Plane cutting sphere -> `Circle3d`
pub fn plane_sphere(plane: &Plane, sphere: &Sphere, tol: &Tolerance) -> SurfaceIntersection {
    let signed_dist = plane.distance_to_point(&sphere.center);
    let dist = signed_dist.abs();

    if dist > sphere.radius + tol.coincidence {
        return SurfaceIntersection::None;
    }

    let center = sphere.center - plane.normal * signed_dist;
    if (dist - sphere.radius).abs() <= tol.coincidence {
        return SurfaceIntersection::Point(center);
    }

    let circle_radius = (sphere.radius * sphere.radius - dist * dist).max(0.0).sqrt();
    let circle = Circle3d::new(center, plane.normal, circle_radius);
    SurfaceIntersection::Curve(Curve::Circle(circle))
}

// ─── Sphere–Sphere ───────────────────────────────────────────────────────────

/// Intersect two spheres.
///
/// - Same center and radius -> `Coincident`
/// - Apart, or one strictly inside the other -> `None`
/// - Externally or internally tangent -> `Point`
/// - Otherwise -> `Circle3d` in the radical plane
pub fn sphere_sphere(s1: &Sphere, s2: &Sphere, tol: &Tolerance) -> SurfaceIntersection {
    let offset = s2.center - s1.center;
    let d = offset.length();
    let (r1, r2) = (s1.radius, s2.radius);

    if d <= tol.coincidence {
        if (r1 - r2).abs() <= tol.coincidence {
            return SurfaceIntersection::Coincident;
        }
        return SurfaceIntersection::None;
    }
    if d > r1 + r2 + tol.coincidence || d < (r1 - r2).abs() - tol.coincidence {
        return SurfaceIntersection::None;
    }

    let n = offset / d;
    if (d - (r1 + r2)).abs() <= tol.coincidence {
        return SurfaceIntersection::Point(s1.center + n * r1);
    }
    if (d - (r1 - r2).abs()).abs() <= tol.coincidence {
        let point = if r1 >= r2 {
            s1.center + n * r1
        } else {
            s1.center - n * r1
        };
        return SurfaceIntersection::Point(point);
    }

    let a = (d * d + r1 * r1 - r2 * r2) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();
    let circle = Circle3d::new(s1.center + n * a, n, h);
    SurfaceIntersection::Curve(Curve::Circle(circle))
}
