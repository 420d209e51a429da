use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

use crate::GeometryError;

use super::point::Point3d;
use super::vector::Vec3;

/// Analytic surface types supported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Surface {
    Plane(Plane),
    Cylinder(Cylinder),
    Sphere(Sphere),
}

/// An infinite plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Point3d,
    pub normal: Vec3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
}

impl Plane {
    pub fn new(origin: Point3d, normal: Vec3) -> Self {
        let normal = normal.normalize();
        let u_axis = normal.any_orthogonal();
        let v_axis = normal.cross(&u_axis);
        Self {
            origin,
            normal,
            u_axis,
            v_axis,
        }
    }

    pub fn xy() -> Self {
        Self {
            origin: Point3d::ORIGIN,
            normal: Vec3::Z,
            u_axis: Vec3::X,
            v_axis: Vec3::Y,
        }
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        self.origin + self.u_axis * u + self.v_axis * v
    }

    /// Signed distance along the normal.
    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        (*p - self.origin).dot(&self.normal)
    }

    pub fn project_point(&self, p: &Point3d) -> Point3d {
        *p - self.normal * self.distance_to_point(p)
    }

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let v = *p - self.origin;
        (v.dot(&self.u_axis), v.dot(&self.v_axis))
    }
}

/// A cylinder surface, infinite along its axis.
/// Parameters: `u` = angle from `ref_dir`, `v` = height along `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub origin: Point3d,
    pub axis: Vec3,
    pub radius: f64,
    pub ref_dir: Vec3,
}

impl Cylinder {
    pub fn new(origin: Point3d, axis: Vec3, radius: f64) -> Self {
        let axis = axis.normalize();
        Self {
            origin,
            axis,
            radius,
            ref_dir: axis.any_orthogonal(),
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.cross(&self.ref_dir)
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        self.origin
            + self.ref_dir * (self.radius * u.cos())
            + self.y_dir() * (self.radius * u.sin())
            + self.axis * v
    }

    pub fn normal_at(&self, u: f64, _v: f64) -> Vec3 {
        (self.ref_dir * u.cos() + self.y_dir() * u.sin()).normalize()
    }

    /// Distance from the axis minus the radius.
    pub fn signed_distance(&self, p: &Point3d) -> f64 {
        let w = *p - self.origin;
        let radial = w - self.axis * w.dot(&self.axis);
        radial.length() - self.radius
    }

    pub fn parameters_of(&self, p: &Point3d) -> Result<(f64, f64), GeometryError> {
        let w = *p - self.origin;
        let v = w.dot(&self.axis);
        let radial = w - self.axis * v;
        if radial.length() < 1e-15 {
            return Err(GeometryError::ProjectionFailed { target: "Cylinder" });
        }
        let u = radial.dot(&self.y_dir()).atan2(radial.dot(&self.ref_dir));
        Ok((u.rem_euclid(TAU), v))
    }
}

/// A sphere surface.
/// Parameters: `u` = longitude `0..2PI`, `v` = latitude `-PI/2..PI/2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Point3d,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Point3d, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        let cos_v = v.cos();
        Point3d::new(
            self.center.x + self.radius * cos_v * u.cos(),
            self.center.y + self.radius * cos_v * u.sin(),
            self.center.z + self.radius * v.sin(),
        )
    }

    pub fn normal_at(&self, u: f64, v: f64) -> Vec3 {
        let p = self.evaluate(u, v);
        (p - self.center).normalize()
    }

    pub fn signed_distance(&self, p: &Point3d) -> f64 {
        p.distance_to(&self.center) - self.radius
    }

    pub fn parameters_of(&self, p: &Point3d) -> Result<(f64, f64), GeometryError> {
        let w = *p - self.center;
        let len = w.length();
        if len < 1e-15 {
            return Err(GeometryError::ProjectionFailed { target: "Sphere" });
        }
        let v = (w.z / len).clamp(-1.0, 1.0).asin();
        let u = if w.x.hypot(w.y) < 1e-15 {
            0.0
        } else {
            w.y.atan2(w.x).rem_euclid(TAU)
        };
        Ok((u, v))
    }
}

impl Surface {
    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        match self {
            Surface::Plane(p) => p.evaluate(u, v),
            Surface::Cylinder(c) => c.evaluate(u, v),
            Surface::Sphere(s) => s.evaluate(u, v),
        }
    }

    pub fn normal_at(&self, u: f64, v: f64) -> Vec3 {
        match self {
            Surface::Plane(p) => p.normal,
            Surface::Cylinder(c) => c.normal_at(u, v),
            Surface::Sphere(s) => s.normal_at(u, v),
        }
    }

    /// Signed distance from the surface; positive on the normal side.
    pub fn signed_distance(&self, p: &Point3d) -> f64 {
        match self {
            Surface::Plane(pl) => pl.distance_to_point(p),
            Surface::Cylinder(c) => c.signed_distance(p),
            Surface::Sphere(s) => s.signed_distance(p),
        }
    }

    /// Parameters of the orthogonal projection of `p`.
    pub fn parameters_of(&self, p: &Point3d) -> Result<(f64, f64), GeometryError> {
        match self {
            Surface::Plane(pl) => Ok(pl.parameters_of(p)),
            Surface::Cylinder(c) => c.parameters_of(p),
            Surface::Sphere(s) => s.parameters_of(p),
        }
    }

    /// Orthogonal projection: parameters, foot point and distance.
    pub fn project(&self, p: &Point3d) -> Result<((f64, f64), Point3d, f64), GeometryError> {
        let (u, v) = self.parameters_of(p)?;
        let foot = self.evaluate(u, v);
        Ok(((u, v), foot, foot.distance_to(p)))
    }

    pub fn u_period(&self) -> Option<f64> {
        match self {
            Surface::Plane(_) => None,
            Surface::Cylinder(_) | Surface::Sphere(_) => Some(TAU),
        }
    }

    /// Natural parametric bounds of a closed surface (`None` for unbounded ones).
    pub fn natural_domain(&self) -> Option<((f64, f64), (f64, f64))> {
        match self {
            Surface::Sphere(_) => Some(((0.0, TAU), (-FRAC_PI_2, FRAC_PI_2))),
            Surface::Plane(_) | Surface::Cylinder(_) => None,
        }
    }

    pub fn as_plane(&self) -> Option<&Plane> {
        match self {
            Surface::Plane(p) => Some(p),
            _ => None,
        }
    }

    pub fn surface_type_name(&self) -> &'static str {
        match self {
            Surface::Plane(_) => "Plane",
            Surface::Cylinder(_) => "Cylinder",
            Surface::Sphere(_) => "Sphere",
        }
    }
}
