use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::bounding_box::BoundingBox;
use super::point::Point3d;
use super::vector::Vec3;

/// Samples used by the sampled curve algorithms (boxes, projections on ellipses).
const CURVE_SAMPLES: usize = 64;

/// Analytic curve representations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Line(Line3d),
    Circle(Circle3d),
    Ellipse(Ellipse3d),
}

/// An infinite line defined by a point and a unit direction.
/// The parameter is the signed distance from `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3d {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Line3d {
    pub fn new(origin: Point3d, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn from_points(a: Point3d, b: Point3d) -> Self {
        Self::new(a, b - a)
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        self.origin + self.direction * t
    }

    pub fn closest_point(&self, p: &Point3d) -> (Point3d, f64) {
        let t = (*p - self.origin).dot(&self.direction);
        (self.evaluate(t), t)
    }

    pub fn distance_to_point(&self, p: &Point3d) -> f64 {
        let (closest, _) = self.closest_point(p);
        p.distance_to(&closest)
    }
}

/// A circle in 3D space. The parameter is the angle from `x_axis`
/// towards `normal x x_axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle3d {
    pub center: Point3d,
    pub normal: Vec3,
    pub radius: f64,
    /// Reference direction in the plane (x-axis of the local frame).
    pub x_axis: Vec3,
}

impl Circle3d {
    pub fn new(center: Point3d, normal: Vec3, radius: f64) -> Self {
        let normal = normal.normalize();
        Self {
            center,
            normal,
            radius,
            x_axis: normal.any_orthogonal(),
        }
    }

    pub fn with_axes(center: Point3d, normal: Vec3, x_axis: Vec3, radius: f64) -> Self {
        Self {
            center,
            normal: normal.normalize(),
            x_axis: x_axis.normalize(),
            radius,
        }
    }

    pub fn y_axis(&self) -> Vec3 {
        self.normal.cross(&self.x_axis)
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        let y_axis = self.y_axis();
        self.center + self.x_axis * (self.radius * t.cos()) + y_axis * (self.radius * t.sin())
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        let y_axis = self.y_axis();
        self.x_axis * (-self.radius * t.sin()) + y_axis * (self.radius * t.cos())
    }

    /// Angle of the projection of `p` onto the circle plane, in `[0, 2*PI)`.
    /// `None` when `p` lies on the axis.
    pub fn angle_of(&self, p: &Point3d) -> Option<f64> {
        let v = *p - self.center;
        let x = v.dot(&self.x_axis);
        let y = v.dot(&self.y_axis());
        if x.hypot(y) < 1e-15 {
            return None;
        }
        Some(y.atan2(x).rem_euclid(TAU))
    }
}

/// An ellipse in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse3d {
    pub center: Point3d,
    pub normal: Vec3,
    pub major_axis: Vec3,
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl Ellipse3d {
    pub fn new(
        center: Point3d,
        normal: Vec3,
        major_axis: Vec3,
        major_radius: f64,
        minor_radius: f64,
    ) -> Self {
        Self {
            center,
            normal: normal.normalize(),
            major_axis: major_axis.normalize(),
            major_radius,
            minor_radius,
        }
    }

    pub fn minor_axis(&self) -> Vec3 {
        self.normal.cross(&self.major_axis)
    }

    pub fn evaluate(&self, t: f64) -> Point3d {
        let minor_axis = self.minor_axis();
        self.center
            + self.major_axis * (self.major_radius * t.cos())
            + minor_axis * (self.minor_radius * t.sin())
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        let minor_axis = self.minor_axis();
        self.major_axis * (-self.major_radius * t.sin())
            + minor_axis * (self.minor_radius * t.cos())
    }
}

impl Curve {
    pub fn evaluate(&self, t: f64) -> Point3d {
        match self {
            Curve::Line(l) => l.evaluate(t),
            Curve::Circle(c) => c.evaluate(t),
            Curve::Ellipse(e) => e.evaluate(t),
        }
    }

    pub fn derivative(&self, t: f64) -> Vec3 {
        match self {
            Curve::Line(l) => l.direction,
            Curve::Circle(c) => c.derivative(t),
            Curve::Ellipse(e) => e.derivative(t),
        }
    }

    fn second_derivative(&self, t: f64) -> Vec3 {
        match self {
            Curve::Line(_) => Vec3::ZERO,
            Curve::Circle(c) => c.center - c.evaluate(t),
            Curve::Ellipse(e) => e.center - e.evaluate(t),
        }
    }

    pub fn is_periodic(&self) -> bool {
        !matches!(self, Curve::Line(_))
    }

    pub fn period(&self) -> Option<f64> {
        self.is_periodic().then_some(TAU)
    }

    /// Natural parameter range of a bounded curve, `None` for lines.
    pub fn natural_range(&self) -> Option<(f64, f64)> {
        self.period().map(|p| (0.0, p))
    }

    /// Parameter in `[t0, t1]` of the point closest to `p`, with the distance.
    pub fn closest_parameter(&self, p: &Point3d, t0: f64, t1: f64) -> (f64, f64) {
        let t = match self {
            Curve::Line(l) => l.closest_point(p).1.clamp(t0, t1),
            Curve::Circle(c) => match c.angle_of(p) {
                Some(angle) => wrap_into_range(angle, t0, t1, |t| self.evaluate(t).distance_to(p)),
                None => t0,
            },
            Curve::Ellipse(_) => self.closest_parameter_sampled(p, t0, t1),
        };
        (t, self.evaluate(t).distance_to(p))
    }

    /// Coarse sampling followed by Newton refinement of `(C(t) - p) . C'(t) = 0`.
    fn closest_parameter_sampled(&self, p: &Point3d, t0: f64, t1: f64) -> f64 {
        let step = (t1 - t0) / CURVE_SAMPLES as f64;
        let mut best_t = t0;
        let mut best_d = f64::INFINITY;
        for i in 0..=CURVE_SAMPLES {
            let t = t0 + step * i as f64;
            let d = self.evaluate(t).distance_squared_to(p);
            if d < best_d {
                best_d = d;
                best_t = t;
            }
        }

        let mut t = best_t;
        for _ in 0..30 {
            let diff = self.evaluate(t) - *p;
            let d1 = self.derivative(t);
            let d2 = self.second_derivative(t);
            let f = diff.dot(&d1);
            let df = d1.dot(&d1) + diff.dot(&d2);
            if df.abs() < 1e-15 {
                break;
            }
            let next = (t - f / df).clamp(t0, t1);
            if (next - t).abs() < 1e-14 {
                t = next;
                break;
            }
            t = next;
        }
        if self.evaluate(t).distance_squared_to(p) <= best_d {
            t
        } else {
            best_t
        }
    }

    /// Bounding box of the arc `[t0, t1]`.
    pub fn bounding_box(&self, t0: f64, t1: f64) -> BoundingBox {
        match self {
            Curve::Line(l) => BoundingBox::from_points(&[l.evaluate(t0), l.evaluate(t1)]),
            Curve::Circle(_) | Curve::Ellipse(_) => {
                let radius = match self {
                    Curve::Circle(c) => c.radius,
                    Curve::Ellipse(e) => e.major_radius.max(e.minor_radius),
                    Curve::Line(_) => 0.0,
                };
                let step = (t1 - t0) / CURVE_SAMPLES as f64;
                let points: Vec<Point3d> = (0..=CURVE_SAMPLES)
                    .map(|i| self.evaluate(t0 + step * i as f64))
                    .collect();
                // Chords between samples undershoot the arc by at most the sagitta.
                let sagitta = radius * (1.0 - (step.abs() * 0.5).cos());
                BoundingBox::from_points(&points).expanded(sagitta)
            }
        }
    }

    /// Approximate arc length over the given parameter range.
    pub fn approximate_length(&self, t0: f64, t1: f64, num_samples: usize) -> f64 {
        if let Curve::Line(_) = self {
            return (t1 - t0).abs();
        }
        let mut length = 0.0;
        let mut prev = self.evaluate(t0);
        for i in 1..=num_samples {
            let t = t0 + (t1 - t0) * (i as f64 / num_samples as f64);
            let curr = self.evaluate(t);
            length += prev.distance_to(&curr);
            prev = curr;
        }
        length
    }

    /// Parameter increment that moves about `distance` along the curve at `t`.
    pub fn parameter_step(&self, t: f64, distance: f64) -> f64 {
        let speed = self.derivative(t).length();
        if speed < 1e-15 {
            0.0
        } else {
            distance / speed
        }
    }

    pub fn curve_type_name(&self) -> &'static str {
        match self {
            Curve::Line(_) => "Line",
            Curve::Circle(_) => "Circle",
            Curve::Ellipse(_) => "Ellipse",
        }
    }
}

/// Map a periodic angle into `[t0, t1]`; if no period shift lands inside,
/// pick the closer range end according to `distance`.
fn wrap_into_range(angle: f64, t0: f64, t1: f64, distance: impl Fn(f64) -> f64) -> f64 {
    let shifted = t0 + (angle - t0).rem_euclid(TAU);
    if shifted <= t1 {
        return shifted;
    }
    if distance(t0) <= distance(t1) {
        t0
    } else {
        t1
    }
}
