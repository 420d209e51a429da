//! Curves in a surface's parametric plane (pcurves).
//!
//! A pcurve shares the parameter of the 3D edge curve it represents, so
//! `surface.evaluate(pcurve.evaluate(t))` approximates `curve.evaluate(t)`.

use serde::{Deserialize, Serialize};

use super::point::Point2d;
use super::vector::Vec2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve2d {
    Line(Line2d),
    Circle(Circle2d),
    Polyline(Polyline2d),
}

/// `origin + t * direction`; the direction is not normalized so that the
/// parameter can follow the 3D curve's parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line2d {
    pub origin: Point2d,
    pub direction: Vec2,
}

impl Line2d {
    pub fn evaluate(&self, t: f64) -> Point2d {
        self.origin + self.direction * t
    }
}

/// `center + radius * (cos(t + phase), sign * sin(t + phase))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle2d {
    pub center: Point2d,
    pub radius: f64,
    pub phase: f64,
    /// `1.0` when the 2D circle turns counter-clockwise with the parameter.
    pub sign: f64,
}

impl Circle2d {
    pub fn evaluate(&self, t: f64) -> Point2d {
        let a = t + self.phase;
        Point2d::new(
            self.center.x + self.radius * a.cos(),
            self.center.y + self.sign * self.radius * a.sin(),
        )
    }
}

/// Piecewise-linear pcurve through `(parameter, uv)` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline2d {
    pub parameters: Vec<f64>,
    pub points: Vec<Point2d>,
}

impl Polyline2d {
    pub fn evaluate(&self, t: f64) -> Point2d {
        let n = self.parameters.len().min(self.points.len());
        if n == 0 {
            return Point2d::ORIGIN;
        }
        if n == 1 || t <= self.parameters[0] {
            return self.points[0];
        }
        if t >= self.parameters[n - 1] {
            return self.points[n - 1];
        }
        let i = self.parameters.partition_point(|&p| p <= t).clamp(1, n - 1);
        let (t0, t1) = (self.parameters[i - 1], self.parameters[i]);
        let s = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        self.points[i - 1].lerp(&self.points[i], s)
    }
}

impl Curve2d {
    pub fn evaluate(&self, t: f64) -> Point2d {
        match self {
            Curve2d::Line(l) => l.evaluate(t),
            Curve2d::Circle(c) => c.evaluate(t),
            Curve2d::Polyline(p) => p.evaluate(t),
        }
    }

    pub fn curve_type_name(&self) -> &'static str {
        match self {
            Curve2d::Line(_) => "Line2d",
            Curve2d::Circle(_) => "Circle2d",
            Curve2d::Polyline(_) => "Polyline2d",
        }
    }
}
