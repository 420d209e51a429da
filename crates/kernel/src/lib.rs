pub mod geometry;
pub mod topology;

use thiserror::Error;

pub use geometry::bounding_box::BoundingBox;
pub use geometry::curves::Curve;
pub use geometry::point::{Point2d, Point3d};
pub use geometry::surfaces::Surface;
pub use geometry::vector::{Vec2, Vec3};
pub use topology::shape::{ShapeKind, ShapeRef, ShapeStore};

/// Global tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Points closer than this are considered coincident (model units).
    pub coincidence: f64,
    /// Angles smaller than this (radians) are considered zero.
    pub angular: f64,
    /// Parameter-space tolerance for curve/surface evaluations.
    pub parametric: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-7,
            angular: 1e-10,
            parametric: 1e-9,
        }
    }
}

impl Tolerance {
    /// Same angular/parametric settings, with a different 3D coincidence distance.
    pub fn with_coincidence(coincidence: f64) -> Self {
        Self {
            coincidence,
            ..Self::default()
        }
    }

    pub fn points_coincident(&self, a: &Point3d, b: &Point3d) -> bool {
        a.distance_to(b) <= self.coincidence
    }

    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() <= self.coincidence
    }

    pub fn is_zero_angle(&self, angle: f64) -> bool {
        angle.abs() < self.angular
    }
}

/// Precision used when no shape tolerance applies.
pub const CONFUSION: f64 = 1e-7;

/// Failures of the geometric primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("intersection of {first} and {second} is not supported")]
    Unsupported {
        first: &'static str,
        second: &'static str,
    },

    #[error("projection of point onto {target} failed")]
    ProjectionFailed { target: &'static str },

    #[error("degenerate geometry: {reason}")]
    Degenerate { reason: String },

    #[error("iteration did not converge after {iterations} steps")]
    NotConverged { iterations: usize },
}
