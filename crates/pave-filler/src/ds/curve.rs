use bop_kernel::{Curve, Point3d};
use serde::Serialize;

use super::pave::Pave;

/// Curve of a face/face intersection, bounded to the part near both faces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionCurve {
    pub curve: Curve,
    pub range: (f64, f64),
    pub tolerance: f64,
    /// Sorted by parameter.
    pub paves: Vec<Pave>,
    /// Blocks built between consecutive paves.
    pub pave_blocks: Vec<usize>,
}

impl SectionCurve {
    pub fn new(curve: Curve, range: (f64, f64), tolerance: f64) -> Self {
        Self {
            curve,
            range,
            tolerance,
            paves: Vec::new(),
            pave_blocks: Vec::new(),
        }
    }

    /// The range covers a full period, so both ends are the same point.
    pub fn is_closed(&self) -> bool {
        self.curve
            .period()
            .is_some_and(|p| self.range.1 - self.range.0 >= p - 1e-12)
    }

    pub fn has_vertex(&self, index: usize) -> bool {
        self.paves.iter().any(|p| p.index == index)
    }

    pub fn add_pave(&mut self, pave: Pave) {
        let at = self
            .paves
            .partition_point(|p| p.parameter <= pave.parameter);
        self.paves.insert(at, pave);
    }
}

/// Isolated contact point of two faces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionPoint {
    pub point: Point3d,
    pub vertex: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::pave::PaveSource;
    use bop_kernel::geometry::curves::{Circle3d, Line3d};
    use bop_kernel::Vec3;
    use std::f64::consts::TAU;

    #[test]
    fn paves_stay_sorted() {
        let line = Curve::Line(Line3d::new(Point3d::ORIGIN, Vec3::X));
        let mut sc = SectionCurve::new(line, (0.0, 10.0), 1e-7);
        sc.add_pave(Pave::new(3, 7.0, PaveSource::Section));
        sc.add_pave(Pave::new(1, 2.0, PaveSource::Section));
        sc.add_pave(Pave::new(2, 4.0, PaveSource::Section));
        let params: Vec<f64> = sc.paves.iter().map(|p| p.parameter).collect();
        assert_eq!(params, vec![2.0, 4.0, 7.0]);
        assert!(sc.has_vertex(2));
        assert!(!sc.is_closed());
    }

    #[test]
    fn full_circle_is_closed() {
        let circle = Curve::Circle(Circle3d::new(Point3d::ORIGIN, Vec3::Z, 1.0));
        assert!(SectionCurve::new(circle, (0.0, TAU), 1e-7).is_closed());
        assert!(!SectionCurve::new(circle, (0.0, 1.0), 1e-7).is_closed());
    }
}
