use serde::{Deserialize, Serialize};

use super::point::Point3d;
use super::vector::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3d,
    pub max: Point3d,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn new(min: Point3d, max: Point3d) -> Self {
        Self { min, max }
    }

    /// The void box: contains nothing, and `union` with it is the identity.
    pub fn empty() -> Self {
        Self {
            min: Point3d::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3d::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Point3d]) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand_to_include(p);
        }
        bb
    }

    pub fn is_void(&self) -> bool {
        !(self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z)
    }

    pub fn expand_to_include(&mut self, p: &Point3d) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point3d::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3d::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Common part of two boxes; void when they are disjoint.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: Point3d::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: Point3d::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        }
    }

    /// Overlap test. Touching boxes overlap; void boxes never do.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_void() || other.is_void() {
            return false;
        }
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, p: &Point3d) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Point3d {
        self.min.midpoint(&self.max)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn diagonal(&self) -> f64 {
        if self.is_void() {
            0.0
        } else {
            self.size().length()
        }
    }

    pub fn expanded(&self, margin: f64) -> Self {
        if self.is_void() {
            return *self;
        }
        Self {
            min: Point3d::new(
                self.min.x - margin,
                self.min.y - margin,
                self.min.z - margin,
            ),
            max: Point3d::new(
                self.max.x + margin,
                self.max.y + margin,
                self.max.z + margin,
            ),
        }
    }

    /// Parameter interval of the line `origin + t * direction` inside the box
    /// (slab method). `None` if the line misses the box.
    pub fn clip_line(&self, origin: &Point3d, direction: &Vec3) -> Option<(f64, f64)> {
        if self.is_void() {
            return None;
        }
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        let dir = direction.to_array();
        for axis in 0..3 {
            let o = origin.coord(axis);
            let lo = self.min.coord(axis);
            let hi = self.max.coord(axis);
            if dir[axis].abs() < 1e-15 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[axis];
            let (t0, t1) = {
                let a = (lo - o) * inv;
                let b = (hi - o) * inv;
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_from_points() {
        let bb = BoundingBox::from_points(&[
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 2.0, 3.0),
            Point3d::new(-1.0, 0.5, 1.0),
        ]);
        assert!((bb.min.x - (-1.0)).abs() < 1e-12);
        assert!((bb.max.y - 2.0).abs() < 1e-12);
        assert!((bb.diagonal() - (4.0f64 + 4.0 + 9.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(2.0, 2.0, 2.0));
        let b = BoundingBox::new(Point3d::new(1.0, 1.0, 1.0), Point3d::new(3.0, 3.0, 3.0));
        let c = BoundingBox::new(Point3d::new(5.0, 5.0, 5.0), Point3d::new(6.0, 6.0, 6.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&BoundingBox::empty()));
    }

    #[test]
    fn test_flat_boxes_touch() {
        let a = BoundingBox::new(Point3d::new(0.0, 0.0, 10.0), Point3d::new(10.0, 10.0, 10.0));
        let b = BoundingBox::new(Point3d::new(5.0, 5.0, 5.0), Point3d::new(5.0, 15.0, 15.0));
        assert!(a.intersects(&b));
        let common = a.intersection(&b);
        assert!((common.min.y - 5.0).abs() < 1e-12);
        assert!((common.max.y - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_expanded_void_box_stays_void() {
        assert!(BoundingBox::empty().expanded(1.0).is_void());
    }

    #[test]
    fn test_clip_line() {
        let bb = BoundingBox::new(Point3d::new(0.0, 0.0, 0.0), Point3d::new(10.0, 10.0, 10.0));
        let (t0, t1) = bb
            .clip_line(&Point3d::new(-5.0, 5.0, 5.0), &Vec3::X)
            .unwrap();
        assert!((t0 - 5.0).abs() < 1e-12);
        assert!((t1 - 15.0).abs() < 1e-12);
        assert!(bb.clip_line(&Point3d::new(-5.0, 20.0, 5.0), &Vec3::X).is_none());
    }
}
