//! Axis-aligned bounding boxes in scene space

use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    /// Smallest box containing every point, `None` for an empty iterator
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest of the three side lengths
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// The eight corners, min-x first
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of any number of boxes
    pub fn union_all<'a, I: IntoIterator<Item = &'a Aabb>>(boxes: I) -> Option<Aabb> {
        boxes
            .into_iter()
            .fold(None, |acc: Option<Aabb>, b| Some(acc.map_or(*b, |a| a.union(b))))
    }

    /// Bounds of this box after an affine transform
    pub fn transformed(&self, transform: &Affine3A) -> Aabb {
        let corners = self.corners().map(|c| transform.transform_point3(c));
        // Eight corners always yield a box
        Aabb::from_points(corners).unwrap_or(*self)
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_from_points_and_metrics() {
        let b = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 2.5),
            Vec3::new(0.0, 0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 4.0, 2.5));
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 1.25));
        assert_eq!(b.max_extent(), 6.0);
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_new_orders_corners() {
        let b = Aabb::new(Vec3::ONE, Vec3::ZERO);
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::ONE);
    }

    #[test]
    fn test_union_all() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(-2.0), Vec3::splat(-1.0));
        let u = Aabb::union_all([&a, &b]).unwrap();
        assert_eq!(u.min, Vec3::splat(-2.0));
        assert_eq!(u.max, Vec3::ONE);
        assert!(Aabb::union_all(std::iter::empty::<&Aabb>()).is_none());
    }

    #[test]
    fn test_transformed_rotation() {
        let b = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let t = Affine3A::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(10.0, 0.0, 0.0),
        );
        let r = b.transformed(&t);
        assert!((r.min - Vec3::new(9.0, 0.0, 0.0)).length() < 1e-5);
        assert!((r.max - Vec3::new(10.0, 2.0, 1.0)).length() < 1e-5);
    }
}
