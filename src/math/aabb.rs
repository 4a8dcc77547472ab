use glam::{Mat4, Vec3};

/// Axis-aligned bounding volume of a scene graph
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Bounds of nothing; returned for empty geometry
    pub const ZERO: AABB = AABB {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight bounds around a set of points, or `None` if there are none
    pub fn from_points<I>(points: I) -> Option<AABB>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(AABB::new(first, first), |acc, p| AABB {
            min: acc.min.min(p),
            max: acc.max.max(p),
        }))
    }

    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Size along each axis
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f32 {
        self.extents().max_element()
    }

    /// Radius of the sphere through the box corners, centred on the box
    pub fn bounding_radius(&self) -> f32 {
        self.extents().length() * 0.5
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Bounds of this box after an affine transform (all eight corners)
    pub fn transformed(&self, transform: &Mat4) -> AABB {
        let corners = (0..8).map(|i| {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            transform.transform_point3(corner)
        });
        AABB::from_points(corners).unwrap_or(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_new() {
        let min = Vec3::new(0.0, 0.0, 0.0);
        let max = Vec3::new(1.0, 1.0, 1.0);
        let aabb = AABB::new(min, max);
        assert_eq!(aabb.min, min);
        assert_eq!(aabb.max, max);
    }

    #[test]
    fn test_aabb_center_negative() {
        let aabb = AABB::new(Vec3::new(-2.0, -4.0, -6.0), Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(aabb.center(), Vec3::ZERO);
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = AABB::from_points([
            Vec3::new(-1.0, -2.0, -3.0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 0.0, 0.0),
        ])
        .unwrap();

        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_aabb_from_no_points() {
        assert!(AABB::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_aabb_extents_and_max_extent() {
        let aabb = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(aabb.extents(), Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(aabb.max_extent(), 4.0);
    }

    #[test]
    fn test_aabb_bounding_radius_unit_cube() {
        let aabb = AABB::new(Vec3::ZERO, Vec3::ONE);
        assert!((aabb.bounding_radius() - 3f32.sqrt() / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_union_non_overlapping() {
        let aabb1 = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let aabb2 = AABB::new(Vec3::new(2.0, 2.0, 2.0), Vec3::new(3.0, 3.0, 3.0));
        let union = aabb1.union(&aabb2);
        assert_eq!(union.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(union.max, Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_aabb_transformed_by_scale_and_translation() {
        let aabb = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
            * Mat4::from_scale(Vec3::splat(2.0));
        let moved = aabb.transformed(&transform);
        assert_eq!(moved.min, Vec3::new(8.0, -2.0, -2.0));
        assert_eq!(moved.max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[test]
    fn test_aabb_transformed_by_rotation_grows() {
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let rotated = aabb.transformed(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4));
        assert!(rotated.extents().x > 2.8);
        assert!((rotated.extents().y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_zero_is_degenerate() {
        assert_eq!(AABB::ZERO.max_extent(), 0.0);
        assert!(AABB::ZERO.is_finite());
    }
}
