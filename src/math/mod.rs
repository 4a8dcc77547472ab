mod aabb;

pub use aabb::AABB;

/// Bounding volume used for framing; the same box type the scene uses
pub type BoundingVolume = AABB;
