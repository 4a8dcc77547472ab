use glam::{Mat4, Vec3};

use crate::error::{Result, ViewerError};
use crate::math::BoundingVolume;

/// Camera distance as a multiple of the normalised model span
pub const FRAMING_DISTANCE_FACTOR: f32 = 1.5;

/// Recentre, scale and camera distance for one model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingPlan {
    pub center_offset: Vec3,
    pub scale_factor: f32,
    pub camera_distance: f32,
}

impl FramingPlan {
    /// Transform applied to the model: recentre first, then scale uniformly
    pub fn model_transform(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scale_factor)) * Mat4::from_translation(self.center_offset)
    }

    /// Bounds of the model after the framing transform
    pub fn framed_bounds(&self, bounds: &BoundingVolume) -> BoundingVolume {
        BoundingVolume::new(
            (bounds.min + self.center_offset) * self.scale_factor,
            (bounds.max + self.center_offset) * self.scale_factor,
        )
    }

    /// Camera position on the diagonal looking at the origin
    pub fn home_eye(&self) -> Vec3 {
        Vec3::ONE.normalize() * self.camera_distance
    }
}

/// Compute the framing of `bounds` so its largest extent becomes `target_span`
pub fn frame(bounds: &BoundingVolume, target_span: f32) -> Result<FramingPlan> {
    if !(target_span.is_finite() && target_span > 0.0) {
        return Err(ViewerError::Config(format!(
            "target span must be positive, got {}",
            target_span
        )));
    }

    if !bounds.is_finite() {
        return Err(ViewerError::DegenerateGeometry);
    }

    let max_extent = bounds.max_extent();
    if !(max_extent.is_finite() && max_extent > 0.0) {
        return Err(ViewerError::DegenerateGeometry);
    }

    let scale_factor = target_span / max_extent;
    if !scale_factor.is_finite() {
        return Err(ViewerError::DegenerateGeometry);
    }

    Ok(FramingPlan {
        center_offset: -bounds.center(),
        scale_factor,
        camera_distance: max_extent * scale_factor * FRAMING_DISTANCE_FACTOR,
    })
}

/// Whether the framed model's bounding sphere sits inside a symmetric frustum
/// with vertical field of view `fov_y` (radians) and `aspect >= 1`, seen from
/// `camera_distance` along any direction through the origin.
pub fn sphere_fits_frustum(
    plan: &FramingPlan,
    bounds: &BoundingVolume,
    fov_y: f32,
    aspect: f32,
) -> bool {
    let radius = plan.framed_bounds(bounds).bounding_radius();
    let half_y = fov_y * 0.5;
    let half_x = ((half_y.tan()) * aspect).atan();
    let half_angle = half_y.min(half_x);

    plan.camera_distance * half_angle.sin() >= radius
}
