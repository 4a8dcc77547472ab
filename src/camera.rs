use glam::{Mat4, Vec3};

pub const DEFAULT_FOV_Y_DEGREES: f32 = 75.0;
pub const INITIAL_EYE: Vec3 = Vec3::new(5.0, 5.0, 5.0);

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Where the camera sits and what it looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        Self { eye, target }
    }

    /// Pose before any model has loaded
    pub fn initial() -> Self {
        Self::new(INITIAL_EYE, Vec3::ZERO)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitBounds {
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitBounds {
    /// These bounds stretched just enough to admit `distance`
    pub fn containing(self, distance: f32) -> Self {
        if !(distance.is_finite() && distance > 0.0) {
            return self;
        }
        Self {
            min_distance: self.min_distance.min(distance),
            max_distance: self.max_distance.max(distance),
        }
    }
}

impl Default for OrbitBounds {
    fn default() -> Self {
        Self {
            min_distance: 0.5,
            max_distance: 100.0,
        }
    }
}

/// Y-up camera orbiting a target point
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub bounds: OrbitBounds,
    pub aspect: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl OrbitCamera {
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            target: Vec3::ZERO,
            distance: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            bounds: OrbitBounds::default(),
            aspect,
            fov_y: DEFAULT_FOV_Y_DEGREES.to_radians(),
            near: 0.1,
            far: 1000.0,
        };
        camera.set_pose(CameraPose::initial());
        camera
    }

    pub fn eye(&self) -> Vec3 {
        self.target
            + Vec3::new(
                self.yaw.sin() * self.pitch.cos(),
                self.pitch.sin(),
                self.yaw.cos() * self.pitch.cos(),
            ) * self.distance
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.eye(), self.target)
    }

    /// Place the camera exactly at `pose`; distance bounds are not applied
    pub fn set_pose(&mut self, pose: CameraPose) {
        let offset = pose.eye - pose.target;
        let distance = offset.length();
        self.target = pose.target;
        if distance <= f32::EPSILON || !distance.is_finite() {
            return;
        }
        self.distance = distance;
        self.pitch = (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = offset.x.atan2(offset.z);
    }

    pub fn add_yaw(&mut self, delta: f32) {
        self.yaw = (self.yaw + delta).rem_euclid(std::f32::consts::TAU);
    }

    pub fn add_pitch(&mut self, delta: f32) {
        self.pitch = (self.pitch + delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.clamp(self.bounds.min_distance, self.bounds.max_distance);
    }

    /// Move eye and target together along the view plane
    pub fn pan(&mut self, right: f32, up: f32) {
        let forward = (self.target - self.eye()).normalize_or_zero();
        let right_dir = forward.cross(Vec3::Y).normalize_or_zero();
        let up_dir = right_dir.cross(forward).normalize_or_zero();
        self.target += right_dir * right + up_dir * up;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye(), self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj * view
    }
}

/// Damped orbit input accumulated between frames
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    yaw_delta: f32,
    pitch_delta: f32,
    zoom_scale: f32,
    pan_delta: (f32, f32),
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            rotate_speed: 0.005,
            zoom_speed: 1.0,
            pan_speed: 0.002,
            yaw_delta: 0.0,
            pitch_delta: 0.0,
            zoom_scale: 1.0,
            pan_delta: (0.0, 0.0),
        }
    }
}

impl OrbitControls {
    pub fn new(damping_factor: f32, auto_rotate_speed: f32) -> Self {
        Self {
            enable_damping: damping_factor > 0.0,
            damping_factor: damping_factor.clamp(0.0, 1.0),
            auto_rotate_speed,
            ..Self::default()
        }
    }

    /// Pointer drag in pixels
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_delta -= dx * self.rotate_speed;
        self.pitch_delta += dy * self.rotate_speed;
    }

    /// Scroll amount in lines; positive zooms in
    pub fn zoom(&mut self, lines: f32) {
        self.zoom_scale *= 0.95f32.powf(lines * self.zoom_speed);
    }

    /// Pointer drag in pixels
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_delta.0 -= dx * self.pan_speed;
        self.pan_delta.1 += dy * self.pan_speed;
    }

    /// Auto-rotation rate in radians per second
    pub fn auto_rotate_rate(&self) -> f32 {
        std::f32::consts::TAU / 60.0 * self.auto_rotate_speed
    }

    /// Drop any pending motion
    pub fn reset(&mut self) {
        self.yaw_delta = 0.0;
        self.pitch_delta = 0.0;
        self.zoom_scale = 1.0;
        self.pan_delta = (0.0, 0.0);
    }

    pub fn is_settled(&self) -> bool {
        self.yaw_delta.abs() < 1e-6
            && self.pitch_delta.abs() < 1e-6
            && (self.zoom_scale - 1.0).abs() < 1e-6
            && self.pan_delta.0.abs() < 1e-6
            && self.pan_delta.1.abs() < 1e-6
    }

    /// Apply accumulated input to `camera`, advancing `dt` seconds
    pub fn update(&mut self, camera: &mut OrbitCamera, dt: f32) {
        if self.auto_rotate {
            camera.add_yaw(self.auto_rotate_rate() * dt);
        }

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        camera.add_yaw(self.yaw_delta * step);
        camera.add_pitch(self.pitch_delta * step);
        let pan_scale = camera.distance * step;
        camera.pan(self.pan_delta.0 * pan_scale, self.pan_delta.1 * pan_scale);
        camera.set_distance(camera.distance * self.zoom_scale);
        self.zoom_scale = 1.0;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.yaw_delta *= decay;
            self.pitch_delta *= decay;
            self.pan_delta.0 *= decay;
            self.pan_delta.1 *= decay;
        } else {
            self.yaw_delta = 0.0;
            self.pitch_delta = 0.0;
            self.pan_delta = (0.0, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_pose_looks_at_origin_from_diagonal() {
        let camera = OrbitCamera::new(1.0);
        let pose = camera.pose();
        assert!((pose.eye - INITIAL_EYE).length() < 1e-4);
        assert_eq!(pose.target, Vec3::ZERO);
    }

    #[test]
    fn set_pose_round_trips() {
        let mut camera = OrbitCamera::new(1.5);
        let pose = CameraPose::new(Vec3::new(-3.0, 2.0, 7.0), Vec3::new(1.0, 0.0, 0.0));
        camera.set_pose(pose);
        let back = camera.pose();
        assert!((back.eye - pose.eye).length() < 1e-4);
        assert_eq!(back.target, pose.target);
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let camera = OrbitCamera::new(16.0 / 9.0);
        let clip = camera.view_projection() * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_bounds_stretch_to_admit_a_distance() {
        let bounds = OrbitBounds::default();
        assert_eq!(bounds.containing(10.0), bounds);
        assert_eq!(bounds.containing(150.0).max_distance, 150.0);
        assert_eq!(bounds.containing(0.2).min_distance, 0.2);
        assert_eq!(bounds.containing(f32::NAN), bounds);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = OrbitCamera::new(1.0);
        let mut controls = OrbitControls::default();
        controls.zoom(-10_000.0);
        controls.update(&mut camera, 0.016);
        assert_eq!(camera.distance, camera.bounds.max_distance);
    }

    #[test]
    fn damping_decays_rotation() {
        let mut camera = OrbitCamera::new(1.0);
        let mut controls = OrbitControls::new(0.05, 2.0);
        controls.rotate(100.0, 0.0);
        let yaw_before = camera.yaw;
        controls.update(&mut camera, 0.016);
        assert_ne!(camera.yaw, yaw_before);
        for _ in 0..1000 {
            controls.update(&mut camera, 0.016);
        }
        assert!(controls.is_settled());
    }

    #[test]
    fn auto_rotate_advances_yaw_at_configured_rate() {
        let mut camera = OrbitCamera::new(1.0);
        camera.yaw = 0.0;
        let mut controls = OrbitControls::new(0.05, 2.0);
        controls.auto_rotate = true;
        controls.update(&mut camera, 1.0);
        assert!((camera.yaw - std::f32::consts::TAU / 30.0).abs() < 1e-5);
    }

    #[test]
    fn pitch_never_flips_over_the_pole() {
        let mut camera = OrbitCamera::new(1.0);
        camera.add_pitch(10.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        assert!(camera.eye().is_finite());
    }
}
