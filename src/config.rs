use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::DEFAULT_FOV_Y_DEGREES;
use crate::error::{Result, ViewerError};
use crate::polling::PollOptions;
use crate::session::{SessionOptions, DEFAULT_TARGET_SPAN};

pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub damping_factor: f32,
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: DEFAULT_FOV_Y_DEGREES,
            near: 0.1,
            far: 1000.0,
            damping_factor: 0.05,
            auto_rotate_speed: 2.0,
            min_distance: 0.5,
            max_distance: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Mesh Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub target_span: f32,
    pub clear_color: [f32; 3],
    pub camera: CameraConfig,
    pub poll: PollOptions,
    pub http: HttpConfig,
    pub window: WindowConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            target_span: DEFAULT_TARGET_SPAN,
            clear_color: [0.04, 0.04, 0.04],
            camera: CameraConfig::default(),
            poll: PollOptions::default(),
            http: HttpConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Read a JSON config file; missing fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ViewerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ViewerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(ViewerError::Config(message));

        if !(self.target_span.is_finite() && self.target_span > 0.0) {
            return fail(format!("target_span must be positive, got {}", self.target_span));
        }
        let camera = &self.camera;
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            return fail(format!(
                "camera.fov_y_degrees must be in (0, 180), got {}",
                camera.fov_y_degrees
            ));
        }
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return fail(format!(
                "camera clip planes must satisfy 0 < near < far, got {} / {}",
                camera.near, camera.far
            ));
        }
        if !(0.0..=1.0).contains(&camera.damping_factor) {
            return fail(format!(
                "camera.damping_factor must be in [0, 1], got {}",
                camera.damping_factor
            ));
        }
        if !(camera.min_distance > 0.0 && camera.max_distance >= camera.min_distance) {
            return fail(format!(
                "camera distance bounds must satisfy 0 < min <= max, got {} / {}",
                camera.min_distance, camera.max_distance
            ));
        }
        if self.http.timeout_secs == 0 {
            return fail("http.timeout_secs must be at least 1".to_string());
        }
        self.poll.validate()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            target_span: self.target_span,
            fov_y_degrees: self.camera.fov_y_degrees,
            near: self.camera.near,
            far: self.camera.far,
            damping_factor: self.camera.damping_factor,
            auto_rotate_speed: self.camera.auto_rotate_speed,
            min_distance: self.camera.min_distance,
            max_distance: self.camera.max_distance,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
