use serde::{Deserialize, Serialize};

// === Model references ===

/// Asset container formats a generation task can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    #[default]
    Glb,
    Gltf,
    Obj,
    Fbx,
    Usdz,
}

impl ModelFormat {
    pub const ALL: [ModelFormat; 5] = [
        ModelFormat::Glb,
        ModelFormat::Gltf,
        ModelFormat::Obj,
        ModelFormat::Fbx,
        ModelFormat::Usdz,
    ];

    /// Parse a format tag, case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(tag))
    }

    /// Parse a format tag, falling back to `glb` for anything unrecognized
    pub fn from_tag_or_default(tag: &str) -> Self {
        Self::from_tag(tag).unwrap_or_default()
    }

    /// Infer the format from the extension of a URL's path
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next()?;
        let (_, extension) = file_name.rsplit_once('.')?;
        Self::from_tag(extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFormat::Glb => "glb",
            ModelFormat::Gltf => "gltf",
            ModelFormat::Obj => "obj",
            ModelFormat::Fbx => "fbx",
            ModelFormat::Usdz => "usdz",
        }
    }

    /// Whether this viewer can decode the format
    pub fn is_decodable(self) -> bool {
        matches!(self, ModelFormat::Glb | ModelFormat::Gltf | ModelFormat::Obj)
    }
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model to display: where it lives and how to decode it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    url: String,
    format: ModelFormat,
}

impl ModelReference {
    pub fn new(url: impl Into<String>, format: ModelFormat) -> Self {
        Self {
            url: url.into(),
            format,
        }
    }

    /// Reference with the format inferred from the URL extension (`glb` if unknown)
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let format = ModelFormat::from_url(&url).unwrap_or_default();
        Self { url, format }
    }

    pub fn from_payload(payload: &ModelReferencePayload) -> Self {
        match payload.format.as_deref() {
            Some(tag) => Self::new(
                payload.model_url.clone(),
                ModelFormat::from_tag_or_default(tag),
            ),
            None => Self::from_url(payload.model_url.clone()),
        }
    }

    /// Reference for the model produced by a finished task, if it reported one
    pub fn from_task_record(record: &TaskRecord) -> Option<Self> {
        record
            .model_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(Self::from_url)
    }

    /// Use `format` when the URL itself does not name one
    pub fn or_format(mut self, format: ModelFormat) -> Self {
        if ModelFormat::from_url(&self.url).is_none() {
            self.format = format;
        }
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }
}

/// Model reference as handed over by the generation collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReferencePayload {
    pub model_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

// === Generation tasks ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    #[serde(alias = "COMPLETED")]
    Succeeded,
    Failed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Expired
        )
    }

    /// User-facing description of the status
    pub fn describe(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Your 3D model is queued for generation...",
            TaskStatus::InProgress => "Creating your 3D model...",
            TaskStatus::Succeeded => "Your 3D model is ready!",
            TaskStatus::Failed => "Generation failed. Please try again.",
            TaskStatus::Expired => "Task expired. Please create a new generation request.",
            TaskStatus::Unknown => "Processing...",
        }
    }
}

/// One status response for a generation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure detail some services report instead of `message`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reason reported for a failed task that gave none
pub const DEFAULT_FAILURE_REASON: &str = "Model generation failed";

impl TaskRecord {
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            progress: 0.0,
            model_url: None,
            thumbnail_url: None,
            message: None,
            error: None,
        }
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_model_url(mut self, url: impl Into<String>) -> Self {
        self.model_url = Some(url.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Progress clamped to 0..=100
    pub fn progress_percent(&self) -> f32 {
        if self.progress.is_finite() {
            self.progress.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Why a failed task failed
    pub fn failure_reason(&self) -> &str {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .find(|reason| !reason.trim().is_empty())
            .unwrap_or(DEFAULT_FAILURE_REASON)
    }

    /// Server message, or the generic description of the status
    pub fn display_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.status.describe())
    }
}

/// Art styles accepted by the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtStyle {
    #[default]
    Realistic,
    LowPoly,
    Stylized,
    Sculpture,
    Pbr,
}

impl ArtStyle {
    pub fn from_tag_or_default(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "low-poly" => ArtStyle::LowPoly,
            "stylized" => ArtStyle::Stylized,
            "sculpture" => ArtStyle::Sculpture,
            "pbr" => ArtStyle::Pbr,
            _ => ArtStyle::Realistic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub style: ArtStyle,
    pub format: ModelFormat,
}

/// Acknowledgment of an accepted generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationAck {
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

// === GPU data structures ===

/// Mesh vertex as laid out in the vertex buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Camera uniform buffer data for GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

/// Per-draw uniform: model transform, base colour and shading flags
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x: 1.0 for unlit (lines), 0.0 for lit surfaces
    pub params: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tags_parse_case_insensitively() {
        assert_eq!(ModelFormat::from_tag("GLB"), Some(ModelFormat::Glb));
        assert_eq!(ModelFormat::from_tag(".obj"), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_tag("stl"), None);
        assert_eq!(ModelFormat::from_tag_or_default("stl"), ModelFormat::Glb);
    }

    #[test]
    fn format_inferred_from_url_ignores_query() {
        assert_eq!(
            ModelFormat::from_url("https://cdn.example.com/a/model.OBJ?sig=abc"),
            Some(ModelFormat::Obj)
        );
        assert_eq!(ModelFormat::from_url("https://x/m"), None);
        assert_eq!(ModelFormat::from_url("https://x.com/"), None);
    }

    #[test]
    fn fbx_and_usdz_are_not_decodable() {
        assert!(ModelFormat::Glb.is_decodable());
        assert!(ModelFormat::Gltf.is_decodable());
        assert!(ModelFormat::Obj.is_decodable());
        assert!(!ModelFormat::Fbx.is_decodable());
        assert!(!ModelFormat::Usdz.is_decodable());
    }

    #[test]
    fn payload_format_defaults_to_glb_when_unrecognized() {
        let payload = ModelReferencePayload {
            model_url: "https://x/m.obj".into(),
            thumbnail_url: None,
            format: Some("blend".into()),
        };
        assert_eq!(ModelReference::from_payload(&payload).format(), ModelFormat::Glb);
    }

    #[test]
    fn test_requested_format_fills_in_for_bare_urls() {
        let bare = ModelReference::from_url("https://x/models/7f3a").or_format(ModelFormat::Obj);
        assert_eq!(bare.format(), ModelFormat::Obj);

        let named = ModelReference::from_url("https://x/m.gltf").or_format(ModelFormat::Obj);
        assert_eq!(named.format(), ModelFormat::Gltf);
    }

    #[test]
    fn payload_without_format_uses_url_extension() {
        let payload: ModelReferencePayload =
            serde_json::from_str(r#"{"modelUrl":"https://x/m.obj"}"#).unwrap();
        let reference = ModelReference::from_payload(&payload);
        assert_eq!(reference.format(), ModelFormat::Obj);
        assert_eq!(reference.url(), "https://x/m.obj");
    }

    #[test]
    fn task_record_parses_wire_shape() {
        let json = r#"{
            "taskId": "t1",
            "status": "SUCCEEDED",
            "progress": 100,
            "modelUrl": "https://x/m.glb",
            "thumbnailUrl": "https://x/t.png"
        }"#;
        let record: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.task_id, "t1");
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert_eq!(record.progress_percent(), 100.0);
        assert_eq!(record.model_url.as_deref(), Some("https://x/m.glb"));
        assert!(record.message.is_none());
    }

    #[test]
    fn completed_is_an_alias_for_succeeded() {
        let record: TaskRecord =
            serde_json::from_str(r#"{"taskId":"t","status":"COMPLETED","progress":100}"#).unwrap();
        assert_eq!(record.status, TaskStatus::Succeeded);
    }

    #[test]
    fn unknown_status_is_not_terminal() {
        let record: TaskRecord =
            serde_json::from_str(r#"{"taskId":"t","status":"QUEUED"}"#).unwrap();
        assert_eq!(record.status, TaskStatus::Unknown);
        assert!(!record.status.is_terminal());
        assert_eq!(record.progress, 0.0);
    }

    #[test]
    fn display_message_falls_back_to_status_description() {
        let record = TaskRecord::new("t", TaskStatus::InProgress);
        assert_eq!(record.display_message(), "Creating your 3D model...");
        let record = record.with_message("halfway");
        assert_eq!(record.display_message(), "halfway");
    }

    #[test]
    fn failure_reason_prefers_message_then_error() {
        let record = TaskRecord::new("t", TaskStatus::Failed);
        assert_eq!(record.failure_reason(), "Model generation failed");

        let record: TaskRecord =
            serde_json::from_str(r#"{"taskId":"t","status":"FAILED","error":"quota"}"#).unwrap();
        assert_eq!(record.failure_reason(), "quota");

        let record = record.with_message("bad prompt");
        assert_eq!(record.failure_reason(), "bad prompt");
    }

    #[test]
    fn art_style_defaults_to_realistic() {
        assert_eq!(ArtStyle::from_tag_or_default("Low-Poly"), ArtStyle::LowPoly);
        assert_eq!(ArtStyle::from_tag_or_default("cubist"), ArtStyle::Realistic);
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 96);
    }
}
