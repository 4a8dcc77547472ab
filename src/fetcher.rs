use std::path::Path;
use std::sync::Arc;

use crate::core::CancelToken;
use crate::error::{Result, ViewerError};
use crate::loaders::{load_obj_slice, BufferSource, GltfAsset};
use crate::scene::SceneGraph;
use crate::traits::AssetTransport;
use crate::types::{ModelFormat, ModelReference};

/// Forwards only values in `[0, 100]` that move forward
struct ProgressTracker<P> {
    sink: P,
    last: Option<f32>,
}

impl<P: FnMut(f32)> ProgressTracker<P> {
    fn new(sink: P) -> Self {
        Self { sink, last: None }
    }

    fn report(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let value = value.clamp(0.0, 100.0);
        if self.last.map_or(true, |last| value > last) {
            self.last = Some(value);
            (self.sink)(value);
        }
    }

    fn report_bytes(&mut self, loaded: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|&t| t > 0) {
            self.report(loaded as f32 / total as f32 * 100.0);
        }
    }
}

/// Downloads and decodes model assets through an [`AssetTransport`]
#[derive(Clone)]
pub struct AssetFetcher {
    transport: Arc<dyn AssetTransport>,
}

impl AssetFetcher {
    pub fn new(transport: Arc<dyn AssetTransport>) -> Self {
        Self { transport }
    }

    /// Fetch and decode `reference`.
    ///
    /// Fails with `UnsupportedFormat` before touching the network when the
    /// format has no decoder. `on_progress` sees non-decreasing percentages.
    /// Cancelling `cancel` drops the in-flight download and settles with
    /// `Cancelled`.
    pub async fn fetch<P>(
        &self,
        reference: &ModelReference,
        on_progress: P,
        cancel: &CancelToken,
    ) -> Result<SceneGraph>
    where
        P: FnMut(f32) + Send,
    {
        let format = reference.format();
        if !format.is_decodable() {
            return Err(ViewerError::UnsupportedFormat(format.to_string()));
        }
        cancel.check()?;

        log::info!("fetching {} model from {}", format, reference.url());
        let mut tracker = ProgressTracker::new(on_progress);
        tracker.report(0.0);

        let bytes = self.download(reference.url(), &mut tracker, cancel).await?;
        log::debug!("downloaded {} bytes from {}", bytes.len(), reference.url());

        let scene = match format {
            ModelFormat::Glb | ModelFormat::Gltf => {
                self.decode_gltf(reference.url(), &bytes, cancel).await?
            }
            ModelFormat::Obj => load_obj_slice(&bytes)?,
            ModelFormat::Fbx | ModelFormat::Usdz => {
                return Err(ViewerError::UnsupportedFormat(format.to_string()))
            }
        };

        cancel.check()?;
        let stats = scene.stats();
        log::info!(
            "decoded {}: {} meshes, {} vertices, {} triangles",
            reference.url(),
            stats.mesh_count,
            stats.vertex_count,
            stats.triangle_count
        );
        Ok(scene)
    }

    async fn download<P>(
        &self,
        url: &str,
        tracker: &mut ProgressTracker<P>,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>>
    where
        P: FnMut(f32) + Send,
    {
        let mut sink = |loaded: u64, total: Option<u64>| tracker.report_bytes(loaded, total);
        cancel.run(self.transport.download(url, &mut sink)).await
    }

    async fn decode_gltf(&self, url: &str, bytes: &[u8], cancel: &CancelToken) -> Result<SceneGraph> {
        let mut asset = GltfAsset::parse(bytes)?;
        let mut buffers = Vec::new();

        for source in asset.take_buffer_sources()? {
            match source {
                BufferSource::Ready(data) => buffers.push(data),
                BufferSource::External(uri) => {
                    let resolved = resolve_uri(url, &uri)?;
                    log::debug!("fetching external glTF buffer {}", resolved);
                    let mut ignore = |_: u64, _: Option<u64>| {};
                    let data = cancel
                        .run(self.transport.download(&resolved, &mut ignore))
                        .await?;
                    buffers.push(data);
                }
            }
        }

        asset.into_scene(buffers)
    }
}

/// Resolve a URI found inside an asset against the asset's own location
pub fn resolve_uri(base: &str, uri: &str) -> Result<String> {
    match reqwest::Url::parse(base) {
        Ok(base_url) => base_url
            .join(uri)
            .map(String::from)
            .map_err(|e| ViewerError::Decode(format!("bad buffer URI '{}': {}", uri, e))),
        Err(_) => {
            let parent = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
            Ok(parent.join(uri).to_string_lossy().into_owned())
        }
    }
}
