use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use glam::Vec3;
use tokio::sync::mpsc;

use crate::camera::{CameraPose, OrbitBounds, OrbitCamera, OrbitControls, DEFAULT_FOV_Y_DEGREES};
use crate::core::CancelToken;
use crate::error::{ErrorKind, Result, ViewerError};
use crate::fetcher::AssetFetcher;
use crate::frame::FrameInfo;
use crate::framing::{self, FramingPlan};
use crate::scene::{SceneGraph, SceneStats};
use crate::traits::{DrawList, DrawModel, RenderBackend};
use crate::types::ModelReference;

/// Normalised size of the largest model extent
pub const DEFAULT_TARGET_SPAN: f32 = 4.0;

/// Observable changes of a [`SceneSession`]
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Loading { url: String },
    Progress(f32),
    Ready { plan: FramingPlan, stats: SceneStats },
    Error(ErrorKind, String),
    Disposed,
}

/// Public view of the session state
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Empty,
    Loading(ModelReference),
    Ready(ModelReference),
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub target_span: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub damping_factor: f32,
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let bounds = OrbitBounds::default();
        Self {
            target_span: DEFAULT_TARGET_SPAN,
            fov_y_degrees: DEFAULT_FOV_Y_DEGREES,
            near: 0.1,
            far: 1000.0,
            damping_factor: 0.05,
            auto_rotate_speed: 2.0,
            min_distance: bounds.min_distance,
            max_distance: bounds.max_distance,
        }
    }
}

impl SessionOptions {
    pub fn orbit_bounds(&self) -> OrbitBounds {
        OrbitBounds {
            min_distance: self.min_distance,
            max_distance: self.max_distance,
        }
    }
}

#[derive(Clone, Default)]
struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ViewerEvent>>>>,
}

impl EventBus {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ViewerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    fn emit(&self, event: ViewerEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

/// The displayed model; owns every GPU mesh uploaded for it
pub struct ModelHandle<M> {
    reference: ModelReference,
    meshes: Vec<M>,
    plan: FramingPlan,
    stats: SceneStats,
    wireframe: bool,
}

impl<M> ModelHandle<M> {
    pub fn reference(&self) -> &ModelReference {
        &self.reference
    }

    pub fn plan(&self) -> &FramingPlan {
        &self.plan
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }
}

enum Slot<M> {
    Empty,
    Loading {
        reference: ModelReference,
        generation: u64,
        cancel: CancelToken,
    },
    Ready(ModelHandle<M>),
    Failed(ViewerError),
}

/// Fetch half of a load, free of session borrows so it can run anywhere
pub struct PendingLoad {
    generation: u64,
    reference: ModelReference,
    cancel: CancelToken,
    future: BoxFuture<'static, Result<SceneGraph>>,
}

impl PendingLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reference(&self) -> &ModelReference {
        &self.reference
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub async fn run(self) -> LoadOutcome {
        let result = self.future.await;
        LoadOutcome {
            generation: self.generation,
            reference: self.reference,
            result,
        }
    }
}

/// Result of a [`PendingLoad`], handed back to [`SceneSession::finish_load`]
pub struct LoadOutcome {
    generation: u64,
    reference: ModelReference,
    result: Result<SceneGraph>,
}

impl LoadOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn result(&self) -> &Result<SceneGraph> {
        &self.result
    }
}

/// Owns the render backend, camera, controls and displayed model.
///
/// Loads are split in two: [`begin_load`](Self::begin_load) disposes the
/// current model and hands out the fetch, [`finish_load`](Self::finish_load)
/// commits its result if no newer load has started since.
pub struct SceneSession<B: RenderBackend> {
    backend: B,
    fetcher: AssetFetcher,
    options: SessionOptions,
    camera: OrbitCamera,
    controls: OrbitControls,
    home_pose: CameraPose,
    slot: Slot<B::Mesh>,
    generation: u64,
    events: EventBus,
    disposed: bool,
}

impl<B: RenderBackend> SceneSession<B> {
    pub fn new(backend: B, fetcher: AssetFetcher, options: SessionOptions) -> Self {
        let mut camera = OrbitCamera::new(backend.aspect());
        camera.fov_y = options.fov_y_degrees.to_radians();
        camera.near = options.near;
        camera.far = options.far;
        camera.bounds = options.orbit_bounds();

        Self {
            backend,
            fetcher,
            controls: OrbitControls::new(options.damping_factor, options.auto_rotate_speed),
            options,
            camera,
            home_pose: CameraPose::initial(),
            slot: Slot::Empty,
            generation: 0,
            events: EventBus::default(),
            disposed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.slot {
            Slot::Empty => SessionState::Empty,
            Slot::Loading { reference, .. } => SessionState::Loading(reference.clone()),
            Slot::Ready(handle) => SessionState::Ready(handle.reference.clone()),
            Slot::Failed(err) => SessionState::Failed(err.kind()),
        }
    }

    /// Error of the last failed load, while the session is in `Failed`
    pub fn last_error(&self) -> Option<&ViewerError> {
        match &self.slot {
            Slot::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&ModelHandle<B::Mesh>> {
        match &self.slot {
            Slot::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ViewerEvent> {
        self.events.subscribe()
    }

    /// Start loading `reference`.
    ///
    /// Cancels any in-flight load and releases the displayed model before
    /// returning, so the returned fetch never overlaps another resident model.
    pub fn begin_load(&mut self, reference: ModelReference) -> Result<PendingLoad> {
        if self.disposed {
            return Err(ViewerError::Disposed);
        }

        self.clear_slot();
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancelToken::new();

        log::info!("load #{} started: {}", generation, reference.url());
        self.slot = Slot::Loading {
            reference: reference.clone(),
            generation,
            cancel: cancel.clone(),
        };
        self.events.emit(ViewerEvent::Loading {
            url: reference.url().to_string(),
        });

        let fetcher = self.fetcher.clone();
        let events = self.events.clone();
        let token = cancel.clone();
        let target = reference.clone();
        let future = async move {
            let progress_token = token.clone();
            let on_progress = move |percent: f32| {
                if !progress_token.is_cancelled() {
                    events.emit(ViewerEvent::Progress(percent));
                }
            };
            fetcher.fetch(&target, on_progress, &token).await
        }
        .boxed();

        Ok(PendingLoad {
            generation,
            reference,
            cancel,
            future,
        })
    }

    /// Commit a finished fetch. Returns `false` when the outcome is stale
    /// (a newer load started, or the session was disposed) and was dropped.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> bool {
        if self.disposed {
            log::debug!("dropping load #{}: session disposed", outcome.generation);
            return false;
        }
        match &self.slot {
            Slot::Loading { generation, .. } if *generation == outcome.generation => {}
            _ => {
                log::debug!("dropping stale load #{}", outcome.generation);
                return false;
            }
        }

        let LoadOutcome {
            generation,
            reference,
            result,
        } = outcome;

        match result.and_then(|scene| self.commit(reference, scene)) {
            Ok(handle) => {
                log::info!(
                    "load #{} ready: {} meshes, {} triangles, scale {:.4}",
                    generation,
                    handle.stats.mesh_count,
                    handle.stats.triangle_count,
                    handle.plan.scale_factor
                );
                self.events.emit(ViewerEvent::Ready {
                    plan: handle.plan,
                    stats: handle.stats,
                });
                self.slot = Slot::Ready(handle);
            }
            Err(err) => {
                log::error!("load #{} failed: {}", generation, err);
                self.events
                    .emit(ViewerEvent::Error(err.kind(), err.to_string()));
                self.slot = Slot::Failed(err);
            }
        }
        true
    }

    /// Load `reference` and wait for it to be displayed
    pub async fn load_model(&mut self, reference: ModelReference) -> Result<()> {
        let pending = self.begin_load(reference)?;
        let outcome = pending.run().await;
        self.finish_load(outcome);

        match &self.slot {
            Slot::Failed(err) => Err(err.clone()),
            Slot::Ready(_) => Ok(()),
            _ => Err(ViewerError::Cancelled),
        }
    }

    fn commit(&mut self, reference: ModelReference, scene: SceneGraph) -> Result<ModelHandle<B::Mesh>> {
        let bounds = scene.bounds();
        let plan = framing::frame(&bounds, self.options.target_span)?;

        let mut meshes = Vec::with_capacity(scene.meshes.len());
        for mesh in &scene.meshes {
            let material = scene.material_of(mesh);
            match self.backend.upload_mesh(mesh, &material) {
                Ok(uploaded) => meshes.push(uploaded),
                Err(err) => {
                    log::warn!("upload failed after {} meshes, releasing them", meshes.len());
                    for uploaded in meshes {
                        self.backend.release_mesh(uploaded);
                    }
                    return Err(err);
                }
            }
        }

        self.home_pose = CameraPose::new(plan.home_eye(), Vec3::ZERO);
        self.camera.bounds = self.options.orbit_bounds().containing(plan.camera_distance);
        self.camera.set_pose(self.home_pose);
        self.controls.reset();

        Ok(ModelHandle {
            reference,
            meshes,
            plan,
            stats: scene.stats(),
            wireframe: false,
        })
    }

    /// Cancel any in-flight load, release the displayed model and go back to `Empty`
    fn clear_slot(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Loading {
                cancel, generation, ..
            } => {
                log::debug!("cancelling load #{}", generation);
                cancel.cancel();
            }
            Slot::Ready(handle) => {
                log::debug!(
                    "releasing {} meshes of {}",
                    handle.meshes.len(),
                    handle.reference.url()
                );
                for mesh in handle.meshes {
                    self.backend.release_mesh(mesh);
                }
            }
            Slot::Empty | Slot::Failed(_) => {}
        }
        self.controls.auto_rotate = false;
    }

    pub fn set_wireframe(&mut self, enabled: bool) {
        match &mut self.slot {
            Slot::Ready(handle) => handle.wireframe = enabled,
            _ => log::debug!("wireframe ignored: no model displayed"),
        }
    }

    pub fn wireframe(&self) -> bool {
        matches!(&self.slot, Slot::Ready(handle) if handle.wireframe)
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        if matches!(self.slot, Slot::Ready(_)) {
            self.controls.auto_rotate = enabled;
        } else {
            log::debug!("auto-rotate ignored: no model displayed");
        }
    }

    pub fn auto_rotate(&self) -> bool {
        self.controls.auto_rotate
    }

    /// Return the camera to where the last successful load placed it
    pub fn reset_camera(&mut self) {
        self.camera.set_pose(self.home_pose);
        self.controls.reset();
    }

    pub fn home_pose(&self) -> CameraPose {
        self.home_pose
    }

    /// Release everything and detach from the render target; repeat calls do nothing
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear_slot();
        self.backend.detach();
        self.disposed = true;
        log::info!("viewer session disposed");
        self.events.emit(ViewerEvent::Disposed);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Advance controls by one frame and draw whatever is displayed
    pub fn render_frame(&mut self, frame: &FrameInfo) -> Result<()> {
        if self.disposed {
            return Ok(());
        }

        self.camera.aspect = self.backend.aspect();
        self.controls.update(&mut self.camera, frame.delta);

        let model = match &self.slot {
            Slot::Ready(handle) => Some(DrawModel {
                meshes: handle.meshes.as_slice(),
                transform: handle.plan.model_transform(),
                wireframe: handle.wireframe,
            }),
            _ => None,
        };
        let list = DrawList {
            view_proj: self.camera.view_projection(),
            eye: self.camera.eye(),
            model,
        };
        self.backend.draw(&list)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
        self.camera.resize(width, height);
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of the most recent load
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<B: RenderBackend> Drop for SceneSession<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
