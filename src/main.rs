use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use mesh_viewer::cli::{Cli, Command};
use mesh_viewer::config::ViewerConfig;
use mesh_viewer::core::{CancelToken, GpuContext, WgpuBackend};
use mesh_viewer::error::Result;
use mesh_viewer::fetcher::AssetFetcher;
use mesh_viewer::framing;
use mesh_viewer::polling::{PollOptions, PollingOrchestrator};
use mesh_viewer::render_loop::RenderLoop;
use mesh_viewer::scene::Lighting;
use mesh_viewer::session::{LoadOutcome, SceneSession, ViewerEvent};
use mesh_viewer::transport::HttpClient;
use mesh_viewer::types::{GenerationRequest, ModelFormat, ModelReference, TaskRecord};

/// Pixels of precise scrolling treated as one wheel line
const PIXELS_PER_LINE: f32 = 50.0;

// === Model resolution ===

/// Turn the command into a model reference, polling the service if needed
async fn resolve_reference<F>(
    command: &Command,
    client: &HttpClient,
    poll: PollOptions,
    cancel: &CancelToken,
    on_progress: F,
) -> Result<ModelReference>
where
    F: FnMut(&TaskRecord) + Send,
{
    let orchestrator = PollingOrchestrator::new(Arc::new(client.clone()));

    match command {
        Command::View { url, .. } => Ok(match command.format() {
            Some(format) => ModelReference::new(url.clone(), format),
            None => ModelReference::from_url(url.clone()),
        }),
        Command::Poll { task_id } => {
            log::info!("polling task {} for up to {:?}", task_id, poll.budget());
            orchestrator
                .poll_for_model(task_id, on_progress, poll, cancel)
                .await
                .map(|(_, reference)| reference)
        }
        Command::Generate { prompt, .. } => {
            let request = GenerationRequest {
                prompt: prompt.clone(),
                style: command.style(),
                format: command.format().unwrap_or(ModelFormat::Glb),
            };
            let ack = cancel.run(client.submit_generation(&request)).await?;
            println!("Task {} accepted", ack.task_id);
            log::info!("polling task {} for up to {:?}", ack.task_id, poll.budget());
            orchestrator
                .poll_for_model(&ack.task_id, on_progress, poll, cancel)
                .await
                .map(|(_, reference)| reference.or_format(request.format))
        }
    }
}

fn describe_record(record: &TaskRecord) -> String {
    format!(
        "{} ({:.0}%)",
        record.display_message(),
        record.progress_percent()
    )
}

// === Headless mode ===

async fn run_headless(cli: &Cli, config: &ViewerConfig, client: HttpClient) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    let reference = resolve_reference(&cli.command, &client, config.poll, &cancel, |record| {
        println!("{}", describe_record(record))
    })
    .await
    .context("failed to resolve model")?;

    let fetcher = AssetFetcher::new(Arc::new(client));
    let scene = fetcher
        .fetch(&reference, |percent| log::info!("download {:.0}%", percent), &cancel)
        .await
        .with_context(|| format!("failed to load {}", reference.url()))?;

    let bounds = scene.bounds();
    let plan = framing::frame(&bounds, config.target_span)?;
    let stats = scene.stats();

    println!("Model:     {} ({})", reference.url(), reference.format());
    println!("Meshes:    {}", stats.mesh_count);
    println!("Vertices:  {}", stats.vertex_count);
    println!("Triangles: {}", stats.triangle_count);
    println!("Bounds:    {:?} .. {:?}", bounds.min, bounds.max);
    println!("Scale:     {:.6}", plan.scale_factor);
    println!("Distance:  {:.3}", plan.camera_distance);
    Ok(())
}

// === Windowed mode ===

enum AppEvent {
    TaskProgress(TaskRecord),
    ModelResolved(ModelReference),
    LoadFinished(LoadOutcome),
    Failed(String),
}

#[derive(Default)]
struct PointerState {
    cursor: Option<PhysicalPosition<f64>>,
    rotating: bool,
    panning: bool,
}

struct App {
    config: ViewerConfig,
    runtime: tokio::runtime::Handle,
    fetcher: AssetFetcher,
    proxy: EventLoopProxy<AppEvent>,
    resolve_cancel: CancelToken,
    window: Option<Arc<Window>>,
    session: Option<SceneSession<WgpuBackend>>,
    events: Option<UnboundedReceiver<ViewerEvent>>,
    render_loop: RenderLoop,
    queued: Option<ModelReference>,
    pointer: PointerState,
    status: String,
}

impl App {
    fn new(
        config: ViewerConfig,
        runtime: tokio::runtime::Handle,
        fetcher: AssetFetcher,
        proxy: EventLoopProxy<AppEvent>,
        resolve_cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            runtime,
            fetcher,
            proxy,
            resolve_cancel,
            window: None,
            session: None,
            events: None,
            render_loop: RenderLoop::new(),
            queued: None,
            pointer: PointerState::default(),
            status: "Waiting for model".to_string(),
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        if let Some(window) = &self.window {
            window.set_title(&format!("{} - {}", self.config.window.title, self.status));
        }
    }

    fn create_session(&mut self, window: Arc<Window>) -> Result<()> {
        let (gpu, surface) = pollster::block_on(GpuContext::new_with_window(window))?;
        let backend = WgpuBackend::new(gpu, surface, &Lighting::default(), self.config.clear_color);
        let session = SceneSession::new(backend, self.fetcher.clone(), self.config.session_options());
        self.events = Some(session.subscribe());
        self.session = Some(session);
        Ok(())
    }

    fn start_load(&mut self, reference: ModelReference) {
        let Some(session) = self.session.as_mut() else {
            self.queued = Some(reference);
            return;
        };

        match session.begin_load(reference) {
            Ok(pending) => {
                let proxy = self.proxy.clone();
                self.runtime.spawn(async move {
                    let outcome = pending.run().await;
                    let _ = proxy.send_event(AppEvent::LoadFinished(outcome));
                });
            }
            Err(err) => log::error!("cannot start load: {}", err),
        }
    }

    fn drain_viewer_events(&mut self) {
        let mut latest = None;
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                match event {
                    ViewerEvent::Loading { url } => latest = Some(format!("Loading {}", url)),
                    ViewerEvent::Progress(percent) => latest = Some(format!("Loading {:.0}%", percent)),
                    ViewerEvent::Ready { stats, .. } => {
                        latest = Some(format!(
                            "{} meshes, {} triangles",
                            stats.mesh_count, stats.triangle_count
                        ))
                    }
                    ViewerEvent::Error(kind, message) => {
                        latest = Some(format!("{}: {}", kind, message))
                    }
                    ViewerEvent::Disposed => {}
                }
            }
        }
        if let Some(status) = latest {
            self.set_status(status);
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        if code == KeyCode::Escape {
            event_loop.exit();
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match code {
            KeyCode::KeyW => {
                let enabled = !session.wireframe();
                session.set_wireframe(enabled);
            }
            KeyCode::KeyR => {
                let enabled = !session.auto_rotate();
                session.set_auto_rotate(enabled);
            }
            KeyCode::KeyC => session.reset_camera(),
            _ => {}
        }
    }

    fn handle_cursor(&mut self, position: PhysicalPosition<f64>) {
        let last = self.pointer.cursor.replace(position);
        let (Some(last), Some(session)) = (last, self.session.as_mut()) else {
            return;
        };
        let dx = (position.x - last.x) as f32;
        let dy = (position.y - last.y) as f32;

        if self.pointer.rotating {
            session.controls_mut().rotate(dx, dy);
        } else if self.pointer.panning {
            session.controls_mut().pan(dx, dy);
        }
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title(self.config.window.title.clone())
                .with_inner_size(winit::dpi::LogicalSize::new(
                    self.config.window.width,
                    self.config.window.height,
                )),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.create_session(window.clone()) {
            log::error!("failed to initialize renderer: {}", e);
            event_loop.exit();
            return;
        }
        self.window = Some(window);
        let status = self.status.clone();
        self.set_status(status);

        if let Some(reference) = self.queued.take() {
            self.start_load(reference);
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::TaskProgress(record) => self.set_status(describe_record(&record)),
            AppEvent::ModelResolved(reference) => self.start_load(reference),
            AppEvent::LoadFinished(outcome) => {
                if let Some(session) = self.session.as_mut() {
                    session.finish_load(outcome);
                }
            }
            AppEvent::Failed(message) => {
                log::error!("{}", message);
                self.set_status(message);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.pointer.rotating = pressed,
                    MouseButton::Right | MouseButton::Middle => self.pointer.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.handle_cursor(position),
            WindowEvent::CursorLeft { .. } => self.pointer = PointerState::default(),
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                if let Some(session) = self.session.as_mut() {
                    session.controls_mut().zoom(lines);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(session) = self.session.as_mut() {
                    session.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(session) = self.session.as_mut() {
                    self.render_loop.tick(session);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.drain_viewer_events();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.resolve_cancel.cancel();
        self.render_loop.stop();
        if let Some(session) = self.session.as_mut() {
            session.dispose();
        }
    }
}

fn run_windowed(
    cli: Cli,
    config: ViewerConfig,
    client: HttpClient,
    runtime: tokio::runtime::Runtime,
) -> anyhow::Result<()> {
    let event_loop = EventLoop::<AppEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let proxy = event_loop.create_proxy();
    let resolve_cancel = CancelToken::new();

    let task_proxy = proxy.clone();
    let task_client = client.clone();
    let task_cancel = resolve_cancel.clone();
    let poll = config.poll;
    runtime.spawn(async move {
        let progress_proxy = task_proxy.clone();
        let result = resolve_reference(&cli.command, &task_client, poll, &task_cancel, move |record| {
            let _ = progress_proxy.send_event(AppEvent::TaskProgress(record.clone()));
        })
        .await;

        let event = match result {
            Ok(reference) => AppEvent::ModelResolved(reference),
            Err(err) => AppEvent::Failed(err.to_string()),
        };
        let _ = task_proxy.send_event(event);
    });

    let fetcher = AssetFetcher::new(Arc::new(client));
    let mut app = App::new(config, runtime.handle().clone(), fetcher, proxy, resolve_cancel);

    println!("Mesh Viewer - drag to orbit, right-drag to pan, scroll to zoom");
    println!("  W wireframe, R auto-rotate, C reset camera, Escape to quit");
    event_loop.run_app(&mut app)?;
    drop(app);

    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ViewerConfig> {
    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .init();

    let config = load_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("viewer-io")
        .build()
        .context("failed to start async runtime")?;
    let client = HttpClient::new(&config.http.api_base, config.http_timeout())?;

    if cli.no_window {
        return runtime.block_on(run_headless(&cli, &config, client));
    }
    run_windowed(cli, config, client, runtime)
}
