// Shared fakes and model builders for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use glam::Mat4;
use serde_json::json;

use mesh_viewer::error::{Result, ViewerError};
use mesh_viewer::fetcher::AssetFetcher;
use mesh_viewer::scene::{Material, MeshData};
use mesh_viewer::session::{SceneSession, SessionOptions};
use mesh_viewer::traits::{AssetTransport, DrawList, ProgressSink, RenderBackend, TaskStatusSource};
use mesh_viewer::types::{TaskRecord, TaskStatus};

// === Asset transport ===

#[derive(Clone)]
struct Route {
    response: Result<Vec<u8>>,
    delay: Option<Duration>,
}

/// In-memory asset server keyed by URL; unknown URLs fail with `Network`
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, bytes: impl Into<Vec<u8>>) {
        self.route(url, Ok(bytes.into()), None);
    }

    pub fn serve_delayed(&self, url: &str, bytes: impl Into<Vec<u8>>, delay: Duration) {
        self.route(url, Ok(bytes.into()), Some(delay));
    }

    pub fn fail(&self, url: &str, err: ViewerError) {
        self.route(url, Err(err), None);
    }

    fn route(&self, url: &str, response: Result<Vec<u8>>, delay: Option<Duration>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route { response, delay });
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetTransport for MockTransport {
    async fn download(&self, url: &str, progress: ProgressSink<'_>) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        let route = self.routes.lock().unwrap().get(url).cloned();

        let Some(route) = route else {
            return Err(ViewerError::Network(format!("HTTP 404 for {}", url)));
        };
        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        let bytes = route.response?;
        let total = bytes.len() as u64;
        progress(0, Some(total));
        progress(total / 2, Some(total));
        progress(total, Some(total));
        Ok(bytes)
    }
}

pub fn fetcher(transport: &Arc<MockTransport>) -> AssetFetcher {
    AssetFetcher::new(transport.clone())
}

// === Task status ===

/// Answers status queries from a fixed script, one entry per query
#[derive(Default)]
pub struct ScriptedStatusSource {
    script: Mutex<VecDeque<Result<TaskRecord>>>,
    queries: AtomicUsize,
}

impl ScriptedStatusSource {
    pub fn new(script: impl IntoIterator<Item = Result<TaskRecord>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            queries: AtomicUsize::new(0),
        })
    }

    /// Script of plain statuses for task `t1`
    pub fn statuses(statuses: &[TaskStatus]) -> Arc<Self> {
        Self::new(statuses.iter().map(|&s| Ok(TaskRecord::new("t1", s))))
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStatusSource for ScriptedStatusSource {
    async fn query(&self, task_id: &str) -> Result<TaskRecord> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ViewerError::Network(format!("no scripted status for {}", task_id))))
    }
}

// === Render backend ===

#[derive(Debug, Clone, Default)]
pub struct BackendCounters {
    pub uploaded: usize,
    pub released: usize,
    pub live: usize,
    pub draws: usize,
    pub model_draws: usize,
    pub last_wireframe: bool,
    pub last_transform: Option<Mat4>,
    pub detached: bool,
}

#[derive(Debug, PartialEq)]
pub struct FakeMesh {
    pub id: usize,
    pub triangles: usize,
}

/// Backend that only counts what it is asked to do
pub struct CountingBackend {
    counters: Arc<Mutex<BackendCounters>>,
    fail_upload: Option<usize>,
    size: (u32, u32),
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            counters: Arc::default(),
            fail_upload: None,
            size: (800, 600),
        }
    }

    /// Fail the upload with this zero-based index, counted over the backend's lifetime
    pub fn failing_upload(index: usize) -> Self {
        Self {
            fail_upload: Some(index),
            ..Self::new()
        }
    }

    pub fn counters(&self) -> BackendCounters {
        self.counters.lock().unwrap().clone()
    }

    pub fn handle(&self) -> Arc<Mutex<BackendCounters>> {
        self.counters.clone()
    }
}

impl RenderBackend for CountingBackend {
    type Mesh = FakeMesh;

    fn upload_mesh(&mut self, mesh: &MeshData, _material: &Material) -> Result<FakeMesh> {
        let mut counters = self.counters.lock().unwrap();
        let id = counters.uploaded;
        if self.fail_upload == Some(id) {
            return Err(ViewerError::Gpu(format!("out of memory uploading {}", mesh.name)));
        }
        counters.uploaded += 1;
        counters.live += 1;
        Ok(FakeMesh {
            id,
            triangles: mesh.triangle_count(),
        })
    }

    fn release_mesh(&mut self, _mesh: FakeMesh) {
        let mut counters = self.counters.lock().unwrap();
        counters.released += 1;
        counters.live -= 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn aspect(&self) -> f32 {
        self.size.0 as f32 / self.size.1 as f32
    }

    fn draw(&mut self, list: &DrawList<'_, FakeMesh>) -> Result<()> {
        let mut counters = self.counters.lock().unwrap();
        if counters.detached {
            return Ok(());
        }
        counters.draws += 1;
        if let Some(model) = &list.model {
            counters.model_draws += 1;
            counters.last_wireframe = model.wireframe;
            counters.last_transform = Some(model.transform);
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.counters.lock().unwrap().detached = true;
    }
}

pub fn session_with(
    backend: CountingBackend,
    transport: &Arc<MockTransport>,
) -> SceneSession<CountingBackend> {
    session_with_options(backend, transport, SessionOptions::default())
}

pub fn session_with_options(
    backend: CountingBackend,
    transport: &Arc<MockTransport>,
    options: SessionOptions,
) -> SceneSession<CountingBackend> {
    SceneSession::new(backend, fetcher(transport), options)
}

// === Model builders ===

/// Axis-aligned box centred on `center` with the given edge lengths
pub fn box_mesh(center: [f32; 3], size: [f32; 3]) -> (Vec<[f32; 3]>, Vec<u32>) {
    let h = [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0];
    let mut positions = Vec::with_capacity(8);
    for i in 0..8 {
        let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
        let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
        let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
        positions.push([
            center[0] + sx * h[0],
            center[1] + sy * h[1],
            center[2] + sz * h[2],
        ]);
    }
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    (positions, indices)
}

fn buffer_bytes(positions: &[[f32; 3]], indices: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(positions.len() * 12 + indices.len() * 4);
    for p in positions {
        for c in p {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in indices {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes
}

fn gltf_json(positions: &[[f32; 3]], indices: &[u32], buffer_uri: Option<&str>) -> serde_json::Value {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    let position_len = positions.len() * 12;
    let index_len = indices.len() * 4;

    let mut buffer = json!({ "byteLength": position_len + index_len });
    if let Some(uri) = buffer_uri {
        buffer["uri"] = json!(uri);
    }

    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "name": "box",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
        }],
        "buffers": [buffer],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": position_len, "target": 34962 },
            { "buffer": 0, "byteOffset": position_len, "byteLength": index_len, "target": 34963 }
        ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": 5126,
                "count": positions.len(),
                "type": "VEC3",
                "min": min,
                "max": max
            },
            {
                "bufferView": 1,
                "componentType": 5125,
                "count": indices.len(),
                "type": "SCALAR"
            }
        ]
    })
}

fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8], pad: u8) {
    let padded = (data.len() + 3) & !3;
    out.extend_from_slice(&(padded as u32).to_le_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.resize(out.len() + padded - data.len(), pad);
}

/// Binary glTF holding one indexed triangle mesh
pub fn glb(positions: &[[f32; 3]], indices: &[u32]) -> Vec<u8> {
    let json = gltf_json(positions, indices, None).to_string();
    let bin = buffer_bytes(positions, indices);

    let mut chunks = Vec::new();
    push_chunk(&mut chunks, b"JSON", json.as_bytes(), b' ');
    push_chunk(&mut chunks, b"BIN\0", &bin, 0);

    let mut out = Vec::with_capacity(12 + chunks.len());
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&((12 + chunks.len()) as u32).to_le_bytes());
    out.extend_from_slice(&chunks);
    out
}

/// Binary glTF of a box centred on `center`
pub fn box_glb(center: [f32; 3], size: [f32; 3]) -> Vec<u8> {
    let (positions, indices) = box_mesh(center, size);
    glb(&positions, &indices)
}

/// `.gltf` document plus the external buffer it references as `buffer_uri`
pub fn gltf_with_external_buffer(
    positions: &[[f32; 3]],
    indices: &[u32],
    buffer_uri: &str,
) -> (Vec<u8>, Vec<u8>) {
    let json = gltf_json(positions, indices, Some(buffer_uri)).to_string();
    (json.into_bytes(), buffer_bytes(positions, indices))
}

/// Wavefront OBJ with one named object per box
pub fn boxes_obj(boxes: &[([f32; 3], [f32; 3])]) -> String {
    let mut out = String::new();
    let mut base = 1;
    for (n, (center, size)) in boxes.iter().enumerate() {
        let (positions, indices) = box_mesh(*center, *size);
        out.push_str(&format!("o part{}\n", n));
        for p in &positions {
            out.push_str(&format!("v {} {} {}\n", p[0], p[1], p[2]));
        }
        for tri in indices.chunks(3) {
            out.push_str(&format!(
                "f {} {} {}\n",
                tri[0] + base,
                tri[1] + base,
                tri[2] + base
            ));
        }
        base += positions.len() as u32;
    }
    out
}
