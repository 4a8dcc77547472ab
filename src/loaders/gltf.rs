use base64::Engine;
use glam::{Mat3, Mat4, Vec3};

use crate::error::{Result, ViewerError};
use crate::scene::{compute_vertex_normals, Material, MeshData, SceneGraph};

/// Where the bytes of one glTF buffer come from
#[derive(Debug, Clone, PartialEq)]
pub enum BufferSource {
    /// Bytes already in hand (GLB binary chunk or base64 data URI)
    Ready(Vec<u8>),
    /// URI to fetch, relative to the asset
    External(String),
}

/// Parsed glTF document whose buffers may still need fetching
pub struct GltfAsset {
    document: gltf::Document,
    blob: Option<Vec<u8>>,
}

impl GltfAsset {
    /// Parse a `.glb` container or `.gltf` JSON document
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        log::debug!(
            "glTF parsed: {} scenes, {} nodes, {} meshes, {} buffers",
            gltf.document.scenes().count(),
            gltf.document.nodes().count(),
            gltf.document.meshes().count(),
            gltf.document.buffers().count()
        );
        Ok(Self {
            document: gltf.document,
            blob: gltf.blob,
        })
    }

    /// Buffer sources in document order; the GLB chunk is moved out of the asset
    pub fn take_buffer_sources(&mut self) -> Result<Vec<BufferSource>> {
        let mut blob = self.blob.take();
        self.document
            .buffers()
            .map(|buffer| match buffer.source() {
                gltf::buffer::Source::Bin => blob
                    .take()
                    .map(BufferSource::Ready)
                    .ok_or_else(|| ViewerError::Decode("GLB binary chunk is missing".into())),
                gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                    decode_data_uri(uri).map(BufferSource::Ready)
                }
                gltf::buffer::Source::Uri(uri) => Ok(BufferSource::External(uri.to_string())),
            })
            .collect()
    }

    /// Build the scene graph once every buffer is available
    pub fn into_scene(self, buffers: Vec<Vec<u8>>) -> Result<SceneGraph> {
        for buffer in self.document.buffers() {
            let data = buffers.get(buffer.index()).ok_or_else(|| {
                ViewerError::Decode(format!("buffer {} was not provided", buffer.index()))
            })?;
            if data.len() < buffer.length() {
                return Err(ViewerError::Decode(format!(
                    "buffer {} is truncated: {} of {} bytes",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                )));
            }
        }

        let mut scene = SceneGraph::new();
        for material in self.document.materials() {
            scene.add_material(Material::new(
                material.name().unwrap_or("material"),
                material.pbr_metallic_roughness().base_color_factor(),
            ));
        }
        let mut decoder = SceneDecoder {
            buffers: &buffers,
            scene,
            default_material: None,
        };

        match self
            .document
            .default_scene()
            .or_else(|| self.document.scenes().next())
        {
            Some(root) => {
                for node in root.nodes() {
                    decoder.process_node(&node, &Mat4::IDENTITY)?;
                }
            }
            None => {
                for mesh in self.document.meshes() {
                    decoder.process_mesh(&mesh, &Mat4::IDENTITY)?;
                }
            }
        }

        Ok(decoder.scene)
    }
}

/// Decode a self-contained `.glb` (or `.gltf` with embedded buffers)
pub fn load_gltf_slice(bytes: &[u8]) -> Result<SceneGraph> {
    let mut asset = GltfAsset::parse(bytes)?;
    let buffers = asset
        .take_buffer_sources()?
        .into_iter()
        .map(|source| match source {
            BufferSource::Ready(data) => Ok(data),
            BufferSource::External(uri) => Err(ViewerError::Decode(format!(
                "external buffer '{}' cannot be resolved without a base URL",
                uri
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    asset.into_scene(buffers)
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| ViewerError::Decode("malformed data URI".into()))?;
    if !header.ends_with(";base64") {
        return Err(ViewerError::Decode(format!(
            "unsupported data URI encoding: {}",
            header
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ViewerError::Decode(format!("invalid base64 buffer: {}", e)))
}

struct SceneDecoder<'b> {
    buffers: &'b [Vec<u8>],
    scene: SceneGraph,
    default_material: Option<usize>,
}

impl SceneDecoder<'_> {
    /// Recursively processes glTF nodes
    fn process_node(&mut self, node: &gltf::Node, parent_transform: &Mat4) -> Result<()> {
        let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
        let global_transform = *parent_transform * local_transform;

        if let Some(mesh) = node.mesh() {
            self.process_mesh(&mesh, &global_transform)?;
        }

        for child in node.children() {
            self.process_node(&child, &global_transform)?;
        }

        Ok(())
    }

    fn process_mesh(&mut self, mesh: &gltf::Mesh, transform: &Mat4) -> Result<()> {
        let normal_matrix = Mat3::from_mat4(*transform);
        let normal_matrix = if normal_matrix.determinant().abs() > f32::EPSILON {
            Some(normal_matrix.inverse().transpose())
        } else {
            None
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "skipping {:?} primitive in mesh {:?}",
                    primitive.mode(),
                    mesh.name()
                );
                continue;
            }

            let buffers = self.buffers;
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| ViewerError::Decode("mesh primitive has no positions".into()))?
                .map(|p| transform.transform_point3(Vec3::from_array(p)))
                .collect();
            if positions.is_empty() {
                continue;
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
                return Err(ViewerError::Decode(format!(
                    "index {} out of range for {} vertices",
                    bad,
                    positions.len()
                )));
            }
            let indices = indices[..indices.len() - indices.len() % 3].to_vec();

            let normals = match (reader.read_normals(), normal_matrix) {
                (Some(normals), Some(matrix)) => normals
                    .map(|n| (matrix * Vec3::from_array(n)).normalize_or_zero())
                    .collect(),
                _ => compute_vertex_normals(&positions, &indices),
            };

            let material = match primitive.material().index() {
                Some(index) => index,
                None => self.default_material(),
            };

            let name = mesh.name().unwrap_or("mesh");
            self.scene.add_mesh(
                MeshData::new(name, positions, indices)
                    .with_normals(normals)
                    .with_material(material),
            );
        }

        Ok(())
    }

    fn default_material(&mut self) -> usize {
        match self.default_material {
            Some(index) => index,
            None => {
                let index = self.scene.add_material(Material::default());
                self.default_material = Some(index);
                index
            }
        }
    }
}
