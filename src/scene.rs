use glam::Vec3;

use crate::math::AABB;
use crate::types::Vertex;

pub const DEFAULT_BASE_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// Surface appearance of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
}

impl Material {
    pub fn new(name: impl Into<String>, base_color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            base_color,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default", DEFAULT_BASE_COLOR)
    }
}

/// Triangle mesh in model space; positions already carry node transforms
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Index into [`SceneGraph::materials`]
    pub material: usize,
}

impl MeshData {
    /// Mesh with face normals computed from the triangles
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let normals = compute_vertex_normals(&positions, &indices);
        Self {
            name: name.into(),
            positions,
            normals,
            indices,
            material: 0,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        if normals.len() == self.positions.len() {
            self.normals = normals;
        }
        self
    }

    pub fn with_material(mut self, material: usize) -> Self {
        self.material = material;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<AABB> {
        AABB::from_points(self.positions.iter().copied())
    }

    /// Interleaved vertex buffer contents
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(self.normals.iter().chain(std::iter::repeat(&Vec3::Y)))
            .map(|(p, n)| Vertex {
                position: p.to_array(),
                normal: n.to_array(),
            })
            .collect()
    }

    /// Line-list indices for the triangle edges, used for wireframe drawing
    pub fn edge_indices(&self) -> Vec<u32> {
        self.indices
            .chunks_exact(3)
            .flat_map(|t| [t[0], t[1], t[1], t[2], t[2], t[0]])
            .collect()
    }
}

/// Area-weighted vertex normals; vertices on no triangle point up
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals
        .into_iter()
        .map(|n| {
            let n = n.normalize_or_zero();
            if n == Vec3::ZERO {
                Vec3::Y
            } else {
                n
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneStats {
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Decoded model ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<Material>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_mesh(&mut self, mesh: MeshData) {
        self.meshes.push(mesh);
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.positions.is_empty())
    }

    /// Material of a mesh, falling back to the default material
    pub fn material_of(&self, mesh: &MeshData) -> Material {
        self.materials
            .get(mesh.material)
            .cloned()
            .unwrap_or_default()
    }

    /// Bounds over every mesh; a zero box when there is no geometry
    pub fn bounds(&self) -> AABB {
        self.meshes
            .iter()
            .filter_map(MeshData::bounds)
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or(AABB::ZERO)
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            mesh_count: self.meshes.len(),
            vertex_count: self.meshes.iter().map(MeshData::vertex_count).sum(),
            triangle_count: self.meshes.iter().map(MeshData::triangle_count).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub intensity: f32,
}

/// Fixed lighting of the viewer scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.5,
            key: DirectionalLight {
                position: Vec3::new(5.0, 10.0, 5.0),
                intensity: 0.8,
            },
            fill: DirectionalLight {
                position: Vec3::new(-5.0, 5.0, -5.0),
                intensity: 0.4,
            },
        }
    }
}

/// Ground grid as line-list vertices on the y = 0 plane
pub fn ground_grid(size: f32, divisions: u32) -> Vec<Vertex> {
    let half = size / 2.0;
    let step = size / divisions.max(1) as f32;

    (0..=divisions)
        .flat_map(|i| {
            let offset = -half + i as f32 * step;
            [
                [offset, 0.0, -half],
                [offset, 0.0, half],
                [-half, 0.0, offset],
                [half, 0.0, offset],
            ]
        })
        .map(|position| Vertex {
            position,
            normal: [0.0, 1.0, 0.0],
        })
        .collect()
}
