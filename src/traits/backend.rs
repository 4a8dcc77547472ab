use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::scene::{Material, MeshData};

/// The model part of a frame
pub struct DrawModel<'a, M> {
    pub meshes: &'a [M],
    pub transform: Mat4,
    pub wireframe: bool,
}

/// Everything one frame draws
pub struct DrawList<'a, M> {
    pub view_proj: Mat4,
    pub eye: Vec3,
    pub model: Option<DrawModel<'a, M>>,
}

/// GPU side of a viewer session
///
/// A backend hands out one `Mesh` per uploaded mesh and frees it only when
/// given back through [`RenderBackend::release_mesh`].
pub trait RenderBackend {
    type Mesh;

    fn upload_mesh(&mut self, mesh: &MeshData, material: &Material) -> Result<Self::Mesh>;

    fn release_mesh(&mut self, mesh: Self::Mesh);

    fn resize(&mut self, width: u32, height: u32);

    /// Width over height of the render target
    fn aspect(&self) -> f32;

    fn draw(&mut self, list: &DrawList<'_, Self::Mesh>) -> Result<()>;

    /// Stop presenting to the render target; later draws do nothing
    fn detach(&mut self);
}
