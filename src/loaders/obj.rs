use std::io::Cursor;

use glam::Vec3;

use crate::error::Result;
use crate::scene::{Material, MeshData, SceneGraph};

/// Decode Wavefront OBJ text; `mtllib` references are not followed
pub fn load_obj_slice(bytes: &[u8]) -> Result<SceneGraph> {
    let (models, _materials) = tobj::load_obj_buf(
        &mut Cursor::new(bytes),
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |path| {
            log::debug!("not loading OBJ material library {:?}", path);
            Err(tobj::LoadError::OpenFileFailed)
        },
    )?;

    if models.is_empty() {
        log::debug!("OBJ has no objects");
    }

    let mut scene = SceneGraph::new();
    let material = scene.add_material(Material::default());

    for model in models {
        let mesh = model.mesh;
        let positions: Vec<Vec3> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();
        if positions.is_empty() {
            continue;
        }

        let mut data = MeshData::new(model.name, positions, mesh.indices).with_material(material);
        if mesh.normals.len() == mesh.positions.len() {
            let normals = mesh
                .normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2]).normalize_or_zero())
                .collect();
            data = data.with_normals(normals);
        }
        scene.add_mesh(data);
    }

    log::debug!("OBJ decoded: {:?}", scene.stats());
    Ok(scene)
}
