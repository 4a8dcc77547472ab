pub mod gltf;
pub mod obj;

pub use self::gltf::{load_gltf_slice, BufferSource, GltfAsset};
pub use self::obj::load_obj_slice;
