pub mod cancel;
pub mod clock;
pub mod gpu_context;
pub mod mesh_renderer;

pub use cancel::CancelToken;
pub use clock::Clock;
pub use gpu_context::{GpuContext, SurfaceTarget};
pub use mesh_renderer::{GpuMesh, WgpuBackend};
