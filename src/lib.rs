pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod fetcher;
pub mod frame;
pub mod framing;
pub mod loaders;
pub mod math;
pub mod polling;
pub mod render_loop;
pub mod scene;
pub mod session;
pub mod traits;
pub mod transport;
pub mod types;

pub use error::{ErrorKind, Result, ViewerError};
pub use fetcher::AssetFetcher;
pub use framing::{frame, FramingPlan};
pub use polling::{PollOptions, PollingOrchestrator};
pub use render_loop::RenderLoop;
pub use session::{SceneSession, SessionState, ViewerEvent};
pub use types::{ModelFormat, ModelReference, TaskRecord, TaskStatus};
