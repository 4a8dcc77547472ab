use async_trait::async_trait;

use crate::error::Result;
use crate::types::TaskRecord;

/// Download progress: bytes received and total bytes when known
pub type ProgressSink<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// Byte source for model assets
#[async_trait]
pub trait AssetTransport: Send + Sync {
    async fn download(&self, url: &str, progress: ProgressSink<'_>) -> Result<Vec<u8>>;
}

/// Status lookup for generation tasks
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn query(&self, task_id: &str) -> Result<TaskRecord>;
}
