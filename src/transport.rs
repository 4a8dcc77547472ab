use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;

use crate::error::{Result, ViewerError};
use crate::traits::{AssetTransport, ProgressSink, TaskStatusSource};
use crate::types::{GenerationAck, GenerationRequest, TaskRecord};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for `{api_base}/status/{taskId}`, `{api_base}/generate` and asset URLs
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    api_base: Url,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(api_base: &str, request_timeout: Duration) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| ViewerError::Config(format!("invalid API base '{}': {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(ViewerError::Config(format!(
                "API base '{}' cannot carry a path",
                api_base
            )));
        }

        // Downloads can take longer than a status call, so only connecting is bounded here
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| ViewerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base,
            request_timeout,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// URL of an API route below the base
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ViewerError::Config(format!("API base '{}' cannot carry a path", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Submit a generation request and return the acknowledged task
    pub async fn submit_generation(&self, request: &GenerationRequest) -> Result<GenerationAck> {
        if request.prompt.trim().is_empty() {
            return Err(ViewerError::Config("prompt is required".into()));
        }

        let url = self.endpoint(&["generate"])?;
        log::info!(
            "submitting generation: style {:?}, format {}",
            request.style,
            request.format
        );

        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        let ack: GenerationAck = serde_json::from_slice(&body)?;
        log::info!("generation accepted as task {}", ack.task_id);
        Ok(ack)
    }

    async fn download_http(&self, url: &str, progress: ProgressSink<'_>) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let mut response = check_status(response).await?;

        let total = response.content_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        progress(0, total);

        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            progress(data.len() as u64, total);
        }

        Ok(data)
    }
}

#[async_trait]
impl AssetTransport for HttpClient {
    async fn download(&self, url: &str, progress: ProgressSink<'_>) -> Result<Vec<u8>> {
        match local_path(url) {
            Some(path) => {
                let data = tokio::fs::read(&path).await.map_err(|e| {
                    ViewerError::Network(format!("failed to read {}: {}", path, e))
                })?;
                let len = data.len() as u64;
                progress(len, Some(len));
                Ok(data)
            }
            None => self.download_http(url, progress).await,
        }
    }
}

#[async_trait]
impl TaskStatusSource for HttpClient {
    async fn query(&self, task_id: &str) -> Result<TaskRecord> {
        let url = self.endpoint(&["status", task_id])?;
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Filesystem path for `file://` URLs and bare paths, `None` for remote URLs
fn local_path(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Some(rest.to_string());
    }
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme().len() > 1 => None,
        // Unparseable or a drive letter such as `C:`
        _ => Some(Path::new(url).to_string_lossy().into_owned()),
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.or(body.message));

    Err(ViewerError::Network(match detail {
        Some(detail) => format!("{} ({})", detail, status),
        None => format!("server responded with {}", status),
    }))
}
