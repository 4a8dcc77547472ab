use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Coarse classification of a [`ViewerError`], cheap to copy into state and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedFormat,
    Network,
    Decode,
    DegenerateGeometry,
    Cancelled,
    TaskFailed,
    TaskTimedOut,
    Gpu,
    Config,
    Disposed,
}

impl ErrorKind {
    /// Whether the caller should offer "try again" rather than "it failed"
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::TaskTimedOut | ErrorKind::Cancelled
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::UnsupportedFormat => "unsupported format",
            ErrorKind::Network => "network error",
            ErrorKind::Decode => "decode error",
            ErrorKind::DegenerateGeometry => "degenerate geometry",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::TaskFailed => "task failed",
            ErrorKind::TaskTimedOut => "task timed out",
            ErrorKind::Gpu => "gpu error",
            ErrorKind::Config => "configuration error",
            ErrorKind::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode model: {0}")]
    Decode(String),

    #[error("model has no extent to frame (empty or single-point geometry)")]
    DegenerateGeometry,

    #[error("operation cancelled")]
    Cancelled,

    #[error("model generation failed: {0}")]
    TaskFailed(String),

    #[error("task timed out after {attempts} attempts, please try again")]
    TaskTimedOut { attempts: u32 },

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("viewer session has been disposed")]
    Disposed,
}

impl ViewerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ViewerError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ViewerError::Network(_) => ErrorKind::Network,
            ViewerError::Decode(_) => ErrorKind::Decode,
            ViewerError::DegenerateGeometry => ErrorKind::DegenerateGeometry,
            ViewerError::Cancelled => ErrorKind::Cancelled,
            ViewerError::TaskFailed(_) => ErrorKind::TaskFailed,
            ViewerError::TaskTimedOut { .. } => ErrorKind::TaskTimedOut,
            ViewerError::Gpu(_) => ErrorKind::Gpu,
            ViewerError::Config(_) => ErrorKind::Config,
            ViewerError::Disposed => ErrorKind::Disposed,
        }
    }
}

impl From<reqwest::Error> for ViewerError {
    fn from(e: reqwest::Error) -> Self {
        ViewerError::Network(e.to_string())
    }
}

impl From<std::io::Error> for ViewerError {
    fn from(e: std::io::Error) -> Self {
        ViewerError::Network(e.to_string())
    }
}

impl From<gltf::Error> for ViewerError {
    fn from(e: gltf::Error) -> Self {
        ViewerError::Decode(format!("glTF: {}", e))
    }
}

impl From<tobj::LoadError> for ViewerError {
    fn from(e: tobj::LoadError) -> Self {
        ViewerError::Decode(format!("OBJ: {}", e))
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(e: serde_json::Error) -> Self {
        ViewerError::Decode(format!("JSON: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(ViewerError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            ViewerError::TaskTimedOut { attempts: 3 }.kind(),
            ErrorKind::TaskTimedOut
        );
        assert_eq!(
            ViewerError::UnsupportedFormat("fbx".into()).kind(),
            ErrorKind::UnsupportedFormat
        );
    }

    #[test]
    fn timeouts_are_retryable_but_failures_are_not() {
        assert!(ErrorKind::TaskTimedOut.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(!ErrorKind::TaskFailed.is_retryable());
        assert!(!ErrorKind::DegenerateGeometry.is_retryable());
    }

    #[test]
    fn task_failure_message_is_surfaced() {
        let err = ViewerError::TaskFailed("out of credits".into());
        assert_eq!(err.to_string(), "model generation failed: out of credits");
    }
}
