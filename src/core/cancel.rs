use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Result, ViewerError};

/// Cooperative cancellation shared between an operation and its owner
///
/// Clones observe the same flag. Once cancelled a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Check the token before doing anything
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ViewerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drive `fut` until it finishes or the token is cancelled.
    ///
    /// On cancellation `fut` is dropped, which abandons whatever request or
    /// timer it was waiting on.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ViewerError::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
