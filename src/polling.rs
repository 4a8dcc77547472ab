use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::CancelToken;
use crate::error::{Result, ViewerError};
use crate::traits::TaskStatusSource;
use crate::types::{ModelReference, TaskRecord, TaskStatus};

/// Transport failures in a row that abort polling
pub const MAX_CONSECUTIVE_TRANSPORT_ERRORS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_attempts: 60,
        }
    }
}

impl PollOptions {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Longest time polling can take, not counting query latency
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_attempts
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ViewerError::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// What to do after an attempt
#[derive(Debug, PartialEq)]
pub enum PollStep {
    Retry,
    Done(Result<TaskRecord>),
}

/// Attempt bookkeeping for one `poll` call
#[derive(Debug, Clone)]
pub struct PollSession {
    attempt: u32,
    max_attempts: u32,
    consecutive_errors: u32,
    cancelled: bool,
}

impl PollSession {
    pub fn new(options: &PollOptions) -> Self {
        Self {
            attempt: 0,
            max_attempts: options.max_attempts,
            consecutive_errors: 0,
            cancelled: false,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Count the attempt about to be issued and return its number (1-based)
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Evaluate the outcome of the current attempt
    pub fn advance(&mut self, outcome: Result<TaskRecord>) -> PollStep {
        match outcome {
            Ok(record) => {
                self.consecutive_errors = 0;
                match record.status {
                    TaskStatus::Succeeded => PollStep::Done(Ok(record)),
                    TaskStatus::Failed | TaskStatus::Expired => PollStep::Done(Err(
                        ViewerError::TaskFailed(record.failure_reason().to_string()),
                    )),
                    _ => self.retry_or_time_out(),
                }
            }
            Err(ViewerError::Cancelled) => {
                self.cancelled = true;
                PollStep::Done(Err(ViewerError::Cancelled))
            }
            Err(err) => {
                self.consecutive_errors += 1;
                log::warn!(
                    "status query failed ({} in a row): {}",
                    self.consecutive_errors,
                    err
                );
                if self.consecutive_errors >= MAX_CONSECUTIVE_TRANSPORT_ERRORS {
                    let err = match err {
                        ViewerError::Network(_) => err,
                        other => ViewerError::Network(other.to_string()),
                    };
                    PollStep::Done(Err(err))
                } else {
                    self.retry_or_time_out()
                }
            }
        }
    }

    fn retry_or_time_out(&self) -> PollStep {
        if self.attempt >= self.max_attempts {
            PollStep::Done(Err(ViewerError::TaskTimedOut {
                attempts: self.attempt,
            }))
        } else {
            PollStep::Retry
        }
    }
}

/// Resolves a task handle to a terminal status record
#[derive(Clone)]
pub struct PollingOrchestrator {
    source: Arc<dyn TaskStatusSource>,
}

impl PollingOrchestrator {
    pub fn new(source: Arc<dyn TaskStatusSource>) -> Self {
        Self { source }
    }

    /// Query `task_id` until it succeeds, fails, runs out of attempts or is cancelled.
    ///
    /// `on_progress` sees every record before it is evaluated. Once `cancel`
    /// fires, the pending wait is dropped and no further query is issued.
    pub async fn poll<F>(
        &self,
        task_id: &str,
        mut on_progress: F,
        options: PollOptions,
        cancel: &CancelToken,
    ) -> Result<TaskRecord>
    where
        F: FnMut(&TaskRecord) + Send,
    {
        options.validate()?;
        let mut session = PollSession::new(&options);
        log::info!(
            "polling task {} every {}ms, at most {} attempts",
            task_id,
            options.interval_ms,
            options.max_attempts
        );

        loop {
            let attempt = session.begin_attempt();
            let outcome = cancel.run(self.source.query(task_id)).await;

            if let Ok(record) = &outcome {
                log::debug!(
                    "task {} attempt {}: {:?} {:.0}%",
                    task_id,
                    attempt,
                    record.status,
                    record.progress_percent()
                );
                on_progress(record);
            }

            match session.advance(outcome) {
                PollStep::Done(result) => {
                    match &result {
                        Ok(_) => log::info!("task {} succeeded after {} attempts", task_id, attempt),
                        Err(err) => log::info!("task {} stopped after {} attempts: {}", task_id, attempt, err),
                    }
                    return result;
                }
                PollStep::Retry => {}
            }

            cancel
                .run(async {
                    tokio::time::sleep(options.interval()).await;
                    Ok(())
                })
                .await?;
        }
    }

    /// Poll until success and return the produced model
    pub async fn poll_for_model<F>(
        &self,
        task_id: &str,
        on_progress: F,
        options: PollOptions,
        cancel: &CancelToken,
    ) -> Result<(TaskRecord, ModelReference)>
    where
        F: FnMut(&TaskRecord) + Send,
    {
        let record = self.poll(task_id, on_progress, options, cancel).await?;
        let reference = ModelReference::from_task_record(&record).ok_or_else(|| {
            ViewerError::TaskFailed(format!("task {} finished without a model URL", task_id))
        })?;
        Ok((record, reference))
    }
}
