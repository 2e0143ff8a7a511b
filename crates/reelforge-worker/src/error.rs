//! Worker error types.

use reelforge_models::JobType;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No processor registered for job type '{0}'")]
    UnknownJobType(JobType),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    Store(#[from] reelforge_store::StoreError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the error is a cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }

    /// Whether the error stems from losing a claim race. These are expected
    /// under concurrent workers and should not be logged as failures.
    pub fn is_claim_race(&self) -> bool {
        matches!(self, WorkerError::Store(e) if e.is_claim_race())
    }
}
