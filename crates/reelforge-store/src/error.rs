//! Store error types.

use reelforge_models::{JobId, JobStatus};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job already claimed (status: {status})")]
    AlreadyClaimed { status: JobStatus },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Stale worker token for job {0}")]
    StaleClaim(JobId),

    #[error("Credit account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Invalid ledger operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Claim races are expected under concurrent workers; callers skip them.
    pub fn is_claim_race(&self) -> bool {
        matches!(self, StoreError::AlreadyClaimed { .. })
    }

    /// Admission errors are surfaced to the caller before any job mutation.
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            StoreError::InsufficientBalance { .. } | StoreError::AccountNotFound(_)
        )
    }
}
