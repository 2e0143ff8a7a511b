//! Shared processing context.

use std::sync::Arc;

use reelforge_models::{JobId, WorkerToken};
use reelforge_store::JobStore;

use crate::error::{WorkerError, WorkerResult};
use crate::provider::{GenerationProvider, ObjectStorage};

/// Everything a processor needs to run a job.
#[derive(Clone)]
pub struct JobContext {
    pub store: JobStore,
    pub provider: Arc<dyn GenerationProvider>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl JobContext {
    pub fn new(
        store: JobStore,
        provider: Arc<dyn GenerationProvider>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            store,
            provider,
            storage,
        }
    }

    /// Report progress for a claimed job.
    pub async fn report(
        &self,
        job_id: &JobId,
        progress: u8,
        message: impl Into<String>,
        token: &WorkerToken,
    ) -> WorkerResult<()> {
        self.store
            .report_progress(job_id, progress, Some(message.into()), token)
            .await?;
        Ok(())
    }

    /// Bail out if the job has been cancelled.
    ///
    /// Processors call this between steps; cancellation is cooperative.
    pub async fn check_cancelled(&self, job_id: &JobId) -> WorkerResult<()> {
        if self.store.is_cancelled(job_id).await {
            return Err(WorkerError::Cancelled);
        }
        Ok(())
    }
}
