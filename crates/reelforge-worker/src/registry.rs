//! Processor registry and dispatch.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use reelforge_models::{Job, JobOutput, JobType, WorkerToken};
use reelforge_store::StoreError;

use crate::context::JobContext;
use crate::error::{WorkerError, WorkerResult};

/// Handler for one job type.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// The job type this processor handles.
    fn job_type(&self) -> JobType;

    /// Run the job to completion, returning its typed result.
    ///
    /// The job is already claimed under `token` when this is called.
    async fn process(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<JobOutput>;
}

/// Maps job types to their processors.
#[derive(Default)]
pub struct ProcessorRegistry {
    handlers: HashMap<JobType, Arc<dyn JobProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for its job type.
    ///
    /// Registering a second processor for the same type replaces the first.
    pub fn register(&mut self, processor: Arc<dyn JobProcessor>) {
        let job_type = processor.job_type();
        if self.handlers.insert(job_type, processor).is_some() {
            warn!(job_type = %job_type, "Replacing existing processor registration");
        }
    }

    /// Look up the processor for a job type.
    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobProcessor>> {
        self.handlers.get(&job_type).cloned()
    }

    pub fn is_registered(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    /// Job types with a registered processor.
    pub fn registered_types(&self) -> Vec<JobType> {
        self.handlers.keys().copied().collect()
    }

    /// Claim and run one job, recording its outcome in the store.
    ///
    /// An unregistered type is a caller configuration error: dispatch
    /// returns `UnknownJobType` without touching the job, so it stays
    /// `pending` for a worker that does carry the processor. Once
    /// claimed, processor errors and panics both land the job in
    /// `failed`; the store never stays stuck in `processing` because of
    /// a crashing handler. Lost claim races surface as `Err` with
    /// [`WorkerError::is_claim_race`] set so callers can skip them quietly.
    pub async fn dispatch(
        &self,
        ctx: &JobContext,
        job: &Job,
        token: &WorkerToken,
    ) -> WorkerResult<()> {
        let Some(processor) = self.get(job.job_type) else {
            return Err(WorkerError::UnknownJobType(job.job_type));
        };

        let claimed = ctx.store.claim(&job.id, token).await?;

        let outcome = AssertUnwindSafe(processor.process(ctx, &claimed, token))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(output)) => {
                ctx.store.complete(&claimed.id, output, token).await?;
                debug!(job_id = %claimed.id, "Job completed");
                Ok(())
            }
            Ok(Err(e)) if e.is_cancelled() => {
                // The store already holds the cancelled terminal state.
                debug!(job_id = %claimed.id, "Job cancelled mid-run");
                Ok(())
            }
            Ok(Err(e)) => {
                self.record_failure(ctx, &claimed, token, e.to_string()).await;
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic);
                error!(job_id = %claimed.id, panic = %message, "Processor panicked");
                let err = WorkerError::job_failed(format!("processor panicked: {message}"));
                self.record_failure(ctx, &claimed, token, err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Transition a job to failed, tolerating a concurrent cancel.
    async fn record_failure(&self, ctx: &JobContext, job: &Job, token: &WorkerToken, error: String) {
        match ctx.store.fail(&job.id, error, token).await {
            Ok(()) => {}
            Err(StoreError::InvalidTransition { .. }) | Err(StoreError::StaleClaim(_)) => {
                debug!(job_id = %job.id, "Job reached a terminal state before failure was recorded");
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to record job failure");
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
