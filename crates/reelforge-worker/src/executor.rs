//! Job executor.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use reelforge_models::WorkerToken;

use crate::config::WorkerConfig;
use crate::context::JobContext;
use crate::error::WorkerResult;
use crate::registry::ProcessorRegistry;

/// Polls the store for pending jobs and runs them through the registry.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<JobContext>,
    registry: Arc<ProcessorRegistry>,
    semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    token: WorkerToken,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, ctx: JobContext, registry: ProcessorRegistry) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);

        Self {
            config,
            ctx: Arc::new(ctx),
            registry: Arc::new(registry),
            semaphore,
            shutdown,
            token: WorkerToken::new(),
        }
    }

    /// The worker token this executor claims jobs under.
    pub fn token(&self) -> &WorkerToken {
        &self.token
    }

    /// Start the executor. Returns after shutdown and graceful drain.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            worker = %self.token,
            max_concurrent = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                _ = poll.tick() => {
                    self.consume_pending().await;
                }
            }
        }

        info!("Waiting for in-flight jobs to complete");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!("Shutdown timeout elapsed with jobs still in flight");
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Pull one batch of pending jobs and run each under a permit.
    async fn consume_pending(&self) {
        let available = self.semaphore.available_permits();
        if available == 0 {
            return;
        }

        let batch = available.min(self.config.poll_batch_size);
        let jobs = self.ctx.store.list_pending(batch).await;
        if jobs.is_empty() {
            return;
        }

        debug!(count = jobs.len(), "Picked up pending jobs");

        for job in jobs {
            // Leave jobs this worker has no processor for to a worker
            // that does; burning a permit on them would just spin.
            if !self.registry.is_registered(job.job_type) {
                debug!(job_id = %job.id, job_type = %job.job_type, "No processor registered, skipping");
                continue;
            }
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let ctx = Arc::clone(&self.ctx);
            let registry = Arc::clone(&self.registry);
            let token = self.token.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let job_id = job.id.clone();
                match registry.dispatch(&ctx, &job, &token).await {
                    Ok(()) => {}
                    // Another worker got there first; nothing to do.
                    Err(e) if e.is_claim_race() => {
                        debug!(job_id = %job_id, "Lost claim race, skipping");
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Job failed");
                    }
                }
            });
        }
    }

    /// Wait for all in-flight jobs to release their permits.
    async fn wait_for_jobs(&self) {
        loop {
            if self.semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
