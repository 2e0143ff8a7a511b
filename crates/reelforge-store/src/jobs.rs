//! Job store with a guarded status state machine.
//!
//! All transitions are compare-and-set against the stored status under one
//! write lock, never unconditional overwrites. Claiming is the single
//! serialization point that gives at-most-one concurrent execution per job:
//! of N workers racing to claim, exactly one transitions the status and the
//! rest observe `AlreadyClaimed`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use reelforge_models::{
    Job, JobId, JobInput, JobOutput, JobSnapshot, JobStatus, WorkerToken,
};

use crate::error::{StoreError, StoreResult};

/// Capacity of the store's mutation event channel.
///
/// Subscribers that fall further behind than this resync from
/// `list_for_user` rather than replaying history.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A committed job mutation, as observed by subscribers.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// Owning user of the mutated job
    pub user_id: String,
    /// State of the job after the mutation
    pub snapshot: JobSnapshot,
}

struct JobTable {
    jobs: HashMap<JobId, Job>,
}

/// The `jobs` table and its state machine.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<RwLock<JobTable>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    /// Create an empty job store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(JobTable {
                jobs: HashMap::new(),
            })),
            events,
        }
    }

    /// Subscribe to committed mutations.
    ///
    /// Events for the same job are delivered in commit order; they are sent
    /// while the table lock is still held.
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Create a new pending job.
    pub async fn create(
        &self,
        user_id: impl Into<String>,
        project_id: Option<String>,
        input: JobInput,
    ) -> Job {
        let job = Job::new(user_id, project_id, input);
        let mut table = self.inner.write().await;
        table.jobs.insert(job.id.clone(), job.clone());
        self.emit(&job);
        debug!(job_id = %job.id, job_type = %job.job_type, "Created job");
        job
    }

    /// Get a job by id.
    pub async fn get(&self, job_id: &JobId) -> Option<Job> {
        self.inner.read().await.jobs.get(job_id).cloned()
    }

    /// Current snapshots of all jobs belonging to a user.
    ///
    /// Used by the broadcaster to resync a lagging subscriber and by the
    /// query API.
    pub async fn list_for_user(&self, user_id: &str) -> Vec<JobSnapshot> {
        let table = self.inner.read().await;
        let mut snapshots: Vec<JobSnapshot> = table
            .jobs
            .values()
            .filter(|j| j.user_id == user_id)
            .map(Job::snapshot)
            .collect();
        snapshots.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        snapshots
    }

    /// Pending jobs in creation order, up to `limit`.
    ///
    /// Worker backlog discovery; claiming decides who actually runs them.
    pub async fn list_pending(&self, limit: usize) -> Vec<Job> {
        let table = self.inner.read().await;
        let mut pending: Vec<&Job> = table
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.into_iter().take(limit).cloned().collect()
    }

    /// Claim a pending job for one processing attempt.
    ///
    /// Transitions `pending -> processing` and records the claiming token.
    /// Fails with `AlreadyClaimed` if the status is anything but pending,
    /// so of N racing claims exactly one succeeds.
    pub async fn claim(&self, job_id: &JobId, token: &WorkerToken) -> StoreResult<Job> {
        let mut table = self.inner.write().await;
        let job = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.clone()))?;

        if job.status != JobStatus::Pending {
            return Err(StoreError::AlreadyClaimed { status: job.status });
        }

        job.status = JobStatus::Processing;
        job.claimed_by = Some(token.clone());
        job.updated_at = Utc::now();
        let claimed = job.clone();
        self.emit(&claimed);
        debug!(job_id = %job_id, token = %token, "Claimed job");
        Ok(claimed)
    }

    /// Report progress for a processing job.
    ///
    /// Only the holder of the current claim may report; progress is clamped
    /// non-decreasing so a late-arriving lower tick never rolls it back.
    pub async fn report_progress(
        &self,
        job_id: &JobId,
        progress: u8,
        message: Option<String>,
        token: &WorkerToken,
    ) -> StoreResult<()> {
        let mut table = self.inner.write().await;
        let job = Self::processing_under_token(&mut table, job_id, token)?;

        job.progress = job.progress.max(progress.min(100));
        if message.is_some() {
            job.progress_message = message;
        }
        job.updated_at = Utc::now();
        let updated = job.clone();
        self.emit(&updated);
        Ok(())
    }

    /// Complete a processing job with its result.
    pub async fn complete(
        &self,
        job_id: &JobId,
        result: JobOutput,
        token: &WorkerToken,
    ) -> StoreResult<()> {
        let mut table = self.inner.write().await;
        let job = Self::processing_under_token(&mut table, job_id, token)?;

        job.status = JobStatus::Completed;
        job.progress = 100;
        job.result = Some(result);
        job.updated_at = Utc::now();
        let updated = job.clone();
        self.emit(&updated);
        debug!(job_id = %job_id, "Completed job");
        Ok(())
    }

    /// Fail a processing job with an error message.
    pub async fn fail(
        &self,
        job_id: &JobId,
        error: impl Into<String>,
        token: &WorkerToken,
    ) -> StoreResult<()> {
        let mut table = self.inner.write().await;
        let job = Self::processing_under_token(&mut table, job_id, token)?;

        job.status = JobStatus::Failed;
        job.error = Some(error.into());
        job.updated_at = Utc::now();
        let updated = job.clone();
        self.emit(&updated);
        debug!(job_id = %job_id, "Failed job");
        Ok(())
    }

    /// Cancel a pending or processing job.
    ///
    /// Processors observe cancellation cooperatively via `is_cancelled`;
    /// the store does not interrupt running work.
    pub async fn cancel(&self, job_id: &JobId) -> StoreResult<()> {
        let mut table = self.inner.write().await;
        let job = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.clone()))?;

        if !job.status.can_transition_to(JobStatus::Cancelled) {
            return Err(StoreError::InvalidTransition {
                from: job.status,
                to: JobStatus::Cancelled,
            });
        }

        job.status = JobStatus::Cancelled;
        job.updated_at = Utc::now();
        let updated = job.clone();
        self.emit(&updated);
        debug!(job_id = %job_id, "Cancelled job");
        Ok(())
    }

    /// Whether a job has been cancelled.
    ///
    /// Unknown jobs read as cancelled so an orphaned processor stops.
    pub async fn is_cancelled(&self, job_id: &JobId) -> bool {
        match self.inner.read().await.jobs.get(job_id) {
            Some(job) => job.status == JobStatus::Cancelled,
            None => true,
        }
    }

    /// Look up a job that must be processing under the given token.
    fn processing_under_token<'t>(
        table: &'t mut JobTable,
        job_id: &JobId,
        token: &WorkerToken,
    ) -> StoreResult<&'t mut Job> {
        let job = table
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.clone()))?;

        if job.status != JobStatus::Processing {
            return Err(StoreError::InvalidTransition {
                from: job.status,
                to: JobStatus::Processing,
            });
        }
        if job.claimed_by.as_ref() != Some(token) {
            return Err(StoreError::StaleClaim(job_id.clone()));
        }
        Ok(job)
    }

    fn emit(&self, job: &Job) {
        // No receivers is fine; the send result only reports that.
        let _ = self.events.send(StoreEvent {
            user_id: job.user_id.clone(),
            snapshot: job.snapshot(),
        });
    }
}
