//! Job records and their lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::payload::{JobInput, JobOutput};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token identifying one processing attempt.
///
/// Issued by the worker that claims a job; every subsequent mutation of
/// that job must present the same token. A token from a superseded attempt
/// is rejected by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct WorkerToken(pub String);

impl WorkerToken {
    /// Generate a new random worker token.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of generation work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Generate a narration script from a topic brief
    ScriptGeneration,
    /// Generate storyboard frames from a script
    StoryboardGeneration,
    /// Generate still images for scenes
    ImageGeneration,
    /// Generate a video segment for a scene
    VideoGeneration,
    /// Synthesize narration audio
    SpeechSynthesis,
    /// Render and export the final video
    VideoExport,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ScriptGeneration => "script_generation",
            JobType::StoryboardGeneration => "storyboard_generation",
            JobType::ImageGeneration => "image_generation",
            JobType::VideoGeneration => "video_generation",
            JobType::SpeechSynthesis => "speech_synthesis",
            JobType::VideoExport => "video_export",
        }
    }

    /// All job types, in dispatch-registration order.
    pub const ALL: [JobType; 6] = [
        JobType::ScriptGeneration,
        JobType::StoryboardGeneration,
        JobType::ImageGeneration,
        JobType::VideoGeneration,
        JobType::SpeechSynthesis,
        JobType::VideoExport,
    ];
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle status.
///
/// Transitions are monotonic along pending → processing → terminal;
/// terminal states have no outgoing edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker
    #[default]
    Pending,
    /// Job is being processed by the worker holding the claim
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Job was cancelled before completion
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Check whether a transition to `next` is allowed by the state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Processing) => true,
            (JobStatus::Pending, JobStatus::Cancelled) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (JobStatus::Processing, JobStatus::Failed) => true,
            (JobStatus::Processing, JobStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of asynchronous generation work with a tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning user
    pub user_id: String,

    /// Project this job belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Kind of work
    pub job_type: JobType,

    /// Current lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Typed input payload, decoded once at submission
    pub input: JobInput,

    /// Result payload, set only on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,

    /// Progress (0-100), non-decreasing while processing
    #[serde(default)]
    pub progress: u8,

    /// Human-readable progress message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,

    /// Error message, set only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Token of the processing attempt that owns this job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<WorkerToken>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job.
    ///
    /// The job type is derived from the input payload so the two can
    /// never disagree.
    pub fn new(user_id: impl Into<String>, project_id: Option<String>, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            project_id,
            job_type: input.job_type(),
            status: JobStatus::Pending,
            input,
            result: None,
            progress: 0,
            progress_message: None,
            error: None,
            claimed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reduced, client-facing view of the current state.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            job_type: self.job_type,
            status: self.status,
            progress: self.progress,
            progress_message: self.progress_message.clone(),
            error: self.error.clone(),
            project_id: self.project_id.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// The reduced view of a job pushed over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    /// Job ID
    pub id: JobId,
    /// Kind of work
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// Current status
    pub status: JobStatus,
    /// Progress (0-100)
    pub progress: u8,
    /// Human-readable progress message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Project this job belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// When this state was committed
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ScriptInput;

    fn script_input() -> JobInput {
        JobInput::Script(ScriptInput {
            topic: "rust memory model".into(),
            tone: Some("casual".into()),
            scene_count: 4,
        })
    }

    #[test]
    fn test_job_creation() {
        let job = Job::new("user123", Some("proj-1".into()), script_input());
        assert_eq!(job.job_type, JobType::ScriptGeneration);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.result.is_none());
        assert!(job.claimed_by.is_none());
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            for next in [
                JobStatus::Pending,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} -> {next} must be rejected"
                );
            }
        }
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_snapshot_is_reduced_view() {
        let job = Job::new("user123", None, script_input());
        let snap = job.snapshot();
        assert_eq!(snap.id, job.id);
        assert_eq!(snap.status, JobStatus::Pending);
        assert_eq!(snap.job_type, JobType::ScriptGeneration);
        assert!(snap.project_id.is_none());
    }

    #[test]
    fn test_snapshot_serde_uses_type_tag() {
        let job = Job::new("user123", None, script_input());
        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["type"], "script_generation");
        assert_eq!(json["status"], "pending");
    }
}
