//! Live event channel message schema.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobSnapshot;

/// Message pushed to a subscribed client over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job's current state after a store mutation
    Snapshot { job: JobSnapshot },

    /// Periodic liveness signal so clients can detect silent connection death
    Heartbeat { timestamp: DateTime<Utc> },
}

impl JobEvent {
    /// Build a snapshot event.
    pub fn snapshot(job: JobSnapshot) -> Self {
        Self::Snapshot { job }
    }

    /// Build a heartbeat event stamped now.
    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    /// The snapshot carried by this event, if any.
    pub fn as_snapshot(&self) -> Option<&JobSnapshot> {
        match self {
            JobEvent::Snapshot { job } => Some(job),
            JobEvent::Heartbeat { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobStatus};
    use crate::payload::{JobInput, ScriptInput};

    #[test]
    fn test_event_serde_tags() {
        let job = Job::new(
            "user-1",
            None,
            JobInput::Script(ScriptInput {
                topic: "tides".into(),
                tone: None,
                scene_count: 3,
            }),
        );
        let ev = JobEvent::snapshot(job.snapshot());
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["job"]["status"], JobStatus::Pending.as_str());

        let hb = serde_json::to_value(JobEvent::heartbeat()).unwrap();
        assert_eq!(hb["type"], "heartbeat");
    }
}
