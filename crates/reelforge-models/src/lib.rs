//! Shared data models for ReelForge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job status, and claim tokens
//! - Typed generation payloads (inputs and results)
//! - Credit accounts and the transaction log
//! - Credit cost estimation
//! - Live event channel message schemas

pub mod cost;
pub mod credit;
pub mod event;
pub mod job;
pub mod payload;

// Re-export common types
pub use cost::estimate_cost;
pub use credit::{CreditAccount, CreditTransaction, TransactionType};
pub use event::JobEvent;
pub use job::{Job, JobId, JobSnapshot, JobStatus, JobType, WorkerToken};
pub use payload::{
    ExportInput, ExportResolution, ImageInput, JobInput, JobOutput, PayloadError, ScriptInput,
    SpeechInput, StoryboardFrame, StoryboardInput, VideoInput,
};
