//! Per-user live event broadcasting.

pub mod broadcaster;

pub use broadcaster::{EventBroadcaster, JobEventStream};
