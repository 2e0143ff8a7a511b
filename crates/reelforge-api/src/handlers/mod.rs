//! HTTP request handlers.

pub mod credits;
pub mod events;
pub mod health;
pub mod jobs;
pub mod webhooks;
