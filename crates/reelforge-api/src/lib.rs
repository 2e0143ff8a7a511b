//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job submission, query, cancellation and cost estimation
//! - Credit balance, history and payment webhook ingestion
//! - Per-user SSE event streams
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod payments;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use payments::{JsonPaymentProcessor, PaymentEvent, PaymentProcessor};
pub use routes::create_router;
pub use state::AppState;
