//! Payment webhook ingestion seam.
//!
//! Signature verification belongs to the fronting payment integration;
//! this crate only consumes parsed events and applies them to the ledger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// A verified, decoded payment event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// Credits purchased; applied at most once per order id.
    Purchase {
        user_id: String,
        credits: u32,
        order_id: String,
        #[serde(default)]
        description: Option<String>,
    },
    /// A purchase reversed by the payment provider.
    Refund {
        user_id: String,
        credits: u32,
        order_id: String,
        #[serde(default)]
        description: Option<String>,
    },
}

/// Verifies and decodes raw webhook deliveries.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn verify_and_parse(&self, body: &[u8], signature: &str) -> ApiResult<PaymentEvent>;
}

/// Processor for deployments where the fronting gateway has already
/// verified the delivery; decodes the JSON body as-is.
#[derive(Debug, Default)]
pub struct JsonPaymentProcessor;

#[async_trait]
impl PaymentProcessor for JsonPaymentProcessor {
    async fn verify_and_parse(&self, body: &[u8], _signature: &str) -> ApiResult<PaymentEvent> {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::bad_request(format!("invalid payment event: {e}")))
    }
}
