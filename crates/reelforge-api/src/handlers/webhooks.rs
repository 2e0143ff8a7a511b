//! Payment webhook handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::info;

use reelforge_models::TransactionType;

use crate::error::ApiResult;
use crate::metrics;
use crate::payments::PaymentEvent;
use crate::state::AppState;

/// Header carrying the payment provider's delivery signature.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// False when the delivery was a replay of an already-applied order.
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
}

/// Ingest a payment event and apply it to the ledger.
///
/// Purchases and refunds are keyed by order id and applied at most once,
/// so provider redeliveries are safe.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let event = state.payments.verify_and_parse(&body, signature).await?;

    let (receipt, tx_label, credits) = match event {
        PaymentEvent::Purchase {
            user_id,
            credits,
            order_id,
            description,
        } => {
            let receipt = state
                .ledger
                .credit_once(
                    &user_id,
                    credits,
                    TransactionType::Purchase,
                    description.unwrap_or_else(|| "Credit purchase".to_string()),
                    &order_id,
                    Some(order_id.clone()),
                    None,
                )
                .await?;
            (receipt, "purchase", credits)
        }
        PaymentEvent::Refund {
            user_id,
            credits,
            order_id,
            description,
        } => {
            // Refunds share the order id with their purchase, so the
            // idempotency key gets its own namespace; the transaction
            // still records the provider's order id.
            let receipt = state
                .ledger
                .credit_once(
                    &user_id,
                    credits,
                    TransactionType::Refund,
                    description.unwrap_or_else(|| "Payment refund".to_string()),
                    &format!("refund:{order_id}"),
                    Some(order_id.clone()),
                    None,
                )
                .await?;
            (receipt, "refund", credits)
        }
    };

    let applied = receipt.is_some();
    if applied {
        metrics::record_credits_granted(tx_label, credits);
    } else {
        info!(tx_label, "Replayed payment delivery skipped");
    }

    Ok(Json(WebhookResponse {
        applied,
        balance: receipt.map(|r| r.new_balance),
    }))
}
