//! Credit balance and history handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use reelforge_models::CreditTransaction;
use reelforge_store::StoreError;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Maximum allowed limit for credit history queries.
const MAX_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
}

/// Current balance. Users who have never earned credits read as zero
/// rather than erroring.
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<BalanceResponse>> {
    match state.ledger.account(&user.user_id).await {
        Ok(account) => Ok(Json(BalanceResponse {
            balance: account.balance,
            total_earned: account.total_earned,
            total_spent: account.total_spent,
        })),
        Err(StoreError::AccountNotFound(_)) => Ok(Json(BalanceResponse {
            balance: 0,
            total_earned: 0,
            total_spent: 0,
        })),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreditHistoryQuery {
    /// Maximum number of transactions to return (clamped to 1..100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction history, newest first.
pub async fn credit_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CreditHistoryQuery>,
) -> ApiResult<Json<Vec<CreditTransaction>>> {
    let limit = query.limit.clamp(1, MAX_LIMIT);
    Ok(Json(state.ledger.history(&user.user_id, limit).await))
}
