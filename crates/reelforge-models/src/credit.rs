//! Credit account and transaction models.
//!
//! The transaction log is the source of truth; the account row carries the
//! derived balance plus lifetime totals. `balance == total_earned -
//! total_spent` holds after every committed ledger operation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits bought through the payment processor
    Purchase,
    /// Credits consumed by a generation job
    Spend,
    /// Reversal of a prior spend
    Refund,
    /// Promotional or welcome grant
    Bonus,
    /// Redeemed promo code
    Redeem,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Spend => "spend",
            Self::Refund => "refund",
            Self::Bonus => "bonus",
            Self::Redeem => "redeem",
        }
    }

    /// Whether this transaction type increases the balance.
    pub fn is_earning(&self) -> bool {
        !matches!(self, Self::Spend)
    }
}

/// Per-user credit account.
///
/// Created lazily on the first earning or spending event; mutated only
/// through the ledger's atomic operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreditAccount {
    /// Owning user
    pub user_id: String,
    /// Current balance (always >= 0 after a committed operation)
    pub balance: i64,
    /// Lifetime credits earned
    pub total_earned: i64,
    /// Lifetime credits spent
    pub total_spent: i64,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account was last mutated
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create an empty account for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            balance: 0,
            total_earned: 0,
            total_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An immutable entry in the credit transaction log.
///
/// Amounts are signed: positive means earned, negative means spent.
/// `balance_after` is a snapshot of the account balance immediately after
/// this transaction committed, so the log can be audited independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreditTransaction {
    /// Unique identifier (UUID)
    pub id: String,

    /// User whose account was mutated
    pub user_id: String,

    /// Transaction type
    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Signed amount (positive = earned, negative = spent)
    pub amount: i64,

    /// Account balance immediately after this transaction
    pub balance_after: i64,

    /// Correlation key to an external order, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Human-readable description
    pub description: String,

    /// Additional metadata (e.g. job id, image count)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,

    /// When the transaction committed
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a new transaction record.
    pub fn new(
        user_id: impl Into<String>,
        tx_type: TransactionType,
        amount: i64,
        balance_after: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            tx_type,
            amount,
            balance_after,
            order_id: None,
            description: description.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Set the order correlation key if present.
    pub fn with_optional_order_id(mut self, order_id: Option<String>) -> Self {
        if let Some(oid) = order_id {
            self.order_id = Some(oid);
        }
        self
    }

    /// Set metadata if present.
    pub fn with_optional_metadata(mut self, metadata: Option<HashMap<String, String>>) -> Self {
        if let Some(meta) = metadata {
            self.metadata = Some(meta);
        }
        self
    }
}
