//! Credit ledger with an append-only transaction log.
//!
//! Every mutation runs read-validate-write-append under one lock; no
//! partial application is ever observable. Concurrent spends against the
//! same account are linearized: with one contested unit of balance, at
//! most one spend succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use reelforge_models::{CreditAccount, CreditTransaction, TransactionType};

use crate::error::{StoreError, StoreResult};

/// Outcome of a committed ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Balance after the transaction
    pub new_balance: i64,
    /// Id of the appended transaction
    pub transaction_id: String,
}

struct LedgerTable {
    accounts: HashMap<String, CreditAccount>,
    transactions: Vec<CreditTransaction>,
    applied_keys: HashSet<String>,
}

/// The `credit_accounts` and `credit_transactions` tables.
#[derive(Clone)]
pub struct CreditLedger {
    inner: Arc<Mutex<LedgerTable>>,
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CreditLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerTable {
                accounts: HashMap::new(),
                transactions: Vec::new(),
                applied_keys: HashSet::new(),
            })),
        }
    }

    /// Debit credits from a user's account.
    ///
    /// Fails with `AccountNotFound` if the user has never earned credits,
    /// and `InsufficientBalance` if the balance does not cover `amount`.
    /// On success the balance, `total_spent`, and the appended `spend`
    /// transaction commit as one unit.
    pub async fn spend(
        &self,
        user_id: &str,
        amount: u32,
        description: impl Into<String>,
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<Receipt> {
        let amount = positive(amount)?;
        let mut table = self.inner.lock().await;

        let account = table
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::AccountNotFound(user_id.to_string()))?;

        if account.balance < amount {
            return Err(StoreError::InsufficientBalance {
                required: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        account.total_spent += amount;
        account.updated_at = chrono::Utc::now();
        let balance_after = account.balance;

        let tx = CreditTransaction::new(
            user_id,
            TransactionType::Spend,
            -amount,
            balance_after,
            description,
        )
        .with_optional_metadata(metadata);
        let receipt = Receipt {
            new_balance: balance_after,
            transaction_id: tx.id.clone(),
        };
        table.transactions.push(tx);

        debug!(user_id, amount, balance = balance_after, "Debited credits");
        Ok(receipt)
    }

    /// Credit a user's account, creating it lazily if absent.
    ///
    /// `tx_type` must be an earning type; spends go through [`spend`].
    pub async fn credit(
        &self,
        user_id: &str,
        amount: u32,
        tx_type: TransactionType,
        description: impl Into<String>,
        order_id: Option<String>,
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<Receipt> {
        let amount = positive(amount)?;
        if !tx_type.is_earning() {
            return Err(StoreError::InvalidOperation(format!(
                "{} is not an earning transaction type",
                tx_type.as_str()
            )));
        }

        let mut table = self.inner.lock().await;
        Self::apply_credit(&mut table, user_id, amount, tx_type, description.into(), order_id, metadata)
    }

    /// Reverse a prior spend without mutating the original record.
    pub async fn refund(
        &self,
        user_id: &str,
        amount: u32,
        description: impl Into<String>,
        order_id: Option<String>,
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<Receipt> {
        self.credit(
            user_id,
            amount,
            TransactionType::Refund,
            description,
            order_id,
            metadata,
        )
        .await
    }

    /// Credit keyed by `dedup_key`, at most once.
    ///
    /// The check and the credit run inside the same atomic unit, so a
    /// replayed payment event or a repeated bonus claim is a no-op.
    /// `dedup_key` is the idempotency key only; the transaction is
    /// recorded with `order_id`, so a purchase and its refund can share
    /// the provider's order id while deduplicating independently.
    /// Returns `None` when the key has already been applied.
    pub async fn credit_once(
        &self,
        user_id: &str,
        amount: u32,
        tx_type: TransactionType,
        description: impl Into<String>,
        dedup_key: &str,
        order_id: Option<String>,
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<Option<Receipt>> {
        let amount = positive(amount)?;
        if !tx_type.is_earning() {
            return Err(StoreError::InvalidOperation(format!(
                "{} is not an earning transaction type",
                tx_type.as_str()
            )));
        }

        let mut table = self.inner.lock().await;
        if !table.applied_keys.insert(dedup_key.to_string()) {
            info!(user_id, dedup_key, "Duplicate payment event, credit skipped");
            return Ok(None);
        }

        Self::apply_credit(
            &mut table,
            user_id,
            amount,
            tx_type,
            description.into(),
            order_id,
            metadata,
        )
        .map(Some)
    }

    /// Get a user's account.
    pub async fn account(&self, user_id: &str) -> StoreResult<CreditAccount> {
        self.inner
            .lock()
            .await
            .accounts
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound(user_id.to_string()))
    }

    /// Transaction history for a user, newest first, up to `limit`.
    pub async fn history(&self, user_id: &str, limit: usize) -> Vec<CreditTransaction> {
        let table = self.inner.lock().await;
        table
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn apply_credit(
        table: &mut LedgerTable,
        user_id: &str,
        amount: i64,
        tx_type: TransactionType,
        description: String,
        order_id: Option<String>,
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<Receipt> {
        let account = table
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| CreditAccount::new(user_id));

        account.balance += amount;
        account.total_earned += amount;
        account.updated_at = chrono::Utc::now();
        let balance_after = account.balance;

        let tx = CreditTransaction::new(user_id, tx_type, amount, balance_after, description)
            .with_optional_order_id(order_id)
            .with_optional_metadata(metadata);
        let receipt = Receipt {
            new_balance: balance_after,
            transaction_id: tx.id.clone(),
        };
        table.transactions.push(tx);

        debug!(
            user_id,
            amount,
            tx_type = tx_type.as_str(),
            balance = balance_after,
            "Credited account"
        );
        Ok(receipt)
    }
}

fn positive(amount: u32) -> StoreResult<i64> {
    if amount == 0 {
        return Err(StoreError::InvalidAmount(0));
    }
    Ok(amount as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn assert_invariant(ledger: &CreditLedger, user_id: &str) {
        let account = ledger.account(user_id).await.unwrap();
        assert_eq!(account.balance, account.total_earned - account.total_spent);
        assert!(account.balance >= 0);
    }

    #[tokio::test]
    async fn test_invariant_holds_across_sequences() {
        let ledger = CreditLedger::new();
        ledger
            .credit("user-1", 50, TransactionType::Purchase, "Starter pack", None, None)
            .await
            .unwrap();
        assert_invariant(&ledger, "user-1").await;

        ledger.spend("user-1", 6, "Image generation", None).await.unwrap();
        assert_invariant(&ledger, "user-1").await;

        ledger
            .refund("user-1", 6, "Image generation failed", None, None)
            .await
            .unwrap();
        assert_invariant(&ledger, "user-1").await;

        ledger
            .credit("user-1", 10, TransactionType::Bonus, "Welcome bonus", None, None)
            .await
            .unwrap();
        ledger.spend("user-1", 20, "Video export", None).await.unwrap();
        assert_invariant(&ledger, "user-1").await;

        let account = ledger.account("user-1").await.unwrap();
        assert_eq!(account.balance, 40);
        assert_eq!(account.total_earned, 66);
        assert_eq!(account.total_spent, 26);
    }

    #[tokio::test]
    async fn test_spend_without_account_fails() {
        let ledger = CreditLedger::new();
        let err = ledger.spend("ghost", 1, "anything", None).await.unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound(_)));
        assert!(err.is_admission_error());
    }

    #[tokio::test]
    async fn test_concurrent_spends_linearized() {
        let ledger = CreditLedger::new();
        ledger
            .credit("user-1", 10, TransactionType::Purchase, "Top-up", None, None)
            .await
            .unwrap();

        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.spend("user-1", 10, "Export A", None).await })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.spend("user-1", 10, "Export B", None).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::InsufficientBalance { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(insufficient, 1);
        assert_eq!(ledger.account("user-1").await.unwrap().balance, 0);
        assert_invariant(&ledger, "user-1").await;
    }

    #[tokio::test]
    async fn test_transaction_log_is_append_only_audit_trail() {
        let ledger = CreditLedger::new();
        ledger
            .credit("user-1", 30, TransactionType::Purchase, "Top-up", Some("order-9".into()), None)
            .await
            .unwrap();
        ledger.spend("user-1", 12, "Video generation", None).await.unwrap();

        let history = ledger.history("user-1", 10).await;
        assert_eq!(history.len(), 2);
        // Newest first; balance_after snapshots reconstruct the balance.
        assert_eq!(history[0].amount, -12);
        assert_eq!(history[0].balance_after, 18);
        assert_eq!(history[1].amount, 30);
        assert_eq!(history[1].balance_after, 30);
        assert_eq!(history[1].order_id.as_deref(), Some("order-9"));
    }

    #[tokio::test]
    async fn test_credit_once_deduplicates_by_key() {
        let ledger = CreditLedger::new();
        let first = ledger
            .credit_once(
                "user-1",
                100,
                TransactionType::Purchase,
                "Pack",
                "order-1",
                Some("order-1".into()),
                None,
            )
            .await
            .unwrap();
        assert!(first.is_some());

        let replay = ledger
            .credit_once(
                "user-1",
                100,
                TransactionType::Purchase,
                "Pack",
                "order-1",
                Some("order-1".into()),
                None,
            )
            .await
            .unwrap();
        assert!(replay.is_none());
        assert_eq!(ledger.account("user-1").await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_dedup_key_does_not_leak_into_recorded_order_id() {
        let ledger = CreditLedger::new();
        ledger
            .credit_once(
                "user-1",
                100,
                TransactionType::Purchase,
                "Pack",
                "order-7",
                Some("order-7".into()),
                None,
            )
            .await
            .unwrap();

        // The refund dedups under its own key but is recorded against the
        // provider's order id.
        let refund = ledger
            .credit_once(
                "user-1",
                100,
                TransactionType::Refund,
                "Pack refunded",
                "refund:order-7",
                Some("order-7".into()),
                None,
            )
            .await
            .unwrap();
        assert!(refund.is_some());

        let history = ledger.history("user-1", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].order_id.as_deref(), Some("order-7"));
        assert_eq!(history[1].order_id.as_deref(), Some("order-7"));

        // Replaying either event is still a no-op.
        for (tx_type, key) in [
            (TransactionType::Purchase, "order-7"),
            (TransactionType::Refund, "refund:order-7"),
        ] {
            let replay = ledger
                .credit_once(
                    "user-1",
                    100,
                    tx_type,
                    "replay",
                    key,
                    Some("order-7".into()),
                    None,
                )
                .await
                .unwrap();
            assert!(replay.is_none());
        }
        assert_eq!(ledger.account("user-1").await.unwrap().balance, 200);
    }

    #[tokio::test]
    async fn test_zero_amount_and_spend_type_rejected() {
        let ledger = CreditLedger::new();
        assert!(matches!(
            ledger.spend("user-1", 0, "nothing", None).await.unwrap_err(),
            StoreError::InvalidAmount(0)
        ));
        assert!(matches!(
            ledger
                .credit("user-1", 5, TransactionType::Spend, "wrong type", None, None)
                .await
                .unwrap_err(),
            StoreError::InvalidOperation(_)
        ));
    }
}
