//! Application state.

use std::sync::Arc;

use reelforge_events::EventBroadcaster;
use reelforge_store::{CreditLedger, JobStore};

use crate::config::ApiConfig;
use crate::payments::{JsonPaymentProcessor, PaymentProcessor};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: JobStore,
    pub ledger: CreditLedger,
    pub broadcaster: EventBroadcaster,
    pub payments: Arc<dyn PaymentProcessor>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> Self {
        let store = JobStore::new();
        let ledger = CreditLedger::new();
        let broadcaster =
            EventBroadcaster::new(store.clone()).with_heartbeat_interval(config.heartbeat_interval);

        Self {
            config,
            store,
            ledger,
            broadcaster,
            payments: Arc::new(JsonPaymentProcessor),
        }
    }

    /// Swap in a different payment processor implementation.
    pub fn with_payments(mut self, payments: Arc<dyn PaymentProcessor>) -> Self {
        self.payments = payments;
        self
    }
}
