//! Job store and credit ledger.
//!
//! This crate owns the two pieces of state the rest of the system mutates
//! through narrow, atomic operations:
//! - the `jobs` table with its guarded status state machine
//! - the `credit_accounts` / `credit_transactions` tables behind the ledger
//!
//! Every job mutation is a compare-and-set against the stored status and
//! emits exactly one snapshot event to subscribers.

pub mod error;
pub mod jobs;
pub mod ledger;

pub use error::{StoreError, StoreResult};
pub use jobs::{JobStore, StoreEvent};
pub use ledger::{CreditLedger, Receipt};
