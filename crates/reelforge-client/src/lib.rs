//! Client-side event subscription and refresh coordination.
//!
//! Consumes the server's per-user event stream, reconnects with
//! exponential backoff, and translates job snapshots into debounced
//! data-refresh triggers for the UI layer.

pub mod backoff;
pub mod connection;
pub mod error;
pub mod refresh;

pub use backoff::Backoff;
pub use connection::{ConnectionState, EventSource, HttpEventSource, Subscription};
pub use error::{ClientError, ClientResult};
pub use refresh::{RefreshCoordinator, RefreshKind, RefreshStrategy};
