//! Per-user SSE event stream.

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::{Stream, StreamExt};

use crate::auth::AuthUser;
use crate::metrics;
use crate::state::AppState;

struct ConnectionGauge;

impl ConnectionGauge {
    fn open() -> Self {
        metrics::record_sse_connection(1);
        Self
    }
}

impl Drop for ConnectionGauge {
    fn drop(&mut self) {
        metrics::record_sse_connection(-1);
    }
}

/// Open the live update stream for the authenticated user.
///
/// Emits JSON-encoded snapshot events and periodic heartbeats; the
/// broadcaster coalesces under backpressure so slow clients see the
/// latest state per job rather than an unbounded backlog.
pub async fn events(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let gauge = ConnectionGauge::open();
    let stream = state
        .broadcaster
        .subscribe(user.user_id)
        .map(move |event| {
            let _ = &gauge;
            Event::default().json_data(&event)
        });

    Sse::new(stream)
}
