//! Event broadcaster with backpressure support.
//!
//! Each subscriber gets a bounded stream of job snapshots for one user,
//! interleaved with periodic heartbeats. A forwarding task sits between the
//! store's broadcast channel and the subscriber queue; when the queue is
//! full it coalesces to last-known-state per job instead of buffering
//! unboundedly. Intermediate progress ticks may be lost under pressure,
//! but a job's terminal snapshot is always the last coalesced state and is
//! never dropped.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use reelforge_models::{JobEvent, JobId, JobSnapshot};
use reelforge_store::JobStore;

/// Per-subscriber outbound queue size.
const SUBSCRIBER_BUFFER_SIZE: usize = 32;

/// Interval between heartbeat events.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Fans store mutations out to subscribed clients.
#[derive(Clone)]
pub struct EventBroadcaster {
    store: JobStore,
    heartbeat_interval: Duration,
    buffer_size: usize,
}

impl EventBroadcaster {
    /// Create a broadcaster over a job store.
    pub fn new(store: JobStore) -> Self {
        Self {
            store,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            buffer_size: SUBSCRIBER_BUFFER_SIZE,
        }
    }

    /// Override the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override the per-subscriber queue size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Subscribe to live updates for one user.
    ///
    /// Updates for the same job arrive in commit order. Dropping the
    /// returned stream tears down the forwarding task and releases its
    /// store listener.
    pub fn subscribe(&self, user_id: impl Into<String>) -> JobEventStream {
        let user_id = user_id.into();
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let store = self.store.clone();
        let heartbeat_interval = self.heartbeat_interval;

        tokio::spawn(async move {
            forward_events(store, user_id, tx, heartbeat_interval).await;
        });

        JobEventStream { rx }
    }
}

/// Forwarding loop for one subscriber.
///
/// `pending` holds the latest unsent snapshot per job; entries drain into
/// the subscriber queue as capacity frees up.
async fn forward_events(
    store: JobStore,
    user_id: String,
    tx: mpsc::Sender<JobEvent>,
    heartbeat_interval: Duration,
) {
    let mut events = store.subscribe_events();
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending: BTreeMap<JobId, JobSnapshot> = BTreeMap::new();

    loop {
        if pending.is_empty() {
            tokio::select! {
                res = events.recv() => {
                    if !absorb(res, &user_id, &store, &mut pending).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    // Heartbeats are droppable; skip when the queue is full.
                    if let Err(mpsc::error::TrySendError::Closed(_)) =
                        tx.try_send(JobEvent::heartbeat())
                    {
                        debug!(user_id = %user_id, "Subscriber dropped, ending forwarder");
                        return;
                    }
                }
                _ = tx.closed() => {
                    debug!(user_id = %user_id, "Subscriber dropped, ending forwarder");
                    return;
                }
            }
        } else {
            tokio::select! {
                // New mutations coalesce into pending while we wait for
                // queue capacity.
                res = events.recv() => {
                    if !absorb(res, &user_id, &store, &mut pending).await {
                        break;
                    }
                }
                permit = tx.reserve() => {
                    match permit {
                        Ok(permit) => {
                            // BTreeMap order is fine: cross-job ordering is
                            // not guaranteed, per-job order is preserved by
                            // keeping only the latest state.
                            if let Some((_, snapshot)) = pending.pop_first() {
                                permit.send(JobEvent::snapshot(snapshot));
                            }
                        }
                        Err(_) => {
                            debug!(user_id = %user_id, "Subscriber dropped, ending forwarder");
                            return;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    let _ = tx.try_send(JobEvent::heartbeat());
                }
            }
        }
    }

    // Store channel closed: drain what we still hold, then end the stream.
    for (_, snapshot) in pending {
        if tx.send(JobEvent::snapshot(snapshot)).await.is_err() {
            return;
        }
    }
}

/// Fold one broadcast result into the pending map.
///
/// Returns false when the store's event channel is closed.
async fn absorb(
    res: Result<reelforge_store::StoreEvent, RecvError>,
    user_id: &str,
    store: &JobStore,
    pending: &mut BTreeMap<JobId, JobSnapshot>,
) -> bool {
    match res {
        Ok(event) => {
            if event.user_id == user_id {
                pending.insert(event.snapshot.id.clone(), event.snapshot);
            }
            true
        }
        Err(RecvError::Lagged(missed)) => {
            // Fell behind the store; resync from current state instead of
            // replaying history.
            warn!(user_id, missed, "Subscriber lagged, resyncing from store");
            for snapshot in store.list_for_user(user_id).await {
                pending.insert(snapshot.id.clone(), snapshot);
            }
            true
        }
        Err(RecvError::Closed) => false,
    }
}

/// Stream of [`JobEvent`]s for one subscriber.
pub struct JobEventStream {
    rx: mpsc::Receiver<JobEvent>,
}

impl JobEventStream {
    /// Receive the next event, or `None` when the channel ends.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }
}

impl Stream for JobEventStream {
    type Item = JobEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_models::{ImageInput, JobInput, JobOutput, JobStatus, WorkerToken};

    fn image_input() -> JobInput {
        JobInput::Image(ImageInput {
            prompt: "northern lights".into(),
            style: None,
            count: 1,
            width: 1024,
            height: 1024,
        })
    }

    /// Collect snapshot statuses until a terminal status for `job_id` shows up.
    async fn statuses_until_terminal(
        stream: &mut JobEventStream,
        job_id: &JobId,
    ) -> Vec<JobStatus> {
        let mut seen = Vec::new();
        while let Some(event) = stream.recv().await {
            if let Some(snap) = event.as_snapshot() {
                if &snap.id == job_id {
                    seen.push(snap.status);
                    if snap.status.is_terminal() {
                        break;
                    }
                }
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_subscriber_sees_lifecycle_in_commit_order() {
        let store = JobStore::new();
        let broadcaster = EventBroadcaster::new(store.clone());
        let mut stream = broadcaster.subscribe("user-1");
        tokio::task::yield_now().await; // let the forwarder register

        let token = WorkerToken::new();
        let job = store.create("user-1", None, image_input()).await;
        store.claim(&job.id, &token).await.unwrap();
        store
            .report_progress(&job.id, 50, Some("rendering".into()), &token)
            .await
            .unwrap();
        store
            .complete(&job.id, JobOutput::Image { urls: vec![] }, &token)
            .await
            .unwrap();

        let statuses = statuses_until_terminal(&mut stream, &job.id).await;
        assert_eq!(*statuses.last().unwrap(), JobStatus::Completed);
        // Per-job order: no status may appear after a "later" one.
        let mut progressed = false;
        for s in &statuses {
            if *s == JobStatus::Completed {
                progressed = true;
            } else {
                assert!(!progressed, "non-terminal after terminal: {statuses:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_other_users_events_filtered_out() {
        let store = JobStore::new();
        let broadcaster = EventBroadcaster::new(store.clone());
        let mut stream = broadcaster.subscribe("user-1");
        tokio::task::yield_now().await;

        store.create("user-2", None, image_input()).await;
        let mine = store.create("user-1", None, image_input()).await;

        let event = stream.recv().await.unwrap();
        let snap = event.as_snapshot().expect("snapshot");
        assert_eq!(snap.id, mine.id);
    }

    #[tokio::test]
    async fn test_slow_consumer_coalesces_but_keeps_terminal() {
        let store = JobStore::new();
        let broadcaster = EventBroadcaster::new(store.clone()).with_buffer_size(1);
        let mut stream = broadcaster.subscribe("user-1");
        tokio::task::yield_now().await;

        let token = WorkerToken::new();
        let job = store.create("user-1", None, image_input()).await;
        store.claim(&job.id, &token).await.unwrap();
        for p in [10, 20, 30, 40, 50, 60, 70, 80, 90] {
            store.report_progress(&job.id, p, None, &token).await.unwrap();
        }
        store
            .complete(&job.id, JobOutput::Image { urls: vec![] }, &token)
            .await
            .unwrap();
        // Give the forwarder a chance to absorb everything before reading.
        tokio::task::yield_now().await;

        let statuses = statuses_until_terminal(&mut stream, &job.id).await;
        assert_eq!(*statuses.last().unwrap(), JobStatus::Completed);
        // With a queue of one, most progress ticks must have coalesced.
        assert!(statuses.len() < 11, "expected coalescing, got {statuses:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_emitted_on_interval() {
        let store = JobStore::new();
        let broadcaster =
            EventBroadcaster::new(store.clone()).with_heartbeat_interval(Duration::from_secs(15));
        let mut stream = broadcaster.subscribe("user-1");

        // First interval tick fires immediately.
        let first = stream.recv().await.unwrap();
        assert!(matches!(first, JobEvent::Heartbeat { .. }));

        tokio::time::advance(Duration::from_secs(15)).await;
        let second = stream.recv().await.unwrap();
        assert!(matches!(second, JobEvent::Heartbeat { .. }));
    }
}
