//! Debounced refresh coordination.
//!
//! Translates job status transitions into "refresh this resource" signals
//! for the view layer. Per job id the coordinator keeps the last observed
//! status so repeated snapshots of the same state never re-trigger; real
//! transitions consult a per-type strategy table and are coalesced through
//! a debounce window where the strategy asks for one.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use reelforge_models::{JobId, JobSnapshot, JobStatus, JobType};

/// Default debounce window for burst coalescing.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// How often terminal tracking entries are pruned.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Resource the view layer should re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshKind {
    /// Project outline and script data.
    Project,
    /// Generated media assets for a project.
    AssetCollection,
    /// Export list and download links.
    Export,
}

/// Per-job-type refresh behavior.
#[derive(Debug, Clone, Copy)]
pub struct RefreshStrategy {
    pub kind: RefreshKind,
    /// Statuses whose transitions trigger a refresh.
    pub triggers: &'static [JobStatus],
    /// Coalescing window, `None` for immediate refresh.
    pub debounce: Option<Duration>,
}

impl RefreshStrategy {
    /// Strategy for a job type.
    ///
    /// Script and storyboard work refreshes the project outline, and does
    /// so already on `processing` for live updates; media generation only
    /// refreshes assets once it reaches a terminal state; exports refresh
    /// immediately so download links appear without delay.
    pub fn for_type(job_type: JobType) -> Self {
        use JobStatus::{Cancelled, Completed, Failed, Processing};
        match job_type {
            JobType::ScriptGeneration | JobType::StoryboardGeneration => Self {
                kind: RefreshKind::Project,
                triggers: &[Processing, Completed, Failed, Cancelled],
                debounce: Some(DEBOUNCE_WINDOW),
            },
            JobType::ImageGeneration | JobType::VideoGeneration | JobType::SpeechSynthesis => {
                Self {
                    kind: RefreshKind::AssetCollection,
                    triggers: &[Completed, Failed, Cancelled],
                    debounce: Some(DEBOUNCE_WINDOW),
                }
            }
            JobType::VideoExport => Self {
                kind: RefreshKind::Export,
                triggers: &[Completed, Failed, Cancelled],
                debounce: None,
            },
        }
    }
}

struct Tracked {
    status: JobStatus,
    last_seen: Instant,
}

/// Owns the debounce timers and per-job tracking state.
///
/// Dropping the coordinator (or calling [`shutdown`](Self::shutdown))
/// flushes pending debounce windows so terminal transitions always produce
/// their refresh.
pub struct RefreshCoordinator {
    observations: mpsc::UnboundedSender<JobSnapshot>,
    handle: JoinHandle<()>,
}

impl RefreshCoordinator {
    /// Start the coordinator, returning it plus the refresh signal stream.
    pub fn start() -> (Self, mpsc::UnboundedReceiver<RefreshKind>) {
        let (observations, rx) = mpsc::unbounded_channel();
        let (out, refreshes) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(rx, out));

        (
            Self {
                observations,
                handle,
            },
            refreshes,
        )
    }

    /// Feed one job snapshot from the event stream.
    pub fn observe(&self, snapshot: JobSnapshot) {
        let _ = self.observations.send(snapshot);
    }

    /// Tear down, flushing any pending debounce windows first.
    pub async fn shutdown(self) {
        let Self {
            observations,
            handle,
        } = self;
        drop(observations);
        let _ = handle.await;
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<JobSnapshot>,
    out: mpsc::UnboundedSender<RefreshKind>,
) {
    let mut tracked: HashMap<JobId, Tracked> = HashMap::new();
    // Deadline per resource kind; inserting again restarts the window.
    let mut pending: HashMap<RefreshKind, Instant> = HashMap::new();

    let mut prune = tokio::time::interval(PRUNE_INTERVAL);
    prune.set_missed_tick_behavior(MissedTickBehavior::Skip);
    prune.tick().await; // the first tick is immediate

    loop {
        let next_deadline = pending.values().min().copied();

        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(snapshot) => {
                    handle_snapshot(snapshot, &mut tracked, &mut pending, &out);
                }
                None => break,
            },
            _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)),
                if next_deadline.is_some() =>
            {
                let now = Instant::now();
                let due: Vec<RefreshKind> = pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(kind, _)| *kind)
                    .collect();
                for kind in due {
                    pending.remove(&kind);
                    let _ = out.send(kind);
                }
            },
            _ = prune.tick() => {
                let now = Instant::now();
                let before = tracked.len();
                // Terminal jobs never transition again; drop their entries
                // once they have gone quiet.
                tracked.retain(|_, t| {
                    !t.status.is_terminal() || now - t.last_seen < PRUNE_INTERVAL
                });
                if tracked.len() < before {
                    debug!(pruned = before - tracked.len(), "Pruned job tracking entries");
                }
            }
        }
    }

    // Teardown: pending windows flush immediately so terminal transitions
    // are never lost.
    for kind in pending.into_keys() {
        let _ = out.send(kind);
    }
}

fn handle_snapshot(
    snapshot: JobSnapshot,
    tracked: &mut HashMap<JobId, Tracked>,
    pending: &mut HashMap<RefreshKind, Instant>,
    out: &mpsc::UnboundedSender<RefreshKind>,
) {
    let now = Instant::now();
    let is_transition = match tracked.get(&snapshot.id) {
        Some(t) => t.status != snapshot.status,
        None => true,
    };
    tracked.insert(
        snapshot.id.clone(),
        Tracked {
            status: snapshot.status,
            last_seen: now,
        },
    );

    if !is_transition {
        return;
    }

    let strategy = RefreshStrategy::for_type(snapshot.job_type);
    if !strategy.triggers.contains(&snapshot.status) {
        return;
    }

    match strategy.debounce {
        None => {
            let _ = out.send(strategy.kind);
        }
        Some(window) => {
            // Cancel-then-reschedule: a new qualifying event restarts the
            // window for its resource kind.
            pending.insert(strategy.kind, now + window);
        }
    }
}
