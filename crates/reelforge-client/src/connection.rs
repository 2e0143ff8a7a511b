//! Event stream subscription with automatic reconnect.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use reelforge_models::JobEvent;

use crate::backoff::Backoff;
use crate::error::{ClientError, ClientResult};

/// Subscriber's view of the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A live stream of decoded job events.
pub type EventStream = BoxStream<'static, ClientResult<JobEvent>>;

/// Source of server event streams.
///
/// The production implementation speaks SSE over HTTP; tests substitute
/// scripted sources.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn connect(&self) -> ClientResult<EventStream>;
}

/// Incremental parser for `text/event-stream` bodies.
///
/// Handles frames split across arbitrary chunk boundaries; comment,
/// `event:`, `id:` and `retry:` lines are ignored, multi-line `data:`
/// payloads are joined with newlines.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buf: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning any complete `data:` payloads.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                // Blank line terminates the frame.
                if !self.data_lines.is_empty() {
                    payloads.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data_lines
                    .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }

        payloads
    }
}

/// SSE connector against the server's `/api/events` endpoint.
pub struct HttpEventSource {
    client: reqwest::Client,
    url: String,
}

impl HttpEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn connect(&self) -> ClientResult<EventStream> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let stream = futures_util::stream::unfold(
            (
                response.bytes_stream(),
                SseFrameParser::new(),
                std::collections::VecDeque::new(),
            ),
            |(mut bytes, mut parser, mut queue)| async move {
                loop {
                    if let Some(item) = queue.pop_front() {
                        return Some((item, (bytes, parser, queue)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            for payload in parser.push(&chunk) {
                                queue.push_back(
                                    serde_json::from_str::<JobEvent>(&payload)
                                        .map_err(|e| ClientError::malformed_event(e.to_string())),
                                );
                            }
                        }
                        Some(Err(e)) => {
                            queue.push_back(Err(ClientError::Http(e)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

/// A running subscription with automatic reconnect.
///
/// Transient stream failures reconnect with backoff; the attempt counter
/// resets on every successful connect. Once the backoff budget is
/// exhausted a final `ReconnectExhausted` error is delivered and the
/// subscription ends.
pub struct Subscription {
    events: mpsc::Receiver<ClientResult<JobEvent>>,
    state: watch::Receiver<ConnectionState>,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Start the reconnect loop over an event source.
    pub fn start(source: Arc<dyn EventSource>, backoff: Backoff) -> Self {
        let (tx, events) = mpsc::channel(64);
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);

        let handle = tokio::spawn(run(source, tx, state_tx, backoff));

        Self {
            events,
            state,
            handle,
        }
    }

    /// Receive the next event. `None` means the subscription ended.
    pub async fn recv(&mut self) -> Option<ClientResult<JobEvent>> {
        self.events.recv().await
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    source: Arc<dyn EventSource>,
    tx: mpsc::Sender<ClientResult<JobEvent>>,
    state_tx: watch::Sender<ConnectionState>,
    mut backoff: Backoff,
) {
    loop {
        let _ = state_tx.send(ConnectionState::Connecting);

        match source.connect().await {
            Ok(mut stream) => {
                let _ = state_tx.send(ConnectionState::Connected);
                backoff.reset();

                loop {
                    tokio::select! {
                        item = stream.next() => match item {
                            Some(Ok(event)) => {
                                if tx.send(Ok(event)).await.is_err() {
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "Event stream error, reconnecting");
                                break;
                            }
                            None => {
                                debug!("Event stream ended, reconnecting");
                                break;
                            }
                        },
                        _ = tx.closed() => return,
                    }
                }

                let _ = state_tx.send(ConnectionState::Disconnected);
            }
            Err(e) => {
                debug!(error = %e, "Connect failed");
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
        }

        match backoff.next_delay() {
            Some(delay) => tokio::time::sleep(delay).await,
            None => {
                let _ = tx
                    .send(Err(ClientError::ReconnectExhausted {
                        attempts: backoff.attempts(),
                    }))
                    .await;
                return;
            }
        }
    }
}
