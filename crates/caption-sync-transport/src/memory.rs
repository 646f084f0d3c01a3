//! In-memory transports for testing.
//!
//! These implement the same traits as the WebSocket and HTTP clients but
//! never touch the network:
//!
//! - [`ScriptedConnector`] replays a fixed list of connect outcomes.
//! - [`ChannelConnector`] hands out connections fed live through a [`PushFeed`].
//! - [`ScriptedPullClient`] replays a fixed list of pull responses.
//! - [`MemoryBackend`] answers pull requests from per-channel logs the way the
//!   real backend does.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use caption_sync_core::{EventId, PullRequest, PullResponse, RawDatum, WireDatum};
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::{PullClient, PushConnection, PushConnector};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted push
// ─────────────────────────────────────────────────────────────────────────────

/// One scripted connect outcome.
#[derive(Debug, Clone)]
pub enum ConnectStep {
    /// The connect attempt fails.
    Fail(String),
    /// Connect succeeds, the frames are delivered, then the peer closes.
    Open(Vec<String>),
    /// Connect succeeds, the frames are delivered, then reading fails.
    OpenThenError(Vec<String>, String),
    /// Connect succeeds, the frames are delivered, then the connection idles.
    Hold(Vec<String>),
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ConnectStep>,
    attempts: usize,
    sent: Vec<String>,
}

/// Connector that replays a script. Once the script runs dry every connect
/// attempt fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    /// Create a connector from a script.
    pub fn new(steps: Vec<ConnectStep>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                steps: steps.into(),
                ..ScriptState::default()
            })),
        }
    }

    /// A connector whose every attempt fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        lock(&self.state).attempts
    }

    /// Frames sent over any scripted connection, in order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }
}

enum ScriptEnd {
    Close,
    Error(String),
    Hold,
}

struct ScriptedConnection {
    frames: VecDeque<String>,
    end: ScriptEnd,
    state: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl PushConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn PushConnection>> {
        let step = {
            let mut state = lock(&self.state);
            state.attempts += 1;
            state.steps.pop_front()
        };

        let (frames, end) = match step {
            None => return Err(TransportError::Connect("connection refused".into())),
            Some(ConnectStep::Fail(reason)) => return Err(TransportError::Connect(reason)),
            Some(ConnectStep::Open(frames)) => (frames, ScriptEnd::Close),
            Some(ConnectStep::OpenThenError(frames, reason)) => (frames, ScriptEnd::Error(reason)),
            Some(ConnectStep::Hold(frames)) => (frames, ScriptEnd::Hold),
        };

        Ok(Box::new(ScriptedConnection {
            frames: frames.into(),
            end,
            state: Arc::clone(&self.state),
        }))
    }
}

#[async_trait]
impl PushConnection for ScriptedConnection {
    async fn recv(&mut self) -> Result<Option<String>> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        match &self.end {
            ScriptEnd::Close => Ok(None),
            ScriptEnd::Error(reason) => Err(TransportError::Connection(reason.clone())),
            ScriptEnd::Hold => std::future::pending().await,
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        lock(&self.state).sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Live push feed
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum FeedFrame {
    Text(String),
    Close,
    Error(String),
}

/// Connector whose connections read frames pushed through a [`PushFeed`].
///
/// Every connect succeeds. All connections share one frame queue, so frames
/// pushed while disconnected are read by the next connection.
pub struct ChannelConnector {
    frames: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<FeedFrame>>>,
    sent: mpsc::UnboundedSender<String>,
    connections: Arc<AtomicUsize>,
}

/// Test-side handle of a [`ChannelConnector`].
pub struct PushFeed {
    frames: mpsc::UnboundedSender<FeedFrame>,
    sent: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    connections: Arc<AtomicUsize>,
}

impl ChannelConnector {
    /// Create a connector and the feed that drives it.
    pub fn new() -> (Self, PushFeed) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));
        (
            Self {
                frames: Arc::new(tokio::sync::Mutex::new(frames_rx)),
                sent: sent_tx,
                connections: Arc::clone(&connections),
            },
            PushFeed {
                frames: frames_tx,
                sent: tokio::sync::Mutex::new(sent_rx),
                connections,
            },
        )
    }
}

impl PushFeed {
    /// Push a text frame to the current (or next) connection.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.frames.send(FeedFrame::Text(text.into()));
    }

    /// Make the current connection end with an orderly close.
    pub fn close(&self) {
        let _ = self.frames.send(FeedFrame::Close);
    }

    /// Make the current connection fail while reading.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.frames.send(FeedFrame::Error(reason.into()));
    }

    /// Wait for the next frame the client sent.
    pub async fn next_sent(&self) -> Option<String> {
        self.sent.lock().await.recv().await
    }

    /// Number of connections opened so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

struct FeedConnection {
    frames: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<FeedFrame>>>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl PushConnector for ChannelConnector {
    async fn connect(&self) -> Result<Box<dyn PushConnection>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FeedConnection {
            frames: Arc::clone(&self.frames),
            sent: self.sent.clone(),
        }))
    }
}

#[async_trait]
impl PushConnection for FeedConnection {
    async fn recv(&mut self) -> Result<Option<String>> {
        let mut frames = self.frames.lock().await;
        match frames.recv().await {
            Some(FeedFrame::Text(text)) => Ok(Some(text)),
            Some(FeedFrame::Close) | None => Ok(None),
            Some(FeedFrame::Error(reason)) => Err(TransportError::Connection(reason)),
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.sent
            .send(text)
            .map_err(|_| TransportError::Send("feed dropped".into()))
    }

    async fn close(&mut self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted pull
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PullScript {
    responses: VecDeque<Result<PullResponse>>,
    requests: Vec<PullRequest>,
}

/// Pull client that replays queued responses.
///
/// Once the queue is empty every request gets an empty response.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPullClient {
    script: Arc<Mutex<PullScript>>,
}

impl ScriptedPullClient {
    /// Create a client with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a decoded response.
    pub fn push_response(&self, response: PullResponse) {
        lock(&self.script).responses.push_back(Ok(response));
    }

    /// Queue a raw JSON body. An undecodable body is replayed as a decode error.
    pub fn push_json(&self, body: &str) {
        let response = PullResponse::decode(body.as_bytes()).map_err(TransportError::from);
        lock(&self.script).responses.push_back(response);
    }

    /// Queue a failed request.
    pub fn push_error(&self, error: TransportError) {
        lock(&self.script).responses.push_back(Err(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<PullRequest> {
        lock(&self.script).requests.clone()
    }

    /// Responses still queued.
    pub fn pending(&self) -> usize {
        lock(&self.script).responses.len()
    }
}

#[async_trait]
impl PullClient for ScriptedPullClient {
    async fn fetch(&self, request: &PullRequest) -> Result<PullResponse> {
        let mut script = lock(&self.script);
        script.requests.push(request.clone());
        script
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(PullResponse::default()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BackendLog {
    next_id: u64,
    /// All data, ascending id.
    data: Vec<WireDatum>,
    requests: usize,
    failures_pending: u32,
}

/// A per-channel append-only log answering pull requests.
///
/// For each requested channel the response lists data with
/// `id > retrieved_id`, newest first, truncated to `count`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a datum and return its id.
    pub fn publish(&self, channel: &str, content: &str, is_final: bool) -> EventId {
        let mut log = lock(&self.log);
        log.next_id += 1;
        let id = log.next_id;
        let mut datum = WireDatum::outbound(channel, content, is_final);
        datum.id = Some(id);
        log.data.push(datum);
        EventId::new(id)
    }

    /// Make the next `count` requests fail with a 503.
    pub fn fail_next(&self, count: u32) {
        lock(&self.log).failures_pending = count;
    }

    /// Number of requests answered or failed.
    pub fn request_count(&self) -> usize {
        lock(&self.log).requests
    }

    /// Build the response for `request` without counting it.
    pub fn answer(&self, request: &PullRequest) -> PullResponse {
        let log = lock(&self.log);
        let mut channel_data = HashMap::new();

        for channel in &request.channels {
            let newest_first: Vec<RawDatum> = log
                .data
                .iter()
                .rev()
                .filter(|d| d.channel.as_deref() == Some(channel.name.as_str()))
                .filter(|d| d.id.unwrap_or(0) > channel.retrieved_id.get())
                .take(channel.count)
                .cloned()
                .map(RawDatum::from)
                .collect();
            channel_data.insert(channel.name.clone(), newest_first);
        }

        PullResponse { channel_data }
    }
}

#[async_trait]
impl PullClient for MemoryBackend {
    async fn fetch(&self, request: &PullRequest) -> Result<PullResponse> {
        {
            let mut log = lock(&self.log);
            log.requests += 1;
            if log.failures_pending > 0 {
                log.failures_pending -= 1;
                return Err(TransportError::Status(503));
            }
        }
        Ok(self.answer(request))
    }
}
