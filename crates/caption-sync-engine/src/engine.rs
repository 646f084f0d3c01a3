//! The synchronization engine.
//!
//! One [`SyncEngine`] owns the channel registry, the staleness tracker and
//! at most one transport session. A session is a single spawned driver task
//! that polls the transport and the staleness deadlines side by side.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use caption_sync_core::{validate_raw, EventId, PushMessage, RawDatum, UpdateEvent, WireDatum};
use caption_sync_transport::{
    EventSink, HttpPullClient, PullAdapter, PullClient, PushAdapter, PushConnector, PushHandlers,
    SessionEvent, Submitter, Transport, TransportError, TransportMode, WebSocketConnector,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Result, SyncError};
use crate::registry::{Advance, ChannelRegistry, TargetState};
use crate::staleness::StalenessTracker;
use crate::status::{SessionStatus, SyncStats};
use crate::target::{DisplayTarget, TargetDiscovery, TargetId};

/// What happened to an event offered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Rendered on `targets` live targets.
    Applied { targets: usize },
    /// Below the channel cursor; nothing changed.
    Rejected { cursor: EventId },
    /// No such channel; nothing changed.
    UnknownChannel,
}

/// Content to send to the backend over a push session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDatum {
    pub channel: String,
    pub content: String,
    pub is_final: bool,
}

impl OutboundDatum {
    pub fn new(channel: impl Into<String>, content: impl Into<String>, is_final: bool) -> Self {
        Self {
            channel: channel.into(),
            content: content.into(),
            is_final,
        }
    }

    fn into_wire(self) -> WireDatum {
        WireDatum::outbound(self.channel, self.content, self.is_final)
    }
}

struct EngineState {
    config: EngineConfig,
    registry: ChannelRegistry,
    staleness: StalenessTracker,
    status: SessionStatus,
    stats: SyncStats,
    /// Bumped per session so a finished session cannot touch its successor.
    generation: u64,
    cancel: Option<CancellationToken>,
    submitter: Option<Submitter>,
}

impl EngineState {
    fn new(config: EngineConfig) -> Self {
        Self {
            staleness: StalenessTracker::new(config.stale_after),
            config,
            registry: ChannelRegistry::new(),
            status: SessionStatus::default(),
            stats: SyncStats::default(),
            generation: 0,
            cancel: None,
            submitter: None,
        }
    }

    fn apply(&mut self, event: &UpdateEvent, now: Instant) -> ApplyOutcome {
        match self.registry.advance(&event.channel, event.id) {
            Advance::Unknown => {
                self.stats.unknown_channel += 1;
                tracing::trace!(channel = %event.channel, id = %event.id, "event for unknown channel");
                return ApplyOutcome::UnknownChannel;
            }
            Advance::Rejected { cursor } => {
                self.stats.rejected += 1;
                tracing::debug!(
                    channel = %event.channel,
                    id = %event.id,
                    %cursor,
                    "event below cursor"
                );
                return ApplyOutcome::Rejected { cursor };
            }
            Advance::Accepted { .. } => {}
        }

        if event.is_final {
            self.registry
                .persist(&event.channel, event.id, &event.content);
        }

        let frame = self.config.interim_style.frame(event);
        let targets = self.registry.live_targets(&event.channel);
        for (id, target) in &targets {
            target.render(&frame);
            self.registry.mark_applied(*id, event.id);
            if self.registry.set_stale(*id, false) {
                target.set_stale(false);
            }
            self.staleness.rearm(*id, now);
        }

        self.stats.applied += 1;
        tracing::debug!(
            channel = %event.channel,
            id = %event.id,
            is_final = event.is_final,
            targets = targets.len(),
            "applied event"
        );
        ApplyOutcome::Applied {
            targets: targets.len(),
        }
    }

    fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        for id in self.staleness.expire(now) {
            if !self.registry.set_stale(id, true) {
                continue;
            }
            if let Some(target) = self.registry.target(id) {
                target.set_stale(true);
            }
            self.stats.expired += 1;
            expired += 1;
            tracing::debug!(?id, "target went stale");
        }
        expired
    }
}

struct Shared {
    state: Mutex<EngineState>,
    /// Signalled whenever a deadline may have moved.
    rearmed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The engine as seen by one session's transport.
struct SessionSink {
    shared: Arc<Shared>,
    generation: u64,
}

impl SessionSink {
    fn is_current(&self, state: &EngineState) -> bool {
        state.status.running && state.generation == self.generation
    }

    fn expire_due(&self) {
        let mut state = self.shared.lock();
        if state.generation == self.generation {
            state.expire(Instant::now());
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.shared.lock().staleness.next_deadline()
    }

    fn finish(&self, outcome: &std::result::Result<(), TransportError>) {
        let mut state = self.shared.lock();
        if state.generation != self.generation {
            return;
        }
        let was_running = state.status.running;
        state.status.running = false;
        state.submitter = None;
        match outcome {
            Err(e) => tracing::error!("session ended: {}", e),
            Ok(()) if was_running => tracing::info!("session ended"),
            Ok(()) => {}
        }
    }
}

impl EventSink for SessionSink {
    fn is_running(&self) -> bool {
        let state = self.shared.lock();
        self.is_current(&state)
    }

    fn cursors(&self) -> Vec<(String, EventId)> {
        self.shared.lock().registry.cursors()
    }

    fn deliver(&self, datum: RawDatum) {
        let mut state = self.shared.lock();
        if !self.is_current(&state) {
            return;
        }

        let event = match validate_raw(datum) {
            Ok(event) => event,
            Err(e) => {
                state.stats.malformed += 1;
                tracing::warn!("dropping malformed event: {}", e);
                return;
            }
        };

        let outcome = state.apply(&event, Instant::now());
        drop(state);

        if matches!(outcome, ApplyOutcome::Applied { targets } if targets > 0) {
            self.shared.rearmed.notify_one();
        }
    }

    fn on_session_event(&self, event: SessionEvent) {
        let mut state = self.shared.lock();
        if state.generation != self.generation {
            return;
        }
        match event {
            SessionEvent::PushState { state: push, retry_count } => {
                state.status.push_state = Some(push);
                state.status.retry_count = retry_count;
            }
            SessionEvent::Reconnecting { .. } => state.stats.reconnects += 1,
            SessionEvent::TransportFailed => state.stats.failed_cycles += 1,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Body of the driver task.
async fn drive(
    sink: SessionSink,
    mut transport: Box<dyn Transport>,
    cancel: CancellationToken,
) -> Result<()> {
    let shared = Arc::clone(&sink.shared);

    let outcome = {
        let mut session = transport.run(&sink, cancel.clone());
        loop {
            let deadline = sink.next_deadline();
            tokio::select! {
                outcome = &mut session => break outcome,
                _ = sleep_until(deadline) => sink.expire_due(),
                _ = shared.rearmed.notified() => {}
            }
        }
    };

    sink.finish(&outcome);

    if outcome.is_err() {
        // Targets keep aging after the transport gave up.
        while let Some(deadline) = sink.next_deadline() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => sink.expire_due(),
            }
        }
    }

    outcome.map_err(SyncError::from)
}

/// Keeps display targets in step with per-channel backend logs.
///
/// ```rust,ignore
/// let mut engine = SyncEngine::new(EngineConfig::default().endpoint("http://127.0.0.1:57000/output"))?;
/// let target = Arc::new(MyTarget::default());
/// engine.register("user", &target);
/// engine.run()?;
/// // ...
/// engine.shutdown().await?;
/// ```
pub struct SyncEngine {
    shared: Arc<Shared>,
    handlers: PushHandlers,
    discovery: Vec<Box<dyn TargetDiscovery>>,
    /// Targets supplied by discovery hooks; the engine keeps them alive.
    discovered: Vec<Arc<dyn DisplayTarget>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl SyncEngine {
    /// Create an engine with a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState::new(config)),
                rearmed: Notify::new(),
            }),
            handlers: PushHandlers::new(),
            discovery: Vec::new(),
            discovered: Vec::new(),
            task: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind `target` to `channel`, creating the channel if needed. Idempotent.
    pub fn register<T: DisplayTarget + 'static>(&self, channel: &str, target: &Arc<T>) -> TargetId {
        let target: Arc<dyn DisplayTarget> = target.clone();
        self.register_dyn(channel, &target)
    }

    /// [`SyncEngine::register`] for trait objects.
    pub fn register_dyn(&self, channel: &str, target: &Arc<dyn DisplayTarget>) -> TargetId {
        let id = TargetId::of(target);
        let added = self
            .shared
            .lock()
            .registry
            .register(channel, id, Arc::downgrade(target));
        if added {
            tracing::debug!(channel, ?id, "target registered");
        }
        id
    }

    /// Remove `target` from `channel`. The channel keeps its cursor.
    pub fn unbind(&self, channel: &str, target: TargetId) -> bool {
        let mut state = self.shared.lock();
        let removed = state.registry.unbind(channel, target);
        if removed && state.registry.target_state(target).is_none() {
            state.staleness.disarm(target);
        }
        removed
    }

    /// Add a hook consulted by `run()` when no channel is registered.
    pub fn add_discovery(&mut self, discovery: impl TargetDiscovery + 'static) {
        self.discovery.push(Box::new(discovery));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the configuration. Rejected while a session is running.
    pub fn configure(&self, config: EngineConfig) -> Result<()> {
        let mut state = self.shared.lock();
        if state.status.running {
            return Err(SyncError::Configuration(
                "cannot configure while a session is running".into(),
            ));
        }
        config.validate()?;
        state.staleness.set_threshold(config.stale_after);
        state.config = config;
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> EngineConfig {
        self.shared.lock().config.clone()
    }

    /// Called each time a push connection opens.
    pub fn on_push_open(&mut self, handler: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.handlers.on_open(handler);
        self
    }

    /// Called with every decoded push message.
    pub fn on_push_message(
        &mut self,
        handler: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> &mut Self {
        self.handlers.on_message(handler);
        self
    }

    /// Called on push errors, and once with the terminal error on exhaustion.
    pub fn on_push_error(
        &mut self,
        handler: impl Fn(&TransportError) + Send + Sync + 'static,
    ) -> &mut Self {
        self.handlers.on_error(handler);
        self
    }

    /// Called each time a push connection ends.
    pub fn on_push_close(&mut self, handler: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.handlers.on_close(handler);
        self
    }

    /// A push adapter over `connector` with this engine's policy and handlers.
    pub fn push_adapter<C: PushConnector>(&self, connector: C) -> PushAdapter<C> {
        let policy = self.shared.lock().config.reconnect.clone();
        PushAdapter::new(connector, policy).with_handlers(self.handlers.clone())
    }

    /// A pull adapter over `client` with this engine's cadence.
    pub fn pull_adapter<P: PullClient>(&self, client: P) -> PullAdapter<P> {
        let settings = self.shared.lock().config.pull.clone();
        PullAdapter::new(client, settings)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    /// Start the transport the configured endpoint selects.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&mut self) -> Result<()> {
        self.ensure_startable()?;

        let config = self.config();
        let (mode, url) = config.mode()?;
        let transport: Box<dyn Transport> = match mode {
            TransportMode::Push => Box::new(self.push_adapter(WebSocketConnector::new(url))),
            TransportMode::Pull => {
                let client = HttpPullClient::new(
                    url,
                    &config.transport.method,
                    config.transport.request_timeout,
                )
                .map_err(|e| SyncError::Configuration(e.to_string()))?;
                Box::new(self.pull_adapter(client))
            }
        };

        self.start(transport)
    }

    /// Start a session over a caller-built transport.
    pub fn run_with<T: Transport + 'static>(&mut self, transport: T) -> Result<()> {
        self.ensure_startable()?;
        self.start(Box::new(transport))
    }

    fn ensure_startable(&mut self) -> Result<()> {
        if self.shared.lock().status.running {
            return Err(SyncError::AlreadyRunning);
        }
        if self.shared.lock().registry.is_empty() {
            self.discover();
        }
        if self.shared.lock().registry.is_empty() {
            return Err(SyncError::NoChannels);
        }
        Ok(())
    }

    fn discover(&mut self) {
        let found: Vec<_> = self.discovery.iter().flat_map(|d| d.discover()).collect();
        for (channel, target) in found {
            self.register_dyn(&channel, &target);
            self.discovered.push(target);
        }
        if !self.discovered.is_empty() {
            tracing::info!(targets = self.discovered.len(), "discovered display targets");
        }
    }

    fn start(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        let cancel = CancellationToken::new();
        let mode = transport.mode();

        let generation = {
            let mut state = self.shared.lock();
            if state.status.running {
                return Err(SyncError::AlreadyRunning);
            }
            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            state.generation += 1;
            state.status = SessionStatus {
                mode: Some(mode),
                running: true,
                push_state: None,
                retry_count: 0,
                retry_budget: match mode {
                    TransportMode::Push => state.config.reconnect.max_attempts,
                    TransportMode::Pull => 0,
                },
            };
            state.submitter = transport.submitter();
            state.cancel = Some(cancel.clone());
            let threshold = state.config.stale_after;
            state.staleness.set_threshold(threshold);
            tracing::info!(%mode, channels = state.registry.len(), "session started");
            state.generation
        };

        let sink = SessionSink {
            shared: Arc::clone(&self.shared),
            generation,
        };
        self.task = Some(tokio::spawn(drive(sink, transport, cancel)));
        Ok(())
    }

    /// Tear down the session. Idempotent.
    ///
    /// Once this returns no further event is applied and no target expires.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        let was_running = state.status.running;
        state.status.running = false;
        state.submitter = None;
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.staleness.clear();
        drop(state);

        if was_running {
            tracing::info!("session stopped");
        }
    }

    /// Wait for the driver task to end and return its outcome.
    ///
    /// After exhaustion the driver keeps expiring targets until none are
    /// pending or `stop()` is called. Cancel-safe: dropping the future keeps
    /// the task joinable.
    pub async fn join(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        joined.map_err(|e| SyncError::Task(e.to_string()))?
    }

    /// `stop()` followed by `join()`.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stop();
        self.join().await
    }

    /// Whether a session is running.
    pub fn is_running(&self) -> bool {
        self.shared.lock().status.running
    }

    /// Send content to the backend over the running push session.
    pub fn submit(&self, datum: OutboundDatum) -> Result<()> {
        let submitter = {
            let state = self.shared.lock();
            match (&state.submitter, state.status.running) {
                (Some(submitter), true) => submitter.clone(),
                _ => return Err(SyncError::NotRunning),
            }
        };
        submitter.submit(datum.into_wire()).map_err(SyncError::Transport)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Application
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply one event with the cursor rule, rendering it on every target
    /// bound to its channel.
    pub fn apply_event(&self, event: &UpdateEvent) -> ApplyOutcome {
        let outcome = self.shared.lock().apply(event, Instant::now());
        if matches!(outcome, ApplyOutcome::Applied { targets } if targets > 0) {
            self.shared.rearmed.notify_one();
        }
        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Session snapshot.
    pub fn status(&self) -> SessionStatus {
        self.shared.lock().status
    }

    /// Counters.
    pub fn stats(&self) -> SyncStats {
        self.shared.lock().stats
    }

    /// Registered channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.shared
            .lock()
            .registry
            .cursors()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Cursor of `channel`.
    pub fn channel_cursor(&self, channel: &str) -> Option<EventId> {
        self.shared.lock().registry.cursor(channel)
    }

    /// Last final content applied on `channel`.
    pub fn persisted(&self, channel: &str) -> Option<(EventId, String)> {
        self.shared
            .lock()
            .registry
            .channel(channel)
            .and_then(|c| c.persisted())
            .map(|(id, text)| (id, text.to_string()))
    }

    /// Whether `target` is stale. `None` if it is not bound.
    pub fn is_stale(&self, target: TargetId) -> Option<bool> {
        self.target_state(target).map(|s| s.stale)
    }

    /// Bookkeeping for `target`.
    pub fn target_state(&self, target: TargetId) -> Option<TargetState> {
        self.shared.lock().registry.target_state(target)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState::new(EngineConfig::default())),
                rearmed: Notify::new(),
            }),
            handlers: PushHandlers::new(),
            discovery: Vec::new(),
            discovered: Vec::new(),
            task: None,
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
