//! Test fixtures and helpers.
//!
//! Common setup code for engine and integration tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use caption_sync_core::{RenderFrame, UpdateEvent, WireDatum, FLAG_IS_FINAL};
use caption_sync_engine::{DisplayTarget, EngineConfig, SyncEngine, TargetId};
use caption_sync_transport::{PullClient, PushConnector};
use serde_json::json;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A display target that records everything it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    frames: Mutex<Vec<RenderFrame>>,
    stale: Mutex<Vec<bool>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame rendered, in order.
    pub fn frames(&self) -> Vec<RenderFrame> {
        lock(&self.frames).clone()
    }

    /// Text of every frame rendered, in order.
    pub fn texts(&self) -> Vec<String> {
        lock(&self.frames).iter().map(|f| f.text.clone()).collect()
    }

    pub fn last(&self) -> Option<RenderFrame> {
        lock(&self.frames).last().cloned()
    }

    pub fn last_text(&self) -> Option<String> {
        self.last().map(|f| f.text)
    }

    pub fn render_count(&self) -> usize {
        lock(&self.frames).len()
    }

    /// Every stale transition, in order.
    pub fn stale_changes(&self) -> Vec<bool> {
        lock(&self.stale).clone()
    }

    pub fn is_stale(&self) -> bool {
        lock(&self.stale).last().copied().unwrap_or(false)
    }

    /// Poll until at least `count` frames were rendered.
    ///
    /// Panics after `timeout`.
    pub async fn wait_for_renders(&self, count: usize, timeout: Duration) {
        let poll = async {
            while self.render_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        if tokio::time::timeout(timeout, poll).await.is_err() {
            panic!(
                "expected {count} renders within {timeout:?}, got {:?}",
                self.texts()
            );
        }
    }
}

impl DisplayTarget for RecordingTarget {
    fn render(&self, frame: &RenderFrame) {
        lock(&self.frames).push(frame.clone());
    }

    fn set_stale(&self, stale: bool) {
        lock(&self.stale).push(stale);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event builders
// ─────────────────────────────────────────────────────────────────────────────

/// A final event.
pub fn final_text(channel: &str, id: u64, content: &str) -> UpdateEvent {
    UpdateEvent::final_text(channel, id, content)
}

/// An interim event.
pub fn interim(channel: &str, id: u64, content: &str) -> UpdateEvent {
    UpdateEvent::interim(channel, id, content)
}

/// A wire datum with every field set.
pub fn datum(channel: &str, id: u64, content: &str, is_final: bool) -> WireDatum {
    let mut datum = WireDatum::outbound(channel, content, is_final);
    datum.id = Some(id);
    datum
}

fn datum_json(channel: &str, id: u64, content: &str, is_final: bool) -> serde_json::Value {
    let flags: Vec<&str> = if is_final { vec![FLAG_IS_FINAL] } else { Vec::new() };
    json!({ "channel": channel, "id": id, "content": content, "flags": flags })
}

/// A pull response body for one channel. `items` are newest first.
pub fn pull_body(channel: &str, items: &[(u64, &str, bool)]) -> String {
    let data: Vec<_> = items
        .iter()
        .map(|(id, content, is_final)| datum_json(channel, *id, content, *is_final))
        .collect();
    json!({ "channel_data": { channel: data } }).to_string()
}

/// A single-datum push message.
pub fn push_single(channel: &str, id: u64, content: &str, is_final: bool) -> String {
    json!({ "channel_datum": datum_json(channel, id, content, is_final) }).to_string()
}

/// A batch push message, in application order.
pub fn push_batch(items: &[(&str, u64, &str, bool)]) -> String {
    let data: Vec<_> = items
        .iter()
        .map(|(channel, id, content, is_final)| datum_json(channel, *id, content, *is_final))
        .collect();
    json!({ "channel_data": data }).to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine fixture
// ─────────────────────────────────────────────────────────────────────────────

/// An engine with one [`RecordingTarget`] per channel.
pub struct EngineFixture {
    pub engine: SyncEngine,
    targets: BTreeMap<String, (TargetId, Arc<RecordingTarget>)>,
}

impl EngineFixture {
    /// Default configuration, pull endpoint.
    pub fn new(channels: &[&str]) -> Self {
        Self::with_config(
            EngineConfig::default().endpoint("http://127.0.0.1:57000/output"),
            channels,
        )
    }

    /// Custom configuration.
    pub fn with_config(config: EngineConfig, channels: &[&str]) -> Self {
        let engine = SyncEngine::new(config)
            .unwrap_or_else(|e| panic!("fixture configuration rejected: {e}"));
        let targets = channels
            .iter()
            .map(|channel| {
                let target = Arc::new(RecordingTarget::new());
                let id = engine.register(channel, &target);
                (channel.to_string(), (id, target))
            })
            .collect();
        Self { engine, targets }
    }

    /// The recording target of `channel`.
    pub fn target(&self, channel: &str) -> &Arc<RecordingTarget> {
        &self.targets[channel].1
    }

    /// The target id of `channel`'s recording target.
    pub fn target_id(&self, channel: &str) -> TargetId {
        self.targets[channel].0
    }

    /// Start a pull session over `client`.
    pub fn start_pull<P: PullClient + 'static>(&mut self, client: P) {
        let adapter = self.engine.pull_adapter(client);
        self.engine
            .run_with(adapter)
            .unwrap_or_else(|e| panic!("fixture session failed to start: {e}"));
    }

    /// Start a push session over `connector`.
    pub fn start_push<C: PushConnector + 'static>(&mut self, connector: C) {
        let adapter = self.engine.push_adapter(connector);
        self.engine
            .run_with(adapter)
            .unwrap_or_else(|e| panic!("fixture session failed to start: {e}"));
    }
}
