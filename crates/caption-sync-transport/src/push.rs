//! Push adapter: persistent connection with bounded reconnects.
//!
//! Inbound messages are decoded as a single datum or an ordered batch and
//! delivered in order. Outbound submissions share the same connection.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use caption_sync_core::{PushMessage, WireDatum};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::endpoint::TransportMode;
use crate::error::{Result, TransportError};
use crate::handlers::PushHandlers;
use crate::traits::{EventSink, PushConnection, PushConnector, SessionEvent, Transport};

/// Capacity of the outbound submission queue.
const OUTBOUND_CAPACITY: usize = 64;

/// States of the push session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushState {
    /// Establishing a connection.
    Connecting,
    /// Connected and receiving.
    Open,
    /// The peer closed the connection.
    Closed,
    /// Connecting or reading failed.
    Erroring,
    /// The retry budget is spent. Terminal.
    Failed,
}

impl fmt::Display for PushState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushState::Connecting => write!(f, "connecting"),
            PushState::Open => write!(f, "open"),
            PushState::Closed => write!(f, "closed"),
            PushState::Erroring => write!(f, "erroring"),
            PushState::Failed => write!(f, "failed"),
        }
    }
}

/// Reconnect behaviour of the push adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub interval: Duration,
    /// Reconnects allowed after consecutive failures before giving up.
    pub max_attempts: u32,
    /// Growth factor applied per consecutive failure. 1.0 keeps the delay fixed.
    pub decay: f64,
    /// Upper bound on the delay.
    pub max_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 10,
            decay: 1.0,
            max_interval: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = if self.decay.is_finite() && self.decay > 0.0 {
            self.decay.powi(exponent)
        } else {
            1.0
        };
        let millis = self.interval.as_millis() as f64 * factor;
        let capped = millis.min(self.max_interval.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Queues outbound data onto the push connection.
///
/// Submissions wait in a bounded queue while the connection is down and
/// are sent once it is open again. No response is correlated.
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: mpsc::Sender<PushMessage>,
}

impl Submitter {
    /// Queue a single datum.
    pub fn submit(&self, datum: WireDatum) -> Result<()> {
        self.submit_message(PushMessage::single(datum))
    }

    /// Queue a prepared message.
    pub fn submit_message(&self, message: PushMessage) -> Result<()> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Send("outbound queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                TransportError::Send("push session has ended".into())
            }
        })
    }
}

/// How one open connection ended.
enum ConnectionEnd {
    Cancelled,
    Closed,
    Failed(TransportError),
}

/// Persistent-connection transport.
pub struct PushAdapter<C: PushConnector> {
    connector: C,
    policy: ReconnectPolicy,
    handlers: PushHandlers,
    state: PushState,
    retry_count: u32,
    outbound_tx: mpsc::Sender<PushMessage>,
    outbound_rx: mpsc::Receiver<PushMessage>,
}

impl<C: PushConnector> PushAdapter<C> {
    /// Create an adapter over `connector`.
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        Self {
            connector,
            policy,
            handlers: PushHandlers::new(),
            state: PushState::Connecting,
            retry_count: 0,
            outbound_tx,
            outbound_rx,
        }
    }

    /// Install event handlers.
    pub fn with_handlers(mut self, handlers: PushHandlers) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Mutable access to the handler lists.
    pub fn handlers_mut(&mut self) -> &mut PushHandlers {
        &mut self.handlers
    }

    /// Current state.
    pub fn state(&self) -> PushState {
        self.state
    }

    /// Consecutive failures since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn set_state(&mut self, state: PushState, sink: &dyn EventSink) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "push state change");
        }
        self.state = state;
        sink.on_session_event(SessionEvent::PushState {
            state,
            retry_count: self.retry_count,
        });
    }

    /// Read frames until the connection ends or the session is cancelled.
    async fn pump(
        &mut self,
        conn: &mut dyn PushConnection,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> ConnectionEnd {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ConnectionEnd::Cancelled,
                Some(message) = self.outbound_rx.recv() => {
                    let text = match message.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("dropping unencodable submission: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = conn.send(text).await {
                        return ConnectionEnd::Failed(e);
                    }
                }
                frame = conn.recv() => match frame {
                    Ok(Some(text)) => self.handle_text(&text, sink),
                    Ok(None) => return ConnectionEnd::Closed,
                    Err(e) => return ConnectionEnd::Failed(e),
                },
            }
        }
    }

    /// Decode one text frame and deliver its data in order.
    fn handle_text(&self, text: &str, sink: &dyn EventSink) {
        let message = match PushMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("dropping undecodable push message: {}", e);
                sink.on_session_event(SessionEvent::TransportFailed);
                return;
            }
        };

        self.handlers.emit_message(&message);

        for datum in message.into_data() {
            if !sink.is_running() {
                break;
            }
            sink.deliver(datum);
        }
    }
}

#[async_trait]
impl<C: PushConnector> Transport for PushAdapter<C> {
    fn mode(&self) -> TransportMode {
        TransportMode::Push
    }

    async fn run(&mut self, sink: &dyn EventSink, cancel: CancellationToken) -> Result<()> {
        self.retry_count = 0;

        loop {
            self.set_state(PushState::Connecting, sink);

            let connected = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                connected = self.connector.connect() => connected,
            };

            match connected {
                Ok(mut conn) => {
                    self.retry_count = 0;
                    self.set_state(PushState::Open, sink);
                    tracing::info!("push connection open");
                    self.handlers.emit_open();

                    match self.pump(conn.as_mut(), sink, &cancel).await {
                        ConnectionEnd::Cancelled => {
                            conn.close().await;
                            self.handlers.emit_close();
                            return Ok(());
                        }
                        ConnectionEnd::Closed => {
                            tracing::info!("push connection closed by peer");
                            self.set_state(PushState::Closed, sink);
                            self.handlers.emit_close();
                        }
                        ConnectionEnd::Failed(e) => {
                            tracing::warn!("push connection failed: {}", e);
                            self.set_state(PushState::Erroring, sink);
                            self.handlers.emit_error(&e);
                            self.handlers.emit_close();
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("push connect failed: {}", e);
                    self.set_state(PushState::Erroring, sink);
                    self.handlers.emit_error(&e);
                }
            }

            self.retry_count += 1;
            if self.retry_count > self.policy.max_attempts {
                let error = TransportError::Exhausted {
                    attempts: self.retry_count,
                };
                tracing::error!("{}", error);
                self.set_state(PushState::Failed, sink);
                self.handlers.emit_error(&error);
                return Err(error);
            }

            let delay = self.policy.delay_for(self.retry_count);
            tracing::info!(
                attempt = self.retry_count,
                budget = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling push reconnect"
            );
            sink.on_session_event(SessionEvent::Reconnecting {
                attempt: self.retry_count,
                delay,
            });

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn submitter(&self) -> Option<Submitter> {
        Some(Submitter {
            tx: self.outbound_tx.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ChannelConnector, ConnectStep, ScriptedConnector};
    use caption_sync_core::{EventId, RawDatum};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CollectingSink {
        delivered: Mutex<Vec<WireDatum>>,
        ill_typed: AtomicUsize,
        events: Mutex<Vec<SessionEvent>>,
    }

    impl EventSink for CollectingSink {
        fn is_running(&self) -> bool {
            true
        }

        fn cursors(&self) -> Vec<(String, EventId)> {
            Vec::new()
        }

        fn deliver(&self, datum: RawDatum) {
            match datum.into_datum() {
                Ok(datum) => self.delivered.lock().unwrap().push(datum),
                Err(_) => {
                    self.ill_typed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        fn on_session_event(&self, event: SessionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_delay_fixed_by_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(7), Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_decay_is_capped() {
        let policy = ReconnectPolicy {
            interval: Duration::from_millis(100),
            max_attempts: 10,
            decay: 2.0,
            max_interval: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_budget() {
        let connector = ScriptedConnector::failing();
        let observed = connector.clone();

        let exhausted = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let mut handlers = PushHandlers::new();
        let counter = Arc::clone(&exhausted);
        let all = Arc::clone(&errors);
        handlers.on_error(move |e| {
            all.fetch_add(1, Ordering::SeqCst);
            if e.is_terminal() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut adapter =
            PushAdapter::new(connector, ReconnectPolicy::default()).with_handlers(handlers);
        let sink = CollectingSink::default();

        let result = adapter.run(&sink, CancellationToken::new()).await;

        assert!(matches!(result, Err(TransportError::Exhausted { attempts: 11 })));
        assert_eq!(observed.attempts(), 11);
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 12);
        assert_eq!(adapter.state(), PushState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_retry_count() {
        let batch = r#"{"channel_data":[
            {"channel":"user","content":"a","flags":[],"id":1},
            {"channel":"user","content":"ab","flags":["is_final"],"id":2}
        ]}"#;
        let connector = ScriptedConnector::new(vec![
            ConnectStep::Fail("refused".into()),
            ConnectStep::Fail("refused".into()),
            ConnectStep::Open(vec![batch.to_string()]),
        ]);
        let observed = connector.clone();

        let policy = ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        };
        let mut adapter = PushAdapter::new(connector, policy);
        let sink = CollectingSink::default();

        // Two failures, one open that closes, then two more failures once the
        // script runs dry exhaust the reset budget.
        let result = adapter.run(&sink, CancellationToken::new()).await;
        assert!(matches!(result, Err(TransportError::Exhausted { attempts: 3 })));
        assert_eq!(observed.attempts(), 5);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].id, Some(1));
        assert_eq!(delivered[1].id, Some(2));

        let events = sink.events.lock().unwrap();
        assert!(events.contains(&SessionEvent::PushState {
            state: PushState::Open,
            retry_count: 0
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_message_is_skipped() {
        let connector = ScriptedConnector::new(vec![ConnectStep::Open(vec![
            "garbage".to_string(),
            r#"{"channel_datum":{"channel":"user","content":"x","id":4,"flags":[]}}"#.to_string(),
        ])]);
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        };
        let mut adapter = PushAdapter::new(connector, policy);
        let sink = CollectingSink::default();

        let _ = adapter.run(&sink, CancellationToken::new()).await;

        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
        assert!(sink
            .events
            .lock()
            .unwrap()
            .contains(&SessionEvent::TransportFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ill_typed_datum_does_not_drop_batch() {
        let batch = r#"{"channel_data":[
            {"channel":"user","content":"a","flags":[],"id":1},
            {"channel":"user","content":"ab","flags":[],"id":"2"},
            {"channel":"user","content":"abc","flags":["is_final"],"id":3}
        ]}"#;
        let connector = ScriptedConnector::new(vec![ConnectStep::Open(vec![batch.to_string()])]);
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        };
        let mut adapter = PushAdapter::new(connector, policy);
        let sink = CollectingSink::default();

        let _ = adapter.run(&sink, CancellationToken::new()).await;

        let ids: Vec<_> = sink.delivered.lock().unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![Some(1), Some(3)]);
        assert_eq!(sink.ill_typed.load(Ordering::SeqCst), 1);
        assert!(!sink
            .events
            .lock()
            .unwrap()
            .contains(&SessionEvent::TransportFailed));
    }

    #[tokio::test]
    async fn test_cancel_while_open_returns_ok() {
        let (connector, feed) = ChannelConnector::new();
        let mut adapter = PushAdapter::new(connector, ReconnectPolicy::default());
        let sink = Arc::new(CollectingSink::default());
        let cancel = CancellationToken::new();

        let task_sink = Arc::clone(&sink);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let result = adapter.run(task_sink.as_ref(), task_cancel).await;
            (result, adapter.state())
        });

        feed.push_text(r#"{"channel_datum":{"channel":"user","content":"hi","id":1,"flags":[]}}"#);
        for _ in 0..50 {
            if !sink.delivered.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let (result, _) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submission_is_sent_on_open_connection() {
        let (connector, feed) = ChannelConnector::new();
        let mut adapter = PushAdapter::new(connector, ReconnectPolicy::default());
        let submitter = adapter.submitter().unwrap();
        let sink = Arc::new(CollectingSink::default());
        let cancel = CancellationToken::new();

        submitter
            .submit(WireDatum::outbound("user", "typed", true))
            .unwrap();

        let task_sink = Arc::clone(&sink);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { adapter.run(task_sink.as_ref(), task_cancel).await });

        let sent = feed.next_sent().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&sent).unwrap();
        assert_eq!(value["channel_datum"]["content"], "typed");

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
