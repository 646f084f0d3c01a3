//! Push event handlers.
//!
//! Callers subscribe functions per event kind. The push adapter invokes them
//! synchronously, in registration order, from its driving task.

use std::sync::Arc;

use caption_sync_core::PushMessage;

use crate::error::TransportError;

type OpenHandler = Arc<dyn Fn() + Send + Sync>;
type MessageHandler = Arc<dyn Fn(&PushMessage) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;
type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Ordered handler lists for open/message/error/close.
///
/// Cloning shares the handler functions, so one set can be installed on
/// every session an engine starts.
#[derive(Clone, Default)]
pub struct PushHandlers {
    open: Vec<OpenHandler>,
    message: Vec<MessageHandler>,
    error: Vec<ErrorHandler>,
    close: Vec<CloseHandler>,
}

impl PushHandlers {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time a connection opens.
    pub fn on_open(&mut self, handler: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.open.push(Arc::new(handler));
        self
    }

    /// Called with every decoded inbound message, before its data are delivered.
    pub fn on_message(
        &mut self,
        handler: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> &mut Self {
        self.message.push(Arc::new(handler));
        self
    }

    /// Called on connection errors and once on budget exhaustion.
    pub fn on_error(
        &mut self,
        handler: impl Fn(&TransportError) + Send + Sync + 'static,
    ) -> &mut Self {
        self.error.push(Arc::new(handler));
        self
    }

    /// Called each time an open connection ends.
    pub fn on_close(&mut self, handler: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.close.push(Arc::new(handler));
        self
    }

    /// Append every handler of `other` after the ones already registered.
    pub fn extend(&mut self, other: PushHandlers) {
        self.open.extend(other.open);
        self.message.extend(other.message);
        self.error.extend(other.error);
        self.close.extend(other.close);
    }

    pub(crate) fn emit_open(&self) {
        for handler in &self.open {
            handler();
        }
    }

    pub(crate) fn emit_message(&self, message: &PushMessage) {
        for handler in &self.message {
            handler(message);
        }
    }

    pub(crate) fn emit_error(&self, error: &TransportError) {
        for handler in &self.error {
            handler(error);
        }
    }

    pub(crate) fn emit_close(&self) {
        for handler in &self.close {
            handler();
        }
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.open.len() + self.message.len() + self.error.len() + self.close.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PushHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushHandlers")
            .field("open", &self.open.len())
            .field("message", &self.message.len())
            .field("error", &self.error.len())
            .field("close", &self.close.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handlers = PushHandlers::new();

        let l = Arc::clone(&log);
        handlers.on_open(move || l.lock().unwrap().push("first"));
        let l = Arc::clone(&log);
        handlers.on_open(move || l.lock().unwrap().push("second"));
        let l = Arc::clone(&log);
        handlers.on_close(move || l.lock().unwrap().push("closed"));

        handlers.emit_open();
        handlers.emit_close();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "closed"]);
    }

    #[test]
    fn test_clone_shares_handlers() {
        let log = Arc::new(Mutex::new(0));
        let mut handlers = PushHandlers::new();
        let l = Arc::clone(&log);
        handlers.on_close(move || *l.lock().unwrap() += 1);

        let copy = handlers.clone();
        handlers.emit_close();
        copy.emit_close();

        assert_eq!(*log.lock().unwrap(), 2);
    }

    #[test]
    fn test_extend_appends() {
        let mut a = PushHandlers::new();
        a.on_error(|_| {});
        let mut b = PushHandlers::new();
        b.on_error(|_| {});
        b.on_message(|_| {});
        a.extend(b);
        assert_eq!(a.len(), 3);
    }
}
