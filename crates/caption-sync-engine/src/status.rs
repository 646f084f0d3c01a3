//! Session status and counters.

use caption_sync_transport::{PushState, TransportMode};

/// Snapshot of the transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    /// Mode of the current or last session.
    pub mode: Option<TransportMode>,
    /// Whether a session is running.
    pub running: bool,
    /// Push state machine position. `None` in pull mode.
    pub push_state: Option<PushState>,
    /// Consecutive push failures since the last successful open.
    pub retry_count: u32,
    /// Push reconnect budget.
    pub retry_budget: u32,
}

/// Counters accumulated over the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    /// Events that passed the cursor rule and were rendered.
    pub applied: u64,
    /// Events below their channel cursor.
    pub rejected: u64,
    /// Events for channels nobody registered.
    pub unknown_channel: u64,
    /// Data that failed validation.
    pub malformed: u64,
    /// Failed pull cycles plus undecodable push messages.
    pub failed_cycles: u64,
    /// Push reconnects scheduled.
    pub reconnects: u64,
    /// Times a target went stale.
    pub expired: u64,
}
