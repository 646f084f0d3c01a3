//! Channel registry: cursors and target bindings.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use caption_sync_core::EventId;

use crate::target::{DisplayTarget, TargetId};

/// Result of offering an event id to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The channel is not registered.
    Unknown,
    /// The id is below the cursor.
    Rejected { cursor: EventId },
    /// The id was accepted; the cursor now equals `max(previous, id)`.
    Accepted { previous: EventId },
}

/// A registered channel.
#[derive(Debug, Default)]
pub struct Channel {
    cursor: EventId,
    targets: Vec<TargetId>,
    persisted: Option<(EventId, String)>,
}

impl Channel {
    /// Highest id ever applied.
    pub fn cursor(&self) -> EventId {
        self.cursor
    }

    /// Bound targets in binding order.
    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    /// The last final content applied, with its id.
    pub fn persisted(&self) -> Option<(EventId, &str)> {
        self.persisted.as_ref().map(|(id, text)| (*id, text.as_str()))
    }
}

struct TargetEntry {
    handle: Weak<dyn DisplayTarget>,
    last_applied: EventId,
    stale: bool,
}

/// Per-target bookkeeping visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetState {
    /// Id of the last event rendered on the target.
    pub last_applied: EventId,
    /// Whether the target is currently stale.
    pub stale: bool,
}

/// All channels and the targets bound to them.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Channel>,
    targets: HashMap<TargetId, TargetEntry>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `target` to `channel`, creating the channel at cursor 0.
    ///
    /// Returns false if the binding already existed.
    pub fn register(&mut self, channel: &str, id: TargetId, target: Weak<dyn DisplayTarget>) -> bool {
        let entry = self.channels.entry(channel.to_string()).or_default();
        self.targets.entry(id).or_insert_with(|| TargetEntry {
            handle: target,
            last_applied: EventId::ZERO,
            stale: false,
        });

        if entry.targets.contains(&id) {
            return false;
        }
        entry.targets.push(id);
        true
    }

    /// Make sure `channel` exists without binding anything.
    pub fn ensure_channel(&mut self, channel: &str) {
        self.channels.entry(channel.to_string()).or_default();
    }

    /// Remove `target` from `channel`. The channel and its cursor stay.
    ///
    /// Returns false if the binding did not exist.
    pub fn unbind(&mut self, channel: &str, id: TargetId) -> bool {
        let Some(entry) = self.channels.get_mut(channel) else {
            return false;
        };
        let before = entry.targets.len();
        entry.targets.retain(|t| *t != id);
        let removed = entry.targets.len() != before;
        if removed {
            self.forget_if_unbound(id);
        }
        removed
    }

    fn forget_if_unbound(&mut self, id: TargetId) {
        let still_bound = self.channels.values().any(|c| c.targets.contains(&id));
        if !still_bound {
            self.targets.remove(&id);
        }
    }

    /// Whether `channel` is registered.
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Look up a channel.
    pub fn channel(&self, channel: &str) -> Option<&Channel> {
        self.channels.get(channel)
    }

    /// Cursor of `channel`, if registered.
    pub fn cursor(&self, channel: &str) -> Option<EventId> {
        self.channels.get(channel).map(|c| c.cursor)
    }

    /// Every channel with its cursor, ordered by name.
    pub fn cursors(&self) -> Vec<(String, EventId)> {
        self.channels
            .iter()
            .map(|(name, c)| (name.clone(), c.cursor))
            .collect()
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Apply the cursor rule: accept iff `id >= cursor`, then raise the cursor.
    pub fn advance(&mut self, channel: &str, id: EventId) -> Advance {
        let Some(entry) = self.channels.get_mut(channel) else {
            return Advance::Unknown;
        };
        if id < entry.cursor {
            return Advance::Rejected {
                cursor: entry.cursor,
            };
        }
        let previous = entry.cursor;
        entry.cursor = entry.cursor.max(id);
        Advance::Accepted { previous }
    }

    /// Record final content on `channel`.
    pub fn persist(&mut self, channel: &str, id: EventId, text: &str) {
        if let Some(entry) = self.channels.get_mut(channel) {
            entry.persisted = Some((id, text.to_string()));
        }
    }

    /// Live targets bound to `channel`. Dropped targets are unbound.
    pub fn live_targets(&mut self, channel: &str) -> Vec<(TargetId, Arc<dyn DisplayTarget>)> {
        let Some(ids) = self.channels.get(channel).map(|c| c.targets.clone()) else {
            return Vec::new();
        };

        let mut live = Vec::with_capacity(ids.len());
        let mut dead = Vec::new();
        for id in ids {
            match self.targets.get(&id).and_then(|t| t.handle.upgrade()) {
                Some(target) => live.push((id, target)),
                None => dead.push(id),
            }
        }

        for id in dead {
            tracing::debug!(?id, channel, "pruning dropped target");
            self.unbind(channel, id);
        }
        live
    }

    /// Upgrade a single target.
    pub fn target(&self, id: TargetId) -> Option<Arc<dyn DisplayTarget>> {
        self.targets.get(&id).and_then(|t| t.handle.upgrade())
    }

    /// Bookkeeping for `id`, if bound anywhere.
    pub fn target_state(&self, id: TargetId) -> Option<TargetState> {
        self.targets.get(&id).map(|t| TargetState {
            last_applied: t.last_applied,
            stale: t.stale,
        })
    }

    /// Record that `id` rendered event `event`.
    pub fn mark_applied(&mut self, id: TargetId, event: EventId) {
        if let Some(entry) = self.targets.get_mut(&id) {
            entry.last_applied = event;
        }
    }

    /// Set the stale flag. Returns true if it changed.
    pub fn set_stale(&mut self, id: TargetId, stale: bool) -> bool {
        match self.targets.get_mut(&id) {
            Some(entry) if entry.stale != stale => {
                entry.stale = stale;
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels)
            .field("targets", &self.targets.len())
            .finish()
    }
}
