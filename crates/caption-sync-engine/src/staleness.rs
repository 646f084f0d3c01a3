//! Per-target expiry deadlines.
//!
//! Each target has at most one pending deadline. Rearming replaces it, so a
//! target only expires after a full threshold without renders. The tracker
//! owns no tasks; the engine's driver sleeps until [`StalenessTracker::next_deadline`]
//! and then calls [`StalenessTracker::expire`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::target::TargetId;

/// Deadline bookkeeping for every rendered target.
#[derive(Debug)]
pub struct StalenessTracker {
    threshold: Duration,
    deadlines: HashMap<TargetId, Instant>,
}

impl StalenessTracker {
    /// Create a tracker that expires targets after `threshold`.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            deadlines: HashMap::new(),
        }
    }

    /// The shared threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Change the threshold. Pending deadlines keep their old value.
    pub fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    /// Replace any pending deadline of `target` with `now + threshold`.
    pub fn rearm(&mut self, target: TargetId, now: Instant) {
        self.deadlines.insert(target, now + self.threshold);
    }

    /// Drop the pending deadline of `target`.
    pub fn disarm(&mut self, target: TargetId) {
        self.deadlines.remove(&target);
    }

    /// Drop every pending deadline.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Whether `target` has a pending deadline.
    pub fn is_armed(&self, target: TargetId) -> bool {
        self.deadlines.contains_key(&target)
    }

    /// Number of pending deadlines.
    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every target whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<TargetId> {
        let due: Vec<TargetId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(target, _)| *target)
            .collect();
        for target in &due {
            self.deadlines.remove(target);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids() -> (TargetId, TargetId, Arc<u8>, Arc<u8>) {
        let a = Arc::new(1u8);
        let b = Arc::new(2u8);
        (TargetId::of(&a), TargetId::of(&b), a, b)
    }

    #[test]
    fn test_expires_after_threshold() {
        let (a, _, _keep_a, _keep_b) = ids();
        let mut tracker = StalenessTracker::new(Duration::from_secs(40));
        let start = Instant::now();

        tracker.rearm(a, start);
        assert!(tracker.expire(start + Duration::from_secs(39)).is_empty());
        assert_eq!(tracker.expire(start + Duration::from_secs(40)), vec![a]);
        assert!(!tracker.is_armed(a));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let (a, _, _keep_a, _keep_b) = ids();
        let mut tracker = StalenessTracker::new(Duration::from_secs(40));
        let start = Instant::now();

        tracker.rearm(a, start);
        tracker.rearm(a, start + Duration::from_secs(30));

        assert_eq!(tracker.pending(), 1);
        assert!(tracker.expire(start + Duration::from_secs(50)).is_empty());
        assert_eq!(tracker.expire(start + Duration::from_secs(70)), vec![a]);
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let (a, b, _keep_a, _keep_b) = ids();
        let mut tracker = StalenessTracker::new(Duration::from_secs(10));
        let start = Instant::now();

        assert_eq!(tracker.next_deadline(), None);
        tracker.rearm(a, start + Duration::from_secs(5));
        tracker.rearm(b, start);
        assert_eq!(tracker.next_deadline(), Some(start + Duration::from_secs(10)));

        tracker.disarm(b);
        assert_eq!(tracker.next_deadline(), Some(start + Duration::from_secs(15)));
    }
}
