//! Display targets and their discovery.

use std::fmt;
use std::sync::Arc;

use caption_sync_core::RenderFrame;

/// A surface that shows one or more channels.
///
/// The engine only holds weak references; a target dropped by its owner is
/// skipped and pruned. Both methods are called with the engine lock held,
/// so implementations must not call back into the engine.
pub trait DisplayTarget: Send + Sync {
    /// Show an update. Final frames are meant to be kept; interim frames are
    /// provisional and replaced by the next update.
    fn render(&self, frame: &RenderFrame);

    /// Enter or leave the stale state.
    fn set_stale(&self, stale: bool);
}

/// Identity of a bound target.
///
/// Derived from the target's allocation, so binding the same `Arc` twice
/// yields the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Identity of `target`.
    pub fn of<T: ?Sized>(target: &Arc<T>) -> Self {
        Self(Arc::as_ptr(target) as *const () as usize)
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({:#x})", self.0)
    }
}

/// Supplies targets when `run()` finds the registry empty.
///
/// Discovered targets are owned by the engine for as long as it lives.
pub trait TargetDiscovery: Send + Sync {
    /// `(channel, target)` pairs to register.
    fn discover(&self) -> Vec<(String, Arc<dyn DisplayTarget>)>;
}

impl<F> TargetDiscovery for F
where
    F: Fn() -> Vec<(String, Arc<dyn DisplayTarget>)> + Send + Sync,
{
    fn discover(&self) -> Vec<(String, Arc<dyn DisplayTarget>)> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl DisplayTarget for Blank {
        fn render(&self, _frame: &RenderFrame) {}
        fn set_stale(&self, _stale: bool) {}
    }

    #[test]
    fn test_id_follows_allocation() {
        let a = Arc::new(Blank);
        let b = Arc::new(Blank);
        let a_dyn: Arc<dyn DisplayTarget> = a.clone();

        assert_eq!(TargetId::of(&a), TargetId::of(&a.clone()));
        assert_eq!(TargetId::of(&a), TargetId::of(&a_dyn));
        assert_ne!(TargetId::of(&a), TargetId::of(&b));
    }
}
