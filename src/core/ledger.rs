//! Per-lifecycle registry of cleanup actions.
//!
//! Every resource created while a preview or modal session is open (bus
//! subscriptions, overlay widgets, the hidden capture sink's streaming
//! session) records its release action here at creation time. Teardown is
//! then one unconditional `release()` pass instead of a pile of hand-paired
//! remove calls, which is what makes rapid open/close cycles leak-free.

use log::trace;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Ordered collection of one-shot release actions.
///
/// `release()` runs every recorded action exactly once, in record order, and
/// leaves the ledger empty. Releasing an empty ledger is a no-op, so a ledger
/// owner's close path stays idempotent without extra flags.
#[derive(Default)]
pub struct ResourceLedger {
    actions: Vec<ReleaseFn>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a release action. Actions must be independent of each other;
    /// the ledger guarantees order but not grouping.
    pub fn record<F: FnOnce() + Send + 'static>(&mut self, release: F) {
        self.actions.push(Box::new(release));
    }

    /// Run all recorded actions once and clear the ledger.
    pub fn release(&mut self) {
        if self.actions.is_empty() {
            return;
        }
        trace!("ResourceLedger: releasing {} actions", self.actions.len());
        for action in self.actions.drain(..) {
            action();
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ResourceLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLedger")
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Drop for ResourceLedger {
    fn drop(&mut self) {
        // A ledger dropped with live actions still releases them; resources
        // must never outlive the lifecycle that created them.
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_release_runs_each_action_once_and_empties() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut ledger = ResourceLedger::new();
        for _ in 0..5 {
            let c = Arc::clone(&counter);
            ledger.record(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(ledger.len(), 5);

        ledger.release();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(ledger.len(), 0);

        // Second release is a no-op
        ledger.release();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_release_preserves_record_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut ledger = ResourceLedger::new();
        for i in 0..4 {
            let o = Arc::clone(&order);
            ledger.record(move || o.lock().unwrap().push(i));
        }
        ledger.release();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_drop_releases_pending_actions() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut ledger = ResourceLedger::new();
            let c = Arc::clone(&counter);
            ledger.record(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
