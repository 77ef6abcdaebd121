//! Pub/Sub event bus with per-subscription handles.
//!
//! Architecture:
//! - Components subscribe to event types with callbacks (immediate invocation)
//! - `subscribe()` returns a [`Subscription`] handle; recording
//!   `bus.unsubscribe(handle)` in a [`ResourceLedger`](super::ledger::ResourceLedger)
//!   is how listener lifetimes are tied to a preview/modal lifecycle
//! - `emit()` invokes callbacks synchronously on the calling thread
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event
//! type. Callbacks may subscribe or unsubscribe while running: emit clones
//! the callback list out of the lock before invoking.

use log::trace;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Event for T {}

/// Type-erased callback
type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Handle identifying one subscription. Copyable so a teardown closure can
/// capture it by value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    type_id: TypeId,
    id: u64,
}

/// Shared pub/sub bus. Cloning shares the underlying subscriber table.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<TypeId, Vec<(u64, Callback)>>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to events of type E. The returned handle removes exactly
    /// this subscription when passed to [`EventBus::unsubscribe`].
    pub fn subscribe<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_default()
            .push((id, wrapped));
        Subscription { type_id, id }
    }

    /// Remove one subscription. Unknown handles are ignored (the lifecycle
    /// that recorded the removal may already have been torn down).
    pub fn unsubscribe(&self, sub: Subscription) {
        let mut map = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = map.get_mut(&sub.type_id) {
            let before = list.len();
            list.retain(|(id, _)| *id != sub.id);
            if list.len() != before {
                trace!("EventBus: unsubscribed {:?}", sub);
            }
            if list.is_empty() {
                map.remove(&sub.type_id);
            }
        }
    }

    /// Emit an event to all current subscribers of its type.
    pub fn emit<E: Event>(&self, event: &E) {
        let type_id = TypeId::of::<E>();
        // Clone callbacks out of the lock: handlers may (un)subscribe.
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for cb in callbacks {
            cb(event);
        }
    }

    /// Number of live subscriptions for event type E.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types = self.subscribers.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("EventBus").field("subscriber_types", &types).finish()
    }
}
