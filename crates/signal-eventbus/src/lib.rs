//! A small single-shot event rendezvous.
//!
//! Code registers interest in a `(kind, id)` pair and suspends; some other
//! task later calls [`EventBus::invoke`] with a matching pair and a `u32`
//! value, which runs the registered callback exactly once. [`EventBus::wait`]
//! wraps this in a future so callers can simply `.await` a reply instead of
//! hand-rolling a callback.
//!
//! Registration and removal are serialized under a mutex; the callback
//! itself always runs *after* the lock is released, so a handler that
//! registers another handler (common in the protocol layers built on top of
//! this bus) never re-enters the lock it was invoked under.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Sentinel id for events that are not tied to a specific request.
pub const NO_ID: u32 = 0;

type Callback = Box<dyn FnOnce(u32) + Send>;

struct Handler {
    kind: u32,
    id: u32,
    callback: Callback,
}

/// A thread-safe, single-shot publish/subscribe rendezvous keyed by `(kind, id)`.
pub struct EventBus {
    handlers: Mutex<VecDeque<Handler>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus { handlers: Mutex::new(VecDeque::new()) }
    }

    /// Registers a callback for the given `(kind, id)` pair. Multiple
    /// handlers with distinct pairs may coexist; registering the same pair
    /// twice keeps both, and only the first one added is consumed.
    pub fn add_handler(&self, kind: u32, id: u32, callback: impl FnOnce(u32) + Send + 'static) {
        let mut handlers = self.handlers.lock().expect("eventbus mutex poisoned");
        handlers.push_back(Handler { kind, id, callback: Box::new(callback) });
    }

    /// Finds exactly one handler matching `(kind, id)`, removes it, and runs
    /// it with `value`. Handlers are matched oldest-first. If no handler is
    /// registered the event is dropped and a warning is logged.
    pub fn invoke(&self, kind: u32, id: u32, value: u32) {
        let callback = {
            let mut handlers = self.handlers.lock().expect("eventbus mutex poisoned");
            let pos = handlers.iter().position(|h| h.kind == kind && h.id == id);
            pos.map(|i| handlers.remove(i).expect("position was just found").callback)
        };
        match callback {
            Some(cb) => cb(value),
            None => tracing::warn!(kind, id, "eventbus: no handler registered, dropping event"),
        }
    }

    /// Pops every remaining handler and fires each with `value = 0`. Used on
    /// shutdown so any task awaiting a reply unblocks instead of hanging.
    pub fn drain(&self) {
        let drained: Vec<Handler> = {
            let mut handlers = self.handlers.lock().expect("eventbus mutex poisoned");
            handlers.drain(..).collect()
        };
        for handler in drained {
            (handler.callback)(0);
        }
    }

    /// Number of handlers currently registered. Exposed for tests.
    pub fn pending_count(&self) -> usize {
        self.handlers.lock().expect("eventbus mutex poisoned").len()
    }

    /// Registers a handler for `(kind, id)` and returns a future that
    /// resolves to the value it was invoked (or drained) with.
    ///
    /// Unlike `wait`, registration happens synchronously, before this
    /// function returns — not on first poll of the returned future. Callers
    /// that need to register interest in several events before triggering
    /// whatever might fire the first of them should call this instead of
    /// `wait`, since an `async fn`'s body (including a plain `add_handler`
    /// call at its top) never runs until the returned future is polled.
    pub fn register(&self, kind: u32, id: u32) -> impl std::future::Future<Output = u32> {
        let (tx, rx) = oneshot::channel();
        self.add_handler(kind, id, move |value| {
            let _ = tx.send(value);
        });
        async move { rx.await.unwrap_or(0) }
    }

    /// Registers a handler for `(kind, id)` and awaits the value it was
    /// invoked (or drained) with.
    pub async fn wait(&self, kind: u32, id: u32) -> u32 {
        self.register(kind, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn invoke_runs_the_matching_handler_exactly_once() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = seen.clone();
        bus.add_handler(1, 42, move |v| seen2.store(v, Ordering::SeqCst));

        bus.invoke(1, 42, 7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(bus.pending_count(), 0);

        // A second invoke for the same pair finds nothing and is a no-op.
        bus.invoke(1, 42, 99);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn invoke_ignores_mismatched_kind_or_id() {
        let bus = EventBus::new();
        let hit = Arc::new(AtomicU32::new(0));
        let hit2 = hit.clone();
        bus.add_handler(1, 42, move |v| hit2.store(v, Ordering::SeqCst));

        bus.invoke(2, 42, 1);
        bus.invoke(1, 43, 1);
        assert_eq!(hit.load(Ordering::SeqCst), 0);
        assert_eq!(bus.pending_count(), 1);
    }

    #[test]
    fn drain_fires_every_pending_handler_with_zero() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let seen = seen.clone();
            bus.add_handler(9, id, move |v| seen.lock().unwrap().push((id, v)));
        }
        bus.drain();
        assert_eq!(bus.pending_count(), 0);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(_, v)| *v == 0));
    }

    #[tokio::test]
    async fn wait_resolves_when_invoked() {
        let bus = Arc::new(EventBus::new());
        let bus2 = bus.clone();
        let waiter = tokio::spawn(async move { bus2.wait(5, 1).await });
        // Give the waiter a chance to register before invoking.
        tokio::task::yield_now().await;
        bus.invoke(5, 1, 123);
        assert_eq!(waiter.await.unwrap(), 123);
    }

    #[tokio::test]
    async fn wait_resolves_to_zero_on_drain() {
        let bus = Arc::new(EventBus::new());
        let bus2 = bus.clone();
        let waiter = tokio::spawn(async move { bus2.wait(5, 1).await });
        tokio::task::yield_now().await;
        bus.drain();
        assert_eq!(waiter.await.unwrap(), 0);
    }

    #[test]
    fn a_handler_may_register_another_handler_without_deadlock() {
        let bus = Arc::new(EventBus::new());
        let bus2 = bus.clone();
        bus.add_handler(1, 1, move |_| {
            bus2.add_handler(1, 2, |_| {});
        });
        bus.invoke(1, 1, 0);
        assert_eq!(bus.pending_count(), 1);
    }
}
