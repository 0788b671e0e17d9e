//! Event listener registry for one session.
//!
//! Listeners are keyed by event method (`Domain.event`) and invoked in
//! registration order. Dispatch works on a snapshot taken under the lock;
//! the lock is released before any listener runs, so listeners may freely
//! subscribe or remove (themselves included).
//!
//! Per listener, at its turn:
//!
//! 1. Skip it if it was removed since the snapshot.
//! 2. If it is a `once` listener, remove it first.
//! 3. Invoke it, catching `Err` returns and panics.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::error::Error as StdError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// Error a listener may return.
pub type ListenerError = Box<dyn StdError + Send + Sync>;

/// Return type of a listener.
pub type ListenerResult = Result<(), ListenerError>;

/// Shared listener callback.
pub type Listener = Arc<dyn Fn(&Value) -> ListenerResult + Send + Sync>;

/// A listener that returned `Err` or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// The failing listener.
    pub listener: ListenerId,
    /// Error display or panic payload.
    pub message: String,
}

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    callback: Listener,
    once: bool,
}

// ============================================================================
// EventDispatcher
// ============================================================================

/// Ordered listener registry keyed by event method.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Mutex<FxHashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `method`.
    pub fn subscribe(&self, method: &str, callback: Listener, once: bool) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners
            .lock()
            .entry(method.to_string())
            .or_default()
            .push(Registration { id, callback, once });
        id
    }

    /// Removes one listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let mut removed = false;

        listeners.retain(|_, regs| {
            if let Some(pos) = regs.iter().position(|r| r.id == id) {
                regs.remove(pos);
                removed = true;
            }
            !regs.is_empty()
        });

        removed
    }

    /// Removes every listener for `method`. Returns how many were removed.
    pub fn remove_all(&self, method: &str) -> usize {
        self.listeners
            .lock()
            .remove(method)
            .map_or(0, |regs| regs.len())
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Number of listeners for `method`.
    #[must_use]
    pub fn listener_count(&self, method: &str) -> usize {
        self.listeners.lock().get(method).map_or(0, Vec::len)
    }

    /// Number of listeners across all methods.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Invokes the listeners of `method` with `params`.
    ///
    /// Returns the failures; an empty vec means every listener succeeded.
    pub fn dispatch(&self, method: &str, params: &Value) -> Vec<ListenerFailure> {
        let snapshot = match self.listeners.lock().get(method) {
            Some(regs) => regs.clone(),
            None => return Vec::new(),
        };

        let mut failures = Vec::new();

        for registration in snapshot {
            if !self.claim(method, &registration) {
                continue;
            }

            let callback = &registration.callback;
            let message = match catch_unwind(AssertUnwindSafe(|| callback(params))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };

            failures.push(ListenerFailure {
                listener: registration.id,
                message,
            });
        }

        failures
    }

    /// Checks the listener is still registered and removes it if `once`.
    fn claim(&self, method: &str, registration: &Registration) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(regs) = listeners.get_mut(method) else {
            return false;
        };
        let Some(pos) = regs.iter().position(|r| r.id == registration.id) else {
            return false;
        };

        if registration.once {
            regs.remove(pos);
            if regs.is_empty() {
                listeners.remove(method);
            }
        }
        true
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.total_listeners())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("listener panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("listener panicked: {s}")
    } else {
        "listener panicked".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let listener: Listener = Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, listener)
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.subscribe(
                "Page.loadEventFired",
                Arc::new(move |_| {
                    order.lock().push(i);
                    Ok(())
                }),
                false,
            );
        }

        dispatcher.dispatch("Page.loadEventFired", &json!({}));
        assert_eq!(*order.lock(), [0, 1, 2]);
    }

    #[test]
    fn test_params_passed_through() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Value::Null));
        let s = Arc::clone(&seen);
        dispatcher.subscribe(
            "Page.loadEventFired",
            Arc::new(move |params| {
                *s.lock() = params.clone();
                Ok(())
            }),
            false,
        );

        dispatcher.dispatch("Page.loadEventFired", &json!({"timestamp": 2.5}));
        assert_eq!(*seen.lock(), json!({"timestamp": 2.5}));
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let dispatcher = EventDispatcher::new();
        let (count, listener) = counter();
        dispatcher.subscribe("Page.loadEventFired", listener, true);

        dispatcher.dispatch("Page.loadEventFired", &json!({}));
        dispatcher.dispatch("Page.loadEventFired", &json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count("Page.loadEventFired"), 0);
    }

    #[test]
    fn test_once_reentrant_dispatch_fires_once() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let count = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&dispatcher);
        let c = Arc::clone(&count);
        dispatcher.subscribe(
            "Page.loadEventFired",
            Arc::new(move |params| {
                c.fetch_add(1, Ordering::SeqCst);
                d.dispatch("Page.loadEventFired", params);
                Ok(())
            }),
            true,
        );

        dispatcher.dispatch("Page.loadEventFired", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let (count, second) = counter();

        let d = Arc::clone(&dispatcher);
        let victim = Arc::new(Mutex::new(None));
        let v = Arc::clone(&victim);
        dispatcher.subscribe(
            "Network.requestWillBeSent",
            Arc::new(move |_| {
                if let Some(id) = *v.lock() {
                    d.remove(id);
                }
                Ok(())
            }),
            false,
        );
        *victim.lock() = Some(dispatcher.subscribe("Network.requestWillBeSent", second, false));

        dispatcher.dispatch("Network.requestWillBeSent", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_added_mid_dispatch_sees_later_events() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let (count, late) = counter();

        let d = Arc::clone(&dispatcher);
        let late = Mutex::new(Some(late));
        dispatcher.subscribe(
            "Log.entryAdded",
            Arc::new(move |_| {
                if let Some(listener) = late.lock().take() {
                    d.subscribe("Log.entryAdded", listener, false);
                }
                Ok(())
            }),
            false,
        );

        dispatcher.dispatch("Log.entryAdded", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        dispatcher.dispatch("Log.entryAdded", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_isolated() {
        let dispatcher = EventDispatcher::new();
        let (count, ok) = counter();

        let failing = dispatcher.subscribe(
            "Runtime.consoleAPICalled",
            Arc::new(|_| Err("boom".into())),
            false,
        );
        let panicking = dispatcher.subscribe(
            "Runtime.consoleAPICalled",
            Arc::new(|_| panic!("kaboom")),
            false,
        );
        dispatcher.subscribe("Runtime.consoleAPICalled", ok, false);

        let failures = dispatcher.dispatch("Runtime.consoleAPICalled", &json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].listener, failing);
        assert_eq!(failures[0].message, "boom");
        assert_eq!(failures[1].listener, panicking);
        assert!(failures[1].message.contains("kaboom"));
    }

    #[test]
    fn test_remove_and_clear() {
        let dispatcher = EventDispatcher::new();
        let (_, a) = counter();
        let (_, b) = counter();

        let id = dispatcher.subscribe("Page.frameNavigated", a, false);
        dispatcher.subscribe("Page.frameNavigated", b.clone(), false);
        dispatcher.subscribe("Page.loadEventFired", b, false);

        assert!(dispatcher.remove(id));
        assert!(!dispatcher.remove(id));
        assert_eq!(dispatcher.listener_count("Page.frameNavigated"), 1);
        assert_eq!(dispatcher.remove_all("Page.frameNavigated"), 1);
        assert_eq!(dispatcher.total_listeners(), 1);

        dispatcher.clear();
        assert_eq!(dispatcher.total_listeners(), 0);
    }
}
