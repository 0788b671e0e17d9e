//! Client lifecycle events.
//!
//! Things that happen to the client as a whole, rather than to one command,
//! are published on a broadcast [`EventBus`]. Subscribers obtain a receiver
//! with [`Client::events`](crate::Client::events).
//!
//! | Event | Published when |
//! |-------|----------------|
//! | [`ClientEvent::Disconnected`] | Transport closed, once per client |
//! | [`ClientEvent::SessionAttached`] | A child session was registered |
//! | [`ClientEvent::SessionDetached`] | A child session was torn down |
//! | [`ClientEvent::ListenerError`] | An event listener returned `Err` or panicked |
//! | [`ClientEvent::MalformedFrame`] | An inbound frame could not be classified; the connection closes |
//!
//! Publishing never blocks. Slow receivers observe
//! `RecvError::Lagged` and skip ahead.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::sync::broadcast;

use crate::identifiers::{ListenerId, SessionId, TargetId};
use crate::transport::CloseReason;

// ============================================================================
// DetachReason
// ============================================================================

/// Why a session went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachReason {
    /// `Session::detach` was called.
    Requested,
    /// The browser sent `Target.detachedFromTarget`.
    Browser,
    /// The transport closed underneath the session.
    ConnectionClosed,
}

impl fmt::Display for DetachReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Browser => "browser",
            Self::ConnectionClosed => "connection closed",
        };
        f.write_str(s)
    }
}

// ============================================================================
// ClientEvent
// ============================================================================

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The transport is gone. Published exactly once.
    Disconnected {
        /// Local shutdown, remote close, or error.
        reason: CloseReason,
    },

    /// A child session is now routable.
    SessionAttached {
        /// New session.
        session_id: SessionId,
        /// Its target, when known.
        target_id: Option<TargetId>,
    },

    /// A child session was torn down.
    SessionDetached {
        /// The session.
        session_id: SessionId,
        /// What triggered the detach.
        reason: DetachReason,
    },

    /// A listener failed. Other listeners were still invoked.
    ListenerError {
        /// Owning session, `None` for root.
        session_id: Option<SessionId>,
        /// Event method being dispatched.
        method: String,
        /// The failing listener.
        listener: ListenerId,
        /// Error or panic message.
        message: String,
    },

    /// An inbound frame was not a response or an event. Followed by
    /// `Disconnected`.
    MalformedFrame {
        /// Parse failure description.
        message: String,
    },
}

// ============================================================================
// EventBus
// ============================================================================

/// Broadcast channel of [`ClientEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver.
    ///
    /// `capacity` must be non-zero; the client builder checks this.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Dropped silently when nobody listens.
    pub fn publish(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    /// Returns a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    #[inline]
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(ClientEvent::MalformedFrame {
            message: "bad".to_string(),
        });

        match rx.recv().await {
            Ok(ClientEvent::MalformedFrame { message }) => assert_eq!(message, "bad"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let bus = EventBus::new(1);
        assert_eq!(bus.receiver_count(), 0);
        bus.publish(ClientEvent::Disconnected {
            reason: CloseReason::Local,
        });
    }

    #[tokio::test]
    async fn test_slow_receiver_lags() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe();

        for _ in 0..3 {
            bus.publish(ClientEvent::MalformedFrame {
                message: String::new(),
            });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_detach_reason_display() {
        assert_eq!(DetachReason::Browser.to_string(), "browser");
        assert_eq!(DetachReason::ConnectionClosed.to_string(), "connection closed");
    }
}
