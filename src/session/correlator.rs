//! Request/response correlation for one session.
//!
//! Every outstanding command is a [`PendingCall`] keyed by its
//! [`RequestId`]. Whoever removes the entry from the table settles it:
//!
//! | Remover | Outcome |
//! |---------|---------|
//! | Read loop, matching response | `result` or [`Error::Protocol`] |
//! | Session detach / transport close | [`Error::SessionDetached`] / [`Error::ConnectionClosed`] |
//! | Caller timer | [`Error::RequestTimeout`] |
//! | Caller cancel | [`Error::Cancelled`] |
//!
//! Removal happens under the session's lock, so the outcomes are mutually
//! exclusive. After [`Correlator::shutdown`] the table refuses new entries.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};
use crate::protocol::ProtocolErrorBody;

// ============================================================================
// Types
// ============================================================================

/// Receiving half handed to the caller of a command.
pub type CompletionReceiver = oneshot::Receiver<Result<Value>>;

/// Why a correlator stopped accepting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedCause {
    /// The session was detached.
    Detached,
    /// The transport closed.
    ConnectionClosed,
}

// ============================================================================
// PendingCall
// ============================================================================

/// One outstanding command.
#[derive(Debug)]
pub struct PendingCall {
    method: String,
    created_at: Instant,
    tx: oneshot::Sender<Result<Value>>,
}

impl PendingCall {
    /// Method of the command.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// When the call was registered.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    fn settle(self, outcome: Result<Value>) {
        // Receiver gone means the caller stopped waiting.
        let _ = self.tx.send(outcome);
    }
}

// ============================================================================
// Correlator
// ============================================================================

/// Table of outstanding calls for one session.
#[derive(Debug)]
pub struct Correlator {
    session_id: Option<SessionId>,
    pending: FxHashMap<RequestId, PendingCall>,
    max_pending: usize,
    closed: Option<ClosedCause>,
}

impl Correlator {
    /// Creates an empty table for `session_id` (`None` for root).
    #[must_use]
    pub fn new(session_id: Option<SessionId>, max_pending: usize) -> Self {
        Self {
            session_id,
            pending: FxHashMap::default(),
            max_pending,
            closed: None,
        }
    }

    /// Registers a call and returns the receiver its outcome arrives on.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionDetached`] / [`Error::ConnectionClosed`] after shutdown
    /// - [`Error::TooManyPending`] at the configured limit
    /// - [`Error::Connection`] if `id` is already outstanding
    pub fn register(&mut self, id: RequestId, method: &str) -> Result<CompletionReceiver> {
        if let Some(cause) = self.closed {
            return Err(closed_error(cause, self.session_id.as_ref()));
        }

        if self.pending.len() >= self.max_pending {
            return Err(Error::too_many_pending(self.pending.len(), self.max_pending));
        }

        if self.pending.contains_key(&id) {
            return Err(Error::connection(format!("request id {id} already outstanding")));
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingCall {
                method: method.to_string(),
                created_at: Instant::now(),
                tx,
            },
        );

        trace!(%id, method, "Pending call registered");
        Ok(rx)
    }

    /// Settles the call matching a response.
    ///
    /// Returns `false` for an orphan (no such call).
    pub fn resolve(
        &mut self,
        id: RequestId,
        outcome: std::result::Result<Value, ProtocolErrorBody>,
    ) -> bool {
        let Some(call) = self.pending.remove(&id) else {
            return false;
        };

        let outcome = outcome.map_err(|body| body.into_error(&call.method));
        trace!(
            %id,
            method = %call.method,
            ok = outcome.is_ok(),
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            "Pending call settled"
        );
        call.settle(outcome);
        true
    }

    /// Rejects one call with `error`. Returns `false` if it already settled.
    pub fn reject(&mut self, id: RequestId, error: Error) -> bool {
        match self.pending.remove(&id) {
            Some(call) => {
                call.settle(Err(error));
                true
            }
            None => false,
        }
    }

    /// Drops one call without settling it.
    pub fn remove(&mut self, id: RequestId) -> Option<PendingCall> {
        self.pending.remove(&id)
    }

    /// Rejects every call and refuses new ones. Returns how many were
    /// rejected. Later calls return `0`.
    pub fn shutdown(&mut self, cause: ClosedCause) -> usize {
        if self.closed.is_none() {
            self.closed = Some(cause);
        }

        let count = self.pending.len();
        for (_, call) in self.pending.drain() {
            call.settle(Err(closed_error(cause, self.session_id.as_ref())));
        }

        if count > 0 {
            debug!(
                session = ?self.session_id,
                count,
                ?cause,
                "Rejected pending calls"
            );
        }
        count
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) ran.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Number of outstanding calls.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns `true` if `id` is outstanding.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }
}

fn closed_error(cause: ClosedCause, session_id: Option<&SessionId>) -> Error {
    match (cause, session_id) {
        (ClosedCause::Detached, Some(session_id)) => Error::session_detached(session_id.clone()),
        _ => Error::ConnectionClosed,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn correlator() -> Correlator {
        Correlator::new(Some(SessionId::new("S1")), 4)
    }

    #[tokio::test]
    async fn test_resolve_delivers_result() {
        let mut table = correlator();
        let rx = table.register(RequestId::new(1), "Page.enable").expect("register");

        assert!(table.resolve(RequestId::new(1), Ok(json!({"ok": true}))));
        assert!(table.is_empty());
        assert_eq!(rx.await.expect("sender").expect("ok"), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_error_response_carries_method() {
        let mut table = correlator();
        let rx = table.register(RequestId::new(2), "Page.navigate").expect("register");

        table.resolve(
            RequestId::new(2),
            Err(ProtocolErrorBody {
                code: -32000,
                message: "Cannot navigate".to_string(),
                data: None,
            }),
        );

        match rx.await.expect("sender") {
            Err(Error::Protocol { method, code, .. }) => {
                assert_eq!(method, "Page.navigate");
                assert_eq!(code, -32000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_orphan_response() {
        let mut table = correlator();
        assert!(!table.resolve(RequestId::new(99), Ok(json!({}))));
    }

    #[test]
    fn test_pending_limit() {
        let mut table = correlator();
        let _receivers: Vec<_> = (1..=4)
            .map(|i| table.register(RequestId::new(i), "Page.enable").expect("register"))
            .collect();

        let err = table.register(RequestId::new(5), "Page.enable").unwrap_err();
        assert!(matches!(err, Error::TooManyPending { pending: 4, max: 4 }));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut table = correlator();
        let _rx = table.register(RequestId::new(1), "Page.enable").expect("register");
        assert!(table.register(RequestId::new(1), "Page.enable").is_err());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_all_and_refuses_new() {
        let mut table = correlator();
        let first = table.register(RequestId::new(1), "A.a").expect("register");
        let second = table.register(RequestId::new(2), "A.b").expect("register");

        assert_eq!(table.shutdown(ClosedCause::Detached), 2);
        assert!(table.is_closed());

        for rx in [first, second] {
            assert!(matches!(
                rx.await.expect("sender"),
                Err(Error::SessionDetached { .. })
            ));
        }

        assert!(matches!(
            table.register(RequestId::new(3), "A.c"),
            Err(Error::SessionDetached { .. })
        ));
        assert_eq!(table.shutdown(ClosedCause::ConnectionClosed), 0);
    }

    #[tokio::test]
    async fn test_root_shutdown_is_connection_closed() {
        let mut table = Correlator::new(None, 4);
        let rx = table.register(RequestId::new(1), "A.a").expect("register");
        table.shutdown(ClosedCause::Detached);
        assert!(matches!(rx.await.expect("sender"), Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_reject_and_remove() {
        let mut table = correlator();
        let rx = table.register(RequestId::new(7), "A.a").expect("register");

        assert!(table.reject(RequestId::new(7), Error::cancelled(RequestId::new(7))));
        assert!(!table.reject(RequestId::new(7), Error::ConnectionClosed));
        assert!(matches!(rx.await.expect("sender"), Err(Error::Cancelled { .. })));

        let rx = table.register(RequestId::new(8), "A.a").expect("register");
        assert!(table.remove(RequestId::new(8)).is_some());
        assert!(!table.contains(RequestId::new(8)));
        assert!(rx.await.is_err());
    }
}
