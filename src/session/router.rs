//! Session table and inbound demultiplexing.
//!
//! The router owns one [`SessionState`] per live session: the root session
//! (no `sessionId`) plus every attached child. It is the transport's
//! [`FrameSink`]: each inbound frame is parsed, looked up by `sessionId`
//! and handed to that session's correlator (responses) or dispatcher
//! (events).
//!
//! # Target Bookkeeping
//!
//! Two `Target` events are handled by the router itself, before listeners
//! see them:
//!
//! | Event | Effect |
//! |-------|--------|
//! | `Target.attachedToTarget` | Registers `params.sessionId` |
//! | `Target.detachedFromTarget` | Detaches `params.sessionId` |
//!
//! A frame that is neither a response nor an event ends the connection:
//! every outstanding call fails with `ConnectionClosed`.
//!
//! # Locking
//!
//! The session table is a `RwLock` taken only to look up, insert or remove
//! entries. No router lock is held while a listener runs.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{ClientEvent, DetachReason, EventBus};
use crate::identifiers::{RequestId, SessionId, TargetId};
use crate::protocol::target::{AttachedToTarget, DetachedFromTarget};
use crate::protocol::{Event, Incoming, Response};
use crate::transport::{CloseReason, FrameSink};

use super::correlator::{ClosedCause, CompletionReceiver, Correlator};
use super::dispatcher::EventDispatcher;

// ============================================================================
// Constants
// ============================================================================

const ATTACHED_TO_TARGET: &str = "Target.attachedToTarget";
const DETACHED_FROM_TARGET: &str = "Target.detachedFromTarget";

// ============================================================================
// SessionState
// ============================================================================

/// Per-session correlator and dispatcher.
#[derive(Debug)]
pub struct SessionState {
    session_id: Option<SessionId>,
    target_id: Option<TargetId>,
    attached: AtomicBool,
    correlator: Mutex<Correlator>,
    dispatcher: EventDispatcher,
}

impl SessionState {
    fn new(session_id: Option<SessionId>, target_id: Option<TargetId>, max_pending: usize) -> Self {
        Self {
            correlator: Mutex::new(Correlator::new(session_id.clone(), max_pending)),
            session_id,
            target_id,
            attached: AtomicBool::new(true),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Session id, `None` for root.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Target the session is attached to, when known.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> Option<&TargetId> {
        self.target_id.as_ref()
    }

    /// Returns `true` until the session is torn down.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Listener registry.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Registers a pending call. See [`Correlator::register`].
    ///
    /// # Errors
    ///
    /// Fails once the session is torn down or at the pending limit.
    pub fn register_call(&self, id: RequestId, method: &str) -> Result<CompletionReceiver> {
        self.correlator.lock().register(id, method)
    }

    /// Rejects one pending call. Returns `false` if it already settled.
    pub fn reject_call(&self, id: RequestId, error: Error) -> bool {
        self.correlator.lock().reject(id, error)
    }

    /// Forgets one pending call without settling it.
    pub fn remove_call(&self, id: RequestId) -> bool {
        self.correlator.lock().remove(id).is_some()
    }

    /// Number of outstanding calls.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlator.lock().len()
    }

    fn resolve(&self, response: Response) {
        let id = response.id;
        if !self.correlator.lock().resolve(id, response.outcome) {
            debug!(%id, session = ?self.session_id, "Dropping orphan response");
        }
    }

    /// Rejects pending calls, clears listeners. Returns `false` if already
    /// torn down.
    fn teardown(&self, cause: ClosedCause) -> bool {
        let was_attached = self.attached.swap(false, Ordering::AcqRel);
        self.correlator.lock().shutdown(cause);
        self.dispatcher.clear();
        was_attached
    }
}

// ============================================================================
// SessionRouter
// ============================================================================

/// Live session table and inbound frame router.
#[derive(Debug)]
pub struct SessionRouter {
    root: Arc<SessionState>,
    sessions: RwLock<FxHashMap<SessionId, Arc<SessionState>>>,
    events: EventBus,
    closed: AtomicBool,
    max_pending: usize,
}

impl SessionRouter {
    /// Creates a router holding only the root session.
    #[must_use]
    pub fn new(max_pending: usize, events: EventBus) -> Self {
        Self {
            root: Arc::new(SessionState::new(None, None, max_pending)),
            sessions: RwLock::new(FxHashMap::default()),
            events,
            closed: AtomicBool::new(false),
            max_pending,
        }
    }

    /// The root session.
    #[inline]
    #[must_use]
    pub fn root(&self) -> Arc<SessionState> {
        Arc::clone(&self.root)
    }

    /// Lifecycle bus.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Looks up a live child session.
    #[must_use]
    pub fn lookup(&self, session_id: &SessionId) -> Option<Arc<SessionState>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Resolves `None` to root and `Some` to a live child.
    #[must_use]
    pub fn resolve_session(&self, session_id: Option<&SessionId>) -> Option<Arc<SessionState>> {
        match session_id {
            None => Some(self.root()),
            Some(id) => self.lookup(id),
        }
    }

    /// Registers a child session. Registering a live id returns the
    /// existing state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after [`close_all`](Self::close_all).
    pub fn register(
        &self,
        session_id: SessionId,
        target_id: Option<TargetId>,
    ) -> Result<Arc<SessionState>> {
        let state = {
            let mut sessions = self.sessions.write();
            if self.is_closed() {
                return Err(Error::ConnectionClosed);
            }
            if let Some(existing) = sessions.get(&session_id) {
                return Ok(Arc::clone(existing));
            }

            let state = Arc::new(SessionState::new(
                Some(session_id.clone()),
                target_id.clone(),
                self.max_pending,
            ));
            sessions.insert(session_id.clone(), Arc::clone(&state));
            state
        };

        info!(session = %session_id, target = ?target_id, "Session attached");
        self.events.publish(ClientEvent::SessionAttached {
            session_id,
            target_id,
        });
        Ok(state)
    }

    /// Tears a child session down: pending calls rejected, listeners
    /// cleared, entry removed. Returns `false` if it was not live.
    pub fn detach(&self, session_id: &SessionId, reason: DetachReason) -> bool {
        let Some(state) = self.sessions.write().remove(session_id) else {
            debug!(session = %session_id, "Detach of unknown session ignored");
            return false;
        };

        state.teardown(ClosedCause::Detached);

        info!(session = %session_id, %reason, "Session detached");
        self.events.publish(ClientEvent::SessionDetached {
            session_id: session_id.clone(),
            reason,
        });
        true
    }

    /// Tears every session down and publishes `Disconnected`. Only the
    /// first call has an effect.
    pub fn close_all(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let drained: Vec<_> = self.sessions.write().drain().collect();
        let mut rejected = self.root.pending_count();
        self.root.teardown(ClosedCause::ConnectionClosed);

        for (session_id, state) in drained {
            rejected += state.pending_count();
            state.teardown(ClosedCause::ConnectionClosed);
            self.events.publish(ClientEvent::SessionDetached {
                session_id,
                reason: DetachReason::ConnectionClosed,
            });
        }

        info!(%reason, rejected, "Client disconnected");
        self.events.publish(ClientEvent::Disconnected { reason });
    }

    /// Returns `true` once the transport is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Live child session ids, sorted.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Outstanding calls across root and every child.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let children: usize = self
            .sessions
            .read()
            .values()
            .map(|s| s.pending_count())
            .sum();
        self.root.pending_count() + children
    }

    /// Routes a classified frame.
    pub fn route(&self, incoming: Incoming) {
        let Some(state) = self.resolve_session(incoming.session_id()) else {
            debug!(session = ?incoming.session_id(), "Dropping frame for unknown session");
            return;
        };

        match incoming {
            Incoming::Response(response) => state.resolve(response),
            Incoming::Event(event) => self.route_event(&state, event),
        }
    }

    fn route_event(&self, state: &SessionState, event: Event) {
        match event.method.as_str() {
            ATTACHED_TO_TARGET => self.on_attached_to_target(&event.params),
            DETACHED_FROM_TARGET => self.on_detached_from_target(&event.params),
            _ => {}
        }

        for failure in state.dispatcher().dispatch(&event.method, &event.params) {
            warn!(
                session = ?state.session_id(),
                method = %event.method,
                listener = %failure.listener,
                error = %failure.message,
                "Event listener failed"
            );
            self.events.publish(ClientEvent::ListenerError {
                session_id: state.session_id().cloned(),
                method: event.method.clone(),
                listener: failure.listener,
                message: failure.message,
            });
        }
    }

    fn on_attached_to_target(&self, params: &Value) {
        match serde_json::from_value::<AttachedToTarget>(params.clone()) {
            Ok(attached) => {
                if let Err(e) = self.register(attached.session_id, Some(attached.target_info.target_id)) {
                    debug!(error = %e, "Auto-attach ignored");
                }
            }
            Err(e) => warn!(error = %e, "Malformed Target.attachedToTarget payload"),
        }
    }

    fn on_detached_from_target(&self, params: &Value) {
        match serde_json::from_value::<DetachedFromTarget>(params.clone()) {
            Ok(detached) => {
                self.detach(&detached.session_id, DetachReason::Browser);
            }
            Err(e) => warn!(error = %e, "Malformed Target.detachedFromTarget payload"),
        }
    }
}

impl FrameSink for SessionRouter {
    /// Routes one frame. A malformed frame is a transport failure: every
    /// session is torn down and the error is returned so the socket closes.
    fn on_frame(&self, text: &str) -> Result<()> {
        match Incoming::parse(text) {
            Ok(incoming) => {
                self.route(incoming);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, len = text.len(), "Malformed inbound frame");
                self.events.publish(ClientEvent::MalformedFrame {
                    message: e.to_string(),
                });
                self.close_all(CloseReason::Error(e.to_string()));
                Err(e)
            }
        }
    }

    fn on_closed(&self, reason: CloseReason) {
        self.close_all(reason);
    }
}

// ============================================================================
// Tests
// ============================================================================
