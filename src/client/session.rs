//! Session handles and in-flight commands.
//!
//! A [`Session`] is bound to one entry of the router's session table: the
//! root session (frames without `sessionId`) or one attached child. Every
//! frame it sends is tagged with its id.
//!
//! Issuing a command is split in two so callers can observe the request id
//! before awaiting:
//!
//! ```ignore
//! let pending = session.start("Page", "navigate", json!({"url": "about:blank"}))?;
//! let cancel = pending.cancel_handle();
//! let result = pending.await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::events::DetachReason;
use crate::identifiers::{ListenerId, RequestId, SessionId, TargetId};
use crate::protocol::target::DetachFromTarget;
use crate::protocol::{Command, Request};
use crate::session::{CompletionReceiver, Listener, ListenerResult, SessionState};
use crate::transport::OutgoingFrame;

use super::core::ClientInner;
use super::domain::DomainHandle;

// ============================================================================
// Session
// ============================================================================

/// Handle to one logical session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    pub(crate) client: Arc<ClientInner>,
    pub(crate) state: Arc<SessionState>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("target_id", &self.target_id())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    pub(crate) fn new(client: Arc<ClientInner>, state: Arc<SessionState>) -> Self {
        Self { client, state }
    }

    /// Session id, `None` for root.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.state.session_id()
    }

    /// Target id, when known.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> Option<&TargetId> {
        self.state.target_id()
    }

    /// Returns `true` until detached or disconnected.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.is_attached()
    }

    /// Returns `true` for the root session.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.state.session_id().is_none()
    }

    /// Outstanding commands on this session.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.pending_count()
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Resolves and sends `domain.command`, returning the in-flight call.
    ///
    /// Name resolution happens first; an unknown name writes nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownDomain`] / [`Error::UnknownCommand`]
    /// - [`Error::SessionDetached`] / [`Error::ConnectionClosed`]
    /// - [`Error::TooManyPending`]
    pub fn start(&self, domain: &str, command: &str, params: Value) -> Result<PendingCommand> {
        let method = self.client.api.command(domain, command)?.method_arc();
        self.send_method(&method, params)
    }

    /// Sends `domain.command` and awaits the result.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start) and [`PendingCommand::wait`].
    pub async fn invoke(&self, domain: &str, command: &str, params: Value) -> Result<Value> {
        self.start(domain, command, params)?.wait().await
    }

    /// Like [`invoke`](Self::invoke) with a per-call timeout. `None`
    /// waits forever.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start) and [`PendingCommand::wait`].
    pub async fn invoke_with_timeout(
        &self,
        domain: &str,
        command: &str,
        params: Value,
        limit: Option<Duration>,
    ) -> Result<Value> {
        self.start(domain, command, params)?
            .with_timeout(limit)
            .wait()
            .await
    }

    /// Sends a `Domain.command` method string and awaits the result.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMethod`] plus everything [`invoke`](Self::invoke)
    /// returns.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let method = self.client.api.command_by_method(method)?.method_arc();
        self.send_method(&method, params)?.wait().await
    }

    /// Sends a typed command.
    ///
    /// Typed commands are compiled in, so they skip the descriptor lookup.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if the result does not match `C::Response`, plus
    /// everything [`invoke`](Self::invoke) returns.
    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Response> {
        let params = serde_json::to_value(&command)?;
        let value = self.send_method(C::METHOD, params)?.wait().await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Handle scoped to one domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDomain`] if the descriptor lacks `name`.
    pub fn domain(&self, name: &str) -> Result<DomainHandle> {
        self.client.api.domain(name)?;
        Ok(DomainHandle::new(self.clone(), name))
    }

    /// Registers, serializes and enqueues one command.
    fn send_method(&self, method: &str, params: Value) -> Result<PendingCommand> {
        let id = self.client.ids.next_id();
        let request = Request::new(id, method, params, self.state.session_id().cloned());
        let text = request.to_frame()?;

        let rx = self.state.register_call(id, method)?;

        let frame = OutgoingFrame {
            request_id: id,
            session_id: request.session_id,
            text,
        };
        if let Err(e) = self.client.connection.send(frame) {
            self.state.remove_call(id);
            return Err(e);
        }

        trace!(%id, method, session = ?self.session_id(), "Command enqueued");
        Ok(PendingCommand {
            id,
            method: request.method,
            rx,
            state: Arc::clone(&self.state),
            limit: self.client.options.command_timeout,
            finished: false,
        })
    }
}

// ============================================================================
// Session - Events
// ============================================================================

impl Session {
    /// Subscribes to `domain.event` on this session.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownDomain`] / [`Error::UnknownEvent`]
    /// - [`Error::SessionDetached`] / [`Error::ConnectionClosed`]
    pub fn on<F>(&self, domain: &str, event: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.subscribe(domain, event, Arc::new(callback), false)
    }

    /// Subscribes for a single delivery.
    ///
    /// # Errors
    ///
    /// Same as [`on`](Self::on).
    pub fn once<F>(&self, domain: &str, event: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.subscribe(domain, event, Arc::new(callback), true)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.dispatcher().remove(id)
    }

    /// Removes every listener for `domain.event`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDomain`] / [`Error::UnknownEvent`].
    pub fn remove_all_listeners(&self, domain: &str, event: &str) -> Result<usize> {
        let event = self.client.api.event(domain, event)?;
        Ok(self.state.dispatcher().remove_all(event.method()))
    }

    /// Number of listeners for `domain.event`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDomain`] / [`Error::UnknownEvent`].
    pub fn listener_count(&self, domain: &str, event: &str) -> Result<usize> {
        let event = self.client.api.event(domain, event)?;
        Ok(self.state.dispatcher().listener_count(event.method()))
    }

    fn subscribe(
        &self,
        domain: &str,
        event: &str,
        callback: Listener,
        once: bool,
    ) -> Result<ListenerId> {
        let event = self.client.api.event(domain, event)?;
        self.ensure_attached()?;
        Ok(self.state.dispatcher().subscribe(event.method(), callback, once))
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.is_attached() {
            return Ok(());
        }
        Err(match self.session_id() {
            Some(id) => Error::session_detached(id.clone()),
            None => Error::ConnectionClosed,
        })
    }
}

// ============================================================================
// Session - Detach
// ============================================================================

impl Session {
    /// Detaches a child session.
    ///
    /// Local teardown happens first: pending calls fail with
    /// [`Error::SessionDetached`] and listeners are dropped. Then
    /// `Target.detachFromTarget` is sent on the root session. Calling it
    /// again, or after the browser detached the session, does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for the root session
    /// - Errors of the `Target.detachFromTarget` command other than
    ///   [`Error::ConnectionClosed`]
    pub async fn detach(&self) -> Result<()> {
        let Some(session_id) = self.session_id().cloned() else {
            return Err(Error::config("the root session cannot be detached"));
        };

        if !self.client.router.detach(&session_id, DetachReason::Requested) {
            return Ok(());
        }

        let root = Session::new(Arc::clone(&self.client), self.client.router.root());
        match root.execute(DetachFromTarget { session_id }).await {
            Ok(_) | Err(Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// PendingCommand
// ============================================================================

/// A command on the wire, awaiting its response.
///
/// Dropping it before completion forgets the call; a late response is then
/// treated as an orphan.
#[must_use = "a command is cancelled when its PendingCommand is dropped"]
pub struct PendingCommand {
    id: RequestId,
    method: String,
    rx: CompletionReceiver,
    state: Arc<SessionState>,
    limit: Option<Duration>,
    finished: bool,
}

impl PendingCommand {
    /// Request id on the wire.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Method on the wire.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Overrides the timeout. `None` waits forever.
    #[inline]
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.limit = limit;
        self
    }

    /// Handle that can cancel this call from elsewhere.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            id: self.id,
            state: Arc::clone(&self.state),
        }
    }

    /// Rejects the call with [`Error::Cancelled`]. Returns `false` if it
    /// already settled.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Awaits the outcome.
    ///
    /// If the timer and the response race, whichever removed the call from
    /// the session's table first decides the outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the browser answered with `error`
    /// - [`Error::RequestTimeout`], [`Error::Cancelled`]
    /// - [`Error::SessionDetached`], [`Error::ConnectionClosed`]
    pub async fn wait(mut self) -> Result<Value> {
        let received = match self.limit {
            None => (&mut self.rx).await.ok(),
            Some(limit) => match timeout(limit, &mut self.rx).await {
                Ok(received) => received.ok(),
                Err(_) => {
                    let timeout_ms = limit.as_millis() as u64;
                    if self
                        .state
                        .reject_call(self.id, Error::request_timeout(self.id, timeout_ms))
                    {
                        debug!(id = %self.id, method = %self.method, timeout_ms, "Command timed out");
                    }
                    // Either our rejection or a response that won the race.
                    self.rx.try_recv().ok()
                }
            },
        };

        self.finished = true;
        received.unwrap_or(Err(Error::ConnectionClosed))
    }
}

impl IntoFuture for PendingCommand {
    type Output = Result<Value>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl Drop for PendingCommand {
    fn drop(&mut self) {
        if !self.finished && self.state.remove_call(self.id) {
            trace!(id = %self.id, method = %self.method, "Pending command dropped");
        }
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("timeout", &self.limit)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CancelHandle
// ============================================================================

/// Cancels one in-flight command.
#[derive(Clone)]
pub struct CancelHandle {
    id: RequestId,
    state: Arc<SessionState>,
}

impl CancelHandle {
    /// Request id this handle cancels.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Rejects the call with [`Error::Cancelled`]. Returns `false` if it
    /// already settled.
    pub fn cancel(&self) -> bool {
        let cancelled = self.state.reject_call(self.id, Error::cancelled(self.id));
        if cancelled {
            debug!(id = %self.id, "Command cancelled");
        }
        cancelled
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle").field("id", &self.id).finish()
    }
}
