//! The client: one transport, one API, many sessions.
//!
//! # Example
//!
//! ```no_run
//! use cdp_mux::Client;
//! use serde_json::json;
//!
//! # async fn example() -> cdp_mux::Result<()> {
//! let client = Client::builder()
//!     .connect_http("http://127.0.0.1:9222")
//!     .await?;
//!
//! let page = client.attach("TARGET-ID").await?;
//! page.domain("Page")?.invoke("enable", json!({})).await?;
//! page.on("Page", "loadEventFired", |params| {
//!     println!("loaded at {}", params["timestamp"]);
//!     Ok(())
//! })?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use crate::api::Api;
use crate::error::Result;
use crate::events::ClientEvent;
use crate::identifiers::{ListenerId, RequestIdGenerator, SessionId, TargetId};
use crate::protocol::target::{AttachToTarget, GetTargets, SetAutoAttach};
use crate::protocol::{ProtocolDescriptor, TargetInfo};
use crate::session::{ListenerResult, SessionRouter};
use crate::transport::{CloseReason, Connection};

use super::builder::ClientBuilder;
use super::domain::DomainHandle;
use super::options::ClientOptions;
use super::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// Descriptor the API was built from.
    pub descriptor: Arc<ProtocolDescriptor>,

    /// Resolved API, shared by every session.
    pub api: Arc<Api>,

    /// Session table; also the connection's frame sink.
    pub router: Arc<SessionRouter>,

    /// WebSocket loop handle.
    pub connection: Connection,

    /// Request id allocator.
    pub ids: RequestIdGenerator,

    /// Effective options.
    pub options: ClientOptions,

    /// Endpoint connected to.
    pub ws_url: String,
}

// ============================================================================
// Client
// ============================================================================

/// A connected CDP client. Cheap to clone.
///
/// Calls made directly on the client go to the root session.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("ws_url", &self.inner.ws_url)
            .field("connected", &self.is_connected())
            .field("sessions", &self.inner.router.session_ids().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    pub(crate) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connects to a browser WebSocket endpoint with default options and
    /// the bundled descriptor.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::connect`].
    pub async fn connect(ws_url: &str) -> Result<Self> {
        ClientBuilder::new().connect(ws_url).await
    }
}

// ============================================================================
// Client - Root Session
// ============================================================================

impl Client {
    /// The root session.
    #[must_use]
    pub fn root(&self) -> Session {
        Session::new(Arc::clone(&self.inner), self.inner.router.root())
    }

    /// Domain handle on the root session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDomain`](crate::Error::UnknownDomain).
    pub fn domain(&self, name: &str) -> Result<DomainHandle> {
        self.root().domain(name)
    }

    /// Invokes `domain.command` on the root session.
    ///
    /// # Errors
    ///
    /// See [`Session::invoke`].
    pub async fn invoke(&self, domain: &str, command: &str, params: Value) -> Result<Value> {
        self.root().invoke(domain, command, params).await
    }

    /// Invokes a `Domain.command` method string on the root session.
    ///
    /// # Errors
    ///
    /// See [`Session::call`].
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.root().call(method, params).await
    }

    /// Subscribes to a root-session event.
    ///
    /// # Errors
    ///
    /// See [`Session::on`].
    pub fn on<F>(&self, domain: &str, event: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.root().on(domain, event, callback)
    }

    /// Subscribes to one delivery of a root-session event.
    ///
    /// # Errors
    ///
    /// See [`Session::once`].
    pub fn once<F>(&self, domain: &str, event: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.root().once(domain, event, callback)
    }

    /// Removes a root-session listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.root().remove_listener(id)
    }
}

// ============================================================================
// Client - Targets & Sessions
// ============================================================================

impl Client {
    /// Attaches to a target in flattened mode and returns its session.
    ///
    /// # Errors
    ///
    /// Errors of `Target.attachToTarget`, or
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    /// transport closed meanwhile.
    pub async fn attach(&self, target_id: impl Into<TargetId>) -> Result<Session> {
        let target_id = target_id.into();
        let attached = self
            .root()
            .execute(AttachToTarget::flattened(target_id.clone()))
            .await?;

        let state = self
            .inner
            .router
            .register(attached.session_id, Some(target_id))?;
        Ok(Session::new(Arc::clone(&self.inner), state))
    }

    /// Sends `Target.setAutoAttach` in flattened mode. Related targets then
    /// show up as sessions on their own.
    ///
    /// # Errors
    ///
    /// Errors of `Target.setAutoAttach`.
    pub async fn set_auto_attach(&self, auto_attach: bool, wait_for_debugger: bool) -> Result<()> {
        self.root()
            .execute(SetAutoAttach {
                auto_attach,
                wait_for_debugger_on_start: wait_for_debugger,
                flatten: Some(true),
            })
            .await?;
        Ok(())
    }

    /// Lists targets via `Target.getTargets`.
    ///
    /// # Errors
    ///
    /// Errors of `Target.getTargets`.
    pub async fn targets(&self) -> Result<Vec<TargetInfo>> {
        Ok(self.root().execute(GetTargets::default()).await?.target_infos)
    }

    /// Looks up a live child session.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.inner
            .router
            .lookup(session_id)
            .map(|state| Session::new(Arc::clone(&self.inner), state))
    }

    /// Every live child session, ordered by id.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.inner
            .router
            .session_ids()
            .iter()
            .filter_map(|id| self.session(id))
            .collect()
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Receiver for lifecycle events published from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.router.events().subscribe()
    }

    /// Closes the transport.
    ///
    /// Every outstanding command in every session fails with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed). Resolves
    /// once the loop has stopped. Idempotent.
    pub async fn close(&self) {
        info!(url = %self.inner.ws_url, "Closing client");
        self.inner.router.close_all(CloseReason::Local);
        self.inner.connection.shutdown();
        self.inner.connection.closed().await;
    }

    /// Returns `true` while the transport is usable.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_open() && !self.inner.router.is_closed()
    }

    /// Frames written to the socket so far.
    #[inline]
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.inner.connection.frames_sent()
    }

    /// Outstanding commands across all sessions.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.router.pending_count()
    }

    /// The resolved API.
    #[inline]
    #[must_use]
    pub fn api(&self) -> &Api {
        &self.inner.api
    }

    /// The descriptor the API was built from.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &ProtocolDescriptor {
        &self.inner.descriptor
    }

    /// Effective options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// WebSocket endpoint.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> &str {
        &self.inner.ws_url
    }
}
