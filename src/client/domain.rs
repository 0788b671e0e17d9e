//! Domain-scoped view of a session.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::ListenerId;
use crate::session::ListenerResult;

use super::session::{PendingCommand, Session};

// ============================================================================
// DomainHandle
// ============================================================================

/// A session narrowed to one protocol domain.
///
/// ```ignore
/// let page = session.domain("Page")?;
/// page.invoke("enable", json!({})).await?;
/// page.on("loadEventFired", |params| { println!("{params}"); Ok(()) })?;
/// ```
#[derive(Clone)]
pub struct DomainHandle {
    session: Session,
    name: Arc<str>,
}

impl DomainHandle {
    pub(crate) fn new(session: Session, name: &str) -> Self {
        Self {
            session,
            name: Arc::from(name),
        }
    }

    /// Domain name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The session this handle sends on.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Command names, sorted.
    #[must_use]
    pub fn commands(&self) -> Vec<&str> {
        self.session
            .client
            .api
            .domain(&self.name)
            .map(|d| d.command_names())
            .unwrap_or_default()
    }

    /// Event names, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<&str> {
        self.session
            .client
            .api
            .domain(&self.name)
            .map(|d| d.event_names())
            .unwrap_or_default()
    }

    /// Starts `command` without awaiting it.
    ///
    /// # Errors
    ///
    /// See [`Session::start`].
    pub fn start(&self, command: &str, params: Value) -> Result<PendingCommand> {
        self.session.start(&self.name, command, params)
    }

    /// Invokes `command` and awaits its result.
    ///
    /// # Errors
    ///
    /// See [`Session::invoke`].
    pub async fn invoke(&self, command: &str, params: Value) -> Result<Value> {
        self.session.invoke(&self.name, command, params).await
    }

    /// Subscribes to `event`.
    ///
    /// # Errors
    ///
    /// See [`Session::on`].
    pub fn on<F>(&self, event: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.session.on(&self.name, event, callback)
    }

    /// Subscribes to one delivery of `event`.
    ///
    /// # Errors
    ///
    /// See [`Session::once`].
    pub fn once<F>(&self, event: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.session.once(&self.name, event, callback)
    }

    /// Removes a listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.session.remove_listener(id)
    }
}

impl fmt::Debug for DomainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainHandle")
            .field("name", &self.name)
            .field("session", &self.session.session_id())
            .finish()
    }
}
