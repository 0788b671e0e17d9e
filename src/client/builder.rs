//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use cdp_mux::Client;
//!
//! # async fn example() -> cdp_mux::Result<()> {
//! let client = Client::builder()
//!     .descriptor_files(["browser_protocol.json", "js_protocol.json"])
//!     .command_timeout(Duration::from_secs(10))
//!     .connect("ws://127.0.0.1:9222/devtools/browser/abc")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Construction order is fixed: options are validated, then the descriptor
//! is loaded, and only then is the WebSocket opened. A descriptor failure
//! never leaves a half-open connection behind.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::api::ApiBuilder;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::identifiers::RequestIdGenerator;
use crate::protocol::{
    BundledDescriptor, DescriptorSource, FileDescriptor, HttpDescriptor, ProtocolDescriptor,
    StaticDescriptor, load_descriptor,
};
use crate::session::SessionRouter;
use crate::transport::{Connection, Discovery};

use super::core::{Client, ClientInner};
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for a [`Client`].
///
/// Use [`Client::builder()`] to create one.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Where the descriptor comes from. `None` picks a default per entry
    /// point.
    descriptor: Option<Arc<dyn DescriptorSource>>,
    /// Tunables.
    options: ClientOptions,
}

// ============================================================================
// ClientBuilder - Descriptor
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an already loaded descriptor.
    #[must_use]
    pub fn descriptor(self, descriptor: impl Into<Arc<ProtocolDescriptor>>) -> Self {
        self.descriptor_source(StaticDescriptor::new(descriptor))
    }

    /// Uses a custom descriptor source.
    #[must_use]
    pub fn descriptor_source(mut self, source: impl DescriptorSource + 'static) -> Self {
        self.descriptor = Some(Arc::new(source));
        self
    }

    /// Loads the descriptor from a JSON file.
    #[must_use]
    pub fn descriptor_file(self, path: impl Into<PathBuf>) -> Self {
        self.descriptor_source(FileDescriptor::new(path))
    }

    /// Loads and merges several descriptor files in order.
    #[must_use]
    pub fn descriptor_files<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.descriptor_source(FileDescriptor::merged(paths))
    }

    /// Uses the descriptor compiled into the crate.
    #[must_use]
    pub fn bundled_descriptor(self) -> Self {
        self.descriptor_source(BundledDescriptor)
    }
}

// ============================================================================
// ClientBuilder - Options
// ============================================================================

impl ClientBuilder {
    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the per-command timeout.
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_command_timeout(timeout);
        self
    }

    /// Disables the per-command timeout.
    #[inline]
    #[must_use]
    pub fn no_command_timeout(mut self) -> Self {
        self.options = self.options.without_command_timeout();
        self
    }

    /// Sets the WebSocket handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_connect_timeout(timeout);
        self
    }

    /// Sets the per-session pending limit.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max: usize) -> Self {
        self.options = self.options.with_max_pending(max);
        self
    }

    /// Sets the lifecycle bus capacity.
    #[inline]
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options = self.options.with_event_capacity(capacity);
        self
    }

    /// Whether experimental items are exposed.
    #[inline]
    #[must_use]
    pub fn include_experimental(mut self, include: bool) -> Self {
        self.options.include_experimental = include;
        self
    }

    /// Whether deprecated items are exposed.
    #[inline]
    #[must_use]
    pub fn include_deprecated(mut self, include: bool) -> Self {
        self.options.include_deprecated = include;
        self
    }
}

// ============================================================================
// ClientBuilder - Connect
// ============================================================================

impl ClientBuilder {
    /// Connects to a WebSocket endpoint.
    ///
    /// Without an explicit descriptor source the bundled descriptor is used.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for invalid options or a non-`ws`/`wss` URL
    /// - [`Error::DescriptorUnavailable`] if the descriptor cannot be loaded
    /// - [`Error::ConnectionTimeout`] / [`Error::WebSocket`] on handshake failure
    pub async fn connect(self, ws_url: &str) -> Result<Client> {
        self.options.validate()?;
        validate_ws_url(ws_url)?;

        let source = self
            .descriptor
            .unwrap_or_else(|| Arc::new(BundledDescriptor));
        establish(ws_url.to_string(), source.as_ref(), self.options).await
    }

    /// Resolves the browser endpoint through HTTP discovery, then connects.
    ///
    /// Without an explicit descriptor source the browser's
    /// `/json/protocol` is used.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::Url`] for a bad endpoint or options
    /// - [`Error::Http`] if discovery fails
    /// - everything [`connect`](Self::connect) returns
    pub async fn connect_http(self, endpoint: &str) -> Result<Client> {
        self.options.validate()?;

        let discovery = Discovery::new(endpoint)?;
        let ws_url = discovery.browser_ws_url().await?;
        validate_ws_url(&ws_url)?;

        let source = self
            .descriptor
            .unwrap_or_else(|| Arc::new(HttpDescriptor::from_discovery(discovery)));
        establish(ws_url, source.as_ref(), self.options).await
    }
}

// ============================================================================
// Validation & Assembly
// ============================================================================

/// Accepts only `ws://` and `wss://` URLs.
fn validate_ws_url(ws_url: &str) -> Result<()> {
    let url = Url::parse(ws_url)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(Error::config(format!(
            "WebSocket URL must be ws:// or wss://, got '{ws_url}'"
        )));
    }
    Ok(())
}

async fn establish(
    ws_url: String,
    source: &dyn DescriptorSource,
    options: ClientOptions,
) -> Result<Client> {
    let descriptor = load_descriptor(source).await?;
    let api = ApiBuilder::new(&descriptor)
        .include_experimental(options.include_experimental)
        .include_deprecated(options.include_deprecated)
        .build();

    let router = Arc::new(SessionRouter::new(
        options.max_pending,
        EventBus::new(options.event_capacity),
    ));
    let connection = Connection::connect(&ws_url, options.connect_timeout, router.clone()).await?;

    info!(
        url = %ws_url,
        domains = api.len(),
        commands = api.command_count(),
        events = api.event_count(),
        "Client connected"
    );

    Ok(Client::from_inner(ClientInner {
        descriptor,
        api: Arc::new(api),
        router,
        connection,
        ids: RequestIdGenerator::new(),
        options,
        ws_url,
    }))
}

// ============================================================================
// Tests
// ============================================================================
