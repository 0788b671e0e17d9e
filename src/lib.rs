//! cdp-mux - Chrome DevTools Protocol client with flattened sessions.
//!
//! This library drives a browser over one DevTools WebSocket and
//! multiplexes any number of target sessions over it.
//!
//! # Architecture
//!
//! The client is protocol-driven:
//!
//! - **Descriptor**: the browser's protocol description (bundled, from
//!   disk, or from `/json/protocol`) is turned into an [`Api`] once
//! - **Sessions**: the root session plus one child per attached target,
//!   told apart on the wire by `sessionId`
//! - **Correlation**: every command gets a per-client id; responses may
//!   arrive in any order
//! - **Events**: listeners are keyed by session and `Domain.event`
//!
//! Key design principles:
//!
//! - One read loop per connection; frames are routed in arrival order
//! - Unknown domains, commands and events fail locally, before any I/O
//! - Payloads are passed through as [`serde_json::Value`]
//! - Closing the transport fails every outstanding command deterministically
//!
//! # Quick Start
//!
//! ```no_run
//! use cdp_mux::{Client, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Discover the browser endpoint and its protocol
//!     let client = Client::builder()
//!         .connect_http("http://127.0.0.1:9222")
//!         .await?;
//!
//!     // Attach to the first page
//!     let targets = client.targets().await?;
//!     let page = targets
//!         .iter()
//!         .find(|t| t.target_type == "page")
//!         .expect("a page target");
//!     let session = client.attach(page.target_id.clone()).await?;
//!
//!     // Enable a domain and listen on this session only
//!     session.domain("Page")?.invoke("enable", json!({})).await?;
//!     session.on("Page", "loadEventFired", |params| {
//!         println!("load event: {params}");
//!         Ok(())
//!     })?;
//!
//!     session
//!         .domain("Page")?
//!         .invoke("navigate", json!({"url": "https://example.com"}))
//!         .await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Callable surface built from the descriptor |
//! | [`client`] | [`Client`], [`Session`], builder and options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Lifecycle events ([`ClientEvent`]) |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire frames and the protocol descriptor |
//! | [`session`] | Correlator, dispatcher and router |
//! | [`transport`] | WebSocket connection and HTTP discovery |

// ============================================================================
// Modules
// ============================================================================

/// Callable API surface built from a protocol descriptor.
pub mod api;

/// Client facade.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Client lifecycle events.
pub mod events;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire frames and the protocol descriptor.
pub mod protocol;

/// Session multiplexing core.
pub mod session;

/// WebSocket transport and HTTP discovery.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// API types
pub use api::{Api, ApiBuilder, CommandRef, DomainApi, EventRef, ParameterInfo};

// Client types
pub use client::{
    CancelHandle, Client, ClientBuilder, ClientOptions, DomainHandle, PendingCommand, Session,
};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{ClientEvent, DetachReason};

// Identifier types
pub use identifiers::{ListenerId, RequestId, SessionId, TargetId};

// Protocol types
pub use protocol::{
    BundledDescriptor, Command, DescriptorSource, FileDescriptor, HttpDescriptor,
    ProtocolDescriptor, StaticDescriptor, TargetInfo,
};

// Session types
pub use session::{ListenerError, ListenerResult};

// Transport types
pub use transport::{CloseReason, Discovery};
