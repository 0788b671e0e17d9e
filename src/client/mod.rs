//! Client facade.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Owns the transport, API and session table |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Timeouts and limits |
//! | [`Session`] | Root or child session handle |
//! | [`DomainHandle`] | Session narrowed to one domain |
//! | [`PendingCommand`] | In-flight command |
//! | [`CancelHandle`] | Cancels an in-flight command from elsewhere |
//!
//! # Example
//!
//! ```no_run
//! use cdp_mux::{Client, Result};
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! let client = Client::connect("ws://127.0.0.1:9222/devtools/browser/abc").await?;
//!
//! let session = client.attach("TARGET-ID").await?;
//! let result = session
//!     .domain("Runtime")?
//!     .invoke("evaluate", json!({"expression": "1 + 1"}))
//!     .await?;
//!
//! session.detach().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Domain-scoped handles.
pub mod domain;

/// Client options.
pub mod options;

/// Sessions and in-flight commands.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
pub use domain::DomainHandle;
pub use options::ClientOptions;
pub use session::{CancelHandle, PendingCommand, Session};
