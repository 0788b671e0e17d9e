//! Transport layer.
//!
//! One WebSocket carries every session in flattened mode; the HTTP
//! discovery endpoint next to it locates that WebSocket and serves the
//! protocol descriptor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)  │         WebSocket            │  Browser        │
//! │                 │◄────────────────────────────►│                 │
//! │  Connection     │   ws://host:port/devtools/…  │  DevTools       │
//! │  → FrameSink    │                              │  endpoint       │
//! │                 │          HTTP GET            │                 │
//! │  Discovery      │─────────────────────────────►│  /json/*        │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Discovery::browser_ws_url` - Resolve the WebSocket URL (optional)
//! 2. `Connection::connect` - Handshake and spawn the loop
//! 3. `Connection::send` - Enqueue serialized commands
//! 4. `FrameSink::on_frame` - Inbound frames, in order; `Err` closes the socket
//! 5. `FrameSink::on_closed` - Exactly once at the end
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `discovery` | HTTP discovery endpoint |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// HTTP discovery endpoint.
pub mod discovery;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CloseReason, Connection, FrameSink, OutgoingFrame};
pub use discovery::{BrowserVersion, Discovery, TargetDescription};
