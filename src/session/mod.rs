//! Session multiplexing core.
//!
//! Everything that happens between "a frame arrived" and "a caller or
//! listener observed it".
//!
//! # Flow
//!
//! ```text
//! Connection ──on_frame──► SessionRouter ──sessionId──► SessionState
//!                                                         ├── Correlator  (id → PendingCall)
//!                                                         └── EventDispatcher (method → listeners)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlator` | Pending calls of one session |
//! | `dispatcher` | Event listeners of one session |
//! | `router` | Session table and inbound routing |

// ============================================================================
// Submodules
// ============================================================================

/// Request/response correlation.
pub mod correlator;

/// Event listener registry.
pub mod dispatcher;

/// Session table and routing.
pub mod router;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlator::{ClosedCause, CompletionReceiver, Correlator, PendingCall};
pub use dispatcher::{EventDispatcher, Listener, ListenerError, ListenerFailure, ListenerResult};
pub use router::{SessionRouter, SessionState};
