//! Error types for the CDP multiplexer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_mux::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     client.domain("Page")?.invoke("enable", serde_json::json!({})).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Descriptor | [`Error::DescriptorUnavailable`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::MalformedFrame`] |
//! | Protocol | [`Error::Protocol`] |
//! | Local usage | [`Error::UnknownDomain`], [`Error::UnknownCommand`], [`Error::UnknownEvent`], [`Error::InvalidMethod`], [`Error::SessionDetached`], [`Error::SessionNotFound`] |
//! | Execution | [`Error::RequestTimeout`], [`Error::Cancelled`], [`Error::TooManyPending`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{RequestId, SessionId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client options or endpoints are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Descriptor Errors
    // ========================================================================
    /// Protocol descriptor could not be obtained.
    ///
    /// Fatal to client construction; the client never falls back to an
    /// empty API surface.
    #[error("Protocol descriptor unavailable: {message}")]
    DescriptorUnavailable {
        /// What went wrong while loading or validating the descriptor.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out while opening the connection.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The transport is closed; outstanding and new calls fail with this.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The browser sent a frame that is not a response or an event.
    ///
    /// Treated like a broken transport: the connection is closed.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// What was wrong with the frame.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The browser answered a command with an `error` object.
    #[error("CDP error in {method}: {message} (code {code})")]
    Protocol {
        /// Method of the rejected command.
        method: String,
        /// Browser error code, verbatim.
        code: i64,
        /// Browser error message, verbatim.
        message: String,
        /// Optional browser error data, verbatim.
        data: Option<Value>,
    },

    // ========================================================================
    // Local Usage Errors
    // ========================================================================
    /// Domain is not part of the protocol descriptor.
    #[error("Domain '{domain}' not found in protocol descriptor")]
    UnknownDomain {
        /// Requested domain name.
        domain: String,
    },

    /// Command is not part of the protocol descriptor.
    #[error("Command '{domain}.{command}' not found in protocol descriptor")]
    UnknownCommand {
        /// Domain name.
        domain: String,
        /// Requested command name.
        command: String,
    },

    /// Event is not part of the protocol descriptor.
    #[error("Event '{domain}.{event}' not found in protocol descriptor")]
    UnknownEvent {
        /// Domain name.
        domain: String,
        /// Requested event name.
        event: String,
    },

    /// Method string is not of the form `Domain.name`.
    #[error("Invalid method '{method}': expected 'Domain.name'")]
    InvalidMethod {
        /// The malformed method string.
        method: String,
    },

    /// The session was detached; its calls and listeners are gone.
    #[error("Session detached: {session_id}")]
    SessionDetached {
        /// The detached session.
        session_id: SessionId,
    },

    /// No live session with this id.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The missing session.
        session_id: SessionId,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Command response did not arrive in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Command was cancelled by the caller.
    #[error("Request {request_id} cancelled")]
    Cancelled {
        /// The cancelled request ID.
        request_id: RequestId,
    },

    /// Too many commands outstanding on one session.
    #[error("Too many pending requests: {pending}/{max}")]
    TooManyPending {
        /// Currently outstanding.
        pending: usize,
        /// Configured limit.
        max: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP discovery error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a descriptor unavailable error.
    #[inline]
    pub fn descriptor_unavailable(message: impl Into<String>) -> Self {
        Self::DescriptorUnavailable {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error from browser-supplied fields.
    #[inline]
    pub fn protocol(
        method: impl Into<String>,
        code: i64,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self::Protocol {
            method: method.into(),
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates an unknown domain error.
    #[inline]
    pub fn unknown_domain(domain: impl Into<String>) -> Self {
        Self::UnknownDomain {
            domain: domain.into(),
        }
    }

    /// Creates an unknown command error.
    #[inline]
    pub fn unknown_command(domain: impl Into<String>, command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            domain: domain.into(),
            command: command.into(),
        }
    }

    /// Creates an unknown event error.
    #[inline]
    pub fn unknown_event(domain: impl Into<String>, event: impl Into<String>) -> Self {
        Self::UnknownEvent {
            domain: domain.into(),
            event: event.into(),
        }
    }

    /// Creates an invalid method error.
    #[inline]
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Creates a session detached error.
    #[inline]
    pub fn session_detached(session_id: SessionId) -> Self {
        Self::SessionDetached { session_id }
    }

    /// Creates a session not found error.
    #[inline]
    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::SessionNotFound { session_id }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a cancellation error.
    #[inline]
    pub fn cancelled(request_id: RequestId) -> Self {
        Self::Cancelled { request_id }
    }

    /// Creates a too-many-pending error.
    #[inline]
    pub fn too_many_pending(pending: usize, max: usize) -> Self {
        Self::TooManyPending { pending, max }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::MalformedFrame { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the name was not found in the protocol descriptor.
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownDomain { .. } | Self::UnknownCommand { .. } | Self::UnknownEvent { .. }
        )
    }

    /// Returns `true` if the browser rejected the command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns the browser error code for protocol errors.
    #[inline]
    #[must_use]
    pub fn protocol_code(&self) -> Option<i64> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_not_found_messages() {
        let err = Error::unknown_command("Page", "explode");
        assert_eq!(
            err.to_string(),
            "Command 'Page.explode' not found in protocol descriptor"
        );
        assert!(err.is_not_found());
        assert!(Error::unknown_domain("Nope").is_not_found());
        assert!(Error::unknown_event("Page", "nope").is_not_found());
        assert!(!Error::invalid_method("Page").is_not_found());
    }

    #[test]
    fn test_protocol_error_carries_browser_fields() {
        let err = Error::protocol(
            "Page.navigate",
            -32602,
            "Invalid parameters",
            Some(json!("url: string value expected")),
        );
        assert!(err.is_protocol_error());
        assert_eq!(err.protocol_code(), Some(-32602));
        assert_eq!(
            err.to_string(),
            "CDP error in Page.navigate: Invalid parameters (code -32602)"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(RequestId::new(3), 5000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::connection_timeout(1000).is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::malformed_frame("[]").is_connection_error());
        assert!(!Error::config("test").is_connection_error());
        assert!(!Error::session_detached(SessionId::new("S1")).is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
