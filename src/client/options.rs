//! Client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cdp_mux::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_command_timeout(Duration::from_secs(10))
//!     .with_max_pending(256)
//!     .without_experimental();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default time a command may wait for its response.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default WebSocket handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on outstanding commands per session.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Default lifecycle bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// ============================================================================
// ClientOptions
// ============================================================================

/// Tunables for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Per-command timeout. `None` waits forever.
    pub command_timeout: Option<Duration>,

    /// WebSocket handshake timeout.
    pub connect_timeout: Duration,

    /// Outstanding commands allowed per session.
    pub max_pending: usize,

    /// Lifecycle events buffered per receiver.
    pub event_capacity: usize,

    /// Expose experimental domains, commands and events.
    pub include_experimental: bool,

    /// Expose deprecated domains, commands and events.
    pub include_deprecated: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with the defaults.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            include_experimental: true,
            include_deprecated: true,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the per-command timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Disables the per-command timeout.
    #[inline]
    #[must_use]
    pub fn without_command_timeout(mut self) -> Self {
        self.command_timeout = None;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-session pending limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Sets the lifecycle bus capacity.
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Hides experimental items.
    #[inline]
    #[must_use]
    pub fn without_experimental(mut self) -> Self {
        self.include_experimental = false;
        self
    }

    /// Hides deprecated items.
    #[inline]
    #[must_use]
    pub fn without_deprecated(mut self) -> Self {
        self.include_deprecated = false;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for zero timeouts or capacities.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config(
                "command timeout must be greater than zero; use without_command_timeout() to disable it",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be greater than zero"));
        }
        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(Error::config("event_capacity must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new();
        assert_eq!(options.command_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.max_pending, 1024);
        assert_eq!(options.event_capacity, 256);
        assert!(options.include_experimental);
        assert!(options.include_deprecated);
        assert_eq!(options, ClientOptions::default());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let options = ClientOptions::new()
            .without_command_timeout()
            .with_connect_timeout(Duration::from_secs(2))
            .with_max_pending(8)
            .with_event_capacity(4)
            .without_experimental()
            .without_deprecated();

        assert_eq!(options.command_timeout, None);
        assert_eq!(options.max_pending, 8);
        assert!(!options.include_experimental);
        assert!(!options.include_deprecated);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        for options in [
            ClientOptions::new().with_command_timeout(Duration::ZERO),
            ClientOptions::new().with_connect_timeout(Duration::ZERO),
            ClientOptions::new().with_max_pending(0),
            ClientOptions::new().with_event_capacity(0),
        ] {
            assert!(matches!(options.validate(), Err(Error::Config { .. })));
        }
    }
}
