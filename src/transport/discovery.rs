//! HTTP discovery endpoint.
//!
//! A browser started with `--remote-debugging-port` serves a small HTTP API
//! next to its WebSocket endpoint:
//!
//! | Path | Returns |
//! |------|---------|
//! | `/json/version` | Browser build info and the browser-level `webSocketDebuggerUrl` |
//! | `/json/list` | Debuggable targets |
//! | `/json/protocol` | The protocol descriptor |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::ProtocolDescriptor;

// ============================================================================
// Constants
// ============================================================================

/// Per-request timeout for discovery calls.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Response Types
// ============================================================================

/// Body of `/json/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    /// Product name and version, e.g. `Chrome/126.0.6478.126`.
    #[serde(rename = "Browser")]
    pub browser: String,

    /// Protocol version, e.g. `1.3`.
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,

    /// User agent string.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,

    /// V8 version.
    #[serde(rename = "V8-Version", default)]
    pub v8_version: Option<String>,

    /// WebKit version.
    #[serde(rename = "WebKit-Version", default)]
    pub webkit_version: Option<String>,

    /// Browser-level WebSocket endpoint.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// One entry of `/json/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescription {
    /// Target id.
    pub id: String,

    /// Target type (`page`, `service_worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,

    /// Title.
    #[serde(default)]
    pub title: String,

    /// Current URL.
    #[serde(default)]
    pub url: String,

    /// Per-target WebSocket endpoint, absent when already attached elsewhere.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,

    /// Frontend URL.
    #[serde(default)]
    pub devtools_frontend_url: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// Client for a browser's HTTP discovery endpoint.
#[derive(Debug, Clone)]
pub struct Discovery {
    base: Url,
    http: reqwest::Client,
}

impl Discovery {
    /// Creates a discovery client for `endpoint` (e.g. `http://127.0.0.1:9222`).
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the endpoint does not parse
    /// - [`Error::Config`] if the scheme is not `http`/`https`
    pub fn new(endpoint: &str) -> Result<Self> {
        let base = Url::parse(endpoint)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "discovery endpoint must be http(s), got '{}'",
                base.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()?;

        Ok(Self { base, http })
    }

    /// Returns the endpoint base URL.
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds the absolute URL for a discovery path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if joining fails.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Fetches `/json/version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport or decoding failure.
    pub async fn version(&self) -> Result<BrowserVersion> {
        self.get_json("/json/version").await
    }

    /// Fetches `/json/list`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport or decoding failure.
    pub async fn targets(&self) -> Result<Vec<TargetDescription>> {
        self.get_json("/json/list").await
    }

    /// Fetches and validates `/json/protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorUnavailable`] on any failure.
    pub async fn protocol(&self) -> Result<ProtocolDescriptor> {
        let value: serde_json::Value = self
            .get_json("/json/protocol")
            .await
            .map_err(|e| Error::descriptor_unavailable(format!("/json/protocol: {e}")))?;
        ProtocolDescriptor::from_value(value)
    }

    /// Resolves the browser-level WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport or decoding failure.
    pub async fn browser_ws_url(&self) -> Result<String> {
        let version = self.version().await?;
        debug!(
            browser = %version.browser,
            protocol = %version.protocol_version,
            "Discovered browser endpoint"
        );
        Ok(version.web_socket_debugger_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "Discovery request");
        let value = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
