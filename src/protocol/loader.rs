//! Descriptor sources.
//!
//! A client needs a [`ProtocolDescriptor`] before it can build its API. Where
//! the descriptor comes from is pluggable:
//!
//! | Source | Origin |
//! |--------|--------|
//! | [`BundledDescriptor`] | Table compiled into the crate |
//! | [`FileDescriptor`] | One or more JSON files, merged in order |
//! | [`HttpDescriptor`] | The browser's `/json/protocol` endpoint |
//! | [`StaticDescriptor`] | A descriptor the caller already holds |
//!
//! Every failure is reported as [`Error::DescriptorUnavailable`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::Discovery;

use super::ProtocolDescriptor;

// ============================================================================
// DescriptorSource
// ============================================================================

/// Something that can produce a protocol descriptor.
#[async_trait]
pub trait DescriptorSource: fmt::Debug + Send + Sync {
    /// Loads the descriptor.
    async fn load(&self) -> Result<ProtocolDescriptor>;
}

/// Loads a descriptor and normalizes every failure to
/// [`Error::DescriptorUnavailable`].
///
/// # Errors
///
/// Returns [`Error::DescriptorUnavailable`] if the source fails.
pub async fn load_descriptor(source: &dyn DescriptorSource) -> Result<Arc<ProtocolDescriptor>> {
    match source.load().await {
        Ok(descriptor) => {
            debug!(domains = descriptor.len(), ?source, "Protocol descriptor loaded");
            Ok(Arc::new(descriptor))
        }
        Err(e @ Error::DescriptorUnavailable { .. }) => Err(e),
        Err(e) => Err(Error::descriptor_unavailable(format!("{source:?}: {e}"))),
    }
}

// ============================================================================
// BundledDescriptor
// ============================================================================

/// The descriptor subset compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledDescriptor;

#[async_trait]
impl DescriptorSource for BundledDescriptor {
    async fn load(&self) -> Result<ProtocolDescriptor> {
        ProtocolDescriptor::bundled()
    }
}

// ============================================================================
// StaticDescriptor
// ============================================================================

/// A descriptor already in memory.
#[derive(Debug, Clone)]
pub struct StaticDescriptor(Arc<ProtocolDescriptor>);

impl StaticDescriptor {
    /// Wraps a loaded descriptor.
    #[must_use]
    pub fn new(descriptor: impl Into<Arc<ProtocolDescriptor>>) -> Self {
        Self(descriptor.into())
    }
}

#[async_trait]
impl DescriptorSource for StaticDescriptor {
    async fn load(&self) -> Result<ProtocolDescriptor> {
        self.0.validate()?;
        Ok(self.0.as_ref().clone())
    }
}

// ============================================================================
// FileDescriptor
// ============================================================================

/// JSON descriptor files on disk, merged in order.
///
/// Typical use is `browser_protocol.json` followed by `js_protocol.json`.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    paths: Vec<PathBuf>,
}

impl FileDescriptor {
    /// A single descriptor file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
        }
    }

    /// Several descriptor files merged in order.
    #[must_use]
    pub fn merged<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DescriptorSource for FileDescriptor {
    async fn load(&self) -> Result<ProtocolDescriptor> {
        let mut merged: Option<ProtocolDescriptor> = None;

        for path in &self.paths {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::descriptor_unavailable(format!("{}: {e}", path.display()))
            })?;
            let descriptor = ProtocolDescriptor::from_json(&text)?;

            merged = Some(match merged {
                Some(acc) => acc.merge(descriptor)?,
                None => descriptor,
            });
        }

        merged.ok_or_else(|| Error::descriptor_unavailable("no descriptor files given"))
    }
}

// ============================================================================
// HttpDescriptor
// ============================================================================

/// The descriptor served by a browser at `/json/protocol`.
#[derive(Debug, Clone)]
pub struct HttpDescriptor {
    discovery: Discovery,
}

impl HttpDescriptor {
    /// Source for the discovery endpoint at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] or [`Error::Config`] for a bad endpoint.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            discovery: Discovery::new(endpoint)?,
        })
    }

    /// Source reusing an existing discovery client.
    #[must_use]
    pub fn from_discovery(discovery: Discovery) -> Self {
        Self { discovery }
    }
}

#[async_trait]
impl DescriptorSource for HttpDescriptor {
    async fn load(&self) -> Result<ProtocolDescriptor> {
        self.discovery.protocol().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn write_descriptor(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(body.as_bytes()).expect("write");
        path
    }

    #[tokio::test]
    async fn test_bundled_source_loads() {
        let descriptor = load_descriptor(&BundledDescriptor).await.expect("bundled");
        assert!(descriptor.domain("Target").is_some());
    }

    #[tokio::test]
    async fn test_file_source_merges_in_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let browser = write_descriptor(
            &dir,
            "browser_protocol.json",
            r#"{"version":{"major":"1","minor":"3"},"domains":[{"domain":"Page","commands":[{"name":"enable"}]}]}"#,
        );
        let js = write_descriptor(
            &dir,
            "js_protocol.json",
            r#"{"domains":[{"domain":"Debugger","commands":[{"name":"pause"}]}]}"#,
        );

        let source = FileDescriptor::merged([browser, js]);
        let descriptor = load_descriptor(&source).await.expect("load");

        let names: Vec<_> = descriptor.domains.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(names, ["Page", "Debugger"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let source = FileDescriptor::new("/nonexistent/browser_protocol.json");
        let err = load_descriptor(&source).await.unwrap_err();
        assert!(matches!(err, Error::DescriptorUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_file_list_is_unavailable() {
        let source = FileDescriptor::merged(Vec::<PathBuf>::new());
        let err = load_descriptor(&source).await.unwrap_err();
        assert!(matches!(err, Error::DescriptorUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_http_is_unavailable() {
        // Port 9 (discard) is not a DevTools endpoint.
        let source = HttpDescriptor::new("http://127.0.0.1:9").expect("source");
        let err = load_descriptor(&source).await.unwrap_err();
        assert!(matches!(err, Error::DescriptorUnavailable { .. }));
    }
}
