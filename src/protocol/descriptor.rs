//! Protocol descriptor model.
//!
//! The descriptor is the browser's own description of the protocol, in the
//! shape served by `/json/protocol` and shipped as `browser_protocol.json` /
//! `js_protocol.json`:
//!
//! ```json
//! {
//!   "version": { "major": "1", "minor": "3" },
//!   "domains": [
//!     {
//!       "domain": "Page",
//!       "commands": [{ "name": "navigate", "parameters": [{ "name": "url", "type": "string" }] }],
//!       "events": [{ "name": "loadEventFired" }]
//!     }
//!   ]
//! }
//! ```
//!
//! Only names, parameter lists and the experimental/deprecated flags are
//! interpreted. Type definitions are kept as opaque JSON.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Descriptor subset compiled into the crate.
const BUNDLED_PROTOCOL: &str = include_str!("browser_protocol.json");

// ============================================================================
// ProtocolDescriptor
// ============================================================================

/// Immutable table of protocol domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    /// Protocol version, if the source declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProtocolVersion>,

    /// Domains in declaration order.
    pub domains: Vec<DomainDef>,
}

/// Declared protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major version.
    pub major: String,
    /// Minor version.
    pub minor: String,
}

/// One protocol domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDef {
    /// Domain name, e.g. `Page`.
    pub domain: String,

    /// Marked experimental by the browser.
    #[serde(default)]
    pub experimental: bool,

    /// Marked deprecated by the browser.
    #[serde(default)]
    pub deprecated: bool,

    /// Domains this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Type definitions, uninterpreted.
    #[serde(default)]
    pub types: Vec<Value>,

    /// Commands.
    #[serde(default)]
    pub commands: Vec<CommandDef>,

    /// Events.
    #[serde(default)]
    pub events: Vec<EventDef>,
}

/// One command of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDef {
    /// Command name without the domain prefix.
    pub name: String,

    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,

    /// Declared return values.
    #[serde(default)]
    pub returns: Vec<ParameterDef>,

    /// Marked experimental.
    #[serde(default)]
    pub experimental: bool,

    /// Marked deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

/// One event of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    /// Event name without the domain prefix.
    pub name: String,

    /// Declared payload fields.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,

    /// Marked experimental.
    #[serde(default)]
    pub experimental: bool,

    /// Marked deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

/// A named parameter, return value or event field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Field name.
    pub name: String,

    /// Whether the field may be omitted.
    #[serde(default)]
    pub optional: bool,

    /// Primitive type name, when not a reference.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Referenced type, e.g. `Target.TargetID`.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

// ============================================================================
// ProtocolDescriptor - Constructors
// ============================================================================

impl ProtocolDescriptor {
    /// Parses and validates a descriptor from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorUnavailable`] if the text is not a
    /// descriptor or fails validation.
    pub fn from_json(text: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(text)
            .map_err(|e| Error::descriptor_unavailable(format!("invalid descriptor JSON: {e}")))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parses and validates a descriptor from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorUnavailable`] on shape or validation errors.
    pub fn from_value(value: Value) -> Result<Self> {
        let descriptor: Self = serde_json::from_value(value)
            .map_err(|e| Error::descriptor_unavailable(format!("invalid descriptor JSON: {e}")))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Returns the descriptor compiled into the crate.
    ///
    /// Covers the domains needed for target/session management and the most
    /// common page, runtime and network work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorUnavailable`] if the bundled table is broken.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_PROTOCOL)
    }

    /// Concatenates two descriptors, e.g. browser and JavaScript protocols.
    ///
    /// The version of `self` wins when both declare one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorUnavailable`] if a domain is defined twice.
    pub fn merge(mut self, other: ProtocolDescriptor) -> Result<Self> {
        if self.version.is_none() {
            self.version = other.version;
        }
        self.domains.extend(other.domains);
        self.validate()?;
        Ok(self)
    }
}

// ============================================================================
// ProtocolDescriptor - Queries
// ============================================================================

impl ProtocolDescriptor {
    /// Looks up a domain by name.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&DomainDef> {
        self.domains.iter().find(|d| d.domain == name)
    }

    /// Returns the number of domains.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Returns `true` if there are no domains.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Checks the uniqueness invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorUnavailable`] if there are no domains, a
    /// domain is declared twice, or a command/event name repeats within a
    /// domain.
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::descriptor_unavailable("descriptor declares no domains"));
        }

        let mut domains = FxHashSet::default();
        for domain in &self.domains {
            if domain.domain.is_empty() {
                return Err(Error::descriptor_unavailable("domain with empty name"));
            }
            if !domains.insert(domain.domain.as_str()) {
                return Err(Error::descriptor_unavailable(format!(
                    "domain '{}' declared more than once",
                    domain.domain
                )));
            }

            let mut commands = FxHashSet::default();
            for command in &domain.commands {
                if !commands.insert(command.name.as_str()) {
                    return Err(Error::descriptor_unavailable(format!(
                        "command '{}.{}' declared more than once",
                        domain.domain, command.name
                    )));
                }
            }

            let mut events = FxHashSet::default();
            for event in &domain.events {
                if !events.insert(event.name.as_str()) {
                    return Err(Error::descriptor_unavailable(format!(
                        "event '{}.{}' declared more than once",
                        domain.domain, event.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl DomainDef {
    /// Looks up a command by name.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&CommandDef> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Looks up an event by name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.name == name)
    }
}

// ============================================================================
// Tests
// ============================================================================
