//! API surface synthesized from the protocol descriptor.
//!
//! [`ApiBuilder`] walks a [`ProtocolDescriptor`] once and produces an
//! [`Api`]: for every domain, one [`CommandRef`] per command and one
//! [`EventRef`] per event. Sessions resolve names through the `Api` before
//! any I/O happens, so an unknown `Domain.command` fails locally.
//!
//! Building is pure and idempotent. A client builds one `Api` and shares it
//! between every session through an `Arc`.
//!
//! Parameter lists are kept for introspection only. Required/optional flags
//! are not enforced; the browser validates parameters itself.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::protocol::{ParameterDef, ProtocolDescriptor, split_method};

// ============================================================================
// ParameterInfo
// ============================================================================

/// Name and optionality of one declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name.
    pub name: String,
    /// Whether the browser accepts it being omitted.
    pub optional: bool,
}

impl From<&ParameterDef> for ParameterInfo {
    fn from(def: &ParameterDef) -> Self {
        Self {
            name: def.name.clone(),
            optional: def.optional,
        }
    }
}

// ============================================================================
// CommandRef / EventRef
// ============================================================================

/// A resolved, invocable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRef {
    method: Arc<str>,
    split: usize,
    parameters: Arc<[ParameterInfo]>,
}

impl CommandRef {
    fn new(domain: &str, name: &str, parameters: &[ParameterDef]) -> Self {
        Self {
            method: Arc::from(format!("{domain}.{name}")),
            split: domain.len(),
            parameters: parameters.iter().map(ParameterInfo::from).collect(),
        }
    }

    /// Wire method, e.g. `Page.navigate`.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Shared handle to the wire method string.
    #[inline]
    #[must_use]
    pub fn method_arc(&self) -> Arc<str> {
        Arc::clone(&self.method)
    }

    /// Domain name.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.method[..self.split]
    }

    /// Command name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.method[self.split + 1..]
    }

    /// Declared parameters.
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    /// Names of parameters the browser requires.
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| !p.optional)
            .map(|p| p.name.as_str())
    }
}

/// A resolved, subscribable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    method: Arc<str>,
    split: usize,
}

impl EventRef {
    fn new(domain: &str, name: &str) -> Self {
        Self {
            method: Arc::from(format!("{domain}.{name}")),
            split: domain.len(),
        }
    }

    /// Wire method, e.g. `Page.loadEventFired`.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Domain name.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.method[..self.split]
    }

    /// Event name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.method[self.split + 1..]
    }
}

// ============================================================================
// DomainApi
// ============================================================================

/// Commands and events of one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainApi {
    name: Arc<str>,
    experimental: bool,
    commands: FxHashMap<String, CommandRef>,
    events: FxHashMap<String, EventRef>,
}

impl DomainApi {
    /// Domain name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the browser marks the domain experimental.
    #[inline]
    #[must_use]
    pub fn is_experimental(&self) -> bool {
        self.experimental
    }

    /// Resolves a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] if the domain has no such command.
    pub fn command(&self, name: &str) -> Result<&CommandRef> {
        self.commands
            .get(name)
            .ok_or_else(|| Error::unknown_command(self.name(), name))
    }

    /// Resolves an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] if the domain has no such event.
    pub fn event(&self, name: &str) -> Result<&EventRef> {
        self.events
            .get(name)
            .ok_or_else(|| Error::unknown_event(self.name(), name))
    }

    /// Returns `true` if the command exists.
    #[inline]
    #[must_use]
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Returns `true` if the event exists.
    #[inline]
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    /// Command names, sorted.
    #[must_use]
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Event names, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.events.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// Api
// ============================================================================

/// The full callable surface of a protocol descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Api {
    domains: FxHashMap<String, DomainApi>,
    order: Vec<String>,
}

impl Api {
    /// Resolves a domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDomain`] if the descriptor has no such domain.
    pub fn domain(&self, name: &str) -> Result<&DomainApi> {
        self.domains
            .get(name)
            .ok_or_else(|| Error::unknown_domain(name))
    }

    /// Resolves `(domain, command)`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDomain`] or [`Error::UnknownCommand`].
    pub fn command(&self, domain: &str, command: &str) -> Result<&CommandRef> {
        self.domain(domain)?.command(command)
    }

    /// Resolves `(domain, event)`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownDomain`] or [`Error::UnknownEvent`].
    pub fn event(&self, domain: &str, event: &str) -> Result<&EventRef> {
        self.domain(domain)?.event(event)
    }

    /// Resolves a `Domain.command` method string.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMethod`], [`Error::UnknownDomain`] or
    /// [`Error::UnknownCommand`].
    pub fn command_by_method(&self, method: &str) -> Result<&CommandRef> {
        let (domain, command) = split_method(method).ok_or_else(|| Error::invalid_method(method))?;
        self.command(domain, command)
    }

    /// Resolves a `Domain.event` method string.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMethod`], [`Error::UnknownDomain`] or
    /// [`Error::UnknownEvent`].
    pub fn event_by_method(&self, method: &str) -> Result<&EventRef> {
        let (domain, event) = split_method(method).ok_or_else(|| Error::invalid_method(method))?;
        self.event(domain, event)
    }

    /// Domains in descriptor order.
    pub fn domains(&self) -> impl Iterator<Item = &DomainApi> {
        self.order.iter().filter_map(|name| self.domains.get(name))
    }

    /// Number of domains.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if there are no domains.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total number of commands across domains.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.domains.values().map(|d| d.commands.len()).sum()
    }

    /// Total number of events across domains.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.domains.values().map(|d| d.events.len()).sum()
    }
}

// ============================================================================
// ApiBuilder
// ============================================================================

/// Builds an [`Api`] from a descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ApiBuilder<'a> {
    descriptor: &'a ProtocolDescriptor,
    include_experimental: bool,
    include_deprecated: bool,
}

impl<'a> ApiBuilder<'a> {
    /// Builder over `descriptor` including experimental and deprecated items.
    #[inline]
    #[must_use]
    pub fn new(descriptor: &'a ProtocolDescriptor) -> Self {
        Self {
            descriptor,
            include_experimental: true,
            include_deprecated: true,
        }
    }

    /// Whether experimental domains, commands and events are exposed.
    #[inline]
    #[must_use]
    pub fn include_experimental(mut self, include: bool) -> Self {
        self.include_experimental = include;
        self
    }

    /// Whether deprecated domains, commands and events are exposed.
    #[inline]
    #[must_use]
    pub fn include_deprecated(mut self, include: bool) -> Self {
        self.include_deprecated = include;
        self
    }

    /// Builds the API. Performs no I/O.
    #[must_use]
    pub fn build(&self) -> Api {
        let keep = |experimental: bool, deprecated: bool| {
            (self.include_experimental || !experimental) && (self.include_deprecated || !deprecated)
        };

        let mut domains = FxHashMap::default();
        let mut order = Vec::with_capacity(self.descriptor.domains.len());

        for def in &self.descriptor.domains {
            if !keep(def.experimental, def.deprecated) {
                continue;
            }

            let commands = def
                .commands
                .iter()
                .filter(|c| keep(c.experimental, c.deprecated))
                .map(|c| (c.name.clone(), CommandRef::new(&def.domain, &c.name, &c.parameters)))
                .collect();

            let events = def
                .events
                .iter()
                .filter(|e| keep(e.experimental, e.deprecated))
                .map(|e| (e.name.clone(), EventRef::new(&def.domain, &e.name)))
                .collect();

            order.push(def.domain.clone());
            domains.insert(
                def.domain.clone(),
                DomainApi {
                    name: Arc::from(def.domain.as_str()),
                    experimental: def.experimental,
                    commands,
                    events,
                },
            );
        }

        Api { domains, order }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn descriptor() -> ProtocolDescriptor {
        ProtocolDescriptor::from_value(json!({
            "domains": [
                {
                    "domain": "Page",
                    "commands": [
                        {"name": "enable"},
                        {"name": "navigate", "parameters": [
                            {"name": "url", "type": "string"},
                            {"name": "referrer", "type": "string", "optional": true}
                        ]},
                        {"name": "setLifecycleEventsEnabled", "experimental": true}
                    ],
                    "events": [{"name": "loadEventFired"}, {"name": "frameResized", "deprecated": true}]
                },
                {"domain": "Inspector", "experimental": true, "commands": [{"name": "enable"}]}
            ]
        }))
        .expect("valid descriptor")
    }

    #[test]
    fn test_build_exposes_every_command_and_event() {
        let api = ApiBuilder::new(&descriptor()).build();

        assert_eq!(api.len(), 2);
        assert_eq!(api.command_count(), 4);
        assert_eq!(api.event_count(), 2);

        let navigate = api.command("Page", "navigate").expect("navigate");
        assert_eq!(navigate.method(), "Page.navigate");
        assert_eq!(navigate.domain(), "Page");
        assert_eq!(navigate.name(), "navigate");
        assert_eq!(navigate.required_parameters().collect::<Vec<_>>(), ["url"]);

        let load = api.event("Page", "loadEventFired").expect("event");
        assert_eq!(load.method(), "Page.loadEventFired");
    }

    #[test]
    fn test_build_is_idempotent() {
        let descriptor = descriptor();
        let first = ApiBuilder::new(&descriptor).build();
        let second = ApiBuilder::new(&descriptor).build();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_names_fail_locally() {
        let api = ApiBuilder::new(&descriptor()).build();

        assert!(matches!(api.domain("Nope"), Err(Error::UnknownDomain { .. })));
        assert!(matches!(
            api.command("Page", "explode"),
            Err(Error::UnknownCommand { .. })
        ));
        assert!(matches!(
            api.event("Page", "exploded"),
            Err(Error::UnknownEvent { .. })
        ));
        assert!(matches!(
            api.command_by_method("Page"),
            Err(Error::InvalidMethod { .. })
        ));
    }

    #[test]
    fn test_method_lookup() {
        let api = ApiBuilder::new(&descriptor()).build();
        assert_eq!(
            api.command_by_method("Page.enable").expect("cmd").method(),
            "Page.enable"
        );
        assert_eq!(
            api.event_by_method("Page.loadEventFired").expect("event").name(),
            "loadEventFired"
        );
    }

    #[test]
    fn test_filters_experimental_and_deprecated() {
        let descriptor = descriptor();
        let api = ApiBuilder::new(&descriptor)
            .include_experimental(false)
            .include_deprecated(false)
            .build();

        assert!(api.domain("Inspector").is_err());
        let page = api.domain("Page").expect("Page");
        assert!(!page.has_command("setLifecycleEventsEnabled"));
        assert!(!page.has_event("frameResized"));
        assert_eq!(page.command_names(), ["enable", "navigate"]);
    }

    #[test]
    fn test_domains_keep_descriptor_order() {
        let api = ApiBuilder::new(&descriptor()).build();
        let names: Vec<_> = api.domains().map(DomainApi::name).collect();
        assert_eq!(names, ["Page", "Inspector"]);
    }

    #[test]
    fn test_bundled_api() {
        let descriptor = ProtocolDescriptor::bundled().expect("bundled");
        let api = ApiBuilder::new(&descriptor).build();
        assert!(api.command("Target", "attachToTarget").is_ok());
        assert!(api.event("Target", "attachedToTarget").is_ok());
    }
}
