//! Protocol data: wire messages and the protocol descriptor.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Browser | Command with `id`, optional `sessionId` |
//! | `Response` | Browser → Client | `result` or `error` for an `id` |
//! | `Event` | Browser → Client | Unsolicited `Domain.event` notification |
//!
//! # Method Naming
//!
//! Commands and events use `Domain.name` format:
//!
//! - `Page.navigate`
//! - `Target.attachToTarget`
//! - `Network.requestWillBeSent`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `descriptor` | Domain/command/event table |
//! | `loader` | Where descriptors come from |
//! | `message` | Request, Response, Event frames |
//! | `target` | Typed `Target` domain commands |

// ============================================================================
// Submodules
// ============================================================================

/// Protocol descriptor model.
pub mod descriptor;

/// Descriptor sources.
pub mod loader;

/// Wire frames.
pub mod message;

/// Typed `Target` domain commands.
pub mod target;

// ============================================================================
// Re-exports
// ============================================================================

pub use descriptor::{
    CommandDef, DomainDef, EventDef, ParameterDef, ProtocolDescriptor, ProtocolVersion,
};
pub use loader::{
    BundledDescriptor, DescriptorSource, FileDescriptor, HttpDescriptor, StaticDescriptor,
    load_descriptor,
};
pub use message::{
    Event, Incoming, ProtocolErrorBody, Request, Response, UNKNOWN_ERROR_CODE, split_method,
};
pub use target::{Command, TargetInfo};
