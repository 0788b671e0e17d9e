//! Typed commands for the `Target` domain.
//!
//! The core passes parameters and results through as JSON. The [`Command`]
//! trait layers a typed signature on top for the handful of commands the
//! session machinery itself issues.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// Command Trait
// ============================================================================

/// A protocol command with typed parameters and result.
pub trait Command: Serialize {
    /// Wire method, e.g. `Target.attachToTarget`.
    const METHOD: &'static str;

    /// Deserialized `result` payload.
    type Response: DeserializeOwned;
}

/// Result of commands that return an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Empty {}

// ============================================================================
// TargetInfo
// ============================================================================

/// Subset of `Target.TargetInfo` the multiplexer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target id.
    pub target_id: TargetId,
    /// Target type (`page`, `iframe`, `worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// URL.
    #[serde(default)]
    pub url: String,
    /// Whether some client is attached.
    #[serde(default)]
    pub attached: bool,
}

// ============================================================================
// Target.attachToTarget
// ============================================================================

/// `Target.attachToTarget`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
    /// Target to attach to.
    pub target_id: TargetId,
    /// Flattened mode; always set by the multiplexer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
}

impl AttachToTarget {
    /// Flattened attach to `target_id`.
    #[must_use]
    pub fn flattened(target_id: TargetId) -> Self {
        Self {
            target_id,
            flatten: Some(true),
        }
    }
}

/// Result of `Target.attachToTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
    /// Id of the new session.
    pub session_id: SessionId,
}

impl Command for AttachToTarget {
    const METHOD: &'static str = "Target.attachToTarget";
    type Response = AttachToTargetResult;
}

// ============================================================================
// Target.detachFromTarget
// ============================================================================

/// `Target.detachFromTarget`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTarget {
    /// Session to detach.
    pub session_id: SessionId,
}

impl Command for DetachFromTarget {
    const METHOD: &'static str = "Target.detachFromTarget";
    type Response = Empty;
}

// ============================================================================
// Target.setAutoAttach
// ============================================================================

/// `Target.setAutoAttach`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAutoAttach {
    /// Attach to related targets automatically.
    pub auto_attach: bool,
    /// Pause new targets until `Runtime.runIfWaitingForDebugger`.
    pub wait_for_debugger_on_start: bool,
    /// Flattened mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
}

impl Command for SetAutoAttach {
    const METHOD: &'static str = "Target.setAutoAttach";
    type Response = Empty;
}

// ============================================================================
// Target.getTargets
// ============================================================================

/// `Target.getTargets`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetTargets {
    /// Optional filter, passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

/// Result of `Target.getTargets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetsResult {
    /// Known targets.
    pub target_infos: Vec<TargetInfo>,
}

impl Command for GetTargets {
    const METHOD: &'static str = "Target.getTargets";
    type Response = GetTargetsResult;
}

// ============================================================================
// Target.attachedToTarget / Target.detachedFromTarget
// ============================================================================

/// Payload of `Target.attachedToTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedToTarget {
    /// New session.
    pub session_id: SessionId,
    /// The target attached to.
    pub target_info: TargetInfo,
    /// Whether the target waits for `Runtime.runIfWaitingForDebugger`.
    #[serde(default)]
    pub waiting_for_debugger: bool,
}

/// Payload of `Target.detachedFromTarget`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
    /// The session that went away.
    pub session_id: SessionId,
    /// Its target, when reported.
    #[serde(default)]
    pub target_id: Option<TargetId>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_attach_params() {
        let params = serde_json::to_value(AttachToTarget::flattened(TargetId::new("T1")))
            .expect("serialize");
        assert_eq!(params, json!({"targetId": "T1", "flatten": true}));
    }

    #[test]
    fn test_set_auto_attach_params() {
        let params = serde_json::to_value(SetAutoAttach {
            auto_attach: true,
            wait_for_debugger_on_start: false,
            flatten: Some(true),
        })
        .expect("serialize");
        assert_eq!(
            params,
            json!({"autoAttach": true, "waitForDebuggerOnStart": false, "flatten": true})
        );
    }

    #[test]
    fn test_attached_event_payload() {
        let payload: AttachedToTarget = serde_json::from_value(json!({
            "sessionId": "S2",
            "targetInfo": {"targetId": "T2", "type": "iframe", "title": "", "url": "about:blank", "attached": true},
            "waitingForDebugger": false
        }))
        .expect("parse");
        assert_eq!(payload.session_id, SessionId::new("S2"));
        assert_eq!(payload.target_info.target_id, TargetId::new("T2"));
    }

    #[test]
    fn test_empty_result_accepts_object() {
        let _: Empty = serde_json::from_value(json!({})).expect("parse");
    }
}
