//! Wire message types.
//!
//! Defines the JSON frames exchanged with the browser over the WebSocket.
//!
//! # Format
//!
//! Outgoing command:
//! ```json
//! { "id": 7, "method": "Page.enable", "params": {}, "sessionId": "S1" }
//! ```
//!
//! Incoming response:
//! ```json
//! { "id": 7, "result": {}, "sessionId": "S1" }
//! { "id": 8, "error": { "code": -32601, "message": "'Page.nope' wasn't found" } }
//! ```
//!
//! Incoming event:
//! ```json
//! { "method": "Page.loadEventFired", "params": { "timestamp": 1.5 }, "sessionId": "S1" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

// ============================================================================
// Method Names
// ============================================================================

/// Splits `Domain.name` into its two halves.
///
/// Returns `None` unless both halves are non-empty.
#[must_use]
pub fn split_method(method: &str) -> Option<(&str, &str)> {
    let (domain, name) = method.split_once('.')?;
    if domain.is_empty() || name.is_empty() {
        return None;
    }
    Some((domain, name))
}

// ============================================================================
// Request
// ============================================================================

/// A command frame from the client to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Correlation id.
    pub id: RequestId,

    /// Method in `Domain.command` form.
    pub method: String,

    /// Command parameters, forwarded as supplied.
    pub params: Value,

    /// Target session (absent for the root session).
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Request {
    /// Creates a request. `Null` params are sent as `{}`.
    #[must_use]
    pub fn new(
        id: RequestId,
        method: impl Into<String>,
        params: Value,
        session_id: Option<SessionId>,
    ) -> Self {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            id,
            method: method.into(),
            params,
            session_id,
        }
    }

    /// Serializes the request into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// ProtocolErrorBody
// ============================================================================

/// The `error` object of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolErrorBody {
    /// Browser error code.
    pub code: i64,
    /// Browser error message.
    pub message: String,
    /// Optional extra detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProtocolErrorBody {
    /// Reads an `error` object without failing.
    ///
    /// A missing `message` becomes empty. Without an integer `code` the
    /// whole raw value is kept in `data` under [`UNKNOWN_ERROR_CODE`].
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let message = match &raw {
            Value::String(message) => message.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };

        match raw.get("code").and_then(Value::as_i64) {
            Some(code) => Self {
                code,
                message,
                data: raw.get("data").filter(|d| !d.is_null()).cloned(),
            },
            None => Self {
                code: UNKNOWN_ERROR_CODE,
                message,
                data: Some(raw),
            },
        }
    }

    /// Converts into a crate error attributed to `method`.
    #[must_use]
    pub fn into_error(self, method: &str) -> Error {
        Error::protocol(method, self.code, self.message, self.data)
    }
}

// ============================================================================
// Response
// ============================================================================

/// A command response from the browser.
#[derive(Debug, Clone)]
pub struct Response {
    /// Matches the command `id`.
    pub id: RequestId,
    /// Session the response belongs to.
    pub session_id: Option<SessionId>,
    /// `result` on success, `error` on failure.
    pub outcome: std::result::Result<Value, ProtocolErrorBody>,
}

// ============================================================================
// Event
// ============================================================================

/// An unsolicited event notification from the browser.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name in `Domain.event` form.
    pub method: String,
    /// Event payload, passed through uninterpreted.
    pub params: Value,
    /// Session the event belongs to.
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Returns the domain part of the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name part of the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split_once('.').map(|(_, e)| e).unwrap_or_default()
    }
}

// ============================================================================
// Incoming
// ============================================================================

/// Code used when the browser's `error` object has no integer `code`.
pub const UNKNOWN_ERROR_CODE: i64 = -32603;

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Frame with an `id`: answer to a command.
    Response(Response),
    /// Frame with a `method` and no `id`: event.
    Event(Event),
}

impl Incoming {
    /// Parses and classifies a text frame.
    ///
    /// A frame with an `id` is a response even if it also names a method.
    /// A response without `result` resolves to `{}`. The `error` object is
    /// read leniently so that a response always settles its call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the text is not a JSON object,
    /// has neither `id` nor `method`, or carries an `id`, `method` or
    /// `sessionId` of the wrong type.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::malformed_frame(format!("invalid JSON: {e}")))?;
        let Value::Object(mut frame) = value else {
            return Err(Error::malformed_frame("frame is not a JSON object"));
        };

        let session_id = match frame.remove("sessionId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(SessionId::new(id)),
            Some(other) => {
                return Err(Error::malformed_frame(format!(
                    "'sessionId' must be a string, got {other}"
                )));
            }
        };

        if let Some(id) = frame.remove("id") {
            let id = id
                .as_u64()
                .ok_or_else(|| Error::malformed_frame(format!("'id' must be an unsigned integer, got {id}")))?;
            let outcome = match frame.remove("error") {
                Some(error) if !error.is_null() => Err(ProtocolErrorBody::from_value(error)),
                _ => Ok(match frame.remove("result") {
                    None | Some(Value::Null) => Value::Object(Map::new()),
                    Some(result) => result,
                }),
            };
            return Ok(Self::Response(Response {
                id: RequestId::new(id),
                session_id,
                outcome,
            }));
        }

        match frame.remove("method") {
            Some(Value::String(method)) => Ok(Self::Event(Event {
                method,
                params: match frame.remove("params") {
                    None | Some(Value::Null) => Value::Object(Map::new()),
                    Some(params) => params,
                },
                session_id,
            })),
            Some(other) => Err(Error::malformed_frame(format!(
                "'method' must be a string, got {other}"
            ))),
            None => Err(Error::malformed_frame("frame has neither 'id' nor 'method'")),
        }
    }

    /// Returns the session id the frame is tagged with.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Response(response) => response.session_id.as_ref(),
            Self::Event(event) => event.session_id.as_ref(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_root() {
        let request = Request::new(RequestId::new(1), "Page.enable", Value::Null, None);
        let frame: Value = serde_json::from_str(&request.to_frame().expect("frame")).expect("json");

        assert_eq!(frame, json!({"id": 1, "method": "Page.enable", "params": {}}));
    }

    #[test]
    fn test_request_serialization_with_session() {
        let request = Request::new(
            RequestId::new(9),
            "Runtime.evaluate",
            json!({"expression": "1+1"}),
            Some(SessionId::new("S1")),
        );
        let frame: Value = serde_json::from_str(&request.to_frame().expect("frame")).expect("json");

        assert_eq!(frame["sessionId"], "S1");
        assert_eq!(frame["params"]["expression"], "1+1");
    }

    #[test]
    fn test_parse_success_response() {
        let incoming = Incoming::parse(r#"{"id":3,"result":{"frameId":"F"},"sessionId":"S1"}"#)
            .expect("parse");

        let Incoming::Response(response) = incoming else {
            panic!("expected response");
        };
        assert_eq!(response.id, RequestId::new(3));
        assert_eq!(response.session_id, Some(SessionId::new("S1")));
        assert_eq!(response.outcome.expect("ok")["frameId"], "F");
    }

    #[test]
    fn test_parse_response_without_result() {
        let Incoming::Response(response) = Incoming::parse(r#"{"id":4}"#).expect("parse") else {
            panic!("expected response");
        };
        assert_eq!(response.outcome.expect("ok"), json!({}));
    }

    #[test]
    fn test_parse_error_response() {
        let text = r#"{"id":5,"error":{"code":-32601,"message":"'Page.nope' wasn't found","data":"x"}}"#;
        let Incoming::Response(response) = Incoming::parse(text).expect("parse") else {
            panic!("expected response");
        };

        let body = response.outcome.expect_err("error");
        assert_eq!(body.code, -32601);
        assert_eq!(body.data, Some(json!("x")));

        let err = body.into_error("Page.nope");
        assert_eq!(err.protocol_code(), Some(-32601));
    }

    #[test]
    fn test_parse_event() {
        let text = r#"{"method":"Page.loadEventFired","params":{"timestamp":1.5},"sessionId":"S1"}"#;
        let Incoming::Event(event) = Incoming::parse(text).expect("parse") else {
            panic!("expected event");
        };
        assert_eq!(event.domain(), "Page");
        assert_eq!(event.event_name(), "loadEventFired");
        assert_eq!(event.params["timestamp"], 1.5);
    }

    #[test]
    fn test_parse_error_without_message() {
        let Incoming::Response(response) =
            Incoming::parse(r#"{"id":6,"error":{"code":-32000}}"#).expect("parse")
        else {
            panic!("expected response");
        };

        let body = response.outcome.expect_err("error");
        assert_eq!(body.code, -32000);
        assert_eq!(body.message, "");
        assert_eq!(body.data, None);
    }

    #[test]
    fn test_parse_error_with_bad_code_keeps_raw_body() {
        let text = r#"{"id":7,"error":{"code":"oops","message":"boom"}}"#;
        let Incoming::Response(response) = Incoming::parse(text).expect("parse") else {
            panic!("expected response");
        };

        let body = response.outcome.expect_err("error");
        assert_eq!(body.code, UNKNOWN_ERROR_CODE);
        assert_eq!(body.message, "boom");
        assert_eq!(body.data, Some(json!({"code": "oops", "message": "boom"})));

        let Incoming::Response(response) =
            Incoming::parse(r#"{"id":8,"error":"gone"}"#).expect("parse")
        else {
            panic!("expected response");
        };
        let body = response.outcome.expect_err("error");
        assert_eq!(body.message, "gone");
        assert_eq!(body.data, Some(json!("gone")));
    }

    #[test]
    fn test_parse_rejects_shapeless_frame() {
        for text in [
            r#"{"params":{}}"#,
            "not json",
            "[1,2]",
            r#"{"id":"1","result":{}}"#,
            r#"{"id":-1}"#,
            r#"{"id":1,"sessionId":7}"#,
            r#"{"method":5}"#,
        ] {
            assert!(
                matches!(Incoming::parse(text), Err(Error::MalformedFrame { .. })),
                "{text}"
            );
        }
    }

    #[test]
    fn test_split_method() {
        assert_eq!(split_method("Page.enable"), Some(("Page", "enable")));
        assert_eq!(split_method("Page."), None);
        assert_eq!(split_method(".enable"), None);
        assert_eq!(split_method("Page"), None);
    }

    proptest! {
        #[test]
        fn prop_split_method_round_trips(domain in "[A-Z][A-Za-z]{0,12}", name in "[a-z][A-Za-z]{0,16}") {
            let method = format!("{domain}.{name}");
            prop_assert_eq!(split_method(&method), Some((domain.as_str(), name.as_str())));
        }
    }
}
