//! Version-agnostic message envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ErrorCode, OcppError};

/// The three OCPP frame kinds, carried on the wire as 2, 3 and 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageType {
    Call,
    CallResult,
    CallError,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "Call",
            Self::CallResult => "CallResult",
            Self::CallError => "CallError",
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Call => 2,
            MessageType::CallResult => 3,
            MessageType::CallError => 4,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Call),
            3 => Ok(Self::CallResult),
            4 => Ok(Self::CallError),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// A single OCPP exchange as seen by the router.
///
/// A `CallResult` carries the request it answers as well as the response, so
/// it can be routed without remembering the original `Call`. `state` is set
/// by whoever sent the `Call` and comes back unchanged with the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub action: String,
    #[serde(rename = "id")]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl Message {
    pub fn call(action: impl Into<String>, message_id: impl Into<String>, request: Value) -> Self {
        Self {
            message_type: MessageType::Call,
            action: action.into(),
            message_id: message_id.into(),
            request: Some(request),
            response: None,
            error_code: None,
            error_description: None,
            state: None,
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Successful reply to `call`, reusing its action and message id.
    pub fn call_result_for(call: &Message, response: Value) -> Self {
        Self {
            message_type: MessageType::CallResult,
            action: call.action.clone(),
            message_id: call.message_id.clone(),
            request: None,
            response: Some(response),
            error_code: None,
            error_description: None,
            state: None,
        }
    }

    /// Error reply to `call`.
    pub fn call_error_for(
        call: &Message,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            message_type: MessageType::CallError,
            action: call.action.clone(),
            message_id: call.message_id.clone(),
            request: None,
            response: None,
            error_code: Some(error_code),
            error_description: Some(error_description.into()),
            state: None,
        }
    }

    /// Error reply built from an [`OcppError`]; only the cause text is kept.
    pub fn from_ocpp_error(call: &Message, err: &OcppError) -> Self {
        Self::call_error_for(call, err.code(), err.description())
    }

    pub fn is_call(&self) -> bool {
        self.message_type == MessageType::Call
    }

    /// Request payload, treating an absent payload as JSON `null`.
    pub fn request_payload(&self) -> &Value {
        self.request.as_ref().unwrap_or(&Value::Null)
    }

    pub fn response_payload(&self) -> &Value {
        self.response.as_ref().unwrap_or(&Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_type_wire_values() {
        let msg = Message::call("Heartbeat", "1", json!({}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], 2);
        assert_eq!(value["id"], "1");
        assert!(value.get("response").is_none());
        assert!(value.get("state").is_none());
    }

    #[test]
    fn decodes_call_result_with_state() {
        let raw = json!({
            "type": 3,
            "action": "ChangeConfiguration",
            "id": "abc",
            "request": {"key": "foo", "value": "bar"},
            "response": {"status": "Accepted"},
            "state": {"attempt": 1}
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.message_type, MessageType::CallResult);
        assert_eq!(msg.state, Some(json!({"attempt": 1})));
    }

    #[test]
    fn rejects_unknown_message_type() {
        let raw = json!({"type": 5, "action": "X", "id": "1"});
        assert!(serde_json::from_value::<Message>(raw).is_err());
    }

    #[test]
    fn call_error_keeps_only_cause_text() {
        let call = Message::call("Authorize", "42", json!({}));
        let err = OcppError::new(ErrorCode::SecurityError, "token revoked");
        let reply = Message::from_ocpp_error(&call, &err);
        assert_eq!(reply.message_type, MessageType::CallError);
        assert_eq!(reply.message_id, "42");
        assert_eq!(reply.error_code, Some(ErrorCode::SecurityError));
        assert_eq!(reply.error_description.as_deref(), Some("token revoked"));
    }
}
