//! OCPP-J message framing
//!
//! The JSON-array framing used on the WebSocket, identical for 1.6 and 2.0.1:
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::{json, Value};

use crate::transport::{ErrorCode, Message, MessageType};

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

/// Errors that can occur when parsing an OCPP-J frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame is not a non-empty array")]
    NotAnArray,
    #[error("message type is not a number")]
    InvalidMessageType,
    #[error("unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },
    #[error("field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

fn string_at(arr: &[Value], index: usize, what: &'static str) -> Result<String, FrameError> {
    arr[index]
        .as_str()
        .map(str::to_string)
        .ok_or(FrameError::FieldTypeMismatch(what))
}

fn require_len(arr: &[Value], expected: usize) -> Result<(), FrameError> {
    if arr.len() < expected {
        return Err(FrameError::MissingFields {
            expected,
            got: arr.len(),
        });
    }
    Ok(())
}

impl OcppFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let arr = match value {
            Value::Array(arr) if !arr.is_empty() => arr,
            _ => return Err(FrameError::NotAnArray),
        };

        let msg_type = arr[0].as_u64().ok_or(FrameError::InvalidMessageType)?;
        match msg_type {
            MSG_TYPE_CALL => {
                require_len(&arr, 4)?;
                Ok(Self::Call {
                    unique_id: string_at(&arr, 1, "uniqueId must be a string")?,
                    action: string_at(&arr, 2, "action must be a string")?,
                    payload: arr[3].clone(),
                })
            }
            MSG_TYPE_CALL_RESULT => {
                require_len(&arr, 3)?;
                Ok(Self::CallResult {
                    unique_id: string_at(&arr, 1, "uniqueId must be a string")?,
                    payload: arr[2].clone(),
                })
            }
            MSG_TYPE_CALL_ERROR => {
                require_len(&arr, 4)?;
                Ok(Self::CallError {
                    unique_id: string_at(&arr, 1, "uniqueId must be a string")?,
                    error_code: arr[2].as_str().unwrap_or("InternalError").to_string(),
                    error_description: arr[3].as_str().unwrap_or("").to_string(),
                    error_details: arr.get(4).cloned().unwrap_or_else(|| json!({})),
                })
            }
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }

    /// Serialize this frame to its wire text.
    pub fn serialize(&self) -> String {
        let arr = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => json!([MSG_TYPE_CALL, unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                json!([MSG_TYPE_CALL_RESULT, unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => json!([
                MSG_TYPE_CALL_ERROR,
                unique_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        arr.to_string()
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }

    pub fn error_response(
        unique_id: impl Into<String>,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.as_str().to_string(),
            error_description: error_description.into(),
            error_details: json!({}),
        }
    }

    /// Wire frame for an outbound [`Message`]. The action, request and state
    /// of a CallResult are not part of the frame.
    pub fn from_message(message: &Message) -> Self {
        match message.message_type {
            MessageType::Call => Self::Call {
                unique_id: message.message_id.clone(),
                action: message.action.clone(),
                payload: message.request_payload().clone(),
            },
            MessageType::CallResult => Self::CallResult {
                unique_id: message.message_id.clone(),
                payload: message.response_payload().clone(),
            },
            MessageType::CallError => Self::error_response(
                message.message_id.clone(),
                message.error_code.unwrap_or(ErrorCode::GenericError),
                message.error_description.clone().unwrap_or_default(),
            ),
        }
    }
}
