//! OCPP wire error taxonomy

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of OCPP-J error codes shared by 1.6 and 2.0.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    FormatViolation,
    GenericError,
    InternalError,
    MessageTypeNotSupported,
    NotImplemented,
    NotSupported,
    OccurrenceConstraintViolation,
    PropertyConstraintViolation,
    ProtocolError,
    RpcFrameworkError,
    SecurityError,
    TypeConstraintViolation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormatViolation => "FormatViolation",
            Self::GenericError => "GenericError",
            Self::InternalError => "InternalError",
            Self::MessageTypeNotSupported => "MessageTypeNotSupported",
            Self::NotImplemented => "NotImplemented",
            Self::NotSupported => "NotSupported",
            Self::OccurrenceConstraintViolation => "OccurrenceConstraintViolation",
            Self::PropertyConstraintViolation => "PropertyConstraintViolation",
            Self::ProtocolError => "ProtocolError",
            Self::RpcFrameworkError => "RpcFrameworkError",
            Self::SecurityError => "SecurityError",
            Self::TypeConstraintViolation => "TypeConstraintViolation",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "FormatViolation" => Self::FormatViolation,
            // 1.6 spelling of the same condition
            "FormationViolation" => Self::FormatViolation,
            "GenericError" => Self::GenericError,
            "InternalError" => Self::InternalError,
            "MessageTypeNotSupported" => Self::MessageTypeNotSupported,
            "NotImplemented" => Self::NotImplemented,
            "NotSupported" => Self::NotSupported,
            "OccurrenceConstraintViolation" => Self::OccurrenceConstraintViolation,
            "OccurenceConstraintViolation" => Self::OccurrenceConstraintViolation,
            "PropertyConstraintViolation" => Self::PropertyConstraintViolation,
            "ProtocolError" => Self::ProtocolError,
            "RpcFrameworkError" => Self::RpcFrameworkError,
            "SecurityError" => Self::SecurityError,
            "TypeConstraintViolation" => Self::TypeConstraintViolation,
            other => return Err(format!("unknown error code: {other}")),
        };
        Ok(code)
    }
}

type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// An error tagged with an OCPP wire code.
///
/// Handlers return this when the failure must reach the charge station with
/// a specific code. The optional cause supplies the `CallError` description.
#[derive(Debug)]
pub struct OcppError {
    code: ErrorCode,
    cause: Option<Cause>,
}

impl OcppError {
    pub fn new(code: ErrorCode, cause: impl Into<Cause>) -> Self {
        Self {
            code,
            cause: Some(cause.into()),
        }
    }

    pub fn bare(code: ErrorCode) -> Self {
        Self { code, cause: None }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Message text of the wrapped cause, or empty when there is none.
    pub fn description(&self) -> String {
        self.cause
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for OcppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.code, cause),
            None => write!(f, "{}", self.code),
        }
    }
}

impl StdError for OcppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}
