//! OCPP protocol version
//!
//! Identifies which protocol a charge station speaks. The version selects
//! the router on inbound traffic and the call maker for outbound commands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported OCPP protocol versions
///
/// Serialized as the bare version string (`"1.6"`, `"2.0.1"`) which is also
/// the form kept in charge station runtime details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OcppVersion {
    /// OCPP 1.6 (JSON / OCPP-J)
    #[serde(rename = "1.6")]
    V16,
    /// OCPP 2.0.1
    #[serde(rename = "2.0.1")]
    V201,
}

impl OcppVersion {
    /// All supported OCPP versions, ordered from newest to oldest.
    pub const ALL: &'static [OcppVersion] = &[Self::V201, Self::V16];

    /// WebSocket subprotocol identifier for this OCPP version.
    ///
    /// Used in the `Sec-WebSocket-Protocol` header during handshake.
    pub fn subprotocol(&self) -> &'static str {
        match self {
            Self::V16 => "ocpp1.6",
            Self::V201 => "ocpp2.0.1",
        }
    }

    /// Parse an OCPP version from a WebSocket subprotocol string.
    pub fn from_subprotocol(s: &str) -> Option<Self> {
        match s.trim() {
            "ocpp1.6" => Some(Self::V16),
            "ocpp2.0.1" => Some(Self::V201),
            _ => None,
        }
    }

    /// Bare version string, e.g. `"2.0.1"`.
    pub fn version_string(&self) -> &'static str {
        match self {
            Self::V16 => "1.6",
            Self::V201 => "2.0.1",
        }
    }

    /// Directory holding this version's JSON schemas.
    pub fn schema_set(&self) -> &'static str {
        match self {
            Self::V16 => "ocpp16",
            Self::V201 => "ocpp201",
        }
    }
}

impl FromStr for OcppVersion {
    type Err = UnknownOcppVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.6" => Ok(Self::V16),
            "2.0.1" => Ok(Self::V201),
            other => Err(UnknownOcppVersion(other.to_string())),
        }
    }
}

impl fmt::Display for OcppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OCPP {}", self.version_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown OCPP version: {0}")]
pub struct UnknownOcppVersion(pub String);
