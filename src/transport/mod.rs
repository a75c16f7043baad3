//! Transport-facing contracts
//!
//! The envelope every component exchanges, the OCPP error taxonomy, and the
//! two seams towards the transport: [`Emitter`] for outbound traffic and
//! [`MessageHandler`] for inbound traffic.

pub mod error;
pub mod message;

use async_trait::async_trait;

use crate::domain::OcppVersion;

pub use error::{ErrorCode, OcppError};
pub use message::{Message, MessageType};

/// Failure to hand a message to the transport.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("charge station {0} is not connected")]
    NotConnected(String),

    #[error("charge station {charge_station_id} speaks {actual}, not {requested}")]
    VersionMismatch {
        charge_station_id: String,
        requested: OcppVersion,
        actual: OcppVersion,
    },

    #[error("encoding message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Transport(String),
}

/// Sends a message to a charge station.
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit(
        &self,
        version: OcppVersion,
        charge_station_id: &str,
        message: &Message,
    ) -> Result<(), EmitError>;
}

/// Consumes inbound messages for one OCPP version.
///
/// Implementations answer through their own emitter; nothing is returned to
/// the transport.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, charge_station_id: &str, message: Message);
}
