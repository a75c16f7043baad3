//! Outbound Call construction
//!
//! The CSMS sends a closed set of commands, listed in [`CsmsRequest`]. A call
//! maker knows how to put some of them on the wire: either directly as an
//! OCPP action, or tunneled through a 1.6 `DataTransfer`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::OcppVersion;
use crate::ocpp::{v16, v201};
use crate::transport::{EmitError, Emitter, Message};

/// Every command the core sends to charge stations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CsmsRequest {
    ChangeConfiguration(v16::ChangeConfigurationRequest),
    TriggerMessage16(v16::TriggerMessageRequest),
    CertificateSigned(v201::CertificateSignedRequest),
    InstallCertificate(v201::InstallCertificateRequest),
    SetVariables(v201::SetVariablesRequest),
    TriggerMessage201(v201::TriggerMessageRequest),
}

/// Payload-free tag of a [`CsmsRequest`], used as the key of action tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    ChangeConfiguration,
    TriggerMessage16,
    CertificateSigned,
    InstallCertificate,
    SetVariables,
    TriggerMessage201,
}

impl CsmsRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::ChangeConfiguration(_) => RequestKind::ChangeConfiguration,
            Self::TriggerMessage16(_) => RequestKind::TriggerMessage16,
            Self::CertificateSigned(_) => RequestKind::CertificateSigned,
            Self::InstallCertificate(_) => RequestKind::InstallCertificate,
            Self::SetVariables(_) => RequestKind::SetVariables,
            Self::TriggerMessage201(_) => RequestKind::TriggerMessage201,
        }
    }

    /// The request's own JSON payload, without any enum tagging.
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallMakerError {
    #[error("unknown request type: {0:?}")]
    UnknownRequestType(RequestKind),

    #[error("encoding request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

pub type CallMakerResult<T> = Result<T, CallMakerError>;

/// Sends CSMS-originated requests to a charge station.
#[async_trait]
pub trait CallMaker: Send + Sync {
    async fn send(&self, charge_station_id: &str, request: CsmsRequest) -> CallMakerResult<()>;
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Sends requests as plain OCPP Calls for one protocol version.
pub struct OcppCallMaker {
    emitter: Arc<dyn Emitter>,
    version: OcppVersion,
    actions: HashMap<RequestKind, &'static str>,
}

impl OcppCallMaker {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        version: OcppVersion,
        actions: impl IntoIterator<Item = (RequestKind, &'static str)>,
    ) -> Self {
        Self {
            emitter,
            version,
            actions: actions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CallMaker for OcppCallMaker {
    async fn send(&self, charge_station_id: &str, request: CsmsRequest) -> CallMakerResult<()> {
        let kind = request.kind();
        let action = self
            .actions
            .get(&kind)
            .copied()
            .ok_or(CallMakerError::UnknownRequestType(kind))?;

        let message = Message::call(action, new_message_id(), request.to_payload()?);
        info!(
            charge_station_id,
            action,
            message_id = message.message_id.as_str(),
            "sending message"
        );
        self.emitter
            .emit(self.version, charge_station_id, &message)
            .await?;
        Ok(())
    }
}

/// Where a tunneled request lands on the charge station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTransferAction {
    pub vendor_id: String,
    pub message_id: String,
}

impl DataTransferAction {
    pub fn new(vendor_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// Tunnels requests to 1.6 charge stations inside `DataTransfer`.
pub struct DataTransferCallMaker {
    emitter: Arc<dyn Emitter>,
    actions: HashMap<RequestKind, DataTransferAction>,
}

impl DataTransferCallMaker {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        actions: impl IntoIterator<Item = (RequestKind, DataTransferAction)>,
    ) -> Self {
        Self {
            emitter,
            actions: actions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CallMaker for DataTransferCallMaker {
    async fn send(&self, charge_station_id: &str, request: CsmsRequest) -> CallMakerResult<()> {
        let kind = request.kind();
        let target = self
            .actions
            .get(&kind)
            .ok_or(CallMakerError::UnknownRequestType(kind))?;

        let envelope = v16::DataTransferRequest {
            vendor_id: target.vendor_id.clone(),
            message_id: Some(target.message_id.clone()),
            data: Some(serde_json::to_string(&request)?),
        };
        let message = Message::call(
            "DataTransfer",
            new_message_id(),
            serde_json::to_value(&envelope)?,
        );
        info!(
            charge_station_id,
            vendor_id = target.vendor_id.as_str(),
            data_transfer_message_id = target.message_id.as_str(),
            message_id = message.message_id.as_str(),
            "sending data transfer message"
        );
        self.emitter
            .emit(OcppVersion::V16, charge_station_id, &message)
            .await?;
        Ok(())
    }
}
