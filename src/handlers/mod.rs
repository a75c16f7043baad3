//! Message handlers and their route entries
//!
//! A handler works on typed requests and responses. [`CallRoute`] and
//! [`CallResultRoute`] pair a handler with the schemas that guard it and
//! erase its types, so a routing table can hold handlers for any action.
//! The same route entries serve the top-level [`router::Router`] and the
//! `DataTransfer` vendor sub-router.

pub mod call_maker;
pub mod has2be;
pub mod ocpp16;
pub mod ocpp201;
pub mod router;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::schemas::{SchemaError, SchemaValidator};
use crate::services::{CertificateServices, ServiceError};
use crate::store::{Engine, StoreError};
use crate::support::clock::Clock;
use crate::transport::{ErrorCode, OcppError};

pub use call_maker::{
    CallMaker, CallMakerError, CsmsRequest, DataTransferCallMaker, OcppCallMaker, RequestKind,
};
pub use router::{Router, RouterError};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Ocpp(#[from] OcppError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("sending call: {0}")]
    CallMaker(#[from] CallMakerError),

    #[error("service: {0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wire code for a CallError reporting this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Ocpp(e) => e.code(),
            _ => ErrorCode::InternalError,
        }
    }

    /// Text for the CallError description: the cause only, without the code.
    pub fn description(&self) -> String {
        match self {
            Self::Ocpp(e) => e.description(),
            other => other.to_string(),
        }
    }

    fn format_violation(cause: impl std::fmt::Display) -> Self {
        Self::Ocpp(OcppError::new(ErrorCode::FormatViolation, cause.to_string()))
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Collaborators shared by the handlers of both protocol versions.
#[derive(Clone)]
pub struct HandlerContext {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn Engine>,
    pub services: CertificateServices,
    pub heartbeat_interval: Duration,
}

/// Handles a Call sent by a charge station.
///
/// Returning `Ok(None)` is a bug in the handler and is reported as an
/// internal error.
#[async_trait]
pub trait CallHandler: Send + Sync {
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> HandlerResult<Option<Self::Response>>;
}

/// Handles the charge station's answer to a Call the CSMS sent.
#[async_trait]
pub trait CallResultHandler: Send + Sync {
    type Request: DeserializeOwned + Send;
    type Response: DeserializeOwned + Send;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: Self::Request,
        response: Self::Response,
        state: Option<Value>,
    ) -> HandlerResult<()>;
}

/// [`CallHandler`] with its types erased to JSON.
#[async_trait]
pub trait DynCallHandler: Send + Sync {
    async fn handle_json(&self, charge_station_id: &str, request: Value)
        -> HandlerResult<Option<Value>>;
}

#[async_trait]
impl<H: CallHandler> DynCallHandler for H {
    async fn handle_json(
        &self,
        charge_station_id: &str,
        request: Value,
    ) -> HandlerResult<Option<Value>> {
        let request: H::Request =
            serde_json::from_value(request).map_err(HandlerError::format_violation)?;
        match self.handle_call(charge_station_id, request).await? {
            Some(response) => serde_json::to_value(response)
                .map(Some)
                .map_err(|e| HandlerError::internal(format!("encoding response: {e}"))),
            None => Ok(None),
        }
    }
}

/// [`CallResultHandler`] with its types erased to JSON.
#[async_trait]
pub trait DynCallResultHandler: Send + Sync {
    async fn handle_json(
        &self,
        charge_station_id: &str,
        request: Value,
        response: Value,
        state: Option<Value>,
    ) -> HandlerResult<()>;
}

#[async_trait]
impl<H: CallResultHandler> DynCallResultHandler for H {
    async fn handle_json(
        &self,
        charge_station_id: &str,
        request: Value,
        response: Value,
        state: Option<Value>,
    ) -> HandlerResult<()> {
        let request: H::Request =
            serde_json::from_value(request).map_err(HandlerError::format_violation)?;
        let response: H::Response =
            serde_json::from_value(response).map_err(HandlerError::format_violation)?;
        self.handle_call_result(charge_station_id, request, response, state)
            .await
    }
}

/// Schema failures on inbound payloads: violations are the sender's fault,
/// anything else (missing or broken schema) is ours.
fn inbound_schema_error(err: SchemaError) -> HandlerError {
    if err.is_violation() {
        HandlerError::format_violation(err)
    } else {
        HandlerError::internal(err.to_string())
    }
}

#[derive(Clone)]
pub struct CallRoute {
    pub request_schema: String,
    pub response_schema: String,
    pub handler: Arc<dyn DynCallHandler>,
}

impl CallRoute {
    pub fn new<H>(
        request_schema: impl Into<String>,
        response_schema: impl Into<String>,
        handler: H,
    ) -> Self
    where
        H: CallHandler + 'static,
    {
        Self {
            request_schema: request_schema.into(),
            response_schema: response_schema.into(),
            handler: Arc::new(handler),
        }
    }

    /// Validate, decode and handle `request`, returning the encoded response.
    ///
    /// The request must match its schema before the handler runs. A response
    /// that fails its schema is logged and returned anyway.
    pub async fn dispatch(
        &self,
        validator: &dyn SchemaValidator,
        charge_station_id: &str,
        action: &str,
        request: &Value,
    ) -> HandlerResult<Value> {
        validator
            .validate(request, &self.request_schema)
            .map_err(inbound_schema_error)?;

        let response = self
            .handler
            .handle_json(charge_station_id, request.clone())
            .await?
            .ok_or_else(|| HandlerError::internal(format!("no response or error for {action}")))?;

        if let Err(e) = validator.validate(&response, &self.response_schema) {
            warn!(
                charge_station_id,
                action,
                error = %e,
                "response not valid"
            );
        }
        Ok(response)
    }
}

#[derive(Clone)]
pub struct CallResultRoute {
    pub request_schema: String,
    pub response_schema: String,
    pub handler: Arc<dyn DynCallResultHandler>,
}

impl CallResultRoute {
    pub fn new<H>(
        request_schema: impl Into<String>,
        response_schema: impl Into<String>,
        handler: H,
    ) -> Self
    where
        H: CallResultHandler + 'static,
    {
        Self {
            request_schema: request_schema.into(),
            response_schema: response_schema.into(),
            handler: Arc::new(handler),
        }
    }

    /// Validate, decode and handle a request/response pair.
    ///
    /// An absent `response` skips validation and decodes from `null`, which
    /// suits handlers whose response type is an `Option`.
    pub async fn dispatch(
        &self,
        validator: &dyn SchemaValidator,
        charge_station_id: &str,
        request: &Value,
        response: Option<&Value>,
        state: Option<Value>,
    ) -> HandlerResult<()> {
        validator
            .validate(request, &self.request_schema)
            .map_err(inbound_schema_error)?;
        if let Some(response) = response {
            validator
                .validate(response, &self.response_schema)
                .map_err(inbound_schema_error)?;
        }

        self.handler
            .handle_json(
                charge_station_id,
                request.clone(),
                response.cloned().unwrap_or(Value::Null),
                state,
            )
            .await
    }
}
