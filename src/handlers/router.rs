//! Per-version dispatch of inbound messages

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::{CallResultRoute, CallRoute, HandlerError};
use crate::domain::OcppVersion;
use crate::schemas::SchemaValidator;
use crate::transport::{
    EmitError, Emitter, ErrorCode, Message, MessageHandler, MessageType, OcppError,
};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("routing request: {0}")]
    Unroutable(OcppError),

    #[error("{action}: {source}")]
    Handler {
        action: String,
        #[source]
        source: HandlerError,
    },

    #[error("sending call response: {0}")]
    Emit(#[from] EmitError),
}

impl RouterError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Unroutable(e) => e.code(),
            Self::Handler { source, .. } => source.error_code(),
            Self::Emit(_) => ErrorCode::InternalError,
        }
    }

    /// CallError description for this failure: the underlying cause only.
    pub fn description(&self) -> String {
        match self {
            Self::Unroutable(e) => e.description(),
            Self::Handler { source, .. } => source.description(),
            Self::Emit(e) => e.to_string(),
        }
    }
}

/// Routes messages for one OCPP version to their handlers.
///
/// Stateless across Call and CallResult: a CallResult carries the request it
/// answers, so nothing about the original Call is kept here.
pub struct Router {
    version: OcppVersion,
    emitter: Arc<dyn Emitter>,
    validator: Arc<dyn SchemaValidator>,
    call_routes: HashMap<String, CallRoute>,
    call_result_routes: HashMap<String, CallResultRoute>,
}

impl Router {
    pub fn new(
        version: OcppVersion,
        emitter: Arc<dyn Emitter>,
        validator: Arc<dyn SchemaValidator>,
    ) -> Self {
        Self {
            version,
            emitter,
            validator,
            call_routes: HashMap::new(),
            call_result_routes: HashMap::new(),
        }
    }

    pub fn with_call_route(mut self, action: impl Into<String>, route: CallRoute) -> Self {
        self.call_routes.insert(action.into(), route);
        self
    }

    pub fn with_call_result_route(
        mut self,
        action: impl Into<String>,
        route: CallResultRoute,
    ) -> Self {
        self.call_result_routes.insert(action.into(), route);
        self
    }

    pub fn version(&self) -> OcppVersion {
        self.version
    }

    pub fn handles_call(&self, action: &str) -> bool {
        self.call_routes.contains_key(action)
    }

    pub fn handles_call_result(&self, action: &str) -> bool {
        self.call_result_routes.contains_key(action)
    }

    /// Dispatch one message. Only a successful Call produces output: its
    /// CallResult is emitted from here.
    pub async fn route(
        &self,
        charge_station_id: &str,
        message: &Message,
    ) -> Result<(), RouterError> {
        let action = message.action.as_str();
        match message.message_type {
            MessageType::Call => {
                let route = self.call_routes.get(action).ok_or_else(|| {
                    RouterError::Unroutable(OcppError::new(
                        ErrorCode::NotImplemented,
                        format!("{action} not implemented"),
                    ))
                })?;

                let response = route
                    .dispatch(
                        self.validator.as_ref(),
                        charge_station_id,
                        action,
                        message.request_payload(),
                    )
                    .await
                    .map_err(|source| RouterError::Handler {
                        action: action.to_string(),
                        source,
                    })?;

                let reply = Message::call_result_for(message, response);
                self.emitter
                    .emit(self.version, charge_station_id, &reply)
                    .await?;
            }
            MessageType::CallResult => {
                let route = self.call_result_routes.get(action).ok_or_else(|| {
                    RouterError::Unroutable(OcppError::new(
                        ErrorCode::NotImplemented,
                        format!("{action} result not implemented"),
                    ))
                })?;

                route
                    .dispatch(
                        self.validator.as_ref(),
                        charge_station_id,
                        message.request_payload(),
                        Some(message.response_payload()),
                        message.state.clone(),
                    )
                    .await
                    .map_err(|source| RouterError::Handler {
                        action: action.to_string(),
                        source,
                    })?;
            }
            MessageType::CallError => {
                warn!(
                    charge_station_id,
                    action,
                    message_id = message.message_id.as_str(),
                    error_code = ?message.error_code,
                    error_description = message.error_description.as_deref().unwrap_or(""),
                    "charge station returned an error"
                );
                return Err(RouterError::Unroutable(OcppError::new(
                    ErrorCode::MessageTypeNotSupported,
                    format!("{action} call errors are not handled"),
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for Router {
    async fn handle(&self, charge_station_id: &str, message: Message) {
        let result = self.route(charge_station_id, &message).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            "csms_messages_routed_total",
            "action" => message.action.clone(),
            "type" => message.message_type.as_str(),
            "result" => outcome
        )
        .increment(1);

        let err = match result {
            Ok(()) => {
                debug!(
                    charge_station_id,
                    action = message.action.as_str(),
                    ocpp_version = %self.version,
                    "message routed"
                );
                return;
            }
            Err(err) => err,
        };

        error!(
            charge_station_id,
            action = message.action.as_str(),
            error = %err,
            "unable to route message"
        );

        // the charge station only waits for an answer to its own Calls
        if message.is_call() {
            let reply = Message::call_error_for(&message, err.error_code(), err.description());
            if let Err(e) = self
                .emitter
                .emit(self.version, charge_station_id, &reply)
                .await
            {
                error!(charge_station_id, error = %e, "unable to emit error message");
            }
        }
    }
}
