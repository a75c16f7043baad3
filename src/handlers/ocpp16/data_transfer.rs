//! Vendor sub-router for `DataTransfer`
//!
//! Tunneled messages are addressed by vendor id and message id. Inside the
//! tunnel they get the same treatment as top-level messages: schema check,
//! typed handler, schema check on the way out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::handlers::{
    CallHandler, CallResultHandler, CallResultRoute, CallRoute, HandlerError, HandlerResult,
};
use crate::ocpp::v16::{DataTransferRequest, DataTransferResponse, DataTransferStatus};
use crate::schemas::SchemaValidator;

/// vendor id → message id → route
pub type VendorRoutes<R> = HashMap<String, HashMap<String, R>>;

fn parse_data(data: Option<&str>) -> HandlerResult<Option<Value>> {
    data.map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(HandlerError::format_violation)
}

pub struct DataTransferHandler {
    pub validator: Arc<dyn SchemaValidator>,
    pub routes: VendorRoutes<CallRoute>,
}

#[async_trait]
impl CallHandler for DataTransferHandler {
    type Request = DataTransferRequest;
    type Response = DataTransferResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: DataTransferRequest,
    ) -> HandlerResult<Option<DataTransferResponse>> {
        let message_id = request.message_id.as_deref().unwrap_or("");
        info!(
            charge_station_id,
            vendor_id = request.vendor_id.as_str(),
            message_id,
            "data transfer"
        );

        let Some(vendor) = self.routes.get(&request.vendor_id) else {
            return Ok(Some(DataTransferResponse::status_only(
                DataTransferStatus::UnknownVendorId,
            )));
        };
        let Some(route) = vendor.get(message_id) else {
            return Ok(Some(DataTransferResponse::status_only(
                DataTransferStatus::UnknownMessageId,
            )));
        };

        let data = parse_data(request.data.as_deref())?.unwrap_or(Value::Null);
        let action = format!("{}:{}", request.vendor_id, message_id);
        let response = route
            .dispatch(self.validator.as_ref(), charge_station_id, &action, &data)
            .await?;

        Ok(Some(DataTransferResponse {
            status: DataTransferStatus::Accepted,
            data: Some(response.to_string()),
        }))
    }
}

pub struct DataTransferResultHandler {
    pub validator: Arc<dyn SchemaValidator>,
    pub routes: VendorRoutes<CallResultRoute>,
}

#[async_trait]
impl CallResultHandler for DataTransferResultHandler {
    type Request = DataTransferRequest;
    type Response = DataTransferResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: DataTransferRequest,
        response: DataTransferResponse,
        state: Option<Value>,
    ) -> HandlerResult<()> {
        let message_id = request.message_id.as_deref().unwrap_or("");
        info!(
            charge_station_id,
            vendor_id = request.vendor_id.as_str(),
            message_id,
            status = ?response.status,
            "data transfer result"
        );

        let route = self
            .routes
            .get(&request.vendor_id)
            .ok_or_else(|| {
                HandlerError::internal(format!(
                    "unknown data transfer result vendor: {}",
                    request.vendor_id
                ))
            })?
            .get(message_id)
            .ok_or_else(|| {
                HandlerError::internal(format!(
                    "unknown data transfer result message id: {message_id}"
                ))
            })?;

        let inner_request = parse_data(request.data.as_deref())?.unwrap_or(Value::Null);
        let inner_response = parse_data(response.data.as_deref())?;

        route
            .dispatch(
                self.validator.as_ref(),
                charge_station_id,
                &inner_request,
                inner_response.as_ref(),
                state,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::v201::{
        GenericStatus, SignCertificateRequest, SignCertificateResponse, TriggerMessageRequest,
        TriggerMessageResponse,
    };
    use crate::testing::schema_validator;
    use crate::transport::ErrorCode;
    use std::sync::Mutex;

    const VENDOR: &str = "org.openchargealliance.iso15118pnc";

    struct AlwaysAccept;

    #[async_trait]
    impl CallHandler for AlwaysAccept {
        type Request = SignCertificateRequest;
        type Response = SignCertificateResponse;

        async fn handle_call(
            &self,
            _charge_station_id: &str,
            _request: SignCertificateRequest,
        ) -> HandlerResult<Option<SignCertificateResponse>> {
            Ok(Some(SignCertificateResponse {
                status: GenericStatus::Accepted,
            }))
        }
    }

    #[derive(Default)]
    struct Seen(Arc<Mutex<Vec<Option<TriggerMessageResponse>>>>);

    #[async_trait]
    impl CallResultHandler for Seen {
        type Request = TriggerMessageRequest;
        type Response = Option<TriggerMessageResponse>;

        async fn handle_call_result(
            &self,
            _charge_station_id: &str,
            _request: TriggerMessageRequest,
            response: Option<TriggerMessageResponse>,
            _state: Option<Value>,
        ) -> HandlerResult<()> {
            self.0.lock().unwrap().push(response);
            Ok(())
        }
    }

    fn call_handler() -> DataTransferHandler {
        DataTransferHandler {
            validator: Arc::new(schema_validator()),
            routes: HashMap::from([(
                VENDOR.to_string(),
                HashMap::from([(
                    "SignCertificate".to_string(),
                    CallRoute::new(
                        "ocpp201/SignCertificateRequest.json",
                        "ocpp201/SignCertificateResponse.json",
                        AlwaysAccept,
                    ),
                )]),
            )]),
        }
    }

    fn request(vendor: &str, message_id: Option<&str>, data: Option<&str>) -> DataTransferRequest {
        DataTransferRequest {
            vendor_id: vendor.to_string(),
            message_id: message_id.map(str::to_string),
            data: data.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn unknown_vendor_is_a_status_not_an_error() {
        let response = call_handler()
            .handle_call("cs001", request("com.example", Some("SignCertificate"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, DataTransferStatus::UnknownVendorId);
        assert_eq!(response.data, None);
    }

    #[tokio::test]
    async fn unknown_message_is_a_status_not_an_error() {
        let response = call_handler()
            .handle_call("cs001", request(VENDOR, Some("Authorize"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, DataTransferStatus::UnknownMessageId);
        assert_eq!(response.data, None);
    }

    #[tokio::test]
    async fn known_route_embeds_inner_response() {
        let response = call_handler()
            .handle_call(
                "cs001",
                request(VENDOR, Some("SignCertificate"), Some(r#"{"csr":"abc"}"#)),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, DataTransferStatus::Accepted);
        assert_eq!(response.data.as_deref(), Some(r#"{"status":"Accepted"}"#));
    }

    #[tokio::test]
    async fn invalid_inner_payload_is_format_violation() {
        let handler = call_handler();
        for data in [None, Some("{}"), Some("not json")] {
            let err = handler
                .handle_call("cs001", request(VENDOR, Some("SignCertificate"), data))
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::FormatViolation, "{data:?}");
        }
    }

    fn result_handler(seen: &Seen) -> DataTransferResultHandler {
        DataTransferResultHandler {
            validator: Arc::new(schema_validator()),
            routes: HashMap::from([(
                VENDOR.to_string(),
                HashMap::from([(
                    "TriggerMessage".to_string(),
                    CallResultRoute::new(
                        "ocpp201/TriggerMessageRequest.json",
                        "ocpp201/TriggerMessageResponse.json",
                        Seen(seen.0.clone()),
                    ),
                )]),
            )]),
        }
    }

    #[tokio::test]
    async fn result_dispatches_inner_pair() {
        let seen = Seen::default();
        let handler = result_handler(&seen);
        let trigger = r#"{"requestedMessage":"SignV2GCertificate"}"#;

        handler
            .handle_call_result(
                "cs001",
                request(VENDOR, Some("TriggerMessage"), Some(trigger)),
                DataTransferResponse {
                    status: DataTransferStatus::Accepted,
                    data: Some(r#"{"status":"Rejected"}"#.to_string()),
                },
                None,
            )
            .await
            .unwrap();
        handler
            .handle_call_result(
                "cs001",
                request(VENDOR, Some("TriggerMessage"), Some(trigger)),
                DataTransferResponse::status_only(DataTransferStatus::Accepted),
                None,
            )
            .await
            .unwrap();

        let seen = seen.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0].as_ref().map(|r| r.status),
            Some(crate::ocpp::v201::TriggerMessageStatus::Rejected)
        );
        assert_eq!(seen[1], None);
    }

    #[tokio::test]
    async fn result_for_unknown_vendor_or_message_is_an_error() {
        let seen = Seen::default();
        let handler = result_handler(&seen);
        let response = DataTransferResponse::status_only(DataTransferStatus::Accepted);

        let err = handler
            .handle_call_result(
                "cs001",
                request("com.example", Some("TriggerMessage"), None),
                response.clone(),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("vendor"));

        let err = handler
            .handle_call_result(
                "cs001",
                request(VENDOR, Some("InstallCertificate"), None),
                response,
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("message id"));
        assert!(seen.0.lock().unwrap().is_empty());
    }
}
