use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v201::{
    GetCertificateStatus, GetCertificateStatusRequest, GetCertificateStatusResponse,
};
use crate::services::CertificateValidationService;

/// Answers OCSP status queries through the validation service.
pub struct GetCertificateStatusHandler {
    pub validation: Option<Arc<dyn CertificateValidationService>>,
}

#[async_trait]
impl CallHandler for GetCertificateStatusHandler {
    type Request = GetCertificateStatusRequest;
    type Response = GetCertificateStatusResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: GetCertificateStatusRequest,
    ) -> HandlerResult<Option<GetCertificateStatusResponse>> {
        let data = request.ocsp_request_data;
        info!(
            charge_station_id,
            serial_number = data.serial_number.as_str(),
            responder_url = data.responder_url.as_str(),
            "GetCertificateStatus"
        );

        let failed = GetCertificateStatusResponse {
            status: GetCertificateStatus::Failed,
            ocsp_result: None,
        };

        let Some(validation) = self.validation.as_deref() else {
            warn!(charge_station_id, "no certificate validation service configured");
            return Ok(Some(failed));
        };

        let response = match validation
            .validate_hashed_certificate_chain(std::slice::from_ref(&data))
            .await
        {
            Ok(Some(ocsp_result)) => GetCertificateStatusResponse {
                status: GetCertificateStatus::Accepted,
                ocsp_result: Some(ocsp_result),
            },
            Ok(None) => failed,
            Err(e) => {
                warn!(charge_station_id, error = %e, "certificate status lookup failed");
                failed
            }
        };
        Ok(Some(response))
    }
}
