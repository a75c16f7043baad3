use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v201::{
    Get15118EvCertificateRequest, Get15118EvCertificateResponse, Iso15118EvCertificateStatus,
};
use crate::services::EvCertificateProvider;

pub struct Get15118EvCertificateHandler {
    pub provider: Option<Arc<dyn EvCertificateProvider>>,
}

#[async_trait]
impl CallHandler for Get15118EvCertificateHandler {
    type Request = Get15118EvCertificateRequest;
    type Response = Get15118EvCertificateResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Get15118EvCertificateRequest,
    ) -> HandlerResult<Option<Get15118EvCertificateResponse>> {
        info!(
            charge_station_id,
            schema_version = request.iso15118_schema_version.as_str(),
            action = ?request.action,
            "Get15118EVCertificate"
        );

        let failed = Get15118EvCertificateResponse {
            status: Iso15118EvCertificateStatus::Failed,
            exi_response: String::new(),
        };

        let Some(provider) = self.provider.as_deref() else {
            warn!(charge_station_id, "no EV certificate provider configured");
            return Ok(Some(failed));
        };

        let response = match provider.provide_certificate(&request.exi_request).await {
            Ok(answer) => Get15118EvCertificateResponse {
                status: answer.status,
                exi_response: answer.certificate_installation_res,
            },
            Err(e) => {
                warn!(charge_station_id, error = %e, "EV certificate request failed");
                failed
            }
        };
        Ok(Some(response))
    }
}
