use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::has2be::{CertificateSignedRequest, CertificateSignedResponse};

/// has2be chains carry no PEM, so the outcome is only logged.
pub struct CertificateSignedResultHandler;

#[async_trait]
impl CallResultHandler for CertificateSignedResultHandler {
    type Request = CertificateSignedRequest;
    type Response = CertificateSignedResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: CertificateSignedRequest,
        response: CertificateSignedResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            certificate_type = ?request.type_of_certificate,
            certificates = request.cert.len(),
            status = ?response.status,
            "has2be CertificateSigned result"
        );
        Ok(())
    }
}
