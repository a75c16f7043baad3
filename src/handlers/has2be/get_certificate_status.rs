use async_trait::async_trait;

use crate::handlers::{ocpp201, CallHandler, HandlerResult};
use crate::ocpp::{has2be, v201};

pub struct GetCertificateStatusHandler {
    pub inner: ocpp201::GetCertificateStatusHandler,
}

#[async_trait]
impl CallHandler for GetCertificateStatusHandler {
    type Request = has2be::GetCertificateStatusRequest;
    type Response = has2be::GetCertificateStatusResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: has2be::GetCertificateStatusRequest,
    ) -> HandlerResult<Option<has2be::GetCertificateStatusResponse>> {
        let data = request.ocsp_request_data;
        let response = self
            .inner
            .handle_call(
                charge_station_id,
                v201::GetCertificateStatusRequest {
                    ocsp_request_data: v201::OcspRequestData {
                        hash_algorithm: data.hash_algorithm,
                        issuer_name_hash: data.issuer_name_hash,
                        issuer_key_hash: data.issuer_key_hash,
                        serial_number: data.serial_number,
                        responder_url: data.responder_url.unwrap_or_default(),
                    },
                },
            )
            .await?;

        Ok(response.map(|r| has2be::GetCertificateStatusResponse {
            status: match r.status {
                v201::GetCertificateStatus::Accepted => has2be::GetCertificateStatus::Accepted,
                v201::GetCertificateStatus::Failed => has2be::GetCertificateStatus::Failed,
            },
            ocsp_result: r.ocsp_result,
        }))
    }
}
