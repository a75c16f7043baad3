use async_trait::async_trait;

use crate::handlers::{ocpp201, CallHandler, HandlerResult};
use crate::ocpp::{has2be, v201};

pub struct Get15118EvCertificateHandler {
    pub inner: ocpp201::Get15118EvCertificateHandler,
}

#[async_trait]
impl CallHandler for Get15118EvCertificateHandler {
    type Request = has2be::Get15118EvCertificateRequest;
    type Response = has2be::Get15118EvCertificateResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: has2be::Get15118EvCertificateRequest,
    ) -> HandlerResult<Option<has2be::Get15118EvCertificateResponse>> {
        let response = self
            .inner
            .handle_call(
                charge_station_id,
                v201::Get15118EvCertificateRequest {
                    iso15118_schema_version: request.schema_version.unwrap_or_default(),
                    action: v201::CertificateAction::Install,
                    exi_request: request.exi_request,
                },
            )
            .await?;

        Ok(response.map(|r| has2be::Get15118EvCertificateResponse {
            status: match r.status {
                v201::Iso15118EvCertificateStatus::Accepted => {
                    has2be::Iso15118EvCertificateStatus::Accepted
                }
                v201::Iso15118EvCertificateStatus::Failed => {
                    has2be::Iso15118EvCertificateStatus::Failed
                }
            },
            exi_response: r.exi_response,
            contract_signature_certificate_chain: None,
            sa_provisioning_certificate_chain: None,
        }))
    }
}
