use async_trait::async_trait;
use tracing::{info, warn};

use crate::handlers::{ocpp201, CallHandler, HandlerResult};
use crate::ocpp::{has2be, v201};
use crate::support::pem;

pub struct SignCertificateHandler {
    pub inner: ocpp201::SignCertificateHandler,
}

#[async_trait]
impl CallHandler for SignCertificateHandler {
    type Request = has2be::SignCertificateRequest;
    type Response = has2be::SignCertificateResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: has2be::SignCertificateRequest,
    ) -> HandlerResult<Option<has2be::SignCertificateResponse>> {
        // some firmware sends bare base64 DER instead of PEM
        let csr = match pem::normalize_csr(&request.csr) {
            Ok((csr, format)) => {
                info!(charge_station_id, csr_format = format, "has2be SignCertificate");
                csr
            }
            Err(e) => {
                warn!(charge_station_id, error = %e, "unreadable CSR");
                return Ok(Some(has2be::SignCertificateResponse {
                    status: v201::GenericStatus::Rejected,
                }));
            }
        };

        let response = self
            .inner
            .handle_call(
                charge_station_id,
                v201::SignCertificateRequest {
                    csr,
                    certificate_type: request.type_of_certificate,
                },
            )
            .await?;

        Ok(response.map(|r| has2be::SignCertificateResponse { status: r.status }))
    }
}
