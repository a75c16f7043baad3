use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::handlers::{CallHandler, HandlerError, HandlerResult};
use crate::ocpp::v201::{
    CertificateSigningUse, GenericStatus, SignCertificateRequest, SignCertificateResponse,
};
use crate::services::{CertificateKind, ChargeStationCertificateProvider};
use crate::store::{
    CertificateInstallationStatus, CertificateType, ChargeStationInstallCertificate, Engine,
};
use crate::support::pem;

/// Signs the CSR right away and queues the resulting chain for delivery via
/// `CertificateSigned`.
pub struct SignCertificateHandler {
    pub provider: Option<Arc<dyn ChargeStationCertificateProvider>>,
    pub store: Arc<dyn Engine>,
}

impl SignCertificateHandler {
    async fn sign(
        &self,
        provider: &dyn ChargeStationCertificateProvider,
        charge_station_id: &str,
        request: &SignCertificateRequest,
    ) -> HandlerResult<()> {
        let certificate_use = request
            .certificate_type
            .unwrap_or(CertificateSigningUse::V2GCertificate);
        let (kind, certificate_type) = match certificate_use {
            CertificateSigningUse::ChargingStationCertificate => {
                (CertificateKind::Cso, CertificateType::ChargeStation)
            }
            CertificateSigningUse::V2GCertificate => (CertificateKind::V2G, CertificateType::Evcc),
        };

        let chain = provider
            .provide_certificate(kind, &request.csr, charge_station_id)
            .await?;
        let certificate_id = pem::certificate_id(&chain)
            .map_err(|e| HandlerError::internal(format!("signed chain: {e}")))?;

        info!(
            charge_station_id,
            certificate_type = ?certificate_type,
            certificate_id = certificate_id.as_str(),
            "certificate signed"
        );

        self.store
            .update_charge_station_install_certificates(
                charge_station_id,
                vec![ChargeStationInstallCertificate {
                    certificate_type,
                    certificate_id,
                    certificate_data: chain,
                    status: CertificateInstallationStatus::Pending,
                    send_after: Default::default(),
                }],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CallHandler for SignCertificateHandler {
    type Request = SignCertificateRequest;
    type Response = SignCertificateResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: SignCertificateRequest,
    ) -> HandlerResult<Option<SignCertificateResponse>> {
        info!(
            charge_station_id,
            certificate_type = ?request.certificate_type,
            "SignCertificate"
        );

        let status = match self.provider.as_deref() {
            None => {
                warn!(charge_station_id, "no certificate provider configured");
                GenericStatus::Rejected
            }
            Some(provider) => match self.sign(provider, charge_station_id, &request).await {
                Ok(()) => GenericStatus::Accepted,
                Err(e) => {
                    warn!(charge_station_id, error = %e, "signing certificate failed");
                    GenericStatus::Rejected
                }
            },
        };

        Ok(Some(SignCertificateResponse { status }))
    }
}
