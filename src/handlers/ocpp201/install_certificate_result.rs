use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::record_certificate_outcome;
use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v201::{
    InstallCertificateRequest, InstallCertificateResponse, InstallCertificateStatus,
    InstallCertificateUse,
};
use crate::store::{CertificateInstallationStatus, CertificateType, Engine};

impl From<InstallCertificateUse> for CertificateType {
    fn from(certificate_use: InstallCertificateUse) -> Self {
        match certificate_use {
            InstallCertificateUse::V2GRootCertificate => Self::V2G,
            InstallCertificateUse::MORootCertificate => Self::Mo,
            InstallCertificateUse::CSMSRootCertificate => Self::Csms,
            InstallCertificateUse::ManufacturerRootCertificate => Self::Mf,
        }
    }
}

pub struct InstallCertificateResultHandler {
    pub store: Arc<dyn Engine>,
}

#[async_trait]
impl CallResultHandler for InstallCertificateResultHandler {
    type Request = InstallCertificateRequest;
    type Response = InstallCertificateResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: InstallCertificateRequest,
        response: InstallCertificateResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            certificate_type = ?request.certificate_type,
            status = ?response.status,
            "InstallCertificate result"
        );

        // Failed installs go back to the queue.
        let status = match response.status {
            InstallCertificateStatus::Accepted => CertificateInstallationStatus::Accepted,
            InstallCertificateStatus::Rejected => CertificateInstallationStatus::Rejected,
            InstallCertificateStatus::Failed => CertificateInstallationStatus::Pending,
        };

        record_certificate_outcome(
            self.store.as_ref(),
            charge_station_id,
            request.certificate_type.into(),
            request.certificate,
            status,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChargeStationInstallCertificatesStore, InMemoryStore};
    use crate::support::pem;

    async fn install(
        store: &Arc<InMemoryStore>,
        certificate_type: InstallCertificateUse,
        certificate: &str,
        status: InstallCertificateStatus,
    ) {
        InstallCertificateResultHandler {
            store: store.clone(),
        }
        .handle_call_result(
            "cs001",
            InstallCertificateRequest {
                certificate_type,
                certificate: certificate.into(),
            },
            InstallCertificateResponse { status },
            None,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn maps_root_types_and_statuses() {
        let store = Arc::new(InMemoryStore::new());
        let v2g = pem::encode("CERTIFICATE", b"v2g root");
        let mo = pem::encode("CERTIFICATE", b"mo root");
        let csms = pem::encode("CERTIFICATE", b"csms root");
        let mf = pem::encode("CERTIFICATE", b"mf root");

        install(&store, InstallCertificateUse::V2GRootCertificate, &v2g, InstallCertificateStatus::Accepted).await;
        install(&store, InstallCertificateUse::MORootCertificate, &mo, InstallCertificateStatus::Rejected).await;
        install(&store, InstallCertificateUse::CSMSRootCertificate, &csms, InstallCertificateStatus::Failed).await;
        install(&store, InstallCertificateUse::ManufacturerRootCertificate, &mf, InstallCertificateStatus::Accepted).await;

        let stored = store
            .lookup_charge_station_install_certificates("cs001")
            .await
            .unwrap()
            .unwrap();
        let outcome: Vec<_> = stored
            .certificates
            .iter()
            .map(|c| (c.certificate_type, c.status))
            .collect();
        assert_eq!(
            outcome,
            vec![
                (CertificateType::V2G, CertificateInstallationStatus::Accepted),
                (CertificateType::Mo, CertificateInstallationStatus::Rejected),
                (CertificateType::Csms, CertificateInstallationStatus::Pending),
                (CertificateType::Mf, CertificateInstallationStatus::Accepted),
            ]
        );
        assert_eq!(
            stored.certificates[0].certificate_id,
            pem::certificate_id(&v2g).unwrap()
        );
    }
}
