use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::record_certificate_outcome;
use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v201::{
    CertificateSignedRequest, CertificateSignedResponse, CertificateSignedStatus,
    CertificateSigningUse,
};
use crate::store::{CertificateInstallationStatus, CertificateType, Engine};

pub struct CertificateSignedResultHandler {
    pub store: Arc<dyn Engine>,
}

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
        let certificate_type = match request
            .certificate_type
            .unwrap_or(CertificateSigningUse::V2GCertificate)
        {
            CertificateSigningUse::ChargingStationCertificate => CertificateType::ChargeStation,
            CertificateSigningUse::V2GCertificate => CertificateType::Evcc,
        };
        let status = match response.status {
            CertificateSignedStatus::Accepted => CertificateInstallationStatus::Accepted,
            CertificateSignedStatus::Rejected => CertificateInstallationStatus::Rejected,
        };
        info!(
            charge_station_id,
            certificate_type = ?certificate_type,
            status = ?response.status,
            "CertificateSigned result"
        );

        record_certificate_outcome(
            self.store.as_ref(),
            charge_station_id,
            certificate_type,
            request.certificate_chain,
            status,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ChargeStationInstallCertificate, ChargeStationInstallCertificatesStore, InMemoryStore,
    };
    use crate::support::pem;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn outcome_updates_pending_certificate() {
        let store = Arc::new(InMemoryStore::new());
        let chain = pem::encode("CERTIFICATE", b"station leaf");
        let id = pem::certificate_id(&chain).unwrap();
        let send_after = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store
            .update_charge_station_install_certificates(
                "cs001",
                vec![ChargeStationInstallCertificate {
                    certificate_type: CertificateType::ChargeStation,
                    certificate_id: id.clone(),
                    certificate_data: chain.clone(),
                    status: CertificateInstallationStatus::Pending,
                    send_after,
                }],
            )
            .await
            .unwrap();

        let handler = CertificateSignedResultHandler {
            store: store.clone(),
        };
        handler
            .handle_call_result(
                "cs001",
                CertificateSignedRequest {
                    certificate_chain: chain,
                    certificate_type: Some(CertificateSigningUse::ChargingStationCertificate),
                },
                CertificateSignedResponse {
                    status: CertificateSignedStatus::Rejected,
                },
                None,
            )
            .await
            .unwrap();

        let stored = store
            .lookup_charge_station_install_certificates("cs001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.certificates.len(), 1);
        assert_eq!(stored.certificates[0].certificate_id, id);
        assert_eq!(
            stored.certificates[0].status,
            CertificateInstallationStatus::Rejected
        );
        assert_eq!(stored.certificates[0].send_after, send_after);
    }

    #[tokio::test]
    async fn missing_type_means_evcc() {
        let store = Arc::new(InMemoryStore::new());
        let handler = CertificateSignedResultHandler {
            store: store.clone(),
        };
        handler
            .handle_call_result(
                "cs001",
                CertificateSignedRequest {
                    certificate_chain: pem::encode("CERTIFICATE", b"evcc leaf"),
                    certificate_type: None,
                },
                CertificateSignedResponse {
                    status: CertificateSignedStatus::Accepted,
                },
                None,
            )
            .await
            .unwrap();

        let stored = store
            .lookup_charge_station_install_certificates("cs001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.certificates[0].certificate_type, CertificateType::Evcc);
        assert_eq!(
            stored.certificates[0].status,
            CertificateInstallationStatus::Accepted
        );
    }

    #[tokio::test]
    async fn unparseable_chain_is_an_error() {
        let handler = CertificateSignedResultHandler {
            store: Arc::new(InMemoryStore::new()),
        };
        let err = handler
            .handle_call_result(
                "cs001",
                CertificateSignedRequest {
                    certificate_chain: "not pem".into(),
                    certificate_type: None,
                },
                CertificateSignedResponse {
                    status: CertificateSignedStatus::Accepted,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("certificate id"));
    }
}
