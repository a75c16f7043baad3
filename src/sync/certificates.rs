use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::{deliver, is_due, Reconciler, SyncCallMakers, SyncConfig};
use crate::domain::OcppVersion;
use crate::handlers::CsmsRequest;
use crate::ocpp::v201::{
    CertificateSignedRequest, CertificateSigningUse, InstallCertificateRequest,
    InstallCertificateUse,
};
use crate::store::{
    CertificateInstallationStatus, CertificateType, ChargeStationInstallCertificate,
    ChargeStationInstallCertificates, Engine, StoreResult,
};

/// The request that delivers `certificate` to a charge station.
pub fn certificate_request(certificate: &ChargeStationInstallCertificate) -> CsmsRequest {
    let data = certificate.certificate_data.clone();
    let signed = |use_: CertificateSigningUse| {
        CsmsRequest::CertificateSigned(CertificateSignedRequest {
            certificate_chain: data.clone(),
            certificate_type: Some(use_),
        })
    };
    let install = |use_: InstallCertificateUse| {
        CsmsRequest::InstallCertificate(InstallCertificateRequest {
            certificate_type: use_,
            certificate: data.clone(),
        })
    };

    match certificate.certificate_type {
        CertificateType::ChargeStation => signed(CertificateSigningUse::ChargingStationCertificate),
        CertificateType::Evcc => signed(CertificateSigningUse::V2GCertificate),
        CertificateType::Csms => install(InstallCertificateUse::CSMSRootCertificate),
        CertificateType::V2G => install(InstallCertificateUse::V2GRootCertificate),
        CertificateType::Mo => install(InstallCertificateUse::MORootCertificate),
        CertificateType::Mf => install(InstallCertificateUse::ManufacturerRootCertificate),
    }
}

/// Delivers pending certificates, tunneled through `DataTransfer` for 1.6
/// stations.
pub struct CertificatesReconciler {
    store: Arc<dyn Engine>,
    call_makers: SyncCallMakers,
    config: SyncConfig,
}

impl CertificatesReconciler {
    pub fn new(store: Arc<dyn Engine>, call_makers: SyncCallMakers, config: SyncConfig) -> Self {
        Self {
            store,
            call_makers,
            config,
        }
    }
}

#[async_trait]
impl Reconciler for CertificatesReconciler {
    type Entry = ChargeStationInstallCertificates;

    fn name(&self) -> &'static str {
        "certificates"
    }

    async fn list(
        &self,
        page_size: usize,
        after: &str,
    ) -> StoreResult<Vec<ChargeStationInstallCertificates>> {
        self.store
            .list_charge_station_install_certificates(page_size, after)
            .await
    }

    fn charge_station_id<'a>(&self, entry: &'a ChargeStationInstallCertificates) -> &'a str {
        &entry.charge_station_id
    }

    fn has_pending(&self, entry: &ChargeStationInstallCertificates) -> bool {
        entry
            .certificates
            .iter()
            .any(|c| c.status == CertificateInstallationStatus::Pending)
    }

    async fn reconcile(
        &self,
        entry: ChargeStationInstallCertificates,
        version: OcppVersion,
        now: DateTime<Utc>,
    ) {
        let charge_station_id = entry.charge_station_id.as_str();
        let call_maker = match version {
            OcppVersion::V16 => self.call_makers.v16_data_transfer.as_ref(),
            OcppVersion::V201 => self.call_makers.v201.as_ref(),
        };

        for mut certificate in entry.certificates {
            if certificate.status != CertificateInstallationStatus::Pending
                || !is_due(certificate.send_after, now)
            {
                continue;
            }

            let request = certificate_request(&certificate);
            certificate.send_after = self.config.next_attempt(now);
            let certificate_id = certificate.certificate_id.clone();
            let certificate_type = certificate.certificate_type;

            if let Err(e) = self
                .store
                .update_charge_station_install_certificates(charge_station_id, vec![certificate])
                .await
            {
                error!(
                    charge_station_id,
                    certificate_id = certificate_id.as_str(),
                    error = %e,
                    "unable to reschedule certificate"
                );
                continue;
            }

            info!(
                charge_station_id,
                certificate_id = certificate_id.as_str(),
                certificate_type = ?certificate_type,
                "sending certificate"
            );
            deliver(self.name(), call_maker, charge_station_id, request).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ChargeStationInstallCertificatesStore, ChargeStationRuntimeDetails,
        ChargeStationRuntimeDetailsStore, InMemoryStore,
    };
    use crate::support::clock::SystemClock;
    use crate::sync::{sync_page, SyncContext};
    use crate::testing::RecordingCallMaker;

    fn certificate(
        id: &str,
        certificate_type: CertificateType,
        status: CertificateInstallationStatus,
    ) -> ChargeStationInstallCertificate {
        ChargeStationInstallCertificate {
            certificate_type,
            certificate_id: id.to_string(),
            certificate_data: format!("pem-{id}"),
            status,
            send_after: DateTime::<Utc>::default(),
        }
    }

    #[test]
    fn certificate_types_map_to_requests() {
        let cases = [
            (
                CertificateType::ChargeStation,
                CsmsRequest::CertificateSigned(CertificateSignedRequest {
                    certificate_chain: "pem-a".into(),
                    certificate_type: Some(CertificateSigningUse::ChargingStationCertificate),
                }),
            ),
            (
                CertificateType::Evcc,
                CsmsRequest::CertificateSigned(CertificateSignedRequest {
                    certificate_chain: "pem-a".into(),
                    certificate_type: Some(CertificateSigningUse::V2GCertificate),
                }),
            ),
            (
                CertificateType::Csms,
                CsmsRequest::InstallCertificate(InstallCertificateRequest {
                    certificate_type: InstallCertificateUse::CSMSRootCertificate,
                    certificate: "pem-a".into(),
                }),
            ),
            (
                CertificateType::V2G,
                CsmsRequest::InstallCertificate(InstallCertificateRequest {
                    certificate_type: InstallCertificateUse::V2GRootCertificate,
                    certificate: "pem-a".into(),
                }),
            ),
            (
                CertificateType::Mo,
                CsmsRequest::InstallCertificate(InstallCertificateRequest {
                    certificate_type: InstallCertificateUse::MORootCertificate,
                    certificate: "pem-a".into(),
                }),
            ),
            (
                CertificateType::Mf,
                CsmsRequest::InstallCertificate(InstallCertificateRequest {
                    certificate_type: InstallCertificateUse::ManufacturerRootCertificate,
                    certificate: "pem-a".into(),
                }),
            ),
        ];
        for (certificate_type, expected) in cases {
            let cert = certificate("a", certificate_type, CertificateInstallationStatus::Pending);
            assert_eq!(certificate_request(&cert), expected, "{certificate_type:?}");
        }
    }

    async fn setup(version: OcppVersion) -> (Arc<InMemoryStore>, SyncCallMakers, [Arc<RecordingCallMaker>; 3]) {
        let store = Arc::new(InMemoryStore::new());
        store
            .set_charge_station_runtime_details(
                "cs001",
                ChargeStationRuntimeDetails { ocpp_version: version },
            )
            .await
            .unwrap();
        store
            .update_charge_station_install_certificates(
                "cs001",
                vec![
                    certificate("a", CertificateType::V2G, CertificateInstallationStatus::Pending),
                    certificate("b", CertificateType::Mo, CertificateInstallationStatus::Accepted),
                ],
            )
            .await
            .unwrap();

        let makers = [
            Arc::new(RecordingCallMaker::new()),
            Arc::new(RecordingCallMaker::new()),
            Arc::new(RecordingCallMaker::new()),
        ];
        let call_makers = SyncCallMakers {
            v16: makers[0].clone(),
            v16_data_transfer: makers[1].clone(),
            v201: makers[2].clone(),
        };
        (store, call_makers, makers)
    }

    async fn run(store: &Arc<InMemoryStore>, call_makers: SyncCallMakers) {
        let config = SyncConfig::default();
        let reconciler = CertificatesReconciler::new(store.clone(), call_makers, config);
        let context = SyncContext {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            config,
        };
        sync_page(&reconciler, &context, "").await;
    }

    #[tokio::test]
    async fn v16_certificates_go_through_data_transfer() {
        let (store, call_makers, makers) = setup(OcppVersion::V16).await;
        run(&store, call_makers).await;

        assert!(makers[0].requests().is_empty());
        assert!(makers[2].requests().is_empty());
        let sent = makers[1].requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            CsmsRequest::InstallCertificate(InstallCertificateRequest {
                certificate_type: InstallCertificateUse::V2GRootCertificate,
                certificate: "pem-a".into(),
            })
        );

        let stored = store
            .lookup_charge_station_install_certificates("cs001")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.certificates[0].send_after > Utc::now());
        assert_eq!(
            stored.certificates[0].status,
            CertificateInstallationStatus::Pending
        );
        assert_eq!(stored.certificates[1].send_after, DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn v201_certificates_go_out_directly() {
        let (store, call_makers, makers) = setup(OcppVersion::V201).await;
        run(&store, call_makers.clone()).await;
        run(&store, call_makers).await;

        assert!(makers[0].requests().is_empty());
        assert!(makers[1].requests().is_empty());
        assert_eq!(makers[2].requests().len(), 1);
    }
}
