//! Certificate service collaborators
//!
//! The plug-and-charge handlers delegate every cryptographic decision to
//! these traits. All of them are optional at wiring time; handlers answer
//! with a failure status when a service is absent.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ocpp::v201::{Iso15118EvCertificateStatus, OcspRequestData};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Validates certificate chains on behalf of a charge station.
#[async_trait]
pub trait CertificateValidationService: Send + Sync {
    /// Returns the base64 OCSP response when the revocation status of the
    /// chain could be determined, `None` when it could not.
    async fn validate_hashed_certificate_chain(
        &self,
        ocsp_request_data: &[OcspRequestData],
    ) -> ServiceResult<Option<String>>;
}

/// Which CA a charge station CSR is signed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    /// Charge station operator CA, for the station's own TLS certificate.
    Cso,
    /// V2G CA, for the ISO 15118 EVCC leaf.
    V2G,
}

/// Signs charge station CSRs.
#[async_trait]
pub trait ChargeStationCertificateProvider: Send + Sync {
    /// Returns the signed PEM chain, leaf first.
    async fn provide_certificate(
        &self,
        kind: CertificateKind,
        pem_csr: &str,
        charge_station_id: &str,
    ) -> ServiceResult<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvCertificate15118Response {
    pub status: Iso15118EvCertificateStatus,
    pub certificate_installation_res: String,
}

/// Answers ISO 15118 contract certificate installation requests.
#[async_trait]
pub trait EvCertificateProvider: Send + Sync {
    async fn provide_certificate(&self, exi_request: &str)
        -> ServiceResult<EvCertificate15118Response>;
}

/// The certificate services available to the plug-and-charge handlers.
#[derive(Clone, Default)]
pub struct CertificateServices {
    pub validation: Option<Arc<dyn CertificateValidationService>>,
    pub charge_station_provider: Option<Arc<dyn ChargeStationCertificateProvider>>,
    pub ev_provider: Option<Arc<dyn EvCertificateProvider>>,
}
