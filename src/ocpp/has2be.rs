//! has2be plug-and-charge extension for OCPP 1.6
//!
//! Tunneled through `DataTransfer` with vendor id `iso15118`. The shapes are
//! close to 2.0.1 but differ in field names and optionality.

use serde::{Deserialize, Serialize};

pub use super::v201::{CertificateSigningUse, GenericStatus, HashAlgorithm};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcspRequestData {
    pub hash_algorithm: HashAlgorithm,
    pub issuer_name_hash: String,
    pub issuer_key_hash: String,
    pub serial_number: String,
    #[serde(
        rename = "responderURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub responder_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCertificateStatusRequest {
    pub ocsp_request_data: OcspRequestData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetCertificateStatus {
    Accepted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCertificateStatusResponse {
    pub status: GetCertificateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocsp_result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Get15118EvCertificateRequest {
    #[serde(
        rename = "15118SchemaVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<String>,
    pub exi_request: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Iso15118EvCertificateStatus {
    Accepted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateChain {
    pub certificate: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_certificate: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Get15118EvCertificateResponse {
    pub status: Iso15118EvCertificateStatus,
    pub exi_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_signature_certificate_chain: Option<CertificateChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sa_provisioning_certificate_chain: Option<CertificateChain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignCertificateRequest {
    /// PEM, or base64 DER as sent by some firmware.
    pub csr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_of_certificate: Option<CertificateSigningUse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignCertificateResponse {
    pub status: GenericStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSignedRequest {
    /// Hex-encoded DER certificates, leaf first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cert: Vec<String>,
    pub type_of_certificate: CertificateSigningUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateSignedStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSignedResponse {
    pub status: CertificateSignedStatus,
}
