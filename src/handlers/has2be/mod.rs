//! has2be plug-and-charge over 1.6 `DataTransfer`
//!
//! Each handler converts the has2be shapes to their 2.0.1 counterparts and
//! delegates to the 2.0.1 handler.

pub mod certificate_signed_result;
pub mod get_15118_ev_certificate;
pub mod get_certificate_status;
pub mod sign_certificate;

pub use certificate_signed_result::CertificateSignedResultHandler;
pub use get_15118_ev_certificate::Get15118EvCertificateHandler;
pub use get_certificate_status::GetCertificateStatusHandler;
pub use sign_certificate::SignCertificateHandler;

/// DataTransfer vendor id of the has2be extension.
pub const VENDOR_ID: &str = "iso15118";
