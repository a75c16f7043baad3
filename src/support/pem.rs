//! Minimal PEM handling for certificate bookkeeping.
//!
//! Only framing is handled here: locating blocks, base64 and hashing. The
//! certificate contents are never parsed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PemError {
    #[error("no PEM block found")]
    NoBlock,
    #[error("expected {expected}, got {actual}")]
    UnexpectedLabel { expected: String, actual: String },
    #[error("unterminated PEM block {0}")]
    Unterminated(String),
    #[error("invalid base64: {0}")]
    Base64(String),
}

/// A decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    pub label: String,
    pub der: Vec<u8>,
}

/// Decode the first PEM block in `text`.
pub fn decode_first(text: &str) -> Result<PemBlock, PemError> {
    let mut lines = text.lines().map(str::trim);

    let label = lines
        .by_ref()
        .find_map(|line| {
            line.strip_prefix("-----BEGIN ")
                .and_then(|rest| rest.strip_suffix("-----"))
        })
        .ok_or(PemError::NoBlock)?
        .to_string();

    let end = format!("-----END {label}-----");
    let mut body = String::new();
    let mut terminated = false;
    for line in lines {
        if line == end {
            terminated = true;
            break;
        }
        body.push_str(line);
    }
    if !terminated {
        return Err(PemError::Unterminated(label));
    }

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| PemError::Base64(e.to_string()))?;
    Ok(PemBlock { label, der })
}

/// Encode `der` as a PEM block with 64-column lines.
pub fn encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// Identity of a certificate chain: hex SHA-256 of the leaf's DER.
pub fn certificate_id(pem_chain: &str) -> Result<String, PemError> {
    let block = decode_first(pem_chain)?;
    if block.label != "CERTIFICATE" {
        return Err(PemError::UnexpectedLabel {
            expected: "CERTIFICATE".to_string(),
            actual: block.label,
        });
    }
    Ok(hex::encode(Sha256::digest(&block.der)))
}

/// Accept a CSR either as PEM or as bare base64 DER and return PEM plus the
/// detected input format.
pub fn normalize_csr(csr: &str) -> Result<(String, &'static str), PemError> {
    if decode_first(csr).is_ok() {
        return Ok((csr.to_string(), "pem"));
    }
    let der = STANDARD
        .decode(csr.trim().as_bytes())
        .map_err(|e| PemError::Base64(e.to_string()))?;
    Ok((encode("CERTIFICATE REQUEST", &der), "base64"))
}
