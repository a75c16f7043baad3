//! OCPP protocol version negotiation
//!
//! During the WebSocket handshake the charge station advertises which OCPP
//! sub-protocols it supports via the `Sec-WebSocket-Protocol` header.
//! The negotiator picks the best mutually-supported version.

use crate::domain::OcppVersion;

/// Outcome of a handshake negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiation {
    pub version: OcppVersion,
    /// Sub-protocol to echo back, `None` when the station offered nothing we
    /// speak and the default version is assumed.
    pub subprotocol: Option<&'static str>,
}

/// Picks the highest version both sides support.
#[derive(Debug, Clone)]
pub struct ProtocolNegotiator {
    /// Versions we speak, in preference order (highest first).
    supported_versions: Vec<OcppVersion>,
}

impl ProtocolNegotiator {
    pub fn new(supported_versions: Vec<OcppVersion>) -> Self {
        Self { supported_versions }
    }

    /// Best mutually-supported version for a `Sec-WebSocket-Protocol` value.
    pub fn negotiate(&self, requested_protocols: &str) -> Option<OcppVersion> {
        let requested: Vec<&str> = requested_protocols.split(',').map(str::trim).collect();

        self.supported_versions
            .iter()
            .copied()
            .find(|version| requested.contains(&version.subprotocol()))
    }

    /// Like [`negotiate`](Self::negotiate), falling back to our preferred
    /// version without echoing a sub-protocol.
    pub fn negotiate_or_default(&self, requested_protocols: &str) -> Option<Negotiation> {
        match self.negotiate(requested_protocols) {
            Some(version) => Some(Negotiation {
                version,
                subprotocol: Some(version.subprotocol()),
            }),
            None => self.supported_versions.first().map(|version| Negotiation {
                version: *version,
                subprotocol: None,
            }),
        }
    }

    pub fn supported_versions(&self) -> &[OcppVersion] {
        &self.supported_versions
    }

    pub fn supported_subprotocols(&self) -> Vec<&'static str> {
        self.supported_versions
            .iter()
            .map(|v| v.subprotocol())
            .collect()
    }
}

impl Default for ProtocolNegotiator {
    fn default() -> Self {
        Self::new(OcppVersion::ALL.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_single_match() {
        let negotiator = ProtocolNegotiator::new(vec![OcppVersion::V16]);
        assert_eq!(negotiator.negotiate("ocpp1.6"), Some(OcppVersion::V16));
    }

    #[test]
    fn negotiate_multiple_prefers_highest() {
        let negotiator = ProtocolNegotiator::default();
        assert_eq!(
            negotiator.negotiate("ocpp1.6, ocpp2.0.1"),
            Some(OcppVersion::V201)
        );
        assert_eq!(
            negotiator.negotiate("ocpp1.5,ocpp1.6"),
            Some(OcppVersion::V16)
        );
    }

    #[test]
    fn negotiate_no_match() {
        let negotiator = ProtocolNegotiator::new(vec![OcppVersion::V16]);
        assert_eq!(negotiator.negotiate("ocpp2.0.1"), None);
        assert_eq!(negotiator.negotiate(""), None);
    }

    #[test]
    fn unmatched_offer_falls_back_to_newest_without_echo() {
        let negotiator = ProtocolNegotiator::default();
        assert_eq!(
            negotiator.negotiate_or_default(""),
            Some(Negotiation {
                version: OcppVersion::V201,
                subprotocol: None,
            })
        );
        assert_eq!(
            negotiator.negotiate_or_default("ocpp1.6"),
            Some(Negotiation {
                version: OcppVersion::V16,
                subprotocol: Some("ocpp1.6"),
            })
        );
        assert_eq!(ProtocolNegotiator::new(vec![]).negotiate_or_default(""), None);
    }
}
