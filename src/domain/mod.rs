//! Protocol-level value objects shared by every layer.

pub mod ocpp;

pub use ocpp::OcppVersion;
