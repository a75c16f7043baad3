//! OCPP protocol shared types

pub mod version;

pub use version::{OcppVersion, UnknownOcppVersion};
