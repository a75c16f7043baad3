//! # CSMS core
//!
//! Protocol core of a Charge Station Management System for OCPP 1.6 and
//! 2.0.1 charge stations.
//!
//! - **transport**: the message envelope, OCPP error codes, emitter and
//!   handler seams
//! - **handlers**: routers, route entries, call makers and the per-version
//!   handler sets, including plug-and-charge tunneled over `DataTransfer`
//! - **sync**: reconciliation loops that push settings, certificates and
//!   trigger requests until stations acknowledge them
//! - **store**: collaborator traits for charge station state, with an
//!   in-memory engine
//! - **gateway**: the WebSocket transport in front of the routers
//! - **server**: wiring, tracing and graceful shutdown

pub mod config;
pub mod domain;
pub mod gateway;
pub mod handlers;
pub mod ocpp;
pub mod schemas;
pub mod server;
pub mod services;
pub mod store;
pub mod support;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{default_config_path, AppConfig, ConfigError};
pub use domain::OcppVersion;
pub use server::{init_tracing, ServerHandle, ServerOptions};
