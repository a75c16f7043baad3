//! Store collaborator contracts
//!
//! The core reads and writes only the pending-convergence items below and the
//! runtime OCPP version of each charge station. All writes are "set current
//! value" merges, so the sync engine and result handlers can write the same
//! item concurrently and converge on the last write.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::OcppVersion;

pub use memory::InMemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ── Settings ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingStatus {
    Pending,
    Accepted,
    Rejected,
    RebootRequired,
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeStationSetting {
    pub value: String,
    pub status: SettingStatus,
    /// No delivery attempt before this instant.
    #[serde(default)]
    pub send_after: DateTime<Utc>,
}

impl ChargeStationSetting {
    pub fn pending(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status: SettingStatus::Pending,
            send_after: DateTime::<Utc>::default(),
        }
    }

    pub fn with_status(value: impl Into<String>, status: SettingStatus) -> Self {
        Self {
            value: value.into(),
            status,
            send_after: DateTime::<Utc>::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeStationSettings {
    pub charge_station_id: String,
    pub settings: BTreeMap<String, ChargeStationSetting>,
}

#[async_trait]
pub trait ChargeStationSettingsStore: Send + Sync {
    /// Merge `settings` by name into the station's current settings.
    async fn update_charge_station_settings(
        &self,
        charge_station_id: &str,
        settings: BTreeMap<String, ChargeStationSetting>,
    ) -> StoreResult<()>;

    async fn lookup_charge_station_settings(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationSettings>>;

    /// Up to `page_size` entries ordered by charge station id, starting after
    /// `previous_charge_station_id` (empty for the first page).
    async fn list_charge_station_settings(
        &self,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<ChargeStationSettings>>;
}

// ── Runtime details ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeStationRuntimeDetails {
    pub ocpp_version: OcppVersion,
}

#[async_trait]
pub trait ChargeStationRuntimeDetailsStore: Send + Sync {
    async fn set_charge_station_runtime_details(
        &self,
        charge_station_id: &str,
        details: ChargeStationRuntimeDetails,
    ) -> StoreResult<()>;

    async fn lookup_charge_station_runtime_details(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationRuntimeDetails>>;
}

// ── Install certificates ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateType {
    ChargeStation,
    #[serde(rename = "EVCC")]
    Evcc,
    V2G,
    #[serde(rename = "MO")]
    Mo,
    #[serde(rename = "MF")]
    Mf,
    #[serde(rename = "CSMS")]
    Csms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateInstallationStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeStationInstallCertificate {
    pub certificate_type: CertificateType,
    pub certificate_id: String,
    pub certificate_data: String,
    pub status: CertificateInstallationStatus,
    #[serde(default)]
    pub send_after: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeStationInstallCertificates {
    pub charge_station_id: String,
    pub certificates: Vec<ChargeStationInstallCertificate>,
}

#[async_trait]
pub trait ChargeStationInstallCertificatesStore: Send + Sync {
    /// Merge by certificate id: known ids are updated in place, new ids are
    /// appended in order.
    async fn update_charge_station_install_certificates(
        &self,
        charge_station_id: &str,
        certificates: Vec<ChargeStationInstallCertificate>,
    ) -> StoreResult<()>;

    async fn lookup_charge_station_install_certificates(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationInstallCertificates>>;

    async fn list_charge_station_install_certificates(
        &self,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<ChargeStationInstallCertificates>>;
}

// ── Trigger messages ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerStatus {
    Pending,
    Accepted,
    Rejected,
    NotImplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerMessage {
    BootNotification,
    Heartbeat,
    StatusNotification,
    FirmwareStatusNotification,
    DiagnosticStatusNotification,
    MeterValues,
    SignChargingStationCertificate,
    SignV2GCertificate,
    SignCombinedCertificate,
    PublishFirmwareStatusNotification,
}

impl fmt::Display for TriggerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeStationTriggerMessage {
    pub charge_station_id: String,
    pub trigger_message: TriggerMessage,
    pub status: TriggerStatus,
    #[serde(default)]
    pub send_after: DateTime<Utc>,
}

impl ChargeStationTriggerMessage {
    pub fn pending(charge_station_id: impl Into<String>, trigger_message: TriggerMessage) -> Self {
        Self {
            charge_station_id: charge_station_id.into(),
            trigger_message,
            status: TriggerStatus::Pending,
            send_after: DateTime::<Utc>::default(),
        }
    }
}

#[async_trait]
pub trait ChargeStationTriggerMessageStore: Send + Sync {
    /// Replace the station's trigger; the id inside `trigger` is ignored.
    async fn set_charge_station_trigger_message(
        &self,
        charge_station_id: &str,
        trigger: ChargeStationTriggerMessage,
    ) -> StoreResult<()>;

    async fn lookup_charge_station_trigger_message(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationTriggerMessage>>;

    async fn list_charge_station_trigger_messages(
        &self,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<ChargeStationTriggerMessage>>;
}

/// Every store capability the core needs.
pub trait Engine:
    ChargeStationSettingsStore
    + ChargeStationRuntimeDetailsStore
    + ChargeStationInstallCertificatesStore
    + ChargeStationTriggerMessageStore
{
}

impl<T> Engine for T where
    T: ChargeStationSettingsStore
        + ChargeStationRuntimeDetailsStore
        + ChargeStationInstallCertificatesStore
        + ChargeStationTriggerMessageStore
{
}
