//! In-memory store for development and testing

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    ChargeStationInstallCertificate, ChargeStationInstallCertificates,
    ChargeStationInstallCertificatesStore, ChargeStationRuntimeDetails,
    ChargeStationRuntimeDetailsStore, ChargeStationSetting, ChargeStationSettings,
    ChargeStationSettingsStore, ChargeStationTriggerMessage, ChargeStationTriggerMessageStore,
    StoreResult,
};

/// DashMap-backed [`Engine`](super::Engine) keyed by charge station id.
pub struct InMemoryStore {
    settings: DashMap<String, ChargeStationSettings>,
    runtime_details: DashMap<String, ChargeStationRuntimeDetails>,
    install_certificates: DashMap<String, ChargeStationInstallCertificates>,
    trigger_messages: DashMap<String, ChargeStationTriggerMessage>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            settings: DashMap::new(),
            runtime_details: DashMap::new(),
            install_certificates: DashMap::new(),
            trigger_messages: DashMap::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of values ordered by key, strictly after `previous`.
fn page<V: Clone>(map: &DashMap<String, V>, page_size: usize, previous: &str) -> Vec<V> {
    let mut keys: Vec<String> = map.iter().map(|entry| entry.key().clone()).collect();
    keys.sort();
    keys.into_iter()
        .filter(|key| key.as_str() > previous)
        .take(page_size)
        .filter_map(|key| map.get(&key).map(|entry| entry.value().clone()))
        .collect()
}

#[async_trait]
impl ChargeStationSettingsStore for InMemoryStore {
    async fn update_charge_station_settings(
        &self,
        charge_station_id: &str,
        settings: BTreeMap<String, ChargeStationSetting>,
    ) -> StoreResult<()> {
        let mut entry = self
            .settings
            .entry(charge_station_id.to_string())
            .or_insert_with(|| ChargeStationSettings {
                charge_station_id: charge_station_id.to_string(),
                settings: BTreeMap::new(),
            });
        entry.settings.extend(settings);
        Ok(())
    }

    async fn lookup_charge_station_settings(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationSettings>> {
        Ok(self
            .settings
            .get(charge_station_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_charge_station_settings(
        &self,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<ChargeStationSettings>> {
        Ok(page(&self.settings, page_size, previous_charge_station_id))
    }
}

#[async_trait]
impl ChargeStationRuntimeDetailsStore for InMemoryStore {
    async fn set_charge_station_runtime_details(
        &self,
        charge_station_id: &str,
        details: ChargeStationRuntimeDetails,
    ) -> StoreResult<()> {
        self.runtime_details
            .insert(charge_station_id.to_string(), details);
        Ok(())
    }

    async fn lookup_charge_station_runtime_details(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationRuntimeDetails>> {
        Ok(self
            .runtime_details
            .get(charge_station_id)
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ChargeStationInstallCertificatesStore for InMemoryStore {
    async fn update_charge_station_install_certificates(
        &self,
        charge_station_id: &str,
        certificates: Vec<ChargeStationInstallCertificate>,
    ) -> StoreResult<()> {
        let mut entry = self
            .install_certificates
            .entry(charge_station_id.to_string())
            .or_insert_with(|| ChargeStationInstallCertificates {
                charge_station_id: charge_station_id.to_string(),
                certificates: Vec::new(),
            });

        for update in certificates {
            match entry
                .certificates
                .iter_mut()
                .find(|existing| existing.certificate_id == update.certificate_id)
            {
                Some(existing) => *existing = update,
                None => entry.certificates.push(update),
            }
        }
        Ok(())
    }

    async fn lookup_charge_station_install_certificates(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationInstallCertificates>> {
        Ok(self
            .install_certificates
            .get(charge_station_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_charge_station_install_certificates(
        &self,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<ChargeStationInstallCertificates>> {
        Ok(page(
            &self.install_certificates,
            page_size,
            previous_charge_station_id,
        ))
    }
}

#[async_trait]
impl ChargeStationTriggerMessageStore for InMemoryStore {
    async fn set_charge_station_trigger_message(
        &self,
        charge_station_id: &str,
        mut trigger: ChargeStationTriggerMessage,
    ) -> StoreResult<()> {
        trigger.charge_station_id = charge_station_id.to_string();
        self.trigger_messages
            .insert(charge_station_id.to_string(), trigger);
        Ok(())
    }

    async fn lookup_charge_station_trigger_message(
        &self,
        charge_station_id: &str,
    ) -> StoreResult<Option<ChargeStationTriggerMessage>> {
        Ok(self
            .trigger_messages
            .get(charge_station_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_charge_station_trigger_messages(
        &self,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<ChargeStationTriggerMessage>> {
        Ok(page(
            &self.trigger_messages,
            page_size,
            previous_charge_station_id,
        ))
    }
}
