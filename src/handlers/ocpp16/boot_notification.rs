//! BootNotification handler

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::OcppVersion;
use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v16::{BootNotificationRequest, BootNotificationResponse, RegistrationStatus};
use crate::store::{ChargeStationRuntimeDetails, Engine, SettingStatus};
use crate::support::clock::{format_rfc3339, Clock};

pub struct BootNotificationHandler {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn Engine>,
    pub heartbeat_interval: Duration,
}

#[async_trait]
impl CallHandler for BootNotificationHandler {
    type Request = BootNotificationRequest;
    type Response = BootNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: BootNotificationRequest,
    ) -> HandlerResult<Option<BootNotificationResponse>> {
        info!(
            charge_station_id,
            vendor = request.charge_point_vendor.as_str(),
            model = request.charge_point_model.as_str(),
            serial = request.charge_point_serial_number.as_deref().unwrap_or(""),
            firmware = request.firmware_version.as_deref().unwrap_or(""),
            "BootNotification"
        );

        record_boot(self.store.as_ref(), charge_station_id, OcppVersion::V16).await?;

        Ok(Some(BootNotificationResponse {
            current_time: format_rfc3339(&self.clock.now()),
            interval: interval_secs(self.heartbeat_interval),
            status: RegistrationStatus::Accepted,
        }))
    }
}

pub(crate) fn interval_secs(interval: Duration) -> i32 {
    i32::try_from(interval.as_secs()).unwrap_or(i32::MAX)
}

/// Remember the station's protocol version and settle every setting that
/// was waiting for this reboot.
pub(crate) async fn record_boot(
    store: &dyn Engine,
    charge_station_id: &str,
    version: OcppVersion,
) -> HandlerResult<()> {
    store
        .set_charge_station_runtime_details(
            charge_station_id,
            ChargeStationRuntimeDetails {
                ocpp_version: version,
            },
        )
        .await?;

    let Some(current) = store.lookup_charge_station_settings(charge_station_id).await? else {
        return Ok(());
    };

    let rebooted: BTreeMap<_, _> = current
        .settings
        .into_iter()
        .filter(|(_, setting)| setting.status == SettingStatus::RebootRequired)
        .map(|(name, mut setting)| {
            setting.status = SettingStatus::Accepted;
            (name, setting)
        })
        .collect();

    if !rebooted.is_empty() {
        info!(
            charge_station_id,
            count = rebooted.len(),
            "settings applied by reboot"
        );
        store
            .update_charge_station_settings(charge_station_id, rebooted)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ChargeStationRuntimeDetailsStore, ChargeStationSetting, ChargeStationSettingsStore,
        InMemoryStore,
    };
    use crate::support::clock::FixedClock;

    #[tokio::test]
    async fn boot_records_version_and_settles_reboot_settings() {
        let store = Arc::new(InMemoryStore::new());
        store
            .update_charge_station_settings(
                "cs001",
                BTreeMap::from([
                    (
                        "a".to_string(),
                        ChargeStationSetting::with_status("1", SettingStatus::RebootRequired),
                    ),
                    ("b".to_string(), ChargeStationSetting::pending("2")),
                ]),
            )
            .await
            .unwrap();

        let handler = BootNotificationHandler {
            clock: Arc::new(FixedClock::at("2023-06-15T15:05:00+01:00").unwrap()),
            store: store.clone(),
            heartbeat_interval: Duration::from_secs(60),
        };
        let response = handler
            .handle_call(
                "cs001",
                BootNotificationRequest {
                    charge_point_vendor: "vendor".into(),
                    charge_point_model: "model".into(),
                    charge_point_serial_number: None,
                    charge_box_serial_number: None,
                    firmware_version: None,
                    iccid: None,
                    imsi: None,
                    meter_type: None,
                    meter_serial_number: None,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.status, RegistrationStatus::Accepted);
        assert_eq!(response.interval, 60);
        assert_eq!(response.current_time, "2023-06-15T15:05:00+01:00");

        let details = store
            .lookup_charge_station_runtime_details("cs001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.ocpp_version, OcppVersion::V16);

        let settings = store
            .lookup_charge_station_settings("cs001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settings.settings["a"].status, SettingStatus::Accepted);
        assert_eq!(settings.settings["a"].value, "1");
        assert_eq!(settings.settings["b"].status, SettingStatus::Pending);
    }
}
