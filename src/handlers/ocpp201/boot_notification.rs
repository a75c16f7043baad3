use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::OcppVersion;
use crate::handlers::ocpp16::boot_notification::{interval_secs, record_boot};
use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v201::{BootNotificationRequest, BootNotificationResponse, RegistrationStatus};
use crate::store::Engine;
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
        let station = &request.charging_station;
        info!(
            charge_station_id,
            vendor = station.vendor_name.as_str(),
            model = station.model.as_str(),
            serial = station.serial_number.as_deref().unwrap_or(""),
            firmware = station.firmware_version.as_deref().unwrap_or(""),
            reason = request.reason.as_str(),
            "BootNotification"
        );

        record_boot(self.store.as_ref(), charge_station_id, OcppVersion::V201).await?;

        Ok(Some(BootNotificationResponse {
            current_time: format_rfc3339(&self.clock.now()),
            interval: interval_secs(self.heartbeat_interval),
            status: RegistrationStatus::Accepted,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::v201::ChargingStation;
    use crate::store::{ChargeStationRuntimeDetailsStore, InMemoryStore};
    use crate::support::clock::FixedClock;

    #[tokio::test]
    async fn boot_records_201_runtime_details() {
        let store = Arc::new(InMemoryStore::new());
        let handler = BootNotificationHandler {
            clock: Arc::new(FixedClock::at("2023-06-15T15:05:00Z").unwrap()),
            store: store.clone(),
            heartbeat_interval: Duration::from_secs(300),
        };

        let response = handler
            .handle_call(
                "cs002",
                BootNotificationRequest {
                    charging_station: ChargingStation {
                        model: "model".into(),
                        vendor_name: "vendor".into(),
                        serial_number: None,
                        firmware_version: None,
                    },
                    reason: "PowerUp".into(),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.status, RegistrationStatus::Accepted);
        assert_eq!(response.interval, 300);
        assert_eq!(response.current_time, "2023-06-15T15:05:00Z");
        let details = store
            .lookup_charge_station_runtime_details("cs002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.ocpp_version, OcppVersion::V201);
    }
}
