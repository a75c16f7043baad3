use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::handlers::call_maker::{CallMaker, CsmsRequest};
use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v16::{
    ChangeConfigurationRequest, ChangeConfigurationResponse, ConfigurationStatus,
    MessageTrigger, TriggerMessageRequest,
};
use crate::store::{ChargeStationSetting, Engine, SettingStatus};

impl From<ConfigurationStatus> for SettingStatus {
    fn from(status: ConfigurationStatus) -> Self {
        match status {
            ConfigurationStatus::Accepted => Self::Accepted,
            ConfigurationStatus::Rejected => Self::Rejected,
            ConfigurationStatus::RebootRequired => Self::RebootRequired,
            ConfigurationStatus::NotSupported => Self::NotSupported,
        }
    }
}

/// Records the outcome of a setting change. Once nothing is pending and a
/// change needs a reboot, asks the station for a BootNotification.
pub struct ChangeConfigurationResultHandler {
    pub store: Arc<dyn Engine>,
    pub call_maker: Arc<dyn CallMaker>,
}

#[async_trait]
impl CallResultHandler for ChangeConfigurationResultHandler {
    type Request = ChangeConfigurationRequest;
    type Response = ChangeConfigurationResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: ChangeConfigurationRequest,
        response: ChangeConfigurationResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            key = request.key.as_str(),
            value = request.value.as_str(),
            status = ?response.status,
            "ChangeConfiguration result"
        );

        self.store
            .update_charge_station_settings(
                charge_station_id,
                BTreeMap::from([(
                    request.key,
                    ChargeStationSetting::with_status(request.value, response.status.into()),
                )]),
            )
            .await?;

        let Some(settings) = self
            .store
            .lookup_charge_station_settings(charge_station_id)
            .await?
        else {
            return Ok(());
        };

        let all_done = settings
            .settings
            .values()
            .all(|s| s.status != SettingStatus::Pending);
        let reboot_required = settings
            .settings
            .values()
            .any(|s| s.status == SettingStatus::RebootRequired);

        if all_done && reboot_required {
            info!(charge_station_id, "settings require reboot, triggering boot notification");
            self.call_maker
                .send(
                    charge_station_id,
                    CsmsRequest::TriggerMessage16(TriggerMessageRequest {
                        requested_message: MessageTrigger::BootNotification,
                        connector_id: None,
                    }),
                )
                .await?;
        }
        Ok(())
    }
}
