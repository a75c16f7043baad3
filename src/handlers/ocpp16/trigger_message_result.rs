use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v16::{
    MessageTrigger, TriggerMessageRequest, TriggerMessageResponse, TriggerMessageStatus,
};
use crate::store::{ChargeStationTriggerMessage, Engine, TriggerMessage, TriggerStatus};

impl From<MessageTrigger> for TriggerMessage {
    fn from(trigger: MessageTrigger) -> Self {
        match trigger {
            MessageTrigger::BootNotification => Self::BootNotification,
            MessageTrigger::DiagnosticsStatusNotification => Self::DiagnosticStatusNotification,
            MessageTrigger::FirmwareStatusNotification => Self::FirmwareStatusNotification,
            MessageTrigger::Heartbeat => Self::Heartbeat,
            MessageTrigger::MeterValues => Self::MeterValues,
            MessageTrigger::StatusNotification => Self::StatusNotification,
        }
    }
}

impl From<TriggerMessageStatus> for TriggerStatus {
    fn from(status: TriggerMessageStatus) -> Self {
        match status {
            TriggerMessageStatus::Accepted => Self::Accepted,
            TriggerMessageStatus::Rejected => Self::Rejected,
            TriggerMessageStatus::NotImplemented => Self::NotImplemented,
        }
    }
}

pub struct TriggerMessageResultHandler {
    pub store: Arc<dyn Engine>,
}

#[async_trait]
impl CallResultHandler for TriggerMessageResultHandler {
    type Request = TriggerMessageRequest;
    type Response = TriggerMessageResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: TriggerMessageRequest,
        response: TriggerMessageResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            requested_message = ?request.requested_message,
            connector_id = ?request.connector_id,
            status = ?response.status,
            "TriggerMessage result"
        );

        let mut trigger =
            ChargeStationTriggerMessage::pending(charge_station_id, request.requested_message.into());
        trigger.status = response.status.into();
        self.store
            .set_charge_station_trigger_message(charge_station_id, trigger)
            .await?;
        Ok(())
    }
}
