use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v201::{
    MessageTrigger, TriggerMessageRequest, TriggerMessageResponse, TriggerMessageStatus,
};
use crate::store::{ChargeStationTriggerMessage, Engine, TriggerMessage, TriggerStatus};

/// The stored trigger a 2.0.1 trigger was sent for, if the store tracks it.
pub fn stored_trigger(trigger: MessageTrigger) -> Option<TriggerMessage> {
    match trigger {
        MessageTrigger::BootNotification => Some(TriggerMessage::BootNotification),
        MessageTrigger::FirmwareStatusNotification => {
            Some(TriggerMessage::FirmwareStatusNotification)
        }
        MessageTrigger::Heartbeat => Some(TriggerMessage::Heartbeat),
        MessageTrigger::MeterValues => Some(TriggerMessage::MeterValues),
        MessageTrigger::SignChargingStationCertificate => {
            Some(TriggerMessage::SignChargingStationCertificate)
        }
        MessageTrigger::SignV2GCertificate => Some(TriggerMessage::SignV2GCertificate),
        MessageTrigger::StatusNotification => Some(TriggerMessage::StatusNotification),
        MessageTrigger::SignCombinedCertificate => Some(TriggerMessage::SignCombinedCertificate),
        MessageTrigger::PublishFirmwareStatusNotification => {
            Some(TriggerMessage::PublishFirmwareStatusNotification)
        }
        MessageTrigger::LogStatusNotification | MessageTrigger::TransactionEvent => None,
    }
}

/// The 2.0.1 trigger for a stored trigger. Diagnostics have no 2.0.1 form.
pub fn requested_trigger(trigger: TriggerMessage) -> Option<MessageTrigger> {
    match trigger {
        TriggerMessage::BootNotification => Some(MessageTrigger::BootNotification),
        TriggerMessage::Heartbeat => Some(MessageTrigger::Heartbeat),
        TriggerMessage::StatusNotification => Some(MessageTrigger::StatusNotification),
        TriggerMessage::FirmwareStatusNotification => {
            Some(MessageTrigger::FirmwareStatusNotification)
        }
        TriggerMessage::MeterValues => Some(MessageTrigger::MeterValues),
        TriggerMessage::SignChargingStationCertificate => {
            Some(MessageTrigger::SignChargingStationCertificate)
        }
        TriggerMessage::SignV2GCertificate => Some(MessageTrigger::SignV2GCertificate),
        TriggerMessage::SignCombinedCertificate => Some(MessageTrigger::SignCombinedCertificate),
        TriggerMessage::PublishFirmwareStatusNotification => {
            Some(MessageTrigger::PublishFirmwareStatusNotification)
        }
        TriggerMessage::DiagnosticStatusNotification => None,
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

/// Records trigger outcomes. Tunneled responses may carry no payload, which
/// counts as accepted.
pub struct TriggerMessageResultHandler {
    pub store: Arc<dyn Engine>,
}

#[async_trait]
impl CallResultHandler for TriggerMessageResultHandler {
    type Request = TriggerMessageRequest;
    type Response = Option<TriggerMessageResponse>;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: TriggerMessageRequest,
        response: Option<TriggerMessageResponse>,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        let status = response
            .map(|r| TriggerStatus::from(r.status))
            .unwrap_or(TriggerStatus::Accepted);
        info!(
            charge_station_id,
            requested_message = ?request.requested_message,
            status = ?status,
            "TriggerMessage result"
        );

        let Some(trigger_message) = stored_trigger(request.requested_message) else {
            warn!(
                charge_station_id,
                requested_message = ?request.requested_message,
                "trigger is not tracked"
            );
            return Ok(());
        };

        let mut trigger = ChargeStationTriggerMessage::pending(charge_station_id, trigger_message);
        trigger.status = status;
        self.store
            .set_charge_station_trigger_message(charge_station_id, trigger)
            .await?;
        Ok(())
    }
}
