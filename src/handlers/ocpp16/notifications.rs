//! Notifications the CSMS only acknowledges

use async_trait::async_trait;
use tracing::info;

use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v16::{
    SecurityEventNotificationRequest, SecurityEventNotificationResponse,
    StatusNotificationRequest, StatusNotificationResponse,
};

pub struct StatusNotificationHandler;

#[async_trait]
impl CallHandler for StatusNotificationHandler {
    type Request = StatusNotificationRequest;
    type Response = StatusNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: StatusNotificationRequest,
    ) -> HandlerResult<Option<StatusNotificationResponse>> {
        info!(
            charge_station_id,
            connector_id = request.connector_id,
            status = request.status.as_str(),
            error_code = request.error_code.as_str(),
            "StatusNotification"
        );
        Ok(Some(StatusNotificationResponse {}))
    }
}

pub struct SecurityEventNotificationHandler;

#[async_trait]
impl CallHandler for SecurityEventNotificationHandler {
    type Request = SecurityEventNotificationRequest;
    type Response = SecurityEventNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: SecurityEventNotificationRequest,
    ) -> HandlerResult<Option<SecurityEventNotificationResponse>> {
        info!(
            charge_station_id,
            event_type = request.event_type.as_str(),
            timestamp = request.timestamp.as_str(),
            tech_info = request.tech_info.as_deref().unwrap_or(""),
            "SecurityEventNotification"
        );
        Ok(Some(SecurityEventNotificationResponse {}))
    }
}
