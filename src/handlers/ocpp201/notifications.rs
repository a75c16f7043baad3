use async_trait::async_trait;
use tracing::info;

use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v201::{
    FirmwareStatusNotificationRequest, FirmwareStatusNotificationResponse,
    LogStatusNotificationRequest, LogStatusNotificationResponse, NotifyReportRequest,
    NotifyReportResponse, SecurityEventNotificationRequest, SecurityEventNotificationResponse,
    StatusNotificationRequest, StatusNotificationResponse,
};
use crate::ocpp::variable_name::VariableName;

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
            evse_id = request.evse_id,
            connector_id = request.connector_id,
            connector_status = request.connector_status.as_str(),
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

pub struct FirmwareStatusNotificationHandler;

#[async_trait]
impl CallHandler for FirmwareStatusNotificationHandler {
    type Request = FirmwareStatusNotificationRequest;
    type Response = FirmwareStatusNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: FirmwareStatusNotificationRequest,
    ) -> HandlerResult<Option<FirmwareStatusNotificationResponse>> {
        info!(
            charge_station_id,
            status = request.status.as_str(),
            request_id = ?request.request_id,
            "FirmwareStatusNotification"
        );
        Ok(Some(FirmwareStatusNotificationResponse {}))
    }
}

pub struct LogStatusNotificationHandler;

#[async_trait]
impl CallHandler for LogStatusNotificationHandler {
    type Request = LogStatusNotificationRequest;
    type Response = LogStatusNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: LogStatusNotificationRequest,
    ) -> HandlerResult<Option<LogStatusNotificationResponse>> {
        info!(
            charge_station_id,
            status = request.status.as_str(),
            request_id = ?request.request_id,
            "LogStatusNotification"
        );
        Ok(Some(LogStatusNotificationResponse {}))
    }
}

/// Logs one page of a device-model report. Reports arrive in `seq_no`
/// order and `tbc` is set on every page but the last.
pub struct NotifyReportHandler;

#[async_trait]
impl CallHandler for NotifyReportHandler {
    type Request = NotifyReportRequest;
    type Response = NotifyReportResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: NotifyReportRequest,
    ) -> HandlerResult<Option<NotifyReportResponse>> {
        let variables: Vec<String> = request
            .report_data
            .into_iter()
            .map(|data| VariableName::new(data.component, data.variable, None).to_string())
            .collect();
        info!(
            charge_station_id,
            request_id = request.request_id,
            seq_no = request.seq_no,
            tbc = request.tbc,
            generated_at = request.generated_at.as_str(),
            variables = variables.join(",").as_str(),
            "NotifyReport"
        );
        Ok(Some(NotifyReportResponse {}))
    }
}
