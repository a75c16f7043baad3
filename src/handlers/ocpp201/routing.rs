use std::sync::Arc;

use crate::domain::OcppVersion;
use crate::handlers::call_maker::{OcppCallMaker, RequestKind};
use crate::handlers::router::Router;
use crate::handlers::{CallHandler, CallResultHandler, CallResultRoute, CallRoute, HandlerContext};
use crate::schemas::SchemaValidator;
use crate::transport::Emitter;

use super::{
    BootNotificationHandler, CertificateSignedResultHandler, ChangeAvailabilityResultHandler,
    ClearCacheResultHandler, DeleteCertificateResultHandler, FirmwareStatusNotificationHandler,
    Get15118EvCertificateHandler, GetBaseReportResultHandler, GetCertificateStatusHandler,
    GetInstalledCertificateIdsResultHandler, GetReportResultHandler, GetVariablesResultHandler,
    HeartbeatHandler, InstallCertificateResultHandler, LogStatusNotificationHandler,
    NotifyReportHandler, ResetResultHandler, SecurityEventNotificationHandler,
    SetNetworkProfileResultHandler, SetVariablesResultHandler, SignCertificateHandler,
    StatusNotificationHandler, TriggerMessageResultHandler, UnlockConnectorResultHandler,
};

fn request_schema(action: &str) -> String {
    format!("ocpp201/{action}Request.json")
}

fn response_schema(action: &str) -> String {
    format!("ocpp201/{action}Response.json")
}

pub(crate) fn call_route<H>(action: &str, handler: H) -> CallRoute
where
    H: CallHandler + 'static,
{
    CallRoute::new(request_schema(action), response_schema(action), handler)
}

pub(crate) fn call_result_route<H>(action: &str, handler: H) -> CallResultRoute
where
    H: CallResultHandler + 'static,
{
    CallResultRoute::new(request_schema(action), response_schema(action), handler)
}

/// Requests the CSMS can send to 2.0.1 charge stations.
pub fn new_call_maker(emitter: Arc<dyn Emitter>) -> OcppCallMaker {
    OcppCallMaker::new(
        emitter,
        OcppVersion::V201,
        [
            (RequestKind::CertificateSigned, "CertificateSigned"),
            (RequestKind::InstallCertificate, "InstallCertificate"),
            (RequestKind::SetVariables, "SetVariables"),
            (RequestKind::TriggerMessage201, "TriggerMessage"),
        ],
    )
}

pub fn new_router(
    context: &HandlerContext,
    emitter: Arc<dyn Emitter>,
    validator: Arc<dyn SchemaValidator>,
) -> Router {
    let store = context.store.clone();
    let services = &context.services;

    Router::new(OcppVersion::V201, emitter, validator)
        .with_call_route(
            "BootNotification",
            call_route(
                "BootNotification",
                BootNotificationHandler {
                    clock: context.clock.clone(),
                    store: store.clone(),
                    heartbeat_interval: context.heartbeat_interval,
                },
            ),
        )
        .with_call_route(
            "Heartbeat",
            call_route(
                "Heartbeat",
                HeartbeatHandler {
                    clock: context.clock.clone(),
                },
            ),
        )
        .with_call_route(
            "StatusNotification",
            call_route("StatusNotification", StatusNotificationHandler),
        )
        .with_call_route(
            "SecurityEventNotification",
            call_route("SecurityEventNotification", SecurityEventNotificationHandler),
        )
        .with_call_route(
            "FirmwareStatusNotification",
            call_route("FirmwareStatusNotification", FirmwareStatusNotificationHandler),
        )
        .with_call_route(
            "LogStatusNotification",
            call_route("LogStatusNotification", LogStatusNotificationHandler),
        )
        .with_call_route("NotifyReport", call_route("NotifyReport", NotifyReportHandler))
        .with_call_route(
            "SignCertificate",
            call_route(
                "SignCertificate",
                SignCertificateHandler {
                    provider: services.charge_station_provider.clone(),
                    store: store.clone(),
                },
            ),
        )
        .with_call_route(
            "GetCertificateStatus",
            call_route(
                "GetCertificateStatus",
                GetCertificateStatusHandler {
                    validation: services.validation.clone(),
                },
            ),
        )
        .with_call_route(
            "Get15118EVCertificate",
            call_route(
                "Get15118EVCertificate",
                Get15118EvCertificateHandler {
                    provider: services.ev_provider.clone(),
                },
            ),
        )
        .with_call_result_route(
            "CertificateSigned",
            call_result_route(
                "CertificateSigned",
                CertificateSignedResultHandler {
                    store: store.clone(),
                },
            ),
        )
        .with_call_result_route(
            "ChangeAvailability",
            call_result_route("ChangeAvailability", ChangeAvailabilityResultHandler),
        )
        .with_call_result_route(
            "ClearCache",
            call_result_route("ClearCache", ClearCacheResultHandler),
        )
        .with_call_result_route(
            "DeleteCertificate",
            call_result_route("DeleteCertificate", DeleteCertificateResultHandler),
        )
        .with_call_result_route(
            "GetBaseReport",
            call_result_route("GetBaseReport", GetBaseReportResultHandler),
        )
        .with_call_result_route(
            "GetInstalledCertificateIds",
            call_result_route(
                "GetInstalledCertificateIds",
                GetInstalledCertificateIdsResultHandler,
            ),
        )
        .with_call_result_route(
            "GetReport",
            call_result_route("GetReport", GetReportResultHandler),
        )
        .with_call_result_route(
            "GetVariables",
            call_result_route("GetVariables", GetVariablesResultHandler),
        )
        .with_call_result_route("Reset", call_result_route("Reset", ResetResultHandler))
        .with_call_result_route(
            "SetNetworkProfile",
            call_result_route("SetNetworkProfile", SetNetworkProfileResultHandler),
        )
        .with_call_result_route(
            "UnlockConnector",
            call_result_route("UnlockConnector", UnlockConnectorResultHandler),
        )
        .with_call_result_route(
            "InstallCertificate",
            call_result_route(
                "InstallCertificate",
                InstallCertificateResultHandler {
                    store: store.clone(),
                },
            ),
        )
        .with_call_result_route(
            "SetVariables",
            call_result_route(
                "SetVariables",
                SetVariablesResultHandler {
                    store: store.clone(),
                },
            ),
        )
        .with_call_result_route(
            "TriggerMessage",
            call_result_route("TriggerMessage", TriggerMessageResultHandler { store }),
        )
}
