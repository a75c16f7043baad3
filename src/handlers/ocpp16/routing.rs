use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::OcppVersion;
use crate::handlers::call_maker::{
    DataTransferAction, DataTransferCallMaker, OcppCallMaker, RequestKind,
};
use crate::handlers::ocpp201::routing::{call_result_route as route_201_result, call_route as route_201};
use crate::handlers::router::Router;
use crate::handlers::{
    has2be, ocpp201, CallHandler, CallMaker, CallResultHandler, CallResultRoute, CallRoute,
    HandlerContext,
};
use crate::schemas::SchemaValidator;
use crate::transport::Emitter;

use super::{
    BootNotificationHandler, ChangeConfigurationResultHandler, DataTransferHandler,
    DataTransferResultHandler, HeartbeatHandler, SecurityEventNotificationHandler,
    StatusNotificationHandler, TriggerMessageResultHandler, VendorRoutes,
};

/// DataTransfer vendor id of the OCA plug-and-charge tunnel.
pub const PNC_VENDOR_ID: &str = "org.openchargealliance.iso15118pnc";

fn call_route<H>(action: &str, handler: H) -> CallRoute
where
    H: CallHandler + 'static,
{
    CallRoute::new(
        format!("ocpp16/{action}.json"),
        format!("ocpp16/{action}Response.json"),
        handler,
    )
}

fn call_result_route<H>(action: &str, handler: H) -> CallResultRoute
where
    H: CallResultHandler + 'static,
{
    CallResultRoute::new(
        format!("ocpp16/{action}.json"),
        format!("ocpp16/{action}Response.json"),
        handler,
    )
}

fn has2be_call_route<H>(action: &str, handler: H) -> CallRoute
where
    H: CallHandler + 'static,
{
    CallRoute::new(
        format!("has2be/{action}Request.json"),
        format!("has2be/{action}Response.json"),
        handler,
    )
}

fn has2be_call_result_route<H>(action: &str, handler: H) -> CallResultRoute
where
    H: CallResultHandler + 'static,
{
    CallResultRoute::new(
        format!("has2be/{action}Request.json"),
        format!("has2be/{action}Response.json"),
        handler,
    )
}

/// Requests the CSMS sends to 1.6 charge stations as plain Calls.
pub fn new_call_maker(emitter: Arc<dyn Emitter>) -> OcppCallMaker {
    OcppCallMaker::new(
        emitter,
        OcppVersion::V16,
        [
            (RequestKind::ChangeConfiguration, "ChangeConfiguration"),
            (RequestKind::TriggerMessage16, "TriggerMessage"),
        ],
    )
}

/// Requests the CSMS tunnels to 1.6 charge stations inside `DataTransfer`.
pub fn new_data_transfer_call_maker(emitter: Arc<dyn Emitter>) -> DataTransferCallMaker {
    DataTransferCallMaker::new(
        emitter,
        [
            (
                RequestKind::CertificateSigned,
                DataTransferAction::new(PNC_VENDOR_ID, "CertificateSigned"),
            ),
            (
                RequestKind::InstallCertificate,
                DataTransferAction::new(PNC_VENDOR_ID, "InstallCertificate"),
            ),
            (
                RequestKind::TriggerMessage201,
                DataTransferAction::new(PNC_VENDOR_ID, "TriggerMessage"),
            ),
        ],
    )
}

fn data_transfer_call_routes(context: &HandlerContext) -> VendorRoutes<CallRoute> {
    let services = &context.services;

    let sign_certificate = || ocpp201::SignCertificateHandler {
        provider: services.charge_station_provider.clone(),
        store: context.store.clone(),
    };
    let certificate_status = || ocpp201::GetCertificateStatusHandler {
        validation: services.validation.clone(),
    };
    let ev_certificate = || ocpp201::Get15118EvCertificateHandler {
        provider: services.ev_provider.clone(),
    };

    let pnc = HashMap::from([
        (
            "SignCertificate".to_string(),
            route_201("SignCertificate", sign_certificate()),
        ),
        (
            "GetCertificateStatus".to_string(),
            route_201("GetCertificateStatus", certificate_status()),
        ),
        (
            "Get15118EVCertificate".to_string(),
            route_201("Get15118EVCertificate", ev_certificate()),
        ),
    ]);

    let has2be = HashMap::from([
        (
            "SignCertificate".to_string(),
            has2be_call_route(
                "SignCertificate",
                has2be::SignCertificateHandler {
                    inner: sign_certificate(),
                },
            ),
        ),
        (
            "GetCertificateStatus".to_string(),
            has2be_call_route(
                "GetCertificateStatus",
                has2be::GetCertificateStatusHandler {
                    inner: certificate_status(),
                },
            ),
        ),
        (
            "Get15118EVCertificate".to_string(),
            has2be_call_route(
                "Get15118EVCertificate",
                has2be::Get15118EvCertificateHandler {
                    inner: ev_certificate(),
                },
            ),
        ),
    ]);

    HashMap::from([
        (PNC_VENDOR_ID.to_string(), pnc),
        (has2be::VENDOR_ID.to_string(), has2be),
    ])
}

fn data_transfer_call_result_routes(context: &HandlerContext) -> VendorRoutes<CallResultRoute> {
    let store = &context.store;

    let pnc = HashMap::from([
        (
            "CertificateSigned".to_string(),
            route_201_result(
                "CertificateSigned",
                ocpp201::CertificateSignedResultHandler {
                    store: store.clone(),
                },
            ),
        ),
        (
            "InstallCertificate".to_string(),
            route_201_result(
                "InstallCertificate",
                ocpp201::InstallCertificateResultHandler {
                    store: store.clone(),
                },
            ),
        ),
        (
            "TriggerMessage".to_string(),
            route_201_result(
                "TriggerMessage",
                ocpp201::TriggerMessageResultHandler {
                    store: store.clone(),
                },
            ),
        ),
    ]);

    let has2be = HashMap::from([(
        "CertificateSigned".to_string(),
        has2be_call_result_route("CertificateSigned", has2be::CertificateSignedResultHandler),
    )]);

    HashMap::from([
        (PNC_VENDOR_ID.to_string(), pnc),
        (has2be::VENDOR_ID.to_string(), has2be),
    ])
}

pub fn new_router(
    context: &HandlerContext,
    emitter: Arc<dyn Emitter>,
    validator: Arc<dyn SchemaValidator>,
) -> Router {
    let store = context.store.clone();
    let call_maker: Arc<dyn CallMaker> = Arc::new(new_call_maker(emitter.clone()));

    Router::new(OcppVersion::V16, emitter, validator.clone())
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
            "DataTransfer",
            call_route(
                "DataTransfer",
                DataTransferHandler {
                    validator: validator.clone(),
                    routes: data_transfer_call_routes(context),
                },
            ),
        )
        .with_call_result_route(
            "ChangeConfiguration",
            call_result_route(
                "ChangeConfiguration",
                ChangeConfigurationResultHandler {
                    store: store.clone(),
                    call_maker,
                },
            ),
        )
        .with_call_result_route(
            "TriggerMessage",
            call_result_route("TriggerMessage", TriggerMessageResultHandler { store }),
        )
        .with_call_result_route(
            "DataTransfer",
            call_result_route(
                "DataTransfer",
                DataTransferResultHandler {
                    validator,
                    routes: data_transfer_call_result_routes(context),
                },
            ),
        )
}
