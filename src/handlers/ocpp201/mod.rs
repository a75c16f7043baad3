//! OCPP 2.0.1 handlers
//!
//! The plug-and-charge handlers here are shared with the 1.6 router, which
//! reaches them through `DataTransfer`.

pub mod boot_notification;
pub mod certificate_signed_result;
pub mod command_results;
pub mod get_15118_ev_certificate;
pub mod get_certificate_status;
pub mod heartbeat;
pub mod install_certificate_result;
pub mod notifications;
pub mod routing;
pub mod set_variables_result;
pub mod sign_certificate;
pub mod trigger_message_result;

pub use boot_notification::BootNotificationHandler;
pub use certificate_signed_result::CertificateSignedResultHandler;
pub use command_results::{
    ChangeAvailabilityResultHandler, ClearCacheResultHandler, DeleteCertificateResultHandler,
    GetBaseReportResultHandler, GetInstalledCertificateIdsResultHandler, GetReportResultHandler,
    GetVariablesResultHandler, ResetResultHandler, SetNetworkProfileResultHandler,
    UnlockConnectorResultHandler,
};
pub use get_15118_ev_certificate::Get15118EvCertificateHandler;
pub use get_certificate_status::GetCertificateStatusHandler;
pub use heartbeat::HeartbeatHandler;
pub use install_certificate_result::InstallCertificateResultHandler;
pub use notifications::{
    FirmwareStatusNotificationHandler, LogStatusNotificationHandler, NotifyReportHandler,
    SecurityEventNotificationHandler, StatusNotificationHandler,
};
pub use routing::{new_call_maker, new_router};
pub use set_variables_result::SetVariablesResultHandler;
pub use sign_certificate::SignCertificateHandler;
pub use trigger_message_result::{requested_trigger, stored_trigger, TriggerMessageResultHandler};

use crate::handlers::{HandlerError, HandlerResult};
use crate::store::{
    CertificateInstallationStatus, CertificateType, ChargeStationInstallCertificate, Engine,
};
use crate::support::pem;

/// Store the station's answer for a certificate it was sent, keeping the
/// retry time of the queued entry.
pub(crate) async fn record_certificate_outcome(
    store: &dyn Engine,
    charge_station_id: &str,
    certificate_type: CertificateType,
    certificate_data: String,
    status: CertificateInstallationStatus,
) -> HandlerResult<()> {
    let certificate_id = pem::certificate_id(&certificate_data)
        .map_err(|e| HandlerError::internal(format!("certificate id: {e}")))?;

    let send_after = store
        .lookup_charge_station_install_certificates(charge_station_id)
        .await?
        .and_then(|queued| {
            queued
                .certificates
                .into_iter()
                .find(|c| c.certificate_id == certificate_id)
        })
        .map(|c| c.send_after)
        .unwrap_or_default();

    store
        .update_charge_station_install_certificates(
            charge_station_id,
            vec![ChargeStationInstallCertificate {
                certificate_type,
                certificate_id,
                certificate_data,
                status,
                send_after,
            }],
        )
        .await?;
    Ok(())
}
