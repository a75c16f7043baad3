//! OCPP 1.6 handlers
//!
//! 1.6 stations reach the plug-and-charge handlers through `DataTransfer`,
//! either the OCA `iso15118pnc` tunnel carrying 2.0.1 payloads or the
//! has2be `iso15118` extension.

pub mod boot_notification;
pub mod change_configuration_result;
pub mod data_transfer;
pub mod heartbeat;
pub mod notifications;
pub mod routing;
pub mod trigger_message_result;

pub use boot_notification::BootNotificationHandler;
pub use change_configuration_result::ChangeConfigurationResultHandler;
pub use data_transfer::{DataTransferHandler, DataTransferResultHandler, VendorRoutes};
pub use heartbeat::HeartbeatHandler;
pub use notifications::{SecurityEventNotificationHandler, StatusNotificationHandler};
pub use routing::{new_call_maker, new_data_transfer_call_maker, new_router, PNC_VENDOR_ID};
pub use trigger_message_result::TriggerMessageResultHandler;
