use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{deliver, is_due, Reconciler, SyncCallMakers, SyncConfig};
use crate::domain::OcppVersion;
use crate::handlers::ocpp201::requested_trigger;
use crate::handlers::{CallMaker, CsmsRequest};
use crate::ocpp::{v16, v201};
use crate::store::{
    ChargeStationTriggerMessage, Engine, StoreResult, TriggerMessage, TriggerStatus,
};

/// The 1.6 trigger for a stored trigger, if 1.6 has one.
fn v16_trigger(trigger: TriggerMessage) -> Option<v16::MessageTrigger> {
    match trigger {
        TriggerMessage::BootNotification => Some(v16::MessageTrigger::BootNotification),
        TriggerMessage::DiagnosticStatusNotification => {
            Some(v16::MessageTrigger::DiagnosticsStatusNotification)
        }
        TriggerMessage::FirmwareStatusNotification => {
            Some(v16::MessageTrigger::FirmwareStatusNotification)
        }
        TriggerMessage::Heartbeat => Some(v16::MessageTrigger::Heartbeat),
        TriggerMessage::MeterValues => Some(v16::MessageTrigger::MeterValues),
        TriggerMessage::StatusNotification => Some(v16::MessageTrigger::StatusNotification),
        _ => None,
    }
}

fn v201_request(trigger: v201::MessageTrigger) -> CsmsRequest {
    CsmsRequest::TriggerMessage201(v201::TriggerMessageRequest {
        requested_message: trigger,
        evse: None,
    })
}

/// Sends pending trigger requests. 1.6 stations get the native
/// `TriggerMessage` where 1.6 knows the trigger and a tunneled 2.0.1 one
/// otherwise.
pub struct TriggersReconciler {
    store: Arc<dyn Engine>,
    call_makers: SyncCallMakers,
    config: SyncConfig,
}

impl TriggersReconciler {
    pub fn new(store: Arc<dyn Engine>, call_makers: SyncCallMakers, config: SyncConfig) -> Self {
        Self {
            store,
            call_makers,
            config,
        }
    }

    fn request_for(
        &self,
        trigger: TriggerMessage,
        version: OcppVersion,
    ) -> Option<(&dyn CallMaker, CsmsRequest)> {
        match version {
            OcppVersion::V16 => match v16_trigger(trigger) {
                Some(requested_message) => Some((
                    self.call_makers.v16.as_ref(),
                    CsmsRequest::TriggerMessage16(v16::TriggerMessageRequest {
                        requested_message,
                        connector_id: None,
                    }),
                )),
                None => requested_trigger(trigger)
                    .map(|t| (self.call_makers.v16_data_transfer.as_ref(), v201_request(t))),
            },
            OcppVersion::V201 => {
                requested_trigger(trigger).map(|t| (self.call_makers.v201.as_ref(), v201_request(t)))
            }
        }
    }
}

#[async_trait]
impl Reconciler for TriggersReconciler {
    type Entry = ChargeStationTriggerMessage;

    fn name(&self) -> &'static str {
        "triggers"
    }

    async fn list(
        &self,
        page_size: usize,
        after: &str,
    ) -> StoreResult<Vec<ChargeStationTriggerMessage>> {
        self.store
            .list_charge_station_trigger_messages(page_size, after)
            .await
    }

    fn charge_station_id<'a>(&self, entry: &'a ChargeStationTriggerMessage) -> &'a str {
        &entry.charge_station_id
    }

    fn has_pending(&self, entry: &ChargeStationTriggerMessage) -> bool {
        entry.status == TriggerStatus::Pending
    }

    async fn reconcile(
        &self,
        mut entry: ChargeStationTriggerMessage,
        version: OcppVersion,
        now: DateTime<Utc>,
    ) {
        if !is_due(entry.send_after, now) {
            return;
        }
        let charge_station_id = entry.charge_station_id.clone();
        let trigger = entry.trigger_message;

        entry.send_after = self.config.next_attempt(now);
        if let Err(e) = self
            .store
            .set_charge_station_trigger_message(&charge_station_id, entry)
            .await
        {
            error!(
                charge_station_id = charge_station_id.as_str(),
                trigger = %trigger,
                error = %e,
                "unable to reschedule trigger"
            );
            return;
        }

        let Some((call_maker, request)) = self.request_for(trigger, version) else {
            warn!(
                charge_station_id = charge_station_id.as_str(),
                trigger = %trigger,
                ocpp_version = %version,
                "trigger not supported by protocol version"
            );
            return;
        };

        info!(
            charge_station_id = charge_station_id.as_str(),
            trigger = %trigger,
            "sending trigger"
        );
        deliver(self.name(), call_maker, &charge_station_id, request).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ChargeStationRuntimeDetails, ChargeStationRuntimeDetailsStore,
        ChargeStationTriggerMessageStore, InMemoryStore,
    };
    use crate::support::clock::SystemClock;
    use crate::sync::{sync_page, SyncContext};
    use crate::testing::RecordingCallMaker;

    struct Harness {
        store: Arc<InMemoryStore>,
        v16: Arc<RecordingCallMaker>,
        v16_data_transfer: Arc<RecordingCallMaker>,
        v201: Arc<RecordingCallMaker>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(InMemoryStore::new()),
                v16: Arc::new(RecordingCallMaker::new()),
                v16_data_transfer: Arc::new(RecordingCallMaker::new()),
                v201: Arc::new(RecordingCallMaker::new()),
            }
        }

        async fn station(&self, id: &str, version: OcppVersion, trigger: TriggerMessage) {
            self.store
                .set_charge_station_runtime_details(
                    id,
                    ChargeStationRuntimeDetails { ocpp_version: version },
                )
                .await
                .unwrap();
            self.store
                .set_charge_station_trigger_message(id, ChargeStationTriggerMessage::pending(id, trigger))
                .await
                .unwrap();
        }

        async fn sync(&self) {
            let config = SyncConfig::default();
            let reconciler = TriggersReconciler::new(
                self.store.clone(),
                SyncCallMakers {
                    v16: self.v16.clone(),
                    v16_data_transfer: self.v16_data_transfer.clone(),
                    v201: self.v201.clone(),
                },
                config,
            );
            let context = SyncContext {
                store: self.store.clone(),
                clock: Arc::new(SystemClock),
                config,
            };
            sync_page(&reconciler, &context, "").await;
        }
    }

    #[tokio::test]
    async fn v16_native_trigger_uses_16_trigger_message() {
        let h = Harness::new();
        h.station("cs001", OcppVersion::V16, TriggerMessage::DiagnosticStatusNotification)
            .await;
        h.sync().await;

        assert_eq!(
            h.v16.requests(),
            vec![(
                "cs001".to_string(),
                CsmsRequest::TriggerMessage16(v16::TriggerMessageRequest {
                    requested_message: v16::MessageTrigger::DiagnosticsStatusNotification,
                    connector_id: None,
                })
            )]
        );
        assert!(h.v16_data_transfer.requests().is_empty());
    }

    #[tokio::test]
    async fn v16_certificate_trigger_is_tunneled() {
        let h = Harness::new();
        h.station("cs001", OcppVersion::V16, TriggerMessage::SignV2GCertificate)
            .await;
        h.sync().await;

        assert!(h.v16.requests().is_empty());
        assert_eq!(
            h.v16_data_transfer.requests(),
            vec![(
                "cs001".to_string(),
                v201_request(v201::MessageTrigger::SignV2GCertificate)
            )]
        );
    }

    #[tokio::test]
    async fn v201_trigger_uses_201_trigger_message() {
        let h = Harness::new();
        h.station("cs002", OcppVersion::V201, TriggerMessage::Heartbeat).await;
        h.sync().await;

        assert_eq!(
            h.v201.requests(),
            vec![(
                "cs002".to_string(),
                v201_request(v201::MessageTrigger::Heartbeat)
            )]
        );
        let trigger = h
            .store
            .lookup_charge_station_trigger_message("cs002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.status, TriggerStatus::Pending);
        assert!(trigger.send_after > Utc::now());
    }

    #[tokio::test]
    async fn diagnostics_trigger_is_skipped_on_201_until_retry() {
        let h = Harness::new();
        h.station("cs002", OcppVersion::V201, TriggerMessage::DiagnosticStatusNotification)
            .await;
        h.sync().await;

        assert!(h.v201.requests().is_empty());
        assert!(h.v16_data_transfer.requests().is_empty());
        let trigger = h
            .store
            .lookup_charge_station_trigger_message("cs002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.status, TriggerStatus::Pending);
        assert!(trigger.send_after > Utc::now());
        let rescheduled = trigger.send_after;

        h.sync().await;
        let trigger = h
            .store
            .lookup_charge_station_trigger_message("cs002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.send_after, rescheduled);
    }

    #[tokio::test]
    async fn resolved_triggers_are_left_alone() {
        let h = Harness::new();
        h.station("cs001", OcppVersion::V16, TriggerMessage::Heartbeat).await;
        let mut trigger = ChargeStationTriggerMessage::pending("cs001", TriggerMessage::Heartbeat);
        trigger.status = TriggerStatus::Accepted;
        h.store
            .set_charge_station_trigger_message("cs001", trigger)
            .await
            .unwrap();
        h.sync().await;

        assert!(h.v16.requests().is_empty());
    }
}
