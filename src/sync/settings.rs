use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{deliver, is_due, Reconciler, SyncCallMakers, SyncConfig};
use crate::domain::OcppVersion;
use crate::handlers::CsmsRequest;
use crate::ocpp::variable_name::VariableName;
use crate::ocpp::{v16, v201};
use crate::store::{
    ChargeStationSetting, ChargeStationSettings, Engine, SettingStatus, StoreResult,
};

/// Pushes pending settings: `ChangeConfiguration` per key on 1.6, one
/// `SetVariables` per station on 2.0.1.
pub struct SettingsReconciler {
    store: Arc<dyn Engine>,
    call_makers: SyncCallMakers,
    config: SyncConfig,
}

impl SettingsReconciler {
    pub fn new(store: Arc<dyn Engine>, call_makers: SyncCallMakers, config: SyncConfig) -> Self {
        Self {
            store,
            call_makers,
            config,
        }
    }

    /// Persist the next attempt time for `due` before anything is sent.
    async fn reschedule(
        &self,
        charge_station_id: &str,
        due: &BTreeMap<String, ChargeStationSetting>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let send_after = self.config.next_attempt(now);
        let rescheduled = due
            .iter()
            .map(|(name, setting)| {
                let mut setting = setting.clone();
                setting.send_after = send_after;
                (name.clone(), setting)
            })
            .collect();
        self.store
            .update_charge_station_settings(charge_station_id, rescheduled)
            .await
    }

    async fn sync_16(
        &self,
        charge_station_id: &str,
        due: BTreeMap<String, ChargeStationSetting>,
        now: DateTime<Utc>,
    ) {
        for (key, setting) in due {
            let value = setting.value.clone();
            let single = BTreeMap::from([(key.clone(), setting)]);
            if let Err(e) = self.reschedule(charge_station_id, &single, now).await {
                error!(
                    charge_station_id,
                    key = key.as_str(),
                    error = %e,
                    "unable to reschedule setting"
                );
                continue;
            }

            info!(charge_station_id, key = key.as_str(), "sending ChangeConfiguration");
            deliver(
                self.name(),
                self.call_makers.v16.as_ref(),
                charge_station_id,
                CsmsRequest::ChangeConfiguration(v16::ChangeConfigurationRequest { key, value }),
            )
            .await;
        }
    }

    async fn sync_201(
        &self,
        charge_station_id: &str,
        due: BTreeMap<String, ChargeStationSetting>,
        now: DateTime<Utc>,
    ) {
        let mut valid = BTreeMap::new();
        let mut set_variable_data = Vec::new();
        for (name, setting) in due {
            match name.parse::<VariableName>() {
                Ok(parsed) => {
                    set_variable_data.push(v201::SetVariableData {
                        attribute_type: parsed.attribute,
                        attribute_value: setting.value.clone(),
                        component: parsed.component,
                        variable: parsed.variable,
                    });
                    valid.insert(name, setting);
                }
                Err(e) => {
                    warn!(charge_station_id, error = %e, "skipping setting");
                }
            }
        }
        if set_variable_data.is_empty() {
            return;
        }

        if let Err(e) = self.reschedule(charge_station_id, &valid, now).await {
            error!(charge_station_id, error = %e, "unable to reschedule settings");
            return;
        }

        info!(charge_station_id, count = set_variable_data.len(), "sending SetVariables");
        deliver(
            self.name(),
            self.call_makers.v201.as_ref(),
            charge_station_id,
            CsmsRequest::SetVariables(v201::SetVariablesRequest { set_variable_data }),
        )
        .await;
    }
}

#[async_trait]
impl Reconciler for SettingsReconciler {
    type Entry = ChargeStationSettings;

    fn name(&self) -> &'static str {
        "settings"
    }

    async fn list(&self, page_size: usize, after: &str) -> StoreResult<Vec<ChargeStationSettings>> {
        self.store.list_charge_station_settings(page_size, after).await
    }

    fn charge_station_id<'a>(&self, entry: &'a ChargeStationSettings) -> &'a str {
        &entry.charge_station_id
    }

    fn has_pending(&self, entry: &ChargeStationSettings) -> bool {
        entry
            .settings
            .values()
            .any(|s| s.status == SettingStatus::Pending)
    }

    async fn reconcile(
        &self,
        entry: ChargeStationSettings,
        version: OcppVersion,
        now: DateTime<Utc>,
    ) {
        let charge_station_id = entry.charge_station_id;
        let due: BTreeMap<_, _> = entry
            .settings
            .into_iter()
            .filter(|(_, s)| s.status == SettingStatus::Pending && is_due(s.send_after, now))
            .collect();
        if due.is_empty() {
            return;
        }

        match version {
            OcppVersion::V16 => self.sync_16(&charge_station_id, due, now).await,
            OcppVersion::V201 => self.sync_201(&charge_station_id, due, now).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::call_maker::CallMakerResult;
    use crate::handlers::CallMaker;
    use crate::store::{
        ChargeStationRuntimeDetails, ChargeStationRuntimeDetailsStore, ChargeStationSettingsStore,
        InMemoryStore,
    };
    use crate::support::clock::SystemClock;
    use crate::support::shutdown::ShutdownSignal;
    use crate::sync::{run_loop, sync_page, SyncContext};
    use crate::testing::RecordingCallMaker;
    use std::time::Duration;

    /// Answers every ChangeConfiguration by accepting it in the store.
    struct AcceptingCallMaker {
        store: Arc<InMemoryStore>,
    }

    #[async_trait]
    impl CallMaker for AcceptingCallMaker {
        async fn send(&self, charge_station_id: &str, request: CsmsRequest) -> CallMakerResult<()> {
            if let CsmsRequest::ChangeConfiguration(change) = request {
                self.store
                    .update_charge_station_settings(
                        charge_station_id,
                        BTreeMap::from([(
                            change.key,
                            ChargeStationSetting::with_status(change.value, SettingStatus::Accepted),
                        )]),
                    )
                    .await
                    .unwrap();
            }
            Ok(())
        }
    }

    fn call_makers(maker: Arc<dyn CallMaker>) -> SyncCallMakers {
        SyncCallMakers {
            v16: maker.clone(),
            v16_data_transfer: maker.clone(),
            v201: maker,
        }
    }

    fn context(store: Arc<InMemoryStore>, config: SyncConfig) -> SyncContext {
        SyncContext {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    async fn station(store: &InMemoryStore, id: &str, version: OcppVersion, settings: &[(&str, &str)]) {
        store
            .set_charge_station_runtime_details(id, ChargeStationRuntimeDetails { ocpp_version: version })
            .await
            .unwrap();
        store
            .update_charge_station_settings(
                id,
                settings
                    .iter()
                    .map(|(k, v)| (k.to_string(), ChargeStationSetting::pending(*v)))
                    .collect(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn settings_converge_with_accepting_station() {
        let store = Arc::new(InMemoryStore::new());
        station(&store, "cs001", OcppVersion::V16, &[("foo", "bar"), ("baz", "qux")]).await;
        station(&store, "cs002", OcppVersion::V16, &[("foo", "bar")]).await;

        let config = SyncConfig::default();
        let maker = Arc::new(AcceptingCallMaker {
            store: store.clone(),
        });
        let reconciler = SettingsReconciler::new(store.clone(), call_makers(maker), config);

        let cursor = sync_page(&reconciler, &context(store.clone(), config), "").await;
        assert_eq!(cursor, "");

        for id in ["cs001", "cs002"] {
            let settings = store.lookup_charge_station_settings(id).await.unwrap().unwrap();
            assert!(settings
                .settings
                .values()
                .all(|s| s.status == SettingStatus::Accepted));
        }
        let cs001 = store.lookup_charge_station_settings("cs001").await.unwrap().unwrap();
        assert_eq!(cs001.settings["foo"].value, "bar");
        assert_eq!(cs001.settings["baz"].value, "qux");
    }

    #[tokio::test]
    async fn send_after_is_persisted_before_sending() {
        let store = Arc::new(InMemoryStore::new());
        station(&store, "cs001", OcppVersion::V16, &[("foo", "bar")]).await;
        let config = SyncConfig::default();
        let maker = Arc::new(RecordingCallMaker::failing());
        let reconciler = SettingsReconciler::new(store.clone(), call_makers(maker.clone()), config);

        sync_page(&reconciler, &context(store.clone(), config), "").await;
        sync_page(&reconciler, &context(store.clone(), config), "").await;

        // the failed send is not retried before retry_after
        assert_eq!(maker.requests().len(), 1);
        let setting = &store.lookup_charge_station_settings("cs001").await.unwrap().unwrap().settings["foo"];
        assert_eq!(setting.status, SettingStatus::Pending);
        assert!(setting.send_after > Utc::now());
    }

    #[tokio::test]
    async fn retries_are_spaced_by_retry_after() {
        let store = Arc::new(InMemoryStore::new());
        station(&store, "cs001", OcppVersion::V16, &[("foo", "bar")]).await;
        let config = SyncConfig {
            run_every: Duration::from_millis(100),
            retry_after: Duration::from_millis(400),
            page_size: 50,
        };
        let maker = Arc::new(RecordingCallMaker::new());
        let reconciler = SettingsReconciler::new(store.clone(), call_makers(maker.clone()), config);
        let shutdown = ShutdownSignal::new();

        let task = tokio::spawn(run_loop(reconciler, context(store.clone(), config), shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(1200)).await;
        shutdown.trigger();
        task.await.unwrap();

        let times = maker.send_times();
        assert!(times.len() >= 2, "only {} attempts", times.len());
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= chrono::Duration::milliseconds(400));
        }
    }

    #[tokio::test]
    async fn every_station_is_visited_once_per_cycle() {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..300 {
            station(&store, &format!("cs{i:03}"), OcppVersion::V16, &[("foo", "bar")]).await;
        }
        let config = SyncConfig::default();
        let maker = Arc::new(RecordingCallMaker::new());
        let reconciler = SettingsReconciler::new(store.clone(), call_makers(maker.clone()), config);
        let context = context(store.clone(), config);

        let mut cursor = String::new();
        let mut cursors = Vec::new();
        for _ in 0..7 {
            cursor = sync_page(&reconciler, &context, &cursor).await;
            cursors.push(cursor.clone());
        }

        assert_eq!(cursors[0], "cs049");
        assert_eq!(cursors[5], "cs299");
        assert_eq!(cursors[6], "");

        let mut visited: Vec<String> = maker.requests().into_iter().map(|(id, _)| id).collect();
        assert_eq!(visited.len(), 300);
        visited.sort();
        visited.dedup();
        assert_eq!(visited.len(), 300);
    }

    #[tokio::test]
    async fn stations_without_runtime_details_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        store
            .update_charge_station_settings(
                "cs001",
                BTreeMap::from([("foo".to_string(), ChargeStationSetting::pending("bar"))]),
            )
            .await
            .unwrap();
        let config = SyncConfig::default();
        let maker = Arc::new(RecordingCallMaker::new());
        let reconciler = SettingsReconciler::new(store.clone(), call_makers(maker.clone()), config);

        sync_page(&reconciler, &context(store.clone(), config), "").await;

        assert!(maker.requests().is_empty());
    }

    #[tokio::test]
    async fn v201_settings_become_one_set_variables() {
        let store = Arc::new(InMemoryStore::new());
        station(
            &store,
            "cs002",
            OcppVersion::V201,
            &[
                ("OCPPCommCtrlr/HeartbeatInterval", "300"),
                ("EVSE;1/Power;max;Target", "11000"),
                ("not a variable", "x"),
            ],
        )
        .await;
        let config = SyncConfig::default();
        let maker = Arc::new(RecordingCallMaker::new());
        let reconciler = SettingsReconciler::new(store.clone(), call_makers(maker.clone()), config);

        sync_page(&reconciler, &context(store.clone(), config), "").await;

        let sent = maker.requests();
        assert_eq!(sent.len(), 1);
        let CsmsRequest::SetVariables(request) = &sent[0].1 else {
            panic!("expected SetVariables, got {:?}", sent[0].1);
        };
        assert_eq!(request.set_variable_data.len(), 2);
        let power = request
            .set_variable_data
            .iter()
            .find(|d| d.variable.name == "Power")
            .unwrap();
        assert_eq!(power.component.name, "EVSE");
        assert_eq!(power.component.instance.as_deref(), Some("1"));
        assert_eq!(power.variable.instance.as_deref(), Some("max"));
        assert_eq!(power.attribute_type, Some(v201::Attribute::Target));
        assert_eq!(power.attribute_value, "11000");

        let settings = store.lookup_charge_station_settings("cs002").await.unwrap().unwrap();
        assert_eq!(settings.settings["not a variable"].send_after, DateTime::<Utc>::default());
    }
}
