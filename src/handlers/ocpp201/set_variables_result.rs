use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v201::{
    Attribute, Component, SetVariableStatus, SetVariablesRequest, SetVariablesResponse, Variable,
};
use crate::ocpp::variable_name::VariableName;
use crate::store::{ChargeStationSetting, Engine, SettingStatus};

impl From<SetVariableStatus> for SettingStatus {
    fn from(status: SetVariableStatus) -> Self {
        match status {
            SetVariableStatus::Accepted => Self::Accepted,
            SetVariableStatus::Rejected => Self::Rejected,
            SetVariableStatus::RebootRequired => Self::RebootRequired,
            SetVariableStatus::UnknownComponent
            | SetVariableStatus::UnknownVariable
            | SetVariableStatus::NotSupportedAttributeType => Self::NotSupported,
        }
    }
}

/// Identity of a variable in a request or result. An absent attribute type
/// means `Actual`.
fn variable_key(component: &Component, variable: &Variable, attribute: Option<Attribute>) -> String {
    VariableName::new(
        component.clone(),
        variable.clone(),
        attribute.filter(|a| *a != Attribute::Actual),
    )
    .to_string()
}

/// Records the per-variable outcome of a `SetVariables` request against the
/// settings it was built from.
pub struct SetVariablesResultHandler {
    pub store: Arc<dyn Engine>,
}

#[async_trait]
impl CallResultHandler for SetVariablesResultHandler {
    type Request = SetVariablesRequest;
    type Response = SetVariablesResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: SetVariablesRequest,
        response: SetVariablesResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        // key -> (setting name, requested value)
        let requested: HashMap<String, (String, String)> = request
            .set_variable_data
            .into_iter()
            .map(|data| {
                let key = variable_key(&data.component, &data.variable, data.attribute_type);
                let name = VariableName::new(data.component, data.variable, data.attribute_type);
                (key, (name.to_string(), data.attribute_value))
            })
            .collect();

        let current = self
            .store
            .lookup_charge_station_settings(charge_station_id)
            .await?
            .map(|s| s.settings)
            .unwrap_or_default();

        let mut updates = BTreeMap::new();
        for result in response.set_variable_result {
            let key = variable_key(&result.component, &result.variable, result.attribute_type);
            let reported =
                VariableName::new(result.component, result.variable, result.attribute_type)
                    .to_string();
            info!(
                charge_station_id,
                name = reported.as_str(),
                status = ?result.attribute_status,
                "SetVariables result"
            );

            let (name, value) = match requested.get(&key) {
                Some((name, value)) => (name.clone(), value.clone()),
                None => {
                    let Some((name, setting)) = [&reported, &key]
                        .into_iter()
                        .find_map(|n| current.get_key_value(n.as_str()))
                    else {
                        warn!(
                            charge_station_id,
                            name = reported.as_str(),
                            "result for unknown variable"
                        );
                        continue;
                    };
                    (name.clone(), setting.value.clone())
                }
            };

            let mut setting = ChargeStationSetting::with_status(value, result.attribute_status.into());
            if let Some(existing) = current.get(&name) {
                setting.send_after = existing.send_after;
            }
            updates.insert(name, setting);
        }

        if !updates.is_empty() {
            self.store
                .update_charge_station_settings(charge_station_id, updates)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::v201::{Evse, SetVariableData, SetVariableResult};
    use crate::store::{ChargeStationSettingsStore, InMemoryStore};

    fn component(name: &str, evse: Option<i32>) -> Component {
        Component {
            name: name.into(),
            instance: None,
            evse: evse.map(|id| Evse {
                id,
                connector_id: None,
            }),
        }
    }

    fn variable(name: &str) -> Variable {
        Variable {
            name: name.into(),
            instance: None,
        }
    }

    #[tokio::test]
    async fn statuses_are_recorded_by_flat_name() {
        let store = Arc::new(InMemoryStore::new());
        store
            .update_charge_station_settings(
                "cs002",
                BTreeMap::from([
                    (
                        "OCPPCommCtrlr/HeartbeatInterval".to_string(),
                        ChargeStationSetting::pending("300"),
                    ),
                    (
                        "EVSE;main;1/Power;Target".to_string(),
                        ChargeStationSetting::pending("11000"),
                    ),
                ]),
            )
            .await
            .unwrap();

        let mut evse = component("EVSE", Some(1));
        evse.instance = Some("main".into());

        let request = SetVariablesRequest {
            set_variable_data: vec![
                SetVariableData {
                    attribute_type: None,
                    attribute_value: "300".into(),
                    component: component("OCPPCommCtrlr", None),
                    variable: variable("HeartbeatInterval"),
                },
                SetVariableData {
                    attribute_type: Some(Attribute::Target),
                    attribute_value: "11000".into(),
                    component: evse.clone(),
                    variable: variable("Power"),
                },
            ],
        };
        let response = SetVariablesResponse {
            set_variable_result: vec![
                SetVariableResult {
                    attribute_type: None,
                    attribute_status: SetVariableStatus::RebootRequired,
                    component: component("OCPPCommCtrlr", None),
                    variable: variable("HeartbeatInterval"),
                },
                SetVariableResult {
                    attribute_type: Some(Attribute::Target),
                    attribute_status: SetVariableStatus::UnknownVariable,
                    component: evse,
                    variable: variable("Power"),
                },
            ],
        };

        SetVariablesResultHandler {
            store: store.clone(),
        }
        .handle_call_result("cs002", request, response, None)
        .await
        .unwrap();

        let settings = store
            .lookup_charge_station_settings("cs002")
            .await
            .unwrap()
            .unwrap()
            .settings;
        let heartbeat = &settings["OCPPCommCtrlr/HeartbeatInterval"];
        assert_eq!(heartbeat.status, SettingStatus::RebootRequired);
        assert_eq!(heartbeat.value, "300");
        let power = &settings["EVSE;main;1/Power;Target"];
        assert_eq!(power.status, SettingStatus::NotSupported);
        assert_eq!(power.value, "11000");
    }

    #[tokio::test]
    async fn echoed_actual_attribute_matches_plain_setting() {
        let store = Arc::new(InMemoryStore::new());
        store
            .update_charge_station_settings(
                "cs002",
                BTreeMap::from([(
                    "OCPPCommCtrlr/HeartbeatInterval".to_string(),
                    ChargeStationSetting::pending("300"),
                )]),
            )
            .await
            .unwrap();

        SetVariablesResultHandler {
            store: store.clone(),
        }
        .handle_call_result(
            "cs002",
            SetVariablesRequest {
                set_variable_data: vec![SetVariableData {
                    attribute_type: None,
                    attribute_value: "300".into(),
                    component: component("OCPPCommCtrlr", None),
                    variable: variable("HeartbeatInterval"),
                }],
            },
            SetVariablesResponse {
                set_variable_result: vec![SetVariableResult {
                    attribute_type: Some(Attribute::Actual),
                    attribute_status: SetVariableStatus::Accepted,
                    component: component("OCPPCommCtrlr", None),
                    variable: variable("HeartbeatInterval"),
                }],
            },
            None,
        )
        .await
        .unwrap();

        let settings = store
            .lookup_charge_station_settings("cs002")
            .await
            .unwrap()
            .unwrap()
            .settings;
        assert_eq!(settings.len(), 1);
        let heartbeat = &settings["OCPPCommCtrlr/HeartbeatInterval"];
        assert_eq!(heartbeat.status, SettingStatus::Accepted);
        assert_eq!(heartbeat.value, "300");
    }

    #[tokio::test]
    async fn unmatched_results_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        SetVariablesResultHandler {
            store: store.clone(),
        }
        .handle_call_result(
            "cs002",
            SetVariablesRequest {
                set_variable_data: vec![],
            },
            SetVariablesResponse {
                set_variable_result: vec![SetVariableResult {
                    attribute_type: None,
                    attribute_status: SetVariableStatus::Accepted,
                    component: component("Stranger", None),
                    variable: variable("Danger"),
                }],
            },
            None,
        )
        .await
        .unwrap();

        assert!(store
            .lookup_charge_station_settings("cs002")
            .await
            .unwrap()
            .is_none());
    }
}
