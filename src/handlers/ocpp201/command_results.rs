//! Results of 2.0.1 commands that change nothing the core tracks. They are
//! logged so the outcome of an operator command is visible.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::handlers::{CallResultHandler, HandlerResult};
use crate::ocpp::v201::{
    CertificateHashData, ChangeAvailabilityRequest, ClearCacheRequest, CommandStatusResponse,
    DeleteCertificateRequest, GetBaseReportRequest, GetInstalledCertificateIdsRequest,
    GetInstalledCertificateIdsResponse, GetReportRequest, GetVariablesRequest,
    GetVariablesResponse, ResetRequest, SetNetworkProfileRequest, UnlockConnectorRequest,
};
use crate::ocpp::variable_name::VariableName;

fn hash_id(hash: &CertificateHashData) -> String {
    format!(
        "{}:{}:{}",
        hash.issuer_name_hash, hash.issuer_key_hash, hash.serial_number
    )
}

pub struct ChangeAvailabilityResultHandler;

#[async_trait]
impl CallResultHandler for ChangeAvailabilityResultHandler {
    type Request = ChangeAvailabilityRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: ChangeAvailabilityRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            operational_status = request.operational_status.as_str(),
            evse_id = ?request.evse.map(|e| e.id),
            status = response.status.as_str(),
            reason = response.reason(),
            "ChangeAvailability result"
        );
        Ok(())
    }
}

pub struct ClearCacheResultHandler;

#[async_trait]
impl CallResultHandler for ClearCacheResultHandler {
    type Request = ClearCacheRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        _request: ClearCacheRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            status = response.status.as_str(),
            reason = response.reason(),
            "ClearCache result"
        );
        Ok(())
    }
}

pub struct DeleteCertificateResultHandler;

#[async_trait]
impl CallResultHandler for DeleteCertificateResultHandler {
    type Request = DeleteCertificateRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: DeleteCertificateRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            certificate = hash_id(&request.certificate_hash_data).as_str(),
            status = response.status.as_str(),
            reason = response.reason(),
            "DeleteCertificate result"
        );
        Ok(())
    }
}

pub struct GetBaseReportResultHandler;

#[async_trait]
impl CallResultHandler for GetBaseReportResultHandler {
    type Request = GetBaseReportRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: GetBaseReportRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            request_id = request.request_id,
            report_base = request.report_base.as_str(),
            status = response.status.as_str(),
            "GetBaseReport result"
        );
        Ok(())
    }
}

pub struct GetInstalledCertificateIdsResultHandler;

#[async_trait]
impl CallResultHandler for GetInstalledCertificateIdsResultHandler {
    type Request = GetInstalledCertificateIdsRequest;
    type Response = GetInstalledCertificateIdsResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: GetInstalledCertificateIdsRequest,
        response: GetInstalledCertificateIdsResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        let installed: Vec<String> = response
            .certificate_hash_data_chain
            .iter()
            .map(|chain| {
                format!(
                    "{}={}",
                    chain.certificate_type,
                    hash_id(&chain.certificate_hash_data)
                )
            })
            .collect();
        info!(
            charge_station_id,
            requested_types = request.certificate_type.join(",").as_str(),
            status = response.status.as_str(),
            installed = installed.join(",").as_str(),
            "GetInstalledCertificateIds result"
        );
        Ok(())
    }
}

pub struct GetReportResultHandler;

#[async_trait]
impl CallResultHandler for GetReportResultHandler {
    type Request = GetReportRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: GetReportRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            request_id = request.request_id,
            criteria = request.component_criteria.join(",").as_str(),
            components = request.component_variable.len(),
            status = response.status.as_str(),
            "GetReport result"
        );
        Ok(())
    }
}

pub struct GetVariablesResultHandler;

#[async_trait]
impl CallResultHandler for GetVariablesResultHandler {
    type Request = GetVariablesRequest;
    type Response = GetVariablesResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        _request: GetVariablesRequest,
        response: GetVariablesResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        for result in response.get_variable_result {
            let name = VariableName::new(result.component, result.variable, result.attribute_type);
            info!(
                charge_station_id,
                name = %name,
                value = result.attribute_value.as_deref().unwrap_or("<null>"),
                status = result.attribute_status.as_str(),
                "GetVariables result"
            );
        }
        Ok(())
    }
}

pub struct ResetResultHandler;

#[async_trait]
impl CallResultHandler for ResetResultHandler {
    type Request = ResetRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: ResetRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            reset_type = request.reset_type.as_str(),
            evse_id = ?request.evse_id,
            status = response.status.as_str(),
            reason = response.reason(),
            "Reset result"
        );
        Ok(())
    }
}

pub struct SetNetworkProfileResultHandler;

#[async_trait]
impl CallResultHandler for SetNetworkProfileResultHandler {
    type Request = SetNetworkProfileRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: SetNetworkProfileRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            configuration_slot = request.configuration_slot,
            csms_url = request.connection_data.ocpp_csms_url.as_str(),
            security_profile = request.connection_data.security_profile,
            status = response.status.as_str(),
            reason = response.reason(),
            "SetNetworkProfile result"
        );
        Ok(())
    }
}

pub struct UnlockConnectorResultHandler;

#[async_trait]
impl CallResultHandler for UnlockConnectorResultHandler {
    type Request = UnlockConnectorRequest;
    type Response = CommandStatusResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: UnlockConnectorRequest,
        response: CommandStatusResponse,
        _state: Option<Value>,
    ) -> HandlerResult<()> {
        info!(
            charge_station_id,
            evse_id = request.evse_id,
            connector_id = request.connector_id,
            status = response.status.as_str(),
            reason = response.reason(),
            "UnlockConnector result"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::v201::{Attribute, Component, GetVariableResult, Variable};
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn get_variables_logs_each_value() {
        GetVariablesResultHandler
            .handle_call_result(
                "cs002",
                GetVariablesRequest {
                    get_variable_data: vec![],
                },
                GetVariablesResponse {
                    get_variable_result: vec![GetVariableResult {
                        attribute_status: "Accepted".into(),
                        attribute_type: Some(Attribute::Target),
                        attribute_value: Some("11000".into()),
                        component: Component {
                            name: "EVSE".into(),
                            instance: None,
                            evse: None,
                        },
                        variable: Variable {
                            name: "Power".into(),
                            instance: Some("max".into()),
                        },
                    }],
                },
                None,
            )
            .await
            .unwrap();

        assert!(logs_contain("EVSE/Power;max;Target"));
        assert!(logs_contain("11000"));
    }

    #[tokio::test]
    #[traced_test]
    async fn reset_logs_reason() {
        ResetResultHandler
            .handle_call_result(
                "cs002",
                ResetRequest {
                    reset_type: "OnIdle".into(),
                    evse_id: None,
                },
                serde_json::from_value(serde_json::json!({
                    "status": "Rejected",
                    "statusInfo": {"reasonCode": "Busy"}
                }))
                .unwrap(),
                None,
            )
            .await
            .unwrap();

        assert!(logs_contain("Reset result"));
        assert!(logs_contain("Busy"));
    }
}
