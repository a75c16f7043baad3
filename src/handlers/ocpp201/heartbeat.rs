use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::handlers::{CallHandler, HandlerResult};
use crate::ocpp::v201::{HeartbeatRequest, HeartbeatResponse};
use crate::support::clock::{format_rfc3339, Clock};

pub struct HeartbeatHandler {
    pub clock: Arc<dyn Clock>,
}

#[async_trait]
impl CallHandler for HeartbeatHandler {
    type Request = HeartbeatRequest;
    type Response = HeartbeatResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        _request: HeartbeatRequest,
    ) -> HandlerResult<Option<HeartbeatResponse>> {
        debug!(charge_station_id, "Heartbeat");
        Ok(Some(HeartbeatResponse {
            current_time: format_rfc3339(&self.clock.now()),
        }))
    }
}
