use async_trait::async_trait;

use super::session::SharedSessionRegistry;
use crate::domain::OcppVersion;
use crate::transport::{EmitError, Emitter, Message};

/// [`Emitter`] that writes to the station's live WebSocket session.
#[derive(Clone)]
pub struct WsEmitter {
    sessions: SharedSessionRegistry,
}

impl WsEmitter {
    pub fn new(sessions: SharedSessionRegistry) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Emitter for WsEmitter {
    async fn emit(
        &self,
        version: OcppVersion,
        charge_station_id: &str,
        message: &Message,
    ) -> Result<(), EmitError> {
        self.sessions.send(version, charge_station_id, message)
    }
}
