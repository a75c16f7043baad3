//! Shared fakes for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::OcppVersion;
use crate::handlers::call_maker::{CallMaker, CallMakerError, CallMakerResult, CsmsRequest};
use crate::handlers::HandlerContext;
use crate::schemas::{bundled_schema_dir, FsSchemaValidator, SchemaError, SchemaValidator};
use crate::services::CertificateServices;
use crate::store::InMemoryStore;
use crate::support::clock::FixedClock;
use crate::transport::{EmitError, Emitter, Message};

/// Validator backed by the schema files shipped with the crate.
pub fn schema_validator() -> FsSchemaValidator {
    FsSchemaValidator::new(bundled_schema_dir())
}

/// Accepts every payload against every schema name.
pub struct AcceptAllSchemas;

impl SchemaValidator for AcceptAllSchemas {
    fn validate(&self, _payload: &Value, _schema: &str) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// Records emitted messages; can be switched to fail every emit.
#[derive(Default)]
pub struct RecordingEmitter {
    sent: Mutex<Vec<(OcppVersion, String, Message)>>,
    failing: AtomicBool,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let emitter = Self::default();
        emitter.failing.store(true, Ordering::SeqCst);
        emitter
    }

    pub fn messages(&self) -> Vec<(OcppVersion, String, Message)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Emitter for RecordingEmitter {
    async fn emit(
        &self,
        version: OcppVersion,
        charge_station_id: &str,
        message: &Message,
    ) -> Result<(), EmitError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmitError::NotConnected(charge_station_id.to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((version, charge_station_id.to_string(), message.clone()));
        Ok(())
    }
}

/// Records every request handed to it, with the wall-clock time of the call.
#[derive(Default)]
pub struct RecordingCallMaker {
    sent: Mutex<Vec<(String, CsmsRequest, DateTime<Utc>)>>,
    failing: AtomicBool,
}

impl RecordingCallMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let maker = Self::default();
        maker.failing.store(true, Ordering::SeqCst);
        maker
    }

    pub fn requests(&self) -> Vec<(String, CsmsRequest)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(cs_id, request, _)| (cs_id.clone(), request.clone()))
            .collect()
    }

    pub fn send_times(&self) -> Vec<DateTime<Utc>> {
        self.sent.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }
}

#[async_trait]
impl CallMaker for RecordingCallMaker {
    async fn send(&self, charge_station_id: &str, request: CsmsRequest) -> CallMakerResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((charge_station_id.to_string(), request.clone(), Utc::now()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(CallMakerError::Emit(EmitError::NotConnected(
                charge_station_id.to_string(),
            )));
        }
        Ok(())
    }
}

/// Handler collaborators with a clock fixed at 2023-06-15T15:05:00+01:00
/// and no certificate services.
pub fn handler_context(store: Arc<InMemoryStore>) -> HandlerContext {
    HandlerContext {
        clock: Arc::new(FixedClock(
            DateTime::parse_from_rfc3339("2023-06-15T15:05:00+01:00")
                .expect("valid timestamp"),
        )),
        store,
        services: CertificateServices::default(),
        heartbeat_interval: Duration::from_secs(300),
    }
}
