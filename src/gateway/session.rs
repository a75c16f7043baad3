//! Connected charge stations and their in-flight CSMS calls

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::OcppVersion;
use crate::support::ocpp_frame::OcppFrame;
use crate::transport::{EmitError, ErrorCode, Message, MessageType};

/// Unanswered CSMS calls remembered per station. The oldest is forgotten
/// when a new call would exceed this.
const MAX_PENDING_CALLS: usize = 16;

/// What is needed to route the answer to a CSMS-originated Call.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub action: String,
    pub request: Value,
    pub state: Option<Value>,
}

#[derive(Debug, Default)]
struct PendingCalls {
    order: VecDeque<String>,
    calls: HashMap<String, PendingCall>,
}

impl PendingCalls {
    /// Returns the id of a call evicted to make room.
    fn insert(&mut self, message_id: String, call: PendingCall) -> Option<String> {
        let mut evicted = None;
        if !self.calls.contains_key(&message_id) && self.order.len() >= MAX_PENDING_CALLS {
            if let Some(oldest) = self.order.pop_front() {
                self.calls.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        if self.calls.insert(message_id.clone(), call).is_none() {
            self.order.push_back(message_id);
        }
        evicted
    }

    fn take(&mut self, message_id: &str) -> Option<PendingCall> {
        let call = self.calls.remove(message_id)?;
        self.order.retain(|id| id != message_id);
        Some(call)
    }

    fn len(&self) -> usize {
        self.calls.len()
    }
}

struct Session {
    connection_id: u64,
    version: OcppVersion,
    sender: mpsc::UnboundedSender<String>,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    pending: PendingCalls,
}

/// Live sessions indexed by charge station id.
///
/// A station that reconnects replaces its previous session; cleanup of the
/// old connection is then ignored because its connection id no longer
/// matches.
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    next_connection_id: AtomicU64,
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn shared() -> SharedSessionRegistry {
        Arc::new(Self::new())
    }

    /// Register a connection and return its connection id.
    pub fn register(
        &self,
        charge_station_id: &str,
        version: OcppVersion,
        sender: mpsc::UnboundedSender<String>,
    ) -> u64 {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let previous = self.sessions.insert(
            charge_station_id.to_string(),
            Session {
                connection_id,
                version,
                sender,
                connected_at: now,
                last_activity: now,
                pending: PendingCalls::default(),
            },
        );

        if previous.is_some() {
            warn!(charge_station_id, "replacing existing session");
        }
        info!(charge_station_id, connection_id, ocpp_version = %version, "session registered");
        connection_id
    }

    /// Remove the session if it still belongs to `connection_id`.
    pub fn unregister(&self, charge_station_id: &str, connection_id: u64) -> bool {
        let removed = self
            .sessions
            .remove_if(charge_station_id, |_, s| s.connection_id == connection_id)
            .is_some();
        if removed {
            info!(charge_station_id, connection_id, "session unregistered");
        }
        removed
    }

    pub fn is_connected(&self, charge_station_id: &str) -> bool {
        self.sessions.contains_key(charge_station_id)
    }

    pub fn version_of(&self, charge_station_id: &str) -> Option<OcppVersion> {
        self.sessions.get(charge_station_id).map(|s| s.version)
    }

    pub fn connected_since(&self, charge_station_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(charge_station_id).map(|s| s.connected_at)
    }

    pub fn last_activity(&self, charge_station_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(charge_station_id).map(|s| s.last_activity)
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn pending_call_count(&self, charge_station_id: &str) -> usize {
        self.sessions
            .get(charge_station_id)
            .map(|s| s.pending.len())
            .unwrap_or(0)
    }

    pub fn touch(&self, charge_station_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(charge_station_id) {
            session.last_activity = Utc::now();
        }
    }

    /// Queue `message` on the station's socket. A Call is remembered until
    /// its answer arrives.
    pub fn send(
        &self,
        version: OcppVersion,
        charge_station_id: &str,
        message: &Message,
    ) -> Result<(), EmitError> {
        let mut session = self
            .sessions
            .get_mut(charge_station_id)
            .ok_or_else(|| EmitError::NotConnected(charge_station_id.to_string()))?;

        if session.version != version {
            return Err(EmitError::VersionMismatch {
                charge_station_id: charge_station_id.to_string(),
                requested: version,
                actual: session.version,
            });
        }

        if message.is_call() {
            let evicted = session.pending.insert(
                message.message_id.clone(),
                PendingCall {
                    action: message.action.clone(),
                    request: message.request_payload().clone(),
                    state: message.state.clone(),
                },
            );
            if let Some(evicted) = evicted {
                warn!(
                    charge_station_id,
                    message_id = evicted.as_str(),
                    "forgetting unanswered call"
                );
            }
        }

        let text = OcppFrame::from_message(message).serialize();
        if session.sender.send(text).is_err() {
            if message.is_call() {
                session.pending.take(&message.message_id);
            }
            return Err(EmitError::Transport(format!(
                "connection to {charge_station_id} is closed"
            )));
        }
        Ok(())
    }

    /// Turn an inbound frame into the message the router expects.
    ///
    /// Answers are joined with the Call they answer; an answer to a call we
    /// do not know about is dropped.
    pub fn inbound(&self, charge_station_id: &str, frame: OcppFrame) -> Option<Message> {
        let (message_id, answer) = match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => return Some(Message::call(action, unique_id, payload)),
            OcppFrame::CallResult { unique_id, payload } => (unique_id, Ok(payload)),
            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            } => (unique_id, Err((error_code, error_description))),
        };

        let pending = self
            .sessions
            .get_mut(charge_station_id)
            .and_then(|mut s| s.pending.take(&message_id));
        let Some(pending) = pending else {
            warn!(
                charge_station_id,
                message_id = message_id.as_str(),
                "answer has no corresponding call, dropping"
            );
            return None;
        };

        let mut message = Message {
            message_type: MessageType::CallResult,
            action: pending.action,
            message_id,
            request: Some(pending.request),
            response: None,
            error_code: None,
            error_description: None,
            state: pending.state,
        };
        match answer {
            Ok(payload) => message.response = Some(payload),
            Err((code, description)) => {
                message.message_type = MessageType::CallError;
                message.error_code = Some(code.parse().unwrap_or(ErrorCode::GenericError));
                message.error_description = Some(description);
            }
        }
        Some(message)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
