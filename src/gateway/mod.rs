//! WebSocket gateway
//!
//! Terminates charge station connections at `ws://<host>:<port>/ocpp/{id}`,
//! turns OCPP-J frames into [`Message`](crate::transport::Message)s for the
//! router of the negotiated version, and puts outbound messages back on the
//! right socket through [`WsEmitter`].

pub mod emitter;
pub mod negotiator;
pub mod server;
pub mod session;

pub use emitter::WsEmitter;
pub use negotiator::{Negotiation, ProtocolNegotiator};
pub use server::{GatewayHandlers, OcppServer};
pub use session::{PendingCall, SessionRegistry, SharedSessionRegistry};
