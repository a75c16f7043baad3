//! OCPP WebSocket server
//!
//! Accepts charge station connections at `ws://<host>:<port>/ocpp/{charge_station_id}`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::negotiator::{Negotiation, ProtocolNegotiator};
use super::session::SharedSessionRegistry;
use crate::domain::OcppVersion;
use crate::support::ocpp_frame::OcppFrame;
use crate::support::shutdown::ShutdownSignal;
use crate::transport::MessageHandler;

const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

/// Inbound handlers, one per OCPP version.
#[derive(Clone)]
pub struct GatewayHandlers {
    pub v16: Arc<dyn MessageHandler>,
    pub v201: Arc<dyn MessageHandler>,
}

impl GatewayHandlers {
    pub fn for_version(&self, version: OcppVersion) -> &Arc<dyn MessageHandler> {
        match version {
            OcppVersion::V16 => &self.v16,
            OcppVersion::V201 => &self.v201,
        }
    }
}

/// Per-connection collaborators.
#[derive(Clone)]
struct ConnectionContext {
    sessions: SharedSessionRegistry,
    handlers: GatewayHandlers,
    negotiator: ProtocolNegotiator,
    shutdown: ShutdownSignal,
}

/// OCPP WebSocket server
pub struct OcppServer {
    context: ConnectionContext,
}

impl OcppServer {
    pub fn new(
        sessions: SharedSessionRegistry,
        handlers: GatewayHandlers,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            context: ConnectionContext {
                sessions,
                handlers,
                negotiator: ProtocolNegotiator::default(),
                shutdown,
            },
        }
    }

    pub fn with_negotiator(mut self, negotiator: ProtocolNegotiator) -> Self {
        self.context.negotiator = negotiator;
        self
    }

    /// Accept connections on `listener` until shutdown.
    pub async fn run(self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => {
                info!(
                    "🔌 OCPP gateway started on ws://{} ({})",
                    addr,
                    self.context.negotiator.supported_subprotocols().join(", ")
                );
                info!(
                    "   Charge stations should connect to: ws://{}/ocpp/{{charge_station_id}}",
                    addr
                );
            }
            Err(e) => warn!(error = %e, "gateway listener has no local address"),
        }

        let shutdown = self.context.shutdown.clone();
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },
                _ = shutdown.notified().wait() => {
                    info!("🛑 OCPP gateway received shutdown signal");
                    break;
                }
            }
        }

        let count = self.context.sessions.connection_count();
        if count > 0 {
            info!("📢 Closing {} charge station connections", count);
        }
        info!("✅ OCPP gateway stopped");
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let context = self.context.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, context).await {
                warn!(%addr, error = %e, "connection failed");
            }
        });
    }
}

/// Charge station id from a request path of the form `/ocpp/{id}`.
fn extract_charge_station_id(path: &str) -> Option<String> {
    let id = path.strip_prefix("/ocpp/")?.trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: ConnectionContext,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut accepted: Option<(String, Negotiation)> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let path = req.uri().path();
            let Some(charge_station_id) = extract_charge_station_id(path) else {
                warn!(%addr, path, "rejecting connection with unexpected path");
                return Err(reject(StatusCode::NOT_FOUND, "expected /ocpp/{charge_station_id}"));
            };

            let requested = req
                .headers()
                .get(SUBPROTOCOL_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            let Some(negotiation) = context.negotiator.negotiate_or_default(requested) else {
                return Err(reject(StatusCode::BAD_REQUEST, "no OCPP version available"));
            };

            match negotiation.subprotocol {
                Some(subprotocol) => {
                    response
                        .headers_mut()
                        .insert(SUBPROTOCOL_HEADER, HeaderValue::from_static(subprotocol));
                }
                None => warn!(
                    charge_station_id = charge_station_id.as_str(),
                    requested,
                    assumed = %negotiation.version,
                    "no common subprotocol offered"
                ),
            }

            accepted = Some((charge_station_id, negotiation));
            Ok(response)
        },
    )
    .await?;

    let Some((charge_station_id, negotiation)) = accepted else {
        return Ok(());
    };
    let version = negotiation.version;
    let cs_id = charge_station_id.as_str();

    metrics::counter!(
        "csms_ws_connections_total",
        "ocpp_version" => version.version_string()
    )
    .increment(1);
    info!(charge_station_id = cs_id, %addr, ocpp_version = %version, "charge station connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection_id = context.sessions.register(cs_id, version, tx);
    let handler = context.handlers.for_version(version).clone();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    debug!(charge_station_id = cs_id, frame = text.as_str(), "<-");
                    context.sessions.touch(cs_id);
                    match OcppFrame::parse(&text) {
                        Ok(frame) => {
                            if let Some(message) = context.sessions.inbound(cs_id, frame) {
                                handler.handle(cs_id, message).await;
                            }
                        }
                        Err(e) => warn!(charge_station_id = cs_id, error = %e, "dropping malformed frame"),
                    }
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    warn!(charge_station_id = cs_id, bytes = data.len(), "ignoring binary message");
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(charge_station_id = cs_id, ?frame, "close frame received");
                    break;
                }
                Some(Ok(_)) => context.sessions.touch(cs_id),
                Some(Err(e)) => {
                    error!(charge_station_id = cs_id, error = %e, "websocket error");
                    break;
                }
                None => break,
            },
            outbound = rx.recv() => match outbound {
                Some(text) => {
                    debug!(charge_station_id = cs_id, frame = text.as_str(), "->");
                    if let Err(e) = ws_sender.send(WsMessage::Text(text)).await {
                        error!(charge_station_id = cs_id, error = %e, "send failed");
                        break;
                    }
                }
                None => {
                    info!(charge_station_id = cs_id, "session replaced by a newer connection");
                    let _ = ws_sender.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            _ = context.shutdown.notified().wait() => {
                info!(charge_station_id = cs_id, "closing connection for shutdown");
                let _ = ws_sender.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }

    context.sessions.unregister(cs_id, connection_id);
    info!(charge_station_id = cs_id, "charge station disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    use crate::gateway::{SessionRegistry, WsEmitter};
    use crate::handlers::ocpp16;
    use crate::store::InMemoryStore;
    use crate::testing::{handler_context, schema_validator};
    use crate::transport::{Emitter, Message, MessageType};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Forwards every routed message to the test.
    struct Capture(mpsc::UnboundedSender<(String, Message)>);

    #[async_trait]
    impl MessageHandler for Capture {
        async fn handle(&self, charge_station_id: &str, message: Message) {
            let _ = self.0.send((charge_station_id.to_string(), message));
        }
    }

    #[test]
    fn charge_station_id_from_path() {
        assert_eq!(extract_charge_station_id("/ocpp/cs001"), Some("cs001".into()));
        assert_eq!(extract_charge_station_id("/ocpp/cs001/"), Some("cs001".into()));
        assert_eq!(extract_charge_station_id("/ocpp/"), None);
        assert_eq!(extract_charge_station_id("/ocpp/a/b"), None);
        assert_eq!(extract_charge_station_id("/cs001"), None);
    }

    async fn start(
        handlers: GatewayHandlers,
        sessions: SharedSessionRegistry,
    ) -> (SocketAddr, ShutdownSignal) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = OcppServer::new(sessions, handlers, shutdown.clone());
        tokio::spawn(server.run(listener));
        (addr, shutdown)
    }

    async fn connect(addr: SocketAddr, path: &str, protocols: &'static str) -> (Client, Option<String>) {
        let mut request = format!("ws://{addr}{path}").into_client_request().unwrap();
        request
            .headers_mut()
            .insert(SUBPROTOCOL_HEADER, HeaderValue::from_static(protocols));
        let (client, response) = tokio_tungstenite::connect_async(request).await.unwrap();
        let negotiated = response
            .headers()
            .get(SUBPROTOCOL_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        (client, negotiated)
    }

    async fn next_text(client: &mut Client) -> String {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return text;
            }
        }
    }

    async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn routes_frames_and_correlates_answers() {
        let (tx, mut routed) = mpsc::unbounded_channel();
        let capture: Arc<dyn MessageHandler> = Arc::new(Capture(tx));
        let sessions = SessionRegistry::shared();
        let handlers = GatewayHandlers {
            v16: capture.clone(),
            v201: capture,
        };
        let (addr, shutdown) = start(handlers, sessions.clone()).await;

        let (mut client, negotiated) = connect(addr, "/ocpp/cs001", "ocpp1.6, ocpp2.0.1").await;
        assert_eq!(negotiated.as_deref(), Some("ocpp2.0.1"));

        client
            .send(WsMessage::Text(r#"[2,"c1","Heartbeat",{}]"#.into()))
            .await
            .unwrap();
        let (cs_id, message) = recv(&mut routed).await;
        assert_eq!(cs_id, "cs001");
        assert_eq!(message, Message::call("Heartbeat", "c1", json!({})));
        assert_eq!(sessions.version_of("cs001"), Some(OcppVersion::V201));

        let emitter = WsEmitter::new(sessions.clone());
        let call = Message::call("SetVariables", "m1", json!({"setVariableData": []}))
            .with_state(json!("s"));
        emitter.emit(OcppVersion::V201, "cs001", &call).await.unwrap();
        assert_eq!(
            next_text(&mut client).await,
            r#"[2,"m1","SetVariables",{"setVariableData":[]}]"#
        );

        client
            .send(WsMessage::Text(r#"[3,"m1",{"setVariableResult":[]}]"#.into()))
            .await
            .unwrap();
        let (_, result) = recv(&mut routed).await;
        assert_eq!(result.message_type, MessageType::CallResult);
        assert_eq!(result.action, "SetVariables");
        assert_eq!(result.request, Some(json!({"setVariableData": []})));
        assert_eq!(result.response, Some(json!({"setVariableResult": []})));
        assert_eq!(result.state, Some(json!("s")));

        shutdown.trigger();
    }

    #[tokio::test]
    async fn heartbeat_round_trip_through_16_router() {
        let sessions = SessionRegistry::shared();
        let emitter: Arc<dyn Emitter> = Arc::new(WsEmitter::new(sessions.clone()));
        let context = handler_context(Arc::new(InMemoryStore::new()));
        let router: Arc<dyn MessageHandler> = Arc::new(ocpp16::new_router(
            &context,
            emitter,
            Arc::new(schema_validator()),
        ));
        let handlers = GatewayHandlers {
            v16: router.clone(),
            v201: router,
        };
        let (addr, shutdown) = start(handlers, sessions).await;

        let (mut client, negotiated) = connect(addr, "/ocpp/cs002", "ocpp1.6").await;
        assert_eq!(negotiated.as_deref(), Some("ocpp1.6"));

        client
            .send(WsMessage::Text(r#"[2,"h1","Heartbeat",{}]"#.into()))
            .await
            .unwrap();
        assert_eq!(
            next_text(&mut client).await,
            r#"[3,"h1",{"currentTime":"2023-06-15T15:05:00+01:00"}]"#
        );

        client
            .send(WsMessage::Text(r#"[2,"h2","Unknown",{}]"#.into()))
            .await
            .unwrap();
        let error = OcppFrame::parse(&next_text(&mut client).await).unwrap();
        assert!(matches!(
            error,
            OcppFrame::CallError { ref unique_id, ref error_code, .. }
                if unique_id == "h2" && error_code == "NotImplemented"
        ));

        shutdown.trigger();
    }

    #[tokio::test]
    async fn disconnect_and_shutdown_clear_the_session() {
        let (tx, mut routed) = mpsc::unbounded_channel();
        let capture: Arc<dyn MessageHandler> = Arc::new(Capture(tx));
        let sessions = SessionRegistry::shared();
        let (addr, shutdown) = start(
            GatewayHandlers {
                v16: capture.clone(),
                v201: capture,
            },
            sessions.clone(),
        )
        .await;

        let (mut client, _) = connect(addr, "/ocpp/cs003", "ocpp1.6").await;
        client
            .send(WsMessage::Text(r#"[2,"c1","Heartbeat",{}]"#.into()))
            .await
            .unwrap();
        recv(&mut routed).await;
        assert!(sessions.is_connected("cs003"));

        shutdown.trigger();
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(Ok(frame)) = client.next().await {
                if frame.is_close() {
                    break;
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        tokio::time::timeout(Duration::from_secs(2), async {
            while sessions.is_connected("cs003") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unexpected_path_is_rejected() {
        let sessions = SessionRegistry::shared();
        let (tx, _routed) = mpsc::unbounded_channel();
        let capture: Arc<dyn MessageHandler> = Arc::new(Capture(tx));
        let (addr, shutdown) = start(
            GatewayHandlers {
                v16: capture.clone(),
                v201: capture,
            },
            sessions,
        )
        .await;

        let request = format!("ws://{addr}/nope").into_client_request().unwrap();
        assert!(tokio_tungstenite::connect_async(request).await.is_err());
        shutdown.trigger();
    }
}
