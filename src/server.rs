//! Server runtime
//!
//! [`ServerHandle`] wires the core together: in-memory store, schema
//! validator, both routers behind the WebSocket gateway, the call makers and
//! the three sync loops. It owns the shutdown signal shared by all of them.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::gateway::{GatewayHandlers, OcppServer, SessionRegistry, SharedSessionRegistry, WsEmitter};
use crate::handlers::{ocpp16, ocpp201, HandlerContext};
use crate::schemas::{bundled_schema_dir, FsSchemaValidator, SchemaValidator};
use crate::services::CertificateServices;
use crate::store::{Engine, InMemoryStore};
use crate::support::clock::{Clock, SystemClock};
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::sync::{self, SyncCallMakers, SyncContext};
use crate::transport::{Emitter, MessageHandler};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("binding {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics exporter: {0}")]
    Metrics(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Options for starting the CSMS core.
#[derive(Clone, Default)]
pub struct ServerOptions {
    pub config: AppConfig,
    /// Certificate services for the plug-and-charge handlers. Unset
    /// services make those handlers answer with a failure status.
    pub services: CertificateServices,
}

/// Handle to a running CSMS core.
pub struct ServerHandle {
    /// Live charge station sessions.
    pub sessions: SharedSessionRegistry,
    /// The store shared by handlers and sync loops.
    pub store: Arc<dyn Engine>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Address the gateway is listening on.
    pub ws_addr: SocketAddr,

    shutdown: ShutdownCoordinator,
    gateway_task: JoinHandle<()>,
    sync_tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> ServerResult<Self> {
        let config = opts.config;
        info!("Starting CSMS core...");

        if config.metrics.enabled {
            install_metrics_exporter(&config.metrics.listen)?;
        }

        let store: Arc<dyn Engine> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let schema_dir = config.schemas.dir.clone().unwrap_or_else(bundled_schema_dir);
        info!("📄 Loading OCPP schemas from {}", schema_dir.display());
        let validator: Arc<dyn SchemaValidator> = Arc::new(FsSchemaValidator::new(schema_dir));

        let sessions = SessionRegistry::shared();
        let emitter: Arc<dyn Emitter> = Arc::new(WsEmitter::new(sessions.clone()));

        let context = HandlerContext {
            clock: clock.clone(),
            store: store.clone(),
            services: opts.services,
            heartbeat_interval: config.server.heartbeat_interval(),
        };
        let v16: Arc<dyn MessageHandler> = Arc::new(ocpp16::new_router(
            &context,
            emitter.clone(),
            validator.clone(),
        ));
        let v201: Arc<dyn MessageHandler> =
            Arc::new(ocpp201::new_router(&context, emitter.clone(), validator));

        let call_makers = SyncCallMakers {
            v16: Arc::new(ocpp16::new_call_maker(emitter.clone())),
            v16_data_transfer: Arc::new(ocpp16::new_data_transfer_call_maker(emitter.clone())),
            v201: Arc::new(ocpp201::new_call_maker(emitter)),
        };

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let address = config.server.ws_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let ws_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;

        let server = OcppServer::new(
            sessions.clone(),
            GatewayHandlers { v16, v201 },
            shutdown_signal.clone(),
        );
        let gateway_task = tokio::spawn(server.run(listener));

        let sync_tasks = sync::spawn_all(
            SyncContext {
                store: store.clone(),
                clock,
                config: config.sync_config(),
            },
            call_makers,
            shutdown_signal,
        );

        info!("🚀 CSMS core started.");

        Ok(Self {
            sessions,
            store,
            config,
            ws_addr,
            shutdown,
            gateway_task,
            sync_tasks,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Trigger shutdown on SIGTERM/SIGINT.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for every task to stop once shutdown has been triggered, giving
    /// up after the configured shutdown timeout.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");

        let gateway_task = self.gateway_task;
        let sync_tasks = self.sync_tasks;
        let finished = self
            .shutdown
            .shutdown_with_cleanup(|| async move {
                if let Err(e) = gateway_task.await {
                    error!(error = %e, "gateway task panicked");
                }
                for task in sync_tasks {
                    if let Err(e) = task.await {
                        error!(error = %e, "sync task panicked");
                    }
                }
            })
            .await;

        if !finished {
            warn!("some tasks did not stop in time");
        }
        info!("👋 CSMS core shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down CSMS core...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.gateway_task.is_finished()
    }
}

fn install_metrics_exporter(listen: &str) -> ServerResult<()> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| ServerError::Metrics(format!("{listen}: {e}")))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("📊 Prometheus metrics exporter listening on http://{}/metrics", addr);
    Ok(())
}

/// Initialize tracing from the application config. `RUST_LOG` wins over
/// `logging.level`.
///
/// Call once at process startup, before [`ServerHandle::start`].
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let result = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}
