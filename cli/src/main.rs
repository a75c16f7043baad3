//! CSMS core server
//!
//! ```sh
//! # Run with default config (~/.config/maeve-csms/config.toml)
//! csms-core
//!
//! # Custom config path and port
//! csms-core --config /etc/maeve-csms/config.toml --ws-port 9000
//!
//! # Validate config without starting
//! csms-core --check
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use csms_core::config::AppConfig;
use csms_core::server::{init_tracing, ServerHandle, ServerOptions};

/// OCPP 1.6 / 2.0.1 CSMS core: WebSocket gateway and reconciliation loops.
#[derive(Parser, Debug)]
#[command(
    name = "csms-core",
    version,
    about = "OCPP protocol core for EV charging station management",
    long_about = "Accepts OCPP 1.6 and 2.0.1 charge stations over WebSocket and keeps \
                  their settings, certificates and triggered messages converged.\n\n\
                  Default config: ~/.config/maeve-csms/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "CSMS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the WebSocket listen port.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(csms_core::default_config_path);
    let mut config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(port) = cli.ws_port {
        config.server.ws_port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   WS address  : {}", config.server.ws_address());
        println!(
            "   Sync        : every {}s, retry after {}s, page size {}",
            config.sync.run_every_secs, config.sync.retry_after_secs, config.sync.page_size
        );
        match &config.schemas.dir {
            Some(dir) => println!("   Schemas     : {}", dir.display()),
            None => println!("   Schemas     : bundled"),
        }
        if config.metrics.enabled {
            println!("   Metrics     : http://{}/metrics", config.metrics.listen);
        }
        println!("   Log level   : {}", config.logging.level);
        return ExitCode::SUCCESS;
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    let handle = match ServerHandle::start(ServerOptions {
        config,
        ..ServerOptions::default()
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    ExitCode::SUCCESS
}
