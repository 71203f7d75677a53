//! Main application entry point for the beacon server.
//!
//! Loads configuration, optionally starts the server straight away, serves
//! the stdin control console and shuts the server down on SIGINT/SIGTERM.

mod cli;
mod config;
mod console;
mod logging;
mod signals;

use anyhow::{Context, Result};
use socket_server::{create_server, ControlPlane, ServerError};
use std::net::SocketAddr;
use tracing::{error, info, warn};

use cli::CliArgs;
use config::AppConfig;

/// The beacon application: one managed server plus its control plane.
pub struct Application {
    config: AppConfig,
    plane: ControlPlane,
}

impl Application {
    /// Loads and validates configuration, then sets up logging.
    pub async fn new(args: CliArgs) -> Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_cli(&args);
        config
            .validate()
            .context("Configuration validation failed")?;

        logging::setup_logging(&config.logging)?;
        info!("Configuration loaded from {}", args.config_path.display());

        Ok(Self::from_config(config))
    }

    /// Builds the application from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let server = create_server(config.server.transport, config.to_timings());
        Self {
            plane: ControlPlane::new(server),
            config,
        }
    }

    pub fn control_plane(&self) -> &ControlPlane {
        &self.plane
    }

    /// Starts the server with the configured address and message.
    pub async fn autostart(&self) -> Result<SocketAddr, ServerError> {
        self.plane
            .server()
            .start_with(&self.config.to_server_config())
            .await
    }

    /// Runs until a shutdown signal arrives, then stops the server.
    pub async fn run(self) -> Result<()> {
        let settings = &self.config.server;
        info!(
            version = env!("CARGO_PKG_VERSION"),
            transport = %settings.transport,
            host = %settings.host,
            port = settings.port,
            "Starting beacon"
        );

        if self.config.autostart() {
            match self.autostart().await {
                Ok(addr) => info!(%addr, "Server auto-started"),
                // Stay up so the operator can fix the address from the console
                Err(e) => error!("Auto-start failed: {}", e),
            }
        } else {
            info!("No message configured; waiting for a start command");
        }

        let console = if self.config.control.console {
            let plane = self.plane.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = console::run_console(plane).await {
                    warn!("Control console stopped: {:#}", e);
                }
            }))
        } else {
            None
        };

        info!("Press Ctrl+C to shut down");
        let received = signals::wait_for_shutdown_signal().await?;
        info!(signal = %received, "Shutdown signal received, stopping server");

        if let Some(console) = console {
            console.abort();
        }
        self.control_plane().server().stop().await;

        info!("Beacon shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to start application: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    // A blocking stdin read cannot be cancelled and would hold up runtime shutdown
    std::process::exit(0);
}
