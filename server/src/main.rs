//! scrapectl-server: REST control plane for civic-data scrape jobs.

mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scrapectl::config::{default_config_path, load_config, Config, LogFormat};
use scrapectl::{create_router, ControlPlane};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "scrapectl-server")]
#[command(about = "Scraper job registry, dispatcher and progress tracker over HTTP")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.scrapectl/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides server.listen_addr
    #[arg(short, long)]
    listen: Option<String>,

    /// SQLite database path, or ":memory:"
    #[arg(long)]
    database: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_parser = ["text", "json"])]
    log_format: Option<String>,

    /// Do not start the daily scheduler
    #[arg(long)]
    no_scheduler: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.server.listen_addr = listen.clone();
        }
        if let Some(database) = &self.database {
            config.database.path = Some(database.clone());
        }
        match self.log_format.as_deref() {
            Some("json") => config.logging.format = LogFormat::Json,
            Some("text") => config.logging.format = LogFormat::Text,
            _ => {}
        }
        if self.no_scheduler {
            config.scheduler.enabled = false;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .context("Could not determine the config file path")?;
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    cli.apply(&mut config);

    logging::init(&config.logging)?;
    info!(
        "Starting scrapectl-server v{} with config {}",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    let addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .context("Invalid HTTP listen address")?;

    let plane = ControlPlane::from_config(&config)?;
    let scheduler = plane.start_scheduler();

    let app = create_router(plane.app_state(), config.server.cors_enabled);
    let listener = TcpListener::bind(&addr)
        .await
        .context("Failed to bind HTTP server")?;
    info!("HTTP API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    plane.shutdown();
    if let Some(handle) = scheduler {
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => {}
            _ => log::warn!("Daily scheduler thread did not stop cleanly"),
        }
    }

    info!("scrapectl-server stopped");
    Ok(())
}
