//! Items API server.
//!
//! Loads settings, builds the application logger, binds the listener and
//! serves until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use items_api::config::load_settings;
use items_api::http::HttpServer;
use items_api::lifecycle::{spawn_signal_handler, Shutdown};
use items_api::observability::{self, LoggerRegistry, Sink};
use items_api::store::MemoryStore;

#[derive(Parser)]
#[command(name = "items-api")]
#[command(about = "CRUD items service with structured access logging", long_about = None)]
struct Cli {
    /// Optional TOML settings file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let registry = LoggerRegistry::new();
    let logger = observability::app_logger(&registry, &settings, Sink::Stderr);
    observability::install_tracing(logger.clone(), &settings)?;

    tracing::debug!(
        app_env = %settings.app_env,
        log_level = %settings.log_level,
        "settings loaded"
    );

    let listener = TcpListener::bind(settings.bind_address()).await?;
    let store = Arc::new(MemoryStore::new());
    let server = HttpServer::new(settings, logger, store);

    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    spawn_signal_handler(shutdown);

    server.run(listener, signal).await?;
    registry.shutdown();
    Ok(())
}
