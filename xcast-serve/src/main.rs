//! xcast-serve - HTTP API with an embedded scheduler

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use libxcast::config::ServerConfig;
use libxcast::error::ConfigError;
use libxcast::logging;
use libxcast::{
    Config, CredentialVault, Database, DeliveryClient, MediaLibrary, PostStore, Result, Scheduler,
    SchedulerSettings, XClient,
};
use tracing::{error, info, warn};
use xcast_serve::{build_app_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "xcast-serve")]
#[command(version)]
#[command(about = "HTTP API for scheduling posts to X")]
#[command(long_about = "\
xcast-serve - HTTP API for scheduling posts to X

Serves the account, queue, schedule and image endpoints and, unless
[scheduler] enabled = false, delivers due posts in the background.

CONFIGURATION:
    Configuration file: $XCAST_CONFIG or ~/.config/xcast/config.toml
    Required environment:
        DATABASE_URL           SQLite URL or path
        XCAST_ENCRYPTION_KEY   key from `xcast-serve keygen`

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print a fresh XCAST_ENCRYPTION_KEY value
    Keygen,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Command::Keygen)) {
        println!("XCAST_ENCRYPTION_KEY={}", CredentialVault::generate_key());
        return;
    }

    logging::init_default(cli.verbose);

    let (host, port) = match cli.command {
        Some(Command::Serve { host, port }) => (host, port),
        _ => (None, None),
    };

    if let Err(e) = serve(host, port).await {
        error!("xcast-serve failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let vault = Arc::new(CredentialVault::from_env()?);
    let addr = bind_address(&config.server)?;

    let db = Database::new(&config.database.url).await?;
    let store = PostStore::new(db, config.scheduler.offset()?)
        .with_claim_lease(config.scheduler.claim_lease);
    let media = MediaLibrary::new(config.media_root());
    let client: Arc<dyn DeliveryClient> = Arc::new(XClient::new(vault.clone(), &config.delivery)?);

    let shutdown = Arc::new(AtomicBool::new(false));
    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = Scheduler::new(
            store.clone(),
            media.clone(),
            client.clone(),
            SchedulerSettings::from(&config.scheduler),
        );
        let interval = Duration::from_secs(config.scheduler.poll_interval);
        let flag = shutdown.clone();
        Some(tokio::spawn(async move { scheduler.run(interval, flag).await }))
    } else {
        info!("Scheduler disabled by configuration");
        None
    };

    let state = AppState::new(store, media, vault, client, config.server.clone());
    let app = build_app_router(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Starting server");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Server stopped accepting connections");
    shutdown.store(true, Ordering::Relaxed);
    if let Some(handle) = scheduler_handle {
        // The scheduler notices the flag within a second; an in-flight tick may take longer.
        if tokio::time::timeout(Duration::from_secs(30), handle).await.is_err() {
            warn!("Scheduler did not stop in time");
        }
    }

    served?;
    info!("Graceful shutdown complete");
    Ok(())
}

fn bind_address(server: &ServerConfig) -> Result<SocketAddr> {
    let ip = server.host.parse().map_err(|e| ConfigError::InvalidValue {
        field: "server.host".to_string(),
        reason: format!("'{}': {}", server.host, e),
    })?;
    Ok(SocketAddr::new(ip, server.port))
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
