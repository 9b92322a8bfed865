//! xcast-send - Background daemon for scheduled posting
//!
//! Polls the post queue and delivers due posts to X.

use clap::Parser;
use libxcast::logging;
use libxcast::{
    Config, CredentialVault, Database, MediaLibrary, PostStore, Result, Scheduler,
    SchedulerSettings, XClient, XcastError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "xcast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
xcast-send - Background daemon for scheduled posting

DESCRIPTION:
    xcast-send is a long-running daemon that watches the xcast queue and
    delivers scheduled posts to X when they are due.

    Every poll it picks up pending posts whose time has come, uploads their
    images, creates the post and records the result. Failed posts stay
    queued and are retried on the next poll unless an attempt limit is
    configured.

USAGE:
    # Run in foreground (logs to stderr)
    xcast-send

    # Run with custom poll interval
    xcast-send --poll-interval 30

    # Deliver whatever is due right now and exit
    xcast-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

CONFIGURATION:
    Configuration file: $XCAST_CONFIG or ~/.config/xcast/config.toml
    Required environment:
        DATABASE_URL           SQLite URL or path
        XCAST_ENCRYPTION_KEY   key from `xcast-serve keygen`

    [scheduler]
    poll_interval = 60     # seconds between polls
    max_attempts = 5       # give up after this many failures (default: never)
    concurrency = 4        # posts delivered in parallel

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for scheduled posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit
    #[arg(long)]
    #[arg(help = "Process due posts once and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("xcast-send failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let vault = Arc::new(CredentialVault::from_env()?);

    let poll_interval = match cli.poll_interval {
        Some(0) => {
            return Err(XcastError::InvalidInput(
                "--poll-interval must be at least 1".to_string(),
            ))
        }
        Some(seconds) => seconds,
        None => config.scheduler.poll_interval,
    };

    let db = Database::new(&config.database.url).await?;
    let store = PostStore::new(db, config.scheduler.offset()?)
        .with_claim_lease(config.scheduler.claim_lease);
    let media = MediaLibrary::new(config.media_root());
    let client = Arc::new(XClient::new(vault, &config.delivery)?);
    let scheduler = Scheduler::new(
        store,
        media,
        client,
        SchedulerSettings::from(&config.scheduler),
    );

    info!("xcast-send daemon starting");

    if cli.once {
        let report = scheduler.tick(chrono::Utc::now().timestamp()).await?;
        info!(
            due = report.due,
            sent = report.sent,
            failed = report.failed,
            "xcast-send: processed posts once, exiting"
        );
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("Poll interval: {}s", poll_interval);
    scheduler
        .run(Duration::from_secs(poll_interval), shutdown)
        .await;

    info!("xcast-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}
