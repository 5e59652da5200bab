//! wordnab-ingest - Vocabulary Ingest service
//!
//! **Module Identity:**
//! - Name: wordnab-ingest
//! - Port: 5731 (default)
//!
//! Turns listening history into a vocabulary frequency table and serves
//! on-demand lyric context over HTTP + SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wordnab_common::config::{resolve_config_path, LoggingConfig};
use wordnab_common::events::EventBus;
use wordnab_ingest::config::{load_config, Overrides};
use wordnab_ingest::AppState;

/// Command-line arguments for wordnab-ingest
#[derive(Parser, Debug)]
#[command(name = "wordnab-ingest")]
#[command(about = "Vocabulary ingest service for WordNab")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "WORDNAB_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "WORDNAB_BIND")]
    bind: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "WORDNAB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Append logs to this file in addition to stderr
    #[arg(long, env = "WORDNAB_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// WordNab backend (word matching, language detection, context jobs)
    #[arg(long, env = "WORDNAB_BACKEND_URL")]
    backend_url: Option<String>,

    /// Lyrics service root
    #[arg(long, env = "WORDNAB_LYRICS_URL")]
    lyrics_url: Option<String>,

    /// Maximum status checks per context job
    #[arg(long, env = "WORDNAB_POLL_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Delay between status checks, in milliseconds
    #[arg(long, env = "WORDNAB_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Words kept in the aggregated table
    #[arg(long, env = "WORDNAB_CAP")]
    cap: Option<usize>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            backend_base_url: self.backend_url.clone(),
            lyrics_base_url: self.lyrics_url.clone(),
            max_attempts: self.max_attempts,
            interval_ms: self.poll_interval_ms,
            cap: self.cap,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_config(config_path.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting WordNab Vocabulary Ingest (wordnab-ingest) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => warn!("No configuration directory available, using built-in defaults"),
    }
    info!(
        "Poller: {} attempts every {} ms; table cap {}; backend {}",
        config.poller.max_attempts,
        config.poller.interval_ms,
        config.aggregation.cap,
        config.endpoints.backend_base_url
    );

    let event_bus = EventBus::new(100);
    let pipeline = wordnab_ingest::build_pipeline(&config, &event_bus)
        .context("Failed to initialize pipeline")?;
    info!("Pipeline initialized (run {})", pipeline.run_id());

    let state = AppState::new(
        Arc::new(pipeline),
        event_bus,
        config.endpoints.history_base_url.clone(),
    );
    let app = wordnab_ingest::build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.bind, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing: RUST_LOG wins, else the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let default_filter = format!("wordnab_ingest={0},wordnab_common={0},tower_http=info", logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
