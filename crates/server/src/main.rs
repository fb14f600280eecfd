#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vil_server::{LinkServer, ServerConfig};
use vil_storage::{LinkStore, MemoryLinkStore, SqliteLinkStore};

#[derive(Parser, Debug)]
#[command(name = "vil_server")]
#[command(version, about = "Versioned item link service", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "VIL_BIND", default_value = "127.0.0.1")]
    bind: String,

    #[arg(long, env = "VIL_PORT", default_value_t = vil_server::DEFAULT_PORT)]
    port: u16,

    /// Directory for the SQLite link database; links stay in memory when omitted
    #[arg(long, env = "VIL_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// HS256 secret that bearer tokens must be signed with
    #[arg(long, env = "VIL_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_env("VIL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let store: Arc<dyn LinkStore> = match &args.storage_dir {
        Some(dir) => Arc::new(
            SqliteLinkStore::open(dir)
                .with_context(|| format!("failed to open link store in {}", dir.display()))?,
        ),
        None => Arc::new(MemoryLinkStore::new()),
    };

    let config = ServerConfig {
        bind: args.bind,
        port: args.port,
        jwt_secret: args.jwt_secret,
    };
    let server = LinkServer::bind(&config, store).context("failed to start server")?;
    let addr = server.local_addr()?;
    tracing::info!(
        %addr,
        persistent = args.storage_dir.is_some(),
        verifies_tokens = config.jwt_secret.is_some(),
        "listening"
    );
    server.run(Arc::new(AtomicBool::new(false)))?;
    Ok(())
}
