use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use hookmirror::config;
use hookmirror::ingest::Ingestor;
use hookmirror::server::{self, AppState};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Accept repository push hooks and record them in the registry"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address, overriding `ingest.listen`
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let listen = args.listen.unwrap_or_else(|| cfg.ingest.listen.clone());
    info!(
        listen = %listen,
        table = %cfg.store.table,
        trigger_key = %cfg.store.trigger_key,
        "loaded configuration"
    );

    let registry = Arc::new(hookmirror::open_registry(&cfg).await?);
    let state = AppState {
        ingestor: Arc::new(Ingestor::new(registry)),
    };

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    server::serve(listener, state).await
}
