use anyhow::Result;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use hookmirror::config;
use hookmirror::gitconfig;
use hookmirror::mirror::CommandMirror;
use hookmirror::notify;
use hookmirror::reconcile::Reconciler;
use hookmirror::watcher::Watcher;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Keep local repository mirrors in sync with the hook registry"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "hookmirror starting");
    let cfg = config::load(Some(&args.config))?;
    info!(
        table = %cfg.store.table,
        trigger_key = %cfg.store.trigger_key,
        interval_seconds = cfg.mirror.interval_seconds,
        root_env = %cfg.mirror.root_env,
        "loaded configuration"
    );

    tokio::spawn(async {
        if shutdown_requested(wait_for_signal()).await {
            std::process::exit(1);
        }
    });

    gitconfig::install(&cfg.git).await?;

    let registry = Arc::new(hookmirror::open_registry(&cfg).await?);
    let mirror = Arc::new(CommandMirror::from_config(&cfg.mirror));
    let notifier = notify::from_config(&cfg.notify)?;
    let reconciler = Reconciler::new(registry.clone(), mirror, notifier);
    let mut watcher = Watcher::new(
        registry,
        reconciler,
        Duration::from_secs(cfg.mirror.interval_seconds),
    );

    if let Err(err) = watcher.run().await {
        error!(?err, "fatal error, exiting");
        return Err(err);
    }
    Ok(())
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

/// Waits for a termination signal and runs cleanup. Returns false without
/// cleaning up when the handlers could not be installed.
async fn shutdown_requested<F>(wait: F) -> bool
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    match wait.await {
        Ok(sig) => info!(signal = sig, "received signal"),
        Err(err) => {
            error!(?err, "failed to install signal handlers");
            return false;
        }
    }
    cleanup();
    true
}

fn cleanup() {
    info!("cleaning up before exit");
}
