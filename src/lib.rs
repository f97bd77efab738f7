pub mod config;
pub mod db;
pub mod gitconfig;
pub mod ingest;
pub mod mirror;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod registry;
pub mod server;
pub mod watcher;

use anyhow::Result;
use std::sync::Arc;

/// Open the configured registry, creating its table if needed.
pub async fn open_registry(cfg: &config::Config) -> Result<registry::Registry> {
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool, &cfg.store.table).await?;
    let store = db::SqliteStore::new(pool, cfg.store.table.clone())?;
    Ok(registry::Registry::from_config(Arc::new(store), &cfg.store))
}
