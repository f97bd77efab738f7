//! Registry view shared by both processes: repository rows plus the trigger
//! counter that announces every change.
use crate::config;
use crate::db::RegistryStore;
use crate::model::{Record, RepoRecord, TriggerRecord};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn RegistryStore>,
    trigger_key: String,
    page_size: u32,
    max_pages: u32,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>, trigger_key: impl Into<String>) -> Self {
        Self {
            store,
            trigger_key: trigger_key.into(),
            page_size: 100,
            max_pages: 50,
        }
    }

    pub fn from_config(store: Arc<dyn RegistryStore>, cfg: &config::Store) -> Self {
        Self::new(store, cfg.trigger_key.clone())
            .with_scan_limits(cfg.scan_page_size, cfg.scan_max_pages)
    }

    pub fn with_scan_limits(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn trigger_key(&self) -> &str {
        &self.trigger_key
    }

    pub fn is_trigger_key(&self, key: &str) -> bool {
        key == self.trigger_key
    }

    pub async fn get_repo(&self, repo: &str) -> Result<Option<RepoRecord>> {
        match self.store.get(repo).await? {
            Some(Record::Repo(rec)) => Ok(Some(rec)),
            Some(Record::Trigger { .. }) | None => Ok(None),
        }
    }

    pub async fn put_repo(&self, record: RepoRecord) -> Result<()> {
        self.store.put(&Record::Repo(record)).await
    }

    pub async fn delete_repo(&self, repo: &str) -> Result<()> {
        self.store.delete(repo).await
    }

    /// Every repository row, trigger row filtered out.
    ///
    /// Scans at most `max_pages` pages; a registry larger than that is
    /// truncated with a warning rather than scanned indefinitely.
    #[instrument(skip_all)]
    pub async fn list_all(&self) -> Result<Vec<RepoRecord>> {
        let mut repos = Vec::new();
        let mut after: Option<String> = None;
        for page_num in 1..=self.max_pages {
            let page = self.store.scan(after.as_deref(), self.page_size).await?;
            repos.extend(page.records.into_iter().filter_map(|record| match record {
                Record::Repo(rec) if !self.is_trigger_key(&rec.repo) => Some(rec),
                _ => None,
            }));
            match page.last_key {
                Some(key) => after = Some(key),
                None => return Ok(repos),
            }
            debug!(page_num, listed = repos.len(), "scanned registry page");
        }
        warn!(
            max_pages = self.max_pages,
            listed = repos.len(),
            "registry scan hit the page cap; listing truncated"
        );
        Ok(repos)
    }

    async fn read_trigger(&self) -> Result<Option<i64>> {
        match self.store.get(&self.trigger_key).await? {
            Some(Record::Trigger {
                trigger: TriggerRecord { count },
                ..
            }) => Ok(Some(count)),
            Some(Record::Repo(_)) => Err(anyhow!(
                "trigger key '{}' holds a repository row",
                self.trigger_key
            )),
            None => Ok(None),
        }
    }

    /// Current counter; an absent trigger row reads as 0.
    pub async fn read_counter(&self) -> Result<i64> {
        Ok(self.read_trigger().await?.unwrap_or(0))
    }

    /// Increment the counter and return the value written.
    ///
    /// A single store-side increment, so concurrent bumps neither lose an
    /// increment nor fail on contention.
    #[instrument(skip_all)]
    pub async fn bump_counter(&self) -> Result<i64> {
        let count = self.store.increment_count(&self.trigger_key).await?;
        debug!(count, "trigger counter bumped");
        Ok(count)
    }
}
