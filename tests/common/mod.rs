#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hookmirror::db::{self, RegistryStore, ScanPage, SqliteStore};
use hookmirror::mirror::{MirrorError, MirrorExecutor, MirrorOutput};
use hookmirror::model::{HeadCommit, PushEvent, Record, RepoRecord, Repository};
use hookmirror::notify::ServiceNotifier;
use hookmirror::registry::Registry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const TRIGGER: &str = "00000trigger";

/// Registry on a file-backed pool, so concurrent callers get separate connections.
pub async fn setup_file_registry(dir: &Path) -> Arc<Registry> {
    let url = format!("sqlite://{}", dir.join("registry.db").display());
    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool, "repos").await.unwrap();
    let store = SqliteStore::new(pool, "repos").unwrap();
    Arc::new(Registry::new(Arc::new(store), TRIGGER))
}

pub async fn setup_registry() -> Arc<Registry> {
    let pool = db::memory_pool().await.unwrap();
    db::run_migrations(&pool, "repos").await.unwrap();
    let store = SqliteStore::new(pool, "repos").unwrap();
    Arc::new(Registry::new(Arc::new(store), TRIGGER))
}

pub fn repo(id: &str) -> RepoRecord {
    RepoRecord {
        repo: id.into(),
        last_commit_id: "c0ffee".into(),
        last_commit_message: "initial".into(),
        last_commit_user: "dev@example.com".into(),
    }
}

pub fn push_event(url: &str, commit: &str) -> PushEvent {
    let mut head = HeadCommit {
        id: commit.into(),
        message: format!("commit {}", commit),
        ..Default::default()
    };
    head.author.name = "Dev".into();
    head.author.email = "dev@example.com".into();
    PushEvent {
        git_ref: "refs/heads/main".into(),
        repository: Repository {
            svn_url: url.into(),
            ..Default::default()
        },
        head_commit: Some(head),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorCall {
    Fetch(String),
    Remove(PathBuf, String),
}

#[derive(Clone, Default)]
pub struct RecordingMirror {
    calls: Arc<Mutex<Vec<MirrorCall>>>,
    failing: Arc<HashSet<String>>,
    root: Option<PathBuf>,
}

impl RecordingMirror {
    pub fn with_root(root: &str) -> Self {
        Self {
            root: Some(PathBuf::from(root)),
            ..Default::default()
        }
    }

    pub fn without_root() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, repos: &[&str]) -> Self {
        self.failing = Arc::new(repos.iter().map(|s| s.to_string()).collect());
        self
    }

    pub async fn calls(&self) -> Vec<MirrorCall> {
        self.calls.lock().await.clone()
    }

    pub async fn fetched(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                MirrorCall::Fetch(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub async fn removed(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                MirrorCall::Remove(_, r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }

    fn outcome(&self, repo: &str) -> Result<MirrorOutput, MirrorError> {
        if self.failing.contains(repo) {
            return Err(MirrorError::UnsafeRepo(repo.to_string()));
        }
        Ok(MirrorOutput::default())
    }
}

#[async_trait]
impl MirrorExecutor for RecordingMirror {
    async fn fetch(&self, repo: &str) -> Result<MirrorOutput, MirrorError> {
        self.calls
            .lock()
            .await
            .push(MirrorCall::Fetch(repo.to_string()));
        self.outcome(repo)
    }

    fn resolve_root(&self) -> Result<PathBuf, MirrorError> {
        self.root.clone().ok_or_else(|| MirrorError::MissingRoot {
            var: "GOPATH".into(),
        })
    }

    async fn remove(&self, root: &Path, repo: &str) -> Result<MirrorOutput, MirrorError> {
        self.calls
            .lock()
            .await
            .push(MirrorCall::Remove(root.to_path_buf(), repo.to_string()));
        self.outcome(repo)
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceNotifier for RecordingNotifier {
    async fn notify(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("systemctl: unit not found"));
        }
        Ok(())
    }
}

/// Store whose every operation fails, standing in for an unreachable table.
pub struct UnavailableStore;

#[async_trait]
impl RegistryStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<Record>> {
        Err(anyhow!("registry unavailable"))
    }

    async fn put(&self, _record: &Record) -> Result<()> {
        Err(anyhow!("registry unavailable"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(anyhow!("registry unavailable"))
    }

    async fn scan(&self, _after: Option<&str>, _limit: u32) -> Result<ScanPage> {
        Err(anyhow!("registry unavailable"))
    }

    async fn increment_count(&self, _key: &str) -> Result<i64> {
        Err(anyhow!("registry unavailable"))
    }
}

pub fn unavailable_registry() -> Arc<Registry> {
    Arc::new(Registry::new(Arc::new(UnavailableStore), TRIGGER))
}
