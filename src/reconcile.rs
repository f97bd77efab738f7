//! Diff-and-apply pass bringing the local mirrors toward the registry.
use crate::mirror::{MirrorError, MirrorExecutor};
use crate::notify::{notify_best_effort, ServiceNotifier};
use crate::registry::Registry;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to list registry: {0:#}")]
    Listing(#[source] anyhow::Error),
    #[error("removal of {pending} repositories skipped: {source}")]
    MissingRoot {
        pending: usize,
        #[source]
        source: MirrorError,
    },
}

/// What one pass will do. Fetch is by presence only, so every desired entry
/// is fetched again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_fetch: Vec<String>,
    pub to_remove: Vec<String>,
}

pub fn plan(desired: &[String], local: &BTreeSet<String>) -> ReconcilePlan {
    let wanted: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    ReconcilePlan {
        to_fetch: desired.to_vec(),
        to_remove: local
            .iter()
            .filter(|repo| !wanted.contains(repo.as_str()))
            .cloned()
            .collect(),
    }
}

/// Outcome of a pass; per-repository failures land here instead of failing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub fetched: Vec<String>,
    pub fetch_failed: Vec<String>,
    pub removed: Vec<String>,
    pub remove_failed: Vec<String>,
}

pub struct Reconciler {
    registry: Arc<Registry>,
    mirror: Arc<dyn MirrorExecutor>,
    notifier: Arc<dyn ServiceNotifier>,
    local: BTreeSet<String>,
}

impl Reconciler {
    pub fn new(
        registry: Arc<Registry>,
        mirror: Arc<dyn MirrorExecutor>,
        notifier: Arc<dyn ServiceNotifier>,
    ) -> Self {
        Self {
            registry,
            mirror,
            notifier,
            local: BTreeSet::new(),
        }
    }

    /// Seed the local mirror set, e.g. with what a previous run left behind.
    pub fn with_local_mirrors<I, S>(mut self, repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local.extend(repos.into_iter().map(Into::into));
        self
    }

    pub fn local_mirrors(&self) -> &BTreeSet<String> {
        &self.local
    }

    /// Desired set from the registry diffed against the local set.
    pub async fn plan(&self) -> Result<ReconcilePlan, ReconcileError> {
        let desired: Vec<String> = self
            .registry
            .list_all()
            .await
            .map_err(ReconcileError::Listing)?
            .into_iter()
            .map(|rec| rec.repo)
            .collect();
        Ok(plan(&desired, &self.local))
    }

    /// Run one full pass: every fetch is attempted before any removal.
    ///
    /// Entries are never dropped from the local set; removing an already
    /// removed mirror again is harmless.
    #[instrument(skip_all)]
    pub async fn reconcile(&mut self) -> Result<ReconcileReport, ReconcileError> {
        let plan = self.plan().await?;
        info!(
            fetch = plan.to_fetch.len(),
            remove = plan.to_remove.len(),
            "reconciling mirrors"
        );
        let mut report = ReconcileReport::default();

        for repo in &plan.to_fetch {
            match self.mirror.fetch(repo).await {
                Ok(_) => {
                    info!(repo = %repo, "fetched");
                    report.fetched.push(repo.clone());
                }
                Err(err) => {
                    warn!(repo = %repo, %err, "fetch failed; continuing");
                    report.fetch_failed.push(repo.clone());
                }
            }
        }
        self.local.extend(plan.to_fetch.iter().cloned());

        let removal = self.remove_all(&plan.to_remove, &mut report).await;

        notify_best_effort(self.notifier.as_ref()).await;

        removal?;
        info!(
            fetched = report.fetched.len(),
            fetch_failed = report.fetch_failed.len(),
            removed = report.removed.len(),
            remove_failed = report.remove_failed.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn remove_all(
        &self,
        to_remove: &[String],
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        if to_remove.is_empty() {
            return Ok(());
        }
        let root = self
            .mirror
            .resolve_root()
            .map_err(|source| ReconcileError::MissingRoot {
                pending: to_remove.len(),
                source,
            })?;
        for repo in to_remove {
            match self.mirror.remove(&root, repo).await {
                Ok(_) => {
                    info!(repo = %repo, "removed local mirror");
                    report.removed.push(repo.clone());
                }
                Err(err) => {
                    warn!(repo = %repo, %err, "remove failed; continuing");
                    report.remove_failed.push(repo.clone());
                }
            }
        }
        Ok(())
    }
}
