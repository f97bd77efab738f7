//! Write path for inbound change notifications.
use crate::model::{ChangeOp, PushEvent, RepoRecord};
use crate::registry::Registry;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not parse repository name from '{0}'")]
    Parse(String),
    #[error("'{0}' is the reserved trigger key and cannot be changed through hooks")]
    ProtectedKey(String),
    #[error("repository '{0}' not found in registry")]
    NotFound(String),
    #[error("registry error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Result of an accepted change: the repository touched and the counter
/// value that now announces it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Applied {
    pub repo: String,
    pub count: i64,
}

/// Derive the canonical repository name from a source URL by dropping the
/// scheme: `https://github.example.com/org/a` becomes `github.example.com/org/a`.
///
/// Names end up as paths under the mirror root, so absolute names and `.`/`..`
/// segments are rejected.
pub fn parse_repo_id(url: &str) -> Result<String, IngestError> {
    let parse_err = || IngestError::Parse(url.to_string());
    let (_, rest) = url.split_once("//").ok_or_else(parse_err)?;
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() || rest.starts_with('/') {
        return Err(parse_err());
    }
    if rest.split('/').any(|seg| seg == "." || seg == ".." || seg.is_empty()) {
        return Err(parse_err());
    }
    Ok(rest.to_string())
}

pub struct Ingestor {
    registry: Arc<Registry>,
}

impl Ingestor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Apply one change to the registry, then bump the trigger counter.
    ///
    /// The counter moves only after the row write or delete succeeded; any
    /// earlier failure leaves both untouched.
    #[instrument(skip_all, fields(op = op.as_str()))]
    pub async fn apply_change(
        &self,
        event: &PushEvent,
        op: ChangeOp,
    ) -> Result<Applied, IngestError> {
        let repo = parse_repo_id(&event.repository.svn_url)?;
        if self.registry.is_trigger_key(&repo) {
            warn!(repo = %repo, "rejected change targeting the trigger key");
            return Err(IngestError::ProtectedKey(repo));
        }

        match op {
            ChangeOp::Create => {
                let head = event.head_commit.clone().unwrap_or_default();
                info!(
                    repo = %repo,
                    git_ref = %event.git_ref,
                    commit = %head.id,
                    author = %head.author.name,
                    "recording repository"
                );
                self.registry
                    .put_repo(RepoRecord {
                        repo: repo.clone(),
                        last_commit_id: head.id,
                        last_commit_message: head.message,
                        last_commit_user: head.author.email,
                    })
                    .await?;
            }
            ChangeOp::Delete => {
                if self.registry.get_repo(&repo).await?.is_none() {
                    return Err(IngestError::NotFound(repo));
                }
                self.registry.delete_repo(&repo).await?;
                info!(repo = %repo, "removed repository");
            }
        }

        let count = self.registry.bump_counter().await?;
        info!(repo = %repo, count, "trigger counter updated");
        Ok(Applied { repo, count })
    }
}
