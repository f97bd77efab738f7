use serde::{Deserialize, Serialize};

/// Registry row describing one tracked repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoRecord {
    pub repo: String,
    pub last_commit_id: String,
    pub last_commit_message: String,
    pub last_commit_user: String,
}

/// The reserved row holding the change counter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRecord {
    pub count: i64,
}

/// Anything stored under a registry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Trigger { key: String, trigger: TriggerRecord },
    Repo(RepoRecord),
}

impl Record {
    pub fn key(&self) -> &str {
        match self {
            Record::Trigger { key, .. } => key,
            Record::Repo(repo) => &repo.repo,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Delete => "delete",
        }
    }
}

/// Subset of a GitHub push webhook payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushEvent {
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub repository: Repository,
    /// `null` for branch deletions.
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    #[serde(default)]
    pub svn_url: String,
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub git_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadCommit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Author,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
}
