//! Local mirror operations, one external process per repository.
use crate::config;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("{var} is not set; unable to determine the mirror root")]
    MissingRoot { var: String },
    #[error("refusing to touch unsafe repository path '{0}'")]
    UnsafeRepo(String),
    #[error("command template is empty")]
    EmptyCommand,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: ExitStatus,
        output: String,
    },
}

/// Captured output of a successful mirror command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait MirrorExecutor: Send + Sync {
    /// Fetch or update a repository. Re-fetching an unchanged repository is a no-op.
    async fn fetch(&self, repo: &str) -> Result<MirrorOutput, MirrorError>;

    /// Root under which mirrors live; deletes are never attempted without it.
    fn resolve_root(&self) -> Result<PathBuf, MirrorError>;

    async fn remove(&self, root: &Path, repo: &str) -> Result<MirrorOutput, MirrorError>;
}

/// Runs configurable argv templates through `tokio::process`.
#[derive(Debug, Clone)]
pub struct CommandMirror {
    fetch_command: Vec<String>,
    remove_command: Vec<String>,
    envs: Vec<(String, String)>,
    root_env: String,
    src_subdir: String,
}

impl CommandMirror {
    pub fn from_config(cfg: &config::Mirror) -> Self {
        let fetch_command = if cfg.fetch_command.is_empty() {
            let go = cfg
                .go_binary_path
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| "go".to_string());
            vec![go, "get".into(), "-u".into(), "-d".into(), "{repo}".into()]
        } else {
            cfg.fetch_command.clone()
        };
        let remove_command = if cfg.remove_command.is_empty() {
            vec!["rm".into(), "-rf".into(), "{path}".into()]
        } else {
            cfg.remove_command.clone()
        };
        Self {
            fetch_command,
            remove_command,
            envs: parse_envs(&cfg.envs),
            root_env: cfg.root_env.clone(),
            src_subdir: cfg.src_subdir.clone(),
        }
    }

    /// `<root>/<src_subdir>/<repo>`, refusing names that would leave the root.
    pub fn mirror_path(&self, root: &Path, repo: &str) -> Result<PathBuf, MirrorError> {
        let rel = Path::new(repo);
        let safe = !repo.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MirrorError::UnsafeRepo(repo.to_string()));
        }
        let mut path = root.to_path_buf();
        if !self.src_subdir.is_empty() {
            path.push(&self.src_subdir);
        }
        Ok(path.join(rel))
    }
}

#[async_trait]
impl MirrorExecutor for CommandMirror {
    async fn fetch(&self, repo: &str) -> Result<MirrorOutput, MirrorError> {
        let argv = render(&self.fetch_command, repo, None);
        run(argv, &self.envs).await
    }

    fn resolve_root(&self) -> Result<PathBuf, MirrorError> {
        // Configured overrides win over the inherited environment; the last
        // matching override wins among overrides.
        let from_overrides = self
            .envs
            .iter()
            .rev()
            .find(|(k, _)| *k == self.root_env)
            .map(|(_, v)| v.clone());
        from_overrides
            .or_else(|| std::env::var(&self.root_env).ok())
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| MirrorError::MissingRoot {
                var: self.root_env.clone(),
            })
    }

    async fn remove(&self, root: &Path, repo: &str) -> Result<MirrorOutput, MirrorError> {
        let path = self.mirror_path(root, repo)?;
        let argv = render(&self.remove_command, repo, Some(&path));
        run(argv, &self.envs).await
    }
}

/// Split `KEY=VALUE` entries; entries without `=` are skipped.
pub fn parse_envs(entries: &[String]) -> Vec<(String, String)> {
    entries
        .iter()
        .filter_map(|e| e.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn render(template: &[String], repo: &str, path: Option<&Path>) -> Vec<String> {
    let path = path.map(|p| p.to_string_lossy().into_owned());
    template
        .iter()
        .map(|arg| {
            let arg = arg.replace("{repo}", repo);
            match &path {
                Some(p) => arg.replace("{path}", p),
                None => arg,
            }
        })
        .collect()
}

pub(crate) async fn run(
    argv: Vec<String>,
    envs: &[(String, String)],
) -> Result<MirrorOutput, MirrorError> {
    let (program, args) = argv.split_first().ok_or(MirrorError::EmptyCommand)?;
    debug!(program = %program, ?args, "running command");
    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MirrorError::Spawn {
            program: program.clone(),
            source,
        })?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        let combined = format!("{}{}", stdout, stderr).trim().to_string();
        return Err(MirrorError::Failed {
            program: program.clone(),
            status: output.status,
            output: combined,
        });
    }
    Ok(MirrorOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mirror_with(fetch: &[&str], remove: &[&str], envs: &[&str]) -> CommandMirror {
        let cfg = config::Mirror {
            fetch_command: fetch.iter().map(|s| s.to_string()).collect(),
            remove_command: remove.iter().map(|s| s.to_string()).collect(),
            envs: envs.iter().map(|s| s.to_string()).collect(),
            root_env: "HOOKMIRROR_TEST_ROOT".into(),
            ..Default::default()
        };
        CommandMirror::from_config(&cfg)
    }

    #[test]
    fn default_commands_follow_go_get() {
        let m = CommandMirror::from_config(&config::Mirror::default());
        assert_eq!(m.fetch_command, vec!["go", "get", "-u", "-d", "{repo}"]);
        assert_eq!(m.remove_command, vec!["rm", "-rf", "{path}"]);

        let cfg = config::Mirror {
            go_binary_path: Some("/usr/local/go/bin/go".into()),
            ..Default::default()
        };
        let m = CommandMirror::from_config(&cfg);
        assert_eq!(m.fetch_command[0], "/usr/local/go/bin/go");
    }

    #[test]
    fn root_comes_from_overrides_last_wins() {
        let m = mirror_with(
            &[],
            &[],
            &["HOOKMIRROR_TEST_ROOT=/first", "OTHER=x", "HOOKMIRROR_TEST_ROOT=/srv/go"],
        );
        assert_eq!(m.resolve_root().unwrap(), PathBuf::from("/srv/go"));
    }

    #[test]
    fn missing_root_is_reported() {
        let m = mirror_with(&[], &[], &["OTHER=x"]);
        match m.resolve_root() {
            Err(MirrorError::MissingRoot { var }) => assert_eq!(var, "HOOKMIRROR_TEST_ROOT"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn mirror_path_stays_under_root() {
        let m = mirror_with(&[], &[], &[]);
        let root = Path::new("/srv/go");
        assert_eq!(
            m.mirror_path(root, "host/org/a").unwrap(),
            PathBuf::from("/srv/go/src/host/org/a")
        );
        assert!(m.mirror_path(root, "../etc").is_err());
        assert!(m.mirror_path(root, "/etc").is_err());
        assert!(m.mirror_path(root, "").is_err());
    }

    #[tokio::test]
    async fn fetch_runs_template_with_env_overrides() {
        let m = mirror_with(&["sh", "-c", "echo {repo} $MIRROR_FLAG"], &[], &["MIRROR_FLAG=on"]);
        let out = m.fetch("host/org/a").await.unwrap();
        assert_eq!(out.stdout.trim(), "host/org/a on");
    }

    #[tokio::test]
    async fn failing_command_carries_output() {
        let m = mirror_with(&["sh", "-c", "echo boom >&2; exit 3"], &[], &[]);
        match m.fetch("host/org/a").await {
            Err(MirrorError::Failed { output, status, .. }) => {
                assert_eq!(output, "boom");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let m = mirror_with(&["/definitely/not/a/binary"], &[], &[]);
        assert!(matches!(
            m.fetch("host/org/a").await,
            Err(MirrorError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn remove_deletes_the_mirror_directory() {
        let td = tempdir().unwrap();
        let m = mirror_with(&[], &[], &[]);
        let target = td.path().join("src").join("host").join("org").join("a");
        std::fs::create_dir_all(target.join("pkg")).unwrap();
        std::fs::write(target.join("pkg").join("x.go"), "package pkg").unwrap();

        m.remove(td.path(), "host/org/a").await.unwrap();
        assert!(!target.exists());
        assert!(td.path().join("src").join("host").join("org").exists());
    }
}
