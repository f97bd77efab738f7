//! Configuration loader and validator shared by the hook server and the mirror daemon.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_TRIGGER_KEY: &str = "00000trigger";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
///
/// Only `store` is mandatory; each process reads the sections it needs and the
/// rest fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub store: Store,
    #[serde(default)]
    pub ingest: Ingest,
    #[serde(default)]
    pub mirror: Mirror,
    #[serde(default)]
    pub notify: Notify,
    #[serde(default)]
    pub git: Git,
}

/// Registry table location and scan limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub database_url: String,
    pub table: String,
    #[serde(default = "default_trigger_key")]
    pub trigger_key: String,
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u32,
    #[serde(default = "default_scan_max_pages")]
    pub scan_max_pages: u32,
}

/// Hook server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingest {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for Ingest {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Mirror daemon settings: poll cadence and the fetch/remove commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mirror {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// `KEY=VALUE` pairs appended to the inherited environment of every command.
    #[serde(default)]
    pub envs: Vec<String>,
    #[serde(default = "default_root_env")]
    pub root_env: String,
    #[serde(default = "default_src_subdir")]
    pub src_subdir: String,
    #[serde(default)]
    pub go_binary_path: Option<String>,
    /// argv template, `{repo}` is substituted. Empty means `go get -u -d {repo}`.
    #[serde(default)]
    pub fetch_command: Vec<String>,
    /// argv template, `{path}` and `{repo}` are substituted. Empty means `rm -rf {path}`.
    #[serde(default)]
    pub remove_command: Vec<String>,
}

impl Default for Mirror {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            envs: Vec::new(),
            root_env: default_root_env(),
            src_subdir: default_src_subdir(),
            go_binary_path: None,
            fetch_command: Vec::new(),
            remove_command: Vec::new(),
        }
    }
}

/// Downstream consumer notification. `url` wins over `command` when both are set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notify {
    #[serde(default = "default_notify_command")]
    pub command: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for Notify {
    fn default() -> Self {
        Self {
            command: default_notify_command(),
            url: None,
        }
    }
}

/// Private git server credentials used to rewrite fetch URLs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Git {
    #[serde(default)]
    pub pat: String,
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_gitconfig_path")]
    pub gitconfig_path: String,
}

fn default_trigger_key() -> String {
    DEFAULT_TRIGGER_KEY.to_string()
}

fn default_scan_page_size() -> u32 {
    100
}

fn default_scan_max_pages() -> u32 {
    50
}

fn default_listen() -> String {
    "0.0.0.0:5050".to_string()
}

fn default_interval_seconds() -> u64 {
    20
}

fn default_root_env() -> String {
    "GOPATH".to_string()
}

fn default_src_subdir() -> String {
    "src".to_string()
}

fn default_notify_command() -> Vec<String> {
    ["sudo", "/bin/systemctl", "restart", "godocs.service"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_gitconfig_path() -> String {
    "/etc/gitconfig".to_string()
}

impl Config {
    /// Store URL, honouring a `DATABASE_URL` override from the environment.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.store.database_url.clone())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Table names are spliced into SQL, so only plain identifiers are accepted.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.store.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("store.database_url must be non-empty"));
    }
    if cfg.store.table.trim().is_empty() {
        return Err(ConfigError::Invalid("store.table must be non-empty"));
    }
    if !is_valid_table_name(&cfg.store.table) {
        return Err(ConfigError::Invalid(
            "store.table must contain only letters, digits and underscores",
        ));
    }
    if cfg.store.trigger_key.trim().is_empty() {
        return Err(ConfigError::Invalid("store.trigger_key must be non-empty"));
    }
    if cfg.store.scan_page_size == 0 {
        return Err(ConfigError::Invalid("store.scan_page_size must be > 0"));
    }
    if cfg.store.scan_max_pages == 0 {
        return Err(ConfigError::Invalid("store.scan_max_pages must be > 0"));
    }

    if cfg.ingest.listen.trim().is_empty() {
        return Err(ConfigError::Invalid("ingest.listen must be non-empty"));
    }

    if cfg.mirror.interval_seconds == 0 {
        return Err(ConfigError::Invalid("mirror.interval_seconds must be > 0"));
    }
    if cfg.mirror.root_env.trim().is_empty() {
        return Err(ConfigError::Invalid("mirror.root_env must be non-empty"));
    }
    if cfg.mirror.envs.iter().any(|e| !e.contains('=')) {
        return Err(ConfigError::Invalid("mirror.envs entries must be KEY=VALUE"));
    }

    if !cfg.git.pat.is_empty() && cfg.git.server.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "git.server must be non-empty when git.pat is set",
        ));
    }

    Ok(())
}

/// Returns a complete example configuration.
pub fn example() -> &'static str {
    r#"store:
  database_url: "sqlite://./data/registry.db"
  table: "repos"
  trigger_key: "00000trigger"
  scan_page_size: 100
  scan_max_pages: 50

ingest:
  listen: "0.0.0.0:5050"

mirror:
  interval_seconds: 20
  envs:
    - "GOPATH=/srv/go"
    - "GOFLAGS=-mod=mod"
  root_env: "GOPATH"
  src_subdir: "src"

notify:
  command: ["sudo", "/bin/systemctl", "restart", "godocs.service"]

git:
  pat: ""
  server: "github.example.com"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.store.trigger_key, "00000trigger");
        assert_eq!(cfg.mirror.envs.len(), 2);
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let yaml = "store:\n  database_url: \"sqlite::memory:\"\n  table: \"repos\"\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.store.trigger_key, DEFAULT_TRIGGER_KEY);
        assert_eq!(cfg.store.scan_max_pages, 50);
        assert_eq!(cfg.ingest.listen, "0.0.0.0:5050");
        assert_eq!(cfg.mirror.interval_seconds, 20);
        assert_eq!(cfg.mirror.root_env, "GOPATH");
        assert_eq!(cfg.notify.command[0], "sudo");
        assert_eq!(cfg.git.gitconfig_path, "/etc/gitconfig");
    }

    #[test]
    fn missing_table_is_rejected() {
        let yaml = "store:\n  database_url: \"sqlite::memory:\"\n  table: \"\"\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("store.table")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn table_name_must_be_identifier() {
        assert!(is_valid_table_name("repos"));
        assert!(is_valid_table_name("_mirror_2"));
        assert!(!is_valid_table_name("1repos"));
        assert!(!is_valid_table_name("repos; DROP TABLE x"));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.table = "bad-name".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_mirror_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.mirror.interval_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.mirror.envs = vec!["NOEQUALS".into()];
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("mirror.envs")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn pat_requires_server() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.git.pat = "token".into();
        cfg.git.server = "".into();
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("git.server")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.store.table, "repos");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
