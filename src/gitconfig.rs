//! Rewrites git server URLs so fetches authenticate with a personal access token.
use crate::config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// gitconfig body mapping `http(s)://<pat>@<server>` in place of the bare server URLs.
pub fn render(pat: &str, server: &str) -> String {
    let lines = [
        format!(r#"[url "https://{}@{}"]"#, pat, server),
        format!("        insteadOf = https://{}", server),
        format!(r#"[url "http://{}@{}"]"#, pat, server),
        format!("        insteadOf = http://{}", server),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Write the rewrite when a token is configured. Returns whether a file was written.
pub async fn install(cfg: &config::Git) -> Result<bool> {
    if cfg.pat.is_empty() {
        return Ok(false);
    }
    info!(
        server = %cfg.server,
        pat_len = cfg.pat.len(),
        path = %cfg.gitconfig_path,
        "setting up token for git server"
    );
    let path = Path::new(&cfg.gitconfig_path);
    tokio::fs::write(path, render(&cfg.pat, &cfg.server))
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn renders_both_schemes() {
        let body = render("tok", "github.example.com");
        assert_eq!(
            body,
            "[url \"https://tok@github.example.com\"]\n        insteadOf = https://github.example.com\n[url \"http://tok@github.example.com\"]\n        insteadOf = http://github.example.com\n"
        );
    }

    #[tokio::test]
    async fn skipped_without_token() {
        let td = tempdir().unwrap();
        let path = td.path().join("gitconfig");
        let cfg = config::Git {
            pat: String::new(),
            server: "github.example.com".into(),
            gitconfig_path: path.to_string_lossy().into_owned(),
        };
        assert!(!install(&cfg).await.unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn writes_file_with_token() {
        let td = tempdir().unwrap();
        let path = td.path().join("gitconfig");
        let cfg = config::Git {
            pat: "tok".into(),
            server: "github.example.com".into(),
            gitconfig_path: path.to_string_lossy().into_owned(),
        };
        assert!(install(&cfg).await.unwrap());
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("insteadOf = https://github.example.com"));
    }
}
