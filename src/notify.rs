//! Best-effort signal to the process that serves the mirrors.
use crate::config;
use crate::mirror;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait ServiceNotifier: Send + Sync {
    async fn notify(&self) -> Result<()>;
}

/// Runs a fixed command, e.g. `systemctl restart` of the docs server.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    argv: Vec<String>,
}

impl CommandNotifier {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl ServiceNotifier for CommandNotifier {
    async fn notify(&self) -> Result<()> {
        mirror::run(self.argv.clone(), &[]).await?;
        Ok(())
    }
}

/// POSTs an empty body to a URL and expects a 2xx.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    http: Client,
    url: Url,
}

impl HttpNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid notify url '{}'", url))?;
        let http = Client::builder()
            .user_agent("hookmirror/0.1")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl ServiceNotifier for HttpNotifier {
    async fn notify(&self) -> Result<()> {
        let res = self
            .http
            .post(self.url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.url))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("notify endpoint returned {}: {}", status, body));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ServiceNotifier for NoopNotifier {
    async fn notify(&self) -> Result<()> {
        Ok(())
    }
}

pub fn from_config(cfg: &config::Notify) -> Result<Arc<dyn ServiceNotifier>> {
    if let Some(url) = cfg.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Ok(Arc::new(HttpNotifier::new(url)?));
    }
    if cfg.command.is_empty() {
        return Ok(Arc::new(NoopNotifier));
    }
    Ok(Arc::new(CommandNotifier::new(cfg.command.clone())))
}

/// Notify and swallow the outcome; a failed notification never fails the caller.
pub async fn notify_best_effort(notifier: &dyn ServiceNotifier) {
    match notifier.notify().await {
        Ok(()) => info!("notified dependent service"),
        Err(err) => warn!(?err, "failed to notify dependent service; ignoring"),
    }
}
