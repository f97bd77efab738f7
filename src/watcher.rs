use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registry::Registry;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged { count: i64 },
    Reconciled { count: i64, report: ReconcileReport },
}

/// Polls the trigger counter and reconciles whenever it moved.
pub struct Watcher {
    registry: Arc<Registry>,
    reconciler: Reconciler,
    observed: i64,
    interval: Duration,
}

impl Watcher {
    pub fn new(registry: Arc<Registry>, reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            registry,
            reconciler,
            observed: 0,
            interval,
        }
    }

    pub fn observed(&self) -> i64 {
        self.observed
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// One poll. The observed value only advances after a successful pass,
    /// and to the value read before reconciling, so a bump that lands during
    /// the pass triggers another one.
    #[instrument(skip_all)]
    pub async fn poll_once(&mut self) -> Result<PollOutcome> {
        let count = self
            .registry
            .read_counter()
            .await
            .context("failed to read trigger counter")?;
        if count == self.observed {
            info!(count, "nothing to do");
            return Ok(PollOutcome::Unchanged { count });
        }
        info!(observed = self.observed, count, "trigger counter changed");
        let report = self
            .reconciler
            .reconcile()
            .await
            .context("reconciliation failed")?;
        self.observed = count;
        info!(count, "set new local counter");
        Ok(PollOutcome::Reconciled { count, report })
    }

    /// Poll forever; only a counter read or reconciliation failure returns.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.poll_once().await?;
            info!(secs = self.interval.as_secs(), "sleeping before checking for updates");
            tokio::time::sleep(self.interval).await;
        }
    }
}
