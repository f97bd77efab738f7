//! Registry storage: the key-value capability and its SQLite implementation.
//!
//! - `model`: page type returned by scans.
//! - `repo`: SQL-only functions plus [`SqliteStore`], which maps rows into
//!   [`Record`]s.
//!
//! Callers normally go through [`crate::registry::Registry`], which adds
//! trigger-key filtering and the counter protocol on top of this trait.

use crate::model::Record;
use anyhow::Result;
use async_trait::async_trait;

pub mod model;
pub mod repo;

pub use model::ScanPage;
pub use repo::*;

/// Persisted key-value table keyed by repository identifier.
///
/// Implementations surface every store failure as an error and never retry.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Full overwrite of whatever is stored under `record.key()`.
    async fn put(&self, record: &Record) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Return up to `limit` records with keys strictly greater than `after`,
    /// in key order.
    async fn scan(&self, after: Option<&str>, limit: u32) -> Result<ScanPage>;

    /// Atomically add one to the counter under `key`, creating it at 1 when
    /// absent. Returns the value stored.
    async fn increment_count(&self, key: &str) -> Result<i64>;
}
