use super::model::ScanPage;
use super::RegistryStore;
use crate::config::is_valid_table_name;
use crate::model::{Record, RepoRecord, TriggerRecord};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

const COLUMNS: &str = "repo, count, last_commit_id, last_commit_message, last_commit_user";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open registry database {}", normalized))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory pool. Every SQLite connection opened on
/// `sqlite::memory:` gets its own database, so the pool must never grow or recycle.
pub async fn memory_pool() -> Result<Pool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Rebuild URL, prefer sqlite:// form; create the file on first open.
    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

/// Create the registry table if it does not exist yet.
pub async fn run_migrations(pool: &Pool, table: &str) -> Result<()> {
    if !is_valid_table_name(table) {
        return Err(anyhow!("invalid registry table name '{}'", table));
    }
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            repo TEXT PRIMARY KEY NOT NULL,
            count INTEGER,
            last_commit_id TEXT,
            last_commit_message TEXT,
            last_commit_user TEXT
        )"
    );
    sqlx::query(&sql)
        .execute(pool)
        .await
        .with_context(|| format!("failed to create registry table {}", table))?;
    Ok(())
}

/// Registry table in SQLite. A row with a non-null `count` is a trigger row.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
    table: String,
}

impl SqliteStore {
    pub fn new(pool: Pool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(anyhow!("invalid registry table name '{}'", table));
        }
        Ok(Self { pool, table })
    }
}

fn row_to_record(row: &SqliteRow) -> Result<Record> {
    let key: String = row.try_get("repo")?;
    let count: Option<i64> = row.try_get("count")?;
    if let Some(count) = count {
        return Ok(Record::Trigger {
            key,
            trigger: TriggerRecord { count },
        });
    }
    let text = |col: &str| -> Result<String> {
        Ok(row.try_get::<Option<String>, _>(col)?.unwrap_or_default())
    };
    Ok(Record::Repo(RepoRecord {
        last_commit_id: text("last_commit_id")?,
        last_commit_message: text("last_commit_message")?,
        last_commit_user: text("last_commit_user")?,
        repo: key,
    }))
}

#[async_trait]
impl RegistryStore for SqliteStore {
    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<Record>> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE repo = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    #[instrument(skip_all)]
    async fn put(&self, record: &Record) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?)",
            self.table
        );
        let query = sqlx::query(&sql).bind(record.key());
        let query = match record {
            Record::Trigger { trigger, .. } => query
                .bind(Some(trigger.count))
                .bind::<Option<&str>>(None)
                .bind::<Option<&str>>(None)
                .bind::<Option<&str>>(None),
            Record::Repo(repo) => query
                .bind::<Option<i64>>(None)
                .bind(repo.last_commit_id.as_str())
                .bind(repo.last_commit_message.as_str())
                .bind(repo.last_commit_user.as_str()),
        };
        query.execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete(&self, key: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE repo = ?", self.table);
        sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn scan(&self, after: Option<&str>, limit: u32) -> Result<ScanPage> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE (?1 IS NULL OR repo > ?1) ORDER BY repo ASC LIMIT ?2",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(after)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        let last_key = if records.len() as u32 == limit {
            records.last().map(|r| r.key().to_string())
        } else {
            None
        };
        Ok(ScanPage { records, last_key })
    }

    #[instrument(skip_all)]
    async fn increment_count(&self, key: &str) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {} (repo, count) VALUES (?, 1) \
             ON CONFLICT(repo) DO UPDATE SET count = COALESCE(count, 0) + 1 \
             RETURNING count",
            self.table
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
