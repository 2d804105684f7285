//! SQLite pool setup.
//!
//! File databases run in WAL mode with a small connection pool so readers do
//! not block the single writer. `:memory:` databases live and die with their
//! connection, so they get exactly one that is never recycled.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::DbPool;
use crate::Result;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Idle connections are closed after this long; `None` keeps them forever.
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Page cache per connection, in KiB.
    pub cache_kib: u32,
}

impl PoolConfig {
    pub fn file() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            busy_timeout: Duration::from_secs(30),
            cache_kib: 32 * 1024,
        }
    }

    pub fn memory() -> Self {
        Self {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
            busy_timeout: Duration::from_secs(5),
            cache_kib: 8 * 1024,
        }
    }

    /// Pick the configuration that suits `path`.
    pub fn for_path(path: &str) -> Self {
        if is_memory(path) {
            Self::memory()
        } else {
            Self::file()
        }
    }

    fn connect_options(&self, path: &str) -> Result<SqliteConnectOptions> {
        let journal = if is_memory(path) {
            SqliteJournalMode::Memory
        } else {
            SqliteJournalMode::Wal
        };

        Ok(SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(journal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true)
            .pragma("cache_size", format!("-{}", self.cache_kib))
            .pragma("temp_store", "memory"))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .test_before_acquire(self.max_connections > 1)
    }

    /// Open a pool on `path`, creating the database file and its directory.
    pub async fn connect(&self, path: &str) -> Result<DbPool> {
        if !is_memory(path) {
            let file = path.strip_prefix("sqlite:").unwrap_or(path);
            match Path::new(file).parent() {
                Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir).await?,
                _ => {}
            }
        }

        let options = self.connect_options(path)?;
        Ok(self.pool_options().connect_with(options).await?)
    }
}

/// True for `:memory:` and the `sqlite::memory:` URL form.
pub fn is_memory(path: &str) -> bool {
    path.contains(":memory:") || path.contains("mode=memory")
}

/// Round-trip a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
