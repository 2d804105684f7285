//! Database layer for Chronicle.
//!
//! Provides SQLite connection pooling and query modules for the event
//! log and its derived artifacts.

mod analyses;
mod embeddings;
mod events;
mod leases;
pub mod pool;
mod summaries;

pub use analyses::*;
pub use embeddings::*;
pub use events::*;
pub use leases::*;
pub use summaries::*;

use crate::Result;
use pool::PoolConfig;
use sqlx::Executor;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

const SCHEMA: &str = include_str!("../../schema.sql");

/// Open the pool for `path` and log where it points.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    let pool = PoolConfig::for_path(path).connect(path).await?;
    info!(path, "Database pool initialized");
    Ok(pool)
}

/// Apply schema.sql, including the triggers that make `memory_events`
/// append-only. Every statement is `IF NOT EXISTS`, so reruns are no-ops.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    info!("Initializing database schema");
    pool.execute(SCHEMA).await?;
    info!("Database schema initialized successfully");
    Ok(())
}

/// Open an in-memory database with the schema applied.
pub async fn init_memory() -> Result<DbPool> {
    let pool = init_pool(":memory:").await?;
    initialize_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_initialization() {
        let pool = init_memory().await.unwrap();
        // Second run is a no-op
        initialize_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            table_names,
            vec![
                "memory_analyses",
                "memory_embeddings",
                "memory_events",
                "migration_leases",
                "period_summaries",
            ]
        );

        let triggers: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='trigger' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(triggers.len(), 2);
    }

    #[tokio::test]
    async fn test_schema_applies_to_file_database() {
        let dir = std::env::temp_dir().join(format!("chronicle-{}", chronicle_models::new_id()));
        let path = dir.join("nested").join("chronicle.db");
        let path = path.to_str().unwrap();

        let pool = init_pool(path).await.unwrap();
        initialize_schema(&pool).await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let (tables, triggers): (i64, i64) = sqlx::query_as(
            "SELECT SUM(type = 'table' AND name NOT LIKE 'sqlite_%'), SUM(type = 'trigger') FROM sqlite_master",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 5);
        assert_eq!(triggers, 2);

        pool.close().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
