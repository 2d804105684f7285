//! Analysis artifact queries.
//!
//! List-valued fields are stored as JSON text.

use std::collections::BTreeMap;

use chronicle_models::{format_timestamp, parse_timestamp, AnalysisArtifact};
use sqlx::FromRow;

use super::DbPool;
use crate::{Error, Result};

#[derive(Debug, Clone, FromRow)]
struct AnalysisRow {
    memory_id: String,
    model_name: String,
    model_version: String,
    summary: String,
    key_points: String,     // JSON array
    entities: String,       // JSON array
    sentiment: String,      // JSON object
    importance_score: f64,
    relevance_tags: String, // JSON array
    action_items: String,   // JSON array
    created_at: String,
    updated_at: String,
}

impl TryFrom<AnalysisRow> for AnalysisArtifact {
    type Error = Error;

    fn try_from(row: AnalysisRow) -> Result<Self> {
        let bad_ts = || Error::Internal(format!("Corrupt timestamp on analysis {}", row.memory_id));
        Ok(AnalysisArtifact {
            key_points: serde_json::from_str(&row.key_points)?,
            entities: serde_json::from_str(&row.entities)?,
            sentiment: serde_json::from_str(&row.sentiment)?,
            relevance_tags: serde_json::from_str(&row.relevance_tags)?,
            action_items: serde_json::from_str(&row.action_items)?,
            created_at: parse_timestamp(&row.created_at).ok_or_else(bad_ts)?,
            updated_at: parse_timestamp(&row.updated_at).ok_or_else(bad_ts)?,
            importance_score: row.importance_score,
            memory_id: row.memory_id,
            model_name: row.model_name,
            model_version: row.model_version,
            summary: row.summary,
        })
    }
}

/// Insert or replace the analysis for `(memory_id, model_name)`.
pub async fn upsert_analysis(pool: &DbPool, artifact: &AnalysisArtifact) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO memory_analyses (
            memory_id, model_name, model_version, summary, key_points, entities,
            sentiment, importance_score, relevance_tags, action_items, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(memory_id, model_name) DO UPDATE SET
            model_version = excluded.model_version,
            summary = excluded.summary,
            key_points = excluded.key_points,
            entities = excluded.entities,
            sentiment = excluded.sentiment,
            importance_score = excluded.importance_score,
            relevance_tags = excluded.relevance_tags,
            action_items = excluded.action_items,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&artifact.memory_id)
    .bind(&artifact.model_name)
    .bind(&artifact.model_version)
    .bind(&artifact.summary)
    .bind(serde_json::to_string(&artifact.key_points)?)
    .bind(serde_json::to_string(&artifact.entities)?)
    .bind(serde_json::to_string(&artifact.sentiment)?)
    .bind(artifact.importance_score)
    .bind(serde_json::to_string(&artifact.relevance_tags)?)
    .bind(serde_json::to_string(&artifact.action_items)?)
    .bind(format_timestamp(&artifact.created_at))
    .bind(format_timestamp(&artifact.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_analysis(
    pool: &DbPool,
    owner_id: &str,
    memory_id: &str,
    model_name: &str,
) -> Result<Option<AnalysisArtifact>> {
    sqlx::query_as::<_, AnalysisRow>(
        r#"
        SELECT a.* FROM memory_analyses a
        JOIN memory_events e ON e.id = a.memory_id
        WHERE e.owner_id = ? AND a.memory_id = ? AND a.model_name = ?
        "#,
    )
    .bind(owner_id)
    .bind(memory_id)
    .bind(model_name)
    .fetch_optional(pool)
    .await?
    .map(AnalysisArtifact::try_from)
    .transpose()
}

/// Analyses of the given events under one model, keyed by memory id.
pub async fn get_analyses_for_ids(
    pool: &DbPool,
    owner_id: &str,
    memory_ids: &[String],
    model_name: &str,
) -> Result<BTreeMap<String, AnalysisArtifact>> {
    if memory_ids.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
        "SELECT a.* FROM memory_analyses a JOIN memory_events e ON e.id = a.memory_id WHERE e.owner_id = ",
    );
    qb.push_bind(owner_id)
        .push(" AND a.model_name = ")
        .push_bind(model_name)
        .push(" AND a.memory_id IN (SELECT value FROM json_each(")
        .push_bind(super::events::id_list(memory_ids))
        .push("))");

    let rows = qb.build_query_as::<AnalysisRow>().fetch_all(pool).await?;

    rows.into_iter()
        .map(|row| {
            let artifact = AnalysisArtifact::try_from(row)?;
            Ok((artifact.memory_id.clone(), artifact))
        })
        .collect()
}

/// Events of an owner without an analysis under `model_name`, oldest first.
pub async fn list_ids_missing_analysis(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
) -> Result<Vec<String>> {
    let ids: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT e.id FROM memory_events e
        LEFT JOIN memory_analyses a ON a.memory_id = e.id AND a.model_name = ?
        WHERE e.owner_id = ? AND a.memory_id IS NULL
        ORDER BY e.timestamp ASC, e.rowid ASC
        "#,
    )
    .bind(model_name)
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn delete_analyses_by_model(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM memory_analyses
        WHERE model_name = ?
          AND memory_id IN (SELECT id FROM memory_events WHERE owner_id = ?)
        "#,
    )
    .bind(model_name)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_analyses_by_model(
    pool: &DbPool,
    owner_id: &str,
) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT a.model_name, COUNT(*) FROM memory_analyses a
        JOIN memory_events e ON e.id = a.memory_id
        WHERE e.owner_id = ?
        GROUP BY a.model_name
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
