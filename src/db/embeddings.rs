//! Embedding artifact queries and the similarity-search primitive.
//!
//! Vectors are stored as little-endian f32 BLOBs keyed by
//! `(memory_id, model_name)`. Owner scoping always goes through
//! `memory_events`.

use std::collections::BTreeMap;

use chronicle_models::{format_timestamp, parse_timestamp, EmbeddingArtifact, SimilarityMatch};
use sqlx::FromRow;

use super::DbPool;
use crate::{Error, Result};

#[derive(Debug, Clone, FromRow)]
struct EmbeddingRow {
    memory_id: String,
    model_name: String,
    model_version: String,
    dimension: i64,
    vector: Vec<u8>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EmbeddingRow> for EmbeddingArtifact {
    type Error = Error;

    fn try_from(row: EmbeddingRow) -> Result<Self> {
        let bad_ts = || Error::Internal(format!("Corrupt timestamp on embedding {}", row.memory_id));
        Ok(EmbeddingArtifact {
            created_at: parse_timestamp(&row.created_at).ok_or_else(bad_ts)?,
            updated_at: parse_timestamp(&row.updated_at).ok_or_else(bad_ts)?,
            vector: blob_to_vector(&row.vector),
            dimension: row.dimension as usize,
            memory_id: row.memory_id,
            model_name: row.model_name,
            model_version: row.model_version,
        })
    }
}

pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Dimension fixed by the first vector stored for `model_name`.
pub async fn model_dimension(pool: &DbPool, model_name: &str) -> Result<Option<usize>> {
    let dim: Option<(i64,)> =
        sqlx::query_as("SELECT dimension FROM memory_embeddings WHERE model_name = ? LIMIT 1")
            .bind(model_name)
            .fetch_optional(pool)
            .await?;

    Ok(dim.map(|(d,)| d as usize))
}

/// Insert or replace the embedding for `(memory_id, model_name)`.
///
/// `created_at` survives replacement. Rejects a vector whose length differs
/// from its declared dimension or from the model's established dimension.
pub async fn upsert_embedding(pool: &DbPool, artifact: &EmbeddingArtifact) -> Result<()> {
    if artifact.vector.len() != artifact.dimension {
        return Err(Error::Validation(format!(
            "Vector has {} components but dimension is {}",
            artifact.vector.len(),
            artifact.dimension
        )));
    }

    if let Some(existing) = model_dimension(pool, &artifact.model_name).await? {
        if existing != artifact.dimension {
            return Err(Error::Validation(format!(
                "Model {} stores {}-dimensional vectors, got {}",
                artifact.model_name, existing, artifact.dimension
            )));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO memory_embeddings (
            memory_id, model_name, model_version, dimension, vector, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(memory_id, model_name) DO UPDATE SET
            model_version = excluded.model_version,
            dimension = excluded.dimension,
            vector = excluded.vector,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&artifact.memory_id)
    .bind(&artifact.model_name)
    .bind(&artifact.model_version)
    .bind(artifact.dimension as i64)
    .bind(vector_to_blob(&artifact.vector))
    .bind(format_timestamp(&artifact.created_at))
    .bind(format_timestamp(&artifact.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_embedding(
    pool: &DbPool,
    owner_id: &str,
    memory_id: &str,
    model_name: &str,
) -> Result<Option<EmbeddingArtifact>> {
    sqlx::query_as::<_, EmbeddingRow>(
        r#"
        SELECT m.* FROM memory_embeddings m
        JOIN memory_events e ON e.id = m.memory_id
        WHERE e.owner_id = ? AND m.memory_id = ? AND m.model_name = ?
        "#,
    )
    .bind(owner_id)
    .bind(memory_id)
    .bind(model_name)
    .fetch_optional(pool)
    .await?
    .map(EmbeddingArtifact::try_from)
    .transpose()
}

/// Nearest neighbours of `query` among an owner's vectors for one model.
///
/// Brute-force cosine scan. Hits below `threshold` are dropped; the rest are
/// returned best first (ties by id), at most `count`.
pub async fn search_by_embedding(
    pool: &DbPool,
    owner_id: &str,
    query: &[f32],
    model_name: &str,
    threshold: f32,
    count: usize,
) -> Result<Vec<SimilarityMatch>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
        r#"
        SELECT m.memory_id, m.vector FROM memory_embeddings m
        JOIN memory_events e ON e.id = m.memory_id
        WHERE e.owner_id = ? AND m.model_name = ?
        "#,
    )
    .bind(owner_id)
    .bind(model_name)
    .fetch_all(pool)
    .await?;

    let mut matches: Vec<SimilarityMatch> = rows
        .into_iter()
        .map(|(memory_id, blob)| SimilarityMatch {
            similarity: cosine_similarity(query, &blob_to_vector(&blob)),
            memory_id,
        })
        .filter(|m| m.similarity >= threshold)
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.memory_id.cmp(&b.memory_id))
    });
    matches.truncate(count);

    Ok(matches)
}

/// Events of an owner that have no embedding under `model_name`, oldest first.
pub async fn list_ids_missing_embedding(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
) -> Result<Vec<String>> {
    let ids: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT e.id FROM memory_events e
        LEFT JOIN memory_embeddings m ON m.memory_id = e.id AND m.model_name = ?
        WHERE e.owner_id = ? AND m.memory_id IS NULL
        ORDER BY e.timestamp ASC, e.rowid ASC
        "#,
    )
    .bind(model_name)
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Drop an owner's embeddings for one model. Returns rows removed.
pub async fn delete_embeddings_by_model(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM memory_embeddings
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

pub async fn count_embeddings_by_model(
    pool: &DbPool,
    owner_id: &str,
) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT m.model_name, COUNT(*) FROM memory_embeddings m
        JOIN memory_events e ON e.id = m.memory_id
        WHERE e.owner_id = ?
        GROUP BY m.model_name
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
