//! Artifact Routes
//!
//! Embeddings, analyses and model migrations.
//!
//! Routes:
//! - POST /artifacts/embeddings/:memory_id - Embed one event under the current model
//! - POST /artifacts/analyses/:memory_id - Analyse one event under the current model
//! - POST /artifacts/similar - Semantic search by text
//! - GET /artifacts/similar/:memory_id - Events similar to an embedded event
//! - POST /artifacts/embeddings/backfill - Embed events missing a current-model vector
//! - POST /artifacts/analyses/backfill - Analyse events missing a current-model analysis
//! - POST /artifacts/embeddings/migrate - Re-embed every event under another model
//! - POST /artifacts/analyses/migrate - Re-analyse every event under another model
//! - DELETE /artifacts/embeddings/models/:model - Drop one model's embeddings
//! - DELETE /artifacts/analyses/models/:model - Drop one model's analyses
//! - GET /artifacts/embeddings/statistics - Embedding counts per model
//! - GET /artifacts/analyses/statistics - Analysis counts per model

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chronicle_models::{
    AnalysisArtifact, ArtifactStatistics, BatchOutcome, EmbeddingArtifact, MemoryEvent,
    SimilarityMatch,
};
use serde::{Deserialize, Serialize};

use crate::middleware::OwnerContext;
use crate::services::{AnalysisModel, EmbeddingModel, MigrationOptions, SimilarityOptions};
use crate::{AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/embeddings/backfill", post(backfill_embeddings))
        .route("/embeddings/migrate", post(migrate_embeddings))
        .route("/embeddings/statistics", get(embedding_statistics))
        .route("/embeddings/models/:model", delete(delete_embeddings))
        .route("/embeddings/:memory_id", post(embed_event))
        .route("/analyses/backfill", post(backfill_analyses))
        .route("/analyses/migrate", post(migrate_analyses))
        .route("/analyses/statistics", get(analysis_statistics))
        .route("/analyses/models/:model", delete(delete_analyses))
        .route("/analyses/:memory_id", post(analyze_event))
        .route("/similar", post(semantic_search))
        .route("/similar/:memory_id", get(find_similar))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SemanticSearchRequest {
    pub text: String,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

fn similarity_options(limit: Option<usize>, threshold: Option<f32>) -> SimilarityOptions {
    let defaults = SimilarityOptions::default();
    SimilarityOptions {
        limit: limit.unwrap_or(defaults.limit).clamp(1, 100),
        threshold: threshold.unwrap_or(defaults.threshold),
    }
}

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub matches: Vec<SimilarityMatch>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BackfillRequest {
    pub batch_size: Option<usize>,
}

/// Target model for a migration. Uses the configured provider's endpoint and key.
#[derive(Debug, Deserialize)]
pub struct MigrateRequest {
    pub model: String,
    pub version: String,
    /// Embedding migrations only.
    pub dimension: Option<usize>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

async fn load_event(state: &AppState, owner_id: &str, memory_id: &str) -> Result<MemoryEvent> {
    state
        .events
        .get_by_id(owner_id, memory_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Event not found: {}", memory_id)))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /artifacts/embeddings/:memory_id
async fn embed_event(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(memory_id): Path<String>,
) -> Result<Json<EmbeddingArtifact>> {
    let event = load_event(&state, &owner.owner_id, &memory_id).await?;
    let artifact = state.artifacts.embed(&owner.owner_id, &event).await?;
    Ok(Json(artifact))
}

/// POST /artifacts/analyses/:memory_id
async fn analyze_event(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(memory_id): Path<String>,
) -> Result<Json<AnalysisArtifact>> {
    let event = load_event(&state, &owner.owner_id, &memory_id).await?;
    let artifact = state.artifacts.analyze(&owner.owner_id, &event).await?;
    Ok(Json(artifact))
}

/// POST /artifacts/similar
async fn semantic_search(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<SemanticSearchRequest>,
) -> Result<Json<SimilarResponse>> {
    let options = similarity_options(request.limit, request.threshold);
    let matches = state
        .artifacts
        .semantic_search(&owner.owner_id, &request.text, options)
        .await?;
    Ok(Json(SimilarResponse { matches }))
}

/// GET /artifacts/similar/:memory_id
async fn find_similar(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(memory_id): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<SimilarResponse>> {
    let options = similarity_options(query.limit, query.threshold);
    let matches = state
        .artifacts
        .find_similar(&owner.owner_id, &memory_id, options)
        .await?;
    Ok(Json(SimilarResponse { matches }))
}

/// POST /artifacts/embeddings/backfill
async fn backfill_embeddings(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<BackfillRequest>,
) -> Result<Json<BatchOutcome>> {
    let options = MigrationOptions {
        batch_size: request.batch_size,
        on_progress: None,
    };
    let outcome = state.artifacts.backfill_embeddings(&owner.owner_id, options).await?;
    Ok(Json(outcome))
}

/// POST /artifacts/analyses/backfill
async fn backfill_analyses(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<BackfillRequest>,
) -> Result<Json<BatchOutcome>> {
    let options = MigrationOptions {
        batch_size: request.batch_size,
        on_progress: None,
    };
    let outcome = state.artifacts.backfill_analyses(&owner.owner_id, options).await?;
    Ok(Json(outcome))
}

/// POST /artifacts/embeddings/migrate
async fn migrate_embeddings(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<BatchOutcome>> {
    let current = &state.artifacts.embedding_model().service;
    if !current.has_providers() {
        return Err(Error::Validation(format!(
            "Cannot migrate to {}: no embedding provider is configured",
            request.model
        )));
    }
    let service = current.with_model(&request.model, request.dimension)?;
    let target = EmbeddingModel::from_service(service, request.version);

    let options = MigrationOptions {
        batch_size: request.batch_size,
        on_progress: None,
    };
    let outcome = state
        .artifacts
        .migrate_embeddings(&owner.owner_id, &target, options)
        .await?;
    Ok(Json(outcome))
}

/// POST /artifacts/analyses/migrate
async fn migrate_analyses(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<BatchOutcome>> {
    let llm = state.artifacts.analysis_model().llm.with_model(&request.model)?;
    if llm.model_name().is_none() {
        return Err(Error::Validation(format!(
            "Cannot migrate to {}: no completion provider is configured",
            request.model
        )));
    }
    let target = AnalysisModel::new(request.model, request.version, llm);

    let options = MigrationOptions {
        batch_size: request.batch_size,
        on_progress: None,
    };
    let outcome = state
        .artifacts
        .migrate_analyses(&owner.owner_id, &target, options)
        .await?;
    Ok(Json(outcome))
}

/// DELETE /artifacts/embeddings/models/:model
async fn delete_embeddings(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(model): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state
        .artifacts
        .delete_embeddings_by_model(&owner.owner_id, &model)
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// DELETE /artifacts/analyses/models/:model
async fn delete_analyses(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(model): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state
        .artifacts
        .delete_analyses_by_model(&owner.owner_id, &model)
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// GET /artifacts/embeddings/statistics
async fn embedding_statistics(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<ArtifactStatistics>> {
    let stats = state.artifacts.embedding_statistics(&owner.owner_id).await?;
    Ok(Json(stats))
}

/// GET /artifacts/analyses/statistics
async fn analysis_statistics(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<ArtifactStatistics>> {
    let stats = state.artifacts.analysis_statistics(&owner.owner_id).await?;
    Ok(Json(stats))
}
