//! Derived Artifact Store.
//!
//! Embeddings and analyses are regenerable annotations keyed by
//! `(memory_id, model_name)`. This service produces them, searches them,
//! and re-derives them under new models in fixed-size chunks. Events are
//! only ever read here.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use chronicle_embeddings::EmbeddingService;
use chronicle_llm::LlmService;
use chronicle_models::{
    new_id, now, AnalysisArtifact, ArtifactStatistics, BatchOutcome, EmbeddingArtifact, Entity,
    MemoryEvent, MigrationProgress, Sentiment, SimilarityMatch,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ArtifactConfig;
use crate::db::{self, DbPool, LeaseKind};
use crate::error::{Error, Result};

/// Longest slice of event content sent to the completion provider.
const MAX_ANALYSIS_CHARS: usize = 4000;

/// An embedding provider bound to the identifier its artifacts are stored under.
#[derive(Clone)]
pub struct EmbeddingModel {
    pub name: String,
    pub version: String,
    pub service: EmbeddingService,
}

impl EmbeddingModel {
    pub fn new(name: impl Into<String>, version: impl Into<String>, service: EmbeddingService) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            service,
        }
    }

    /// Name the model after the service's primary provider.
    pub fn from_service(service: EmbeddingService, version: impl Into<String>) -> Self {
        Self::new(service.model_name(), version, service)
    }

    /// Vectors for `texts`, refusing any produced by a model other than this one.
    pub async fn vectors(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.service.embed(texts).await?;
        if embeddings.model != self.name {
            return Err(Error::Embedding(format!(
                "Provider answered with {} but artifacts are stored under {}",
                embeddings.model, self.name
            )));
        }
        Ok(embeddings.vectors)
    }
}

/// A completion provider bound to the identifier its analyses are stored under.
#[derive(Clone)]
pub struct AnalysisModel {
    pub name: String,
    pub version: String,
    pub llm: LlmService,
}

impl AnalysisModel {
    pub fn new(name: impl Into<String>, version: impl Into<String>, llm: LlmService) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            llm,
        }
    }

    pub fn from_service(llm: LlmService, version: impl Into<String>) -> Self {
        let name = llm
            .model_name()
            .unwrap_or_else(|| "unconfigured".to_string());
        Self::new(name, version, llm)
    }

    /// A JSON reply, refusing one produced by a model other than this one.
    pub async fn complete_json(&self, prompt: &str, max_tokens: u32) -> Result<Value> {
        let reply = self.llm.complete_json(prompt, max_tokens).await?;
        if reply.model != self.name {
            return Err(Error::Llm(format!(
                "Provider answered with {} but results are stored under {}",
                reply.model, self.name
            )));
        }
        Ok(reply.content)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityOptions {
    pub limit: usize,
    pub threshold: f32,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        let config = ArtifactConfig::default();
        Self {
            limit: config.similarity_limit,
            threshold: config.similarity_threshold,
        }
    }
}

/// Called after every chunk; `ControlFlow::Break` stops further chunks.
pub type ProgressCallback = Arc<dyn Fn(&MigrationProgress) -> ControlFlow<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct MigrationOptions {
    /// Events per chunk. Falls back to the configured batch size.
    pub batch_size: Option<usize>,
    pub on_progress: Option<ProgressCallback>,
}

impl MigrationOptions {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: Some(batch_size),
            on_progress: None,
        }
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationProgress) -> ControlFlow<()> + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    fn report(&self, progress: &MigrationProgress) -> ControlFlow<()> {
        match &self.on_progress {
            Some(callback) => callback(progress),
            None => ControlFlow::Continue(()),
        }
    }
}

/// What the completion provider is asked to return for one event.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisReply {
    summary: String,
    key_points: Vec<String>,
    entities: Vec<Value>,
    sentiment: Option<Sentiment>,
    importance_score: Option<f64>,
    relevance_tags: Vec<String>,
    action_items: Vec<String>,
}

/// Service for producing, searching and migrating derived artifacts.
#[derive(Clone)]
pub struct ArtifactService {
    db: DbPool,
    embedding: EmbeddingModel,
    analysis: AnalysisModel,
    config: ArtifactConfig,
}

impl ArtifactService {
    pub fn new(
        db: DbPool,
        embedding: EmbeddingModel,
        analysis: AnalysisModel,
        config: ArtifactConfig,
    ) -> Self {
        Self {
            db,
            embedding,
            analysis,
            config,
        }
    }

    /// The model new embeddings are written under.
    pub fn embedding_model(&self) -> &EmbeddingModel {
        &self.embedding
    }

    /// The model new analyses are written under.
    pub fn analysis_model(&self) -> &AnalysisModel {
        &self.analysis
    }

    // =========================================================================
    // Embeddings
    // =========================================================================

    /// Embed one event under the current model.
    pub async fn embed(&self, owner_id: &str, event: &MemoryEvent) -> Result<EmbeddingArtifact> {
        ensure_owner(owner_id, std::slice::from_ref(event))?;
        let mut artifacts = self.embed_with(&self.embedding, std::slice::from_ref(event)).await?;
        artifacts
            .pop()
            .ok_or_else(|| Error::Internal("No embedding produced".to_string()))
    }

    /// Embed several events in one provider round trip.
    pub async fn embed_batch(&self, owner_id: &str, events: &[MemoryEvent]) -> Result<Vec<EmbeddingArtifact>> {
        ensure_owner(owner_id, events)?;
        self.embed_with(&self.embedding, events).await
    }

    async fn embed_with(&self, model: &EmbeddingModel, events: &[MemoryEvent]) -> Result<Vec<EmbeddingArtifact>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let texts = events.iter().map(|e| e.raw_content.clone()).collect();
        let vectors = model.vectors(texts).await?;
        if vectors.len() != events.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                events.len(),
                vectors.len()
            )));
        }

        let now = now();
        let mut artifacts = Vec::with_capacity(events.len());
        for (event, vector) in events.iter().zip(vectors) {
            let artifact = EmbeddingArtifact {
                memory_id: event.id.clone(),
                model_name: model.name.clone(),
                model_version: model.version.clone(),
                dimension: vector.len(),
                vector,
                created_at: now,
                updated_at: now,
            };
            db::upsert_embedding(&self.db, &artifact).await?;
            artifacts.push(artifact);
        }

        debug!(model = %model.name, count = artifacts.len(), "Stored embeddings");
        Ok(artifacts)
    }

    /// Events whose current-model vectors are closest to `text`.
    pub async fn semantic_search(
        &self,
        owner_id: &str,
        text: &str,
        options: SimilarityOptions,
    ) -> Result<Vec<SimilarityMatch>> {
        if text.trim().is_empty() {
            return Err(Error::Validation("search text must not be empty".to_string()));
        }

        let query = self
            .embedding
            .vectors(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("No embedding returned for query".to_string()))?;
        db::search_by_embedding(
            &self.db,
            owner_id,
            &query,
            &self.embedding.name,
            options.threshold,
            options.limit,
        )
        .await
    }

    /// Events similar to an already embedded one, excluding it.
    pub async fn find_similar(
        &self,
        owner_id: &str,
        memory_id: &str,
        options: SimilarityOptions,
    ) -> Result<Vec<SimilarityMatch>> {
        let seed = db::get_embedding(&self.db, owner_id, memory_id, &self.embedding.name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "No {} embedding for event {}",
                    self.embedding.name, memory_id
                ))
            })?;

        let mut matches = db::search_by_embedding(
            &self.db,
            owner_id,
            &seed.vector,
            &self.embedding.name,
            options.threshold,
            options.limit + 1,
        )
        .await?;

        matches.retain(|m| m.memory_id != memory_id);
        matches.truncate(options.limit);
        Ok(matches)
    }

    // =========================================================================
    // Analyses
    // =========================================================================

    /// Analyse one event under the current completion model.
    pub async fn analyze(&self, owner_id: &str, event: &MemoryEvent) -> Result<AnalysisArtifact> {
        ensure_owner(owner_id, std::slice::from_ref(event))?;
        self.analyze_with(&self.analysis, event).await
    }

    async fn analyze_with(&self, model: &AnalysisModel, event: &MemoryEvent) -> Result<AnalysisArtifact> {
        let prompt = analysis_prompt(event);
        let value = model.complete_json(&prompt, self.config.analysis_max_tokens).await?;

        let reply: AnalysisReply = serde_json::from_value(value)
            .map_err(|e| Error::Llm(format!("Malformed analysis reply: {}", e)))?;

        let now = now();
        let artifact = AnalysisArtifact {
            memory_id: event.id.clone(),
            model_name: model.name.clone(),
            model_version: model.version.clone(),
            summary: reply.summary.trim().to_string(),
            key_points: reply.key_points,
            entities: reply
                .entities
                .into_iter()
                .filter_map(|v| serde_json::from_value::<Entity>(v).ok())
                .collect(),
            sentiment: reply.sentiment.unwrap_or_default(),
            importance_score: reply
                .importance_score
                .filter(|s| s.is_finite())
                .unwrap_or(0.5)
                .clamp(0.0, 1.0),
            relevance_tags: reply
                .relevance_tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect::<BTreeSet<_>>(),
            action_items: reply.action_items,
            created_at: now,
            updated_at: now,
        };

        db::upsert_analysis(&self.db, &artifact).await?;

        debug!(
            model = %model.name,
            memory_id = %event.id,
            importance = artifact.importance_score,
            "Stored analysis"
        );

        Ok(artifact)
    }

    // =========================================================================
    // Migration and backfill
    // =========================================================================

    /// Re-derive embeddings for every event under `target`.
    ///
    /// Artifacts of other models are left untouched.
    pub async fn migrate_embeddings(
        &self,
        owner_id: &str,
        target: &EmbeddingModel,
        options: MigrationOptions,
    ) -> Result<BatchOutcome> {
        let lease = self.acquire(owner_id, &target.name, LeaseKind::Embedding).await?;
        let outcome = match db::list_event_ids(&self.db, owner_id).await {
            Ok(ids) => Ok(self.run_embedding_chunks(owner_id, target, ids, &options, &lease).await),
            Err(e) => Err(e),
        };
        self.release(owner_id, &target.name, LeaseKind::Embedding, &lease).await;

        let outcome = outcome?;
        info!(
            owner_id = %owner_id,
            model = %target.name,
            migrated = outcome.succeeded,
            errors = outcome.errors,
            cancelled = outcome.cancelled,
            "Embedding migration finished"
        );
        Ok(outcome)
    }

    /// Embed events that have no vector under the current model.
    pub async fn backfill_embeddings(&self, owner_id: &str, options: MigrationOptions) -> Result<BatchOutcome> {
        let model = self.embedding.clone();
        let lease = self.acquire(owner_id, &model.name, LeaseKind::Embedding).await?;
        let outcome = match db::list_ids_missing_embedding(&self.db, owner_id, &model.name).await {
            Ok(ids) => Ok(self.run_embedding_chunks(owner_id, &model, ids, &options, &lease).await),
            Err(e) => Err(e),
        };
        self.release(owner_id, &model.name, LeaseKind::Embedding, &lease).await;

        let outcome = outcome?;
        info!(
            owner_id = %owner_id,
            model = %model.name,
            created = outcome.succeeded,
            errors = outcome.errors,
            "Embedding backfill finished"
        );
        Ok(outcome)
    }

    /// Re-analyse every event under `target`.
    pub async fn migrate_analyses(
        &self,
        owner_id: &str,
        target: &AnalysisModel,
        options: MigrationOptions,
    ) -> Result<BatchOutcome> {
        let lease = self.acquire(owner_id, &target.name, LeaseKind::Analysis).await?;
        let outcome = match db::list_event_ids(&self.db, owner_id).await {
            Ok(ids) => Ok(self.run_analysis_chunks(owner_id, target, ids, &options, &lease).await),
            Err(e) => Err(e),
        };
        self.release(owner_id, &target.name, LeaseKind::Analysis, &lease).await;

        let outcome = outcome?;
        info!(
            owner_id = %owner_id,
            model = %target.name,
            analyzed = outcome.succeeded,
            errors = outcome.errors,
            cancelled = outcome.cancelled,
            "Analysis migration finished"
        );
        Ok(outcome)
    }

    /// Analyse events that have no analysis under the current model.
    pub async fn backfill_analyses(&self, owner_id: &str, options: MigrationOptions) -> Result<BatchOutcome> {
        let model = self.analysis.clone();
        let lease = self.acquire(owner_id, &model.name, LeaseKind::Analysis).await?;
        let outcome = match db::list_ids_missing_analysis(&self.db, owner_id, &model.name).await {
            Ok(ids) => Ok(self.run_analysis_chunks(owner_id, &model, ids, &options, &lease).await),
            Err(e) => Err(e),
        };
        self.release(owner_id, &model.name, LeaseKind::Analysis, &lease).await;

        let outcome = outcome?;
        info!(
            owner_id = %owner_id,
            model = %model.name,
            created = outcome.succeeded,
            errors = outcome.errors,
            "Analysis backfill finished"
        );
        Ok(outcome)
    }

    /// One provider round trip per chunk; a failed chunk counts every event in it.
    async fn run_embedding_chunks(
        &self,
        owner_id: &str,
        model: &EmbeddingModel,
        ids: Vec<String>,
        options: &MigrationOptions,
        holder: &str,
    ) -> BatchOutcome {
        let batch_size = self.batch_size(options);
        let mut outcome = BatchOutcome {
            total: ids.len(),
            ..Default::default()
        };
        let mut processed = 0;

        for chunk in ids.chunks(batch_size) {
            let result = match db::get_events_by_ids(&self.db, owner_id, chunk).await {
                Ok(events) => self.embed_with(model, &events).await.map(|a| a.len()),
                Err(e) => Err(e),
            };

            match result {
                Ok(count) => outcome.succeeded += count,
                Err(e) => {
                    warn!(
                        owner_id = %owner_id,
                        model = %model.name,
                        chunk = chunk.len(),
                        error = %e,
                        "Embedding chunk failed"
                    );
                    outcome.errors += chunk.len();
                }
            }
            processed += chunk.len();

            if !self.renew(owner_id, &model.name, LeaseKind::Embedding, holder).await {
                outcome.cancelled = processed < outcome.total;
                break;
            }
            if self.progress(options, processed, &outcome).is_break() {
                outcome.cancelled = processed < outcome.total;
                break;
            }
        }

        outcome
    }

    /// One completion per event; failures are counted per event.
    async fn run_analysis_chunks(
        &self,
        owner_id: &str,
        model: &AnalysisModel,
        ids: Vec<String>,
        options: &MigrationOptions,
        holder: &str,
    ) -> BatchOutcome {
        let batch_size = self.batch_size(options);
        let mut outcome = BatchOutcome {
            total: ids.len(),
            ..Default::default()
        };
        let mut processed = 0;

        for chunk in ids.chunks(batch_size) {
            match db::get_events_by_ids(&self.db, owner_id, chunk).await {
                Ok(events) => {
                    for event in &events {
                        match self.analyze_with(model, event).await {
                            Ok(_) => outcome.succeeded += 1,
                            Err(e) => {
                                warn!(
                                    owner_id = %owner_id,
                                    model = %model.name,
                                    memory_id = %event.id,
                                    error = %e,
                                    "Analysis failed"
                                );
                                outcome.errors += 1;
                            }
                        }
                    }
                    outcome.errors += chunk.len() - events.len();
                }
                Err(e) => {
                    warn!(owner_id = %owner_id, error = %e, "Failed to load analysis chunk");
                    outcome.errors += chunk.len();
                }
            }
            processed += chunk.len();

            if !self.renew(owner_id, &model.name, LeaseKind::Analysis, holder).await {
                outcome.cancelled = processed < outcome.total;
                break;
            }
            if self.progress(options, processed, &outcome).is_break() {
                outcome.cancelled = processed < outcome.total;
                break;
            }
        }

        outcome
    }

    fn batch_size(&self, options: &MigrationOptions) -> usize {
        options.batch_size.unwrap_or(self.config.batch_size).max(1)
    }

    fn progress(&self, options: &MigrationOptions, processed: usize, outcome: &BatchOutcome) -> ControlFlow<()> {
        options.report(&MigrationProgress {
            processed,
            total: outcome.total,
            succeeded: outcome.succeeded,
            errors: outcome.errors,
        })
    }

    fn lease_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.config.lease_ttl)
            .map_err(|e| Error::Internal(format!("Invalid lease TTL: {}", e)))
    }

    /// Take the migration lease for `(owner, model, kind)` or fail with `Conflict`.
    async fn acquire(&self, owner_id: &str, model_name: &str, kind: LeaseKind) -> Result<String> {
        let holder = new_id();
        let now = now();
        let ttl = self.lease_ttl()?;

        let acquired =
            db::try_acquire_lease(&self.db, owner_id, model_name, kind, &holder, now, now + ttl).await?;
        if !acquired {
            return Err(Error::Conflict(format!(
                "A {} migration for model {} is already running",
                kind.as_str(),
                model_name
            )));
        }

        Ok(holder)
    }

    /// Extend `holder`'s lease by one TTL from now. False once the lease is lost.
    async fn renew(&self, owner_id: &str, model_name: &str, kind: LeaseKind, holder: &str) -> bool {
        let renewed = match self.lease_ttl() {
            Ok(ttl) => db::renew_lease(&self.db, owner_id, model_name, kind, holder, now() + ttl).await,
            Err(e) => Err(e),
        };

        match renewed {
            Ok(true) => true,
            Ok(false) => {
                warn!(owner_id = %owner_id, model = %model_name, "Migration lease taken over, stopping");
                false
            }
            Err(e) => {
                warn!(owner_id = %owner_id, model = %model_name, error = %e, "Failed to renew migration lease, stopping");
                false
            }
        }
    }

    async fn release(&self, owner_id: &str, model_name: &str, kind: LeaseKind, holder: &str) {
        if let Err(e) = db::release_lease(&self.db, owner_id, model_name, kind, holder).await {
            warn!(
                owner_id = %owner_id,
                model = %model_name,
                error = %e,
                "Failed to release migration lease; it will expire"
            );
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub async fn delete_embeddings_by_model(&self, owner_id: &str, model_name: &str) -> Result<u64> {
        let deleted = db::delete_embeddings_by_model(&self.db, owner_id, model_name).await?;
        info!(owner_id = %owner_id, model = %model_name, deleted, "Deleted embeddings");
        Ok(deleted)
    }

    pub async fn delete_analyses_by_model(&self, owner_id: &str, model_name: &str) -> Result<u64> {
        let deleted = db::delete_analyses_by_model(&self.db, owner_id, model_name).await?;
        info!(owner_id = %owner_id, model = %model_name, deleted, "Deleted analyses");
        Ok(deleted)
    }

    pub async fn embedding_statistics(&self, owner_id: &str) -> Result<ArtifactStatistics> {
        let by_model = db::count_embeddings_by_model(&self.db, owner_id).await?;
        let total_events = db::count_events(&self.db, owner_id).await?;
        Ok(ArtifactStatistics::new(by_model, total_events, &self.embedding.name))
    }

    pub async fn analysis_statistics(&self, owner_id: &str) -> Result<ArtifactStatistics> {
        let by_model = db::count_analyses_by_model(&self.db, owner_id).await?;
        let total_events = db::count_events(&self.db, owner_id).await?;
        Ok(ArtifactStatistics::new(by_model, total_events, &self.analysis.name))
    }
}

fn ensure_owner(owner_id: &str, events: &[MemoryEvent]) -> Result<()> {
    match events.iter().find(|e| e.owner_id != owner_id) {
        Some(event) => Err(Error::NotFound(format!("Event not found: {}", event.id))),
        None => Ok(()),
    }
}

fn analysis_prompt(event: &MemoryEvent) -> String {
    let content = &event.raw_content;
    let end = content
        .char_indices()
        .nth(MAX_ANALYSIS_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(content.len());

    format!(
        r#"Analyse this {event_type} entry ({role}) from a long-term memory log.

1. **Summary**: One or two sentences capturing what happened
2. **Key points**: The important facts, in order (max 5)
3. **Entities**: People, projects, tools, places or dates mentioned, each with a type and a 0-1 confidence
4. **Sentiment**: positive, negative, neutral or mixed, a score from -1 to 1, and any emotions expressed
5. **Importance**: How important this is to remember long-term, from 0.0 (trivial) to 1.0 (critical)
6. **Tags**: Short lowercase topic tags (max 6)
7. **Action items**: Concrete follow-ups, if any

Content:
{content}

Return JSON:
{{
    "summary": "...",
    "key_points": ["..."],
    "entities": [{{"type": "person", "value": "...", "confidence": 0.9}}],
    "sentiment": {{"label": "neutral", "score": 0.0, "emotions": []}},
    "importance_score": 0.5,
    "relevance_tags": ["..."],
    "action_items": ["..."]
}}"#,
        event_type = event.event_type,
        role = event.role.as_str(),
        content = &content[..end],
    )
}
