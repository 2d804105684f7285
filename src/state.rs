//! Application state for Chronicle.
//!
//! Contains the shared state that is passed to all handlers.

use chronicle_embeddings::EmbeddingService;
use chronicle_llm::LlmService;
use tracing::info;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{
    AnalysisModel, ArtifactService, EmbeddingModel, EventLogService, SearchService,
    SummarizerService, TimelineService,
};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Append-only event log.
    pub events: EventLogService,
    /// Embeddings, analyses and model migrations.
    pub artifacts: ArtifactService,
    /// Hybrid search.
    pub search: SearchService,
    /// Period summaries.
    pub summarizer: SummarizerService,
    /// Daily timeline.
    pub timeline: TimelineService,
}

impl AppState {
    /// Create a new application state from the global configuration.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;

        let embeddings = EmbeddingService::from_config(&config.embedding)?;
        let llm = LlmService::new(&config.llm)?;

        Self::build(db, embeddings, llm, config).await
    }

    /// Wire services over an initialised pool and provider clients.
    pub async fn build(
        db: DbPool,
        embeddings: EmbeddingService,
        llm: LlmService,
        config: &Config,
    ) -> Result<Self> {
        let embedding_model = EmbeddingModel::from_service(embeddings, &config.models.embedding_version);
        let analysis_model = AnalysisModel::from_service(llm, &config.models.analysis_version);

        info!(
            embedding_model = %embedding_model.name,
            analysis_model = %analysis_model.name,
            "Current artifact models"
        );

        let events = EventLogService::new(db.clone(), config.temporal, config.event_log.clone());

        let artifacts = ArtifactService::new(
            db.clone(),
            embedding_model,
            analysis_model.clone(),
            config.artifacts.clone(),
        );

        let search = SearchService::new(
            db.clone(),
            artifacts.clone(),
            config.temporal,
            config.search.clone(),
        );

        let summarizer = SummarizerService::new(
            db.clone(),
            analysis_model,
            config.temporal,
            config.summary.clone(),
        );

        let timeline = TimelineService::new(db.clone(), config.temporal);

        Ok(Self {
            db,
            events,
            artifacts,
            search,
            summarizer,
            timeline,
        })
    }
}
