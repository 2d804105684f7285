//! Service layer for Chronicle.
//!
//! - EventLog (append-only memory events)
//! - Temporal (natural-language time ranges)
//! - Artifacts (per-model embeddings and analyses, migration)
//! - Ranking (hybrid scoring)
//! - Search (hybrid search engine)
//! - Summarizer (daily, weekly and monthly summaries)
//! - Timeline (events grouped by day)

mod artifacts;
mod event_log;
pub mod ranking;
mod search;
mod summarizer;
pub mod temporal;
mod timeline;

pub use artifacts::{
    AnalysisModel, ArtifactService, EmbeddingModel, MigrationOptions, ProgressCallback,
    SimilarityOptions,
};
pub use event_log::{temporal_event_filter, EventLogService};
pub use search::SearchService;
pub use summarizer::{period_dates, period_statistics, SummarizerService};
pub use timeline::{group_by_day, TimelineService};
