//! Derived, model-scoped artifacts.
//!
//! Artifacts are keyed by `(memory_id, model_name)` so switching models
//! never overwrites history produced by an earlier one.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vector embedding of one event under one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingArtifact {
    pub memory_id: String,
    pub model_name: String,
    pub model_version: String,
    pub dimension: usize,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An entity extracted from event content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Sentiment of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub emotions: Vec<String>,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self {
            label: "neutral".to_string(),
            score: 0.0,
            emotions: Vec::new(),
        }
    }
}

/// Structured analysis of one event under one completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub memory_id: String,
    pub model_name: String,
    pub model_version: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
    /// 0.0 - 1.0
    pub importance_score: f64,
    pub relevance_tags: BTreeSet<String>,
    pub action_items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Nearest-neighbour hit returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub memory_id: String,
    pub similarity: f32,
}

/// Artifact counts per model for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatistics {
    pub total_artifacts: i64,
    pub by_model: BTreeMap<String, i64>,
    pub total_events: i64,
    pub current_model: String,
    /// Artifacts for the current model as a percentage of all events.
    pub coverage_percent: f64,
}

impl ArtifactStatistics {
    pub fn new(by_model: BTreeMap<String, i64>, total_events: i64, current_model: &str) -> Self {
        let total_artifacts = by_model.values().sum();
        let current = by_model.get(current_model).copied().unwrap_or(0);
        let coverage_percent = if total_events > 0 {
            current as f64 / total_events as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_artifacts,
            by_model,
            total_events,
            current_model: current_model.to_string(),
            coverage_percent,
        }
    }
}

/// Summary of a batch, migration, or backfill run.
///
/// `succeeded` counts migrated, analysed, or created artifacts depending on the operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub errors: usize,
    /// The progress callback asked to stop before all chunks were submitted.
    pub cancelled: bool,
}

/// Progress snapshot handed to migration callbacks after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub errors: usize,
}
