//! Hybrid search request and response types.

use serde::{Deserialize, Serialize};

use crate::{AnalysisArtifact, MemoryEvent, Role, TemporalFilter};

/// Independent multipliers for the three ranking signals.
///
/// They need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    pub semantic: f64,
    pub temporal: f64,
    pub importance: f64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            temporal: 0.3,
            importance: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    Timestamp,
    Importance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Hybrid search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Drives the semantic score. Without it every semantic score is 0.
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub temporal: Option<TemporalFilter>,
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub source_agents: Vec<String>,
    /// Falls back to the configured defaults when absent.
    #[serde(default)]
    pub weights: Option<SearchWeights>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl SearchQuery {
    pub fn text(query_text: impl Into<String>) -> Self {
        Self {
            query_text: Some(query_text.into()),
            ..Default::default()
        }
    }
}

/// Per-signal scores of one ranked event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub temporal: f64,
    pub importance: f64,
    pub combined: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub event: MemoryEvent,
    pub analysis: Option<AnalysisArtifact>,
    pub scores: ScoreBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub query_time_ms: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}
