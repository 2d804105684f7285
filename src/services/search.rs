//! Hybrid Search Engine.
//!
//! Combines vector similarity, recency and importance into one ranked,
//! paginated result list:
//!
//! 1. With a query text, fetch semantic hits (over-fetched so filtering
//!    still leaves enough to fill the page).
//! 2. Apply the structural filters. Candidates are the filtered hits, or
//!    the most recent filtered events when there is no query text.
//! 3. Score every candidate on the three signals.
//! 4. Blend them with the request's weights.
//! 5. Sort.
//! 6. Page.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use chronicle_models::{SearchQuery, SearchResponse, SearchResult};
use tracing::debug;

use crate::config::{SearchConfig, TemporalConfig};
use crate::db::{self, DbPool, EventFilter};
use crate::error::{Error, Result};

use super::artifacts::{ArtifactService, SimilarityOptions};
use super::event_log::temporal_event_filter;
use super::ranking;

/// Largest page a single search returns.
pub const MAX_LIMIT: usize = 1000;

#[derive(Clone)]
pub struct SearchService {
    db: DbPool,
    artifacts: ArtifactService,
    temporal: TemporalConfig,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        db: DbPool,
        artifacts: ArtifactService,
        temporal: TemporalConfig,
        config: SearchConfig,
    ) -> Self {
        Self {
            db,
            artifacts,
            temporal,
            config,
        }
    }

    /// Rank an owner's events for a query.
    pub async fn search(&self, owner_id: &str, query: SearchQuery) -> Result<SearchResponse> {
        let started = Instant::now();
        let now = Utc::now();

        let weights = query.weights.unwrap_or(self.config.default_weights);
        ranking::validate_weights(&weights)?;

        let limit = query.limit.unwrap_or(self.config.default_limit);
        let offset = query.offset.unwrap_or(0);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let mut filter = match &query.temporal {
            Some(temporal) => temporal_event_filter(temporal, now, &self.temporal)?,
            None => EventFilter::default(),
        };
        filter.event_types = query
            .event_types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        filter.roles = query.roles.clone();
        filter.source_agents = query.source_agents.clone();

        let query_text = query
            .query_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        // Steps 1 and 2: candidates
        let mut semantic: HashMap<String, f64> = HashMap::new();
        let candidates = match query_text {
            Some(text) => {
                // Same ceiling as the structural path; a deeper offset pages past the end.
                let fetch = offset
                    .saturating_add(limit)
                    .saturating_mul(self.config.overfetch_factor.max(1))
                    .min(self.config.max_candidates.max(1) as usize);
                let options = SimilarityOptions {
                    limit: fetch,
                    threshold: self.config.similarity_floor,
                };
                let matches = self.artifacts.semantic_search(owner_id, text, options).await?;

                filter.ids = Some(matches.iter().map(|m| m.memory_id.clone()).collect());
                semantic.extend(
                    matches
                        .into_iter()
                        .map(|m| (m.memory_id, m.similarity as f64)),
                );

                db::list_events(&self.db, owner_id, &filter, None, 0).await?
            }
            None => {
                db::list_events(&self.db, owner_id, &filter, Some(self.config.max_candidates), 0).await?
            }
        };

        let ids: Vec<String> = candidates.iter().map(|e| e.id.clone()).collect();
        let mut analyses = db::get_analyses_for_ids(
            &self.db,
            owner_id,
            &ids,
            &self.artifacts.analysis_model().name,
        )
        .await?;

        // Steps 3 and 4: scores
        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .map(|event| {
                let analysis = analyses.remove(&event.id);
                let semantic_score = semantic.get(&event.id).copied().unwrap_or(0.0);
                let recency = ranking::recency_score(event.timestamp, now, self.config.recency_window_days);
                let importance = analysis
                    .as_ref()
                    .map(|a| a.importance_score)
                    .unwrap_or(self.config.default_importance);

                SearchResult {
                    scores: ranking::combine(semantic_score, recency, importance, &weights),
                    event,
                    analysis,
                }
            })
            .collect();

        // Step 5
        ranking::sort_results(&mut results, query.sort_by, query.sort_order);

        // Step 6
        let total_count = results.len();
        let results: Vec<SearchResult> = results.into_iter().skip(offset).take(limit).collect();
        let query_time_ms = started.elapsed().as_millis() as u64;

        debug!(
            owner_id = %owner_id,
            semantic = query_text.is_some(),
            total_count,
            returned = results.len(),
            query_time_ms,
            "Search completed"
        );

        Ok(SearchResponse {
            results,
            total_count,
            query_time_ms,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total_count,
        })
    }
}
