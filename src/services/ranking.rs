//! Hybrid relevance scoring.
//!
//! Blends semantic similarity, recency and importance into one score.
//! Recency decays linearly to zero over a configurable window.

use chrono::{DateTime, Utc};
use chronicle_models::{ScoreBreakdown, SearchResult, SearchWeights, SortBy, SortOrder};

use crate::{Error, Result};

/// Linear recency: 1.0 now, 0.0 at `window_days` and beyond.
///
/// Events stamped in the future count as fresh.
pub fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>, window_days: f64) -> f64 {
    if window_days <= 0.0 {
        return 0.0;
    }

    let days_elapsed = now.signed_duration_since(timestamp).num_seconds() as f64 / 86400.0;
    (1.0 - days_elapsed.max(0.0) / window_days).max(0.0)
}

/// Weighted sum of the three signals.
pub fn combine(semantic: f64, temporal: f64, importance: f64, weights: &SearchWeights) -> ScoreBreakdown {
    ScoreBreakdown {
        semantic,
        temporal,
        importance,
        combined: semantic * weights.semantic
            + temporal * weights.temporal
            + importance * weights.importance,
    }
}

/// Weights must be finite and non-negative; they need not sum to 1.
pub fn validate_weights(weights: &SearchWeights) -> Result<()> {
    let all = [weights.semantic, weights.temporal, weights.importance];
    if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::Validation(format!(
            "search weights must be finite and non-negative: {:?}",
            weights
        )));
    }
    Ok(())
}

/// Sort results in place.
///
/// `sort_order` applies to the `sort_by` key. Ties are always broken by
/// timestamp descending, then id.
pub fn sort_results(results: &mut [SearchResult], sort_by: SortBy, sort_order: SortOrder) {
    results.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Relevance => a.scores.combined.total_cmp(&b.scores.combined),
            SortBy::Importance => a.scores.importance.total_cmp(&b.scores.importance),
            SortBy::Timestamp => a.event.timestamp.cmp(&b.event.timestamp),
        };
        let primary = match sort_order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };

        primary
            .then_with(|| b.event.timestamp.cmp(&a.event.timestamp))
            .then_with(|| a.event.id.cmp(&b.event.id))
    });
}
