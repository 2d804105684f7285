//! Integration tests for hybrid search over a populated state.

mod common;

use chrono::{Duration, Utc};
use chronicle::config::utc;
use chronicle::services::{temporal, MigrationOptions};
use chronicle::{Error, Result};
use chronicle_embeddings::EmbeddingService;
use chronicle_models::{NewEvent, Role, SearchQuery, SearchWeights, SortBy, TemporalFilter};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::OWNER;

fn completion(importance: f64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"content": json!({
            "summary": "analysed",
            "importance_score": importance
        }).to_string()}}]
    }))
}

#[tokio::test]
async fn test_semantic_only_ranks_exact_match_first() -> Result<()> {
    let state = common::offline_state().await;
    for content in ["grocery list: eggs and milk", "the deploy failed at noon", "call the dentist"] {
        state
            .events
            .append(OWNER, NewEvent::new(content, "note", Role::User))
            .await?;
    }
    state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::default())
        .await?;

    let response = state
        .search
        .search(
            OWNER,
            SearchQuery {
                weights: Some(SearchWeights {
                    semantic: 1.0,
                    temporal: 0.0,
                    importance: 0.0,
                }),
                ..SearchQuery::text("the deploy failed at noon")
            },
        )
        .await?;

    let top = &response.results[0];
    assert_eq!(top.event.raw_content, "the deploy failed at noon");
    assert!((top.scores.semantic - 1.0).abs() < 1e-4);
    assert!((top.scores.combined - top.scores.semantic).abs() < 1e-9);
    for pair in response.results.windows(2) {
        assert!(pair[0].scores.combined >= pair[1].scores.combined);
    }

    Ok(())
}

#[tokio::test]
async fn test_analysed_importance_orders_results() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("URGENT"))
        .respond_with(completion(0.95))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(0.1))
        .mount(&server)
        .await;

    let state = common::state_with(
        EmbeddingService::placeholder(16).unwrap(),
        common::openai_llm(server.uri()),
    )
    .await;

    let ts = Utc::now() - Duration::hours(1);
    for content in ["lunch was fine", "URGENT: production database is down", "read a book"] {
        state
            .events
            .append(OWNER, NewEvent::new(content, "note", Role::User).at(ts))
            .await?;
    }
    let outcome = state
        .artifacts
        .backfill_analyses(OWNER, MigrationOptions::default())
        .await?;
    assert_eq!(outcome.succeeded, 3);

    let weights = SearchWeights {
        semantic: 0.0,
        temporal: 0.0,
        importance: 1.0,
    };
    let response = state
        .search
        .search(
            OWNER,
            SearchQuery {
                weights: Some(weights),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(response.total_count, 3);
    assert_eq!(
        response.results[0].event.raw_content,
        "URGENT: production database is down"
    );
    assert_eq!(response.results[0].scores.importance, 0.95);
    assert!(response.results[0].analysis.is_some());
    assert_eq!(response.results[1].scores.importance, 0.1);

    let by_importance = state
        .search
        .search(
            OWNER,
            SearchQuery {
                sort_by: SortBy::Importance,
                limit: Some(1),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(by_importance.results.len(), 1);
    assert!(by_importance.has_more);
    assert_eq!(
        by_importance.results[0].event.raw_content,
        "URGENT: production database is down"
    );

    Ok(())
}

#[tokio::test]
async fn test_text_and_time_range_combine() -> Result<()> {
    let state = common::offline_state().await;
    let midnight = temporal::local_midnight(Utc::now().date_naive(), utc());

    for (content, ts) in [
        ("standup notes", midnight - Duration::hours(15)),
        ("standup notes", midnight - Duration::days(3)),
        ("standup notes", midnight + Duration::minutes(1)),
    ] {
        state
            .events
            .append(OWNER, NewEvent::new(content, "meeting", Role::User).at(ts))
            .await?;
    }
    state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::default())
        .await?;

    let response = state
        .search
        .search(
            OWNER,
            SearchQuery {
                temporal: Some(TemporalFilter::natural("yesterday")),
                event_types: vec!["Meeting".to_string()],
                ..SearchQuery::text("standup notes")
            },
        )
        .await?;

    assert_eq!(response.total_count, 1);
    assert_eq!(response.results[0].event.timestamp, midnight - Duration::hours(15));

    // Other owners see nothing
    let foreign = state
        .search
        .search("mallory", SearchQuery::text("standup notes"))
        .await?;
    assert_eq!(foreign.total_count, 0);

    Ok(())
}

#[tokio::test]
async fn test_negative_weight_is_rejected() {
    let state = common::offline_state().await;
    let err = state
        .search
        .search(
            OWNER,
            SearchQuery {
                weights: Some(SearchWeights {
                    semantic: -1.0,
                    temporal: 0.0,
                    importance: 0.0,
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
