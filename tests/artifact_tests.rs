//! Integration tests for derived artifacts.
//!
//! Model migrations, backfills and migration leases.

mod common;

use chrono::{Duration, Utc};
use chronicle::db::{self, LeaseKind};
use chronicle::services::{AnalysisModel, EmbeddingModel, MigrationOptions, SimilarityOptions};
use chronicle::{Error, Result};
use chronicle_embeddings::EmbeddingService;
use chronicle_llm::LlmService;
use chronicle_models::{MemoryEvent, NewEvent, Role};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::OWNER;

async fn seed(state: &chronicle::AppState, contents: &[&str]) -> Result<Vec<MemoryEvent>> {
    let inputs = contents
        .iter()
        .map(|c| NewEvent::new(*c, "note", Role::User))
        .collect();
    state.events.append_batch(OWNER, inputs).await
}

// ============================================================================
// Embeddings
// ============================================================================

#[tokio::test]
async fn test_upsert_keeps_one_artifact_per_model() -> Result<()> {
    let state = common::offline_state().await;
    let events = seed(&state, &["first", "second"]).await?;

    state.artifacts.embed_batch(OWNER, &events).await?;
    state.artifacts.embed_batch(OWNER, &events).await?;
    state.artifacts.embed(OWNER, &events[0]).await?;

    let stats = state.artifacts.embedding_statistics(OWNER).await?;
    assert_eq!(stats.total_artifacts, 2);
    assert_eq!(stats.by_model.get("hash-placeholder-16"), Some(&2));
    assert_eq!(stats.coverage_percent, 100.0);

    Ok(())
}

#[tokio::test]
async fn test_migration_leaves_old_model_in_place() -> Result<()> {
    let state = common::state_with(
        EmbeddingService::placeholder(8).unwrap(),
        LlmService::with_providers(Vec::new()).unwrap(),
    )
    .await;
    seed(&state, &["the cat sat", "on the mat", "and purred"]).await?;

    let backfill = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::default())
        .await?;
    assert_eq!(backfill.succeeded, 3);

    let target = EmbeddingModel::from_service(EmbeddingService::placeholder(4).unwrap(), "2");
    assert_eq!(target.name, "hash-placeholder-4");

    let migration = state
        .artifacts
        .migrate_embeddings(OWNER, &target, MigrationOptions::with_batch_size(2))
        .await?;
    assert_eq!(migration.total, 3);
    assert_eq!(migration.succeeded, 3);
    assert_eq!(migration.errors, 0);
    assert!(!migration.cancelled);

    let stats = state.artifacts.embedding_statistics(OWNER).await?;
    assert_eq!(stats.current_model, "hash-placeholder-8");
    assert_eq!(stats.by_model.get("hash-placeholder-8"), Some(&3));
    assert_eq!(stats.by_model.get("hash-placeholder-4"), Some(&3));
    assert_eq!(stats.total_artifacts, 6);

    // Search still runs against the current model's vectors
    let matches = state
        .artifacts
        .semantic_search(OWNER, "the cat sat", SimilarityOptions { limit: 3, threshold: 0.0 })
        .await?;
    assert!(!matches.is_empty());

    let deleted = state
        .artifacts
        .delete_embeddings_by_model(OWNER, "hash-placeholder-4")
        .await?;
    assert_eq!(deleted, 3);
    assert_eq!(db::count_events(&state.db, OWNER).await?, 3);

    Ok(())
}

#[tokio::test]
async fn test_backfill_counts_failed_chunks_and_retries_them_later() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_string_contains("poison"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "input rejected"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0, 0.0, 0.0], "index": 0}]
        })))
        .mount(&server)
        .await;

    let state = common::state_with(
        common::openai_embeddings(server.uri(), 3),
        LlmService::with_providers(Vec::new()).unwrap(),
    )
    .await;
    seed(&state, &["alpha", "poison pill", "gamma"]).await?;

    let first = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::with_batch_size(1))
        .await?;
    assert_eq!(first.total, 3);
    assert_eq!(first.succeeded, 2);
    assert_eq!(first.errors, 1);

    let stats = state.artifacts.embedding_statistics(OWNER).await?;
    assert_eq!(stats.by_model.get("text-embedding-3-small"), Some(&2));

    // Only the event still missing a vector is attempted again
    let second = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::with_batch_size(1))
        .await?;
    assert_eq!(second.total, 1);
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.errors, 1);

    Ok(())
}

#[tokio::test]
async fn test_fallback_model_vectors_are_not_filed_under_primary() -> Result<()> {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "unavailable"}
        })))
        .mount(&primary)
        .await;

    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.5, 0.5, 0.5], "index": 0}]
        })))
        .mount(&fallback)
        .await;

    let embeddings = EmbeddingService::from_providers(
        vec![
            common::openai_embedding_provider(primary.uri(), "text-embedding-3-small", 3, 1),
            common::openai_embedding_provider(fallback.uri(), "other-model-b", 3, 2),
        ],
        3,
    )
    .unwrap();
    let state = common::state_with(embeddings, LlmService::with_providers(Vec::new()).unwrap()).await;
    let events = seed(&state, &["lonely vector"]).await?;

    let err = state.artifacts.embed(OWNER, &events[0]).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));

    let err = state
        .artifacts
        .semantic_search(OWNER, "lonely vector", SimilarityOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));

    let stats = state.artifacts.embedding_statistics(OWNER).await?;
    assert_eq!(stats.total_artifacts, 0);

    Ok(())
}

#[tokio::test]
async fn test_backfill_is_a_no_op_once_complete() -> Result<()> {
    let state = common::offline_state().await;
    seed(&state, &["one", "two", "three"]).await?;

    let first = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::with_batch_size(2))
        .await?;
    assert_eq!(first.succeeded, 3);

    let second = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::default())
        .await?;
    assert_eq!(second.total, 0);
    assert_eq!(second.succeeded, 0);

    Ok(())
}

// ============================================================================
// Leases
// ============================================================================

#[tokio::test]
async fn test_concurrent_migration_is_refused() -> Result<()> {
    let state = common::offline_state().await;
    seed(&state, &["one"]).await?;

    let now = Utc::now();
    let acquired = db::try_acquire_lease(
        &state.db,
        OWNER,
        "hash-placeholder-16",
        LeaseKind::Embedding,
        "another-worker",
        now,
        now + Duration::minutes(10),
    )
    .await?;
    assert!(acquired);

    let err = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Other owners are not blocked
    state.events.append("bob", NewEvent::new("hi", "note", Role::User)).await?;
    let outcome = state
        .artifacts
        .backfill_embeddings("bob", MigrationOptions::default())
        .await?;
    assert_eq!(outcome.succeeded, 1);

    db::release_lease(&state.db, OWNER, "hash-placeholder-16", LeaseKind::Embedding, "another-worker").await?;
    let outcome = state
        .artifacts
        .backfill_embeddings(OWNER, MigrationOptions::default())
        .await?;
    assert_eq!(outcome.succeeded, 1);

    Ok(())
}

// ============================================================================
// Analyses
// ============================================================================

#[tokio::test]
async fn test_analysis_backfill_and_migration() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": json!({
                "summary": "A note about deployment",
                "key_points": ["deploy on friday"],
                "importance_score": 0.8,
                "relevance_tags": ["Deploy", "deploy", "release"]
            }).to_string()}}]
        })))
        .mount(&server)
        .await;

    let llm = common::openai_llm(server.uri());
    let state = common::state_with(EmbeddingService::placeholder(16).unwrap(), llm.clone()).await;
    let events = seed(&state, &["deploy friday", "release notes"]).await?;

    let backfill = state
        .artifacts
        .backfill_analyses(OWNER, MigrationOptions::default())
        .await?;
    assert_eq!(backfill.succeeded, 2);
    assert_eq!(backfill.errors, 0);

    let analysis = db::get_analysis(&state.db, OWNER, &events[0].id, "gpt-4o-mini")
        .await?
        .expect("analysis stored");
    assert_eq!(analysis.importance_score, 0.8);
    assert_eq!(
        analysis.relevance_tags.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["deploy", "release"]
    );

    let target = AnalysisModel::new("gpt-4o", "2", llm.with_model("gpt-4o")?);
    let migration = state
        .artifacts
        .migrate_analyses(OWNER, &target, MigrationOptions::default())
        .await?;
    assert_eq!(migration.succeeded, 2);

    // A handle named for one model cannot file another model's output
    let mislabelled = AnalysisModel::new("gpt-4o", "2", llm.clone());
    let refused = state
        .artifacts
        .migrate_analyses(OWNER, &mislabelled, MigrationOptions::default())
        .await?;
    assert_eq!(refused.succeeded, 0);
    assert_eq!(refused.errors, 2);

    let stats = state.artifacts.analysis_statistics(OWNER).await?;
    assert_eq!(stats.by_model.get("gpt-4o-mini"), Some(&2));
    assert_eq!(stats.by_model.get("gpt-4o"), Some(&2));
    assert_eq!(stats.current_model, "gpt-4o-mini");

    Ok(())
}
