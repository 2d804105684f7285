//! Shared helpers for integration tests.

#![allow(dead_code)]

use chronicle::config::Config;
use chronicle::db::{self, DbPool};
use chronicle::AppState;
use chronicle_embeddings::{EmbeddingService, RuntimeEmbeddingProvider};
use chronicle_llm::{LlmService, RuntimeLlmProvider};

pub const OWNER: &str = "alice";

pub async fn pool() -> DbPool {
    db::init_memory().await.expect("in-memory database")
}

/// Hash-placeholder embeddings and no completion provider.
pub async fn offline_state() -> AppState {
    state_with(
        EmbeddingService::placeholder(16).unwrap(),
        LlmService::with_providers(Vec::new()).unwrap(),
    )
    .await
}

pub async fn state_with(embeddings: EmbeddingService, llm: LlmService) -> AppState {
    AppState::build(pool().await, embeddings, llm, &Config::default())
        .await
        .expect("app state")
}

pub fn openai_llm(base_url: String) -> LlmService {
    LlmService::with_providers(vec![RuntimeLlmProvider {
        name: "openai".to_string(),
        base_url,
        model: "gpt-4o-mini".to_string(),
        api_key: Some("test-key".to_string()),
        priority: 1,
    }])
    .unwrap()
}

pub fn openai_embedding_provider(base_url: String, model: &str, dimension: usize, priority: i32) -> RuntimeEmbeddingProvider {
    RuntimeEmbeddingProvider {
        name: "openai".to_string(),
        base_url,
        model: model.to_string(),
        api_key: Some("test-key".to_string()),
        dimension: Some(dimension),
        priority,
    }
}

pub fn openai_embeddings(base_url: String, dimension: usize) -> EmbeddingService {
    EmbeddingService::from_providers(
        vec![openai_embedding_provider(base_url, "text-embedding-3-small", dimension, 1)],
        dimension,
    )
    .unwrap()
}
