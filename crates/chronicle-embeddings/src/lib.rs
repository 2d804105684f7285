//! Embedding service with multi-provider fallback.
//!
//! Supports Gemini, OpenAI, and Ollama embedding APIs with automatic fallback
//! when rate limits are hit or providers fail. Falls back to hash-based
//! placeholders when no providers are configured.
//!
//! # Example
//!
//! ```no_run
//! use chronicle_embeddings::{EmbeddingService, EmbeddingConfig, EmbeddingProviderConfig};
//!
//! # async fn example() -> Result<(), chronicle_embeddings::Error> {
//! let config = EmbeddingConfig {
//!     providers: vec![
//!         EmbeddingProviderConfig {
//!             name: "openai".to_string(),
//!             base_url: "https://api.openai.com/v1".to_string(),
//!             model: "text-embedding-3-small".to_string(),
//!             api_key: "your-api-key".to_string(),
//!             priority: 1,
//!         },
//!     ],
//!     dimension: 1536,
//! };
//!
//! let service = EmbeddingService::from_config(&config)?;
//! let embeddings = service.embed(vec!["hello world".to_string()]).await?;
//! assert_eq!(embeddings.model, "text-embedding-3-small");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Maximum retries per provider before fallback
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur in the embedding service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Internal error (HTTP client, parsing, etc.)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Provider API error
    #[error("Provider error: {0}")]
    Provider(String),

    /// No credentials configured
    #[error("No credentials configured")]
    NoCredentials,

    /// All providers failed
    #[error("All embedding providers failed")]
    AllProvidersFailed,

    /// Provider returned a different number of vectors than texts sent
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Configuration types
// ============================================================================

/// Configuration for the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// List of embedding providers in priority order.
    pub providers: Vec<EmbeddingProviderConfig>,
    /// Embedding dimension.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            dimension: 384,
        }
    }
}

/// One provider as read from the environment. An empty `api_key` means none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProviderConfig {
    /// `gemini`, `openai` or `ollama`.
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    /// Lower values are tried first.
    pub priority: u8,
}

// ============================================================================
// Runtime provider
// ============================================================================

/// Resolved provider used at call time.
#[derive(Debug, Clone)]
pub struct RuntimeEmbeddingProvider {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimension: Option<usize>,
    pub priority: i32,
}

impl RuntimeEmbeddingProvider {
    /// Ollama runs locally and needs no key; everything else does.
    pub fn has_credentials(&self) -> bool {
        self.name == "ollama" || self.api_key.is_some()
    }
}

impl From<&EmbeddingProviderConfig> for RuntimeEmbeddingProvider {
    fn from(config: &EmbeddingProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: Some(config.api_key.clone()).filter(|key| !key.is_empty()),
            dimension: Some(default_dimension(&config.model)),
            priority: config.priority as i32,
        }
    }
}

// ============================================================================
// Default values
// ============================================================================

/// Public endpoint for a provider name; unknown names get OpenAI's.
pub fn default_endpoint(name: &str) -> String {
    match name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta".to_string(),
        "openai" => "https://api.openai.com/v1".to_string(),
        "ollama" => "http://localhost:11434".to_string(),
        _ => "https://api.openai.com/v1".to_string(),
    }
}

pub fn default_model(name: &str) -> String {
    match name {
        "gemini" => "text-embedding-004".to_string(),
        "openai" => "text-embedding-3-small".to_string(),
        "ollama" => "nomic-embed-text".to_string(),
        _ => "text-embedding-3-small".to_string(),
    }
}

/// Native output width of well-known models, 384 otherwise.
pub fn default_dimension(model: &str) -> usize {
    if model.contains("text-embedding-004") || model.contains("embedding-001") {
        768
    } else if model.contains("text-embedding-3-small") {
        1536
    } else if model.contains("text-embedding-3-large") {
        3072
    } else if model.contains("text-embedding-ada-002") {
        1536
    } else if model.contains("nomic-embed-text") {
        768
    } else if model.contains("all-minilm") {
        384
    } else if model.contains("bge-large") || model.contains("mxbai-embed-large") {
        1024
    } else {
        384
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// `batchEmbedContents` reply.
#[derive(Debug, Deserialize)]
struct GeminiReply {
    #[serde(default)]
    embeddings: Vec<GeminiValues>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

/// OpenAI-compatible `/embeddings` reply. Items may arrive out of order.
#[derive(Debug, Deserialize)]
struct OpenAiReply {
    #[serde(default)]
    data: Vec<IndexedVector>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct IndexedVector {
    embedding: Vec<f32>,
    index: usize,
}

/// Ollama `/api/embed` reply; older servers answer with a single `embedding`.
#[derive(Debug, Deserialize)]
struct OllamaReply {
    embeddings: Option<Vec<Vec<f32>>>,
    embedding: Option<Vec<f32>>,
    error: Option<String>,
}

/// Wire protocol spoken by a provider, chosen by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Gemini,
    OpenAi,
    Ollama,
}

impl Protocol {
    fn of(provider: &RuntimeEmbeddingProvider) -> Result<Self> {
        match provider.name.as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::Internal(format!("unknown embedding provider '{}'", other))),
        }
    }

    /// Endpoint and JSON body for one batch.
    fn request(self, provider: &RuntimeEmbeddingProvider, texts: &[String], dim: usize) -> (String, serde_json::Value) {
        let base = provider.base_url.trim_end_matches('/');
        match self {
            Self::Gemini => {
                let model = format!("models/{}", provider.model);
                let requests: Vec<_> = texts
                    .iter()
                    .map(|text| json!({"model": model, "content": {"parts": [{"text": text}]}}))
                    .collect();
                (
                    format!("{}/{}:batchEmbedContents", base, model),
                    json!({ "requests": requests }),
                )
            }
            Self::OpenAi => (
                format!("{}/embeddings", base),
                json!({"model": provider.model, "input": texts, "dimensions": dim}),
            ),
            Self::Ollama => (
                format!("{}/api/embed", base),
                json!({"model": provider.model, "input": texts}),
            ),
        }
    }

    /// Pull vectors, in input order, out of a reply body.
    fn decode(self, body: &str) -> Result<Vec<Vec<f32>>> {
        let malformed = |e: serde_json::Error| Error::Internal(format!("malformed {:?} reply: {}", self, e));
        match self {
            Self::Gemini => {
                let reply: GeminiReply = serde_json::from_str(body).map_err(malformed)?;
                if let Some(err) = reply.error {
                    return Err(Error::Provider(err.message));
                }
                Ok(reply.embeddings.into_iter().map(|e| e.values).collect())
            }
            Self::OpenAi => {
                let reply: OpenAiReply = serde_json::from_str(body).map_err(malformed)?;
                if let Some(err) = reply.error {
                    return Err(Error::Provider(err.message));
                }
                let mut data = reply.data;
                data.sort_by_key(|item| item.index);
                Ok(data.into_iter().map(|item| item.embedding).collect())
            }
            Self::Ollama => {
                let reply: OllamaReply = serde_json::from_str(body).map_err(malformed)?;
                if let Some(err) = reply.error {
                    return Err(Error::Provider(err));
                }
                Ok(reply
                    .embeddings
                    .or_else(|| reply.embedding.map(|single| vec![single]))
                    .unwrap_or_default())
            }
        }
    }
}

// ============================================================================
// Embedding service
// ============================================================================

/// Vectors for a batch of texts, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    /// Model of the provider that answered.
    pub model: String,
    pub vectors: Vec<Vec<f32>>,
}

/// Embedding generator over a fixed, priority-ordered provider list.
///
/// Providers are tried in priority order. A service built without providers
/// produces deterministic hash vectors instead.
#[derive(Clone)]
pub struct EmbeddingService {
    inner: Arc<Inner>,
}

struct Inner {
    providers: Vec<RuntimeEmbeddingProvider>,
    dimension: usize,
    client: Client,
}

impl EmbeddingService {
    /// Build from environment-derived configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let mut providers: Vec<RuntimeEmbeddingProvider> = config
            .providers
            .iter()
            .map(RuntimeEmbeddingProvider::from)
            .collect();
        providers.sort_by_key(|p| p.priority);

        Self::from_providers(providers, config.dimension)
    }

    pub fn from_providers(providers: Vec<RuntimeEmbeddingProvider>, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("http client: {}", e)))?;

        match providers.first() {
            None => warn!(dimension, "No embedding providers, vectors will be hash placeholders"),
            Some(primary) => info!(
                model = %primary.model,
                fallbacks = providers.len() - 1,
                dimension,
                "Embedding service ready"
            ),
        }

        Ok(Self {
            inner: Arc::new(Inner {
                providers,
                dimension,
                client,
            }),
        })
    }

    /// Placeholder-only service of the given dimension.
    pub fn placeholder(dimension: usize) -> Result<Self> {
        Self::from_providers(Vec::new(), dimension)
    }

    /// A service on the primary provider's endpoint and key, serving `model`.
    ///
    /// Used to build migration targets. A placeholder service yields a
    /// placeholder of the requested dimension.
    pub fn with_model(&self, model: &str, dimension: Option<usize>) -> Result<Self> {
        let Some(primary) = self.inner.providers.first() else {
            return Self::placeholder(dimension.unwrap_or(self.inner.dimension));
        };

        let dim = dimension.unwrap_or_else(|| default_dimension(model));
        let target = RuntimeEmbeddingProvider {
            model: model.to_string(),
            dimension: Some(dim),
            ..primary.clone()
        };
        Self::from_providers(vec![target], dim)
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension
    }

    /// Provider names, highest priority first.
    pub fn providers(&self) -> Vec<String> {
        self.inner.providers.iter().map(|p| p.name.clone()).collect()
    }

    pub fn has_providers(&self) -> bool {
        !self.inner.providers.is_empty()
    }

    /// Model of the primary provider.
    ///
    /// Placeholder services report `hash-placeholder-<dimension>`.
    pub fn model_name(&self) -> String {
        match self.inner.providers.first() {
            Some(provider) => provider.model.clone(),
            None => format!("hash-placeholder-{}", self.inner.dimension),
        }
    }

    /// Embed `texts` in one provider round trip.
    ///
    /// A lower-priority provider may answer when the primary fails, and it
    /// may serve a different model. [`Embeddings::model`] names the model that
    /// produced the vectors; callers that key vectors by model must check it.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Embeddings> {
        let providers = &self.inner.providers;
        let dim = self.inner.dimension;

        if texts.is_empty() {
            return Ok(Embeddings {
                model: self.model_name(),
                vectors: Vec::new(),
            });
        }

        if providers.is_empty() {
            debug!(count = texts.len(), "Generating hash-based placeholder embeddings");
            return Ok(Embeddings {
                model: self.model_name(),
                vectors: texts.iter().map(|t| hash_embed(t, dim)).collect(),
            });
        }

        debug!(count = texts.len(), "Generating API embeddings");

        let mut last_error = None;

        for provider in providers {
            if !provider.has_credentials() {
                debug!(provider = %provider.name, "Skipping provider without credentials");
                continue;
            }

            match self.try_provider(provider, &texts, dim).await {
                Ok(vectors) if vectors.len() == texts.len() => {
                    return Ok(Embeddings {
                        model: provider.model.clone(),
                        vectors,
                    })
                }
                Ok(vectors) => {
                    let e = Error::CountMismatch {
                        expected: texts.len(),
                        actual: vectors.len(),
                    };
                    warn!(provider = %provider.name, error = %e, "Embedding provider returned wrong count");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(provider = %provider.name, error = %e, "Embedding provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        // Placeholder vectors never stand in for a configured model.
        Err(last_error.unwrap_or(Error::AllProvidersFailed))
    }

    /// One provider, retrying transient failures with doubling backoff.
    async fn try_provider(
        &self,
        provider: &RuntimeEmbeddingProvider,
        texts: &[String],
        dim: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);
        let mut attempt = 1;

        loop {
            match self.call_provider(provider, texts, dim).await {
                Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                    debug!(provider = %provider.name, attempt, error = %e, "Transient embedding failure, retrying");
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn call_provider(
        &self,
        provider: &RuntimeEmbeddingProvider,
        texts: &[String],
        dim: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let protocol = Protocol::of(provider)?;
        let (url, body) = protocol.request(provider, texts, dim);

        let mut request = self.inner.client.post(&url).json(&body);
        match (protocol, provider.api_key.as_deref()) {
            (Protocol::Ollama, _) => {}
            (Protocol::Gemini, Some(key)) => request = request.query(&[("key", key)]),
            (Protocol::OpenAi, Some(key)) => request = request.bearer_auth(key),
            (_, None) => return Err(Error::NoCredentials),
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(format!("{} request failed: {}", provider.name, e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Provider(format!("{} body unreadable: {}", provider.name, e)))?;

        match (status.is_success(), protocol.decode(&text)) {
            (true, decoded) => decoded,
            (false, Err(Error::Provider(message))) => Err(Error::Provider(format!(
                "{} returned {}: {}",
                provider.name, status, message
            ))),
            (false, _) => Err(Error::Provider(format!("{} returned {}", provider.name, status))),
        }
    }
}

/// Rate limits, overload and timeouts are worth another attempt.
fn is_transient(error: &Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["rate", "limit", "429", "503", "timeout", "temporarily"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// Generate a deterministic embedding from text using hashing.
///
/// This is NOT semantic: identical texts map to identical unit vectors,
/// unrelated texts are close to orthogonal.
pub fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut embedding: Vec<f32> = (0..dim)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            (i as u64).hash(&mut hasher);
            let hash = hasher.finish();
            // Convert to float in [-1, 1] range
            ((hash as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32
        })
        .collect();

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut embedding {
            *x /= norm;
        }
    }

    embedding
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn openai_provider(base_url: String, priority: i32) -> RuntimeEmbeddingProvider {
        RuntimeEmbeddingProvider {
            name: "openai".to_string(),
            base_url,
            model: "text-embedding-3-small".to_string(),
            api_key: Some("test-key".to_string()),
            dimension: Some(3),
            priority,
        }
    }

    #[test]
    fn test_hash_embed_deterministic() {
        let emb1 = hash_embed("test text", 384);
        let emb2 = hash_embed("test text", 384);

        assert_eq!(emb1, emb2);
        assert_eq!(emb1.len(), 384);
        assert_ne!(emb1, hash_embed("other text", 384));
    }

    #[test]
    fn test_hash_embed_normalized() {
        let emb = hash_embed("test text", 384);
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();

        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_placeholder_service() {
        let service = EmbeddingService::placeholder(384).unwrap();

        assert!(!service.has_providers());
        assert_eq!(service.dimension(), 384);
        assert_eq!(service.model_name(), "hash-placeholder-384");

        assert!(service.embed(vec![]).await.unwrap().vectors.is_empty());

        let result = service
            .embed(vec!["hello".to_string(), "world".to_string()])
            .await
            .unwrap();
        assert_eq!(result.model, "hash-placeholder-384");
        assert_eq!(result.vectors.len(), 2);
        assert_eq!(result.vectors[0], hash_embed("hello", 384));
    }

    #[test]
    fn test_with_model() {
        let placeholder = EmbeddingService::placeholder(384).unwrap();
        let target = placeholder.with_model("anything", Some(8)).unwrap();
        assert_eq!(target.model_name(), "hash-placeholder-8");

        let real = EmbeddingService::from_providers(
            vec![openai_provider("http://localhost:1".to_string(), 1)],
            3,
        )
        .unwrap();
        let target = real.with_model("text-embedding-3-large", None).unwrap();
        assert_eq!(target.model_name(), "text-embedding-3-large");
        assert_eq!(target.dimension(), 3072);
        assert_eq!(target.providers(), vec!["openai".to_string()]);
    }

    #[tokio::test]
    async fn test_openai_batch_sorted_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [0.0, 1.0, 0.0], "index": 1},
                    {"embedding": [1.0, 0.0, 0.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let service =
            EmbeddingService::from_providers(vec![openai_provider(server.uri(), 1)], 3).unwrap();
        let result = service
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(result.vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        assert_eq!(result.model, "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"message": "boom"}
            })))
            .mount(&failing)
            .await;

        let healthy = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.5, 0.5, 0.5], "index": 0}]
            })))
            .mount(&healthy)
            .await;

        let fallback = RuntimeEmbeddingProvider {
            model: "text-embedding-ada-002".to_string(),
            ..openai_provider(healthy.uri(), 2)
        };
        let service =
            EmbeddingService::from_providers(vec![openai_provider(failing.uri(), 1), fallback], 3).unwrap();

        let result = service.embed(vec!["hello".to_string()]).await.unwrap();
        assert_eq!(result.vectors, vec![vec![0.5, 0.5, 0.5]]);
        assert_eq!(result.model, "text-embedding-ada-002");
        assert_eq!(service.model_name(), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_an_error() {
        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"message": "boom"}
            })))
            .mount(&failing)
            .await;

        let service =
            EmbeddingService::from_providers(vec![openai_provider(failing.uri(), 1)], 3).unwrap();

        let err = service.embed(vec!["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.5, 0.5, 0.5], "index": 0}]
            })))
            .mount(&server)
            .await;

        let service =
            EmbeddingService::from_providers(vec![openai_provider(server.uri(), 1)], 3).unwrap();
        let err = service
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CountMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_decode_reply_shapes() {
        let gemini = r#"{"embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]}"#;
        assert_eq!(Protocol::Gemini.decode(gemini).unwrap(), vec![vec![0.1, 0.2], vec![0.3, 0.4]]);

        let ollama_single = r#"{"embedding": [1.0, 2.0]}"#;
        assert_eq!(Protocol::Ollama.decode(ollama_single).unwrap(), vec![vec![1.0, 2.0]]);

        let ollama_error = r#"{"error": "model not found"}"#;
        assert!(matches!(Protocol::Ollama.decode(ollama_error), Err(Error::Provider(_))));

        assert!(matches!(Protocol::OpenAi.decode("<html>"), Err(Error::Internal(_))));
    }

    #[test]
    fn test_gemini_request_targets_batch_endpoint() {
        let provider = RuntimeEmbeddingProvider {
            name: "gemini".to_string(),
            base_url: "https://example.test/v1beta/".to_string(),
            model: "text-embedding-004".to_string(),
            api_key: Some("k".to_string()),
            dimension: Some(768),
            priority: 1,
        };
        let (url, body) = Protocol::Gemini.request(&provider, &["hi".to_string()], 768);
        assert_eq!(url, "https://example.test/v1beta/models/text-embedding-004:batchEmbedContents");
        assert_eq!(body["requests"][0]["content"]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_default_dimensions() {
        assert_eq!(default_dimension("text-embedding-004"), 768);
        assert_eq!(default_dimension("text-embedding-3-small"), 1536);
        assert_eq!(default_dimension("text-embedding-3-large"), 3072);
        assert_eq!(default_dimension("unknown-model"), 384);
    }

    #[test]
    fn test_default_endpoints_and_models() {
        assert_eq!(default_endpoint("openai"), "https://api.openai.com/v1");
        assert_eq!(default_endpoint("ollama"), "http://localhost:11434");
        assert_eq!(default_model("gemini"), "text-embedding-004");
        assert_eq!(default_model("ollama"), "nomic-embed-text");
    }
}
