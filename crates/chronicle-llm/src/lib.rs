//! LLM service with multi-provider fallback.
//!
//! Supports Gemini, Anthropic, OpenRouter, and OpenAI with automatic fallback
//! when rate limits are hit or providers fail. Used by Chronicle to produce
//! analysis artifacts and period summaries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Maximum retries per provider before fallback
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

/// Minimum interval between health checks
const HEALTH_CHECK_INTERVAL_SECS: u64 = 60;

/// Number of consecutive errors before marking unavailable
const ERROR_THRESHOLD: u32 = 3;

const TEMPERATURE: f32 = 0.3;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Error types for the LLM service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("No providers configured")]
    NoProviders,

    #[error("Request failed: {0}")]
    Request(String),
}

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub priority: u8,
}

/// Configuration for the LLM service.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub providers: Vec<LlmProviderConfig>,
}

/// Runtime provider configuration.
#[derive(Debug, Clone)]
pub struct RuntimeLlmProvider {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub priority: i32,
}

impl RuntimeLlmProvider {
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

impl From<&LlmProviderConfig> for RuntimeLlmProvider {
    fn from(config: &LlmProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: if config.api_key.is_empty() {
                None
            } else {
                Some(config.api_key.clone())
            },
            priority: config.priority as i32,
        }
    }
}

/// Get default endpoint for a provider
pub fn default_endpoint(name: &str) -> String {
    match name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta".to_string(),
        "anthropic" => "https://api.anthropic.com/v1".to_string(),
        "openrouter" => "https://openrouter.ai/api/v1".to_string(),
        "openai" => "https://api.openai.com/v1".to_string(),
        _ => "https://api.openai.com/v1".to_string(),
    }
}

/// Get default model for a provider
pub fn default_model(name: &str) -> String {
    match name {
        "gemini" => "gemini-1.5-flash".to_string(),
        "anthropic" => "claude-3-5-haiku-20241022".to_string(),
        "openrouter" => "meta-llama/llama-3-8b-instruct:free".to_string(),
        "openai" => "gpt-4o-mini".to_string(),
        _ => "gpt-4o-mini".to_string(),
    }
}

/// Completion client bound to a fixed, priority-ordered provider list.
///
/// Providers are tried in order. Consecutive failures across all providers
/// mark the service unavailable until [`HEALTH_CHECK_INTERVAL_SECS`] pass.
#[derive(Clone)]
pub struct LlmService {
    inner: Arc<Inner>,
}

struct Inner {
    providers: Vec<RuntimeLlmProvider>,
    client: Client,
    health: Mutex<Health>,
}

/// A provider reply and the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T = String> {
    pub model: String,
    pub content: T,
}

#[derive(Default)]
struct Health {
    last_error: Option<String>,
    consecutive_failures: u32,
    failed_at: Option<Instant>,
}

/// Request and reply shape of a provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Gemini,
    Anthropic,
    /// OpenAI, OpenRouter and compatible gateways.
    ChatCompletions,
}

impl Dialect {
    fn of(provider: &RuntimeLlmProvider) -> Self {
        match provider.name.as_str() {
            "gemini" => Self::Gemini,
            "anthropic" => Self::Anthropic,
            _ => Self::ChatCompletions,
        }
    }

    fn endpoint(self, provider: &RuntimeLlmProvider) -> String {
        let base = provider.base_url.trim_end_matches('/');
        match self {
            Self::Gemini => format!("{}/models/{}:generateContent", base, provider.model),
            Self::Anthropic => format!("{}/messages", base),
            Self::ChatCompletions => format!("{}/chat/completions", base),
        }
    }

    fn body(self, provider: &RuntimeLlmProvider, prompt: &str, max_tokens: u32) -> Value {
        match self {
            Self::Gemini => json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {"maxOutputTokens": max_tokens, "temperature": TEMPERATURE}
            }),
            Self::Anthropic | Self::ChatCompletions => json!({
                "model": provider.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": max_tokens,
                "temperature": TEMPERATURE
            }),
        }
    }

    /// Text of the first candidate in a reply.
    fn completion_text(self, reply: &Value) -> Option<String> {
        let pointers: &[&str] = match self {
            Self::Gemini => &["/candidates/0/content/parts/0/text"],
            Self::Anthropic => &["/content/0/text"],
            Self::ChatCompletions => &["/choices/0/message/content", "/choices/0/text"],
        };
        pointers
            .iter()
            .find_map(|ptr| reply.pointer(ptr).and_then(Value::as_str))
            .map(str::to_string)
    }
}

/// Read a reply body, surfacing an embedded `error.message` first.
fn parse_reply(dialect: Dialect, body: &str) -> Result<String> {
    let reply: Value = serde_json::from_str(body)
        .map_err(|e| Error::Llm(format!("unparseable reply: {}", e)))?;

    if let Some(message) = reply.pointer("/error/message").and_then(Value::as_str) {
        return Err(Error::Llm(message.to_string()));
    }

    dialect
        .completion_text(&reply)
        .ok_or_else(|| Error::Llm(format!("no completion text in {:?} reply", dialect)))
}

impl LlmService {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let mut providers: Vec<RuntimeLlmProvider> =
            config.providers.iter().map(RuntimeLlmProvider::from).collect();
        providers.sort_by_key(|p| p.priority);
        Self::with_providers(providers)
    }

    /// Service over already-resolved providers, kept in the given order.
    pub fn with_providers(providers: Vec<RuntimeLlmProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Request(format!("http client: {}", e)))?;

        match providers.first() {
            None => warn!("No completion providers, analyses and summaries are disabled"),
            Some(primary) => info!(
                model = %primary.model,
                fallbacks = providers.len() - 1,
                "Completion service ready"
            ),
        }

        Ok(Self {
            inner: Arc::new(Inner {
                providers,
                client,
                health: Mutex::new(Health::default()),
            }),
        })
    }

    /// A service on the first usable provider's endpoint and key, serving `model`.
    ///
    /// Without a credentialed provider the result has no providers at all.
    pub fn with_model(&self, model: &str) -> Result<Self> {
        let providers = self
            .inner
            .providers
            .iter()
            .find(|p| p.has_credentials())
            .map(|primary| RuntimeLlmProvider {
                model: model.to_string(),
                ..primary.clone()
            })
            .into_iter()
            .collect();

        Self::with_providers(providers)
    }

    /// False with no providers, or while backing off after repeated failures.
    pub fn is_available(&self) -> bool {
        if self.inner.providers.is_empty() {
            return false;
        }

        let health = self.health();
        match health.failed_at {
            Some(at) if health.consecutive_failures >= ERROR_THRESHOLD => {
                at.elapsed().as_secs() >= HEALTH_CHECK_INTERVAL_SECS
            }
            _ => true,
        }
    }

    /// Last failure message and how many calls in a row have failed.
    pub fn last_failure(&self) -> Option<(String, u32)> {
        let health = self.health();
        health
            .last_error
            .clone()
            .map(|msg| (msg, health.consecutive_failures))
    }

    /// Model of the highest-priority provider, if any.
    pub fn model_name(&self) -> Option<String> {
        self.inner.providers.first().map(|p| p.model.clone())
    }

    fn health(&self) -> MutexGuard<'_, Health> {
        self.inner
            .health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_failure(&self, error: &str) {
        let mut health = self.health();
        health.last_error = Some(error.to_string());
        health.consecutive_failures += 1;
        health.failed_at = Some(Instant::now());
    }

    fn record_success(&self) {
        *self.health() = Health::default();
    }

    /// Complete a prompt with automatic provider fallback.
    ///
    /// The reply names the model that answered, which is not the primary
    /// model when a fallback provider serves a different one.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<Completion> {
        let providers = &self.inner.providers;

        if providers.is_empty() {
            return Err(Error::NoProviders);
        }

        let mut last_error = None;

        for provider in providers {
            if !provider.has_credentials() {
                debug!(provider = %provider.name, "Skipping provider without credentials");
                continue;
            }

            match self.try_provider(provider, prompt, max_tokens).await {
                Ok(content) => {
                    self.record_success();
                    return Ok(Completion {
                        model: provider.model.clone(),
                        content,
                    });
                }
                Err(e) => {
                    warn!(
                        provider = %provider.name,
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| Error::Llm("no provider has credentials".to_string()));
        self.record_failure(&error.to_string());
        Err(error)
    }

    /// Complete a prompt and parse the first JSON object in the reply.
    pub async fn complete_json(&self, prompt: &str, max_tokens: u32) -> Result<Completion<Value>> {
        let Completion { model, content } = self.complete(prompt, max_tokens).await?;
        let content = extract_json(&content)
            .ok_or_else(|| Error::Llm("Response contained no JSON object".to_string()))?;
        Ok(Completion { model, content })
    }

    /// One provider, retrying transient failures with doubling backoff.
    async fn try_provider(
        &self,
        provider: &RuntimeLlmProvider,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);
        let mut attempt = 1;

        loop {
            match self.call_provider(provider, prompt, max_tokens).await {
                Err(e) if attempt < MAX_RETRIES && is_transient(&e) => {
                    debug!(provider = %provider.name, attempt, error = %e, "Transient completion failure, retrying");
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
        provider: &RuntimeLlmProvider,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let key = provider
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Llm(format!("no credentials for {}", provider.name)))?;
        let dialect = Dialect::of(provider);

        debug!(provider = %provider.name, model = %provider.model, "Requesting completion");

        let request = self
            .inner
            .client
            .post(dialect.endpoint(provider))
            .json(&dialect.body(provider, prompt, max_tokens));
        let request = match dialect {
            Dialect::Gemini => request.query(&[("key", key)]),
            Dialect::Anthropic => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Dialect::ChatCompletions => request.bearer_auth(key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Request(format!("unreadable body: {}", e)))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(Error::Llm(format!("{} returned {}: {}", provider.name, status, body)));
        }

        parse_reply(dialect, &body)
    }
}

/// Rate limits, overload and timeouts are worth another attempt.
fn is_transient(error: &Error) -> bool {
    if matches!(error, Error::RateLimitExceeded) {
        return true;
    }
    let msg = error.to_string().to_lowercase();
    ["rate limit", "429", "503", "timeout", "timed out"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// First JSON object embedded in model output.
///
/// Models wrap JSON in prose or code fences; every `{` is tried as the start
/// of an object and trailing text after it is ignored.
pub fn extract_json(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(|parsed| parsed.ok())
            .filter(Value::is_object)
    })
}
