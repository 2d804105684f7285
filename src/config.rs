//! Configuration management for Chronicle.
//!
//! Loads configuration from environment variables with support for:
//! - Multiple embedding and LLM providers with fallback priority
//! - Ranking weights and search tuning
//! - Summary sampling caps and the local calendar used for day boundaries

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc, Weekday};
use chronicle_embeddings::{EmbeddingConfig, EmbeddingProviderConfig};
use chronicle_llm::{LlmConfig, LlmProviderConfig};
use chronicle_models::SearchWeights;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub models: ModelConfig,
    pub search: SearchConfig,
    pub artifacts: ArtifactConfig,
    pub summary: SummaryConfig,
    pub temporal: TemporalConfig,
    pub event_log: EventLogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8770,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./data/chronicle.db".to_string(),
        }
    }
}

/// Versions recorded on artifacts produced by the current models.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub embedding_version: String,
    pub analysis_version: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_version: "1".to_string(),
            analysis_version: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub default_weights: SearchWeights,
    pub default_limit: usize,
    /// Semantic hits fetched per requested result.
    pub overfetch_factor: usize,
    /// Minimum cosine similarity for a semantic hit.
    pub similarity_floor: f32,
    /// Days after which the recency score reaches zero.
    pub recency_window_days: f64,
    /// Importance used when an event has no analysis.
    pub default_importance: f64,
    /// Upper bound on candidates scored for text-less queries.
    pub max_candidates: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_weights: SearchWeights::default(),
            default_limit: 20,
            overfetch_factor: 3,
            similarity_floor: 0.3,
            recency_window_days: 30.0,
            default_importance: 0.5,
            max_candidates: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub batch_size: usize,
    pub similarity_threshold: f32,
    pub similarity_limit: usize,
    pub lease_ttl: Duration,
    /// Token budget for one analysis completion.
    pub analysis_max_tokens: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            similarity_threshold: 0.7,
            similarity_limit: 10,
            lease_ttl: Duration::from_secs(3600),
            analysis_max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// First N events of the day, chronological.
    pub daily_sample: usize,
    /// Most recent N events of the week.
    pub weekly_sample: usize,
    /// Most recent N events of the month.
    pub monthly_sample: usize,
    pub max_tokens: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            daily_sample: 50,
            weekly_sample: 20,
            monthly_sample: 30,
            max_tokens: 2048,
        }
    }
}

/// Local calendar used for partition fields and phrase resolution.
#[derive(Debug, Clone, Copy)]
pub struct TemporalConfig {
    pub utc_offset: FixedOffset,
    pub week_start: Weekday,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            utc_offset: utc(),
            week_start: Weekday::Mon,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Maximum parent hops followed when reconstructing a conversation.
    pub max_chain_depth: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let search_defaults = SearchConfig::default();
        let artifact_defaults = ArtifactConfig::default();
        let summary_defaults = SummaryConfig::default();
        let models_defaults = ModelConfig::default();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_parse("PORT", 8770),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/chronicle.db"),
            },
            embedding: Self::parse_embedding_config(),
            llm: LlmConfig {
                providers: Self::parse_llm_providers(),
            },
            models: ModelConfig {
                embedding_version: env_or("EMBEDDING_MODEL_VERSION", &models_defaults.embedding_version),
                analysis_version: env_or("ANALYSIS_MODEL_VERSION", &models_defaults.analysis_version),
            },
            search: SearchConfig {
                default_weights: SearchWeights {
                    semantic: env_parse("SEARCH_WEIGHT_SEMANTIC", search_defaults.default_weights.semantic),
                    temporal: env_parse("SEARCH_WEIGHT_TEMPORAL", search_defaults.default_weights.temporal),
                    importance: env_parse("SEARCH_WEIGHT_IMPORTANCE", search_defaults.default_weights.importance),
                },
                default_limit: env_parse("SEARCH_DEFAULT_LIMIT", search_defaults.default_limit),
                overfetch_factor: env_parse("SEARCH_OVERFETCH_FACTOR", search_defaults.overfetch_factor).max(1),
                similarity_floor: env_parse("SEARCH_SIMILARITY_FLOOR", search_defaults.similarity_floor),
                recency_window_days: env_parse("SEARCH_RECENCY_WINDOW_DAYS", search_defaults.recency_window_days),
                default_importance: env_parse("SEARCH_DEFAULT_IMPORTANCE", search_defaults.default_importance),
                max_candidates: env_parse("SEARCH_MAX_CANDIDATES", search_defaults.max_candidates),
            },
            artifacts: ArtifactConfig {
                batch_size: env_parse("ARTIFACT_BATCH_SIZE", artifact_defaults.batch_size).max(1),
                similarity_threshold: env_parse("SIMILARITY_THRESHOLD", artifact_defaults.similarity_threshold),
                similarity_limit: env_parse("SIMILARITY_LIMIT", artifact_defaults.similarity_limit),
                lease_ttl: Duration::from_secs(env_parse(
                    "MIGRATION_LEASE_TTL_SECS",
                    artifact_defaults.lease_ttl.as_secs(),
                )),
                analysis_max_tokens: env_parse("ANALYSIS_MAX_TOKENS", artifact_defaults.analysis_max_tokens),
            },
            summary: SummaryConfig {
                daily_sample: env_parse("SUMMARY_DAILY_SAMPLE", summary_defaults.daily_sample),
                weekly_sample: env_parse("SUMMARY_WEEKLY_SAMPLE", summary_defaults.weekly_sample),
                monthly_sample: env_parse("SUMMARY_MONTHLY_SAMPLE", summary_defaults.monthly_sample),
                max_tokens: env_parse("SUMMARY_MAX_TOKENS", summary_defaults.max_tokens),
            },
            temporal: Self::parse_temporal_config(),
            event_log: EventLogConfig {
                max_chain_depth: env_parse("MAX_CHAIN_DEPTH", EventLogConfig::default().max_chain_depth),
            },
        }
    }

    /// Parse LLM providers from environment.
    /// Supports Gemini, Anthropic, OpenRouter, and OpenAI with automatic fallback ordering.
    fn parse_llm_providers() -> Vec<LlmProviderConfig> {
        let mut providers = Vec::new();

        // Gemini (priority 1 - free tier)
        if let Ok(api_key) = env::var("GOOGLE_API_KEY") {
            providers.push(LlmProviderConfig {
                name: "gemini".to_string(),
                base_url: chronicle_llm::default_endpoint("gemini"),
                model: env_or("GEMINI_MODEL", &chronicle_llm::default_model("gemini")),
                api_key,
                priority: 1,
            });
        }

        if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
            providers.push(LlmProviderConfig {
                name: "anthropic".to_string(),
                base_url: chronicle_llm::default_endpoint("anthropic"),
                model: env_or("ANTHROPIC_MODEL", &chronicle_llm::default_model("anthropic")),
                api_key,
                priority: 2,
            });
        }

        if let Ok(api_key) = env::var("OPENROUTER_API_KEY") {
            providers.push(LlmProviderConfig {
                name: "openrouter".to_string(),
                base_url: chronicle_llm::default_endpoint("openrouter"),
                model: env_or("OPENROUTER_MODEL", &chronicle_llm::default_model("openrouter")),
                api_key,
                priority: 3,
            });
        }

        // OpenAI-compatible; OPENAI_BASE_URL points it at a local gateway
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            providers.push(LlmProviderConfig {
                name: "openai".to_string(),
                base_url: env_or("OPENAI_BASE_URL", &chronicle_llm::default_endpoint("openai")),
                model: env_or("OPENAI_MODEL", &chronicle_llm::default_model("openai")),
                api_key,
                priority: 4,
            });
        }

        providers.sort_by_key(|p| p.priority);
        providers
    }

    /// Parse embedding providers from environment.
    /// Supports Gemini, OpenAI and a local Ollama with automatic fallback ordering.
    fn parse_embedding_config() -> EmbeddingConfig {
        let mut providers = Vec::new();

        if let Ok(api_key) = env::var("GOOGLE_API_KEY") {
            providers.push(EmbeddingProviderConfig {
                name: "gemini".to_string(),
                base_url: chronicle_embeddings::default_endpoint("gemini"),
                model: env_or(
                    "GEMINI_EMBEDDING_MODEL",
                    &chronicle_embeddings::default_model("gemini"),
                ),
                api_key,
                priority: 1,
            });
        }

        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            providers.push(EmbeddingProviderConfig {
                name: "openai".to_string(),
                base_url: env_or("OPENAI_BASE_URL", &chronicle_embeddings::default_endpoint("openai")),
                model: env_or(
                    "OPENAI_EMBEDDING_MODEL",
                    &chronicle_embeddings::default_model("openai"),
                ),
                api_key,
                priority: 2,
            });
        }

        // Ollama - local/self-hosted, no authentication
        if let Ok(ollama_url) = env::var("OLLAMA_URL") {
            providers.push(EmbeddingProviderConfig {
                name: "ollama".to_string(),
                base_url: ollama_url,
                model: env_or(
                    "OLLAMA_EMBEDDING_MODEL",
                    &chronicle_embeddings::default_model("ollama"),
                ),
                api_key: String::new(),
                priority: env_parse("OLLAMA_PRIORITY", 1),
            });
        }

        providers.sort_by_key(|p| p.priority);

        // Hash placeholder dimension when nothing is configured
        let default_dim = providers
            .first()
            .map(|p| chronicle_embeddings::default_dimension(&p.model))
            .unwrap_or(384);

        EmbeddingConfig {
            providers,
            dimension: env_parse("EMBEDDING_DIMENSION", default_dim),
        }
    }

    /// `LOCAL_UTC_OFFSET` is `+09:00` style; `WEEK_START` is a weekday name.
    fn parse_temporal_config() -> TemporalConfig {
        let defaults = TemporalConfig::default();
        TemporalConfig {
            utc_offset: env::var("LOCAL_UTC_OFFSET")
                .ok()
                .and_then(|s| parse_utc_offset(&s))
                .unwrap_or(defaults.utc_offset),
            week_start: env::var("WEEK_START")
                .ok()
                .and_then(|s| Weekday::from_str(&s).ok())
                .unwrap_or(defaults.week_start),
        }
    }
}

/// Parse `+09:00`, `-05:30`, `Z` or `UTC`.
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Some(utc());
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
