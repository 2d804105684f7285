//! Status Routes
//!
//! Routes:
//! - GET /health - Health check with database and provider status

use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db;
use crate::AppState;

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<DependencyCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Basic health check.
///
/// GET /health
///
/// The database decides healthy/unhealthy; a completion provider in its
/// error window only degrades the status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = Instant::now();
    let database = match db::pool::health_check(&state.db).await {
        Ok(()) => DependencyCheck {
            name: "database".to_string(),
            status: HealthStatus::Healthy,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            message: None,
        },
        Err(e) => DependencyCheck {
            name: "database".to_string(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(e.to_string()),
        },
    };

    let embedding = state.artifacts.embedding_model();
    let embeddings = DependencyCheck {
        name: "embeddings".to_string(),
        status: if embedding.service.has_providers() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        latency_ms: None,
        message: Some(embedding.name.clone()),
    };

    let llm = &state.artifacts.analysis_model().llm;
    let completion = DependencyCheck {
        name: "llm".to_string(),
        status: if llm.is_available() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        latency_ms: None,
        message: llm.last_failure().map(|(error, count)| format!("{} ({} failures)", error, count)),
    };

    let checks = vec![database, embeddings, completion];
    let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        checks,
    })
}
