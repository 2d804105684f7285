//! Event Routes
//!
//! Append-only memory events.
//!
//! Routes:
//! - GET /events - List events (temporal, type or agent filter)
//! - POST /events - Append an event
//! - POST /events/batch - Append several events atomically
//! - POST /events/chain - Append a conversation as a parent-linked chain
//! - GET /events/count - Count the owner's events
//! - GET /events/session/:session_id - Events of a session
//! - GET /events/:id - Get one event
//! - GET /events/:id/chain - Conversation chain ending at an event

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use chronicle_models::{ChainMessage, MemoryEvent, NewEvent, Page, TemporalFilter};
use serde::{Deserialize, Serialize};

use crate::middleware::OwnerContext;
use crate::{AppState, Error, Result};

/// Build event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(append_event))
        .route("/batch", post(append_batch))
        .route("/chain", post(append_chain))
        .route("/count", get(count_events))
        .route("/session/:session_id", get(session_events))
        .route("/:id", get(get_event))
        .route("/:id/chain", get(get_chain))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing events.
///
/// `event_type` and `agent` take comma-separated lists and are applied on
/// their own; otherwise the temporal fields select the events.
#[derive(Debug, Deserialize, Default)]
pub struct ListEventsQuery {
    pub event_type: Option<String>,
    pub agent: Option<String>,
    /// Natural-language phrase, e.g. "yesterday" or "최근 3일"
    pub natural: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hour: Option<u32>,
    pub day_of_week: Option<u32>,
    pub week_of_year: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

impl ListEventsQuery {
    fn temporal(&self) -> TemporalFilter {
        TemporalFilter {
            natural: self.natural.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            hour: self.hour,
            day_of_week: self.day_of_week,
            week_of_year: self.week_of_year,
            month: self.month,
            year: self.year,
        }
    }

    fn page(&self) -> Page {
        Page::new(self.limit.clamp(1, 1000), self.offset.max(0))
    }
}

#[derive(Debug, Deserialize)]
pub struct AppendBatchRequest {
    pub events: Vec<NewEvent>,
}

#[derive(Debug, Deserialize)]
pub struct AppendChainRequest {
    pub session_id: String,
    pub messages: Vec<ChainMessage>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<MemoryEvent>,
    pub count: usize,
}

impl From<Vec<MemoryEvent>> for EventsResponse {
    fn from(events: Vec<MemoryEvent>) -> Self {
        Self {
            count: events.len(),
            events,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// List events.
///
/// GET /events
async fn list_events(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<EventsResponse>> {
    let page = query.page();

    let events = if let Some(types) = query.event_type.as_deref() {
        state
            .events
            .filter_by_event_type(&owner.owner_id, &split_list(types), page)
            .await?
    } else if let Some(agents) = query.agent.as_deref() {
        state
            .events
            .filter_by_agent(&owner.owner_id, &split_list(agents), page)
            .await?
    } else {
        state
            .events
            .query_by_time(&owner.owner_id, &query.temporal(), page)
            .await?
    };

    Ok(Json(events.into()))
}

/// Append an event.
///
/// POST /events
async fn append_event(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(input): Json<NewEvent>,
) -> Result<(StatusCode, Json<MemoryEvent>)> {
    let event = state.events.append(&owner.owner_id, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Append several events atomically.
///
/// POST /events/batch
async fn append_batch(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<AppendBatchRequest>,
) -> Result<(StatusCode, Json<EventsResponse>)> {
    let events = state.events.append_batch(&owner.owner_id, request.events).await?;
    Ok((StatusCode::CREATED, Json(events.into())))
}

/// Append a conversation chain.
///
/// POST /events/chain
async fn append_chain(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(request): Json<AppendChainRequest>,
) -> Result<(StatusCode, Json<EventsResponse>)> {
    let events = state
        .events
        .append_chain(&owner.owner_id, request.messages, &request.session_id)
        .await?;
    Ok((StatusCode::CREATED, Json(events.into())))
}

/// GET /events/count
async fn count_events(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
) -> Result<Json<CountResponse>> {
    let count = state.events.count(&owner.owner_id).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /events/session/:session_id
async fn session_events(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(session_id): Path<String>,
) -> Result<Json<EventsResponse>> {
    let events = state
        .events
        .get_by_session_id(&owner.owner_id, &session_id)
        .await?;
    Ok(Json(events.into()))
}

/// GET /events/:id
async fn get_event(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> Result<Json<MemoryEvent>> {
    state
        .events
        .get_by_id(&owner.owner_id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("Event not found: {}", id)))
}

/// Root-first chain of parents ending at the event.
///
/// GET /events/:id/chain
async fn get_chain(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>> {
    let chain = state
        .events
        .get_conversation_chain(&owner.owner_id, &id)
        .await?;
    Ok(Json(chain.into()))
}
