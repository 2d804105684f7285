//! Summary Routes
//!
//! Routes:
//! - GET /summaries?granularity=daily&limit=N - List stored summaries
//! - GET /summaries/daily/:date - Get a daily summary
//! - POST /summaries/daily/:date - Generate (or regenerate) a daily summary
//! - GET /summaries/weekly/:year/:week - Get an ISO-week summary
//! - POST /summaries/weekly/:year/:week - Generate an ISO-week summary
//! - GET /summaries/monthly/:year/:month - Get a monthly summary
//! - POST /summaries/monthly/:year/:month - Generate a monthly summary

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use chronicle_models::{Granularity, Period, PeriodSummary};
use serde::{Deserialize, Serialize};

use crate::middleware::OwnerContext;
use crate::{AppState, Error, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_summaries))
        .route("/daily/:date", get(get_daily).post(generate_daily))
        .route("/weekly/:year/:week", get(get_weekly).post(generate_weekly))
        .route("/monthly/:year/:month", get(get_monthly).post(generate_monthly))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListSummariesQuery {
    pub granularity: Granularity,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    30
}

#[derive(Debug, Serialize)]
pub struct SummariesResponse {
    pub summaries: Vec<PeriodSummary>,
}

#[derive(Debug, Deserialize)]
pub struct WeekPath {
    pub year: i32,
    pub week: u32,
}

#[derive(Debug, Deserialize)]
pub struct MonthPath {
    pub year: i32,
    pub month: u32,
}

fn found(summary: Option<PeriodSummary>, period: Period) -> Result<Json<PeriodSummary>> {
    summary.map(Json).ok_or_else(|| {
        Error::NotFound(format!(
            "No {} summary for {}",
            period.granularity(),
            period.key()
        ))
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /summaries
async fn list_summaries(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<ListSummariesQuery>,
) -> Result<Json<SummariesResponse>> {
    let summaries = state
        .summarizer
        .list(&owner.owner_id, query.granularity, query.limit.clamp(1, 365))
        .await?;
    Ok(Json(SummariesResponse { summaries }))
}

async fn get_daily(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<PeriodSummary>> {
    let summary = state.summarizer.get_daily(&owner.owner_id, date).await?;
    found(summary, Period::Daily { date })
}

async fn generate_daily(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<PeriodSummary>> {
    let summary = state.summarizer.generate_daily(&owner.owner_id, date).await?;
    Ok(Json(summary))
}

async fn get_weekly(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(path): Path<WeekPath>,
) -> Result<Json<PeriodSummary>> {
    let summary = state
        .summarizer
        .get_weekly(&owner.owner_id, path.year, path.week)
        .await?;
    found(
        summary,
        Period::Weekly {
            year: path.year,
            week: path.week,
        },
    )
}

async fn generate_weekly(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(path): Path<WeekPath>,
) -> Result<Json<PeriodSummary>> {
    let summary = state
        .summarizer
        .generate_weekly(&owner.owner_id, path.year, path.week)
        .await?;
    Ok(Json(summary))
}

async fn get_monthly(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(path): Path<MonthPath>,
) -> Result<Json<PeriodSummary>> {
    let summary = state
        .summarizer
        .get_monthly(&owner.owner_id, path.year, path.month)
        .await?;
    found(
        summary,
        Period::Monthly {
            year: path.year,
            month: path.month,
        },
    )
}

async fn generate_monthly(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Path(path): Path<MonthPath>,
) -> Result<Json<PeriodSummary>> {
    let summary = state
        .summarizer
        .generate_monthly(&owner.owner_id, path.year, path.month)
        .await?;
    Ok(Json(summary))
}
