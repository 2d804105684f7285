//! Timeline Routes
//!
//! Routes:
//! - GET /timeline?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD - Events grouped by day

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use chronicle_models::DailyTimeline;
use serde::Deserialize;

use crate::middleware::OwnerContext;
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new().route("/timeline", get(daily_timeline))
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// GET /timeline
async fn daily_timeline(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<DailyTimeline>> {
    let timeline = state
        .timeline
        .get_daily_timeline(&owner.owner_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(timeline))
}
