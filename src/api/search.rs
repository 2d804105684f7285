//! Search Routes
//!
//! Routes:
//! - POST /search - Hybrid search over the owner's events

use axum::{extract::State, routing::post, Extension, Json, Router};
use chronicle_models::{SearchQuery, SearchResponse};

use crate::middleware::OwnerContext;
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", post(search))
}

/// POST /search
async fn search(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerContext>,
    Json(query): Json<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let response = state.search.search(&owner.owner_id, query).await?;
    Ok(Json(response))
}
