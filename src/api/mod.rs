//! API Routes for Chronicle
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod artifacts;
mod events;
mod search;
pub mod status;
mod summaries;
mod timeline;

use axum::Router;

use crate::middleware::require_owner;
use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /events/* - Append and read memory events (owner-scoped)
/// - /search - Hybrid search (owner-scoped)
/// - /timeline - Daily timeline (owner-scoped)
/// - /summaries/* - Period summaries (owner-scoped)
/// - /artifacts/* - Embeddings, analyses, migrations (owner-scoped)
/// - /health - Health check (public)
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health endpoint (public)
        .merge(status::routes())
        // Memory routes
        .merge(owner_routes())
}

/// Routes that act on behalf of the owner named in `X-Owner-Id`.
fn owner_routes() -> Router<AppState> {
    Router::new()
        .nest("/events", events::routes())
        .merge(search::routes())
        .merge(timeline::routes())
        .nest("/summaries", summaries::routes())
        .nest("/artifacts", artifacts::routes())
        .layer(axum::middleware::from_fn(require_owner))
}
