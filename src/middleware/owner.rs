//! Owner scoping middleware.
//!
//! Every memory route works on behalf of exactly one owner, named by the
//! `X-Owner-Id` header. Transport authentication belongs to the hosting
//! platform; this layer only makes the owner explicit.

use axum::{body::Body, extract::Request, middleware::Next, response::Response};

use crate::error::Error;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner context injected into request extensions.
#[derive(Clone, Debug)]
pub struct OwnerContext {
    pub owner_id: String,
}

fn extract_owner(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(String::from)
}

/// Middleware that requires an `X-Owner-Id` header.
///
/// # Errors
///
/// Returns 401 Unauthorized when the header is missing or blank.
pub async fn require_owner(mut req: Request<Body>, next: Next) -> Result<Response, Error> {
    let owner_id = extract_owner(&req)
        .ok_or_else(|| Error::Unauthenticated("missing X-Owner-Id header".to_string()))?;

    tracing::trace!(owner_id = %owner_id, "Owner resolved");
    req.extensions_mut().insert(OwnerContext { owner_id });

    Ok(next.run(req).await)
}
