//! Data models for Chronicle.
//!
//! Defines the core types used throughout the memory subsystem:
//! immutable events, model-scoped artifacts, period summaries,
//! timeline groups, and the query/response DTOs for hybrid search.
//!
//! This crate has no database dependencies; row mapping lives in the
//! storage layer of the `chronicle` crate.

mod artifact;
mod event;
mod search;
mod summary;
mod temporal;
mod timeline;

pub use artifact::*;
pub use event::*;
pub use search::*;
pub use summary::*;
pub use temporal::*;
pub use timeline::*;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp, truncated to the stored millisecond precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Format a timestamp as fixed-width RFC 3339 (millisecond precision, `Z` suffix).
///
/// Every stored timestamp uses this form so lexical order equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp written by [`format_timestamp`] (or any RFC 3339 string).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
