//! Middleware for Chronicle.
//!
//! - `owner` - resolves the owner every memory route is scoped to

mod owner;

pub use owner::{require_owner, OwnerContext, OWNER_HEADER};
