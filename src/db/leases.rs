//! Migration leases.
//!
//! A lease row grants one holder the right to run a migration or backfill
//! for `(owner, model, kind)` until it is released or expires.

use chrono::{DateTime, Utc};
use chronicle_models::format_timestamp;

use super::DbPool;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseKind {
    Embedding,
    Analysis,
}

impl LeaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Analysis => "analysis",
        }
    }
}

/// Try to take the lease. Returns false while another holder's lease is live.
///
/// An expired lease is taken over in the same statement.
pub async fn try_acquire_lease(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
    kind: LeaseKind,
    holder: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let now = format_timestamp(&now);
    let result = sqlx::query(
        r#"
        INSERT INTO migration_leases (owner_id, model_name, kind, holder, acquired_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(owner_id, model_name, kind) DO UPDATE SET
            holder = excluded.holder,
            acquired_at = excluded.acquired_at,
            expires_at = excluded.expires_at
        WHERE migration_leases.expires_at <= ?
        "#,
    )
    .bind(owner_id)
    .bind(model_name)
    .bind(kind.as_str())
    .bind(holder)
    .bind(&now)
    .bind(format_timestamp(&expires_at))
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move the expiry of `holder`'s lease. Returns false if `holder` no longer owns it.
pub async fn renew_lease(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
    kind: LeaseKind,
    holder: &str,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE migration_leases SET expires_at = ?
        WHERE owner_id = ? AND model_name = ? AND kind = ? AND holder = ?
        "#,
    )
    .bind(format_timestamp(&expires_at))
    .bind(owner_id)
    .bind(model_name)
    .bind(kind.as_str())
    .bind(holder)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Release a lease held by `holder`. Someone else's lease is left alone.
pub async fn release_lease(
    pool: &DbPool,
    owner_id: &str,
    model_name: &str,
    kind: LeaseKind,
    holder: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM migration_leases
        WHERE owner_id = ? AND model_name = ? AND kind = ? AND holder = ?
        "#,
    )
    .bind(owner_id)
    .bind(model_name)
    .bind(kind.as_str())
    .bind(holder)
    .execute(pool)
    .await?;

    Ok(())
}
