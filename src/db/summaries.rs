//! Period summary queries.

use chronicle_models::{format_timestamp, parse_timestamp, Granularity, Period, PeriodSummary};
use sqlx::FromRow;

use super::DbPool;
use crate::{Error, Result};

#[derive(Debug, Clone, FromRow)]
struct SummaryRow {
    id: String,
    owner_id: String,
    granularity: String,
    period_key: String,
    model_name: String,
    model_version: String,
    summary: String,
    details: String,    // JSON
    statistics: String, // JSON
    created_at: String,
    updated_at: String,
}

impl TryFrom<SummaryRow> for PeriodSummary {
    type Error = Error;

    fn try_from(row: SummaryRow) -> Result<Self> {
        let corrupt = |field: &str| Error::Internal(format!("Corrupt {} on summary {}", field, row.id));

        let granularity = Granularity::from_str(&row.granularity).ok_or_else(|| corrupt("granularity"))?;
        let period = Period::parse(granularity, &row.period_key).ok_or_else(|| corrupt("period_key"))?;

        Ok(PeriodSummary {
            period,
            details: serde_json::from_str(&row.details)?,
            statistics: serde_json::from_str(&row.statistics)?,
            created_at: parse_timestamp(&row.created_at).ok_or_else(|| corrupt("created_at"))?,
            updated_at: parse_timestamp(&row.updated_at).ok_or_else(|| corrupt("updated_at"))?,
            id: row.id,
            owner_id: row.owner_id,
            model_name: row.model_name,
            model_version: row.model_version,
            summary: row.summary,
        })
    }
}

/// Insert or replace the summary for `(owner, granularity, period, model)`.
///
/// The stored id and `created_at` of an existing row are kept.
pub async fn upsert_summary(pool: &DbPool, summary: &PeriodSummary) -> Result<PeriodSummary> {
    let row = sqlx::query_as::<_, SummaryRow>(
        r#"
        INSERT INTO period_summaries (
            id, owner_id, granularity, period_key, model_name, model_version,
            summary, details, statistics, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(owner_id, granularity, period_key, model_name) DO UPDATE SET
            model_version = excluded.model_version,
            summary = excluded.summary,
            details = excluded.details,
            statistics = excluded.statistics,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(&summary.id)
    .bind(&summary.owner_id)
    .bind(summary.period.granularity().as_str())
    .bind(summary.period.key())
    .bind(&summary.model_name)
    .bind(&summary.model_version)
    .bind(&summary.summary)
    .bind(serde_json::to_string(&summary.details)?)
    .bind(serde_json::to_string(&summary.statistics)?)
    .bind(format_timestamp(&summary.created_at))
    .bind(format_timestamp(&summary.updated_at))
    .fetch_one(pool)
    .await?;

    PeriodSummary::try_from(row)
}

pub async fn get_summary(
    pool: &DbPool,
    owner_id: &str,
    period: &Period,
    model_name: &str,
) -> Result<Option<PeriodSummary>> {
    sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT * FROM period_summaries
        WHERE owner_id = ? AND granularity = ? AND period_key = ? AND model_name = ?
        "#,
    )
    .bind(owner_id)
    .bind(period.granularity().as_str())
    .bind(period.key())
    .bind(model_name)
    .fetch_optional(pool)
    .await?
    .map(PeriodSummary::try_from)
    .transpose()
}

/// Summaries of one granularity, newest period first.
pub async fn list_summaries(
    pool: &DbPool,
    owner_id: &str,
    granularity: Granularity,
    model_name: &str,
    limit: i64,
) -> Result<Vec<PeriodSummary>> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT * FROM period_summaries
        WHERE owner_id = ? AND granularity = ? AND model_name = ?
        ORDER BY period_key DESC
        LIMIT ?
        "#,
    )
    .bind(owner_id)
    .bind(granularity.as_str())
    .bind(model_name)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PeriodSummary::try_from).collect()
}
