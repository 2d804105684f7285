//! Event log queries.
//!
//! Only inserts and reads live here. `memory_events` has no update or
//! delete query and the schema triggers reject both.

use chrono::NaiveDate;
use chronicle_models::{format_timestamp, parse_timestamp, MemoryEvent, Role, TimeRange};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor};

use super::DbPool;
use crate::{Error, Result};

/// Event record as stored.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: String,
    pub owner_id: String,
    pub raw_content: String,
    pub event_type: String,
    pub role: String,
    pub source_agent: Option<String>,
    pub source_model: Option<String>,
    pub session_id: Option<String>,
    pub parent_id: Option<String>,
    pub context: String, // JSON object
    pub timestamp: String,
    pub date: String,
    pub hour: i64,
    pub day_of_week: i64,
    pub week_of_year: i64,
    pub month: i64,
    pub year: i64,
    pub created_at: String,
}

impl TryFrom<EventRow> for MemoryEvent {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let corrupt = |field: &str| Error::Internal(format!("Corrupt {} on event {}", field, row.id));

        Ok(MemoryEvent {
            role: Role::from_str(&row.role).ok_or_else(|| corrupt("role"))?,
            context: serde_json::from_str(&row.context).map_err(|_| corrupt("context"))?,
            timestamp: parse_timestamp(&row.timestamp).ok_or_else(|| corrupt("timestamp"))?,
            created_at: parse_timestamp(&row.created_at).ok_or_else(|| corrupt("created_at"))?,
            date: NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| corrupt("date"))?,
            hour: row.hour as u32,
            day_of_week: row.day_of_week as u32,
            week_of_year: row.week_of_year as u32,
            month: row.month as u32,
            year: row.year as i32,
            id: row.id,
            owner_id: row.owner_id,
            raw_content: row.raw_content,
            event_type: row.event_type,
            source_agent: row.source_agent,
            source_model: row.source_model,
            session_id: row.session_id,
            parent_id: row.parent_id,
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<MemoryEvent>> {
    rows.into_iter().map(MemoryEvent::try_from).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeOrder {
    Asc,
    #[default]
    Desc,
}

impl TimeOrder {
    fn sql(&self) -> &'static str {
        match self {
            TimeOrder::Asc => "ORDER BY timestamp ASC, rowid ASC",
            TimeOrder::Desc => "ORDER BY timestamp DESC, rowid DESC",
        }
    }
}

/// Structural filter over an owner's events. Empty lists mean "any".
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub range: Option<TimeRange>,
    pub hour: Option<u32>,
    pub day_of_week: Option<u32>,
    pub week_of_year: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub event_types: Vec<String>,
    pub roles: Vec<Role>,
    pub source_agents: Vec<String>,
    /// Restrict to these ids (e.g. semantic hits).
    pub ids: Option<Vec<String>>,
    pub order: TimeOrder,
}

impl EventFilter {
    pub fn in_range(range: TimeRange) -> Self {
        Self {
            range: Some(range),
            ..Default::default()
        }
    }

    pub fn ordered(mut self, order: TimeOrder) -> Self {
        self.order = order;
        self
    }

    fn push_where<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>, owner_id: &'a str) {
        qb.push(" WHERE owner_id = ").push_bind(owner_id);

        if let Some(range) = &self.range {
            qb.push(" AND timestamp >= ")
                .push_bind(format_timestamp(&range.start))
                .push(" AND timestamp < ")
                .push_bind(format_timestamp(&range.end));
        }
        if let Some(hour) = self.hour {
            qb.push(" AND hour = ").push_bind(hour as i64);
        }
        if let Some(dow) = self.day_of_week {
            qb.push(" AND day_of_week = ").push_bind(dow as i64);
        }
        if let Some(week) = self.week_of_year {
            qb.push(" AND week_of_year = ").push_bind(week as i64);
        }
        if let Some(month) = self.month {
            qb.push(" AND month = ").push_bind(month as i64);
        }
        if let Some(year) = self.year {
            qb.push(" AND year = ").push_bind(year as i64);
        }

        push_in(qb, "event_type", self.event_types.iter().map(String::as_str));
        push_in(qb, "role", self.roles.iter().map(|role| -> &'a str { role.as_str() }));
        push_in(qb, "source_agent", self.source_agents.iter().map(String::as_str));
        if let Some(ids) = &self.ids {
            if ids.is_empty() {
                qb.push(" AND 0");
            } else {
                qb.push(" AND id IN (SELECT value FROM json_each(")
                    .push_bind(id_list(ids))
                    .push("))");
            }
        }
    }
}

/// `AND column IN (?, ?, ...)`, or nothing when `values` is empty.
fn push_in<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    column: &str,
    values: impl Iterator<Item = &'a str>,
) {
    let mut values = values.peekable();
    if values.peek().is_none() {
        return;
    }

    qb.push(" AND ").push(column).push(" IN (");
    {
        let mut separated = qb.separated(", ");
        for value in values {
            separated.push_bind(value);
        }
    }
    qb.push(")");
}

/// Id sets are bound as one JSON array so their size is not limited by
/// SQLite's bound-variable cap.
pub(crate) fn id_list(ids: &[String]) -> String {
    serde_json::Value::from(ids.to_vec()).to_string()
}

// ============================================================================
// Writes
// ============================================================================

/// Insert one event. Generic over the executor so batches can share a transaction.
pub async fn insert_event<'e, E>(executor: E, event: &MemoryEvent) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO memory_events (
            id, owner_id, raw_content, event_type, role, source_agent, source_model,
            session_id, parent_id, context, timestamp, date, hour, day_of_week,
            week_of_year, month, year, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.owner_id)
    .bind(&event.raw_content)
    .bind(&event.event_type)
    .bind(event.role.as_str())
    .bind(&event.source_agent)
    .bind(&event.source_model)
    .bind(&event.session_id)
    .bind(&event.parent_id)
    .bind(serde_json::to_string(&event.context)?)
    .bind(format_timestamp(&event.timestamp))
    .bind(event.date.format("%Y-%m-%d").to_string())
    .bind(event.hour as i64)
    .bind(event.day_of_week as i64)
    .bind(event.week_of_year as i64)
    .bind(event.month as i64)
    .bind(event.year as i64)
    .bind(format_timestamp(&event.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

/// Whether `id` names an event of `owner_id`.
pub async fn event_exists<'e, E>(executor: E, owner_id: &str, id: &str) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM memory_events WHERE owner_id = ? AND id = ?")
            .bind(owner_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;

    Ok(found.is_some())
}

pub async fn get_event(pool: &DbPool, owner_id: &str, id: &str) -> Result<Option<MemoryEvent>> {
    sqlx::query_as::<_, EventRow>("SELECT * FROM memory_events WHERE owner_id = ? AND id = ?")
        .bind(owner_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(MemoryEvent::try_from)
        .transpose()
}

/// Events with the given ids, oldest first. Unknown ids are skipped.
pub async fn get_events_by_ids(
    pool: &DbPool,
    owner_id: &str,
    ids: &[String],
) -> Result<Vec<MemoryEvent>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let filter = EventFilter {
        ids: Some(ids.to_vec()),
        order: TimeOrder::Asc,
        ..Default::default()
    };
    list_events(pool, owner_id, &filter, None, 0).await
}

/// Events of one session, oldest first.
pub async fn list_session_events(
    pool: &DbPool,
    owner_id: &str,
    session_id: &str,
) -> Result<Vec<MemoryEvent>> {
    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT * FROM memory_events
        WHERE owner_id = ? AND session_id = ?
        ORDER BY timestamp ASC, rowid ASC
        "#,
    )
    .bind(owner_id)
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    into_events(rows)
}

/// Filtered listing. `limit = None` returns everything.
pub async fn list_events(
    pool: &DbPool,
    owner_id: &str,
    filter: &EventFilter,
    limit: Option<i64>,
    offset: i64,
) -> Result<Vec<MemoryEvent>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM memory_events");
    filter.push_where(&mut qb, owner_id);
    qb.push(" ").push(filter.order.sql());
    qb.push(" LIMIT ")
        .push_bind(limit.unwrap_or(-1))
        .push(" OFFSET ")
        .push_bind(offset.max(0));

    let rows = qb.build_query_as::<EventRow>().fetch_all(pool).await?;
    into_events(rows)
}

pub async fn count_events(pool: &DbPool, owner_id: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memory_events WHERE owner_id = ?")
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// All event ids of an owner, oldest first.
pub async fn list_event_ids(pool: &DbPool, owner_id: &str) -> Result<Vec<String>> {
    let ids: Vec<(String,)> = sqlx::query_as(
        "SELECT id FROM memory_events WHERE owner_id = ? ORDER BY timestamp ASC, rowid ASC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}
