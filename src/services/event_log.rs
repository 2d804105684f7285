//! Event Log Service.
//!
//! The append-only record of everything an agent or user said or did.
//! Events are validated, stamped with local calendar fields and written
//! once; nothing in this service (or anywhere else) changes them afterwards.

use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};
use chronicle_models::{
    new_id, now, ChainMessage, MemoryEvent, NewEvent, Page, TemporalFilter,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{EventLogConfig, TemporalConfig};
use crate::db::{self, DbPool, EventFilter, TimeOrder};
use crate::error::{Error, Result};

use super::temporal;

/// Service for appending and reading memory events.
#[derive(Clone)]
pub struct EventLogService {
    db: DbPool,
    temporal: TemporalConfig,
    config: EventLogConfig,
}

impl EventLogService {
    pub fn new(db: DbPool, temporal: TemporalConfig, config: EventLogConfig) -> Self {
        Self {
            db,
            temporal,
            config,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validate an input and turn it into a complete record.
    ///
    /// Parent existence is checked separately because it needs the store.
    fn build_event(&self, owner_id: &str, input: NewEvent, now: DateTime<Utc>) -> Result<MemoryEvent> {
        if owner_id.trim().is_empty() {
            return Err(Error::Validation("owner_id must not be empty".to_string()));
        }
        if input.raw_content.trim().is_empty() {
            return Err(Error::Validation("raw_content must not be empty".to_string()));
        }
        let event_type = input.event_type.trim().to_lowercase();
        if event_type.is_empty() {
            return Err(Error::Validation("event_type must not be empty".to_string()));
        }

        let context = match input.context {
            None | Some(Value::Null) => json!({}),
            Some(Value::Object(map)) => Value::Object(map),
            Some(_) => {
                return Err(Error::Validation("context must be a JSON object".to_string()));
            }
        };

        if matches!(&input.parent_id, Some(p) if p.trim().is_empty()) {
            return Err(Error::Validation("parent_id must not be empty".to_string()));
        }

        let timestamp = input.timestamp.unwrap_or(now).trunc_subsecs(3);
        let parts = temporal::local_parts(&timestamp, self.temporal.utc_offset);

        Ok(MemoryEvent {
            id: new_id(),
            owner_id: owner_id.to_string(),
            raw_content: input.raw_content,
            event_type,
            role: input.role,
            source_agent: input.source_agent,
            source_model: input.source_model,
            session_id: input.session_id,
            parent_id: input.parent_id,
            context,
            timestamp,
            date: parts.date,
            hour: parts.hour,
            day_of_week: parts.day_of_week,
            week_of_year: parts.week_of_year,
            month: parts.month,
            year: parts.year,
            created_at: now,
        })
    }

    /// Append a single event.
    pub async fn append(&self, owner_id: &str, input: NewEvent) -> Result<MemoryEvent> {
        let event = self.build_event(owner_id, input, now())?;

        if let Some(parent_id) = &event.parent_id {
            if !db::event_exists(&self.db, owner_id, parent_id).await? {
                return Err(missing_parent(parent_id));
            }
        }

        db::insert_event(&self.db, &event).await?;

        debug!(
            owner_id = %owner_id,
            event_id = %event.id,
            event_type = %event.event_type,
            "Appended event"
        );

        Ok(event)
    }

    /// Append several events atomically.
    ///
    /// Every input is validated before anything is written; a rejected
    /// insert rolls back the whole batch. A parent may be an earlier item
    /// of the same batch.
    pub async fn append_batch(&self, owner_id: &str, inputs: Vec<NewEvent>) -> Result<Vec<MemoryEvent>> {
        let now = now();
        let events = inputs
            .into_iter()
            .map(|input| self.build_event(owner_id, input, now))
            .collect::<Result<Vec<_>>>()?;

        self.insert_all(owner_id, &events).await?;

        info!(owner_id = %owner_id, count = events.len(), "Appended event batch");

        Ok(events)
    }

    /// Append a conversation in one transaction.
    ///
    /// Each message after the first gets the previous message as parent;
    /// the first keeps whatever parent it was given (none by default).
    pub async fn append_chain(
        &self,
        owner_id: &str,
        messages: Vec<ChainMessage>,
        session_id: &str,
    ) -> Result<Vec<MemoryEvent>> {
        if session_id.trim().is_empty() {
            return Err(Error::Validation("session_id must not be empty".to_string()));
        }

        let now = now();
        let mut events: Vec<MemoryEvent> = Vec::with_capacity(messages.len());
        for message in messages {
            let parent_id = events.last().map(|prev| prev.id.clone());
            let event = self.build_event(owner_id, message.into_event(session_id, parent_id), now)?;
            events.push(event);
        }

        self.insert_all(owner_id, &events).await?;

        info!(
            owner_id = %owner_id,
            session_id = %session_id,
            count = events.len(),
            "Appended conversation chain"
        );

        Ok(events)
    }

    async fn insert_all(&self, owner_id: &str, events: &[MemoryEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        for event in events {
            if let Some(parent_id) = &event.parent_id {
                if !db::event_exists(&mut *tx, owner_id, parent_id).await? {
                    return Err(missing_parent(parent_id));
                }
            }
            db::insert_event(&mut *tx, event).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> Result<Option<MemoryEvent>> {
        db::get_event(&self.db, owner_id, id).await
    }

    /// Events with the given ids, oldest first. Unknown ids are skipped.
    pub async fn get_by_ids(&self, owner_id: &str, ids: &[String]) -> Result<Vec<MemoryEvent>> {
        db::get_events_by_ids(&self.db, owner_id, ids).await
    }

    /// Events of one session, oldest first.
    pub async fn get_by_session_id(&self, owner_id: &str, session_id: &str) -> Result<Vec<MemoryEvent>> {
        db::list_session_events(&self.db, owner_id, session_id).await
    }

    /// Walk parent links from `id` back to the root.
    ///
    /// Returns root first. Stops quietly at a missing parent or after
    /// `max_chain_depth` events. An unknown `id` gives an empty chain.
    pub async fn get_conversation_chain(&self, owner_id: &str, id: &str) -> Result<Vec<MemoryEvent>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = self.get_by_id(owner_id, id).await?;

        while let Some(event) = current {
            if chain.len() >= self.config.max_chain_depth || !visited.insert(event.id.clone()) {
                break;
            }

            let parent_id = event.parent_id.clone();
            chain.push(event);

            current = match parent_id {
                Some(parent_id) => self.get_by_id(owner_id, &parent_id).await?,
                None => None,
            };
        }

        chain.reverse();
        Ok(chain)
    }

    /// Events matching a temporal filter, newest first.
    pub async fn query_by_time(
        &self,
        owner_id: &str,
        filter: &TemporalFilter,
        page: Page,
    ) -> Result<Vec<MemoryEvent>> {
        let event_filter = temporal_event_filter(filter, Utc::now(), &self.temporal)?;
        db::list_events(&self.db, owner_id, &event_filter, Some(page.limit), page.offset).await
    }

    /// Events whose type is one of `event_types`, newest first.
    pub async fn filter_by_event_type(
        &self,
        owner_id: &str,
        event_types: &[String],
        page: Page,
    ) -> Result<Vec<MemoryEvent>> {
        if event_types.is_empty() {
            return Ok(Vec::new());
        }

        let filter = EventFilter {
            event_types: event_types.iter().map(|t| t.trim().to_lowercase()).collect(),
            ..Default::default()
        };
        db::list_events(&self.db, owner_id, &filter, Some(page.limit), page.offset).await
    }

    /// Events from any of `agents`, newest first.
    pub async fn filter_by_agent(
        &self,
        owner_id: &str,
        agents: &[String],
        page: Page,
    ) -> Result<Vec<MemoryEvent>> {
        if agents.is_empty() {
            return Ok(Vec::new());
        }

        let filter = EventFilter {
            source_agents: agents.to_vec(),
            ..Default::default()
        };
        db::list_events(&self.db, owner_id, &filter, Some(page.limit), page.offset).await
    }

    pub async fn count(&self, owner_id: &str) -> Result<i64> {
        db::count_events(&self.db, owner_id).await
    }
}

/// Translate a temporal filter into a storage filter (newest first).
pub fn temporal_event_filter(
    filter: &TemporalFilter,
    now: DateTime<Utc>,
    config: &TemporalConfig,
) -> Result<EventFilter> {
    if filter.has_partial_range() {
        return Err(Error::Validation(
            "start_date and end_date must be given together".to_string(),
        ));
    }

    let range = filter
        .query()
        .map(|q| temporal::resolve(&q, now, config))
        .transpose()?;

    Ok(EventFilter {
        range,
        hour: filter.hour,
        day_of_week: filter.day_of_week,
        week_of_year: filter.week_of_year,
        month: filter.month,
        year: filter.year,
        order: TimeOrder::Desc,
        ..Default::default()
    })
}

fn missing_parent(parent_id: &str) -> Error {
    Error::Validation(format!("parent event not found: {}", parent_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chronicle_models::Role;

    async fn service() -> EventLogService {
        let pool = db::init_memory().await.unwrap();
        EventLogService::new(pool, TemporalConfig::default(), EventLogConfig::default())
    }

    #[tokio::test]
    async fn test_append_derives_partition_fields() {
        let log = service().await;
        // Sunday 2024-03-10 23:30 UTC
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let event = log
            .append("owner", NewEvent::new("hello", "Conversation", Role::User).at(ts))
            .await
            .unwrap();

        assert_eq!(event.event_type, "conversation");
        assert_eq!(event.hour, 23);
        assert_eq!(event.day_of_week, 0);
        assert_eq!(event.week_of_year, 10);
        assert_eq!(event.month, 3);
        assert_eq!(event.year, 2024);
        assert_eq!(event.context, json!({}));

        let stored = log.get_by_id("owner", &event.id).await.unwrap().unwrap();
        assert_eq!(stored, event);
    }

    #[tokio::test]
    async fn test_append_validation() {
        let log = service().await;

        let empty = log.append("owner", NewEvent::new("  ", "task", Role::User)).await;
        assert!(matches!(empty, Err(Error::Validation(_))));

        let no_owner = log.append("", NewEvent::new("x", "task", Role::User)).await;
        assert!(matches!(no_owner, Err(Error::Validation(_))));

        let bad_context = log
            .append(
                "owner",
                NewEvent::new("x", "task", Role::User).with_context(json!([1, 2])),
            )
            .await;
        assert!(matches!(bad_context, Err(Error::Validation(_))));

        let orphan = log
            .append("owner", NewEvent::new("x", "task", Role::User).with_parent("nope"))
            .await;
        assert!(matches!(orphan, Err(Error::Validation(_))));

        assert_eq!(log.count("owner").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_parent_must_belong_to_owner() {
        let log = service().await;
        let theirs = log
            .append("alice", NewEvent::new("a", "task", Role::User))
            .await
            .unwrap();

        let result = log
            .append("bob", NewEvent::new("b", "task", Role::User).with_parent(theirs.id))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let log = service().await;

        let result = log
            .append_batch(
                "owner",
                vec![
                    NewEvent::new("ok", "task", Role::User),
                    NewEvent::new("orphan", "task", Role::User).with_parent("missing"),
                ],
            )
            .await;
        assert!(result.is_err());
        assert_eq!(log.count("owner").await.unwrap(), 0);

        let invalid = log
            .append_batch(
                "owner",
                vec![
                    NewEvent::new("ok", "task", Role::User),
                    NewEvent::new("", "task", Role::User),
                ],
            )
            .await;
        assert!(matches!(invalid, Err(Error::Validation(_))));
        assert_eq!(log.count("owner").await.unwrap(), 0);

        let events = log
            .append_batch(
                "owner",
                vec![
                    NewEvent::new("one", "task", Role::User),
                    NewEvent::new("two", "decision", Role::Assistant),
                ],
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(log.count("owner").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_chain_depth_limit() {
        let pool = db::init_memory().await.unwrap();
        let log = EventLogService::new(
            pool,
            TemporalConfig::default(),
            EventLogConfig { max_chain_depth: 2 },
        );

        let events = log
            .append_chain(
                "owner",
                vec![
                    ChainMessage::new("a", Role::User),
                    ChainMessage::new("b", Role::Assistant),
                    ChainMessage::new("c", Role::User),
                ],
                "s",
            )
            .await
            .unwrap();

        let chain = log.get_conversation_chain("owner", &events[2].id).await.unwrap();
        let contents: Vec<&str> = chain.iter().map(|e| e.raw_content.as_str()).collect();
        assert_eq!(contents, vec!["b", "c"]);

        assert!(log
            .get_conversation_chain("owner", "unknown")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_filters() {
        let log = service().await;
        log.append("owner", NewEvent::new("a", "task", Role::User).from_agent("planner"))
            .await
            .unwrap();
        log.append("owner", NewEvent::new("b", "decision", Role::User).from_agent("coder"))
            .await
            .unwrap();
        log.append("other", NewEvent::new("c", "task", Role::User).from_agent("planner"))
            .await
            .unwrap();

        let tasks = log
            .filter_by_event_type("owner", &["task".to_string()], Page::default())
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].raw_content, "a");

        let both = log
            .filter_by_agent(
                "owner",
                &["planner".to_string(), "coder".to_string()],
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
        // Newest first
        assert_eq!(both[0].raw_content, "b");

        let paged = log
            .filter_by_agent(
                "owner",
                &["planner".to_string(), "coder".to_string()],
                Page::new(1, 1),
            )
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].raw_content, "a");
    }

    #[tokio::test]
    async fn test_partial_range_is_rejected() {
        let log = service().await;
        let filter = TemporalFilter {
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let result = log.query_by_time("owner", &filter, Page::default()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
