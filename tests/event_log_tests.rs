//! Integration tests for the event log.
//!
//! Immutability, conversation chains and calendar boundaries.

mod common;

use chrono::{Duration, Utc};
use chronicle::config::{utc, EventLogConfig, TemporalConfig};
use chronicle::db;
use chronicle::services::{temporal, EventLogService};
use chronicle::Result;
use chronicle_models::{ChainMessage, NewEvent, Page, Role, TemporalFilter};
use serde_json::json;

use common::OWNER;

async fn event_log() -> EventLogService {
    EventLogService::new(common::pool().await, TemporalConfig::default(), EventLogConfig::default())
}

// ============================================================================
// Immutability
// ============================================================================

#[tokio::test]
async fn test_events_cannot_be_updated_or_deleted() -> Result<()> {
    let pool = common::pool().await;
    let log = EventLogService::new(pool.clone(), TemporalConfig::default(), EventLogConfig::default());

    let event = log
        .append(OWNER, NewEvent::new("original", "note", Role::User))
        .await?;

    let update = sqlx::query("UPDATE memory_events SET raw_content = 'changed' WHERE id = ?")
        .bind(&event.id)
        .execute(&pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM memory_events WHERE id = ?")
        .bind(&event.id)
        .execute(&pool)
        .await;
    assert!(delete.is_err());

    let stored = log.get_by_id(OWNER, &event.id).await?.expect("event still there");
    assert_eq!(stored.raw_content, "original");
    assert_eq!(stored, event);

    Ok(())
}

#[tokio::test]
async fn test_owner_isolation() -> Result<()> {
    let log = event_log().await;
    let event = log
        .append(OWNER, NewEvent::new("private", "note", Role::User).in_session("s1"))
        .await?;

    assert!(log.get_by_id("mallory", &event.id).await?.is_none());
    assert!(log.get_by_session_id("mallory", "s1").await?.is_empty());
    assert!(log.get_conversation_chain("mallory", &event.id).await?.is_empty());
    assert_eq!(log.count("mallory").await?, 0);
    assert_eq!(log.count(OWNER).await?, 1);

    Ok(())
}

// ============================================================================
// Sessions and chains
// ============================================================================

#[tokio::test]
async fn test_session_chain_scenario() -> Result<()> {
    let log = event_log().await;
    let start = Utc::now() - Duration::minutes(10);

    let events = log
        .append_chain(
            OWNER,
            vec![
                ChainMessage::new("Can you plan the release?", Role::User).at(start),
                ChainMessage::new("Here is a plan in three steps.", Role::Assistant)
                    .at(start + Duration::minutes(1)),
                ChainMessage::new("Ship it on Friday.", Role::User).at(start + Duration::minutes(2)),
            ],
            "release-planning",
        )
        .await?;

    assert_eq!(events.len(), 3);
    assert!(events[0].parent_id.is_none());
    assert_eq!(events[1].parent_id.as_deref(), Some(events[0].id.as_str()));
    assert_eq!(events[2].parent_id.as_deref(), Some(events[1].id.as_str()));
    assert!(events
        .iter()
        .all(|e| e.session_id.as_deref() == Some("release-planning")));

    // A follow-up appended on its own continues the chain
    let follow_up = log
        .append(
            OWNER,
            NewEvent::new("Friday works.", "conversation", Role::Assistant)
                .in_session("release-planning")
                .with_parent(events[2].id.clone())
                .with_context(json!({"channel": "chat"})),
        )
        .await?;

    let session = log.get_by_session_id(OWNER, "release-planning").await?;
    let contents: Vec<&str> = session.iter().map(|e| e.raw_content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Can you plan the release?",
            "Here is a plan in three steps.",
            "Ship it on Friday.",
            "Friday works.",
        ]
    );

    let chain = log.get_conversation_chain(OWNER, &follow_up.id).await?;
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[0].id, events[0].id);
    assert_eq!(chain[3].id, follow_up.id);
    for pair in chain.windows(2) {
        assert_eq!(pair[1].parent_id.as_deref(), Some(pair[0].id.as_str()));
    }

    let by_ids = log
        .get_by_ids(OWNER, &[follow_up.id.clone(), events[0].id.clone(), "missing".to_string()])
        .await?;
    assert_eq!(by_ids.len(), 2);
    assert_eq!(by_ids[0].id, events[0].id);

    Ok(())
}

#[tokio::test]
async fn test_batch_parent_may_precede_in_same_batch() -> Result<()> {
    let pool = common::pool().await;
    let log = EventLogService::new(pool.clone(), TemporalConfig::default(), EventLogConfig::default());

    let root = log.append(OWNER, NewEvent::new("root", "task", Role::User)).await?;
    let batch = log
        .append_batch(
            OWNER,
            vec![
                NewEvent::new("child", "task", Role::Model).with_parent(root.id.clone()),
                NewEvent::new("sibling", "task", Role::Model),
            ],
        )
        .await?;

    let chained = log
        .append(OWNER, NewEvent::new("grandchild", "task", Role::Model).with_parent(batch[0].id.clone()))
        .await?;

    let chain = log.get_conversation_chain(OWNER, &chained.id).await?;
    let contents: Vec<&str> = chain.iter().map(|e| e.raw_content.as_str()).collect();
    assert_eq!(contents, vec!["root", "child", "grandchild"]);
    assert_eq!(db::count_events(&pool, OWNER).await?, 4);

    Ok(())
}

// ============================================================================
// Temporal queries
// ============================================================================

#[tokio::test]
async fn test_yesterday_boundaries() -> Result<()> {
    let log = event_log().await;

    let today = Utc::now().date_naive();
    let midnight = temporal::local_midnight(today, utc());
    let yesterday_start = midnight - Duration::days(1);

    for (content, ts) in [
        ("before yesterday", yesterday_start - Duration::seconds(1)),
        ("yesterday start", yesterday_start),
        ("yesterday end", midnight - Duration::milliseconds(1)),
        ("today start", midnight),
    ] {
        log.append(OWNER, NewEvent::new(content, "note", Role::User).at(ts))
            .await?;
    }

    let events = log
        .query_by_time(OWNER, &TemporalFilter::natural("yesterday"), Page::default())
        .await?;
    let contents: Vec<&str> = events.iter().map(|e| e.raw_content.as_str()).collect();
    assert_eq!(contents, vec!["yesterday end", "yesterday start"]);

    let korean = log
        .query_by_time(OWNER, &TemporalFilter::natural("어제"), Page::default())
        .await?;
    assert_eq!(korean.len(), 2);

    let explicit = log
        .query_by_time(
            OWNER,
            &TemporalFilter::between(today - Duration::days(1), today),
            Page::default(),
        )
        .await?;
    assert_eq!(explicit.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_unknown_phrase_falls_back_to_last_week() -> Result<()> {
    let log = event_log().await;
    let now = Utc::now();

    log.append(OWNER, NewEvent::new("recent", "note", Role::User).at(now - Duration::days(2)))
        .await?;
    log.append(OWNER, NewEvent::new("old", "note", Role::User).at(now - Duration::days(30)))
        .await?;

    let fallback = log
        .query_by_time(OWNER, &TemporalFilter::natural("sometime around the launch"), Page::default())
        .await?;
    let recent = log
        .query_by_time(OWNER, &TemporalFilter::natural("recent 7 days"), Page::default())
        .await?;

    assert_eq!(fallback, recent);
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].raw_content, "recent");

    Ok(())
}

#[tokio::test]
async fn test_partition_field_filters() -> Result<()> {
    let log = event_log().await;
    let base = temporal::local_midnight(Utc::now().date_naive(), utc()) - Duration::days(3);

    log.append(OWNER, NewEvent::new("morning", "note", Role::User).at(base + Duration::hours(9)))
        .await?;
    log.append(OWNER, NewEvent::new("evening", "note", Role::User).at(base + Duration::hours(20)))
        .await?;

    let filter = TemporalFilter {
        hour: Some(20),
        ..Default::default()
    };
    let events = log.query_by_time(OWNER, &filter, Page::default()).await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].raw_content, "evening");

    Ok(())
}

#[tokio::test]
async fn test_lookup_by_id_set_beyond_bind_limit() -> Result<()> {
    let pool = common::pool().await;
    let log = EventLogService::new(pool.clone(), TemporalConfig::default(), EventLogConfig::default());
    let kept = log.append(OWNER, NewEvent::new("kept", "task", Role::User)).await?;

    // SQLite caps bound variables at 32766
    let mut ids: Vec<String> = (0..40_000).map(|i| format!("missing-{}", i)).collect();
    ids.push(kept.id.clone());

    let events = db::get_events_by_ids(&pool, OWNER, &ids).await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, kept.id);

    let analyses = db::get_analyses_for_ids(&pool, OWNER, &ids, "analyzer").await?;
    assert!(analyses.is_empty());

    Ok(())
}
