//! Integration tests for period summaries against a mocked completion provider.

mod common;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use chronicle::config::utc;
use chronicle::services::temporal;
use chronicle::{AppState, Error, Result};
use chronicle_embeddings::EmbeddingService;
use chronicle_models::{Granularity, NewEvent, Role, SummaryDetails};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::OWNER;

async fn summarizing_state(server: &MockServer) -> AppState {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": json!({
                "summary": "Planned and shipped the release.",
                "key_events": ["release planned", "release shipped"],
                "highlights": ["shipped on time"],
                "trends": ["mornings are busiest"],
                "achievements": ["release 1.0"],
                "challenges": ["flaky tests"],
                "insights": ["plan earlier"]
            }).to_string()}}]
        })))
        .mount(server)
        .await;

    common::state_with(
        EmbeddingService::placeholder(16).unwrap(),
        common::openai_llm(server.uri()),
    )
    .await
}

async fn seed_day(state: &AppState, date: NaiveDate) -> Result<()> {
    let midnight = temporal::local_midnight(date, utc());
    for (content, event_type, hour) in [
        ("plan the release", "conversation", 9),
        ("release checklist done", "task", 9),
        ("shipped it", "conversation", 15),
    ] {
        state
            .events
            .append(
                OWNER,
                NewEvent::new(content, event_type, Role::User).at(midnight + Duration::hours(hour)),
            )
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_daily_summary_generation_and_regeneration() -> Result<()> {
    let server = MockServer::start().await;
    let state = summarizing_state(&server).await;
    let date = Utc::now().date_naive() - Duration::days(10);
    seed_day(&state, date).await?;

    let first = state.summarizer.generate_daily(OWNER, date).await?;
    assert_eq!(first.summary, "Planned and shipped the release.");
    assert_eq!(first.model_name, "gpt-4o-mini");
    assert_eq!(
        first.details,
        SummaryDetails::Daily {
            key_events: vec!["release planned".to_string(), "release shipped".to_string()],
        }
    );
    assert_eq!(first.statistics.total_events, 3);
    assert_eq!(first.statistics.by_event_type.get("conversation"), Some(&2));
    assert_eq!(first.statistics.by_sub_period.get("09"), Some(&2));
    assert_eq!(first.statistics.peak_period.as_deref(), Some("09"));

    let second = state.summarizer.generate_daily(OWNER, date).await?;
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);

    let stored = state.summarizer.get_daily(OWNER, date).await?.expect("summary stored");
    assert_eq!(stored.id, first.id);

    let listed = state.summarizer.list(OWNER, Granularity::Daily, 10).await?;
    assert_eq!(listed.len(), 1);
    assert!(state.summarizer.list("mallory", Granularity::Daily, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_weekly_and_monthly_details() -> Result<()> {
    let server = MockServer::start().await;
    let state = summarizing_state(&server).await;
    let date = Utc::now().date_naive() - Duration::days(40);
    seed_day(&state, date).await?;

    let iso = date.iso_week();
    let weekly = state
        .summarizer
        .generate_weekly(OWNER, iso.year(), iso.week())
        .await?;
    assert_eq!(
        weekly.details,
        SummaryDetails::Weekly {
            highlights: vec!["shipped on time".to_string()],
            trends: vec!["mornings are busiest".to_string()],
        }
    );
    assert_eq!(weekly.statistics.by_sub_period.get(&date.to_string()), Some(&3));

    let monthly = state
        .summarizer
        .generate_monthly(OWNER, date.year(), date.month())
        .await?;
    match &monthly.details {
        SummaryDetails::Monthly {
            achievements,
            challenges,
            insights,
        } => {
            assert_eq!(achievements, &vec!["release 1.0".to_string()]);
            assert_eq!(challenges, &vec!["flaky tests".to_string()]);
            assert_eq!(insights, &vec!["plan earlier".to_string()]);
        }
        other => panic!("unexpected details: {:?}", other),
    }
    assert_eq!(
        monthly.statistics.peak_period.as_deref(),
        Some(format!("{:04}-W{:02}", iso.year(), iso.week()).as_str())
    );

    assert!(state
        .summarizer
        .get_monthly(OWNER, date.year(), date.month())
        .await?
        .is_some());

    Ok(())
}

#[tokio::test]
async fn test_empty_period_is_not_found() {
    let server = MockServer::start().await;
    let state = summarizing_state(&server).await;
    let date = Utc::now().date_naive() - Duration::days(3);

    let err = state.summarizer.generate_daily(OWNER, date).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = state.summarizer.generate_weekly(OWNER, 2024, 54).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
