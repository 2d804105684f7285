//! Period Summarizer.
//!
//! Rolls a day, an ISO week or a month of events up into a stored summary
//! with activity statistics. Regenerating a period replaces its summary
//! for the same model.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use chronicle_models::{
    new_id, now, AnalysisArtifact, Granularity, MemoryEvent, Period, PeriodStatistics, PeriodSummary,
    SummaryDetails,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{SummaryConfig, TemporalConfig};
use crate::db::{self, DbPool, EventFilter, TimeOrder};
use crate::error::{Error, Result};

use super::artifacts::AnalysisModel;
use super::temporal;

/// Longest slice of one event shown to the model.
const MAX_EVENT_CHARS: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryReply {
    summary: String,
    key_events: Vec<String>,
    highlights: Vec<String>,
    trends: Vec<String>,
    achievements: Vec<String>,
    challenges: Vec<String>,
    insights: Vec<String>,
}

impl SummaryReply {
    fn details(self, granularity: Granularity) -> (String, SummaryDetails) {
        let details = match granularity {
            Granularity::Daily => SummaryDetails::Daily {
                key_events: self.key_events,
            },
            Granularity::Weekly => SummaryDetails::Weekly {
                highlights: self.highlights,
                trends: self.trends,
            },
            Granularity::Monthly => SummaryDetails::Monthly {
                achievements: self.achievements,
                challenges: self.challenges,
                insights: self.insights,
            },
        };
        (self.summary.trim().to_string(), details)
    }
}

#[derive(Clone)]
pub struct SummarizerService {
    db: DbPool,
    model: AnalysisModel,
    temporal: TemporalConfig,
    config: SummaryConfig,
}

impl SummarizerService {
    pub fn new(db: DbPool, model: AnalysisModel, temporal: TemporalConfig, config: SummaryConfig) -> Self {
        Self {
            db,
            model,
            temporal,
            config,
        }
    }

    // =========================================================================
    // Generation
    // =========================================================================

    pub async fn generate_daily(&self, owner_id: &str, date: NaiveDate) -> Result<PeriodSummary> {
        self.generate(owner_id, Period::Daily { date }).await
    }

    /// Summarise ISO week `week` of ISO year `year`.
    pub async fn generate_weekly(&self, owner_id: &str, year: i32, week: u32) -> Result<PeriodSummary> {
        self.generate(owner_id, Period::Weekly { year, week }).await
    }

    pub async fn generate_monthly(&self, owner_id: &str, year: i32, month: u32) -> Result<PeriodSummary> {
        self.generate(owner_id, Period::Monthly { year, month }).await
    }

    /// Load, count, sample, ask the model, store.
    pub async fn generate(&self, owner_id: &str, period: Period) -> Result<PeriodSummary> {
        let (first, last) = period_dates(&period)?;
        let range = temporal::date_span(first, last, self.temporal.utc_offset)?;

        let filter = EventFilter::in_range(range).ordered(TimeOrder::Asc);
        let events = db::list_events(&self.db, owner_id, &filter, None, 0).await?;
        if events.is_empty() {
            return Err(Error::NotFound(format!(
                "No events in {} period {}",
                period.granularity(),
                period.key()
            )));
        }

        let granularity = period.granularity();
        let statistics = period_statistics(&events, granularity);
        let sample = self.sample(&events, granularity);

        let ids: Vec<String> = sample.iter().map(|e| e.id.clone()).collect();
        let analyses = db::get_analyses_for_ids(&self.db, owner_id, &ids, &self.model.name).await?;

        let prompt = self.prompt(&period, &statistics, sample, &analyses);
        let value = self.model.complete_json(&prompt, self.config.max_tokens).await?;
        let reply: SummaryReply = serde_json::from_value(value)
            .map_err(|e| Error::Llm(format!("Malformed summary reply: {}", e)))?;
        let (summary, details) = reply.details(granularity);

        let now = now();
        let stored = db::upsert_summary(
            &self.db,
            &PeriodSummary {
                id: new_id(),
                owner_id: owner_id.to_string(),
                period,
                model_name: self.model.name.clone(),
                model_version: self.model.version.clone(),
                summary,
                details,
                statistics,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!(
            owner_id = %owner_id,
            granularity = %granularity,
            period = %period.key(),
            events = events.len(),
            sampled = ids.len(),
            "Generated period summary"
        );

        Ok(stored)
    }

    /// Daily keeps the first events of the day; longer periods keep the most recent.
    fn sample<'a>(&self, events: &'a [MemoryEvent], granularity: Granularity) -> &'a [MemoryEvent] {
        match granularity {
            Granularity::Daily => &events[..events.len().min(self.config.daily_sample)],
            Granularity::Weekly => &events[events.len().saturating_sub(self.config.weekly_sample)..],
            Granularity::Monthly => &events[events.len().saturating_sub(self.config.monthly_sample)..],
        }
    }

    fn prompt(
        &self,
        period: &Period,
        statistics: &PeriodStatistics,
        sample: &[MemoryEvent],
        analyses: &BTreeMap<String, AnalysisArtifact>,
    ) -> String {
        let time_format = match period.granularity() {
            Granularity::Daily => "%H:%M",
            Granularity::Weekly => "%a %m-%d %H:%M",
            Granularity::Monthly => "%m-%d %H:%M",
        };

        let lines: Vec<String> = sample
            .iter()
            .map(|event| {
                let local = event.timestamp.with_timezone(&self.temporal.utc_offset);
                let mut line = format!(
                    "- [{}] ({}/{}) {}",
                    local.format(time_format),
                    event.role.as_str(),
                    event.event_type,
                    truncate(&event.raw_content, MAX_EVENT_CHARS)
                );
                if let Some(analysis) = analyses.get(&event.id).filter(|a| !a.summary.is_empty()) {
                    line.push_str(&format!("\n  analysis: {}", analysis.summary));
                }
                line
            })
            .collect();

        let by_type = statistics
            .by_event_type
            .iter()
            .map(|(t, n)| format!("{} {}", n, t))
            .collect::<Vec<_>>()
            .join(", ");

        let (label, schema) = match period.granularity() {
            Granularity::Daily => (
                "day",
                r#"{
    "summary": "2-4 sentence overview of the day",
    "key_events": ["most significant things that happened, in order"]
}"#,
            ),
            Granularity::Weekly => (
                "week",
                r#"{
    "summary": "3-5 sentence overview of the week",
    "highlights": ["notable moments"],
    "trends": ["patterns that recur across days"]
}"#,
            ),
            Granularity::Monthly => (
                "month",
                r#"{
    "summary": "4-6 sentence overview of the month",
    "achievements": ["things completed or progressed"],
    "challenges": ["problems or blockers"],
    "insights": ["lessons and observations worth remembering"]
}"#,
            ),
        };

        format!(
            r#"Summarise this {label} ({key}) from a long-term memory log.

Activity: {total} events ({by_type}). Busiest: {peak}.
Showing {shown} of {total} events:

{lines}

Return JSON:
{schema}"#,
            label = label,
            key = period.key(),
            total = statistics.total_events,
            by_type = by_type,
            peak = statistics.peak_period.as_deref().unwrap_or("n/a"),
            shown = sample.len(),
            lines = lines.join("\n"),
            schema = schema,
        )
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, owner_id: &str, period: &Period) -> Result<Option<PeriodSummary>> {
        db::get_summary(&self.db, owner_id, period, &self.model.name).await
    }

    pub async fn get_daily(&self, owner_id: &str, date: NaiveDate) -> Result<Option<PeriodSummary>> {
        self.get(owner_id, &Period::Daily { date }).await
    }

    pub async fn get_weekly(&self, owner_id: &str, year: i32, week: u32) -> Result<Option<PeriodSummary>> {
        self.get(owner_id, &Period::Weekly { year, week }).await
    }

    pub async fn get_monthly(&self, owner_id: &str, year: i32, month: u32) -> Result<Option<PeriodSummary>> {
        self.get(owner_id, &Period::Monthly { year, month }).await
    }

    /// Stored summaries of one granularity, newest first.
    pub async fn list(&self, owner_id: &str, granularity: Granularity, limit: i64) -> Result<Vec<PeriodSummary>> {
        let summaries = db::list_summaries(&self.db, owner_id, granularity, &self.model.name, limit).await?;
        debug!(owner_id = %owner_id, granularity = %granularity, count = summaries.len(), "Listed summaries");
        Ok(summaries)
    }
}

/// First and last local date of a period.
pub fn period_dates(period: &Period) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || Error::Validation(format!("Invalid {} period {}", period.granularity(), period.key()));

    match *period {
        Period::Daily { date } => Ok((date, date)),
        Period::Weekly { year, week } => {
            let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
            let sunday = NaiveDate::from_isoywd_opt(year, week, Weekday::Sun).ok_or_else(invalid)?;
            Ok((monday, sunday))
        }
        Period::Monthly { year, month } => {
            let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
            let next = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            }
            .ok_or_else(invalid)?;
            let last = next.pred_opt().ok_or_else(invalid)?;
            Ok((first, last))
        }
    }
}

/// Counts by type, role and sub-period (hour, date or ISO week).
pub fn period_statistics(events: &[MemoryEvent], granularity: Granularity) -> PeriodStatistics {
    let mut stats = PeriodStatistics {
        total_events: events.len(),
        ..Default::default()
    };

    for event in events {
        *stats.by_event_type.entry(event.event_type.clone()).or_default() += 1;
        *stats.by_role.entry(event.role.as_str().to_string()).or_default() += 1;

        let bucket = match granularity {
            Granularity::Daily => format!("{:02}", event.hour),
            Granularity::Weekly => event.date.format("%Y-%m-%d").to_string(),
            Granularity::Monthly => {
                let week = event.date.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
        };
        *stats.by_sub_period.entry(bucket).or_default() += 1;
    }

    // Buckets sort chronologically, so the first maximum is the earliest.
    let mut peak: Option<(&String, usize)> = None;
    for (bucket, &count) in &stats.by_sub_period {
        if peak.map_or(true, |(_, best)| count > best) {
            peak = Some((bucket, count));
        }
    }
    stats.peak_period = peak.map(|(bucket, _)| bucket.clone());

    stats
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
