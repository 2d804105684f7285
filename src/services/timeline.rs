//! Timeline Aggregator: events grouped by local calendar day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chronicle_models::{DailyTimeline, DateRange, DayGroup, DayStatistics, MemoryEvent};
use tracing::debug;

use crate::config::TemporalConfig;
use crate::db::{self, DbPool, EventFilter, TimeOrder};
use crate::error::Result;

use super::temporal;

#[derive(Clone)]
pub struct TimelineService {
    db: DbPool,
    temporal: TemporalConfig,
}

impl TimelineService {
    pub fn new(db: DbPool, temporal: TemporalConfig) -> Self {
        Self { db, temporal }
    }

    /// Days between `start_date` and `end_date` inclusive, newest day first.
    ///
    /// Days without events are omitted. Events inside a day stay chronological.
    pub async fn get_daily_timeline(
        &self,
        owner_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<DailyTimeline> {
        let range = temporal::date_span(start_date, end_date, self.temporal.utc_offset)?;
        let filter = EventFilter::in_range(range).ordered(TimeOrder::Asc);
        let events = db::list_events(&self.db, owner_id, &filter, None, 0).await?;

        let total_memories = events.len();
        let groups = group_by_day(events);

        debug!(
            owner_id = %owner_id,
            days = groups.len(),
            total_memories,
            "Built daily timeline"
        );

        Ok(DailyTimeline {
            groups,
            total_memories,
            date_range: DateRange {
                start: start_date,
                end: end_date,
            },
        })
    }
}

/// Group chronologically ordered events by their local date.
pub fn group_by_day(events: Vec<MemoryEvent>) -> Vec<DayGroup> {
    let mut days: BTreeMap<NaiveDate, Vec<MemoryEvent>> = BTreeMap::new();
    for event in events {
        days.entry(event.date).or_default().push(event);
    }

    days.into_iter()
        .rev()
        .map(|(date, events)| DayGroup {
            date,
            statistics: day_statistics(&events),
            events,
        })
        .collect()
}

fn day_statistics(events: &[MemoryEvent]) -> DayStatistics {
    let mut stats = DayStatistics {
        total: events.len(),
        ..Default::default()
    };

    for event in events {
        *stats.by_event_type.entry(event.event_type.clone()).or_default() += 1;
        *stats.by_role.entry(event.role.as_str().to_string()).or_default() += 1;
        *stats.by_hour.entry(event.hour).or_default() += 1;
    }

    stats.first_at = events.iter().map(|e| e.timestamp).min();
    stats.last_at = events.iter().map(|e| e.timestamp).max();
    stats
}
