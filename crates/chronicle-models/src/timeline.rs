//! Calendar-style timeline groups.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::MemoryEvent;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayStatistics {
    pub total: usize,
    pub by_event_type: BTreeMap<String, usize>,
    pub by_role: BTreeMap<String, usize>,
    pub by_hour: BTreeMap<u32, usize>,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
}

/// All events of one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub events: Vec<MemoryEvent>,
    pub statistics: DayStatistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTimeline {
    /// Sorted by date, newest first.
    pub groups: Vec<DayGroup>,
    pub total_memories: usize,
    pub date_range: DateRange,
}
