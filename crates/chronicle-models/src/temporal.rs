//! Temporal query types shared by the event log and hybrid search.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A time window to resolve into concrete bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemporalQuery {
    /// Inclusive calendar dates, bypassing phrase parsing.
    Explicit {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// Natural-language phrase such as "yesterday" or "recent 3 days".
    Natural { natural: String },
}

impl TemporalQuery {
    pub fn natural(phrase: impl Into<String>) -> Self {
        TemporalQuery::Natural {
            natural: phrase.into(),
        }
    }

    pub fn explicit(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        TemporalQuery::Explicit {
            start_date,
            end_date,
        }
    }
}

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts < self.end
    }
}

/// Range plus partition-field equality filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFilter {
    #[serde(default)]
    pub natural: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(default)]
    pub day_of_week: Option<u32>,
    #[serde(default)]
    pub week_of_year: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl TemporalFilter {
    pub fn natural(phrase: impl Into<String>) -> Self {
        Self {
            natural: Some(phrase.into()),
            ..Default::default()
        }
    }

    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        }
    }

    /// The range part of the filter. Explicit dates win over a phrase.
    pub fn query(&self) -> Option<TemporalQuery> {
        match (self.start_date, self.end_date, &self.natural) {
            (Some(start_date), Some(end_date), _) => Some(TemporalQuery::Explicit {
                start_date,
                end_date,
            }),
            (_, _, Some(natural)) => Some(TemporalQuery::Natural {
                natural: natural.clone(),
            }),
            _ => None,
        }
    }

    /// True when only one of `start_date` / `end_date` is set.
    pub fn has_partial_range(&self) -> bool {
        self.start_date.is_some() != self.end_date.is_some()
    }
}
