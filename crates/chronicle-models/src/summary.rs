//! Daily, weekly and monthly period summaries.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Granularity::Daily),
            "weekly" => Some(Granularity::Weekly),
            "monthly" => Some(Granularity::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The period a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum Period {
    Daily { date: NaiveDate },
    /// ISO-8601 year and week.
    Weekly { year: i32, week: u32 },
    Monthly { year: i32, month: u32 },
}

impl Period {
    pub fn granularity(&self) -> Granularity {
        match self {
            Period::Daily { .. } => Granularity::Daily,
            Period::Weekly { .. } => Granularity::Weekly,
            Period::Monthly { .. } => Granularity::Monthly,
        }
    }

    /// Stable storage key: `2024-03-05`, `2024-W10`, `2024-03`.
    pub fn key(&self) -> String {
        match self {
            Period::Daily { date } => date.format("%Y-%m-%d").to_string(),
            Period::Weekly { year, week } => format!("{:04}-W{:02}", year, week),
            Period::Monthly { year, month } => format!("{:04}-{:02}", year, month),
        }
    }

    /// Inverse of [`Period::key`].
    pub fn parse(granularity: Granularity, key: &str) -> Option<Self> {
        match granularity {
            Granularity::Daily => NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .ok()
                .map(|date| Period::Daily { date }),
            Granularity::Weekly => {
                let (year, week) = key.split_once("-W")?;
                Some(Period::Weekly {
                    year: year.parse().ok()?,
                    week: week.parse().ok()?,
                })
            }
            Granularity::Monthly => {
                let (year, month) = key.split_once('-')?;
                Some(Period::Monthly {
                    year: year.parse().ok()?,
                    month: month.parse().ok()?,
                })
            }
        }
    }
}

/// Granularity-specific structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryDetails {
    Daily {
        key_events: Vec<String>,
    },
    Weekly {
        highlights: Vec<String>,
        trends: Vec<String>,
    },
    Monthly {
        achievements: Vec<String>,
        challenges: Vec<String>,
        insights: Vec<String>,
    },
}

/// Activity counts for a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatistics {
    pub total_events: usize,
    pub by_event_type: BTreeMap<String, usize>,
    pub by_role: BTreeMap<String, usize>,
    /// Hour (daily), date (weekly) or ISO week (monthly) buckets.
    pub by_sub_period: BTreeMap<String, usize>,
    /// Busiest sub-period; earliest wins ties.
    pub peak_period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub id: String,
    pub owner_id: String,
    pub period: Period,
    pub model_name: String,
    pub model_version: String,
    pub summary: String,
    pub details: SummaryDetails,
    pub statistics: PeriodStatistics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_keys_parse_back() {
        let periods = [
            Period::Daily {
                date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            },
            Period::Weekly { year: 2024, week: 9 },
            Period::Monthly { year: 2024, month: 11 },
        ];
        for p in periods {
            assert_eq!(Period::parse(p.granularity(), &p.key()), Some(p));
        }
        assert_eq!(Period::Weekly { year: 2024, week: 9 }.key(), "2024-W09");
    }
}
