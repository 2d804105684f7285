//! Natural-language temporal query translation.
//!
//! Turns phrases like "yesterday", "last week", "3 days ago" or "최근 7일"
//! into half-open UTC ranges whose boundaries fall on local midnights.
//! Everything here is pure: the clock and the calendar are parameters.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Timelike,
    Utc, Weekday,
};
use chronicle_models::{TemporalQuery, TimeRange};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::TemporalConfig;
use crate::{Error, Result};

/// Window used for phrases nobody recognises.
pub const FALLBACK_DAYS: u32 = 7;

static DAYS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d+)days?ago|(\d+)일전)$").expect("valid regex"));

static RECENT_DAYS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:recent|last|past)(\d+)days?|최근(\d+)일)$").expect("valid regex")
});

/// Calendar fields of an instant in the local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalParts {
    pub date: NaiveDate,
    pub hour: u32,
    /// 0 = Sunday
    pub day_of_week: u32,
    /// ISO-8601
    pub week_of_year: u32,
    pub month: u32,
    pub year: i32,
}

pub fn local_parts(ts: &DateTime<Utc>, offset: FixedOffset) -> LocalParts {
    let local = ts.with_timezone(&offset);
    let date = local.date_naive();
    LocalParts {
        date,
        hour: local.hour(),
        day_of_week: date.weekday().num_days_from_sunday(),
        week_of_year: date.iso_week().week(),
        month: date.month(),
        year: date.year(),
    }
}

/// The instant of local midnight starting `date`.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN) - Duration::seconds(offset.local_minus_utc() as i64);
    Utc.from_utc_datetime(&naive)
}

/// `[start 00:00, end + 1 day 00:00)` in local time.
pub fn date_span(start: NaiveDate, end_inclusive: NaiveDate, offset: FixedOffset) -> Result<TimeRange> {
    if start > end_inclusive {
        return Err(Error::Validation(format!(
            "start date {} is after end date {}",
            start, end_inclusive
        )));
    }
    let end = end_inclusive
        .succ_opt()
        .ok_or_else(|| Error::Validation(format!("end date {} out of range", end_inclusive)))?;

    Ok(TimeRange {
        start: local_midnight(start, offset),
        end: local_midnight(end, offset),
    })
}

/// The whole local day `date`.
pub fn day_range(date: NaiveDate, offset: FixedOffset) -> Result<TimeRange> {
    date_span(date, date, offset)
}

/// Resolve a temporal query against `now`.
pub fn resolve(query: &TemporalQuery, now: DateTime<Utc>, config: &TemporalConfig) -> Result<TimeRange> {
    match query {
        TemporalQuery::Explicit {
            start_date,
            end_date,
        } => date_span(*start_date, *end_date, config.utc_offset),
        TemporalQuery::Natural { natural } => resolve_phrase(natural, now, config),
    }
}

/// Resolve a phrase. Unrecognised phrases yield the last 7 days.
pub fn resolve_phrase(phrase: &str, now: DateTime<Utc>, config: &TemporalConfig) -> Result<TimeRange> {
    let offset = config.utc_offset;
    let today = now.with_timezone(&offset).date_naive();
    let key: String = phrase
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let range = match key.as_str() {
        "today" | "오늘" => day_range(today, offset)?,
        "yesterday" | "어제" => day_range(days_before(today, 1)?, offset)?,
        "thisweek" | "이번주" => {
            let start = week_start(today, config.week_start);
            date_span(start, start + Duration::days(6), offset)?
        }
        "lastweek" | "지난주" => {
            let start = week_start(today, config.week_start) - Duration::days(7);
            date_span(start, start + Duration::days(6), offset)?
        }
        "thismonth" | "이번달" => month_span(first_of_month(today), offset)?,
        "lastmonth" | "지난달" => {
            let start = first_of_month(today)
                .checked_sub_months(Months::new(1))
                .ok_or_else(|| out_of_range(phrase))?;
            month_span(start, offset)?
        }
        "thisyear" | "올해" => year_span(today.year(), offset)?,
        "lastyear" | "작년" => year_span(today.year() - 1, offset)?,
        _ => {
            if let Some(n) = capture_number(&DAYS_AGO, &key) {
                let n = n.ok_or_else(|| out_of_range(phrase))?;
                day_range(days_before(today, n)?, offset)?
            } else if let Some(n) = capture_number(&RECENT_DAYS, &key) {
                let n = n.ok_or_else(|| out_of_range(phrase))?;
                recent_days(today, n, offset)?
            } else {
                debug!(phrase, "Unrecognised temporal phrase, using last 7 days");
                recent_days(today, FALLBACK_DAYS, offset)?
            }
        }
    };

    Ok(range)
}

/// `n` calendar days ending today, inclusive.
fn recent_days(today: NaiveDate, n: u32, offset: FixedOffset) -> Result<TimeRange> {
    if n == 0 {
        return Err(Error::Validation("day count must be at least 1".to_string()));
    }
    date_span(days_before(today, n - 1)?, today, offset)
}

/// `Some(None)` when the pattern matched but the number does not fit.
fn capture_number(re: &Regex, key: &str) -> Option<Option<u32>> {
    let caps = re.captures(key)?;
    let digits = caps.get(1).or_else(|| caps.get(2))?;
    Some(digits.as_str().parse().ok())
}

fn days_before(date: NaiveDate, n: u32) -> Result<NaiveDate> {
    date.checked_sub_days(chrono::Days::new(n as u64))
        .ok_or_else(|| Error::Validation(format!("{} days before {} is out of range", n, date)))
}

fn week_start(date: NaiveDate, first_day: Weekday) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 7 - first_day.num_days_from_monday()) % 7;
    date - Duration::days(back as i64)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn month_span(first: NaiveDate, offset: FixedOffset) -> Result<TimeRange> {
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| out_of_range(&first.to_string()))?;
    Ok(TimeRange {
        start: local_midnight(first, offset),
        end: local_midnight(next, offset),
    })
}

fn year_span(year: i32, offset: FixedOffset) -> Result<TimeRange> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| out_of_range(&year.to_string()))?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(|| out_of_range(&year.to_string()))?;
    Ok(TimeRange {
        start: local_midnight(start, offset),
        end: local_midnight(end, offset),
    })
}

fn out_of_range(what: &str) -> Error {
    Error::Validation(format!("temporal expression out of range: {}", what))
}
