//! Scheduler-adapter boundary: the next-trigger computation the external
//! cron consumes. Owns no allocation logic.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    #[default]
    Days,
    Weeks,
    Months,
}

impl std::fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalUnit::Minutes => write!(f, "minutes"),
            IntervalUnit::Hours => write!(f, "hours"),
            IntervalUnit::Days => write!(f, "days"),
            IntervalUnit::Weeks => write!(f, "weeks"),
            IntervalUnit::Months => write!(f, "months"),
        }
    }
}

pub fn parse_interval_unit(s: &str) -> Result<IntervalUnit, String> {
    match s.to_lowercase().as_str() {
        "minutes" => Ok(IntervalUnit::Minutes),
        "hours" => Ok(IntervalUnit::Hours),
        "days" => Ok(IntervalUnit::Days),
        "weeks" => Ok(IntervalUnit::Weeks),
        "months" => Ok(IntervalUnit::Months),
        _ => Err(format!(
            "Invalid interval unit '{}': expected minutes, hours, days, weeks, or months",
            s
        )),
    }
}

/// Scheduling cadence as an explicit value object instead of mutable
/// ambient state. `next_call` may be set manually, overriding the computed
/// cadence for the next run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TriggerSchedule {
    pub interval_number: u32,
    pub interval_unit: IntervalUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_call: Option<DateTime<Utc>>,
}

impl TriggerSchedule {
    pub fn new(interval_number: u32, interval_unit: IntervalUnit) -> Self {
        Self {
            interval_number,
            interval_unit,
            next_call: None,
        }
    }

    pub fn with_next_call(mut self, next_call: Option<DateTime<Utc>>) -> Self {
        self.next_call = next_call;
        self
    }

    /// When the next run fires: the manual override if one is set,
    /// otherwise `now` advanced by the configured interval.
    pub fn upcoming(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.next_call {
            Some(at) => at,
            None => next_trigger(self.interval_number, self.interval_unit, now),
        }
    }

    /// Move past a fired tick. A manual override applies once, so it is
    /// cleared; the following tick anchors on the fired time rather than on
    /// the wall clock, keeping the cadence free of run-duration drift.
    pub fn advance(&mut self, fired: DateTime<Utc>) -> DateTime<Utc> {
        self.next_call = None;
        next_trigger(self.interval_number, self.interval_unit, fired)
    }
}

/// Pure next-trigger computation: `now` advanced by `number` units.
/// Months use calendar arithmetic (Jan 31 + 1 month = Feb 28/29).
pub fn next_trigger(number: u32, unit: IntervalUnit, now: DateTime<Utc>) -> DateTime<Utc> {
    match unit {
        IntervalUnit::Minutes => now + Duration::minutes(i64::from(number)),
        IntervalUnit::Hours => now + Duration::hours(i64::from(number)),
        IntervalUnit::Days => now + Duration::days(i64::from(number)),
        IntervalUnit::Weeks => now + Duration::weeks(i64::from(number)),
        IntervalUnit::Months => now
            .checked_add_months(Months::new(number))
            .unwrap_or(now),
    }
}
