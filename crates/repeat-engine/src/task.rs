//! Task state consumed by the engine, and the due-date encoding it relies on.
//!
//! Instants are milliseconds since the Unix epoch with `0` meaning "unset".
//! A due date is either day-only or day+time; the two are told apart by the
//! seconds field. Day-only values sit at local noon with zero seconds, so they
//! are exact multiples of one minute. Day+time values carry one second.

use chrono::{DateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{RepeatError, Result};
use crate::rule::RepeatFrom;

pub const ONE_MINUTE: i64 = 60_000;
pub const ONE_HOUR: i64 = 60 * ONE_MINUTE;
pub const ONE_DAY: i64 = 24 * ONE_HOUR;
pub const ONE_WEEK: i64 = 7 * ONE_DAY;

/// Whether a due date names a day or a day and a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuePrecision {
    Day,
    DayTime,
}

impl DuePrecision {
    pub fn of(due_date: i64) -> Self {
        if has_due_time(due_date) {
            DuePrecision::DayTime
        } else {
            DuePrecision::Day
        }
    }
}

/// True when `due_date` is set and carries a time of day.
pub fn has_due_time(due_date: i64) -> bool {
    due_date > 0 && due_date % ONE_MINUTE > 0
}

/// Encode a local date-time as a due date of the given precision.
pub fn create_due_date(precision: DuePrecision, local: &DateTime<Tz>, policy: DstPolicy) -> i64 {
    let naive = match precision {
        DuePrecision::Day => local.date_naive().and_time(noon()),
        DuePrecision::DayTime => {
            let time = NaiveTime::from_hms_opt(local.hour(), local.minute(), 1).unwrap_or(noon());
            local.date_naive().and_time(time)
        }
    };
    resolve_local(&local.timezone(), naive, policy).timestamp_millis()
}

/// Interpret a millisecond instant in `tz`.
pub fn to_local(millis: i64, tz: &Tz) -> Result<DateTime<Tz>> {
    tz.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| RepeatError::InconsistentRule(format!("timestamp {} out of range", millis)))
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// The slice of task state the engine reads. It is never mutated; results
/// come back as new values for the caller to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskOccurrenceInput {
    #[serde(default)]
    pub due_date: i64,
    /// Start date; the task stays hidden until this instant.
    #[serde(default)]
    pub hide_until: i64,
    #[serde(default)]
    pub completion_date: i64,
    #[serde(default)]
    pub repeat_from: RepeatFrom,
    /// The evaluation instant, used whenever an anchor falls back to "now".
    pub now: i64,
}

impl TaskOccurrenceInput {
    pub fn new(due_date: i64, now: i64) -> Self {
        Self {
            due_date,
            now,
            ..Self::default()
        }
    }

    pub fn with_hide_until(mut self, hide_until: i64) -> Self {
        self.hide_until = hide_until;
        self
    }

    pub fn with_completion_date(mut self, completion_date: i64) -> Self {
        self.completion_date = completion_date;
        self
    }

    pub fn with_repeat_from(mut self, repeat_from: RepeatFrom) -> Self {
        self.repeat_from = repeat_from;
        self
    }

    pub fn has_due_date(&self) -> bool {
        self.due_date > 0
    }

    pub fn has_due_time(&self) -> bool {
        has_due_time(self.due_date)
    }

    pub fn is_completed(&self) -> bool {
        self.completion_date > 0
    }

    pub fn precision(&self) -> DuePrecision {
        DuePrecision::of(self.due_date)
    }
}
