//! Recurrence rule parsing -- the RFC 5545 subset stored on recurring tasks.
//!
//! A task stores its rule as a string such as `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE`,
//! optionally followed by the non-standard `;FROM=COMPLETION` marker. The marker
//! is split off by [`parse_recurrence`] before the remainder is parsed into an
//! immutable [`RecurrenceRule`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{RepeatError, Result};

/// Standard RFC 5545 parts that are carried through untouched to the generic
/// RRULE iterator.
const PASSTHROUGH_KEYS: &[&str] = &[
    "BYMONTHDAY",
    "BYMONTH",
    "BYSETPOS",
    "BYYEARDAY",
    "BYWEEKNO",
    "BYHOUR",
    "BYMINUTE",
    "BYSECOND",
    "WKST",
];

const FROM_COMPLETION: &str = "FROM=COMPLETION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    /// Hourly and minutely rules advance by a fixed duration instead of by
    /// calendar days.
    pub fn is_sub_day(self) -> bool {
        matches!(self, Frequency::Minutely | Frequency::Hourly)
    }
}

impl FromStr for Frequency {
    type Err = RepeatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MINUTELY" => Ok(Frequency::Minutely),
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(RepeatError::MalformedRule(format!(
                "unsupported FREQ value '{}'",
                other
            ))),
        }
    }
}

/// Which instant the next occurrence is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatFrom {
    #[default]
    DueDate,
    CompletionDate,
}

/// A `BYDAY` entry: a weekday with an optional ordinal within the month
/// (`2TU` is the second Tuesday, `-1FR` the last Friday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    pub fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.ordinal {
            write!(f, "{}", n)?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

impl FromStr for WeekdayNum {
    type Err = RepeatError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() < 2 || !s.is_char_boundary(s.len() - 2) {
            return Err(malformed(format!("invalid BYDAY entry '{}'", s)));
        }
        let (prefix, code) = s.split_at(s.len() - 2);
        let weekday = match code {
            "MO" => Weekday::Mon,
            "TU" => Weekday::Tue,
            "WE" => Weekday::Wed,
            "TH" => Weekday::Thu,
            "FR" => Weekday::Fri,
            "SA" => Weekday::Sat,
            "SU" => Weekday::Sun,
            _ => return Err(malformed(format!("unknown weekday '{}'", code))),
        };
        let ordinal = if prefix.is_empty() {
            None
        } else {
            let n: i8 = prefix
                .trim_start_matches('+')
                .parse()
                .map_err(|_| malformed(format!("invalid BYDAY ordinal '{}'", prefix)))?;
            if n == 0 || !(-53..=53).contains(&n) {
                return Err(malformed(format!("BYDAY ordinal out of range: {}", n)));
            }
            Some(n)
        };
        Ok(Self { ordinal, weekday })
    }
}

/// The `UNTIL` bound as written in the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// `UNTIL=20261231`
    Date(NaiveDate),
    /// `UNTIL=20261231T235959` -- wall-clock time in the task's zone.
    Floating(NaiveDateTime),
    /// `UNTIL=20261231T235959Z`
    Utc(NaiveDateTime),
}

impl Until {
    /// The calendar day of the bound as seen in `tz`.
    pub fn local_date(&self, tz: &Tz) -> NaiveDate {
        match self {
            Until::Date(d) => *d,
            Until::Floating(dt) => dt.date(),
            Until::Utc(dt) => Utc.from_utc_datetime(dt).with_timezone(tz).date_naive(),
        }
    }
}

impl fmt::Display for Until {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Until::Date(d) => write!(f, "{}", d.format("%Y%m%d")),
            Until::Floating(dt) => write!(f, "{}", dt.format("%Y%m%dT%H%M%S")),
            Until::Utc(dt) => write!(f, "{}Z", dt.format("%Y%m%dT%H%M%S")),
        }
    }
}

impl FromStr for Until {
    type Err = RepeatError;

    fn from_str(s: &str) -> Result<Self> {
        // Accept extended ISO forms by reducing them to the iCalendar basic form.
        let basic = s.replace(['-', ':'], "");
        let invalid = || malformed(format!("invalid UNTIL value '{}'", s));
        if let Some(stripped) = basic.strip_suffix('Z') {
            NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
                .map(Until::Utc)
                .map_err(|_| invalid())
        } else if basic.contains('T') {
            NaiveDateTime::parse_from_str(&basic, "%Y%m%dT%H%M%S")
                .map(Until::Floating)
                .map_err(|_| invalid())
        } else {
            NaiveDate::parse_from_str(&basic, "%Y%m%d")
                .map(Until::Date)
                .map_err(|_| invalid())
        }
    }
}

/// An immutable recurrence rule.
///
/// Built fresh from the stored string on every advance and discarded after;
/// only its [`Display`](fmt::Display) form is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Always at least 1.
    pub interval: u32,
    /// Remaining occurrences including the current one.
    pub count: Option<u32>,
    pub until: Option<Until>,
    /// Only ever non-empty for weekly and monthly rules.
    pub by_day: Vec<WeekdayNum>,
    extras: Vec<(String, String)>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            extras: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = coerce_interval(interval);
        self
    }

    pub fn with_count(mut self, count: Option<u32>) -> Self {
        self.count = count.filter(|&c| c > 0);
        self
    }

    pub fn with_until(mut self, until: Option<Until>) -> Self {
        self.until = until;
        self
    }

    pub fn with_by_day(mut self, by_day: Vec<WeekdayNum>) -> Self {
        self.by_day = by_day;
        self.normalize();
        self
    }

    /// Parse a rule string. `FROM=` markers must already be stripped; see
    /// [`parse_recurrence`].
    pub fn parse(input: &str) -> Result<Self> {
        let upper = input.trim().to_ascii_uppercase();
        let body = upper.strip_prefix("RRULE:").unwrap_or(&upper);
        if body.is_empty() {
            return Err(malformed("empty RRULE string".to_string()));
        }

        let mut frequency = None;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;
        let mut by_day = Vec::new();
        let mut extras = Vec::new();
        let mut seen = HashSet::new();

        for part in body.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| malformed(format!("missing '=' in '{}'", part)))?;
            if !seen.insert(key) {
                return Err(malformed(format!("duplicate {} part", key)));
            }
            match key {
                "FREQ" => frequency = Some(value.parse::<Frequency>()?),
                "INTERVAL" => {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| malformed(format!("invalid INTERVAL '{}'", value)))?;
                    interval = coerce_interval(n);
                }
                "COUNT" => {
                    let n: i64 = value
                        .parse()
                        .map_err(|_| malformed(format!("invalid COUNT '{}'", value)))?;
                    // A non-positive count carries no limit.
                    count = u32::try_from(n).ok().filter(|&c| c > 0);
                }
                "UNTIL" => until = Some(value.parse::<Until>()?),
                "BYDAY" => {
                    by_day = value
                        .split(',')
                        .filter(|d| !d.is_empty())
                        .map(str::parse)
                        .collect::<Result<Vec<WeekdayNum>>>()?;
                }
                "FROM" => {
                    return Err(malformed(
                        "FROM is not an RRULE part and must be stripped first".to_string(),
                    ))
                }
                k if PASSTHROUGH_KEYS.contains(&k) => {
                    if value.is_empty() {
                        return Err(malformed(format!("empty {} value", k)));
                    }
                    extras.push((k.to_string(), value.to_string()));
                }
                other => return Err(malformed(format!("unsupported RRULE part '{}'", other))),
            }
        }

        let frequency = frequency.ok_or_else(|| malformed("missing FREQ".to_string()))?;
        let mut rule = Self {
            frequency,
            interval,
            count,
            until,
            by_day,
            extras,
        };
        rule.normalize();
        Ok(rule)
    }

    /// Non-standard-but-valid parts (`BYMONTHDAY`, `WKST`, ...) in input order.
    pub fn extras(&self) -> &[(String, String)] {
        &self.extras
    }

    /// True when the rule constrains occurrences beyond frequency and interval.
    pub fn has_by_rules(&self) -> bool {
        !self.by_day.is_empty() || self.extras.iter().any(|(k, _)| k.starts_with("BY"))
    }

    /// `BYDAY` entries sorted Monday first.
    pub fn sorted_weekdays(&self) -> Vec<WeekdayNum> {
        let mut days = self.by_day.clone();
        days.sort_by_key(|d| d.weekday.num_days_from_monday());
        days
    }

    /// The rule body handed to the RRULE iterator. `COUNT` and `UNTIL` are
    /// left out because termination is decided separately.
    pub fn iteration_rule(&self) -> String {
        self.clone().with_count(None).with_until(None).to_string()
    }

    /// Weekday constraints only make sense for weekly and monthly rules; any
    /// stray `BYDAY` on other frequencies is dropped.
    fn normalize(&mut self) {
        if !matches!(self.frequency, Frequency::Weekly | Frequency::Monthly) {
            self.by_day.clear();
        }
    }
}

impl FromStr for RecurrenceRule {
    type Err = RepeatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency.as_str())?;
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        if let Some(until) = &self.until {
            write!(f, ";UNTIL={}", until)?;
        }
        if !self.by_day.is_empty() {
            let days: Vec<String> = self.by_day.iter().map(ToString::to_string).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        for (key, value) in &self.extras {
            write!(f, ";{}={}", key, value)?;
        }
        Ok(())
    }
}

/// A stored recurrence string split into the rule and its `FROM` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecurrence {
    pub rule: RecurrenceRule,
    /// `Some` only when the string carried a `FROM=` marker.
    pub repeat_from: Option<RepeatFrom>,
}

impl ParsedRecurrence {
    /// Render back to the stored form, re-appending `FROM=COMPLETION` when
    /// the series repeats from completion.
    pub fn to_recurrence_string(&self, repeat_from: RepeatFrom) -> String {
        render_recurrence(&self.rule, repeat_from)
    }
}

/// Parse a stored recurrence string, including the `FROM=` marker.
pub fn parse_recurrence(recurrence: &str) -> Result<ParsedRecurrence> {
    let (body, repeat_from) = split_from_marker(recurrence);
    Ok(ParsedRecurrence {
        rule: RecurrenceRule::parse(&body)?,
        repeat_from,
    })
}

/// Render a rule in stored form.
pub fn render_recurrence(rule: &RecurrenceRule, repeat_from: RepeatFrom) -> String {
    match repeat_from {
        RepeatFrom::CompletionDate => format!("{};{}", rule, FROM_COMPLETION),
        RepeatFrom::DueDate => rule.to_string(),
    }
}

/// Remove every `FROM=` part (and empty `BYDAY=` parts) from a recurrence
/// string, returning what remains and which anchor the marker selected.
pub fn split_from_marker(recurrence: &str) -> (String, Option<RepeatFrom>) {
    let mut repeat_from = None;
    let kept: Vec<&str> = recurrence
        .trim()
        .split(';')
        .filter(|part| {
            let upper = part.trim().to_ascii_uppercase();
            if let Some(value) = upper.strip_prefix("FROM=") {
                repeat_from = Some(if value == "COMPLETION" {
                    RepeatFrom::CompletionDate
                } else {
                    RepeatFrom::DueDate
                });
                false
            } else {
                !part.is_empty() && upper != "BYDAY="
            }
        })
        .collect();
    (kept.join(";"), repeat_from)
}

pub(crate) fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn coerce_interval(n: i64) -> u32 {
    u32::try_from(n).ok().filter(|&i| i > 0).unwrap_or(1)
}

fn malformed(message: String) -> RepeatError {
    RepeatError::MalformedRule(message)
}
