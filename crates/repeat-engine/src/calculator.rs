//! Next-occurrence computation for recurring tasks.
//!
//! [`next_due_date`] picks one of four [`Strategy`] branches by rule shape and
//! anchor, then runs it. Every branch is a pure function of the rule, the
//! anchor and the configuration, so the same inputs always produce the same
//! due date.
//!
//! The generic branch wraps the `rrule` crate: the anchor becomes `DTSTART`
//! in the configured zone and the first occurrence strictly after it wins.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Timelike, Weekday};
use chrono_tz::Tz;
use log::debug;
use rrule::RRuleSet;

use crate::config::RepeatConfig;
use crate::dst::{resolve_local, with_wall_clock};
use crate::error::{RepeatError, Result};
use crate::rule::{Frequency, RecurrenceRule, RepeatFrom, WeekdayNum};
use crate::task::{
    create_due_date, to_local, DuePrecision, TaskOccurrenceInput, ONE_HOUR, ONE_MINUTE,
};

/// The instant an occurrence is measured from, and the precision of the
/// task's due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub start: DateTime<Tz>,
    pub precision: DuePrecision,
}

/// How the next occurrence is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Hourly or minutely: a fixed number of milliseconds past the anchor.
    SubDay { unit_millis: i64 },
    /// Weekly with `BYDAY`, measured from completion: the next listed weekday.
    WeeklyAfterCompletion,
    /// Monthly, anchored on the last day of a month: stays on the last day.
    MonthlyLastDay,
    /// Everything else goes through the RRULE iterator.
    Generic,
}

impl Strategy {
    /// First match wins, in the order the variants are declared.
    ///
    /// Month-end pinning only applies to a bare monthly rule: any `BY*` part,
    /// not just `BYDAY`, hands the rule to the iterator so it is not overridden.
    pub fn select(rule: &RecurrenceRule, repeat_from: RepeatFrom, anchor: &Anchor) -> Self {
        match rule.frequency {
            Frequency::Minutely => Strategy::SubDay {
                unit_millis: ONE_MINUTE,
            },
            Frequency::Hourly => Strategy::SubDay {
                unit_millis: ONE_HOUR,
            },
            Frequency::Weekly
                if !rule.by_day.is_empty() && repeat_from == RepeatFrom::CompletionDate =>
            {
                Strategy::WeeklyAfterCompletion
            }
            Frequency::Monthly
                if !rule.has_by_rules() && is_last_day_of_month(anchor.start.date_naive()) =>
            {
                Strategy::MonthlyLastDay
            }
            _ => Strategy::Generic,
        }
    }

    pub fn apply(
        self,
        rule: &RecurrenceRule,
        anchor: &Anchor,
        config: &RepeatConfig,
    ) -> Result<i64> {
        match self {
            Strategy::SubDay { unit_millis } => Ok(next_sub_day(rule, anchor, unit_millis)),
            Strategy::WeeklyAfterCompletion => next_weekly_after_completion(rule, anchor, config),
            Strategy::MonthlyLastDay => next_monthly_last_day(rule, anchor, config),
            Strategy::Generic => next_generic(rule, anchor, config),
        }
    }
}

/// Compute the due date of the occurrence after the one described by `input`.
///
/// # Errors
/// Returns `RepeatError::InvalidTimezone` if the configured zone is unknown,
/// `RepeatError::MalformedRule` if the RRULE iterator rejects the rule, and
/// `RepeatError::InconsistentRule` if no next occurrence can be found.
pub fn next_due_date(
    rule: &RecurrenceRule,
    input: &TaskOccurrenceInput,
    config: &RepeatConfig,
) -> Result<i64> {
    let tz = config.zone()?;
    let anchor = start_date(rule.frequency, input, &tz, config)?;
    let strategy = Strategy::select(rule, input.repeat_from, &anchor);
    debug!(
        "next occurrence of '{}' from {} via {:?}",
        rule, anchor.start, strategy
    );
    strategy.apply(rule, &anchor, config)
}

/// Work out the anchor for the next occurrence.
///
/// Repeating from completion measures from the completion instant (or `now`
/// when the task is not completed). Unless the rule is sub-day, a task with a
/// due time keeps its clock time, so "daily at 09:00" stays at 09:00 however
/// late it was ticked off. Repeating from the due date measures from the due
/// date, or `now` without one.
pub fn start_date(
    frequency: Frequency,
    input: &TaskOccurrenceInput,
    tz: &Tz,
    config: &RepeatConfig,
) -> Result<Anchor> {
    let precision = input.precision();
    let start = match input.repeat_from {
        RepeatFrom::CompletionDate => {
            let base = if input.is_completed() {
                input.completion_date
            } else {
                input.now
            };
            let completed = to_local(base, tz)?;
            if input.has_due_time() && !frequency.is_sub_day() {
                let due = to_local(input.due_date, tz)?;
                with_wall_clock(&completed, clock_time(&due), config.dst_policy)
            } else {
                completed
            }
        }
        RepeatFrom::DueDate => {
            let base = if input.has_due_date() {
                input.due_date
            } else {
                input.now
            };
            to_local(base, tz)?
        }
    };
    Ok(Anchor { start, precision })
}

fn next_sub_day(rule: &RecurrenceRule, anchor: &Anchor, unit_millis: i64) -> i64 {
    let millis = anchor.start.timestamp_millis() + unit_millis * i64::from(rule.interval);
    // Sub-day occurrences always carry a time. Stay on the instant rather than
    // the wall clock so a repeated fall-back hour is not folded onto its first copy.
    millis - millis.rem_euclid(ONE_MINUTE) + 1_000
}

fn next_weekly_after_completion(
    rule: &RecurrenceRule,
    anchor: &Anchor,
    config: &RepeatConfig,
) -> Result<i64> {
    let skip = i64::from(rule.interval) - 1;
    let start = Duration::try_weeks(skip)
        .and_then(|weeks| anchor.start.naive_local().checked_add_signed(weeks))
        .ok_or_else(|| {
            RepeatError::InconsistentRule(format!(
                "cannot advance {} by {} weeks",
                anchor.start, skip
            ))
        })?;
    let target = next_weekday(&rule.sorted_weekdays(), start.weekday()).ok_or_else(|| {
        RepeatError::InconsistentRule(format!("'{}' has no weekdays", rule))
    })?;
    let next = (1..=7)
        .filter_map(|days| start.checked_add_signed(Duration::days(days)))
        .find(|date| date.weekday() == target)
        .ok_or_else(|| RepeatError::InconsistentRule(format!("no {:?} after {}", target, start)))?;
    let local = resolve_local(&anchor.start.timezone(), next, config.dst_policy);
    Ok(create_due_date(anchor.precision, &local, config.dst_policy))
}

/// The earliest listed weekday strictly after `current` (Monday first),
/// wrapping to the first entry when none is later in the week.
fn next_weekday(sorted: &[WeekdayNum], current: Weekday) -> Option<Weekday> {
    sorted
        .iter()
        .find(|d| d.weekday.num_days_from_monday() > current.num_days_from_monday())
        .or_else(|| sorted.first())
        .map(|d| d.weekday)
}

fn next_monthly_last_day(
    rule: &RecurrenceRule,
    anchor: &Anchor,
    config: &RepeatConfig,
) -> Result<i64> {
    let date = anchor.start.date_naive();
    let last = date
        .checked_add_months(Months::new(rule.interval))
        .and_then(last_day_of_month)
        .ok_or_else(|| {
            RepeatError::InconsistentRule(format!(
                "cannot advance {} by {} months",
                date, rule.interval
            ))
        })?;
    let local = resolve_local(
        &anchor.start.timezone(),
        last.and_time(anchor.start.time()),
        config.dst_policy,
    );
    Ok(create_due_date(anchor.precision, &local, config.dst_policy))
}

fn next_generic(rule: &RecurrenceRule, anchor: &Anchor, config: &RepeatConfig) -> Result<i64> {
    let tz = anchor.start.timezone();
    let start_local = match anchor.precision {
        DuePrecision::Day => anchor.start.date_naive().and_time(noon()),
        DuePrecision::DayTime => anchor.start.naive_local(),
    };

    // Build the iCalendar text block the rrule crate parses, e.g.
    // "DTSTART;TZID=Europe/Berlin:20260217T090001\nRRULE:FREQ=DAILY".
    let rrule_text = format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        tz.name(),
        start_local.format("%Y%m%dT%H%M%S"),
        rule.iteration_rule()
    );
    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| RepeatError::MalformedRule(format!("{}", e)))?;

    let candidates = rrule_set.all(config.search_limit);
    let next = candidates
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&tz))
        .find(|dt| dt.naive_local() > start_local)
        .ok_or_else(|| {
            RepeatError::InconsistentRule(format!(
                "no occurrence of '{}' after {} within {} candidates",
                rule, start_local, config.search_limit
            ))
        })?;

    Ok(match anchor.precision {
        DuePrecision::DayTime => {
            // The iterator's clock time can drift across a DST change; pin it
            // back to the anchor's.
            let pinned = with_wall_clock(&next, clock_time(&anchor.start), config.dst_policy);
            create_due_date(DuePrecision::DayTime, &pinned, config.dst_policy)
        }
        DuePrecision::Day => create_due_date(DuePrecision::Day, &next, config.dst_policy),
    })
}

fn clock_time(dt: &DateTime<Tz>) -> NaiveTime {
    NaiveTime::from_hms_opt(dt.hour(), dt.minute(), dt.second()).unwrap_or(NaiveTime::MIN)
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}
