//! Series termination -- deciding when a recurring task stops repeating.
//!
//! Reaching the end of a series is a normal outcome, not an error.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rule::RecurrenceRule;
use crate::task::to_local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// `COUNT=1`: the occurrence just completed was the last one.
    CountExhausted,
    /// The next occurrence falls on a day after `UNTIL`.
    PastUntil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Continue,
    Finished(FinishReason),
}

/// True when the series ends with the current occurrence. Checked before any
/// next date is computed.
pub fn is_last_occurrence(rule: &RecurrenceRule) -> bool {
    rule.count == Some(1)
}

/// Decide whether the series continues with `next_due_date`.
///
/// Only calendar days are compared against `UNTIL`: an occurrence later on the
/// `UNTIL` day itself still counts.
pub fn evaluate(rule: &RecurrenceRule, next_due_date: i64, tz: &Tz) -> Result<Termination> {
    if is_last_occurrence(rule) {
        return Ok(Termination::Finished(FinishReason::CountExhausted));
    }
    if let Some(until) = &rule.until {
        let next_day = to_local(next_due_date, tz)?.date_naive();
        if next_day > until.local_date(tz) {
            return Ok(Termination::Finished(FinishReason::PastUntil));
        }
    }
    Ok(Termination::Continue)
}

/// The rule to store after one more occurrence has been used up.
pub fn consume_occurrence(rule: &RecurrenceRule) -> RecurrenceRule {
    match rule.count {
        Some(count) if count > 1 => rule.clone().with_count(Some(count - 1)),
        _ => rule.clone(),
    }
}

/// The rule to store after an occurrence has been handed back by an undo.
pub fn restore_occurrence(rule: &RecurrenceRule) -> RecurrenceRule {
    match rule.count {
        Some(count) => rule.clone().with_count(Some(count.saturating_add(1))),
        None => rule.clone(),
    }
}
