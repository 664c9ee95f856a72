//! Advancing a recurring task by one occurrence, and undoing that advance.
//!
//! The coordinator never touches storage. It reads a stored recurrence string
//! and a [`TaskOccurrenceInput`] snapshot and returns a [`RepeatOutcome`]
//! telling the caller what to write back. Callers must not run two advances
//! for the same task at once; advances for different tasks are independent.
//!
//! Every path returns an outcome rather than an error: a malformed rule or a
//! rule with no next occurrence comes back as [`RepeatOutcome::Aborted`] and
//! the caller leaves the task as it is.

use chrono_tz::Tz;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmShift;
use crate::calculator::next_due_date;
use crate::config::RepeatConfig;
use crate::error::{RepeatError, Result};
use crate::rule::{parse_recurrence, render_recurrence, RecurrenceRule, RepeatFrom};
use crate::task::TaskOccurrenceInput;
use crate::termination::{self, FinishReason, Termination};

/// Field values the caller writes back to the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatInstructions {
    /// The due date being replaced, used to shift alarms.
    pub previous_due_date: i64,
    pub due_date: i64,
    pub hide_until: i64,
    /// Stored form of the rule, count adjusted.
    pub recurrence: String,
    pub repeat_from: RepeatFrom,
    /// Signed move of absolute alarms in milliseconds.
    pub alarm_delta: i64,
    pub completion_date: i64,
    pub reminder_last: i64,
    pub reminder_snooze: i64,
}

impl RepeatInstructions {
    pub fn alarm_shift(&self, task: i64) -> AlarmShift {
        AlarmShift::new(task, self.previous_due_date, self.due_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepeatOutcome {
    /// The series goes on; apply the instructions.
    Continue(RepeatInstructions),
    /// The series has ended. The caller marks the task complete.
    Finished { reason: FinishReason },
    /// The task has no recurrence.
    NotRecurring,
    /// The rule could not be used. Nothing should be written.
    Aborted { error: RepeatError },
}

impl RepeatOutcome {
    pub fn instructions(&self) -> Option<&RepeatInstructions> {
        match self {
            RepeatOutcome::Continue(instructions) => Some(instructions),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RepeatOutcome::Finished { .. })
    }
}

/// Advances recurring tasks in one configured zone.
#[derive(Debug, Clone)]
pub struct RepeatCoordinator {
    config: RepeatConfig,
    tz: Tz,
}

impl RepeatCoordinator {
    /// # Errors
    /// Returns `RepeatError::InvalidTimezone` or `RepeatError::InvalidConfig`
    /// when the configuration does not validate.
    pub fn new(config: RepeatConfig) -> Result<Self> {
        config.validate()?;
        let tz = config.zone()?;
        Ok(Self { config, tz })
    }

    pub fn config(&self) -> &RepeatConfig {
        &self.config
    }

    /// Compute the next due date for a stored recurrence string without
    /// deciding termination.
    pub fn next_due_date(&self, recurrence: &str, task: &TaskOccurrenceInput) -> Result<i64> {
        let (rule, input) = prepare(recurrence, task)?;
        next_due_date(&rule, &input, &self.config)
    }

    /// Advance `task` past its current occurrence.
    pub fn advance(&self, recurrence: &str, task: &TaskOccurrenceInput) -> RepeatOutcome {
        if recurrence.trim().is_empty() {
            return RepeatOutcome::NotRecurring;
        }
        let (rule, input) = match prepare(recurrence, task) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("not repeating task with rule '{}': {}", recurrence, e);
                return RepeatOutcome::Aborted { error: e };
            }
        };

        if termination::is_last_occurrence(&rule) {
            debug!("'{}' has no occurrences left", rule);
            return RepeatOutcome::Finished {
                reason: FinishReason::CountExhausted,
            };
        }

        let new_due_date = match next_due_date(&rule, &input, &self.config) {
            Ok(due) => due,
            Err(e) => return self.abort(&rule, &input, e),
        };

        match termination::evaluate(&rule, new_due_date, &self.tz) {
            Ok(Termination::Continue) => {}
            Ok(Termination::Finished(reason)) => {
                debug!("'{}' finished at {}: {:?}", rule, new_due_date, reason);
                return RepeatOutcome::Finished { reason };
            }
            Err(e) => return self.abort(&rule, &input, e),
        }

        let next_rule = termination::consume_occurrence(&rule);
        let hide_until = adjust_hide_until(input.due_date, input.hide_until, new_due_date);
        let previous_due_date = if input.has_due_date() {
            input.due_date
        } else {
            self.back_compute(&rule, &input, new_due_date, hide_until)
        };

        debug!(
            "'{}' advanced from {} to {}",
            rule, previous_due_date, new_due_date
        );
        RepeatOutcome::Continue(RepeatInstructions {
            previous_due_date,
            due_date: new_due_date,
            hide_until,
            recurrence: render_recurrence(&next_rule, input.repeat_from),
            repeat_from: input.repeat_from,
            alarm_delta: new_due_date - previous_due_date,
            completion_date: 0,
            reminder_last: 0,
            reminder_snooze: 0,
        })
    }

    /// Reverse an advance.
    ///
    /// `task` is the state after the advance. When `previous_due_date` is not
    /// known it is recovered by running the forward computation once more and
    /// stepping back by the same distance.
    pub fn undo(
        &self,
        recurrence: &str,
        task: &TaskOccurrenceInput,
        previous_due_date: Option<i64>,
    ) -> RepeatOutcome {
        if recurrence.trim().is_empty() {
            return RepeatOutcome::NotRecurring;
        }
        let (rule, input) = match prepare(recurrence, task) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("cannot undo repeat with rule '{}': {}", recurrence, e);
                return RepeatOutcome::Aborted { error: e };
            }
        };

        let current = TaskOccurrenceInput {
            completion_date: 0,
            ..input
        };
        let restored = match previous_due_date.filter(|&due| due > 0) {
            Some(due) => due,
            None if current.has_due_date() => {
                // The step back is measured from the due date, whatever the series anchors on.
                let from_due = TaskOccurrenceInput {
                    repeat_from: RepeatFrom::DueDate,
                    ..current
                };
                match next_due_date(&rule, &from_due, &self.config) {
                    Ok(next) => current.due_date - (next - current.due_date),
                    Err(e) => return self.abort(&rule, &current, e),
                }
            }
            None => {
                return self.abort(
                    &rule,
                    &current,
                    RepeatError::InconsistentRule("no due date to restore".to_string()),
                )
            }
        };

        let restored_rule = termination::restore_occurrence(&rule);
        debug!(
            "'{}' restored from {} to {}",
            rule, current.due_date, restored
        );
        RepeatOutcome::Continue(RepeatInstructions {
            previous_due_date: current.due_date,
            due_date: restored,
            hide_until: adjust_hide_until(current.due_date, current.hide_until, restored),
            recurrence: render_recurrence(&restored_rule, current.repeat_from),
            repeat_from: current.repeat_from,
            alarm_delta: restored - current.due_date,
            completion_date: 0,
            reminder_last: 0,
            reminder_snooze: 0,
        })
    }

    /// With no old due date, derive one a full step before the new one so the
    /// alarm delta still means something.
    fn back_compute(
        &self,
        rule: &RecurrenceRule,
        input: &TaskOccurrenceInput,
        new_due_date: i64,
        hide_until: i64,
    ) -> i64 {
        let advanced = TaskOccurrenceInput {
            due_date: new_due_date,
            hide_until,
            completion_date: 0,
            repeat_from: RepeatFrom::DueDate,
            ..*input
        };
        match next_due_date(rule, &advanced, &self.config) {
            Ok(following) => new_due_date - (following - new_due_date),
            Err(e) => {
                warn!("no step back from {} for '{}': {}", new_due_date, rule, e);
                new_due_date
            }
        }
    }

    fn abort(
        &self,
        rule: &RecurrenceRule,
        input: &TaskOccurrenceInput,
        e: RepeatError,
    ) -> RepeatOutcome {
        error!(
            "cannot compute next occurrence of '{}' (zone {}, due {}, completed {}, from {:?}): {}",
            rule, self.tz.name(), input.due_date, input.completion_date, input.repeat_from, e
        );
        RepeatOutcome::Aborted { error: e }
    }
}

/// Advance with a one-off coordinator.
pub fn advance(recurrence: &str, task: &TaskOccurrenceInput, config: &RepeatConfig) -> RepeatOutcome {
    match RepeatCoordinator::new(config.clone()) {
        Ok(coordinator) => coordinator.advance(recurrence, task),
        Err(e) => RepeatOutcome::Aborted { error: e },
    }
}

/// Undo with a one-off coordinator.
pub fn undo(
    recurrence: &str,
    task: &TaskOccurrenceInput,
    previous_due_date: Option<i64>,
    config: &RepeatConfig,
) -> RepeatOutcome {
    match RepeatCoordinator::new(config.clone()) {
        Ok(coordinator) => coordinator.undo(recurrence, task, previous_due_date),
        Err(e) => RepeatOutcome::Aborted { error: e },
    }
}

/// Keep the start date the same distance before the due date. Clears it when
/// the due date is cleared.
pub fn adjust_hide_until(old_due_date: i64, hide_until: i64, new_due_date: i64) -> i64 {
    if old_due_date > 0 && hide_until > 0 {
        if new_due_date > 0 {
            hide_until + new_due_date - old_due_date
        } else {
            0
        }
    } else {
        hide_until
    }
}

/// Parse the stored string and settle which anchor applies. A `FROM=` marker
/// in the string overrides the snapshot's `repeat_from`.
fn prepare(
    recurrence: &str,
    task: &TaskOccurrenceInput,
) -> Result<(RecurrenceRule, TaskOccurrenceInput)> {
    let parsed = parse_recurrence(recurrence)?;
    let input = TaskOccurrenceInput {
        repeat_from: parsed.repeat_from.unwrap_or(task.repeat_from),
        ..*task
    };
    Ok((parsed.rule, input))
}
