//! Tests for advancing and undoing recurring tasks.

use chrono::TimeZone;
use repeat_engine::task::{ONE_DAY, ONE_WEEK};
use repeat_engine::{
    advance, create_due_date, undo, Alarm, AlarmKind, DstPolicy, DuePrecision, FinishReason,
    RepeatConfig, RepeatCoordinator, RepeatError, RepeatFrom, RepeatInstructions, RepeatOutcome,
    TaskOccurrenceInput,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn coordinator() -> RepeatCoordinator {
    RepeatCoordinator::new(RepeatConfig::default()).unwrap()
}

fn day_time(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
    let local = chrono_tz::UTC.with_ymd_and_hms(y, m, d, h, min, 0).unwrap();
    create_due_date(DuePrecision::DayTime, &local, DstPolicy::default())
}

fn day(y: i32, m: u32, d: u32) -> i64 {
    let local = chrono_tz::UTC.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();
    create_due_date(DuePrecision::Day, &local, DstPolicy::default())
}

fn continued(outcome: RepeatOutcome) -> RepeatInstructions {
    match outcome {
        RepeatOutcome::Continue(instructions) => instructions,
        other => panic!("expected the series to continue, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Advance
// ---------------------------------------------------------------------------

#[test]
fn count_decrements_on_advance() {
    let due = day_time(2026, 3, 2, 9, 0);
    let next = continued(coordinator().advance("FREQ=DAILY;COUNT=3", &TaskOccurrenceInput::new(due, due)));

    assert_eq!(next.due_date, day_time(2026, 3, 3, 9, 0));
    assert_eq!(next.previous_due_date, due);
    assert_eq!(next.recurrence, "FREQ=DAILY;COUNT=2");
    assert_eq!(next.alarm_delta, ONE_DAY);
    assert_eq!(next.repeat_from, RepeatFrom::DueDate);
}

#[test]
fn advance_clears_completion_and_reminders() {
    let due = day_time(2026, 3, 2, 9, 0);
    let task = TaskOccurrenceInput::new(due, due).with_completion_date(due + 1_000);
    let next = continued(coordinator().advance("FREQ=DAILY", &task));

    assert_eq!(next.completion_date, 0);
    assert_eq!(next.reminder_last, 0);
    assert_eq!(next.reminder_snooze, 0);
}

#[test]
fn last_occurrence_finishes_without_changes() {
    let due = day(2026, 3, 2);
    let outcome = coordinator().advance("FREQ=DAILY;COUNT=1", &TaskOccurrenceInput::new(due, due));

    assert_eq!(
        outcome,
        RepeatOutcome::Finished {
            reason: FinishReason::CountExhausted
        }
    );
    assert!(outcome.is_finished());
    assert!(outcome.instructions().is_none());
}

#[test]
fn last_occurrence_is_decided_before_computing() {
    // BYMONTH=13 would be rejected by the iterator, but it is never consulted.
    let due = day(2026, 3, 2);
    let outcome = coordinator().advance(
        "FREQ=YEARLY;BYMONTH=13;COUNT=1",
        &TaskOccurrenceInput::new(due, due),
    );
    assert!(outcome.is_finished());
}

#[test]
fn occurrence_on_until_day_continues() {
    let due = day(2026, 3, 2);
    let next = continued(coordinator().advance(
        "FREQ=WEEKLY;UNTIL=20260310",
        &TaskOccurrenceInput::new(due, due),
    ));
    assert_eq!(next.due_date, day(2026, 3, 9));
    assert_eq!(next.recurrence, "FREQ=WEEKLY;UNTIL=20260310");
}

#[test]
fn occurrence_past_until_finishes() {
    let due = day(2026, 3, 9);
    let outcome = coordinator().advance(
        "FREQ=WEEKLY;UNTIL=20260310",
        &TaskOccurrenceInput::new(due, due),
    );
    assert_eq!(
        outcome,
        RepeatOutcome::Finished {
            reason: FinishReason::PastUntil
        }
    );
}

#[test]
fn hide_until_keeps_its_lead() {
    let due = day(2026, 3, 5);
    let hide = day(2026, 3, 3);
    let task = TaskOccurrenceInput::new(due, due).with_hide_until(hide);
    let next = continued(coordinator().advance("FREQ=WEEKLY", &task));

    assert_eq!(next.due_date, due + ONE_WEEK);
    assert_eq!(next.hide_until, hide + ONE_WEEK);
    assert_eq!(next.due_date - next.hide_until, 2 * ONE_DAY);
}

#[test]
fn malformed_rule_aborts() {
    let due = day(2026, 3, 2);
    let outcome = coordinator().advance("FREQ=FORTNIGHTLY", &TaskOccurrenceInput::new(due, due));
    assert!(matches!(
        outcome,
        RepeatOutcome::Aborted {
            error: RepeatError::MalformedRule(_)
        }
    ));
}

#[test]
fn rule_the_iterator_rejects_aborts() {
    let due = day(2026, 3, 2);
    let outcome = coordinator().advance("FREQ=YEARLY;BYMONTH=13", &TaskOccurrenceInput::new(due, due));
    assert!(matches!(outcome, RepeatOutcome::Aborted { .. }));
}

#[test]
fn huge_weekly_interval_from_completion_aborts() {
    let due = day_time(2026, 3, 2, 9, 0);
    let completed = day_time(2026, 3, 5, 10, 0);
    let task = TaskOccurrenceInput::new(due, completed).with_completion_date(completed);
    let outcome = coordinator().advance(
        "FREQ=WEEKLY;INTERVAL=20000000;BYDAY=MO;FROM=COMPLETION",
        &task,
    );
    assert!(matches!(
        outcome,
        RepeatOutcome::Aborted {
            error: RepeatError::InconsistentRule(_)
        }
    ));
}

#[test]
fn blank_rule_is_not_recurring() {
    let due = day(2026, 3, 2);
    assert_eq!(
        coordinator().advance("", &TaskOccurrenceInput::new(due, due)),
        RepeatOutcome::NotRecurring
    );
}

#[test]
fn from_completion_marker_survives_advance() {
    // Due Monday 09:00, ticked off Thursday: next listed day is the Monday after.
    let due = day_time(2026, 3, 2, 9, 0);
    let completed = day_time(2026, 3, 5, 10, 0);
    let task = TaskOccurrenceInput::new(due, completed).with_completion_date(completed);
    let next = continued(
        coordinator().advance("FREQ=WEEKLY;COUNT=3;BYDAY=MO,WE;FROM=COMPLETION", &task),
    );

    assert_eq!(next.due_date, day_time(2026, 3, 9, 9, 0));
    assert_eq!(next.repeat_from, RepeatFrom::CompletionDate);
    assert_eq!(
        next.recurrence,
        "FREQ=WEEKLY;COUNT=2;BYDAY=MO,WE;FROM=COMPLETION"
    );
}

#[test]
fn snapshot_repeat_from_is_rendered_as_marker() {
    let due = day(2026, 3, 2);
    let completed = day(2026, 3, 4);
    let task = TaskOccurrenceInput::new(due, completed)
        .with_completion_date(completed)
        .with_repeat_from(RepeatFrom::CompletionDate);
    let next = continued(coordinator().advance("FREQ=DAILY", &task));

    assert_eq!(next.due_date, day(2026, 3, 5));
    assert_eq!(next.recurrence, "FREQ=DAILY;FROM=COMPLETION");
}

#[test]
fn missing_due_date_back_computes_previous() {
    let now = chrono_tz::UTC
        .with_ymd_and_hms(2026, 3, 2, 10, 15, 0)
        .unwrap()
        .timestamp_millis();
    let next = continued(coordinator().advance("FREQ=DAILY", &TaskOccurrenceInput::new(0, now)));

    assert_eq!(next.due_date, day(2026, 3, 3));
    assert_eq!(next.previous_due_date, day(2026, 3, 2));
    assert_eq!(next.alarm_delta, ONE_DAY);
}

#[test]
fn missing_due_date_from_completion_back_computes_previous() {
    let completed = chrono_tz::UTC
        .with_ymd_and_hms(2026, 3, 2, 10, 15, 0)
        .unwrap()
        .timestamp_millis();
    let task = TaskOccurrenceInput::new(0, completed).with_completion_date(completed);
    let next = continued(coordinator().advance("FREQ=DAILY;FROM=COMPLETION", &task));

    assert_eq!(next.due_date, day(2026, 3, 3));
    assert_eq!(next.previous_due_date, day(2026, 3, 2));
    assert_eq!(next.alarm_delta, ONE_DAY);
}

#[test]
fn stored_rule_is_normalized() {
    let due = day(2026, 3, 2);
    let next = continued(coordinator().advance(
        "rrule:freq=daily;interval=1;byday=MO",
        &TaskOccurrenceInput::new(due, due),
    ));
    assert_eq!(next.recurrence, "FREQ=DAILY");
}

#[test]
fn free_function_matches_coordinator() {
    let due = day_time(2026, 3, 2, 9, 0);
    let task = TaskOccurrenceInput::new(due, due);
    assert_eq!(
        advance("FREQ=MONTHLY", &task, &RepeatConfig::default()),
        coordinator().advance("FREQ=MONTHLY", &task)
    );
}

#[test]
fn coordinator_next_due_date_reads_marker() {
    let due = day(2026, 3, 2);
    let completed = day(2026, 3, 10);
    let task = TaskOccurrenceInput::new(due, completed).with_completion_date(completed);
    assert_eq!(
        coordinator()
            .next_due_date("FREQ=DAILY;FROM=COMPLETION", &task)
            .unwrap(),
        day(2026, 3, 11)
    );
    assert_eq!(
        coordinator().next_due_date("FREQ=DAILY", &task).unwrap(),
        day(2026, 3, 3)
    );
}

#[test]
fn coordinator_rejects_bad_config() {
    let config = RepeatConfig {
        search_limit: 0,
        ..RepeatConfig::default()
    };
    assert!(matches!(
        RepeatCoordinator::new(config),
        Err(RepeatError::InvalidConfig(_))
    ));
}

// ---------------------------------------------------------------------------
// Alarms
// ---------------------------------------------------------------------------

#[test]
fn advance_moves_absolute_alarms() {
    let due = day_time(2026, 3, 2, 9, 0);
    let next = continued(coordinator().advance("FREQ=WEEKLY", &TaskOccurrenceInput::new(due, due)));

    let alarms = vec![
        Alarm::new(7, due - 30 * 60_000, AlarmKind::DateTime),
        Alarm::new(7, -15 * 60_000, AlarmKind::RelativeToEnd),
        Alarm::new(8, due, AlarmKind::DateTime),
    ];
    let shifted = next.alarm_shift(7).apply(&alarms);

    assert_eq!(shifted[0].time, due - 30 * 60_000 + ONE_WEEK);
    assert_eq!(shifted[1], alarms[1]);
    assert_eq!(shifted[2], alarms[2]);
}

// ---------------------------------------------------------------------------
// Undo
// ---------------------------------------------------------------------------

#[test]
fn undo_with_known_previous_due_date() {
    let previous = day_time(2026, 3, 2, 9, 0);
    let current = day_time(2026, 3, 3, 9, 0);
    let restored = continued(coordinator().undo(
        "FREQ=DAILY;COUNT=2",
        &TaskOccurrenceInput::new(current, current),
        Some(previous),
    ));

    assert_eq!(restored.due_date, previous);
    assert_eq!(restored.previous_due_date, current);
    assert_eq!(restored.recurrence, "FREQ=DAILY;COUNT=3");
    assert_eq!(restored.alarm_delta, -ONE_DAY);
    assert_eq!(restored.completion_date, 0);
}

#[test]
fn undo_recovers_previous_due_date() {
    let current = day(2026, 3, 9);
    let restored = continued(coordinator().undo(
        "FREQ=WEEKLY",
        &TaskOccurrenceInput::new(current, current),
        None,
    ));
    assert_eq!(restored.due_date, day(2026, 3, 2));
    assert_eq!(restored.recurrence, "FREQ=WEEKLY");
}

#[test]
fn undo_from_completion_steps_back_from_due_date() {
    let due = day_time(2026, 3, 2, 9, 0);
    let completed = day_time(2026, 3, 2, 10, 0);
    let task = TaskOccurrenceInput::new(due, completed).with_completion_date(completed);
    let forward = continued(coordinator().advance("FREQ=DAILY;COUNT=5;FROM=COMPLETION", &task));
    assert_eq!(forward.due_date, day_time(2026, 3, 3, 9, 0));

    // Undone a minute after completing, without the old due date at hand.
    let advanced = TaskOccurrenceInput::new(forward.due_date, completed + 60_000);
    let back = continued(coordinator().undo(&forward.recurrence, &advanced, None));

    assert_eq!(back.due_date, due);
    assert_eq!(back.alarm_delta, -ONE_DAY);
    assert_eq!(back.recurrence, "FREQ=DAILY;COUNT=5;FROM=COMPLETION");
    assert_eq!(back.repeat_from, RepeatFrom::CompletionDate);
}

#[test]
fn undo_reverses_advance() {
    let due = day_time(2026, 3, 2, 9, 0);
    let hide = due - ONE_DAY;
    let task = TaskOccurrenceInput::new(due, due).with_hide_until(hide);
    let forward = continued(coordinator().advance("FREQ=DAILY;INTERVAL=2;COUNT=4", &task));

    let advanced = TaskOccurrenceInput::new(forward.due_date, forward.due_date)
        .with_hide_until(forward.hide_until);
    let back = continued(coordinator().undo(
        &forward.recurrence,
        &advanced,
        Some(forward.previous_due_date),
    ));

    assert_eq!(back.due_date, due);
    assert_eq!(back.hide_until, hide);
    assert_eq!(back.recurrence, "FREQ=DAILY;INTERVAL=2;COUNT=4");
    assert_eq!(back.alarm_delta, -forward.alarm_delta);
}

#[test]
fn undo_without_any_due_date_aborts() {
    let outcome = undo(
        "FREQ=DAILY",
        &TaskOccurrenceInput::new(0, day(2026, 3, 2)),
        None,
        &RepeatConfig::default(),
    );
    assert!(matches!(
        outcome,
        RepeatOutcome::Aborted {
            error: RepeatError::InconsistentRule(_)
        }
    ));
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn outcomes_serialize_with_tag() {
    let finished = RepeatOutcome::Finished {
        reason: FinishReason::PastUntil,
    };
    let json = serde_json::to_value(&finished).unwrap();
    assert_eq!(json["outcome"], "finished");
    assert_eq!(json["reason"], "past_until");

    let aborted = RepeatOutcome::Aborted {
        error: RepeatError::MalformedRule("missing FREQ".to_string()),
    };
    let json = serde_json::to_value(&aborted).unwrap();
    assert_eq!(json["outcome"], "aborted");
    assert_eq!(json["error"]["kind"], "malformed_rule");
    assert_eq!(json["error"]["message"], "missing FREQ");
}
