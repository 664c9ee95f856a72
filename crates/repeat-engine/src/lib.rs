//! # repeat-engine
//!
//! Deterministic next-occurrence computation for recurring tasks.
//!
//! Given a task's stored recurrence rule and a snapshot of its dates, the
//! engine works out when the next occurrence is due, whether the series has
//! ended, and how the task's start date and alarms move with it. It performs
//! no I/O: callers persist the returned values themselves.
//!
//! ## Modules
//!
//! - [`rule`] — RRULE string → immutable [`RecurrenceRule`]
//! - [`task`] — task snapshot and due-date encoding
//! - [`calculator`] — next due date, by [`Strategy`]
//! - [`termination`] — `COUNT` / `UNTIL` handling
//! - [`coordinator`] — one-occurrence advance and its undo
//! - [`alarm`] — shifting absolute alarms
//! - [`dst`] — DST transition policies
//! - [`config`] — zone and policy configuration
//! - [`error`] — Error types
//!
//! ## Example
//!
//! ```rust
//! use chrono::TimeZone;
//! use repeat_engine::{advance, RepeatConfig, RepeatOutcome, TaskOccurrenceInput};
//!
//! let config = RepeatConfig::with_timezone("Europe/Berlin");
//! let tz = config.zone().unwrap();
//! // Day-only due dates sit at local noon.
//! let due = tz.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap().timestamp_millis();
//!
//! let outcome = advance("FREQ=DAILY;INTERVAL=2;COUNT=3", &TaskOccurrenceInput::new(due, due), &config);
//! let RepeatOutcome::Continue(next) = outcome else { panic!("series should continue") };
//! assert_eq!(next.due_date - due, 2 * 24 * 60 * 60 * 1000);
//! assert_eq!(next.recurrence, "FREQ=DAILY;INTERVAL=2;COUNT=2");
//! ```

pub mod alarm;
pub mod calculator;
pub mod config;
pub mod coordinator;
pub mod dst;
pub mod error;
pub mod rule;
pub mod task;
pub mod termination;

pub use alarm::{changed_alarms, shift_alarms, Alarm, AlarmKind, AlarmShift};
pub use calculator::{next_due_date, Strategy};
pub use config::RepeatConfig;
pub use coordinator::{advance, undo, RepeatCoordinator, RepeatInstructions, RepeatOutcome};
pub use dst::DstPolicy;
pub use error::RepeatError;
pub use rule::{parse_recurrence, Frequency, RecurrenceRule, RepeatFrom, Until, WeekdayNum};
pub use task::{create_due_date, has_due_time, DuePrecision, TaskOccurrenceInput};
pub use termination::FinishReason;
