//! Moving a task's absolute alarms along with its due date.
//!
//! Only absolute date-time alarms are stored as instants. Relative alarms are
//! derived from the task's dates when they are evaluated, and snoozes belong
//! to the occurrence being dismissed, so neither is shifted here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    DateTime,
    RelativeToStart,
    RelativeToEnd,
    Random,
    Snooze,
    GeofenceEnter,
    GeofenceExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub task: i64,
    /// Trigger instant for `DateTime` alarms, an offset for relative ones.
    pub time: i64,
    pub kind: AlarmKind,
}

impl Alarm {
    pub fn new(task: i64, time: i64, kind: AlarmKind) -> Self {
        Self {
            id: 0,
            task,
            time,
            kind,
        }
    }

    pub fn is_shiftable(&self) -> bool {
        self.kind == AlarmKind::DateTime
    }
}

/// A due-date move for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmShift {
    pub task: i64,
    pub old_due_date: i64,
    pub new_due_date: i64,
}

impl AlarmShift {
    pub fn new(task: i64, old_due_date: i64, new_due_date: i64) -> Self {
        Self {
            task,
            old_due_date,
            new_due_date,
        }
    }

    /// The signed move in milliseconds, or `None` when either due date is
    /// unset and there is nothing meaningful to shift by.
    pub fn delta(&self) -> Option<i64> {
        alarm_delta(self.old_due_date, self.new_due_date)
    }

    /// Every alarm, with this task's absolute alarms moved by [`delta`](Self::delta).
    pub fn apply(&self, alarms: &[Alarm]) -> Vec<Alarm> {
        let delta = self.delta();
        alarms
            .iter()
            .map(|alarm| match delta {
                Some(d) if self.moves(alarm) => Alarm {
                    time: alarm.time + d,
                    ..*alarm
                },
                _ => *alarm,
            })
            .collect()
    }

    /// Only the alarms whose trigger time moved, already updated.
    pub fn changed(&self, alarms: &[Alarm]) -> Vec<Alarm> {
        match self.delta() {
            Some(d) if d != 0 => alarms
                .iter()
                .filter(|alarm| self.moves(alarm))
                .map(|alarm| Alarm {
                    time: alarm.time + d,
                    ..*alarm
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn moves(&self, alarm: &Alarm) -> bool {
        alarm.task == self.task && alarm.is_shiftable()
    }
}

/// `new - old`, or `None` unless both due dates are set.
pub fn alarm_delta(old_due_date: i64, new_due_date: i64) -> Option<i64> {
    (old_due_date > 0 && new_due_date > 0).then(|| new_due_date - old_due_date)
}

/// Shift the absolute alarms of `task` by the move from `old_due_date` to
/// `new_due_date`. Returns the complete, updated alarm list.
pub fn shift_alarms(task: i64, old_due_date: i64, new_due_date: i64, alarms: &[Alarm]) -> Vec<Alarm> {
    AlarmShift::new(task, old_due_date, new_due_date).apply(alarms)
}

/// Like [`shift_alarms`], but returns only the alarms that moved.
pub fn changed_alarms(task: i64, old_due_date: i64, new_due_date: i64, alarms: &[Alarm]) -> Vec<Alarm> {
    AlarmShift::new(task, old_due_date, new_due_date).changed(alarms)
}
