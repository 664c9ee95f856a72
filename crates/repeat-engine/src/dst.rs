//! DST transition policies for wall-clock times.
//!
//! Recurring tasks are scheduled in wall-clock terms ("every day at 09:00"), so
//! every computed occurrence is turned back into an instant through
//! [`resolve_local`]. Local times that fall into a spring-forward gap or a
//! fall-back overlap are settled by the configured [`DstPolicy`].

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy for wall-clock times that do not map to exactly one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Times inside a gap move forward by the gap length (02:30 becomes 03:30);
    /// repeated times take the earlier instant.
    #[default]
    ShiftForward,
    /// Times inside a gap move back by the gap length (02:30 becomes 01:30);
    /// repeated times take the later instant.
    ShiftBackward,
}

/// Map a wall-clock time in `tz` to a single instant.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime, policy: DstPolicy) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earlier, later) => match policy {
            DstPolicy::ShiftForward => earlier,
            DstPolicy::ShiftBackward => later,
        },
        LocalResult::None => {
            // Read the time with the offset in force on one side of the gap.
            let probe = match policy {
                DstPolicy::ShiftForward => local - Duration::days(1),
                DstPolicy::ShiftBackward => local + Duration::days(1),
            };
            let offset = tz.offset_from_utc_datetime(&probe).fix();
            let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
            tz.from_utc_datetime(&utc)
        }
    }
}

/// Force the wall-clock time of `dt` to `time`, keeping its calendar day.
///
/// Pure day arithmetic across a DST boundary can leave an occurrence an hour
/// off the intended clock time; this puts it back.
pub fn with_wall_clock(dt: &DateTime<Tz>, time: NaiveTime, policy: DstPolicy) -> DateTime<Tz> {
    resolve_local(&dt.timezone(), dt.date_naive().and_time(time), policy)
}
