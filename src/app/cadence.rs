//! Update cadence gate.
//!
//! The scheduler may fire every minute, but the feed only changes every
//! quarter hour or so. A snapshot is due once the most recent checkpoint
//! (minute 02, 17, 32 or 47 of an hour) has been crossed since the last
//! stored snapshot. The gate compares against the stored timestamp only, so
//! skipped, retried or late scheduler runs still converge on four snapshots
//! per hour.

use crate::app::ports::Clock;
use crate::common::constants::CHECK_POINT_MINUTES;
use crate::common::time::HktDateTime;
use chrono::{Duration, Timelike};
use std::sync::Arc;

fn start_of_hour(t: HktDateTime) -> HktDateTime {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// The four checkpoints inside the hour containing `t`, not adjusted.
pub fn hour_check_points(t: HktDateTime) -> [HktDateTime; 4] {
    let hour = start_of_hour(t);
    CHECK_POINT_MINUTES.map(|m| hour + Duration::minutes(m as i64))
}

/// The next occurrence of each checkpoint offset strictly after `t`.
///
/// Offsets already reached in `t`'s hour are moved to the following hour, so
/// every result lies in `(t, t + 1h]`.
pub fn check_points_covering(t: HktDateTime) -> [HktDateTime; 4] {
    hour_check_points(t).map(|cp| if cp <= t { cp + Duration::hours(1) } else { cp })
}

/// The latest checkpoint at or before `now`.
///
/// Before minute 02 this is minute 47 of the previous hour.
pub fn previous_check_point(now: HktDateTime) -> HktDateTime {
    let previous_hour = hour_check_points(now - Duration::hours(1));
    hour_check_points(now)
        .into_iter()
        .chain(previous_hour)
        .filter(|cp| *cp <= now)
        .max()
        .unwrap_or(now - Duration::hours(1))
}

/// The earliest checkpoint strictly after `now`.
pub fn next_check_point(now: HktDateTime) -> HktDateTime {
    check_points_covering(now).into_iter().min().unwrap_or(now)
}

/// True when a checkpoint has been crossed since `last_update`.
///
/// A snapshot stamped exactly on the checkpoint already covers it.
pub fn should_update_at(now: HktDateTime, last_update: HktDateTime) -> bool {
    last_update < previous_check_point(now)
}

/// Answers "when is the next checkpoint" from a clock.
///
/// The due decision itself is `should_update_at`: the orchestrator stamps the
/// snapshot with the same `now` it decides on, so it never reads the clock twice.
#[derive(Clone)]
pub struct CadenceGate {
    clock: Arc<dyn Clock>,
}

impl CadenceGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn next_check_time(&self) -> HktDateTime {
        next_check_point(self.clock.now())
    }
}
