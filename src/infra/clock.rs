use crate::app::ports::Clock;
use crate::common::time::{to_hkt, truncate_to_second, HktDateTime};
use chrono::Duration;
use std::sync::Mutex;

/// Wall clock, reported in HKT at whole seconds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> HktDateTime {
        to_hkt(chrono::Utc::now())
    }
}

/// A clock that only moves when told to. Used for tests and replays.
pub struct FixedClock {
    now: Mutex<HktDateTime>,
}

impl FixedClock {
    pub fn new(now: HktDateTime) -> Self {
        Self { now: Mutex::new(truncate_to_second(now)) }
    }

    pub fn set(&self, now: HktDateTime) {
        *self.now.lock().unwrap() = truncate_to_second(now);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> HktDateTime {
        *self.now.lock().unwrap()
    }
}
