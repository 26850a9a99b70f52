//! Daily rollover condition

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::clock::Clock;

/// Due once the last rollover happened before the start of the current UTC day
///
/// Starts out armed: the creation instant counts as the last rollover.
#[derive(Debug)]
pub struct TimeBasedCondition {
    clock: Arc<dyn Clock>,
    last_rollover: DateTime<Utc>,
}

impl TimeBasedCondition {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let last_rollover = clock.now();
        Self {
            clock,
            last_rollover,
        }
    }

    pub fn should_rollover(&self) -> bool {
        self.last_rollover < start_of_day(self.clock.now())
    }

    pub fn signal_rollover(&mut self) {
        self.last_rollover = self.clock.now();
    }

    pub fn last_rollover(&self) -> DateTime<Utc> {
        self.last_rollover
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
#[path = "time_test.rs"]
mod time_test;
