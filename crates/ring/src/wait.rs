//! Consumer waiting strategies
//!
//! A strategy decides how the consumer idles while no record is available:
//! burn CPU for the lowest latency, yield, sleep, or park on a condition
//! variable. Strategies never affect ordering or delivery.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::error::Alerted;

/// Default sleep of [`SleepingWait`] once spinning and yielding gave up
pub const DEFAULT_SLEEP_QUANTUM: Duration = Duration::from_micros(100);

const SPIN_TRIES: u32 = 100;
const SLEEPING_RETRIES: u32 = 200;

/// How the consumer waits for a sequence to become available
pub trait WaitStrategy: Send + Sync + fmt::Debug {
    /// Wait until `available()` reaches `sequence` and return it
    ///
    /// Returns `Alerted` as soon as `alerted` is set, even if records are
    /// available.
    fn wait_for(
        &self,
        sequence: i64,
        available: &dyn Fn() -> i64,
        alerted: &AtomicBool,
    ) -> Result<i64, Alerted>;

    /// Wake a consumer parked inside `wait_for`
    ///
    /// Called by producers after every publish and by `halt`.
    fn signal_all_when_blocking(&self) {}
}

#[inline]
fn check_alert(alerted: &AtomicBool) -> Result<(), Alerted> {
    if alerted.load(Ordering::Acquire) {
        Err(Alerted)
    } else {
        Ok(())
    }
}

/// Spin with a CPU relax hint; lowest latency, one core fully busy
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWait;

impl WaitStrategy for BusySpinWait {
    fn wait_for(
        &self,
        sequence: i64,
        available: &dyn Fn() -> i64,
        alerted: &AtomicBool,
    ) -> Result<i64, Alerted> {
        loop {
            check_alert(alerted)?;
            let highest = available();
            if highest >= sequence {
                return Ok(highest);
            }
            std::hint::spin_loop();
        }
    }
}

/// Spin for a while, then yield the thread between checks
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldingWait;

impl WaitStrategy for YieldingWait {
    fn wait_for(
        &self,
        sequence: i64,
        available: &dyn Fn() -> i64,
        alerted: &AtomicBool,
    ) -> Result<i64, Alerted> {
        let mut counter = SPIN_TRIES;
        loop {
            check_alert(alerted)?;
            let highest = available();
            if highest >= sequence {
                return Ok(highest);
            }
            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                std::hint::spin_loop();
            }
        }
    }
}

/// Spin, then yield, then sleep a fixed quantum between checks
///
/// Good compromise between latency and CPU use; the default.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWait {
    quantum: Duration,
}

impl SleepingWait {
    pub fn new(quantum: Duration) -> Self {
        Self { quantum }
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }
}

impl Default for SleepingWait {
    fn default() -> Self {
        Self::new(DEFAULT_SLEEP_QUANTUM)
    }
}

impl WaitStrategy for SleepingWait {
    fn wait_for(
        &self,
        sequence: i64,
        available: &dyn Fn() -> i64,
        alerted: &AtomicBool,
    ) -> Result<i64, Alerted> {
        let mut counter = SLEEPING_RETRIES;
        loop {
            check_alert(alerted)?;
            let highest = available();
            if highest >= sequence {
                return Ok(highest);
            }
            if counter > SPIN_TRIES {
                counter -= 1;
                std::hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.quantum);
            }
        }
    }
}

/// Park on a condition variable; producers signal after each publish
///
/// Lowest CPU use, highest latency, and the only strategy that puts a lock
/// on the publish path.
#[derive(Debug, Default)]
pub struct BlockingWait {
    lock: Mutex<()>,
    cond: Condvar,
}

impl BlockingWait {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWait {
    fn wait_for(
        &self,
        sequence: i64,
        available: &dyn Fn() -> i64,
        alerted: &AtomicBool,
    ) -> Result<i64, Alerted> {
        let mut guard = self.lock.lock();
        loop {
            check_alert(alerted)?;
            let highest = available();
            if highest >= sequence {
                return Ok(highest);
            }
            self.cond.wait(&mut guard);
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}

/// Configurable choice of waiting strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategyKind {
    BusySpin,
    Yielding,
    #[default]
    Sleeping,
    Blocking,
}

impl WaitStrategyKind {
    /// Build the strategy; `sleep_quantum` only applies to `Sleeping`
    pub fn build(self, sleep_quantum: Duration) -> Box<dyn WaitStrategy> {
        match self {
            WaitStrategyKind::BusySpin => Box::new(BusySpinWait),
            WaitStrategyKind::Yielding => Box::new(YieldingWait),
            WaitStrategyKind::Sleeping => Box::new(SleepingWait::new(sleep_quantum)),
            WaitStrategyKind::Blocking => Box::new(BlockingWait::new()),
        }
    }
}

impl fmt::Display for WaitStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitStrategyKind::BusySpin => "busy_spin",
            WaitStrategyKind::Yielding => "yielding",
            WaitStrategyKind::Sleeping => "sleeping",
            WaitStrategyKind::Blocking => "blocking",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[path = "wait_test.rs"]
mod wait_test;
