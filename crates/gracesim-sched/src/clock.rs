//! Clock abstraction for real-time pacing.
//!
//! The driver's only blocking point is "wait until an action's
//! deadline". [`SystemClock`] sleeps for real; [`SimulatedClock`]
//! advances instantly and records the waits, so tests replay a plan
//! deterministically with zero wall-clock delay.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of now-time and deadline waits.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Blocks until `deadline`. A deadline in the past returns
    /// immediately; late actions are never skipped.
    fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// Wall-clock time with real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep_until(&self, deadline: DateTime<Utc>) {
        let now = Utc::now();
        if let Ok(wait) = (deadline - now).to_std() {
            std::thread::sleep(wait);
        }
    }
}

/// A manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct SimulatedClock {
    now: Mutex<DateTime<Utc>>,
    waits: Mutex<Vec<Duration>>,
}

impl SimulatedClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            waits: Mutex::new(Vec::new()),
        }
    }

    /// Advances the clock by `dt` without recording a wait.
    pub fn advance(&self, dt: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += chrono::Duration::from_std(dt).unwrap_or_else(|_| chrono::Duration::zero());
    }

    /// Returns every wait the driver performed, in order. Zero-length
    /// entries mark actions that were already late.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().expect("clock lock poisoned").clone()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }

    fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        let wait = (deadline - *now).to_std().unwrap_or(Duration::ZERO);
        if deadline > *now {
            *now = deadline;
        }
        self.waits.lock().expect("clock lock poisoned").push(wait);
    }
}
