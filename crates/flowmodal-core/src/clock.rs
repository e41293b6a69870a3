//! Wall-clock sources.
//!
//! Everything time-based in a flow (countdowns, hint dismissal, storage
//! expiry, `started-at` stamps) reads epoch milliseconds from a [`Clock`].
//! Tests drive time explicitly through [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

/// Source of epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn now(&self) -> DateTime<Utc> {
        to_datetime(self.now_ms())
    }
}

/// Clock shared between a flow and its storage.
pub type SharedClock = Rc<dyn Clock>;

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(start_ms),
        })
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Convert epoch milliseconds to a UTC timestamp, clamping out-of-range values.
pub fn to_datetime(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
