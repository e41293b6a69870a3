//! Timers for flow components.
//!
//! Timers are wall-clock deadlines, not threads. A component asks for a timer
//! through its handler output, the flow keeps it in a [`TimerQueue`], and the
//! caller is responsible for calling `Flow::tick()` periodically so that due
//! timers fire.
//!
//! ```text
//! step countdown : armed on `started`, every 200ms, disarmed on `deactivate`
//! badge hint     : armed on initial `shown`, once,  disarmed on `hidden`/`deactivate`
//! ```

mod countdown;
mod queue;

pub use countdown::Countdown;
pub use queue::TimerQueue;

/// Fixed cadence of a step countdown, independent of its timeout.
pub const TIMER_INTERVAL_MS: u64 = 200;
