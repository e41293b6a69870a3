use serde::{Deserialize, Serialize};

/// Remaining-time arithmetic for a step timeout.
///
/// Operates on epoch milliseconds; `remaining_ms` never underflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub started_at: u64,
    pub timeout_ms: u64,
}

impl Countdown {
    pub fn new(started_at: u64, timeout_ms: u64) -> Self {
        Self {
            started_at,
            timeout_ms,
        }
    }

    pub fn ending_at(&self) -> u64 {
        self.started_at.saturating_add(self.timeout_ms)
    }

    pub fn remaining_ms(&self, now: u64) -> u64 {
        let ending_at = self.ending_at();
        ending_at - now.min(ending_at)
    }
}
