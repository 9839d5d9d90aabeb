//! Escalating unlock lockout
//!
//! Consecutive failures trip cool-downs: 3 failures → 60 s, 10 → 300 s,
//! 20 → 3600 s. While a cool-down is active, unlock attempts are
//! rejected before any key derivation happens.

use std::time::{Duration, Instant};

/// (failure count, cool-down seconds), checked highest first.
const THRESHOLDS: [(u32, u64); 3] = [(20, 3600), (10, 300), (3, 60)];

#[derive(Debug, Default)]
pub struct LockoutState {
    consecutive_failures: u32,
    locked_until: Option<Instant>,
}

impl LockoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether an attempt is currently allowed. Returns the remaining
    /// cool-down in whole seconds (rounded up) when locked out.
    pub fn check(&self, now: Instant) -> Result<(), u64> {
        match self.locked_until {
            Some(until) if now < until => {
                let remaining = until.duration_since(now);
                Err(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
            }
            _ => Ok(()),
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures += 1;

        let cooldown = THRESHOLDS
            .iter()
            .find(|(count, _)| self.consecutive_failures >= *count)
            .map(|(_, secs)| *secs);

        if let Some(secs) = cooldown {
            self.locked_until = Some(now + Duration::from_secs(secs));
            tracing::warn!(
                failures = self.consecutive_failures,
                cooldown_secs = secs,
                "unlock lockout engaged"
            );
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.locked_until = None;
    }
}
