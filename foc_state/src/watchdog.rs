//! Parameter staleness watchdog.
//!
//! Tracks the time since the control loop last consumed a Parameters
//! snapshot. A trip latches until [`ParameterWatchdog::rearm`].

use std::time::{Duration, Instant};

/// Watchdog verdict for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Timeout is zero; nothing is monitored.
    Disabled,
    /// Parameters are fresh.
    Ok,
    /// Parameters just went stale.
    Tripped,
    /// Previously tripped and not re-armed.
    Latched,
}

impl WatchdogEvent {
    /// Whether the watchdog demands the gates off.
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Tripped | Self::Latched)
    }
}

/// Staleness monitor owned by the control loop.
#[derive(Debug, Clone)]
pub struct ParameterWatchdog {
    last_update: Instant,
    tripped: bool,
}

impl ParameterWatchdog {
    /// Watchdog whose last update is `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            last_update: now,
            tripped: false,
        }
    }

    /// Record a consumed Parameters update.
    #[inline]
    pub fn feed(&mut self, now: Instant) {
        self.last_update = now;
    }

    /// Evaluate staleness against `timeout_ms`; 0 disables the check.
    ///
    /// A disabled watchdog never trips but keeps an earlier trip latched.
    #[inline]
    pub fn check(&mut self, now: Instant, timeout_ms: u16) -> WatchdogEvent {
        if self.tripped {
            return WatchdogEvent::Latched;
        }
        if timeout_ms == 0 {
            return WatchdogEvent::Disabled;
        }
        let age = now.saturating_duration_since(self.last_update);
        if age > Duration::from_millis(u64::from(timeout_ms)) {
            self.tripped = true;
            WatchdogEvent::Tripped
        } else {
            WatchdogEvent::Ok
        }
    }

    /// Clear a latched trip and restart the staleness window at `now`.
    pub fn rearm(&mut self, now: Instant) {
        self.tripped = false;
        self.last_update = now;
    }

    /// Whether a trip is latched.
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}
