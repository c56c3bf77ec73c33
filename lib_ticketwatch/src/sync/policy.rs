use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike};

use super::PolicyError;

/// Bounds on the poll interval, in seconds.
pub const MIN_POLL_SECS: u64 = 1;
pub const MAX_POLL_SECS: u64 = 7200;

/// # Active Hours
///
/// Half-open hour-of-day window `[start, end)` in server local time. Polls
/// outside the window are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveHours {
    start: u32,
    end: u32,
}

impl Default for ActiveHours {
    fn default() -> Self {
        Self { start: 6, end: 18 }
    }
}

impl ActiveHours {
    /// Validates `0 <= start <= 22`, `1 <= end <= 23` and `end > start`.
    pub fn new(start: u32, end: u32) -> Result<Self, PolicyError> {
        if start > 22 || !(1..=23).contains(&end) || end <= start {
            return Err(PolicyError::ActiveHours { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour < self.end
    }

    /// Whether the wall-clock hour of `now` falls inside the window.
    pub fn is_active_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.contains(now.hour())
    }
}

/// # Sync Policy
///
/// Timing knobs for the [`super::SyncEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    pub poll_interval: Duration,
    pub status_interval: Duration,
    pub active_hours: ActiveHours,
    /// Log skipped cycles and per-poll details at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            status_interval: Duration::from_secs(60),
            active_hours: ActiveHours::default(),
            verbose: false,
        }
    }
}

impl SyncPolicy {
    pub fn new(
        poll_interval: Duration,
        status_interval: Duration,
        active_hours: ActiveHours,
    ) -> Result<Self, PolicyError> {
        let secs = poll_interval.as_secs();
        if !(MIN_POLL_SECS..=MAX_POLL_SECS).contains(&secs) {
            return Err(PolicyError::PollInterval(secs));
        }
        if status_interval.as_secs() == 0 {
            return Err(PolicyError::StatusInterval);
        }
        Ok(Self {
            poll_interval,
            status_interval,
            active_hours,
            verbose: false,
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
