use thiserror::Error;

use crate::tickets::FetchError;

/// Failures of a single poll. The engine logs these and carries on; the
/// next tick is the retry.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The vault has no credentials yet. No network call was made.
    #[error("credentials are not loaded")]
    NotAuthenticated,

    /// The ticket source failed. The cache was left untouched.
    #[error("ticket fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Rejected engine configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid active hours {start}..{end}: need 0 <= start <= 22, 1 <= end <= 23 and end > start")]
    ActiveHours { start: u32, end: u32 },

    #[error("poll interval must be between 1 and 7200 seconds, got {0}")]
    PollInterval(u64),

    #[error("status interval must be at least one second")]
    StatusInterval,
}
