use async_trait::async_trait;
use thiserror::Error;

use super::Ticket;
use crate::vault::Credentials;

/// Upstream fetch failures. The engine treats every variant the same way:
/// the cycle produces no update and the next tick retries.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be interpreted.
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// # Ticket Source
///
/// Anything that can return the current open tickets for a set of
/// credentials. Implemented by the Autotask HTTP client and by test doubles.
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch_open_tickets(&self, credentials: &Credentials) -> Result<Vec<Ticket>, FetchError>;
}
