use async_trait::async_trait;
use thiserror::Error;

/// Registry-assigned handle for a live connection.
pub type ConnectionId = u64;

/// Outbound failure on a single viewer connection. Never escapes the registry
/// except as a reason to drop that one connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The transport rejected the write (peer gone, socket closed).
    #[error("send failed: {0}")]
    Send(String),

    /// The write did not complete within the registry's write timeout.
    #[error("send timed out")]
    Timeout,
}

/// # Viewer Connection
///
/// The outbound half of one viewer channel. The registry owns it from
/// registration until it is deregistered, and is the only writer.
#[async_trait]
pub trait ViewerConnection: Send {
    /// Writes one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Closes the channel. Errors are ignored; the connection is going away.
    async fn close(&mut self);
}
