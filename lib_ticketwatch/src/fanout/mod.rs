//! # Fan-out Module
//!
//! Delivery of ticket snapshots and status heartbeats to every live viewer.
//!
//! ## Core Components:
//!
//! - **`connection`**: the [`ViewerConnection`] trait, the seam between the
//!   registry and a concrete transport (the server's WebSocket adapter, or a
//!   recording double in tests).
//! - **`message`**: the viewer-facing status payload.
//! - **`registry`**: the [`ConnectionRegistry`], which owns the live set and
//!   reaps any connection whose write fails during a broadcast.

/// Viewer connection trait and its error type.
pub mod connection;
/// Status heartbeat payload.
pub mod message;
/// Live connection set with self-healing broadcast.
pub mod registry;

pub use connection::{ConnectionError, ConnectionId, ViewerConnection};
pub use message::StatusMessage;
pub use registry::ConnectionRegistry;
