//! # Ticket Watch Library
//!
//! Everything the dashboard server needs behind its HTTP surface: the
//! password-protected credential vault, the fingerprinted ticket cache, the
//! live viewer registry and the synchronization engine that ties them together.
//!
//! Modules are gated by folder-level features (see `Cargo.toml`); the default
//! `full` feature enables all of them.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

#[cfg(feature = "vault")]
pub mod vault;

#[cfg(feature = "tickets")]
pub mod tickets;

#[cfg(feature = "fanout")]
pub mod fanout;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "loggers")]
pub mod loggers;

#[cfg(all(feature = "fanout", any(test, feature = "test-util")))]
pub mod testing;

// Re-export the types the server wires together.
#[cfg(feature = "vault")]
pub use vault::{CredentialVault, Credentials, KdfParams, VaultError};

#[cfg(feature = "tickets")]
pub use tickets::{FetchError, Ticket, TicketCache, TicketSource};

#[cfg(feature = "fanout")]
pub use fanout::{ConnectionError, ConnectionId, ConnectionRegistry, ViewerConnection};

#[cfg(feature = "sync")]
pub use sync::{ActiveHours, PollOutcome, StatusMessage, SyncEngine, SyncError, SyncPolicy};
