//! # Sync Module
//!
//! The control loop tying the vault, the ticket cache and the viewer registry
//! together. Nothing is fetched until the vault holds credentials; unlocking
//! the vault is what triggers the first poll.
//!
//! - **`policy`**: [`SyncPolicy`] and the [`ActiveHours`] window.
//! - **`engine`**: [`SyncEngine`], its timer tasks and the broadcaster.

pub mod engine;
pub mod policy;
mod error;

pub use crate::fanout::StatusMessage;
pub use engine::{PollOutcome, SyncEngine};
pub use error::{PolicyError, SyncError};
pub use policy::{ActiveHours, SyncPolicy};
