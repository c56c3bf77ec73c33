//! # Loggers Module
//!
//! Process-wide `tracing` setup shared by the server binaries.

/// Console + daily rolling JSON file subscriber.
pub mod subscriber;

pub use subscriber::{init_tracing, LogSettings};
