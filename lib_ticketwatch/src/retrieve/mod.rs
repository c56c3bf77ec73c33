//! # Data Retrieval Module
//!
//! Upstream HTTP clients implementing [`crate::tickets::TicketSource`].
//!
//! - **`autotask`**: [`AutotaskClient`], a `reqwest` client for the Autotask
//!   REST ticket query, plus the JSON-to-[`crate::tickets::Ticket`] mapping.
//!
//! There is no retry layer here. A failed fetch is simply retried on the next
//! poll tick.

/// Autotask REST API client.
pub mod autotask;

pub use autotask::{AutotaskClient, DEFAULT_BASE_URL};
