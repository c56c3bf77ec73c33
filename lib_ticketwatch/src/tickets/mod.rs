//! # Tickets Module
//!
//! The ticket value type, the fingerprinted cache holding the latest poll
//! result, and the [`TicketSource`] seam the engine pulls from.
//!
//! ## Contained Modules:
//! - **`model`**: [`Ticket`], serialized exactly as viewers receive it.
//! - **`cache`**: [`TicketCache`], the snapshot plus its change fingerprint.
//! - **`source`**: the upstream fetch trait and its error type.

/// Ticket value type.
pub mod model;
/// Snapshot cache with title fingerprinting.
pub mod cache;
/// Upstream ticket source abstraction.
pub mod source;

pub use cache::TicketCache;
pub use model::Ticket;
pub use source::{FetchError, TicketSource};
