//! # Ticket Cache
//!
//! Holds the most recent ticket list and the fingerprint used to decide when
//! viewers need a new snapshot. The list and fingerprint share one lock and
//! are always read and written as a pair.
//!
//! The fingerprint is the hex SHA-256 of the concatenated titles of the
//! unassigned tickets, in list order. Changes to assigned tickets, or to any
//! field other than the title, do not move it. That keeps re-broadcasts down
//! to what the dashboard actually shows.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::Ticket;

#[derive(Default)]
struct CacheState {
    tickets: Vec<Ticket>,
    fingerprint: String,
}

/// # Ticket Cache
///
/// Thread-safe snapshot store shared between the poll loop (writer) and the
/// connection registry (reader).
#[derive(Default)]
pub struct TicketCache {
    state: RwLock<CacheState>,
}

impl TicketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole snapshot. The fingerprint is left alone until the
    /// next [`TicketCache::refresh_fingerprint`].
    pub fn replace(&self, tickets: Vec<Ticket>) {
        self.state.write().tickets = tickets;
    }

    /// Copies the unassigned tickets, preserving order.
    pub fn unassigned_snapshot(&self) -> Vec<Ticket> {
        let state = self.state.read();
        unassigned(&state.tickets).cloned().collect()
    }

    /// # Refresh Fingerprint
    ///
    /// Recomputes the fingerprint over the current unassigned tickets and
    /// stores it if it differs. Returns `true` only when it changed.
    ///
    /// Compute, compare and update happen under one write lock, so a
    /// concurrent `replace` cannot slip between them.
    pub fn refresh_fingerprint(&self) -> bool {
        let mut state = self.state.write();
        let fresh = fingerprint(&state.tickets);
        if fresh == state.fingerprint {
            return false;
        }
        state.fingerprint = fresh;
        true
    }

    /// The last stored fingerprint (empty before the first refresh).
    pub fn fingerprint(&self) -> String {
        self.state.read().fingerprint.clone()
    }

    /// Number of tickets in the snapshot, assigned or not.
    pub fn len(&self) -> usize {
        self.state.read().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unassigned(tickets: &[Ticket]) -> impl Iterator<Item = &Ticket> {
    tickets.iter().filter(|t| t.is_unassigned())
}

fn fingerprint(tickets: &[Ticket]) -> String {
    let mut hasher = Sha256::new();
    for ticket in unassigned(tickets) {
        hasher.update(ticket.title.as_bytes());
    }
    hex::encode(hasher.finalize())
}
