//! # Connection Registry
//!
//! The set of live viewer connections and the only place that writes to them.
//!
//! ## Design:
//!
//! 1.  **One exclusive section per broadcast**: the connection map sits behind
//!     an async mutex. A broadcast holds it while it writes to every member, so
//!     membership cannot change underneath the iteration.
//! 2.  **Self-healing membership**: a connection whose write fails (or exceeds
//!     the write timeout) is closed and removed in the same pass, after the
//!     iteration finishes but before the lock is released. A broadcast never
//!     fails as a whole because one viewer is gone.
//! 3.  **Lock order**: when a broadcast needs the ticket snapshot it takes it
//!     *after* acquiring the registry lock. Registry then cache, always.
//! 4.  **Bounded writes**: every write runs under a timeout, so a stalled peer
//!     delays a broadcast by at most that long.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ConnectionError, ConnectionId, StatusMessage, ViewerConnection};
use crate::tickets::Ticket;

/// Default upper bound on a single viewer write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

type ConnectionMap = HashMap<ConnectionId, Box<dyn ViewerConnection>>;

/// # Connection Registry
///
/// Shared as `Arc<ConnectionRegistry>` between the WebSocket handlers, the
/// broadcaster task and the heartbeat loop.
pub struct ConnectionRegistry {
    connections: Mutex<ConnectionMap>,
    next_id: AtomicU64,
    write_timeout: Duration,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TIMEOUT)
    }
}

impl ConnectionRegistry {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            write_timeout,
        }
    }

    /// Adds a connection to the live set and returns its handle.
    pub async fn register(&self, connection: Box<dyn ViewerConnection>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().await.insert(id, connection);
        debug!(connection = id, "Viewer registered");
        id
    }

    /// Removes and closes a connection. Removing an unknown id is a no-op;
    /// returns whether anything was removed.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.remove(&id) {
            Some(mut connection) => {
                self.close(connection.as_mut()).await;
                info!(connection = id, remaining = connections.len(), "Viewer deregistered");
                true
            }
            None => false,
        }
    }

    /// # Register With Initial Sync
    ///
    /// Registers `connection` and immediately sends it one ticket snapshot and
    /// one status message, all inside the same exclusive section. If either
    /// send fails the connection is closed, removed, and `None` is returned;
    /// the caller must then not start its read loop.
    pub async fn register_with_initial_sync<F>(
        &self,
        connection: Box<dyn ViewerConnection>,
        snapshot: F,
        status: &StatusMessage,
    ) -> Option<ConnectionId>
    where
        F: FnOnce() -> Vec<Ticket>,
    {
        let mut connections = self.connections.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        connections.insert(id, connection);

        let tickets = encode(&snapshot(), "ticket snapshot");
        let status = encode(status, "status");

        let synced = match (tickets, status, connections.get_mut(&id)) {
            (Some(tickets), Some(status), Some(connection)) => {
                let first = self.write(connection.as_mut(), tickets).await;
                match first {
                    Ok(()) => self.write(connection.as_mut(), status).await,
                    Err(e) => Err(e),
                }
            }
            _ => Err(ConnectionError::Send("initial payload unavailable".to_string())),
        };

        match synced {
            Ok(()) => {
                info!(connection = id, live = connections.len(), "Viewer connected");
                Some(id)
            }
            Err(e) => {
                warn!(connection = id, error = %e, "Initial sync failed, dropping viewer");
                if let Some(mut connection) = connections.remove(&id) {
                    self.close(connection.as_mut()).await;
                }
                None
            }
        }
    }

    /// # Broadcast Tickets
    ///
    /// Sends the snapshot produced by `snapshot` to every live connection.
    /// The snapshot is taken once, after the registry lock is held.
    /// Returns the number of connections that received it.
    pub async fn broadcast_tickets<F>(&self, snapshot: F) -> usize
    where
        F: FnOnce() -> Vec<Ticket>,
    {
        let mut connections = self.connections.lock().await;
        match encode(&snapshot(), "ticket snapshot") {
            Some(payload) => self.fan_out(&mut connections, payload).await,
            None => 0,
        }
    }

    /// Sends a status heartbeat to every live connection, with the same
    /// reaping behaviour as [`ConnectionRegistry::broadcast_tickets`].
    pub async fn broadcast_status(&self, status: &StatusMessage) -> usize {
        let mut connections = self.connections.lock().await;
        match encode(status, "status") {
            Some(payload) => self.fan_out(&mut connections, payload).await,
            None => 0,
        }
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn fan_out(&self, connections: &mut ConnectionMap, payload: String) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, connection) in connections.iter_mut() {
            match self.write(connection.as_mut(), payload.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection = *id, error = %e, "Viewer write failed, removing");
                    dead.push(*id);
                }
            }
        }

        // Deferred removal, still inside the caller's exclusive section.
        for id in dead {
            if let Some(mut connection) = connections.remove(&id) {
                self.close(connection.as_mut()).await;
            }
        }

        debug!(delivered, live = connections.len(), "Broadcast complete");
        delivered
    }

    async fn write(
        &self,
        connection: &mut dyn ViewerConnection,
        payload: String,
    ) -> Result<(), ConnectionError> {
        match tokio::time::timeout(self.write_timeout, connection.send_text(payload)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    // A dead peer may not acknowledge the close frame either.
    async fn close(&self, connection: &mut dyn ViewerConnection) {
        let _ = tokio::time::timeout(self.write_timeout, connection.close()).await;
    }
}

fn encode<T: serde::Serialize + ?Sized>(value: &T, what: &str) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to encode {}", what);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ConnectionProbe;

    fn tickets(titles: &[&str]) -> Vec<Ticket> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| Ticket {
                id: i as i64,
                title: title.to_string(),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_register_and_deregister_is_idempotent() {
        let registry = ConnectionRegistry::default();
        let probe = ConnectionProbe::new();

        let id = registry.register(probe.connection()).await;
        assert_eq!(registry.len().await, 1);

        assert!(registry.deregister(id).await);
        assert!(probe.is_closed());
        assert!(!registry.deregister(id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let registry = ConnectionRegistry::default();
        let probes: Vec<ConnectionProbe> = (0..3).map(|_| ConnectionProbe::new()).collect();
        for probe in &probes {
            registry.register(probe.connection()).await;
        }

        let delivered = registry.broadcast_tickets(|| tickets(&["A"])).await;

        assert_eq!(delivered, 3);
        for probe in &probes {
            let sent = probe.sent();
            assert_eq!(sent.len(), 1);
            let decoded: Vec<Ticket> = serde_json::from_str(&sent[0]).unwrap();
            assert_eq!(decoded[0].title, "A");
        }
    }

    #[tokio::test]
    async fn test_failed_write_removes_only_that_connection() {
        let registry = ConnectionRegistry::default();
        let healthy: Vec<ConnectionProbe> = (0..4).map(|_| ConnectionProbe::new()).collect();
        let broken = ConnectionProbe::new();

        for probe in &healthy {
            registry.register(probe.connection()).await;
        }
        registry.register(broken.connection()).await;
        broken.set_failing(true);

        let delivered = registry.broadcast_tickets(|| tickets(&["A", "B"])).await;

        assert_eq!(delivered, 4);
        assert_eq!(registry.len().await, 4);
        assert!(broken.is_closed());
        for probe in &healthy {
            assert_eq!(probe.sent().len(), 1);
            assert!(!probe.is_closed());
        }

        // The next broadcast only sees the survivors.
        assert_eq!(registry.broadcast_tickets(|| tickets(&["C"])).await, 4);
    }

    #[tokio::test]
    async fn test_status_broadcast_reaps_failures_too() {
        let registry = ConnectionRegistry::default();
        let ok = ConnectionProbe::new();
        let broken = ConnectionProbe::new();
        registry.register(ok.connection()).await;
        registry.register(broken.connection()).await;
        broken.set_failing(true);

        let delivered = registry.broadcast_status(&StatusMessage::new(None, true)).await;

        assert_eq!(delivered, 1);
        assert_eq!(registry.len().await, 1);
        assert!(ok.sent()[0].contains("\"type\":\"status\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_connection_times_out() {
        let registry = ConnectionRegistry::new(Duration::from_millis(50));
        let ok = ConnectionProbe::new();
        let stalled = ConnectionProbe::new();
        registry.register(ok.connection()).await;
        registry.register(stalled.connection()).await;
        stalled.set_stalled(true);

        let delivered = registry.broadcast_tickets(Vec::new).await;

        assert_eq!(delivered, 1);
        assert_eq!(registry.len().await, 1);
        assert!(stalled.is_closed());
    }

    #[tokio::test]
    async fn test_initial_sync_sends_snapshot_then_status() {
        let registry = ConnectionRegistry::default();
        let probe = ConnectionProbe::new();

        let id = registry
            .register_with_initial_sync(
                probe.connection(),
                || tickets(&["A"]),
                &StatusMessage::new(None, true),
            )
            .await;

        assert!(id.is_some());
        let sent = probe.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with('['));
        assert!(sent[1].contains("\"isActive\":true"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_initial_sync_failure_never_joins() {
        let registry = ConnectionRegistry::default();
        let probe = ConnectionProbe::new();
        probe.set_failing(true);

        let id = registry
            .register_with_initial_sync(probe.connection(), Vec::new, &StatusMessage::new(None, false))
            .await;

        assert!(id.is_none());
        assert!(probe.is_closed());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_initial_sync_fails_on_second_message() {
        let registry = ConnectionRegistry::default();
        let probe = ConnectionProbe::new();
        probe.fail_after(1);

        let id = registry
            .register_with_initial_sync(probe.connection(), Vec::new, &StatusMessage::new(None, false))
            .await;

        assert!(id.is_none());
        assert_eq!(probe.sent().len(), 1);
        assert!(registry.is_empty().await);
    }
}
