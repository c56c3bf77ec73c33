//! # Synchronization Engine
//!
//! Drives the dashboard: pulls open tickets on a timer, keeps the
//! [`TicketCache`] current, and pushes updates to the [`ConnectionRegistry`].
//!
//! ## Tasks (started by [`SyncEngine::spawn`]):
//!
//! 1.  **Poll loop**: every `poll_interval`, runs [`SyncEngine::poll_cycle`].
//!     Outside active hours the cycle is a no-op.
//! 2.  **Heartbeat**: every `status_interval`, broadcasts a [`StatusMessage`]
//!     regardless of active hours or credentials.
//! 3.  **Broadcaster**: drains broadcast requests queued by polls that changed
//!     the fingerprint. Requests coalesce: a pending request already covers any
//!     later change, since the snapshot is read when the broadcast runs.
//!
//! Polls are serialized by an async mutex, so a timer tick and an
//! unlock-triggered [`SyncEngine::poll_now`] never interleave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{StatusMessage, SyncError, SyncPolicy};
use crate::fanout::ConnectionRegistry;
use crate::tickets::{TicketCache, TicketSource};
use crate::vault::CredentialVault;

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Outside active hours; nothing was attempted.
    Skipped,
    /// No credentials in the vault; no network call was made.
    NotAuthenticated,
    /// The source failed; the cache was not touched.
    FetchFailed,
    /// Fetched, but the unassigned titles did not change.
    Unchanged,
    /// Fetched and the fingerprint moved; a broadcast was queued.
    Changed,
}

/// # Sync Engine
///
/// Owns no state of its own beyond the last-success timestamp; the vault,
/// cache and registry are injected so the web layer can share them.
pub struct SyncEngine {
    vault: Arc<CredentialVault>,
    cache: Arc<TicketCache>,
    registry: Arc<ConnectionRegistry>,
    source: Arc<dyn TicketSource>,
    policy: SyncPolicy,
    last_success: RwLock<Option<DateTime<Utc>>>,
    poll_lock: tokio::sync::Mutex<()>,
    broadcast_tx: mpsc::Sender<()>,
    broadcast_rx: Mutex<Option<mpsc::Receiver<()>>>,
    broadcasts_requested: AtomicU64,
}

impl SyncEngine {
    pub fn new(
        vault: Arc<CredentialVault>,
        cache: Arc<TicketCache>,
        registry: Arc<ConnectionRegistry>,
        source: Arc<dyn TicketSource>,
        policy: SyncPolicy,
    ) -> Self {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(1);
        Self {
            vault,
            cache,
            registry,
            source,
            policy,
            last_success: RwLock::new(None),
            poll_lock: tokio::sync::Mutex::new(()),
            broadcast_tx,
            broadcast_rx: Mutex::new(Some(broadcast_rx)),
            broadcasts_requested: AtomicU64::new(0),
        }
    }

    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    pub fn cache(&self) -> &Arc<TicketCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Time of the last successful fetch, if any.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    /// How many polls have changed the fingerprint since startup.
    pub fn broadcasts_requested(&self) -> u64 {
        self.broadcasts_requested.load(Ordering::Relaxed)
    }

    /// The heartbeat payload as of `now`.
    pub fn status_message<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> StatusMessage {
        StatusMessage::new(self.last_success(), self.policy.active_hours.is_active_at(now))
    }

    /// # Poll Cycle
    ///
    /// One timer tick. Checks active hours against `now`, then polls. Errors
    /// are logged and folded into the returned [`PollOutcome`].
    pub async fn poll_cycle<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PollOutcome {
        let hour = now.hour();
        if !self.policy.active_hours.contains(hour) {
            if self.policy.verbose {
                info!(hour, "Outside active hours, skipping poll");
            }
            return PollOutcome::Skipped;
        }

        match self.poll_now().await {
            Ok(outcome) => outcome,
            Err(SyncError::NotAuthenticated) => {
                debug!("Credentials not loaded, skipping poll");
                PollOutcome::NotAuthenticated
            }
            Err(SyncError::Fetch(e)) => {
                warn!(error = %e, "Ticket fetch failed, will retry next tick");
                PollOutcome::FetchFailed
            }
        }
    }

    /// # Poll Now
    ///
    /// Fetches immediately, ignoring active hours. On success records the
    /// timestamp, replaces the cache and refreshes the fingerprint; a change
    /// queues a broadcast.
    pub async fn poll_now(&self) -> Result<PollOutcome, SyncError> {
        let _serial = self.poll_lock.lock().await;

        if !self.vault.credentials_loaded() {
            return Err(SyncError::NotAuthenticated);
        }
        let credentials = self.vault.credentials();

        let tickets = self.source.fetch_open_tickets(&credentials).await?;
        *self.last_success.write() = Some(Utc::now());

        let total = tickets.len();
        self.cache.replace(tickets);
        let changed = self.cache.refresh_fingerprint();

        if self.policy.verbose {
            info!(total, changed, "Poll complete");
        } else {
            debug!(total, changed, "Poll complete");
        }

        if changed {
            self.request_broadcast();
            Ok(PollOutcome::Changed)
        } else {
            Ok(PollOutcome::Unchanged)
        }
    }

    /// Runs [`SyncEngine::poll_now`] on a background task. Used by the unlock
    /// and submit paths so the HTTP response does not wait on the API.
    pub fn trigger_poll(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.poll_now().await {
                warn!(error = %e, "Triggered poll failed");
            }
        })
    }

    /// Sends the current unassigned snapshot to every viewer now.
    pub async fn broadcast_snapshot(&self) -> usize {
        let cache = &self.cache;
        self.registry.broadcast_tickets(|| cache.unassigned_snapshot()).await
    }

    /// # Spawn
    ///
    /// Starts the poll loop, heartbeat and broadcaster. All three stop when
    /// `token` is cancelled. Calling this twice starts no second broadcaster.
    pub fn spawn(self: &Arc<Self>, token: CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(Arc::clone(self).run_poll_loop(token.clone())),
            tokio::spawn(Arc::clone(self).run_heartbeat(token.clone())),
            tokio::spawn(Arc::clone(self).run_broadcaster(token)),
        ]
    }

    fn request_broadcast(&self) {
        self.broadcasts_requested.fetch_add(1, Ordering::Relaxed);
        match self.broadcast_tx.try_send(()) {
            // Full means one is already pending and will pick up this change.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => debug!("Broadcaster stopped, dropping request"),
        }
    }

    async fn run_poll_loop(self: Arc<Self>, token: CancellationToken) {
        let period = self.policy.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Poll loop started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_cycle(&Local::now()).await;
                }
            }
        }
        info!("Poll loop stopped");
    }

    async fn run_heartbeat(self: Arc<Self>, token: CancellationToken) {
        let period = self.policy.status_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let status = self.status_message(&Local::now());
                    let delivered = self.registry.broadcast_status(&status).await;
                    debug!(delivered, active = status.is_active, "Status heartbeat sent");
                }
            }
        }
        info!("Heartbeat stopped");
    }

    async fn run_broadcaster(self: Arc<Self>, token: CancellationToken) {
        let receiver = self.broadcast_rx.lock().take();
        let Some(mut receiver) = receiver else {
            warn!("Broadcaster already running");
            return;
        };

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                request = receiver.recv() => match request {
                    Some(()) => {
                        let delivered = self.broadcast_snapshot().await;
                        info!(delivered, "Ticket update broadcast");
                    }
                    None => break,
                },
            }
        }
        info!("Broadcaster stopped");
    }
}
