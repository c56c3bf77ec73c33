//! Test doubles shared by the unit tests and the `project_tests` crate.
//! Compiled only for tests or with the `test-util` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::fanout::{ConnectionError, ViewerConnection};
use crate::tickets::{FetchError, Ticket, TicketSource};
use crate::vault::Credentials;

#[derive(Default)]
struct ProbeState {
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
    stalled: AtomicBool,
    closed: AtomicBool,
    fail_after: Mutex<Option<usize>>,
}

/// Observes a [`RecordingConnection`] after it has been handed to a registry.
#[derive(Clone, Default)]
pub struct ConnectionProbe {
    state: Arc<ProbeState>,
}

impl ConnectionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A boxed connection reporting into this probe.
    pub fn connection(&self) -> Box<dyn ViewerConnection> {
        Box::new(RecordingConnection {
            state: self.state.clone(),
        })
    }

    /// Frames successfully written so far.
    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Every subsequent write fails.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Every subsequent write never completes.
    pub fn set_stalled(&self, stalled: bool) {
        self.state.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Writes succeed until `count` frames have been sent, then fail.
    pub fn fail_after(&self, count: usize) {
        *self.state.fail_after.lock() = Some(count);
    }
}

/// A [`ViewerConnection`] that records frames in memory.
pub struct RecordingConnection {
    state: Arc<ProbeState>,
}

#[async_trait]
impl ViewerConnection for RecordingConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        if self.state.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(ConnectionError::Send("peer gone".to_string()));
        }

        let limit = *self.state.fail_after.lock();
        let mut sent = self.state.sent.lock();
        if limit.is_some_and(|limit| sent.len() >= limit) {
            return Err(ConnectionError::Send("peer gone".to_string()));
        }
        sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// A [`TicketSource`] that replays a queue of scripted responses. Once the
/// queue is empty it keeps returning the last response.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Ticket>, FetchError>>>,
    last: Mutex<Option<Vec<Ticket>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    pub fn push_tickets(&self, tickets: Vec<Ticket>) -> &Self {
        self.script.lock().push_back(Ok(tickets));
        self
    }

    /// Queues a failed response.
    pub fn push_error(&self, error: FetchError) -> &Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Number of fetches performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketSource for ScriptedSource {
    async fn fetch_open_tickets(&self, _credentials: &Credentials) -> Result<Vec<Ticket>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(Ok(tickets)) => {
                *self.last.lock() = Some(tickets.clone());
                Ok(tickets)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().clone().unwrap_or_default()),
        }
    }
}

/// Builds unassigned tickets titled by `titles`, ids counting from 1.
pub fn unassigned(titles: &[&str]) -> Vec<Ticket> {
    titles
        .iter()
        .zip(1..)
        .map(|(title, id)| Ticket {
            id,
            title: title.to_string(),
            ..Default::default()
        })
        .collect()
}
