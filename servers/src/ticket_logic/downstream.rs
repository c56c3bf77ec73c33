//! Viewer WebSocket: adapts an axum socket to the registry's
//! [`ViewerConnection`] seam and runs the inbound read loop.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use chrono::Local;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lib_ticketwatch::{ConnectionError, SyncEngine, ViewerConnection};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outbound half of a viewer socket. Owned by the registry.
///
/// `stop` is shared with the read loop: closing the viewer ends that loop
/// too, so both halves drop and the socket is released even if the peer
/// never answers the Close frame.
pub struct WsViewer {
    sink: SplitSink<WebSocket, Message>,
    stop: CancellationToken,
}

impl WsViewer {
    pub fn new(sink: SplitSink<WebSocket, Message>, stop: CancellationToken) -> Self {
        Self { sink, stop }
    }
}

#[async_trait]
impl ViewerConnection for WsViewer {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ConnectionError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        self.stop.cancel();
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// # Handle Viewer
///
/// Registers the socket with an initial snapshot and status. If that fails
/// the viewer is already gone and nothing else happens. Otherwise reads until
/// the peer closes or errors, or until the registry closes the viewer, then
/// deregisters. Inbound messages carry no meaning and are discarded.
pub async fn handle_viewer(socket: WebSocket, engine: &SyncEngine) {
    let (sink, mut stream) = socket.split();
    let stop = CancellationToken::new();
    let status = engine.status_message(&Local::now());
    let cache = engine.cache();

    let registered = engine
        .registry()
        .register_with_initial_sync(
            Box::new(WsViewer::new(sink, stop.clone())),
            || cache.unassigned_snapshot(),
            &status,
        )
        .await;

    let Some(id) = registered else {
        return;
    };

    tokio::select! {
        _ = stop.cancelled() => {
            debug!(connection = id, "Viewer closed by registry");
        }
        _ = read_until_closed(&mut stream) => {
            debug!(connection = id, "Viewer read loop ended");
        }
    }
    engine.registry().deregister(id).await;
}

async fn read_until_closed(stream: &mut SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
