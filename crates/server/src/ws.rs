// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Websocket fan-out: one bus subscription per connected socket.
//!
//! The sink forwards events into a bounded channel drained by the socket
//! task; a slow consumer backpressures the dispatcher rather than growing
//! an unbounded buffer. The subscription's permission set is the one loaded
//! at login, so the bus filters events per connection.

use crate::app::App;
use crate::sessions::Session;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use pylon_bus::{BusEvent, EventSink, HandlerError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

struct WsSink {
    tx: mpsc::Sender<String>,
}

#[async_trait]
impl EventSink for WsSink {
    async fn deliver(&self, event: &BusEvent) -> Result<(), HandlerError> {
        let frame = serde_json::json!({
            "event": event.descriptor.id,
            "payload": &*event.payload,
        });
        self.tx
            .send(frame.to_string())
            .await
            .map_err(|_| HandlerError::new("websocket channel closed"))
    }
}

/// Drive one authenticated websocket until either side closes it.
pub async fn serve_socket(app: Arc<App>, session: Session, mut socket: WebSocket) {
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let subscriber = app.bus.subscribe(Arc::new(WsSink { tx }), session.permissions.clone()).await;
    info!(username = %session.username, "websocket connected");

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(text) = outgoing else { break };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    // Inbound frames other than close are ignored; this
                    // surface only pushes.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    app.bus.unsubscribe(subscriber).await;
    info!(username = %session.username, "websocket disconnected");
}
