use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::models::StatusMessage;
use crate::services::status;
use crate::state::AppState;

// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_statuses(socket, state))
}

async fn stream_statuses(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.status_tx.subscribe();
    tracing::debug!("dashboard subscriber connected");

    // Catch up before the next reconciliation cycle
    match status::snapshot(&state.db) {
        Ok(message) => {
            if send_status(&mut socket, &message).await.is_err() {
                return;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to build initial status snapshot");
        }
    }

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(message) => {
                    if send_status(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "dashboard subscriber lagging, dropped updates");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("dashboard subscriber disconnected");
}

async fn send_status(socket: &mut WebSocket, message: &StatusMessage) -> Result<(), axum::Error> {
    match encode_frame(message) {
        Some(frame) => socket.send(frame).await,
        None => Ok(()),
    }
}

fn encode_frame<T: Serialize>(value: &T) -> Option<Message> {
    match serde_json::to_string(value) {
        Ok(data) => Some(Message::Text(data)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode websocket frame, skipped");
            None
        }
    }
}
