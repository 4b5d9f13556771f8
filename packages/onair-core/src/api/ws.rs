//! WebSocket handler for the on-air push feed.
//!
//! The feed is one-way: the server writes snapshot frames and anything the
//! client sends is ignored, apart from close frames.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use tokio::sync::mpsc;

use crate::api::AppState;
use crate::services::Frame;

/// Upgrades the request and joins the socket to the broadcast group.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Leaving the group happens when the guard drops, whichever way the
    // loop below ends.
    let conn_guard = state.ws_manager.register();
    let cancel_token = conn_guard.cancel_token().clone();

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Frame>();
    state.notifier.join(conn_guard.id(), frame_tx);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: ws-{}", conn_guard.id());
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            frame = frame_rx.recv() => {
                let Some(frame) = frame else {
                    // The notifier dropped us (or stopped).
                    break;
                };
                if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                    log::debug!("[WS] Send failed, closing ws-{}", conn_guard.id());
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::debug!("[WS] Receive error on ws-{}: {}", conn_guard.id(), e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
