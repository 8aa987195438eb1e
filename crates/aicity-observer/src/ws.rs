//! WebSocket handler for the live day feed.
//!
//! Clients connect to `GET /ws/days`, receive the current snapshot as the
//! first frame, then every day event in commit order. A client that falls
//! behind the bounded channel is skipped ahead and should re-sync from
//! `GET /api/state`; slow observers never block the tick.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use aicity_types::ObserverEvent;

use crate::state::AppState;

/// Upgrade to a WebSocket and begin streaming day events.
///
/// # Route
///
/// `GET /ws/days`
pub async fn ws_days(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("observer connected");

    // First frame: the full snapshot, so late joiners are consistent
    // with a day boundary.
    let snapshot = state.snapshot.read().await.clone();
    let hello = ObserverEvent::State {
        day: snapshot.day,
        data: snapshot,
    };
    if send_json(&mut socket, &hello).await.is_err() {
        return;
    }

    let mut rx = state.subscribe();
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if send_json(&mut socket, &event).await.is_err() {
                            debug!("observer disconnected (send failed)");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "observer lagged; skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("broadcast closed; shutting down socket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("observer disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("observer socket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_json(socket: &mut WebSocket, event: &ObserverEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("failed to serialize observer event: {e}");
            return Ok(());
        }
    };
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
