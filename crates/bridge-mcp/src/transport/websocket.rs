//! WebSocket transport: full-duplex JSON envelope exchange.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, error, info};

use super::AppState;
use crate::protocol::{self, ResponseEnvelope, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::session::TransportKind;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let session_id = state.sessions.open(TransportKind::WebSocket);
    info!(session = %session_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let welcome = json!({
        "type": "welcome",
        "server": SERVER_NAME,
        "version": SERVER_VERSION,
        "protocol": PROTOCOL_VERSION,
        "session": session_id,
    });
    if let Err(e) = sender.send(Message::Text(welcome.to_string())).await {
        error!(session = %session_id, error = %e, "failed to send welcome");
        state.sessions.close(session_id);
        return;
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!(session = %session_id, request = %text, "WebSocket request");

                let response: Option<ResponseEnvelope> = match protocol::parse_envelope(&text) {
                    Ok(envelope) => state.dispatcher.dispatch(session_id, envelope).await,
                    Err(error_response) => Some(error_response),
                };

                if let Some(response) = response {
                    let payload = serde_json::to_string(&response).unwrap_or_default();
                    if let Err(e) = sender.send(Message::Text(payload)).await {
                        error!(session = %session_id, error = %e, "failed to send response");
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!(session = %session_id, "client sent close");
                break;
            }
            Ok(_) => {} // binary and pong frames are ignored
            Err(e) => {
                // Socket reset: terminal for this session only.
                error!(session = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.sessions.close(session_id);
    info!(session = %session_id, "WebSocket connection closed");
}
