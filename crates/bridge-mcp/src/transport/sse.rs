//! SSE transport: server→client stream plus a POST inbound channel.
//!
//! A client opens `GET /sse`, learns its session id and message
//! endpoint from the initial events, then POSTs envelopes to
//! `POST /message?session=<id>`. Responses are returned in the POST
//! body and mirrored onto the SSE stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::protocol::{self, ResponseEnvelope, SERVER_NAME, SERVER_VERSION};
use crate::session::TransportKind;
use bridge_core::BridgeError;

/// Closes the session when the SSE stream is dropped.
struct SessionGuard {
    sessions: Arc<crate::session::SessionRegistry>,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.close(self.id);
    }
}

pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<ResponseEnvelope>(32);
    let session_id = state.sessions.open_with_outbound(TransportKind::Sse, tx);
    info!(session = %session_id, "SSE client connected");

    let initial = vec![
        Event::default()
            .event("endpoint")
            .data(format!("/message?session={}", session_id)),
        Event::default().event("connected").data(
            json!({
                "server": SERVER_NAME,
                "version": SERVER_VERSION,
                "session": session_id,
            })
            .to_string(),
        ),
    ];

    let guard = SessionGuard {
        sessions: Arc::clone(&state.sessions),
        id: session_id,
    };
    // The guard lives inside the map closure, so dropping the stream
    // on disconnect closes the session and cancels its tasks.
    let responses = ReceiverStream::new(rx).map(move |envelope| {
        let _ = &guard;
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Ok(Event::default().event("message").data(data))
    });

    let stream = stream::iter(initial.into_iter().map(Ok)).chain(responses);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub session: Option<Uuid>,
}

/// Inbound channel paired with the SSE stream.
///
/// The body is deframed by hand so malformed JSON becomes a
/// ProtocolError envelope instead of a bare 400.
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Json<Value> {
    let envelope = match protocol::parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(response) => return Json(serde_json::to_value(response).unwrap_or_default()),
    };

    let session_id = match query.session {
        Some(id) => id,
        None => {
            let response = ResponseEnvelope::failure(
                envelope.id,
                &BridgeError::Protocol("missing session query parameter".into()),
            );
            return Json(serde_json::to_value(response).unwrap_or_default());
        }
    };

    match state.dispatcher.dispatch(session_id, envelope).await {
        Some(response) => {
            // Mirror onto the SSE stream for clients that only read
            // there; the POST body carries it too.
            state.sessions.push(session_id, response.clone());
            Json(serde_json::to_value(response).unwrap_or_default())
        }
        None => Json(Value::Null),
    }
}
