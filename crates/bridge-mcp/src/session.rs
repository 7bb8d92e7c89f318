//! Per-connection session tracking.
//!
//! Each logical client connection gets its own request-id namespace
//! and walks `Handshake → Active`, then out of the registry on close.
//! Closing a session removes its entry (and the `seen_ids` set with
//! it), cancels its outstanding executor tasks and drops its outbound
//! stream, which is what suppresses responses for work already in
//! flight. Requests against a closed or unknown session fail with
//! `SessionClosed`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use bridge_core::{BridgeError, ExecutorHandle};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::ResponseEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Sse,
    WebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Sse => f.write_str("sse"),
            TransportKind::WebSocket => f.write_str("websocket"),
        }
    }
}

/// Live session states. A closed session has no state: its entry is
/// removed from the registry entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    Active,
}

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: Option<String>,
}

struct Session {
    kind: TransportKind,
    state: SessionState,
    protocol_version: Option<String>,
    client: Option<ClientInfo>,
    created_at: DateTime<Utc>,
    seen_ids: HashSet<String>,
    /// Outbound stream for SSE sessions; WebSocket replies inline.
    outbound: Option<mpsc::Sender<ResponseEnvelope>>,
}

/// Registry of live sessions, shared by transports and dispatcher.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Session>>,
    executor: ExecutorHandle,
}

impl SessionRegistry {
    pub fn new(executor: ExecutorHandle) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            executor,
        }
    }

    pub fn open(&self, kind: TransportKind) -> Uuid {
        self.open_inner(kind, None)
    }

    /// Open an SSE session whose responses flow through `outbound`.
    pub fn open_with_outbound(
        &self,
        kind: TransportKind,
        outbound: mpsc::Sender<ResponseEnvelope>,
    ) -> Uuid {
        self.open_inner(kind, Some(outbound))
    }

    fn open_inner(
        &self,
        kind: TransportKind,
        outbound: Option<mpsc::Sender<ResponseEnvelope>>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let session = Session {
            kind,
            state: SessionState::Handshake,
            protocol_version: None,
            client: None,
            created_at: Utc::now(),
            seen_ids: HashSet::new(),
            outbound,
        };
        self.sessions.lock().unwrap().insert(id, session);
        info!(session = %id, transport = %kind, "session opened");
        id
    }

    /// Record the `initialize` handshake.
    pub fn activate(
        &self,
        id: Uuid,
        protocol_version: Option<String>,
        client: Option<ClientInfo>,
    ) -> Result<(), BridgeError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&id).ok_or(BridgeError::SessionClosed)?;
        session.state = SessionState::Active;
        session.protocol_version = protocol_version;
        session.client = client;
        Ok(())
    }

    /// Claim a request id for this session's lifetime. A duplicate is
    /// a protocol error: ids get exactly one terminal response, so
    /// idempotent retries are not assumed.
    pub fn claim_request_id(&self, id: Uuid, request_id: &Value) -> Result<(), BridgeError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&id).ok_or(BridgeError::SessionClosed)?;

        let key = request_id.to_string();
        if !session.seen_ids.insert(key) {
            return Err(BridgeError::Protocol(format!(
                "duplicate request id {} in session",
                request_id
            )));
        }
        Ok(())
    }

    /// Close a session: remove its entry and cancel its queued tasks.
    /// Removal also drops the outbound stream and the seen-id set, so
    /// closed sessions cost nothing. Idempotent.
    pub fn close(&self, id: Uuid) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = match sessions.remove(&id) {
            Some(session) => session,
            None => return,
        };
        drop(sessions);

        let uptime = Utc::now() - session.created_at;
        info!(
            session = %id,
            transport = %session.kind,
            uptime_secs = uptime.num_seconds(),
            "session closed"
        );
        self.executor.cancel_session(id);
    }

    /// State of a live session; `None` once closed.
    pub fn state(&self, id: Uuid) -> Option<SessionState> {
        self.sessions.lock().unwrap().get(&id).map(|s| s.state)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Push a response onto an SSE session's stream. Returns false if
    /// the session is gone or has no outbound channel.
    pub fn push(&self, id: Uuid, envelope: ResponseEnvelope) -> bool {
        let sessions = self.sessions.lock().unwrap();
        match sessions.get(&id).and_then(|s| s.outbound.as_ref()) {
            Some(tx) => {
                if tx.try_send(envelope).is_err() {
                    debug!(session = %id, "outbound stream full or closed, dropping event");
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{executor, Settings};
    use serde_json::json;

    fn registry() -> SessionRegistry {
        let (handle, _runtime) = executor::queue(&Settings::default());
        SessionRegistry::new(handle)
    }

    #[tokio::test]
    async fn duplicate_request_id_is_rejected() {
        let registry = registry();
        let id = registry.open(TransportKind::WebSocket);

        registry.claim_request_id(id, &json!(1)).unwrap();
        let err = registry.claim_request_id(id, &json!(1)).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));

        // Different id still fine; the namespace is per session.
        registry.claim_request_id(id, &json!(2)).unwrap();
        let other = registry.open(TransportKind::WebSocket);
        registry.claim_request_id(other, &json!(1)).unwrap();
    }

    #[tokio::test]
    async fn closed_session_rejects_further_requests() {
        let registry = registry();
        let id = registry.open(TransportKind::WebSocket);
        registry.close(id);

        assert_eq!(registry.state(id), None);
        let err = registry.claim_request_id(id, &json!(1)).unwrap_err();
        assert!(matches!(err, BridgeError::SessionClosed));
    }

    #[tokio::test]
    async fn closed_sessions_are_dropped_from_the_registry() {
        let registry = registry();

        let ids: Vec<_> = (0..100)
            .map(|_| registry.open(TransportKind::WebSocket))
            .collect();
        for id in &ids {
            registry.claim_request_id(*id, &json!(1)).unwrap();
        }
        assert_eq!(registry.len(), 100);

        for id in ids {
            registry.close(id);
            // Closing twice must not panic or double-cancel.
            registry.close(id);
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn handshake_activates_session() {
        let registry = registry();
        let id = registry.open(TransportKind::Sse);
        assert_eq!(registry.state(id), Some(SessionState::Handshake));

        registry
            .activate(
                id,
                Some("2024-11-05".into()),
                Some(ClientInfo {
                    name: "test-client".into(),
                    version: None,
                }),
            )
            .unwrap();
        assert_eq!(registry.state(id), Some(SessionState::Active));
    }

    #[tokio::test]
    async fn push_reaches_the_outbound_channel() {
        let registry = registry();
        let (tx, mut rx) = mpsc::channel(4);
        let id = registry.open_with_outbound(TransportKind::Sse, tx);

        let envelope = ResponseEnvelope::success(Some(json!(1)), json!({}));
        assert!(registry.push(id, envelope));
        assert!(rx.recv().await.is_some());

        registry.close(id);
        let envelope = ResponseEnvelope::success(Some(json!(2)), json!({}));
        assert!(!registry.push(id, envelope));
    }
}
