//! Method resolution and task construction.
//!
//! Protocol methods (`initialize`, `tools/list`, `ping`) are answered
//! synchronously without touching the executor queue. Every
//! `tools/call` becomes at most one ExecutionTask; duplicate request
//! ids from a session are rejected before anything is enqueued.

use std::sync::Arc;
use std::time::Duration;

use bridge_core::{BridgeError, ExecutionTask, ExecutorHandle};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::{
    RequestEnvelope, ResponseEnvelope, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
};
use crate::registry::{ToolHandler, ToolRegistry};
use crate::session::{ClientInfo, SessionRegistry};

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    executor: ExecutorHandle,
    sessions: Arc<SessionRegistry>,
    task_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        executor: ExecutorHandle,
        sessions: Arc<SessionRegistry>,
        task_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            executor,
            sessions,
            task_timeout,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Handle one envelope for one session. `None` means no response
    /// is delivered: a notification, or a response suppressed because
    /// the session went away mid-flight.
    pub async fn dispatch(
        &self,
        session_id: Uuid,
        request: RequestEnvelope,
    ) -> Option<ResponseEnvelope> {
        debug!(session = %session_id, method = %request.method, "dispatching request");

        if let Some(id) = &request.id {
            if let Err(err) = self.sessions.claim_request_id(session_id, id) {
                return Some(ResponseEnvelope::failure(Some(id.clone()), &err));
            }
        }

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(session_id, request)),
            "initialized" => {
                // Notification acknowledging the handshake.
                request
                    .id
                    .map(|id| ResponseEnvelope::success(Some(id), json!({})))
            }
            "ping" => Some(ResponseEnvelope::success(request.id, json!({}))),
            "tools/list" => Some(self.handle_tools_list(request)),
            "tools/call" => self.handle_tools_call(session_id, request).await,
            other => Some(ResponseEnvelope::failure(
                request.id,
                &BridgeError::Protocol(format!("unknown method '{}'", other)),
            )),
        }
    }

    fn handle_initialize(&self, session_id: Uuid, request: RequestEnvelope) -> ResponseEnvelope {
        let params = request.params.unwrap_or_else(|| json!({}));
        let client = params.get("clientInfo").map(|ci| ClientInfo {
            name: ci
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("unknown")
                .to_string(),
            version: ci
                .get("version")
                .and_then(|v| v.as_str())
                .map(String::from),
        });
        let requested_version = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .map(String::from);

        if let Some(client) = &client {
            debug!(
                session = %session_id,
                client = %client.name,
                version = %client.version.as_deref().unwrap_or("?"),
                "client connected"
            );
        }

        if let Err(err) = self
            .sessions
            .activate(session_id, requested_version, client)
        {
            return ResponseEnvelope::failure(request.id, &err);
        }

        ResponseEnvelope::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: RequestEnvelope) -> ResponseEnvelope {
        ResponseEnvelope::success(request.id, json!({ "tools": self.registry.list() }))
    }

    async fn handle_tools_call(
        &self,
        session_id: Uuid,
        request: RequestEnvelope,
    ) -> Option<ResponseEnvelope> {
        let id = match request.id {
            Some(id) => id,
            None => {
                return Some(ResponseEnvelope::failure(
                    None,
                    &BridgeError::Protocol("tools/call requires a request id".into()),
                ))
            }
        };

        let params = request.params.unwrap_or_else(|| json!({}));
        let tool_name = match params.get("name").and_then(|n| n.as_str()) {
            Some(name) => name.to_string(),
            None => {
                return Some(ResponseEnvelope::failure(
                    Some(id),
                    &BridgeError::Schema("missing tool name".into()),
                ))
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let handler = match self.registry.lookup(&tool_name) {
            Ok(descriptor) => descriptor.handler.clone(),
            Err(err) => return Some(ResponseEnvelope::failure(Some(id), &err)),
        };

        // Schema check before enqueue; invalid params never reach the
        // tick loop.
        let validated = match self.registry.validate(&tool_name, arguments) {
            Ok(params) => params,
            Err(err) => return Some(ResponseEnvelope::failure(Some(id), &err)),
        };

        let outcome = match handler {
            ToolHandler::Immediate(tool) => tool.call(validated).await,
            ToolHandler::Host(tool) => {
                let (tx, rx) = oneshot::channel();
                let job_tool = Arc::clone(&tool);
                let task = ExecutionTask::new(
                    session_id,
                    tool_name.clone(),
                    Box::new(move |host| job_tool.run(host, validated)),
                    tx,
                );
                if let Err(err) = self.executor.submit(task) {
                    return Some(ResponseEnvelope::failure(Some(id), &err));
                }

                match tokio::time::timeout(self.task_timeout, rx).await {
                    Ok(Ok(result)) => result,
                    // Responder dropped: the task was cancelled on
                    // disconnect. Suppress the response entirely.
                    Ok(Err(_)) => {
                        debug!(session = %session_id, tool = %tool_name, "task cancelled, response suppressed");
                        return None;
                    }
                    Err(_) => {
                        warn!(
                            session = %session_id,
                            tool = %tool_name,
                            timeout_ms = self.task_timeout.as_millis() as u64,
                            "task timed out; host call continues unaborted"
                        );
                        Err(BridgeError::Timeout(self.task_timeout))
                    }
                }
            }
        };

        Some(match outcome {
            Ok(value) => ResponseEnvelope::success(Some(id), tool_result(&tool_name, value)),
            Err(err) => ResponseEnvelope::failure(Some(id), &err),
        })
    }
}

/// Wrap a tool result in the MCP content shape, keeping the structured
/// value alongside the rendered text.
fn tool_result(tool_name: &str, value: Value) -> Value {
    let text = serde_json::to_string_pretty(&value).unwrap_or_default();
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": value,
        "isError": false,
        "_meta": { "tool": tool_name }
    })
}
