//! JSON-RPC 2.0 envelope types for the bridge protocol.

use bridge_core::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "host-bridge";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// An incoming request. Immutable once received; the id is
/// client-assigned and must be unique within the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RequestEnvelope {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// A request without an id is a notification and gets no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An outgoing response carrying exactly one of result or error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl ResponseEnvelope {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn failure(id: Option<Value>, err: &BridgeError) -> Self {
        Self::error(id, RpcError::from_bridge(err))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON-RPC error object with a stable code per error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn from_bridge(err: &BridgeError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Deframe one envelope from raw transport text.
///
/// On malformed input the error response carries the best-effort
/// recovered request id, or none when not even that survives parsing.
pub fn parse_envelope(raw: &str) -> Result<RequestEnvelope, ResponseEnvelope> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        ResponseEnvelope::failure(None, &BridgeError::Protocol(format!("malformed JSON: {}", e)))
    })?;

    let recovered_id = value.get("id").cloned().filter(|v| !v.is_null());
    serde_json::from_value(value).map_err(|e| {
        ResponseEnvelope::failure(
            recovered_id,
            &BridgeError::Protocol(format!("malformed envelope: {}", e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips() {
        let req = RequestEnvelope::new("tools/call")
            .with_id(json!(7))
            .with_params(json!({ "name": "execute_code" }));
        let text = serde_json::to_string(&req).unwrap();
        let parsed = parse_envelope(&text).unwrap();
        assert_eq!(parsed.method, "tools/call");
        assert_eq!(parsed.id, Some(json!(7)));
    }

    #[test]
    fn malformed_json_yields_protocol_error_without_id() {
        let resp = parse_envelope("{not json").unwrap_err();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32600);
        assert!(resp.id.is_none());
    }

    #[test]
    fn malformed_envelope_recovers_the_id() {
        // `method` is a number, but the id survives.
        let resp = parse_envelope(r#"{"jsonrpc":"2.0","id":42,"method":5}"#).unwrap_err();
        assert_eq!(resp.id, Some(json!(42)));
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[test]
    fn response_carries_exactly_one_of_result_or_error() {
        let ok = ResponseEnvelope::success(Some(json!(1)), json!({}));
        assert!(ok.is_success() && ok.result.is_some() && ok.error.is_none());

        let err = ResponseEnvelope::failure(Some(json!(1)), &BridgeError::QueueFull);
        assert!(!err.is_success() && err.result.is_none());
        assert_eq!(err.error.unwrap().code, -32021);
    }
}
