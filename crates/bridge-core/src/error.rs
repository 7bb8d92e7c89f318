//! Bridge error taxonomy.
//!
//! Every error that can surface to a client maps to a stable JSON-RPC
//! error code. None of these are terminal for the process; only a
//! transport-level failure closes a session.

use std::time::Duration;

use thiserror::Error;

use crate::resources::ResourceKind;

/// Errors produced anywhere between envelope receipt and task completion.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed envelope, unknown method, or a duplicate request id.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Parameters failed schema validation before enqueue.
    #[error("invalid params: {0}")]
    Schema(String),

    /// No tool registered under this name.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Executor queue is at capacity; the caller was not blocked.
    #[error("execution queue is full")]
    QueueFull,

    /// The task exceeded its wall-clock budget while Executing.
    /// The underlying host call is not aborted; the host has no
    /// preemption primitive.
    #[error("task exceeded {0:?}; the host call was not aborted")]
    Timeout(Duration),

    /// The tool handler returned an error or panicked.
    #[error("tool execution failed: {0}")]
    Execution(String),

    #[error("resource not found: {kind}/{name}")]
    ResourceNotFound { kind: ResourceKind, name: String },

    /// The originating session disconnected before completion.
    #[error("session closed")]
    SessionClosed,
}

impl BridgeError {
    /// Stable JSON-RPC error code for this variant.
    ///
    /// -32600/-32602 follow the JSON-RPC 2.0 reserved range; the rest
    /// live in the implementation-defined -32000..-32099 band.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::Protocol(_) => -32600,
            BridgeError::Schema(_) => -32602,
            BridgeError::ToolNotFound(_) => -32011,
            BridgeError::ResourceNotFound { .. } => -32012,
            BridgeError::SessionClosed => -32013,
            BridgeError::QueueFull => -32021,
            BridgeError::Timeout(_) => -32022,
            BridgeError::Execution(_) => -32023,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(BridgeError::Protocol("x".into()).code(), -32600);
        assert_eq!(BridgeError::Schema("x".into()).code(), -32602);
        assert_eq!(BridgeError::ToolNotFound("x".into()).code(), -32011);
        assert_eq!(BridgeError::QueueFull.code(), -32021);
        assert_eq!(
            BridgeError::Timeout(Duration::from_secs(1)).code(),
            -32022
        );
    }

    #[test]
    fn resource_not_found_names_the_resource() {
        let err = BridgeError::ResourceNotFound {
            kind: ResourceKind::Object,
            name: "Cube".into(),
        };
        assert_eq!(err.to_string(), "resource not found: objects/Cube");
    }
}
