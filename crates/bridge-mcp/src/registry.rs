//! Tool registry: name → schema + handler.
//!
//! Tools are registered once at process start and never mutated at
//! runtime, so the map needs no interior mutability. Parameters are
//! validated against the declared schema before anything is enqueued;
//! invalid params never reach the host tick loop.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bridge_core::{BridgeError, HostState};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// A tool that must run inside the host tick window.
pub trait HostTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn run(&self, host: &mut HostState, params: Value) -> Result<Value, BridgeError>;
}

/// A tool that touches no host state and runs on the I/O context.
#[async_trait]
pub trait ImmediateTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn call(&self, params: Value) -> Result<Value, BridgeError>;
}

#[derive(Clone)]
pub enum ToolHandler {
    Host(Arc<dyn HostTool>),
    Immediate(Arc<dyn ImmediateTool>),
}

pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn host(tool: Arc<dyn HostTool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
            handler: ToolHandler::Host(tool),
        }
    }

    pub fn immediate(tool: Arc<dyn ImmediateTool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
            handler: ToolHandler::Immediate(tool),
        }
    }
}

/// Summary exposed by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if self.tools.contains_key(&descriptor.name) {
            bail!("tool '{}' registered twice", descriptor.name);
        }
        debug!(tool = %descriptor.name, "registered tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, BridgeError> {
        self.tools
            .get(name)
            .ok_or_else(|| BridgeError::ToolNotFound(name.to_string()))
    }

    /// Validate params against the tool's schema, returning them for
    /// dispatch on success.
    pub fn validate(&self, name: &str, params: Value) -> Result<Value, BridgeError> {
        let descriptor = self.lookup(name)?;
        validate_against_schema(&descriptor.input_schema, &params)
            .map_err(BridgeError::Schema)?;
        Ok(params)
    }

    pub fn list(&self) -> Vec<ToolSummary> {
        let mut summaries: Vec<ToolSummary> = self
            .tools
            .values()
            .map(|d| ToolSummary {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Check `params` against the object-schema subset the tools declare:
/// top-level `type: object`, `properties` with `type`, and `required`.
fn validate_against_schema(schema: &Value, params: &Value) -> Result<(), String> {
    let params_map = params
        .as_object()
        .ok_or_else(|| "arguments must be an object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !params_map.contains_key(key) {
                return Err(format!("missing required field '{}'", key));
            }
        }
    }

    let properties = match schema.get("properties").and_then(|p| p.as_object()) {
        Some(p) => p,
        None => return Ok(()),
    };
    for (key, value) in params_map {
        let declared = match properties.get(key).and_then(|p| p.get("type")) {
            Some(t) => t,
            None => continue,
        };
        let expected = declared.as_str().unwrap_or("any");
        if !type_matches(expected, value) {
            return Err(format!("field '{}' must be of type {}", key, expected));
        }
    }
    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    impl HostTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo back the given text."
        }
        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "times": { "type": "integer" }
                },
                "required": ["text"]
            })
        }
        fn run(&self, _host: &mut HostState, params: Value) -> Result<Value, BridgeError> {
            Ok(params)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::host(Arc::new(EchoTool)))
            .unwrap();
        registry
    }

    #[test]
    fn lookup_unknown_tool_echoes_the_name() {
        let registry = registry();
        let err = registry.lookup("does_not_exist").err().unwrap();
        assert!(err.to_string().contains("does_not_exist"));
        assert_eq!(err.code(), -32011);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry();
        assert!(registry
            .register(ToolDescriptor::host(Arc::new(EchoTool)))
            .is_err());
    }

    #[test]
    fn missing_required_field_is_a_schema_error() {
        let registry = registry();
        let err = registry.validate("echo", json!({})).unwrap_err();
        assert!(matches!(err, BridgeError::Schema(ref m) if m.contains("text")));
    }

    #[test]
    fn wrong_type_is_a_schema_error() {
        let registry = registry();
        let err = registry
            .validate("echo", json!({ "text": "hi", "times": "three" }))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Schema(ref m) if m.contains("times")));
    }

    #[test]
    fn valid_params_pass_through() {
        let registry = registry();
        let params = registry
            .validate("echo", json!({ "text": "hi", "times": 3 }))
            .unwrap();
        assert_eq!(params["times"], 3);
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let registry = registry();
        let err = registry.validate("echo", json!([1, 2])).unwrap_err();
        assert!(matches!(err, BridgeError::Schema(_)));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let registry = registry();
        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "echo");
    }
}
