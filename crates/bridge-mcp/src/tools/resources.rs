//! Resource tools: enumerate, fetch and patch host entities.
//!
//! These execute inside the tick window and return owned snapshots;
//! nothing handed back over the wire aliases host memory.

use bridge_core::{resources, BridgeError, HostState, ResourceKind};
use serde_json::{json, Value};

use crate::registry::HostTool;

pub struct GetResourcesTool;

impl HostTool for GetResourcesTool {
    fn name(&self) -> &str {
        "get_resources"
    }

    fn description(&self) -> &str {
        "List resources in the current host scene. Optionally filter by resource type."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "resource_type": {
                    "type": "string",
                    "description": "objects, scenes or files; omit for all"
                }
            },
            "required": []
        })
    }

    fn run(&self, host: &mut HostState, params: Value) -> Result<Value, BridgeError> {
        let handles = match params.get("resource_type").and_then(|v| v.as_str()) {
            Some(raw) => resources::list(host, raw.parse()?),
            None => {
                let mut all = resources::list(host, ResourceKind::Object);
                all.extend(resources::list(host, ResourceKind::Scene));
                all.extend(resources::list(host, ResourceKind::File));
                all
            }
        };
        Ok(json!({ "resources": handles }))
    }
}

pub struct GetResourceTool;

impl HostTool for GetResourceTool {
    fn name(&self) -> &str {
        "get_resource"
    }

    fn description(&self) -> &str {
        "Get a snapshot of one host resource by type and name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "resource_type": {
                    "type": "string",
                    "description": "objects, scenes or files"
                },
                "name": {
                    "type": "string",
                    "description": "Resource name, e.g. Cube"
                }
            },
            "required": ["resource_type", "name"]
        })
    }

    fn run(&self, host: &mut HostState, params: Value) -> Result<Value, BridgeError> {
        let (kind, name) = kind_and_name(&params)?;
        let snapshot = resources::get(host, kind, name)?;
        Ok(json!({ "resource": snapshot }))
    }
}

pub struct SetResourceTool;

impl HostTool for SetResourceTool {
    fn name(&self) -> &str {
        "set_resource"
    }

    fn description(&self) -> &str {
        "Apply a patch to one host resource and return the updated snapshot."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "resource_type": { "type": "string" },
                "name": { "type": "string" },
                "patch": {
                    "type": "object",
                    "description": "Fields to update, e.g. {\"location\": [0, 0, 2]}"
                }
            },
            "required": ["resource_type", "name", "patch"]
        })
    }

    fn run(&self, host: &mut HostState, params: Value) -> Result<Value, BridgeError> {
        let (kind, name) = kind_and_name(&params)?;
        let patch = params
            .get("patch")
            .ok_or_else(|| BridgeError::Schema("missing patch".into()))?;
        let snapshot = resources::set(host, kind, name, patch)?;
        Ok(json!({ "resource": snapshot }))
    }
}

fn kind_and_name(params: &Value) -> Result<(ResourceKind, &str), BridgeError> {
    let kind: ResourceKind = params
        .get("resource_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BridgeError::Schema("missing resource_type".into()))?
        .parse()?;
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BridgeError::Schema("missing name".into()))?;
    Ok((kind, name))
}
