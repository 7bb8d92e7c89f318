//! File import into the host scene.

use bridge_core::{resources, BridgeError, HostState};
use serde_json::{json, Value};
use tracing::info;

use crate::registry::HostTool;

pub struct ImportFileTool;

impl HostTool for ImportFileTool {
    fn name(&self) -> &str {
        "import_file"
    }

    fn description(&self) -> &str {
        "Import a 3D file (glb, gltf, obj, fbx) and return the created resources."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the file to import",
                    "example": "/path/to/model.glb"
                }
            },
            "required": ["path"]
        })
    }

    fn run(&self, host: &mut HostState, params: Value) -> Result<Value, BridgeError> {
        let path = params
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::Schema("missing path".into()))?;

        info!(%path, "import_file");
        let created = resources::import_file(host, path)?;
        Ok(json!({ "imported": created }))
    }
}
