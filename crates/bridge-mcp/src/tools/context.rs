//! Context snapshot: what the host is looking at right now.

use bridge_core::{resources, BridgeError, HostState, ResourceKind};
use serde_json::{json, Value};

use crate::registry::HostTool;

pub struct GetContextTool;

impl HostTool for GetContextTool {
    fn name(&self) -> &str {
        "get_context"
    }

    fn description(&self) -> &str {
        "Summarize the current host context: active scene, its frame state and the loaded content."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn run(&self, host: &mut HostState, _params: Value) -> Result<Value, BridgeError> {
        let scene = resources::get(host, ResourceKind::Scene, host.active_scene.as_str())?;
        Ok(json!({
            "context": {
                "scene": scene,
                "objects": host.objects.keys().collect::<Vec<_>>(),
                "object_count": host.objects.len(),
                "file_count": host.files.len(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_names_the_default_scene() {
        let mut host = HostState::new();
        let result = GetContextTool.run(&mut host, json!({})).unwrap();
        assert_eq!(result["context"]["scene"]["name"], "Scene");
        assert_eq!(result["context"]["object_count"], 0);
    }

    #[test]
    fn context_follows_the_active_scene_and_objects() {
        let mut host = HostState::new();
        bridge_core::host::run_script(
            &mut host,
            "object.add Cube\nobject.add Lamp lamp\nscene.add Staging\nscene.use Staging",
        )
        .unwrap();

        let result = GetContextTool.run(&mut host, json!({})).unwrap();
        assert_eq!(result["context"]["scene"]["name"], "Staging");
        assert_eq!(result["context"]["objects"], json!(["Cube", "Lamp"]));
    }
}
