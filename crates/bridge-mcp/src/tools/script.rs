//! Arbitrary script execution against the host.

use bridge_core::{host, BridgeError, HostState};
use serde_json::{json, Value};
use tracing::info;

use crate::registry::HostTool;

pub struct ExecuteCodeTool;

impl HostTool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute the given script in the host and return the captured output."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Host script, one command per line.",
                    "example": "object.add Cube"
                }
            },
            "required": ["code"]
        })
    }

    fn run(&self, host: &mut HostState, params: Value) -> Result<Value, BridgeError> {
        let code = params
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::Schema("missing code".into()))?;

        info!(preview = %code.chars().take(100).collect::<String>(), "execute_code");
        let output = host::run_script(host, code)?;
        Ok(json!({ "output": output }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_returned() {
        let mut host = HostState::new();
        let result = ExecuteCodeTool
            .run(&mut host, json!({ "code": "print done" }))
            .unwrap();
        assert_eq!(result["output"], "done\n");
    }

    #[test]
    fn script_failure_surfaces_as_execution_error() {
        let mut host = HostState::new();
        let err = ExecuteCodeTool
            .run(&mut host, json!({ "code": "object.remove Missing" }))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Execution(_)));
    }
}
