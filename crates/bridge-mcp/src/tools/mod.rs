//! Built-in tools, registered once at startup.

pub mod context;
pub mod import;
pub mod resources;
pub mod script;
pub mod search;

use std::sync::Arc;

use anyhow::Result;
use bridge_retrieval::DocumentIndex;
use tracing::info;

use crate::registry::{ToolDescriptor, ToolRegistry};

/// Register every built-in tool. Host tools run inside the tick
/// window; the search tool touches no host state and runs immediately.
pub fn register_builtin(registry: &mut ToolRegistry, index: Arc<DocumentIndex>) -> Result<()> {
    registry.register(ToolDescriptor::host(Arc::new(context::GetContextTool)))?;
    registry.register(ToolDescriptor::host(Arc::new(resources::GetResourcesTool)))?;
    registry.register(ToolDescriptor::host(Arc::new(resources::GetResourceTool)))?;
    registry.register(ToolDescriptor::host(Arc::new(resources::SetResourceTool)))?;
    registry.register(ToolDescriptor::host(Arc::new(script::ExecuteCodeTool)))?;
    registry.register(ToolDescriptor::host(Arc::new(import::ImportFileTool)))?;
    registry.register(ToolDescriptor::immediate(Arc::new(
        search::SearchDocumentsTool::new(index),
    )))?;

    info!(tools = registry.len(), "registered built-in tools");
    Ok(())
}
