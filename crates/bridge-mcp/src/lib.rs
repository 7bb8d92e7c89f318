//! bridge-mcp: the MCP bridge between remote AI agents and a
//! single-threaded, GUI-owning host application.
//!
//! Envelopes arrive over SSE or WebSocket, pass through the dispatcher
//! and tool registry, and anything touching host state crosses into
//! the host tick loop as an ExecutionTask on the bounded queue in
//! bridge-core. Results flow back asynchronously to the originating
//! session.

pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod tools;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use protocol::{
    RequestEnvelope, ResponseEnvelope, RpcError, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
};
pub use registry::{HostTool, ImmediateTool, ToolDescriptor, ToolRegistry};
pub use session::{SessionRegistry, SessionState, TransportKind};
pub use transport::AppState;
