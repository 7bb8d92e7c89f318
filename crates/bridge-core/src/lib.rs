//! bridge-core: host state, resource abstraction and the main-thread
//! executor queue.
//!
//! The host application is single-threaded; all mutation funnels
//! through the bounded queue in [`executor`] and happens inside one
//! cooperative tick. Everything returned across the boundary is an
//! owned copy.

pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod resources;

pub use config::Settings;
pub use error::BridgeError;
pub use executor::{ExecutionTask, ExecutorHandle, Heartbeat, HostRuntime, TaskState};
pub use host::HostState;
pub use resources::{ResourceHandle, ResourceKind};
