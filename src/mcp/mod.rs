//! Model Context Protocol
//!
//! JSON-RPC message types, the tool registry, the transport-agnostic
//! dispatcher and its two transports (HTTP and STDIO).

pub mod context;
pub mod dispatch;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod stdio;
pub mod tools;

pub use dispatch::{server_version, McpDispatcher, PendingCall, Routed, Session};
pub use handler::mcp_post_handler;
pub use stdio::run_stdio;
