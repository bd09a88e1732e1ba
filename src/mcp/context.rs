//! MCP Tool Execution Context
//!
//! Provides access to the core services for tool implementations.

use crate::services::Services;

/// Context provided to tool handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    pub services: Services,
}
