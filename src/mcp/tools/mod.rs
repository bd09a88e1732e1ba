//! MCP Tools
//!
//! The five data-validation tools: dataset loading, suite authoring,
//! checkpoint runs and result retrieval.

pub mod datasets;
pub mod expectations;
pub mod validation;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::protocol::{McpError, ToolsCallResult};
use super::registry::{McpRegistry, ToolResult};
use crate::ingestion::IngestError;
use crate::suites::SuiteError;

/// Register all tools with the registry
pub fn register_all_tools(registry: &mut McpRegistry) {
    datasets::register_tools(registry);
    expectations::register_tools(registry);
    validation::register_tools(registry);
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn json_result<T: Serialize>(value: &T) -> ToolResult {
    ToolsCallResult::json(value).map_err(|e| McpError::InternalError(e.to_string()))
}

impl From<IngestError> for McpError {
    fn from(err: IngestError) -> Self {
        McpError::tool(err.kind(), err.to_string())
    }
}

impl From<SuiteError> for McpError {
    fn from(err: SuiteError) -> Self {
        match err {
            SuiteError::Engine(message) => McpError::InternalError(message),
            other => McpError::tool(other.kind(), other.to_string()),
        }
    }
}
