//! Suite Authoring Tools

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{json_result, parse_params};
use crate::engine::EXPECTATION_TYPES;
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(create_suite_tool());
    registry.register_tool(add_expectation_tool());
}

// ============================================================================
// create_suite
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateSuiteParams {
    suite_name: String,
    dataset_handle: String,
    #[serde(default)]
    profiler: bool,
}

#[derive(Debug, Serialize)]
struct SuiteHandle {
    suite_name: String,
}

fn create_suite_tool() -> RegisteredTool {
    ToolBuilder::new("create_suite")
        .description(
            "Create (or reset) a named expectation suite, optionally seeded by profiling a dataset",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "suite_name": {
                    "type": "string",
                    "description": "Name of the suite; an existing suite with this name is replaced"
                },
                "dataset_handle": {
                    "type": "string",
                    "description": "Handle returned by load_dataset, used when profiling"
                },
                "profiler": {
                    "type": "boolean",
                    "default": false,
                    "description": "Seed the suite with expectations inferred from the dataset"
                }
            },
            "required": ["suite_name", "dataset_handle"]
        }))
        .build(create_suite_handler)
}

async fn create_suite_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: CreateSuiteParams = parse_params(params)?;
    let suite_name = ctx
        .services
        .suites
        .create_suite(&params.suite_name, &params.dataset_handle, params.profiler)
        .await?;
    json_result(&SuiteHandle { suite_name })
}

// ============================================================================
// add_expectation
// ============================================================================

#[derive(Debug, Deserialize)]
struct AddExpectationParams {
    suite_name: String,
    expectation_type: String,
    #[serde(default)]
    kwargs: Map<String, Value>,
}

fn add_expectation_tool() -> RegisteredTool {
    let expectation_types = EXPECTATION_TYPES;
    ToolBuilder::new("add_expectation")
        .description("Append one expectation (validation rule) to a suite")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "suite_name": {
                    "type": "string",
                    "description": "Suite to append to"
                },
                "expectation_type": {
                    "type": "string",
                    "enum": expectation_types,
                    "description": "Rule kind, e.g. expect_column_values_to_be_in_set"
                },
                "kwargs": {
                    "type": "object",
                    "description": "Rule arguments, e.g. {\"column\": \"x\", \"value_set\": [1, 3, 5]}"
                }
            },
            "required": ["suite_name", "expectation_type", "kwargs"]
        }))
        .build(add_expectation_handler)
}

async fn add_expectation_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: AddExpectationParams = parse_params(params)?;
    let outcome = ctx
        .services
        .suites
        .add_expectation(&params.suite_name, &params.expectation_type, params.kwargs)
        .await?;
    json_result(&outcome)
}
