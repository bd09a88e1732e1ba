//! Dataset Tools

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{json_result, parse_params};
use crate::ingestion::{DatasetSource, SourceType};
use crate::mcp::context::ToolContext;
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(load_dataset_tool());
}

// ============================================================================
// load_dataset
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoadDatasetParams {
    source: String,
    #[serde(default)]
    source_type: SourceType,
}

#[derive(Debug, Serialize)]
struct DatasetHandle {
    handle: String,
}

fn load_dataset_tool() -> RegisteredTool {
    ToolBuilder::new("load_dataset")
        .description(
            "Load a CSV dataset from a local file, a URL or inline text and return a handle to it",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "source": {
                    "type": "string",
                    "description": "File path, URL, or the CSV text itself"
                },
                "source_type": {
                    "type": "string",
                    "enum": ["file", "url", "inline"],
                    "default": "file",
                    "description": "How to interpret 'source'"
                }
            },
            "required": ["source"]
        }))
        .build(load_dataset_handler)
}

async fn load_dataset_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: LoadDatasetParams = parse_params(params)?;
    let source = DatasetSource::new(params.source, params.source_type);
    let handle = ctx.services.ingestor.load(source).await?;
    json_result(&DatasetHandle { handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::McpError;
    use crate::services::{CoreConfig, Services};
    use crate::ingestion::SizeLimit;
    use serde_json::json;

    fn ctx(limit_mb: u64) -> ToolContext {
        let config = CoreConfig {
            size_limit: SizeLimit::Fixed(limit_mb),
            ..CoreConfig::default()
        };
        ToolContext {
            services: Services::new(&config).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_load_inline_returns_handle() {
        let ctx = ctx(50);
        let result = load_dataset_handler(
            ctx.clone(),
            json!({"source": "x,y\n1,2\n3,4\n5,6", "source_type": "inline"}),
        )
        .await
        .unwrap();
        let handle = result.structured_content.unwrap()["handle"]
            .as_str()
            .unwrap()
            .to_string();
        let dataset = ctx.services.store.get_dataset(&handle).unwrap();
        assert_eq!(dataset.row_count(), 3);
    }

    #[tokio::test]
    async fn test_source_type_defaults_to_file() {
        let err = load_dataset_handler(ctx(50), json!({"source": "/no/such/file.csv"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            McpError::ToolExecutionFailed { ref kind, .. } if kind == "IngestError"
        ));
    }

    #[tokio::test]
    async fn test_oversized_inline_is_payload_too_large() {
        let source = "a\n".repeat(600 * 1024);
        let err = load_dataset_handler(ctx(1), json!({"source": source, "source_type": "inline"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            McpError::ToolExecutionFailed { ref kind, .. } if kind == "PayloadTooLarge"
        ));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_invalid_params() {
        let err = load_dataset_handler(ctx(50), json!({"source_type": "inline"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));

        let err = load_dataset_handler(ctx(50), json!({"source": "a", "source_type": "ftp"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }
}
