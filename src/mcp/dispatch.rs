//! Transport-agnostic MCP message handling.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use super::context::ToolContext;
use super::protocol::{
    methods, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse, PingResult,
    RequestId, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCapability, ToolsListResult,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use super::registry::McpRegistry;
use crate::server::metrics;
use crate::services::Services;

pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// Per-connection protocol state.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    initialized: bool,
    require_initialize: bool,
}

impl Session {
    /// A long-lived stream where `initialize` must come first.
    pub fn stateful() -> Self {
        Self {
            initialized: false,
            require_initialize: true,
        }
    }

    /// One message per connection; tools are callable right away.
    pub fn stateless() -> Self {
        Self {
            initialized: false,
            require_initialize: false,
        }
    }

    fn ready(&self) -> bool {
        self.initialized || !self.require_initialize
    }
}

/// Outcome of [`McpDispatcher::route`].
pub enum Routed {
    /// Answered in place. `None` for notifications.
    Reply(Option<McpResponse>),
    ToolCall(PendingCall),
}

/// A validated `tools/call` waiting to run.
pub struct PendingCall {
    id: RequestId,
    request: McpRequest,
}

pub struct McpDispatcher {
    registry: Arc<McpRegistry>,
    services: Services,
}

impl McpDispatcher {
    pub fn new(services: Services) -> Self {
        let mut registry = McpRegistry::new();
        super::tools::register_all_tools(&mut registry);
        info!("MCP registry initialized with {} tools", registry.tool_count());

        Self {
            registry: Arc::new(registry),
            services,
        }
    }

    /// Handles one raw message. Returns `None` for notifications.
    pub async fn handle_message(&self, text: &str, session: &mut Session) -> Option<McpResponse> {
        match self.route(text, session) {
            Routed::Reply(response) => response,
            Routed::ToolCall(call) => Some(self.call_tool(call).await),
        }
    }

    /// Parses a message and applies it to `session`. Everything except
    /// `tools/call` is answered right here, so session changes happen in
    /// message order even when tool calls run concurrently.
    pub fn route(&self, text: &str, session: &mut Session) -> Routed {
        let request: McpRequest = match serde_json::from_str(text) {
            Ok(req) => req,
            Err(e) => {
                return Routed::Reply(Some(McpResponse::error(
                    None,
                    McpError::ParseError(e.to_string()),
                )));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Routed::Reply(Some(McpResponse::error(
                request.id,
                McpError::InvalidRequest(format!("unsupported jsonrpc version {}", request.jsonrpc)),
            )));
        }

        let request_id = match request.id.clone() {
            Some(id) => id,
            None => {
                if request.method != methods::INITIALIZED {
                    debug!("Ignoring notification {}", request.method);
                }
                return Routed::Reply(None);
            }
        };

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(&request, session),
            methods::PING => to_value(PingResult {}),
            methods::TOOLS_LIST | methods::TOOLS_CALL if !session.ready() => {
                Err(McpError::InvalidRequest("Not initialized".to_string()))
            }
            methods::TOOLS_LIST => to_value(ToolsListResult {
                tools: self.registry.list_tools(),
            }),
            methods::TOOLS_CALL => {
                return Routed::ToolCall(PendingCall {
                    id: request_id,
                    request,
                })
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        Routed::Reply(Some(match result {
            Ok(value) => McpResponse::success(request_id, value),
            Err(error) => McpResponse::error(Some(request_id), error),
        }))
    }

    /// Runs a routed `tools/call` to completion.
    pub async fn call_tool(&self, call: PendingCall) -> McpResponse {
        match self.handle_tools_call(&call.request).await {
            Ok(value) => McpResponse::success(call.id, value),
            Err(error) => McpResponse::error(Some(call.id), error),
        }
    }

    fn handle_initialize(
        &self,
        request: &McpRequest,
        session: &mut Session,
    ) -> Result<Value, McpError> {
        let params: Option<InitializeParams> = request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        if let Some(params) = &params {
            let client = params
                .client_info
                .as_ref()
                .map(|c| format!("{} {}", c.name, c.version))
                .unwrap_or_else(|| "unknown client".to_string());
            info!(
                "MCP initialize from {} (protocol {})",
                client.trim(),
                params.protocol_version
            );
        }

        session.initialized = true;

        to_value(InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: None },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: server_version(),
            },
        })
    }

    async fn handle_tools_call(&self, request: &McpRequest) -> Result<Value, McpError> {
        let params: ToolsCallParams = request
            .params
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

        let tool = self
            .registry
            .get_tool(&params.name)
            .ok_or_else(|| McpError::MethodNotFound(format!("Unknown tool: {}", params.name)))?;

        let ctx = ToolContext {
            services: self.services.clone(),
        };
        let arguments = params.arguments.unwrap_or(serde_json::json!({}));

        let start = Instant::now();
        let span = info_span!("tool_call", tool = %params.name);
        let result = (tool.handler)(ctx, arguments).instrument(span).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                debug!("Tool {} succeeded in {:?}", params.name, elapsed);
                metrics::record_tool_call(&params.name, "ok", elapsed);
            }
            Err(e) => {
                warn!("Tool {} failed: {}", params.name, e.message());
                metrics::record_tool_call(&params.name, e.label(), elapsed);
            }
        }

        to_value(result?)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CoreConfig;
    use serde_json::json;

    fn dispatcher() -> McpDispatcher {
        McpDispatcher::new(Services::new(&CoreConfig::default()).unwrap())
    }

    async fn call(d: &McpDispatcher, session: &mut Session, message: Value) -> Value {
        let response = d
            .handle_message(&message.to_string(), session)
            .await
            .expect("expected a response");
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let d = dispatcher();
        let mut session = Session::stateful();
        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }}),
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "gx-mcp-server");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_stateful_session_requires_initialize() {
        let d = dispatcher();
        let mut session = Session::stateful();
        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32600);

        call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"}),
        )
        .await;
        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}),
        )
        .await;
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_tools_list_names() {
        let d = dispatcher();
        let mut session = Session::stateless();
        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}),
        )
        .await;
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "add_expectation",
                "create_suite",
                "get_validation_result",
                "load_dataset",
                "run_checkpoint"
            ]
        );
        assert_eq!(response["id"], "a");
    }

    #[tokio::test]
    async fn test_route_defers_only_tool_calls() {
        let d = dispatcher();
        let mut session = Session::stateful();

        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}).to_string();
        assert!(matches!(d.route(&message, &mut session), Routed::Reply(Some(_))));
        assert!(session.ready());

        let message = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
            "name": "get_validation_result",
            "arguments": {"validation_id": "missing"}
        }})
        .to_string();
        let Routed::ToolCall(call) = d.route(&message, &mut session) else {
            panic!("tools/call should be deferred");
        };
        let response = d.call_tool(call).await;
        assert_eq!(response.id, Some(RequestId::Number(2)));
        assert!(response.result.is_some());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let d = dispatcher();
        let mut session = Session::stateful();
        let response = d
            .handle_message(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                &mut session,
            )
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let d = dispatcher();
        let mut session = Session::stateless();

        let response = d.handle_message("{not json", &mut session).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32700);

        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32601);

        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "nope"}}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32601);

        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_tool_error_surfaces_kind() {
        let d = dispatcher();
        let mut session = Session::stateless();
        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {
                "name": "load_dataset",
                "arguments": {"source": "", "source_type": "inline"}
            }}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32005);
        assert_eq!(response["error"]["data"]["kind"], "IngestError");
    }

    #[tokio::test]
    async fn test_tool_call_returns_structured_content() {
        let d = dispatcher();
        let mut session = Session::stateless();
        let response = call(
            &d,
            &mut session,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {
                "name": "get_validation_result",
                "arguments": {"validation_id": "missing"}
            }}),
        )
        .await;
        let result = &response["result"];
        assert_eq!(result["structuredContent"]["success"], false);
        assert_eq!(result["content"][0]["type"], "text");
    }
}
