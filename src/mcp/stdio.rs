//! MCP over STDIO
//!
//! Newline-delimited JSON-RPC on stdin/stdout. One stream is one session, so
//! `initialize` has to arrive before any tool call. Logs never go to stdout.
//!
//! Tool calls run on their own tasks and answer in completion order; every
//! other message is handled in arrival order.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info};

use super::dispatch::{McpDispatcher, Routed, Session};
use super::protocol::McpResponse;

pub async fn run_stdio(dispatcher: Arc<McpDispatcher>) -> anyhow::Result<()> {
    info!("Serving MCP over stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(dispatcher, stdin, stdout).await
}

/// Reads messages until EOF, then waits for in-flight tool calls before
/// returning. Responses are written one per line by this task only.
pub async fn serve_lines<R, W>(
    dispatcher: Arc<McpDispatcher>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session::stateful();
    let mut lines = reader.lines();
    let (tx, mut rx) = mpsc::unbounded_channel::<McpResponse>();
    // dropped at EOF so the channel closes once the last tool call answers
    let mut tx = Some(tx);

    loop {
        tokio::select! {
            line = lines.next_line(), if tx.is_some() => {
                match line? {
                    Some(line) => {
                        if let Some(sender) = &tx {
                            dispatch_line(&dispatcher, line.trim(), &mut session, sender);
                        }
                    }
                    None => {
                        debug!("stdin closed, draining in-flight calls");
                        tx = None;
                    }
                }
            }
            Some(response) = rx.recv() => write_response(&mut writer, &response).await?,
            else => break,
        }
    }

    debug!("Leaving stdio loop");
    Ok(())
}

fn dispatch_line(
    dispatcher: &Arc<McpDispatcher>,
    line: &str,
    session: &mut Session,
    responses: &UnboundedSender<McpResponse>,
) {
    if line.is_empty() {
        return;
    }

    match dispatcher.route(line, session) {
        Routed::Reply(Some(response)) => {
            let _ = responses.send(response);
        }
        Routed::Reply(None) => {}
        Routed::ToolCall(call) => {
            let dispatcher = Arc::clone(dispatcher);
            let responses = responses.clone();
            tokio::spawn(async move {
                let response = dispatcher.call_tool(call).await;
                if responses.send(response).is_err() {
                    debug!("stdio writer gone, dropping tool response");
                }
            });
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &McpResponse) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match serde_json::to_string(response) {
        Ok(json) => {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Err(e) => error!("Failed to serialize MCP response: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CoreConfig, Services};
    use axum::{routing::get, Router};
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    async fn roundtrip(messages: &[Value]) -> Vec<Value> {
        let dispatcher = Arc::new(McpDispatcher::new(
            Services::new(&CoreConfig::default()).unwrap(),
        ));
        let input: String = messages.iter().map(|m| format!("{}\n\n", m)).collect();
        let mut output = Vec::new();
        serve_lines(dispatcher, input.as_bytes(), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Serves a small CSV at `/slow.csv` after `delay`.
    async fn slow_csv_url(delay: Duration) -> String {
        let app = Router::new().route(
            "/slow.csv",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "x,y\n1,2\n"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/slow.csv", addr)
    }

    #[tokio::test]
    async fn test_full_session_over_lines() {
        let responses = roundtrip(&[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
                "name": "load_dataset",
                "arguments": {"source": "x,y\n1,2", "source_type": "inline"}
            }}),
        ])
        .await;

        // the notification produces no line
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert!(responses[1]["result"]["structuredContent"]["handle"].is_string());
    }

    #[tokio::test]
    async fn test_tools_before_initialize_are_rejected() {
        let responses = roundtrip(&[json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})]).await;
        assert_eq!(responses[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_slow_tool_call_does_not_block_ping() {
        let url = slow_csv_url(Duration::from_millis(1500)).await;
        let started = Instant::now();
        let responses = roundtrip(&[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
                "name": "load_dataset",
                "arguments": {"source": url, "source_type": "url"}
            }}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        ])
        .await;

        // EOF waits for the slow call, which still answers
        assert!(started.elapsed() >= Duration::from_millis(1500));
        let ids: Vec<Value> = responses.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3), json!(2)]);
        assert!(responses[2]["result"]["structuredContent"]["handle"].is_string());
    }
}
