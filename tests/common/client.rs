//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and speaks JSON-RPC to `POST /mcp`.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
    basic_auth: Option<(String, String)>,
    next_id: AtomicU64,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            basic_auth: None,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_basic_auth(mut self, user: &str, pass: &str) -> Self {
        self.basic_auth = Some((user.to_string(), pass.to_string()));
        self
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Posts a raw JSON-RPC message.
    pub async fn post_mcp(&self, message: &Value) -> Response {
        let mut request = self
            .client
            .post(format!("{}/mcp", self.base_url))
            .json(message);
        if let Some((user, pass)) = &self.basic_auth {
            request = request.basic_auth(user, Some(pass));
        }
        request.send().await.expect("POST /mcp failed")
    }

    /// Sends a request and returns the JSON-RPC envelope.
    pub async fn rpc(&self, method: &str, params: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .post_mcp(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .await;
        assert!(
            response.status().is_success(),
            "unexpected HTTP status {}",
            response.status()
        );
        response.json().await.expect("response was not JSON")
    }

    /// Calls a tool and returns either its structured result or the error object.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, Value> {
        let envelope = self
            .rpc("tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        match envelope.get("error") {
            Some(error) => Err(error.clone()),
            None => Ok(envelope["result"]["structuredContent"].clone()),
        }
    }

    pub async fn load_inline(&self, csv: &str) -> String {
        let result = self
            .call_tool(
                "load_dataset",
                json!({"source": csv, "source_type": "inline"}),
            )
            .await
            .expect("load_dataset failed");
        result["handle"].as_str().unwrap().to_string()
    }

    pub async fn create_suite(&self, suite_name: &str, dataset_handle: &str, profiler: bool) {
        self.call_tool(
            "create_suite",
            json!({
                "suite_name": suite_name,
                "dataset_handle": dataset_handle,
                "profiler": profiler,
            }),
        )
        .await
        .expect("create_suite failed");
    }

    pub async fn add_expectation(
        &self,
        suite_name: &str,
        expectation_type: &str,
        kwargs: Value,
    ) -> Result<Value, Value> {
        self.call_tool(
            "add_expectation",
            json!({
                "suite_name": suite_name,
                "expectation_type": expectation_type,
                "kwargs": kwargs,
            }),
        )
        .await
    }

    pub async fn run_checkpoint(&self, suite_name: &str, dataset_handle: &str) -> String {
        let result = self
            .call_tool(
                "run_checkpoint",
                json!({"suite_name": suite_name, "dataset_handle": dataset_handle}),
            )
            .await
            .expect("run_checkpoint failed");
        result["validation_id"].as_str().unwrap().to_string()
    }

    pub async fn get_validation_result(&self, validation_id: &str) -> Value {
        self.call_tool(
            "get_validation_result",
            json!({"validation_id": validation_id}),
        )
        .await
        .expect("get_validation_result failed")
    }
}
