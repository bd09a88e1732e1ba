use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all server metrics
const PREFIX: &str = "gx_mcp";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Tool Metrics
    pub static ref TOOL_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_tool_calls_total"), "Total MCP tool calls by outcome"),
        &["tool", "outcome"]
    ).expect("Failed to create tool_calls_total metric");

    pub static ref TOOL_CALL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_tool_call_duration_seconds"),
            "MCP tool call duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["tool"]
    ).expect("Failed to create tool_call_duration_seconds metric");

    // Rate Limiting / Auth Metrics
    pub static ref RATE_LIMIT_HITS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_rate_limit_hits_total"), "Rate limit violations"),
        &["endpoint"]
    ).expect("Failed to create rate_limit_hits_total metric");

    pub static ref AUTH_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_auth_failures_total"),
        "Requests rejected by basic authentication"
    ).expect("Failed to create auth_failures_total metric");

    // Artifact Store Metrics
    pub static ref STORE_ENTRIES: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_store_entries"), "Entries held by the artifact store"),
        &["namespace"]
    ).expect("Failed to create store_entries metric");

    pub static ref STORE_EVICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_store_evictions_total"), "Entries evicted from the artifact store"),
        &["namespace"]
    ).expect("Failed to create store_evictions_total metric");

    // Workflow Metrics
    pub static ref BYTES_INGESTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_bytes_ingested_total"), "Dataset bytes ingested by source type"),
        &["source_type"]
    ).expect("Failed to create bytes_ingested_total metric");

    pub static ref CHECKPOINT_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_checkpoint_runs_total"), "Checkpoint runs by outcome"),
        &["outcome"]
    ).expect("Failed to create checkpoint_runs_total metric");

    pub static ref AUTO_CREATED_SUITES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_auto_created_suites_total"),
        "Suites created implicitly by add_expectation"
    ).expect("Failed to create auto_created_suites_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(TOOL_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TOOL_CALL_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(RATE_LIMIT_HITS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STORE_ENTRIES.clone()));
    let _ = REGISTRY.register(Box::new(STORE_EVICTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BYTES_INGESTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CHECKPOINT_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTO_CREATED_SUITES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Collapses a request path into one of a fixed set of labels, so arbitrary
/// client paths cannot create new series.
pub fn categorize_endpoint(path: &str) -> &'static str {
    match path {
        "/mcp" => "/mcp",
        "/health" => "/health",
        "/mcp/health" => "/mcp/health",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = categorize_endpoint(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_tool_call(tool: &str, outcome: &str, duration: Duration) {
    TOOL_CALLS_TOTAL.with_label_values(&[tool, outcome]).inc();
    TOOL_CALL_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(duration.as_secs_f64());
}

pub fn record_rate_limit_hit(path: &str) {
    RATE_LIMIT_HITS_TOTAL
        .with_label_values(&[categorize_endpoint(path)])
        .inc();
}

pub fn record_auth_failure() {
    AUTH_FAILURES_TOTAL.inc();
}

pub fn set_store_entries(namespace: &str, count: usize) {
    STORE_ENTRIES
        .with_label_values(&[namespace])
        .set(count as f64);
}

pub fn record_store_evictions(namespace: &str, count: usize) {
    STORE_EVICTIONS_TOTAL
        .with_label_values(&[namespace])
        .inc_by(count as f64);
}

pub fn record_bytes_ingested(source_type: &str, bytes: usize) {
    BYTES_INGESTED_TOTAL
        .with_label_values(&[source_type])
        .inc_by(bytes as f64);
}

pub fn record_checkpoint_run(outcome: &str) {
    CHECKPOINT_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_auto_created_suite() {
    AUTO_CREATED_SUITES_TOTAL.inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
