use super::RequestsLoggingLevel;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_METRICS_PORT: u16 = 9090;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;
/// Leaves room for JSON escaping around an inline CSV at the default limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 101 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub host: String,
    pub port: u16,
    /// Requests allowed per client IP in each one minute window.
    pub rate_limit_per_minute: u32,
    /// Wraps the router in a `TraceLayer` when set.
    pub trace: bool,
    /// `user:password` expected in the `Authorization: Basic` header.
    pub basic_auth: Option<String>,
    pub metrics_port: u16,
    pub metrics_enabled: bool,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            trace: false,
            basic_auth: None,
            metrics_port: DEFAULT_METRICS_PORT,
            metrics_enabled: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
