use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gx_mcp_server::config::{AppConfig, CliConfig, FileConfig, Transport};
use gx_mcp_server::mcp::{run_stdio, server_version, McpDispatcher};
use gx_mcp_server::server::{self, RequestsLoggingLevel};
use gx_mcp_server::services::Services;

#[derive(Parser, Debug)]
#[clap(version, about = "MCP server for CSV data validation")]
struct CliArgs {
    /// Serve MCP over HTTP instead of stdio.
    #[clap(long)]
    pub http: bool,

    /// Print MCP inspector instructions, then serve over HTTP.
    #[clap(long)]
    pub inspect: bool,

    /// The address to bind in HTTP mode.
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,

    /// The port to listen on in HTTP mode.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Requests allowed per client IP per minute.
    #[clap(long, default_value_t = 60)]
    pub rate_limit: u32,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Do not start the metrics server.
    #[clap(long)]
    pub no_metrics: bool,

    /// Add tower-http request tracing.
    #[clap(long)]
    pub trace: bool,

    /// Require HTTP basic auth, given as USER:PASS.
    #[clap(long)]
    pub basic_auth: Option<String>,

    /// Log filter directive, e.g. `debug` or `gx_mcp_server=trace`. Overrides LOG_LEVEL.
    #[clap(long)]
    pub log_level: Option<String>,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Optional TOML config file. Its values override the flags above.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            transport: if self.http {
                Transport::Http
            } else {
                Transport::Stdio
            },
            inspect: self.inspect,
            host: self.host.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            metrics_enabled: !self.no_metrics,
            rate_limit_per_minute: self.rate_limit,
            logging_level: self.logging_level.clone(),
            trace: self.trace,
            basic_auth: self.basic_auth.clone(),
        }
    }
}

fn init_logging(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse(directive)
            .with_context(|| format!("Invalid --log-level: {}", directive))?,
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var("LOG_LEVEL")
            .from_env_lossy(),
    };

    // stdout belongs to the stdio transport
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")
}

fn print_inspector_instructions(host: &str, port: u16) {
    eprintln!("MCP inspector: run `npx @modelcontextprotocol/inspector`");
    eprintln!("then connect with transport \"Streamable HTTP\" to http://{host}:{port}/mcp");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.log_level.as_deref())?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Starting gx-mcp-server {}", server_version());

    let services = Services::new(&app_config.core).context("Failed to initialize services")?;
    let sweeper = services.store.spawn_sweeper(app_config.sweep_interval);
    let dispatcher = Arc::new(McpDispatcher::new(services));

    let result = match app_config.transport {
        Transport::Stdio => {
            tokio::select! {
                result = run_stdio(dispatcher) => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
        Transport::Http => {
            let server_config = app_config.server_config();
            if app_config.inspect {
                print_inspector_instructions(&server_config.host, server_config.port);
            }
            if server_config.metrics_enabled {
                info!("Initializing metrics...");
                server::metrics::init_metrics();
            }
            server::run_server(server_config, dispatcher, shutdown_signal()).await
        }
    };

    sweeper.abort();
    info!("Server stopped");
    result
}
