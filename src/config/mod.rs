mod file_config;

pub use file_config::{EngineConfig, FileConfig, IngestionConfig, PolicyConfig, StoreConfig};

use crate::engine::DEFAULT_ENGINE_WORKERS;
use crate::ingestion::{SizeLimit, DEFAULT_FETCH_TIMEOUT};
use crate::server::config::{
    DEFAULT_HOST, DEFAULT_METRICS_PORT, DEFAULT_PORT, DEFAULT_RATE_LIMIT_PER_MINUTE,
};
use crate::server::{BasicAuth, RequestsLoggingLevel, ServerConfig};
use crate::services::CoreConfig;
use crate::store::StoreSettings;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::time::Duration;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub transport: Transport,
    pub inspect: bool,
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub metrics_enabled: bool,
    pub rate_limit_per_minute: u32,
    pub logging_level: RequestsLoggingLevel,
    pub trace: bool,
    pub basic_auth: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            inspect: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            metrics_enabled: true,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            logging_level: RequestsLoggingLevel::default(),
            trace: false,
            basic_auth: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub transport: Transport,
    pub inspect: bool,
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub metrics_enabled: bool,
    pub rate_limit_per_minute: u32,
    pub logging_level: RequestsLoggingLevel,
    pub trace: bool,
    pub basic_auth: Option<String>,

    pub sweep_interval: Duration,
    pub core: CoreConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let inspect = cli.inspect;
        let transport = match file.transport.as_deref() {
            Some(name) => match Transport::from_str(name, true) {
                Ok(transport) => transport,
                Err(_) => bail!("Unknown transport in config file: {}", name),
            },
            None => cli.transport,
        };
        // The inspector only speaks HTTP
        let transport = if inspect { Transport::Http } else { transport };

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let metrics_enabled = file.metrics_enabled.unwrap_or(cli.metrics_enabled);
        let trace = file.trace.unwrap_or(cli.trace);

        let rate_limit_per_minute = file
            .rate_limit_per_minute
            .unwrap_or(cli.rate_limit_per_minute);
        if rate_limit_per_minute == 0 {
            bail!("rate_limit_per_minute must be at least 1");
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let basic_auth = file.basic_auth.or_else(|| cli.basic_auth.clone());
        if let Some(credentials) = &basic_auth {
            if let Err(e) = BasicAuth::parse(credentials) {
                bail!("Invalid basic auth (expected USER:PASS): {}", e);
            }
        }

        let store_file = file.store.unwrap_or_default();
        let store_defaults = StoreSettings::default();
        let store = StoreSettings {
            handle_ttl: match store_file.handle_ttl_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => store_defaults.handle_ttl,
            },
            max_datasets: store_file
                .max_datasets
                .unwrap_or(store_defaults.max_datasets),
            max_results: store_file.max_results.unwrap_or(store_defaults.max_results),
        };
        if store.max_datasets == 0 || store.max_results == 0 {
            bail!("Store capacities must be at least 1");
        }
        let sweep_interval = store_file
            .sweep_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);
        if sweep_interval.is_zero() {
            bail!("sweep_interval_secs must be at least 1");
        }

        let ingestion_file = file.ingestion.unwrap_or_default();
        let size_limit = ingestion_file
            .csv_size_limit_mb
            .map(SizeLimit::Fixed)
            .unwrap_or(SizeLimit::FromEnv);
        let fetch_timeout = ingestion_file
            .fetch_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);

        let engine_file = file.engine.unwrap_or_default();
        let engine_workers = engine_file.workers.unwrap_or(DEFAULT_ENGINE_WORKERS);
        if engine_workers == 0 {
            bail!("engine workers must be at least 1");
        }

        let policy_file = file.policy.unwrap_or_default();
        let core_defaults = CoreConfig::default();
        let core = CoreConfig {
            store,
            size_limit,
            fetch_timeout,
            engine_workers,
            profiler_enabled: engine_file
                .profiler_enabled
                .unwrap_or(core_defaults.profiler_enabled),
            allow_missing_dataset_fallback: policy_file
                .allow_missing_dataset_fallback
                .unwrap_or(core_defaults.allow_missing_dataset_fallback),
            strict_add_expectation: policy_file
                .strict_add_expectation
                .unwrap_or(core_defaults.strict_add_expectation),
        };

        Ok(Self {
            transport,
            inspect,
            host,
            port,
            metrics_port,
            metrics_enabled,
            rate_limit_per_minute,
            logging_level,
            trace,
            basic_auth,
            sweep_interval,
            core,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        // Inline CSV travels JSON-escaped inside the request body
        let max_body_bytes = (self.core.size_limit.resolve_bytes() as usize)
            .saturating_mul(2)
            .saturating_add(1024 * 1024);
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            host: self.host.clone(),
            port: self.port,
            rate_limit_per_minute: self.rate_limit_per_minute,
            trace: self.trace,
            basic_auth: self.basic_auth.clone(),
            metrics_port: self.metrics_port,
            metrics_enabled: self.metrics_enabled,
            max_body_bytes,
        }
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
