use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub transport: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub metrics_enabled: Option<bool>,
    pub rate_limit_per_minute: Option<u32>,
    pub logging_level: Option<String>,
    pub trace: Option<bool>,
    pub basic_auth: Option<String>,

    // Component tables
    pub store: Option<StoreConfig>,
    pub ingestion: Option<IngestionConfig>,
    pub engine: Option<EngineConfig>,
    pub policy: Option<PolicyConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Zero disables expiry.
    pub handle_ttl_secs: Option<u64>,
    pub max_datasets: Option<usize>,
    pub max_results: Option<usize>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IngestionConfig {
    pub csv_size_limit_mb: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub workers: Option<usize>,
    pub profiler_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow_missing_dataset_fallback: Option<bool>,
    pub strict_add_expectation: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
