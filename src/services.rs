//! Wiring of the core components.
//!
//! [`Services`] is built once at start-up and handed to every transport and
//! tool handler. There is no ambient global state besides metrics.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::checkpoint::CheckpointRunner;
use crate::engine::{BuiltinEngine, EnginePool, SuiteContext, DEFAULT_ENGINE_WORKERS};
use crate::ingestion::{DatasetIngestor, SizeLimit, DEFAULT_FETCH_TIMEOUT};
use crate::store::{ArtifactStore, StoreSettings};
use crate::suites::SuiteManager;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub store: StoreSettings,
    pub size_limit: SizeLimit,
    pub fetch_timeout: Duration,
    pub engine_workers: usize,
    pub profiler_enabled: bool,
    pub allow_missing_dataset_fallback: bool,
    pub strict_add_expectation: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            size_limit: SizeLimit::FromEnv,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            engine_workers: DEFAULT_ENGINE_WORKERS,
            profiler_enabled: true,
            allow_missing_dataset_fallback: true,
            strict_add_expectation: false,
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub store: Arc<ArtifactStore>,
    pub ingestor: Arc<DatasetIngestor>,
    pub suites: Arc<SuiteManager>,
    pub runner: Arc<CheckpointRunner>,
    pub engine: EnginePool,
}

impl Services {
    pub fn new(config: &CoreConfig) -> io::Result<Self> {
        let store = Arc::new(ArtifactStore::new(config.store.clone())?);
        let engine = EnginePool::new(
            Arc::new(BuiltinEngine::new(config.profiler_enabled)),
            config.engine_workers,
        );
        let context = Arc::new(SuiteContext::new());

        let ingestor = Arc::new(DatasetIngestor::new(
            store.clone(),
            config.size_limit,
            config.fetch_timeout,
        ));
        let suites = Arc::new(SuiteManager::new(
            context.clone(),
            store.clone(),
            engine.clone(),
            config.strict_add_expectation,
        ));
        let runner = Arc::new(CheckpointRunner::new(
            store.clone(),
            context,
            engine.clone(),
            config.allow_missing_dataset_fallback,
        ));

        info!(
            "Core ready: {} engine workers, profiler {}, missing-dataset fallback {}, strict add_expectation {}",
            engine.workers(),
            if config.profiler_enabled { "on" } else { "off" },
            config.allow_missing_dataset_fallback,
            config.strict_add_expectation
        );

        Ok(Self {
            store,
            ingestor,
            suites,
            runner,
            engine,
        })
    }
}
