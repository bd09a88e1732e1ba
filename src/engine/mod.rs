//! Rule evaluation engine.
//!
//! Suites, checkpoint runs and the profiler talk to the engine only through
//! [`ValidationEngine`]; [`BuiltinEngine`] is the in-process implementation.
//! Engine calls are synchronous and are dispatched through [`EnginePool`].

mod builtin;
mod expectation;
mod pool;
mod suite_context;

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::{Dataset, TabularError, ValidationResultDetail};

pub use builtin::{evaluate_dataset, BuiltinEngine};
pub use expectation::{Expectation, Rule, EXPECTATION_TYPES};
pub use pool::{EnginePool, DEFAULT_ENGINE_WORKERS};
pub use suite_context::{ExpectationSuite, SuiteContext, SuiteLockGuard};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown expectation type: {0}")]
    UnknownExpectationType(String),

    #[error("Invalid arguments for {expectation_type}: {reason}")]
    InvalidExpectationArgs {
        expectation_type: String,
        reason: String,
    },

    #[error("Profiling unavailable: {0}")]
    ProfilingUnavailable(String),

    #[error("Failed to load dataset: {0}")]
    Dataset(#[from] TabularError),

    #[error("Engine worker failed: {0}")]
    WorkerFailed(String),
}

pub trait ValidationEngine: Send + Sync {
    /// Rule kinds accepted by [`ValidationEngine::build_expectation`].
    fn expectation_types(&self) -> Vec<&'static str>;

    fn build_expectation(
        &self,
        expectation_type: &str,
        kwargs: Map<String, Value>,
    ) -> Result<Expectation, EngineError>;

    /// Evaluates every rule of `suite` against the CSV file at `dataset_path`.
    fn evaluate(
        &self,
        suite: &ExpectationSuite,
        dataset_path: &Path,
    ) -> Result<ValidationResultDetail, EngineError>;

    /// Derives a starter rule set from a dataset.
    fn profile(&self, dataset: &Dataset) -> Result<Vec<Expectation>, EngineError>;
}
