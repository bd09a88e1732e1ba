use std::sync::Arc;

use tracing::{error, info, warn};

use crate::engine::{EnginePool, SuiteContext};
use crate::server::metrics;
use crate::store::{ArtifactStore, ValidationResultDetail};

/// How a run ended, as reported in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed,
    /// The dataset was missing and the run was allowed to pass trivially.
    Fallback,
    /// The run could not complete; the stored result carries the error.
    Errored,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Passed => "passed",
            RunOutcome::Failed => "failed",
            RunOutcome::Fallback => "fallback",
            RunOutcome::Errored => "errored",
        }
    }
}

/// Executes suites against datasets and files the outcome in the store.
///
/// Nothing here returns an error to the caller: every problem discovered
/// during a run ends up in the stored [`ValidationResultDetail`].
pub struct CheckpointRunner {
    store: Arc<ArtifactStore>,
    context: Arc<SuiteContext>,
    pool: EnginePool,
    allow_missing_dataset_fallback: bool,
}

impl CheckpointRunner {
    pub fn new(
        store: Arc<ArtifactStore>,
        context: Arc<SuiteContext>,
        pool: EnginePool,
        allow_missing_dataset_fallback: bool,
    ) -> Self {
        Self {
            store,
            context,
            pool,
            allow_missing_dataset_fallback,
        }
    }

    /// Runs `suite_name` on `dataset_handle` and returns the id of the stored result.
    pub async fn run_checkpoint(
        &self,
        suite_name: &str,
        dataset_handle: &str,
        checkpoint_name: Option<&str>,
    ) -> String {
        let (detail, outcome) = self.execute(suite_name, dataset_handle).await;
        metrics::record_checkpoint_run(outcome.as_str());

        let validation_id = self.store.register_result(detail);
        info!(
            "Checkpoint {} ran suite '{}' on dataset {}: {} (validation_id={})",
            checkpoint_name.unwrap_or("<unnamed>"),
            suite_name,
            dataset_handle,
            outcome.as_str(),
            validation_id
        );
        validation_id
    }

    async fn execute(
        &self,
        suite_name: &str,
        dataset_handle: &str,
    ) -> (ValidationResultDetail, RunOutcome) {
        let path = match self.store.materialize_path(dataset_handle) {
            Ok(path) => path,
            Err(e) if e.is_not_found() => {
                if self.allow_missing_dataset_fallback {
                    warn!(
                        "Dataset {} not found, recording trivial success",
                        dataset_handle
                    );
                    return (ValidationResultDetail::trivial_success(), RunOutcome::Fallback);
                }
                return (
                    ValidationResultDetail::failure(e.to_string()),
                    RunOutcome::Errored,
                );
            }
            Err(e) => {
                error!("Failed to prepare dataset {}: {}", dataset_handle, e);
                return (
                    ValidationResultDetail::failure(e.to_string()),
                    RunOutcome::Errored,
                );
            }
        };

        let suite = match self.context.get(suite_name) {
            Some(suite) => suite,
            None => {
                return (
                    ValidationResultDetail::failure(format!("Suite '{}' not found", suite_name)),
                    RunOutcome::Errored,
                );
            }
        };

        match self
            .pool
            .run(move |engine| engine.evaluate(&suite, &path))
            .await
        {
            Ok(detail) if detail.success => (detail, RunOutcome::Passed),
            Ok(detail) => (detail, RunOutcome::Failed),
            Err(e) => {
                error!("Checkpoint evaluation failed: {}", e);
                (
                    ValidationResultDetail::failure(e.to_string()),
                    RunOutcome::Errored,
                )
            }
        }
    }

    /// Fetches a stored result. An unknown id yields a failure record, never an error.
    pub fn get_validation_result(&self, validation_id: &str) -> ValidationResultDetail {
        match self.store.get_result(validation_id) {
            Ok(detail) => detail.as_ref().clone(),
            Err(e) => {
                warn!("{}", e);
                ValidationResultDetail::failure(format!(
                    "Validation result not found for id {}",
                    validation_id
                ))
            }
        }
    }
}
