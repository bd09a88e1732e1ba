use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{EngineError, EnginePool, ExpectationSuite, SuiteContext};
use crate::server::metrics;
use crate::store::ArtifactStore;

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Failed to create suite: {0}")]
    SuiteCreation(String),

    #[error("Unknown expectation type: {0}")]
    UnknownExpectationType(String),

    #[error("Invalid arguments for {expectation_type}: {reason}")]
    InvalidExpectationArgs {
        expectation_type: String,
        reason: String,
    },

    #[error("Suite '{0}' not found")]
    SuiteNotFound(String),

    #[error("Engine failure: {0}")]
    Engine(String),
}

impl SuiteError {
    pub fn kind(&self) -> &'static str {
        match self {
            SuiteError::SuiteCreation(_) => "SuiteCreationError",
            SuiteError::UnknownExpectationType(_) => "UnknownExpectationType",
            SuiteError::InvalidExpectationArgs { .. } => "InvalidExpectationArgs",
            SuiteError::SuiteNotFound(_) => "SuiteNotFound",
            SuiteError::Engine(_) => "EngineError",
        }
    }
}

impl From<EngineError> for SuiteError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownExpectationType(name) => SuiteError::UnknownExpectationType(name),
            EngineError::InvalidExpectationArgs {
                expectation_type,
                reason,
            } => SuiteError::InvalidExpectationArgs {
                expectation_type,
                reason,
            },
            other => SuiteError::Engine(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddExpectationOutcome {
    pub success: bool,
    pub message: String,
}

/// Authoring side of suites: creation, optional profiling and rule appends.
pub struct SuiteManager {
    context: Arc<SuiteContext>,
    store: Arc<ArtifactStore>,
    pool: EnginePool,
    strict_add_expectation: bool,
}

impl SuiteManager {
    pub fn new(
        context: Arc<SuiteContext>,
        store: Arc<ArtifactStore>,
        pool: EnginePool,
        strict_add_expectation: bool,
    ) -> Self {
        Self {
            context,
            store,
            pool,
            strict_add_expectation,
        }
    }

    /// Creates (or empties) `suite_name`. With `profile`, the suite is seeded
    /// from the dataset on a best-effort basis. Returns the suite name.
    pub async fn create_suite(
        &self,
        suite_name: &str,
        dataset_handle: &str,
        profile: bool,
    ) -> Result<String, SuiteError> {
        if suite_name.trim().is_empty() {
            return Err(SuiteError::SuiteCreation(
                "suite name must not be empty".to_string(),
            ));
        }

        {
            let _guard = self.context.lock_suite(suite_name).await;
            self.context.add_or_update(ExpectationSuite::new(suite_name));
        }
        info!(
            "Created suite '{}' ({} suites defined)",
            suite_name,
            self.context.list().len()
        );

        if profile {
            self.seed_from_profile(suite_name, dataset_handle).await;
        }
        Ok(suite_name.to_string())
    }

    async fn seed_from_profile(&self, suite_name: &str, dataset_handle: &str) {
        let dataset = match self.store.get_dataset(dataset_handle) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(
                    "Profiling skipped for suite '{}': {}; suite left empty",
                    suite_name, e
                );
                return;
            }
        };

        let profiled = self.pool.run(move |engine| engine.profile(&dataset)).await;
        let expectations = match profiled {
            Ok(expectations) => expectations,
            Err(e) => {
                warn!(
                    "Profiling unavailable for suite '{}': {}; suite left empty",
                    suite_name, e
                );
                return;
            }
        };

        let count = expectations.len();
        let _guard = self.context.lock_suite(suite_name).await;
        let mut suite = self
            .context
            .get(suite_name)
            .unwrap_or_else(|| ExpectationSuite::new(suite_name));
        suite.expectations.extend(expectations);
        self.context.add_or_update(suite);
        info!(
            "Profiled suite '{}' with {} expectations from dataset {}",
            suite_name, count, dataset_handle
        );
    }

    /// Appends one rule to `suite_name`, creating the suite when it is missing
    /// unless strict mode is on.
    pub async fn add_expectation(
        &self,
        suite_name: &str,
        expectation_type: &str,
        kwargs: Map<String, Value>,
    ) -> Result<AddExpectationOutcome, SuiteError> {
        let expectation_type_owned = expectation_type.to_string();
        let expectation = self
            .pool
            .run(move |engine| engine.build_expectation(&expectation_type_owned, kwargs))
            .await?;

        let _guard = self.context.lock_suite(suite_name).await;
        let mut suite = match self.context.get(suite_name) {
            Some(suite) => suite,
            None if self.strict_add_expectation => {
                return Err(SuiteError::SuiteNotFound(suite_name.to_string()));
            }
            None => {
                warn!("Suite '{}' not found, creating new one", suite_name);
                metrics::record_auto_created_suite();
                ExpectationSuite::new(suite_name)
            }
        };
        suite.expectations.push(expectation);
        let count = suite.expectations.len();
        self.context.add_or_update(suite);

        info!(
            "Added {} to suite '{}' ({} expectations)",
            expectation_type, suite_name, count
        );
        Ok(AddExpectationOutcome {
            success: true,
            message: format!("Added {} to suite '{}'", expectation_type, suite_name),
        })
    }

    pub fn get_suite(&self, suite_name: &str) -> Option<ExpectationSuite> {
        self.context.get(suite_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BuiltinEngine;
    use crate::store::{Dataset, StoreSettings};
    use serde_json::json;

    struct Fixture {
        store: Arc<ArtifactStore>,
        manager: SuiteManager,
    }

    fn fixture(strict: bool, profiler_enabled: bool) -> Fixture {
        let store = Arc::new(ArtifactStore::new(StoreSettings::default()).unwrap());
        let pool = EnginePool::new(Arc::new(BuiltinEngine::new(profiler_enabled)), 4);
        let manager = SuiteManager::new(Arc::new(SuiteContext::new()), store.clone(), pool, strict);
        Fixture { store, manager }
    }

    fn kwargs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_add_grows_suite_in_order() {
        let f = fixture(false, true);
        let name = f.manager.create_suite("demo", "any", false).await.unwrap();
        assert_eq!(name, "demo");
        assert!(f.manager.get_suite("demo").unwrap().expectations.is_empty());

        let outcome = f
            .manager
            .add_expectation("demo", "expect_column_to_exist", kwargs(json!({"column": "x"})))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(f.manager.get_suite("demo").unwrap().expectations.len(), 1);

        f.manager
            .add_expectation(
                "demo",
                "expect_table_row_count_to_equal",
                kwargs(json!({"value": 3})),
            )
            .await
            .unwrap();
        let types: Vec<String> = f
            .manager
            .get_suite("demo")
            .unwrap()
            .expectations
            .into_iter()
            .map(|e| e.expectation_type)
            .collect();
        assert_eq!(
            types,
            vec!["expect_column_to_exist", "expect_table_row_count_to_equal"]
        );
    }

    #[tokio::test]
    async fn test_recreate_overwrites() {
        let f = fixture(false, true);
        f.manager.create_suite("demo", "h", false).await.unwrap();
        f.manager
            .add_expectation("demo", "expect_column_to_exist", kwargs(json!({"column": "x"})))
            .await
            .unwrap();
        f.manager.create_suite("demo", "h", false).await.unwrap();
        assert!(f.manager.get_suite("demo").unwrap().expectations.is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_is_creation_error() {
        let f = fixture(false, true);
        let err = f.manager.create_suite("  ", "h", false).await.unwrap_err();
        assert_eq!(err.kind(), "SuiteCreationError");
    }

    #[tokio::test]
    async fn test_add_to_missing_suite_creates_it() {
        let f = fixture(false, true);
        f.manager
            .add_expectation("fresh", "expect_column_to_exist", kwargs(json!({"column": "x"})))
            .await
            .unwrap();
        assert_eq!(f.manager.get_suite("fresh").unwrap().expectations.len(), 1);
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_missing_suite() {
        let f = fixture(true, true);
        let err = f
            .manager
            .add_expectation("fresh", "expect_column_to_exist", kwargs(json!({"column": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "SuiteNotFound");
        assert!(f.manager.get_suite("fresh").is_none());
    }

    #[tokio::test]
    async fn test_rule_errors_are_classified() {
        let f = fixture(false, true);
        f.manager.create_suite("demo", "h", false).await.unwrap();

        let err = f
            .manager
            .add_expectation("demo", "expect_nothing", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownExpectationType");

        let err = f
            .manager
            .add_expectation("demo", "expect_column_to_exist", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidExpectationArgs");

        // failed adds leave the suite untouched
        assert!(f.manager.get_suite("demo").unwrap().expectations.is_empty());
    }

    #[tokio::test]
    async fn test_profile_seeds_suite() {
        let f = fixture(false, true);
        let handle = f
            .store
            .register_dataset(Dataset::from_csv_str("x,y\n1,2\n3,4").unwrap());
        f.manager.create_suite("profiled", &handle, true).await.unwrap();
        let suite = f.manager.get_suite("profiled").unwrap();
        assert!(!suite.expectations.is_empty());
        assert_eq!(suite.expectations[0].expectation_type, "expect_column_to_exist");
    }

    #[tokio::test]
    async fn test_profile_is_best_effort() {
        let f = fixture(false, false);
        let handle = f
            .store
            .register_dataset(Dataset::from_csv_str("x\n1").unwrap());
        f.manager.create_suite("plain", &handle, true).await.unwrap();
        assert!(f.manager.get_suite("plain").unwrap().expectations.is_empty());

        let f = fixture(false, true);
        f.manager.create_suite("orphan", "missing-handle", true).await.unwrap();
        assert!(f.manager.get_suite("orphan").unwrap().expectations.is_empty());
    }

    /// One valid call per rule kind.
    fn one_rule_of_each_kind() -> Vec<(&'static str, Value)> {
        vec![
            ("expect_column_to_exist", json!({"column": "x"})),
            ("expect_column_values_to_not_be_null", json!({"column": "x"})),
            ("expect_column_values_to_be_null", json!({"column": "y"})),
            ("expect_column_values_to_be_in_set", json!({"column": "x", "value_set": [1, 3]})),
            ("expect_column_values_to_not_be_in_set", json!({"column": "x", "value_set": [9]})),
            ("expect_column_values_to_be_between", json!({"column": "x", "min_value": 0})),
            ("expect_column_values_to_be_unique", json!({"column": "x"})),
            ("expect_column_values_to_match_regex", json!({"column": "x", "regex": "^[0-9]+$"})),
            ("expect_table_row_count_to_be_between", json!({"min_value": 1})),
            ("expect_table_row_count_to_equal", json!({"value": 2})),
            ("expect_table_columns_to_match_ordered_list", json!({"column_list": ["x", "y"]})),
        ]
    }

    #[tokio::test]
    async fn test_parallel_adds_lose_nothing() {
        let f = fixture(false, true);
        let manager = Arc::new(f.manager);
        manager.create_suite("race", "h", false).await.unwrap();

        let rules = one_rule_of_each_kind();
        let tasks: Vec<_> = rules
            .iter()
            .cloned()
            .map(|(expectation_type, args)| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager
                        .add_expectation("race", expectation_type, kwargs(args))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let suite = manager.get_suite("race").unwrap();
        let mut stored: Vec<&str> = suite
            .expectations
            .iter()
            .map(|e| e.expectation_type.as_str())
            .collect();
        stored.sort();
        let mut expected: Vec<&str> = rules.iter().map(|(t, _)| *t).collect();
        expected.sort();
        assert_eq!(stored, expected);
        assert_eq!(stored.len(), crate::engine::EXPECTATION_TYPES.len());
    }
}
