use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of offending values echoed back per rule.
pub const PARTIAL_UNEXPECTED_LIMIT: usize = 20;

/// Detail record of one checkpoint run.
///
/// `success = false` always comes with either a populated `error` or empty
/// `results`. `statistics` is empty when evaluation could not run at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResultDetail {
    pub statistics: Map<String, Value>,
    pub results: Vec<ExpectationOutcome>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResultDetail {
    /// Result recorded when a run is allowed to pass without any data.
    pub fn trivial_success() -> Self {
        Self {
            statistics: Map::new(),
            results: Vec::new(),
            success: true,
            error: None,
        }
    }

    /// Result recorded when evaluation could not run.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            statistics: Map::new(),
            results: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Builds a completed run out of per-rule outcomes.
    pub fn from_outcomes(results: Vec<ExpectationOutcome>) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let success_percent = if evaluated == 0 {
            100.0
        } else {
            successful as f64 * 100.0 / evaluated as f64
        };

        let mut statistics = Map::new();
        statistics.insert("evaluated_expectations".into(), evaluated.into());
        statistics.insert("successful_expectations".into(), successful.into());
        statistics.insert(
            "unsuccessful_expectations".into(),
            (evaluated - successful).into(),
        );
        statistics.insert("success_percent".into(), success_percent.into());

        Self {
            statistics,
            success: successful == evaluated,
            results,
            error: None,
        }
    }
}

/// Outcome of a single rule within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationOutcome {
    pub expectation_type: String,
    pub kwargs: Map<String, Value>,
    pub success: bool,
    pub result: RuleResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unexpected_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unexpected_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_unexpected_list: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<Value>,
}
