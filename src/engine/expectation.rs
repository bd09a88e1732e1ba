//! Expectation catalog: rule kinds, their parameter contracts and construction.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EngineError;

/// Every rule kind the built-in engine understands, in catalog order.
pub const EXPECTATION_TYPES: &[&str] = &[
    "expect_column_to_exist",
    "expect_column_values_to_not_be_null",
    "expect_column_values_to_be_null",
    "expect_column_values_to_be_in_set",
    "expect_column_values_to_not_be_in_set",
    "expect_column_values_to_be_between",
    "expect_column_values_to_be_unique",
    "expect_column_values_to_match_regex",
    "expect_table_row_count_to_be_between",
    "expect_table_row_count_to_equal",
    "expect_table_columns_to_match_ordered_list",
];

/// A compiled rule.
#[derive(Debug, Clone)]
pub enum Rule {
    ColumnExists {
        column: String,
    },
    NotNull {
        column: String,
        mostly: f64,
    },
    Null {
        column: String,
        mostly: f64,
    },
    InSet {
        column: String,
        value_set: Vec<Value>,
        mostly: f64,
    },
    NotInSet {
        column: String,
        value_set: Vec<Value>,
        mostly: f64,
    },
    Between {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
        strict_min: bool,
        strict_max: bool,
        mostly: f64,
    },
    Unique {
        column: String,
        mostly: f64,
    },
    MatchRegex {
        column: String,
        regex: Regex,
        mostly: f64,
    },
    RowCountBetween {
        min: Option<u64>,
        max: Option<u64>,
    },
    RowCountEqual {
        value: u64,
    },
    ColumnsMatchOrderedList {
        column_list: Vec<String>,
    },
}

/// A rule instance as held by a suite: the compiled rule plus the exact
/// arguments the client supplied.
#[derive(Debug, Clone, Serialize)]
pub struct Expectation {
    pub expectation_type: String,
    pub kwargs: Map<String, Value>,
    #[serde(skip)]
    pub rule: Rule,
}

// ============================================================================
// Parameter contracts
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnArgs {
    column: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnMapArgs {
    column: String,
    mostly: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueSetArgs {
    column: String,
    value_set: Vec<Value>,
    mostly: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BetweenArgs {
    column: String,
    min_value: Option<f64>,
    max_value: Option<f64>,
    #[serde(default)]
    strict_min: bool,
    #[serde(default)]
    strict_max: bool,
    mostly: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexArgs {
    column: String,
    regex: String,
    mostly: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RowCountBetweenArgs {
    min_value: Option<u64>,
    max_value: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RowCountEqualArgs {
    value: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OrderedListArgs {
    column_list: Vec<String>,
}

// ============================================================================
// Construction
// ============================================================================

impl Expectation {
    /// Validates `kwargs` against the contract of `expectation_type` and compiles the rule.
    pub fn build(expectation_type: &str, kwargs: Map<String, Value>) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidExpectationArgs {
            expectation_type: expectation_type.to_string(),
            reason,
        };

        let rule = match expectation_type {
            "expect_column_to_exist" => {
                let args: ColumnArgs = parse_args(expectation_type, &kwargs)?;
                Rule::ColumnExists {
                    column: args.column,
                }
            }
            "expect_column_values_to_not_be_null" | "expect_column_values_to_be_null" => {
                let args: ColumnMapArgs = parse_args(expectation_type, &kwargs)?;
                let mostly = check_mostly(args.mostly).map_err(invalid)?;
                if expectation_type == "expect_column_values_to_be_null" {
                    Rule::Null {
                        column: args.column,
                        mostly,
                    }
                } else {
                    Rule::NotNull {
                        column: args.column,
                        mostly,
                    }
                }
            }
            "expect_column_values_to_be_in_set" | "expect_column_values_to_not_be_in_set" => {
                let args: ValueSetArgs = parse_args(expectation_type, &kwargs)?;
                let mostly = check_mostly(args.mostly).map_err(invalid)?;
                if expectation_type == "expect_column_values_to_be_in_set" {
                    Rule::InSet {
                        column: args.column,
                        value_set: args.value_set,
                        mostly,
                    }
                } else {
                    Rule::NotInSet {
                        column: args.column,
                        value_set: args.value_set,
                        mostly,
                    }
                }
            }
            "expect_column_values_to_be_between" => {
                let args: BetweenArgs = parse_args(expectation_type, &kwargs)?;
                let mostly = check_mostly(args.mostly).map_err(invalid)?;
                match (args.min_value, args.max_value) {
                    (None, None) => {
                        return Err(invalid(
                            "at least one of min_value or max_value is required".into(),
                        ))
                    }
                    (Some(min), Some(max)) if min > max => {
                        return Err(invalid(format!(
                            "min_value {} is greater than max_value {}",
                            min, max
                        )))
                    }
                    _ => {}
                }
                Rule::Between {
                    column: args.column,
                    min: args.min_value,
                    max: args.max_value,
                    strict_min: args.strict_min,
                    strict_max: args.strict_max,
                    mostly,
                }
            }
            "expect_column_values_to_be_unique" => {
                let args: ColumnMapArgs = parse_args(expectation_type, &kwargs)?;
                Rule::Unique {
                    column: args.column,
                    mostly: check_mostly(args.mostly).map_err(invalid)?,
                }
            }
            "expect_column_values_to_match_regex" => {
                let args: RegexArgs = parse_args(expectation_type, &kwargs)?;
                let mostly = check_mostly(args.mostly).map_err(invalid)?;
                let regex = Regex::new(&args.regex)
                    .map_err(|e| invalid(format!("invalid regex: {}", e)))?;
                Rule::MatchRegex {
                    column: args.column,
                    regex,
                    mostly,
                }
            }
            "expect_table_row_count_to_be_between" => {
                let args: RowCountBetweenArgs = parse_args(expectation_type, &kwargs)?;
                if let (Some(min), Some(max)) = (args.min_value, args.max_value) {
                    if min > max {
                        return Err(invalid(format!(
                            "min_value {} is greater than max_value {}",
                            min, max
                        )));
                    }
                }
                Rule::RowCountBetween {
                    min: args.min_value,
                    max: args.max_value,
                }
            }
            "expect_table_row_count_to_equal" => {
                let args: RowCountEqualArgs = parse_args(expectation_type, &kwargs)?;
                Rule::RowCountEqual { value: args.value }
            }
            "expect_table_columns_to_match_ordered_list" => {
                let args: OrderedListArgs = parse_args(expectation_type, &kwargs)?;
                Rule::ColumnsMatchOrderedList {
                    column_list: args.column_list,
                }
            }
            other => return Err(EngineError::UnknownExpectationType(other.to_string())),
        };

        Ok(Expectation {
            expectation_type: expectation_type.to_string(),
            kwargs,
            rule,
        })
    }

    /// Name of the column the rule inspects, if it is a column rule.
    pub fn column(&self) -> Option<&str> {
        match &self.rule {
            Rule::ColumnExists { column }
            | Rule::NotNull { column, .. }
            | Rule::Null { column, .. }
            | Rule::InSet { column, .. }
            | Rule::NotInSet { column, .. }
            | Rule::Between { column, .. }
            | Rule::Unique { column, .. }
            | Rule::MatchRegex { column, .. } => Some(column),
            Rule::RowCountBetween { .. }
            | Rule::RowCountEqual { .. }
            | Rule::ColumnsMatchOrderedList { .. } => None,
        }
    }
}

fn parse_args<T: DeserializeOwned>(
    expectation_type: &str,
    kwargs: &Map<String, Value>,
) -> Result<T, EngineError> {
    serde_json::from_value(Value::Object(kwargs.clone())).map_err(|e| {
        EngineError::InvalidExpectationArgs {
            expectation_type: expectation_type.to_string(),
            reason: e.to_string(),
        }
    })
}

fn check_mostly(mostly: Option<f64>) -> Result<f64, String> {
    match mostly {
        None => Ok(1.0),
        Some(m) if m > 0.0 && m <= 1.0 => Ok(m),
        Some(m) => Err(format!("mostly must be in (0, 1], got {}", m)),
    }
}
