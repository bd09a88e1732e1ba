//! In-process rule evaluation over [`Dataset`]s.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Map, Value};

use super::expectation::{Expectation, Rule, EXPECTATION_TYPES};
use super::suite_context::ExpectationSuite;
use super::{EngineError, ValidationEngine};
use crate::store::{
    CellValue, Column, Dataset, ExpectationOutcome, RuleResult, ValidationResultDetail,
    PARTIAL_UNEXPECTED_LIMIT,
};

pub struct BuiltinEngine {
    profiler_enabled: bool,
}

impl BuiltinEngine {
    pub fn new(profiler_enabled: bool) -> Self {
        Self { profiler_enabled }
    }
}

impl Default for BuiltinEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ValidationEngine for BuiltinEngine {
    fn expectation_types(&self) -> Vec<&'static str> {
        EXPECTATION_TYPES.to_vec()
    }

    fn build_expectation(
        &self,
        expectation_type: &str,
        kwargs: Map<String, Value>,
    ) -> Result<Expectation, EngineError> {
        Expectation::build(expectation_type, kwargs)
    }

    fn evaluate(
        &self,
        suite: &ExpectationSuite,
        dataset_path: &Path,
    ) -> Result<ValidationResultDetail, EngineError> {
        let dataset = Dataset::from_csv_path(dataset_path)?;
        Ok(evaluate_dataset(suite, &dataset))
    }

    fn profile(&self, dataset: &Dataset) -> Result<Vec<Expectation>, EngineError> {
        if !self.profiler_enabled {
            return Err(EngineError::ProfilingUnavailable(
                "profiler is disabled by configuration".to_string(),
            ));
        }
        profile_dataset(dataset)
    }
}

pub fn evaluate_dataset(suite: &ExpectationSuite, dataset: &Dataset) -> ValidationResultDetail {
    let outcomes = suite
        .expectations
        .iter()
        .map(|expectation| evaluate_expectation(expectation, dataset))
        .collect();
    ValidationResultDetail::from_outcomes(outcomes)
}

fn evaluate_expectation(expectation: &Expectation, dataset: &Dataset) -> ExpectationOutcome {
    let evaluated = match expectation.column() {
        Some(name) => match dataset.column(name) {
            Some(column) => Ok(evaluate_column_rule(&expectation.rule, column)),
            None if matches!(expectation.rule, Rule::ColumnExists { .. }) => {
                Ok((false, RuleResult::default()))
            }
            None => Err(format!("Column '{}' not found in dataset", name)),
        },
        None => Ok(evaluate_table_rule(&expectation.rule, dataset)),
    };

    let (success, result, exception_info) = match evaluated {
        Ok((success, result)) => (success, result, None),
        Err(message) => (false, RuleResult::default(), Some(message)),
    };

    ExpectationOutcome {
        expectation_type: expectation.expectation_type.clone(),
        kwargs: expectation.kwargs.clone(),
        success,
        result,
        exception_info,
    }
}

fn evaluate_column_rule(rule: &Rule, column: &Column) -> (bool, RuleResult) {
    match rule {
        Rule::ColumnExists { .. } => (true, RuleResult::default()),
        Rule::NotNull { mostly, .. } => {
            column_map(column, *mostly, false, |cell| !cell.is_null())
        }
        Rule::Null { mostly, .. } => column_map(column, *mostly, false, |cell| cell.is_null()),
        Rule::InSet {
            value_set, mostly, ..
        } => column_map(column, *mostly, true, |cell| {
            value_set.iter().any(|v| cell.matches_json(v))
        }),
        Rule::NotInSet {
            value_set, mostly, ..
        } => column_map(column, *mostly, true, |cell| {
            !value_set.iter().any(|v| cell.matches_json(v))
        }),
        Rule::Between {
            min,
            max,
            strict_min,
            strict_max,
            mostly,
            ..
        } => column_map(column, *mostly, true, |cell| match cell.as_f64() {
            Some(x) => {
                let above = match min {
                    Some(lo) if *strict_min => x > *lo,
                    Some(lo) => x >= *lo,
                    None => true,
                };
                let below = match max {
                    Some(hi) if *strict_max => x < *hi,
                    Some(hi) => x <= *hi,
                    None => true,
                };
                above && below
            }
            None => false,
        }),
        Rule::Unique { mostly, .. } => {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for cell in column.non_null() {
                *counts.entry(unique_key(cell)).or_default() += 1;
            }
            column_map(column, *mostly, true, |cell| {
                counts.get(&unique_key(cell)) == Some(&1)
            })
        }
        Rule::MatchRegex { regex, mostly, .. } => {
            column_map(column, *mostly, true, |cell| regex.is_match(&cell.to_string()))
        }
        // table rules never reach here
        Rule::RowCountBetween { .. }
        | Rule::RowCountEqual { .. }
        | Rule::ColumnsMatchOrderedList { .. } => (false, RuleResult::default()),
    }
}

fn evaluate_table_rule(rule: &Rule, dataset: &Dataset) -> (bool, RuleResult) {
    let rows = dataset.row_count() as u64;
    match rule {
        Rule::RowCountBetween { min, max } => {
            let success = min.map_or(true, |lo| rows >= lo) && max.map_or(true, |hi| rows <= hi);
            (success, observed(json!(rows)))
        }
        Rule::RowCountEqual { value } => (rows == *value, observed(json!(rows))),
        Rule::ColumnsMatchOrderedList { column_list } => {
            let names = dataset.column_names();
            let success = names.len() == column_list.len()
                && names.iter().zip(column_list).all(|(a, b)| *a == b);
            (success, observed(json!(names)))
        }
        _ => (false, RuleResult::default()),
    }
}

fn observed(value: Value) -> RuleResult {
    RuleResult {
        observed_value: Some(value),
        ..RuleResult::default()
    }
}

/// Applies a per-cell predicate. With `skip_nulls`, null cells are neither
/// counted nor tested.
fn column_map<F>(column: &Column, mostly: f64, skip_nulls: bool, expected: F) -> (bool, RuleResult)
where
    F: Fn(&CellValue) -> bool,
{
    let element_count = column.values.len();
    let mut considered = 0usize;
    let mut unexpected_count = 0usize;
    let mut partial = Vec::new();

    for cell in &column.values {
        if skip_nulls && cell.is_null() {
            continue;
        }
        considered += 1;
        if !expected(cell) {
            unexpected_count += 1;
            if partial.len() < PARTIAL_UNEXPECTED_LIMIT {
                partial.push(cell.to_json());
            }
        }
    }

    let (success, unexpected_percent) = if considered == 0 {
        (true, 0.0)
    } else {
        let success_ratio = (considered - unexpected_count) as f64 / considered as f64;
        let unexpected_ratio = unexpected_count as f64 / considered as f64;
        (success_ratio >= mostly, unexpected_ratio * 100.0)
    };

    (
        success,
        RuleResult {
            element_count: Some(element_count),
            unexpected_count: Some(unexpected_count),
            unexpected_percent: Some(unexpected_percent),
            partial_unexpected_list: partial,
            observed_value: None,
        },
    )
}

/// Hash key that treats equal numbers as the same value regardless of type.
fn unique_key(cell: &CellValue) -> String {
    match cell {
        CellValue::Int(_) | CellValue::Float(_) => {
            let x = cell.as_f64().unwrap_or_default();
            // fold -0.0 into 0.0
            format!("n:{}", (x + 0.0).to_bits())
        }
        CellValue::Str(s) => format!("s:{}", s),
        CellValue::Bool(b) => format!("b:{}", b),
        CellValue::Null => "null".to_string(),
    }
}

fn profile_dataset(dataset: &Dataset) -> Result<Vec<Expectation>, EngineError> {
    let mut expectations = Vec::new();
    for column in dataset.columns() {
        let mut kwargs = Map::new();
        kwargs.insert("column".into(), json!(column.name));
        expectations.push(Expectation::build("expect_column_to_exist", kwargs.clone())?);

        if dataset.row_count() > 0 && column.null_count() == 0 {
            expectations.push(Expectation::build(
                "expect_column_values_to_not_be_null",
                kwargs.clone(),
            )?);
        }

        if column.is_numeric() {
            let values: Vec<f64> = column.non_null().filter_map(CellValue::as_f64).collect();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if min.is_finite() && max.is_finite() {
                kwargs.insert("min_value".into(), json!(min));
                kwargs.insert("max_value".into(), json!(max));
                expectations.push(Expectation::build(
                    "expect_column_values_to_be_between",
                    kwargs,
                )?);
            }
        }
    }
    Ok(expectations)
}
