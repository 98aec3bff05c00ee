//! Pure condition evaluation: one condition, one data point (plus the second
//! stream's point for Compare), one [`ConditionEval`] out. No state, no
//! store access; anything that cannot be evaluated is a typed error.

use klaxon_common::condition::{Condition, ConditionEval, ConditionSpec, StringOperator};
use klaxon_common::types::{AvailabilityType, Data};
use regex::RegexBuilder;
use std::borrow::Cow;

use crate::error::{EvalError, Result};

/// Evaluates `condition` against one cycle's data point. Compare conditions
/// additionally need the aligned point of their second stream in `data2`.
pub fn evaluate(condition: &Condition, data: &Data, data2: Option<&Data>) -> Result<ConditionEval> {
    let matched = match &condition.spec {
        ConditionSpec::Threshold { operator, threshold } => {
            operator.check(numeric(condition, data)?, *threshold)
        }
        ConditionSpec::ThresholdRange {
            operator_low,
            operator_high,
            threshold_low,
            threshold_high,
            in_range,
        } => {
            let value = numeric(condition, data)?;
            let inside =
                operator_low.check(*threshold_low, value) && operator_high.check(value, *threshold_high);
            inside == *in_range
        }
        ConditionSpec::Compare {
            operator,
            data2_id,
            data2_multiplier,
        } => {
            let value = numeric(condition, data)?;
            let data2 = data2.ok_or_else(|| EvalError::MissingCompareData {
                condition_id: condition.condition_id(),
                data2_id: data2_id.clone(),
            })?;
            operator.check(value, data2_multiplier * numeric(condition, data2)?)
        }
        ConditionSpec::String {
            operator,
            pattern,
            ignore_case,
        } => check_string(text(condition, data)?, *operator, pattern, *ignore_case)?,
        ConditionSpec::Availability { operator } => operator.matches(availability(condition, data)?),
    };

    Ok(ConditionEval::new(
        condition,
        matched,
        data.value.clone(),
        data.timestamp,
    ))
}

fn check_string(value: &str, operator: StringOperator, pattern: &str, ignore_case: bool) -> Result<bool> {
    let value_cmp = fold(value, ignore_case);
    let pattern_cmp = fold(pattern, ignore_case);
    Ok(match operator {
        StringOperator::Equal => value_cmp == pattern_cmp,
        StringOperator::NotEqual => value_cmp != pattern_cmp,
        StringOperator::StartsWith => value_cmp.starts_with(pattern_cmp.as_ref()),
        StringOperator::EndsWith => value_cmp.ends_with(pattern_cmp.as_ref()),
        StringOperator::Contains => value_cmp.contains(pattern_cmp.as_ref()),
        StringOperator::Match => RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| EvalError::BadPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .is_match(value),
    })
}

fn fold(s: &str, ignore_case: bool) -> Cow<'_, str> {
    if ignore_case {
        Cow::Owned(s.to_lowercase())
    } else {
        Cow::Borrowed(s)
    }
}

fn numeric(condition: &Condition, data: &Data) -> Result<f64> {
    data.value
        .as_numeric()
        .ok_or_else(|| type_mismatch(condition, data, "numeric"))
}

fn text<'a>(condition: &Condition, data: &'a Data) -> Result<&'a str> {
    data.value
        .as_text()
        .ok_or_else(|| type_mismatch(condition, data, "text"))
}

fn availability(condition: &Condition, data: &Data) -> Result<AvailabilityType> {
    data.value
        .as_availability()
        .ok_or_else(|| type_mismatch(condition, data, "availability"))
}

fn type_mismatch(condition: &Condition, data: &Data, expected: &'static str) -> EvalError {
    EvalError::TypeMismatch {
        condition_id: condition.condition_id(),
        expected,
        actual: data.value.type_name(),
    }
}
