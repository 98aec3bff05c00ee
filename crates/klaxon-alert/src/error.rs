use thiserror::Error;

/// Condition evaluation failure. A data point that cannot be evaluated
/// against its condition is reported to the caller, never treated as a
/// silent non-match.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("condition {condition_id} expects a {expected} value, got {actual}")]
    TypeMismatch {
        condition_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("match pattern {pattern:?} is not a valid regular expression: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("condition {condition_id} compares against data stream {data2_id}, which has no data point this cycle")]
    MissingCompareData {
        condition_id: String,
        data2_id: String,
    },
}

pub type Result<T> = std::result::Result<T, EvalError>;
