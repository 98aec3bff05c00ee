//! Trigger conditions as a tagged union: one [`Condition`] carries the
//! fields shared by every variant, and [`ConditionSpec`] the per-variant
//! payload. Evaluation dispatches by pattern matching; there is no runtime
//! type inspection anywhere else.

use crate::types::{AvailabilityType, DataValue, Mode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric comparison operator for Threshold and Compare conditions.
///
/// # Examples
///
/// ```
/// use klaxon_common::condition::CompareOperator;
///
/// let op: CompareOperator = "gte".parse().unwrap();
/// assert!(op.check(10.0, 10.0));
/// assert!(!CompareOperator::Gt.check(10.0, 10.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOperator {
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CompareOperator {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            CompareOperator::Lt => value < threshold,
            CompareOperator::Gt => value > threshold,
            CompareOperator::Lte => value <= threshold,
            CompareOperator::Gte => value >= threshold,
        }
    }
}

impl std::fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOperator::Lt => write!(f, "lt"),
            CompareOperator::Gt => write!(f, "gt"),
            CompareOperator::Lte => write!(f, "lte"),
            CompareOperator::Gte => write!(f, "gte"),
        }
    }
}

impl std::str::FromStr for CompareOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lt" => Ok(CompareOperator::Lt),
            "gt" => Ok(CompareOperator::Gt),
            "lte" => Ok(CompareOperator::Lte),
            "gte" => Ok(CompareOperator::Gte),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

/// Bound operator for ThresholdRange conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOperator {
    Inclusive,
    Exclusive,
}

impl RangeOperator {
    /// `a <= b` for inclusive bounds, `a < b` for exclusive ones.
    pub fn check(&self, a: f64, b: f64) -> bool {
        match self {
            RangeOperator::Inclusive => a <= b,
            RangeOperator::Exclusive => a < b,
        }
    }
}

impl std::fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeOperator::Inclusive => write!(f, "inclusive"),
            RangeOperator::Exclusive => write!(f, "exclusive"),
        }
    }
}

impl std::str::FromStr for RangeOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inclusive" => Ok(RangeOperator::Inclusive),
            "exclusive" => Ok(RangeOperator::Exclusive),
            _ => Err(format!("unknown range operator: {s}")),
        }
    }
}

/// Text matching operator for String conditions. `Match` is regular
/// expression matching and is evaluated by the engine crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringOperator {
    Equal,
    NotEqual,
    StartsWith,
    EndsWith,
    Contains,
    Match,
}

impl std::fmt::Display for StringOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StringOperator::Equal => write!(f, "equal"),
            StringOperator::NotEqual => write!(f, "not_equal"),
            StringOperator::StartsWith => write!(f, "starts_with"),
            StringOperator::EndsWith => write!(f, "ends_with"),
            StringOperator::Contains => write!(f, "contains"),
            StringOperator::Match => write!(f, "match"),
        }
    }
}

impl std::str::FromStr for StringOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equal" => Ok(StringOperator::Equal),
            "not_equal" => Ok(StringOperator::NotEqual),
            "starts_with" => Ok(StringOperator::StartsWith),
            "ends_with" => Ok(StringOperator::EndsWith),
            "contains" => Ok(StringOperator::Contains),
            "match" => Ok(StringOperator::Match),
            _ => Err(format!("unknown string operator: {s}")),
        }
    }
}

/// Availability state matcher. `NotUp` matches both `Down` and `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityOperator {
    Up,
    NotUp,
    Down,
}

impl AvailabilityOperator {
    pub fn matches(&self, state: AvailabilityType) -> bool {
        match self {
            AvailabilityOperator::Up => state == AvailabilityType::Up,
            AvailabilityOperator::NotUp => state != AvailabilityType::Up,
            AvailabilityOperator::Down => state == AvailabilityType::Down,
        }
    }
}

impl std::fmt::Display for AvailabilityOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityOperator::Up => write!(f, "up"),
            AvailabilityOperator::NotUp => write!(f, "not_up"),
            AvailabilityOperator::Down => write!(f, "down"),
        }
    }
}

impl std::str::FromStr for AvailabilityOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(AvailabilityOperator::Up),
            "not_up" => Ok(AvailabilityOperator::NotUp),
            "down" => Ok(AvailabilityOperator::Down),
            _ => Err(format!("unknown availability operator: {s}")),
        }
    }
}

/// Variant-specific payload of a [`Condition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionSpec {
    Threshold {
        operator: CompareOperator,
        threshold: f64,
    },
    ThresholdRange {
        operator_low: RangeOperator,
        operator_high: RangeOperator,
        threshold_low: f64,
        threshold_high: f64,
        in_range: bool,
    },
    /// Relative comparison between two data streams:
    /// `value <op> data2_multiplier * data2_value`.
    Compare {
        operator: CompareOperator,
        data2_id: String,
        data2_multiplier: f64,
    },
    String {
        operator: StringOperator,
        pattern: String,
        ignore_case: bool,
    },
    Availability {
        operator: AvailabilityOperator,
    },
}

impl ConditionSpec {
    /// Short variant name, for logs and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionSpec::Threshold { .. } => "threshold",
            ConditionSpec::ThresholdRange { .. } => "threshold_range",
            ConditionSpec::Compare { .. } => "compare",
            ConditionSpec::String { .. } => "string",
            ConditionSpec::Availability { .. } => "availability",
        }
    }
}

/// One condition of a trigger's condition set for a given [`Mode`].
///
/// `condition_set_size` is the number of conditions sharing the same
/// (trigger, mode) and `condition_set_index` this condition's 1-based dense
/// position; the definitions service reassigns both whenever a set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub tenant_id: String,
    pub trigger_id: String,
    pub trigger_mode: Mode,
    pub condition_set_size: usize,
    pub condition_set_index: usize,
    pub data_id: String,
    #[serde(flatten)]
    pub spec: ConditionSpec,
}

impl Condition {
    fn base(tenant_id: &str, trigger_id: &str, mode: Mode, data_id: &str, spec: ConditionSpec) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            trigger_mode: mode,
            condition_set_size: 1,
            condition_set_index: 1,
            data_id: data_id.to_string(),
            spec,
        }
    }

    pub fn threshold(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        data_id: &str,
        operator: CompareOperator,
        threshold: f64,
    ) -> Self {
        Self::base(
            tenant_id,
            trigger_id,
            mode,
            data_id,
            ConditionSpec::Threshold { operator, threshold },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn threshold_range(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        data_id: &str,
        operator_low: RangeOperator,
        operator_high: RangeOperator,
        threshold_low: f64,
        threshold_high: f64,
        in_range: bool,
    ) -> Self {
        Self::base(
            tenant_id,
            trigger_id,
            mode,
            data_id,
            ConditionSpec::ThresholdRange {
                operator_low,
                operator_high,
                threshold_low,
                threshold_high,
                in_range,
            },
        )
    }

    pub fn compare(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        data_id: &str,
        operator: CompareOperator,
        data2_id: &str,
        data2_multiplier: f64,
    ) -> Self {
        Self::base(
            tenant_id,
            trigger_id,
            mode,
            data_id,
            ConditionSpec::Compare {
                operator,
                data2_id: data2_id.to_string(),
                data2_multiplier,
            },
        )
    }

    pub fn string(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        data_id: &str,
        operator: StringOperator,
        pattern: &str,
        ignore_case: bool,
    ) -> Self {
        Self::base(
            tenant_id,
            trigger_id,
            mode,
            data_id,
            ConditionSpec::String {
                operator,
                pattern: pattern.to_string(),
                ignore_case,
            },
        )
    }

    pub fn availability(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        data_id: &str,
        operator: AvailabilityOperator,
    ) -> Self {
        Self::base(
            tenant_id,
            trigger_id,
            mode,
            data_id,
            ConditionSpec::Availability { operator },
        )
    }

    /// Derived identifier addressing this condition within its stored set:
    /// `{trigger_id}-{mode}-{set_size}-{set_index}`.
    pub fn condition_id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.trigger_id, self.trigger_mode, self.condition_set_size, self.condition_set_index
        )
    }

    /// Every data stream this condition reads (includes `data2_id` for
    /// Compare). Drives the automatic `dataId` tag maintenance.
    pub fn data_ids(&self) -> Vec<&str> {
        match &self.spec {
            ConditionSpec::Compare { data2_id, .. } => vec![self.data_id.as_str(), data2_id],
            _ => vec![self.data_id.as_str()],
        }
    }
}

/// Splits a condition id produced by [`Condition::condition_id`] back into
/// `(trigger_id, mode, set_size, set_index)`. Parsing is anchored on the
/// right since trigger ids may themselves contain `-`.
pub fn parse_condition_id(id: &str) -> Result<(String, Mode, usize, usize), String> {
    let mut parts = id.rsplitn(4, '-');
    let index = parts.next().and_then(|p| p.parse::<usize>().ok());
    let size = parts.next().and_then(|p| p.parse::<usize>().ok());
    let mode = parts.next().and_then(|p| p.parse::<Mode>().ok());
    let trigger = parts.next();
    match (trigger, mode, size, index) {
        (Some(t), Some(m), Some(s), Some(i)) if !t.is_empty() => Ok((t.to_string(), m, s, i)),
        _ => Err(format!("malformed condition id: {id}")),
    }
}

/// Immutable record of one evaluation outcome for one condition against one
/// data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEval {
    pub condition_id: String,
    pub trigger_id: String,
    pub condition_set_size: usize,
    pub condition_set_index: usize,
    pub matched: bool,
    pub value: DataValue,
    pub eval_time: DateTime<Utc>,
    pub data_time: DateTime<Utc>,
}

impl ConditionEval {
    pub fn new(
        condition: &Condition,
        matched: bool,
        value: DataValue,
        data_time: DateTime<Utc>,
    ) -> Self {
        Self {
            condition_id: condition.condition_id(),
            trigger_id: condition.trigger_id.clone(),
            condition_set_size: condition.condition_set_size,
            condition_set_index: condition.condition_set_index,
            matched,
            value,
            eval_time: Utc::now(),
            data_time,
        }
    }
}
