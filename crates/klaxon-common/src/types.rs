use crate::condition::ConditionEval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use klaxon_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Lifecycle status of an [`Alert`]. `Resolved` is terminal; the rank order
/// (`Open < Acknowledged < Resolved`) is also the status sort order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Open => write!(f, "open"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(AlertStatus::Open),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// Evaluation mode of a trigger: `Firing` conditions raise alerts,
/// `AutoResolve` conditions close them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Firing,
    AutoResolve,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Firing => write!(f, "firing"),
            Mode::AutoResolve => write!(f, "autoresolve"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "firing" => Ok(Mode::Firing),
            "autoresolve" => Ok(Mode::AutoResolve),
            _ => Err(format!("unknown trigger mode: {s}")),
        }
    }
}

/// How a condition set combines within one evaluation cycle: `All` requires
/// every condition to match, `Any` requires at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    All,
    Any,
}

/// Reported availability state of a monitored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityType {
    Up,
    Down,
    Unavailable,
}

impl std::fmt::Display for AvailabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityType::Up => write!(f, "up"),
            AvailabilityType::Down => write!(f, "down"),
            AvailabilityType::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// The typed payload of a data point or evaluation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataValue {
    Numeric(f64),
    Text(String),
    Availability(AvailabilityType),
}

impl DataValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            DataValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_availability(&self) -> Option<AvailabilityType> {
        match self {
            DataValue::Availability(a) => Some(*a),
            _ => None,
        }
    }

    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Numeric(_) => "numeric",
            DataValue::Text(_) => "text",
            DataValue::Availability(_) => "availability",
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Numeric(v) => write!(f, "{v}"),
            DataValue::Text(s) => write!(f, "{s}"),
            DataValue::Availability(a) => write!(f, "{a}"),
        }
    }
}

/// One incoming time-series data point, already time-stamped and tagged with
/// the `data_id` stream it belongs to. Aligning points across streams into
/// one evaluation cycle is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    pub data_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: DataValue,
}

impl Data {
    pub fn numeric(data_id: &str, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            data_id: data_id.to_string(),
            timestamp,
            value: DataValue::Numeric(value),
        }
    }

    pub fn text(data_id: &str, timestamp: DateTime<Utc>, value: &str) -> Self {
        Self {
            data_id: data_id.to_string(),
            timestamp,
            value: DataValue::Text(value.to_string()),
        }
    }

    pub fn availability(data_id: &str, timestamp: DateTime<Utc>, state: AvailabilityType) -> Self {
        Self {
            data_id: data_id.to_string(),
            timestamp,
            value: DataValue::Availability(state),
        }
    }
}

/// A named alerting rule: owns a condition set and a dampening policy per
/// evaluation [`Mode`], plus action bindings dispatched when it fires.
///
/// Triggers start disabled; the evaluation engine only loads enabled ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub tenant_id: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub severity: Severity,
    /// Disable the trigger after it fires.
    pub auto_disable: bool,
    /// Switch to [`Mode::AutoResolve`] after firing; a satisfied autoresolve
    /// cycle bulk-resolves the trigger's alerts and switches back.
    pub auto_resolve: bool,
    pub firing_match: MatchMode,
    pub auto_resolve_match: MatchMode,
    /// Action bindings: plugin name -> action ids dispatched on fire.
    pub actions: HashMap<String, BTreeSet<String>>,
}

impl Trigger {
    pub fn new(tenant_id: &str, id: &str, name: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            enabled: false,
            severity: Severity::Medium,
            auto_disable: false,
            auto_resolve: false,
            firing_match: MatchMode::All,
            auto_resolve_match: MatchMode::All,
            actions: HashMap::new(),
        }
    }

    /// Binds an action id under the given plugin.
    pub fn add_action(&mut self, plugin: &str, action_id: &str) {
        self.actions
            .entry(plugin.to_string())
            .or_default()
            .insert(action_id.to_string());
    }

    pub fn match_for(&self, mode: Mode) -> MatchMode {
        match mode {
            Mode::Firing => self.firing_match,
            Mode::AutoResolve => self.auto_resolve_match,
        }
    }
}

/// A user-visible (or, for automatic `dataId` tags, invisible) piece of
/// trigger metadata. Tags double as a secondary index: the reverse
/// `(tenant, category, name) -> trigger ids` index answers
/// "which triggers reference data stream X" without a full scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tenant_id: String,
    pub trigger_id: String,
    /// May be empty; automatic data-stream tags use [`Tag::DATA_ID_CATEGORY`].
    pub category: String,
    pub name: String,
    pub visible: bool,
}

impl Tag {
    /// Category under which every condition's data id is indexed
    /// automatically (invisible).
    pub const DATA_ID_CATEGORY: &'static str = "dataId";

    pub fn new(tenant_id: &str, trigger_id: &str, category: &str, name: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            category: category.to_string(),
            name: name.to_string(),
            visible: true,
        }
    }

    /// An invisible tag indexing a condition's data id.
    pub fn data_id(tenant_id: &str, trigger_id: &str, data_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            category: Self::DATA_ID_CATEGORY.to_string(),
            name: data_id.to_string(),
            visible: false,
        }
    }
}

/// A durable alert record, created when a trigger's firing dampening is
/// satisfied and mutated only through the acknowledge/resolve transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub tenant_id: String,
    pub alert_id: String,
    pub trigger_id: String,
    pub severity: Severity,
    pub status: AlertStatus,
    /// Creation time; drives time-range queries and default ordering.
    pub ctime: DateTime<Utc>,
    /// The evaluation sets that satisfied the firing dampening.
    pub eval_sets: Vec<Vec<ConditionEval>>,
    pub ack_by: Option<String>,
    pub ack_notes: Option<String>,
    pub ack_time: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_notes: Option<String>,
    pub resolved_time: Option<DateTime<Utc>>,
    /// The autoresolve evaluation sets recorded when the alert was resolved.
    pub resolved_eval_sets: Vec<Vec<ConditionEval>>,
}

impl Alert {
    /// Creates an open alert with a generated id and the current time.
    pub fn new(
        tenant_id: &str,
        trigger_id: &str,
        severity: Severity,
        eval_sets: Vec<Vec<ConditionEval>>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            alert_id: crate::id::next_id(),
            trigger_id: trigger_id.to_string(),
            severity,
            status: AlertStatus::Open,
            ctime: Utc::now(),
            eval_sets,
            ack_by: None,
            ack_notes: None,
            ack_time: None,
            resolved_by: None,
            resolved_notes: None,
            resolved_time: None,
            resolved_eval_sets: Vec::new(),
        }
    }

    /// Clone without eval sets, for thin listings.
    pub fn thin(&self) -> Self {
        let mut a = self.clone();
        a.eval_sets = Vec::new();
        a.resolved_eval_sets = Vec::new();
        a
    }
}
