//! Filter criteria for alert queries. Every field is optional; singular and
//! plural forms of the same filter are merged before use, so callers can set
//! whichever is convenient.

use crate::types::{AlertStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One tag filter. At least one component must be set: an absent `category`
/// matches the name in any category, an absent `name` matches every tag of
/// the category. A query with neither is rejected before it reaches the
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagQuery {
    pub category: Option<String>,
    pub name: Option<String>,
}

impl TagQuery {
    pub fn new(category: Option<&str>, name: Option<&str>) -> Self {
        Self {
            category: category.map(|c| c.to_string()),
            name: name.map(|n| n.to_string()),
        }
    }

    /// True when neither component is set, i.e. the filter constrains
    /// nothing.
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.name.is_none()
    }
}

/// Conjunction of filters for fetching alerts. Filters of different kinds
/// are ANDed; values within one kind are ORed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertsCriteria {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub alert_id: Option<String>,
    pub alert_ids: Vec<String>,
    pub status: Option<AlertStatus>,
    pub statuses: Vec<AlertStatus>,
    pub severity: Option<Severity>,
    pub severities: Vec<Severity>,
    pub trigger_id: Option<String>,
    pub trigger_ids: Vec<String>,
    pub tag: Option<TagQuery>,
    pub tags: Vec<TagQuery>,
    /// Strip evaluation payloads from returned alerts. Not a filter: it does
    /// not count towards [`AlertsCriteria::has_criteria`].
    pub thin: bool,
}

impl AlertsCriteria {
    /// True when at least one filter is set. `thin` alone does not count.
    pub fn has_criteria(&self) -> bool {
        self.start_time.is_some()
            || self.end_time.is_some()
            || self.alert_id.is_some()
            || !self.alert_ids.is_empty()
            || self.status.is_some()
            || !self.statuses.is_empty()
            || self.severity.is_some()
            || !self.severities.is_empty()
            || self.trigger_id.is_some()
            || !self.trigger_ids.is_empty()
            || self.tag.is_some()
            || !self.tags.is_empty()
    }

    pub fn combined_alert_ids(&self) -> HashSet<String> {
        let mut out: HashSet<String> = self.alert_ids.iter().cloned().collect();
        if let Some(id) = &self.alert_id {
            out.insert(id.clone());
        }
        out
    }

    pub fn combined_trigger_ids(&self) -> HashSet<String> {
        let mut out: HashSet<String> = self.trigger_ids.iter().cloned().collect();
        if let Some(id) = &self.trigger_id {
            out.insert(id.clone());
        }
        out
    }

    pub fn combined_statuses(&self) -> HashSet<AlertStatus> {
        let mut out: HashSet<AlertStatus> = self.statuses.iter().copied().collect();
        if let Some(s) = self.status {
            out.insert(s);
        }
        out
    }

    pub fn combined_severities(&self) -> HashSet<Severity> {
        let mut out: HashSet<Severity> = self.severities.iter().copied().collect();
        if let Some(s) = self.severity {
            out.insert(s);
        }
        out
    }

    pub fn combined_tags(&self) -> Vec<TagQuery> {
        let mut out = self.tags.clone();
        if let Some(t) = &self.tag {
            if !out.contains(t) {
                out.push(t.clone());
            }
        }
        out
    }
}
