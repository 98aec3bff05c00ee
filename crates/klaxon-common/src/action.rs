//! Action plugin types. An [`ActionDefinition`] is the stored configuration
//! of one named action of a plugin; an [`Action`] is one dispatch of that
//! action carrying the serialized alert that caused it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored configuration for one (plugin, action id) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub tenant_id: String,
    pub action_plugin: String,
    pub action_id: String,
    pub properties: HashMap<String, String>,
}

impl ActionDefinition {
    pub fn new(tenant_id: &str, action_plugin: &str, action_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            action_plugin: action_plugin.to_string(),
            action_id: action_id.to_string(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

/// One action dispatch. `message` is the JSON form of the firing alert,
/// produced by the engine at fire time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub tenant_id: String,
    pub action_plugin: String,
    pub action_id: String,
    pub alert_id: String,
    pub ctime: DateTime<Utc>,
    pub message: String,
}

impl Action {
    pub fn new(
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
        alert_id: &str,
        message: String,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            action_plugin: action_plugin.to_string(),
            action_id: action_id.to_string(),
            alert_id: alert_id.to_string(),
            ctime: Utc::now(),
            message,
        }
    }
}
