//! Definition-change events. The definitions service emits one event per
//! mutation that can affect a live trigger, so that the engine reloads just
//! the affected trigger instead of rebuilding its whole working set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionsEventType {
    TriggerChange,
    ConditionChange,
    DampeningChange,
}

impl std::fmt::Display for DefinitionsEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionsEventType::TriggerChange => write!(f, "trigger_change"),
            DefinitionsEventType::ConditionChange => write!(f, "condition_change"),
            DefinitionsEventType::DampeningChange => write!(f, "dampening_change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionsEvent {
    pub event_type: DefinitionsEventType,
    pub tenant_id: String,
    pub trigger_id: String,
}

impl DefinitionsEvent {
    pub fn new(event_type: DefinitionsEventType, tenant_id: &str, trigger_id: &str) -> Self {
        Self {
            event_type,
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
        }
    }
}
