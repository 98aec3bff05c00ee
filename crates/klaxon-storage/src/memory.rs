//! In-process [`StorageEngine`] backed by tenant-partitioned maps behind
//! `tokio` read-write locks. Record maps and index maps are held in two lock
//! groups so alert writes never contend with definition reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use klaxon_common::action::ActionDefinition;
use klaxon_common::condition::Condition;
use klaxon_common::dampening::Dampening;
use klaxon_common::types::{Alert, AlertStatus, Mode, Severity, Tag, Trigger};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::{tags, StorageEngine};

#[derive(Default)]
struct AlertData {
    /// tenant -> alert id -> alert
    alerts: HashMap<String, HashMap<String, Alert>>,
    /// tenant -> trigger id -> alert ids
    by_trigger: HashMap<String, HashMap<String, HashSet<String>>>,
    /// tenant -> ctime -> alert ids, ordered for range scans
    by_ctime: HashMap<String, BTreeMap<DateTime<Utc>, BTreeSet<String>>>,
    /// tenant -> status -> alert ids
    by_status: HashMap<String, HashMap<AlertStatus, HashSet<String>>>,
    /// tenant -> severity -> alert ids
    by_severity: HashMap<String, HashMap<Severity, HashSet<String>>>,
}

#[derive(Default)]
struct DefinitionData {
    /// tenant -> trigger id -> trigger
    triggers: HashMap<String, HashMap<String, Trigger>>,
    /// tenant -> (trigger id, mode) -> ordered condition set
    conditions: HashMap<String, HashMap<(String, Mode), Vec<Condition>>>,
    /// tenant -> (trigger id, mode) -> dampening
    dampenings: HashMap<String, HashMap<(String, Mode), Dampening>>,
    /// tenant -> trigger id -> forward tags
    tags: HashMap<String, HashMap<String, Vec<Tag>>>,
    /// tenant -> (category, name) -> trigger ids
    tag_index: HashMap<String, HashMap<(String, String), HashSet<String>>>,
    /// tenant -> (plugin, action id) -> definition
    actions: HashMap<String, HashMap<(String, String), ActionDefinition>>,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    alerts: RwLock<AlertData>,
    definitions: RwLock<DefinitionData>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageEngine for MemoryStorage {
    // --- alerts ---

    async fn put_alert(&self, alert: &Alert) -> Result<()> {
        let mut data = self.alerts.write().await;
        data.alerts
            .entry(alert.tenant_id.clone())
            .or_default()
            .insert(alert.alert_id.clone(), alert.clone());
        Ok(())
    }

    async fn get_alert(&self, tenant_id: &str, alert_id: &str) -> Result<Option<Alert>> {
        let data = self.alerts.read().await;
        Ok(data
            .alerts
            .get(tenant_id)
            .and_then(|m| m.get(alert_id))
            .cloned())
    }

    async fn alerts_by_tenant(&self, tenant_id: &str) -> Result<Vec<Alert>> {
        let data = self.alerts.read().await;
        Ok(data
            .alerts
            .get(tenant_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    // --- alert indexes ---

    async fn add_alert_trigger_index(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        alert_id: &str,
    ) -> Result<()> {
        let mut data = self.alerts.write().await;
        data.by_trigger
            .entry(tenant_id.to_string())
            .or_default()
            .entry(trigger_id.to_string())
            .or_default()
            .insert(alert_id.to_string());
        Ok(())
    }

    async fn alert_ids_by_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Result<HashSet<String>> {
        let data = self.alerts.read().await;
        Ok(data
            .by_trigger
            .get(tenant_id)
            .and_then(|m| m.get(trigger_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn add_alert_ctime_index(
        &self,
        tenant_id: &str,
        ctime: DateTime<Utc>,
        alert_id: &str,
    ) -> Result<()> {
        let mut data = self.alerts.write().await;
        data.by_ctime
            .entry(tenant_id.to_string())
            .or_default()
            .entry(ctime)
            .or_default()
            .insert(alert_id.to_string());
        Ok(())
    }

    async fn alert_ids_by_ctime(
        &self,
        tenant_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>> {
        let data = self.alerts.read().await;
        let mut out = HashSet::new();
        if let Some(index) = data.by_ctime.get(tenant_id) {
            let lower = start.map_or(Bound::Unbounded, Bound::Included);
            let upper = end.map_or(Bound::Unbounded, Bound::Included);
            for ids in index.range((lower, upper)).map(|(_, ids)| ids) {
                out.extend(ids.iter().cloned());
            }
        }
        Ok(out)
    }

    async fn add_alert_status_index(
        &self,
        tenant_id: &str,
        status: AlertStatus,
        alert_id: &str,
    ) -> Result<()> {
        let mut data = self.alerts.write().await;
        data.by_status
            .entry(tenant_id.to_string())
            .or_default()
            .entry(status)
            .or_default()
            .insert(alert_id.to_string());
        Ok(())
    }

    async fn remove_alert_status_index(
        &self,
        tenant_id: &str,
        status: AlertStatus,
        alert_id: &str,
    ) -> Result<()> {
        let mut data = self.alerts.write().await;
        if let Some(ids) = data
            .by_status
            .get_mut(tenant_id)
            .and_then(|m| m.get_mut(&status))
        {
            ids.remove(alert_id);
        }
        Ok(())
    }

    async fn alert_ids_by_status(
        &self,
        tenant_id: &str,
        status: AlertStatus,
    ) -> Result<HashSet<String>> {
        let data = self.alerts.read().await;
        Ok(data
            .by_status
            .get(tenant_id)
            .and_then(|m| m.get(&status))
            .cloned()
            .unwrap_or_default())
    }

    async fn add_alert_severity_index(
        &self,
        tenant_id: &str,
        severity: Severity,
        alert_id: &str,
    ) -> Result<()> {
        let mut data = self.alerts.write().await;
        data.by_severity
            .entry(tenant_id.to_string())
            .or_default()
            .entry(severity)
            .or_default()
            .insert(alert_id.to_string());
        Ok(())
    }

    async fn alert_ids_by_severity(
        &self,
        tenant_id: &str,
        severity: Severity,
    ) -> Result<HashSet<String>> {
        let data = self.alerts.read().await;
        Ok(data
            .by_severity
            .get(tenant_id)
            .and_then(|m| m.get(&severity))
            .cloned()
            .unwrap_or_default())
    }

    // --- triggers ---

    async fn put_trigger(&self, trigger: &Trigger) -> Result<()> {
        let mut data = self.definitions.write().await;
        data.triggers
            .entry(trigger.tenant_id.clone())
            .or_default()
            .insert(trigger.id.clone(), trigger.clone());
        Ok(())
    }

    async fn get_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Option<Trigger>> {
        let data = self.definitions.read().await;
        Ok(data
            .triggers
            .get(tenant_id)
            .and_then(|m| m.get(trigger_id))
            .cloned())
    }

    async fn delete_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<()> {
        let mut data = self.definitions.write().await;
        if let Some(triggers) = data.triggers.get_mut(tenant_id) {
            triggers.remove(trigger_id);
        }
        Ok(())
    }

    async fn triggers_by_tenant(&self, tenant_id: &str) -> Result<Vec<Trigger>> {
        let data = self.definitions.read().await;
        Ok(data
            .triggers
            .get(tenant_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn all_triggers(&self) -> Result<Vec<Trigger>> {
        let data = self.definitions.read().await;
        Ok(data
            .triggers
            .values()
            .flat_map(|m| m.values().cloned())
            .collect())
    }

    // --- conditions ---

    async fn set_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        conditions: &[Condition],
    ) -> Result<()> {
        let mut data = self.definitions.write().await;
        let by_tenant = data.conditions.entry(tenant_id.to_string()).or_default();
        if conditions.is_empty() {
            by_tenant.remove(&(trigger_id.to_string(), mode));
        } else {
            by_tenant.insert((trigger_id.to_string(), mode), conditions.to_vec());
        }
        Ok(())
    }

    async fn conditions_for(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
    ) -> Result<Vec<Condition>> {
        let data = self.definitions.read().await;
        let mut out: Vec<Condition> = data
            .conditions
            .get(tenant_id)
            .and_then(|m| m.get(&(trigger_id.to_string(), mode)))
            .cloned()
            .unwrap_or_default();
        out.sort_by_key(|c| c.condition_set_index);
        Ok(out)
    }

    async fn trigger_conditions(&self, tenant_id: &str, trigger_id: &str) -> Result<Vec<Condition>> {
        let mut out = self.conditions_for(tenant_id, trigger_id, Mode::Firing).await?;
        out.extend(
            self.conditions_for(tenant_id, trigger_id, Mode::AutoResolve)
                .await?,
        );
        Ok(out)
    }

    async fn delete_conditions(&self, tenant_id: &str, trigger_id: &str) -> Result<()> {
        let mut data = self.definitions.write().await;
        if let Some(by_tenant) = data.conditions.get_mut(tenant_id) {
            by_tenant.remove(&(trigger_id.to_string(), Mode::Firing));
            by_tenant.remove(&(trigger_id.to_string(), Mode::AutoResolve));
        }
        Ok(())
    }

    // --- dampenings ---

    async fn put_dampening(&self, dampening: &Dampening) -> Result<()> {
        let mut data = self.definitions.write().await;
        data.dampenings
            .entry(dampening.tenant_id.clone())
            .or_default()
            .insert(
                (dampening.trigger_id.clone(), dampening.trigger_mode),
                dampening.clone(),
            );
        Ok(())
    }

    async fn get_dampening(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
    ) -> Result<Option<Dampening>> {
        let data = self.definitions.read().await;
        Ok(data
            .dampenings
            .get(tenant_id)
            .and_then(|m| m.get(&(trigger_id.to_string(), mode)))
            .cloned())
    }

    async fn delete_dampening(&self, tenant_id: &str, trigger_id: &str, mode: Mode) -> Result<()> {
        let mut data = self.definitions.write().await;
        if let Some(by_tenant) = data.dampenings.get_mut(tenant_id) {
            by_tenant.remove(&(trigger_id.to_string(), mode));
        }
        Ok(())
    }

    async fn trigger_dampenings(&self, tenant_id: &str, trigger_id: &str) -> Result<Vec<Dampening>> {
        let data = self.definitions.read().await;
        let mut out = Vec::new();
        if let Some(by_tenant) = data.dampenings.get(tenant_id) {
            for mode in [Mode::Firing, Mode::AutoResolve] {
                if let Some(d) = by_tenant.get(&(trigger_id.to_string(), mode)) {
                    out.push(d.clone());
                }
            }
        }
        Ok(out)
    }

    // --- tags ---

    async fn put_tag(&self, tag: &Tag) -> Result<()> {
        let mut data = self.definitions.write().await;
        let tags = data
            .tags
            .entry(tag.tenant_id.clone())
            .or_default()
            .entry(tag.trigger_id.clone())
            .or_default();
        tags.retain(|t| !(t.category == tag.category && t.name == tag.name));
        tags.push(tag.clone());
        Ok(())
    }

    async fn delete_tag(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        category: &str,
        name: &str,
    ) -> Result<()> {
        let mut data = self.definitions.write().await;
        if let Some(tags) = data
            .tags
            .get_mut(tenant_id)
            .and_then(|m| m.get_mut(trigger_id))
        {
            tags.retain(|t| !(t.category == category && t.name == name));
        }
        Ok(())
    }

    async fn tags_for_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Vec<Tag>> {
        let data = self.definitions.read().await;
        Ok(data
            .tags
            .get(tenant_id)
            .and_then(|m| m.get(trigger_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn tag_index_add(
        &self,
        tenant_id: &str,
        category: &str,
        name: &str,
        trigger_id: &str,
    ) -> Result<()> {
        let mut data = self.definitions.write().await;
        let index = data.tag_index.entry(tenant_id.to_string()).or_default();
        let key = (category.to_string(), name.to_string());
        let current = index.get(&key).cloned().unwrap_or_default();
        index.insert(key, tags::with_trigger(&current, trigger_id));
        Ok(())
    }

    async fn tag_index_remove(
        &self,
        tenant_id: &str,
        category: &str,
        name: &str,
        trigger_id: &str,
    ) -> Result<()> {
        let mut data = self.definitions.write().await;
        if let Some(index) = data.tag_index.get_mut(tenant_id) {
            let key = (category.to_string(), name.to_string());
            if let Some(current) = index.get(&key) {
                match tags::without_trigger(current, trigger_id) {
                    Some(next) => {
                        index.insert(key, next);
                    }
                    None => {
                        index.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    async fn triggers_by_tag(
        &self,
        tenant_id: &str,
        category: Option<&str>,
        name: Option<&str>,
    ) -> Result<HashSet<String>> {
        let data = self.definitions.read().await;
        let Some(index) = data.tag_index.get(tenant_id) else {
            return Ok(HashSet::new());
        };
        match (category, name) {
            (Some(category), Some(name)) => Ok(index
                .get(&(category.to_string(), name.to_string()))
                .cloned()
                .unwrap_or_default()),
            (None, Some(name)) => {
                let mut out = HashSet::new();
                for ((_, entry_name), ids) in index {
                    if entry_name == name {
                        out.extend(ids.iter().cloned());
                    }
                }
                Ok(out)
            }
            (Some(category), None) => {
                let mut out = HashSet::new();
                for ((entry_category, _), ids) in index {
                    if entry_category == category {
                        out.extend(ids.iter().cloned());
                    }
                }
                Ok(out)
            }
            (None, None) => Ok(HashSet::new()),
        }
    }

    // --- action definitions ---

    async fn put_action_definition(&self, definition: &ActionDefinition) -> Result<()> {
        let mut data = self.definitions.write().await;
        data.actions
            .entry(definition.tenant_id.clone())
            .or_default()
            .insert(
                (
                    definition.action_plugin.clone(),
                    definition.action_id.clone(),
                ),
                definition.clone(),
            );
        Ok(())
    }

    async fn get_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<ActionDefinition>> {
        let data = self.definitions.read().await;
        Ok(data
            .actions
            .get(tenant_id)
            .and_then(|m| m.get(&(action_plugin.to_string(), action_id.to_string())))
            .cloned())
    }

    async fn delete_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<()> {
        let mut data = self.definitions.write().await;
        if let Some(actions) = data.actions.get_mut(tenant_id) {
            actions.remove(&(action_plugin.to_string(), action_id.to_string()));
        }
        Ok(())
    }

    async fn action_definitions(&self, tenant_id: &str) -> Result<Vec<ActionDefinition>> {
        let data = self.definitions.read().await;
        Ok(data
            .actions
            .get(tenant_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}
