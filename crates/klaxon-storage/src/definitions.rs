//! Definitions service: CRUD for triggers, conditions, dampenings, tags and
//! action definitions, plus the listener channel through which the engine
//! learns about changes.
//!
//! Every mutation that can affect evaluation emits one [`DefinitionsEvent`]
//! naming the tenant and trigger, so listeners reload exactly the trigger
//! that changed. Deletes of absent records are ignored with a debug log;
//! creates of existing records and updates of absent ones fail.

use async_trait::async_trait;
use klaxon_common::condition::{parse_condition_id, Condition, ConditionSpec};
use klaxon_common::dampening::Dampening;
use klaxon_common::event::{DefinitionsEvent, DefinitionsEventType};
use klaxon_common::types::{Mode, Tag, Trigger};
use klaxon_common::{action::ActionDefinition, id};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, StorageError};
use crate::StorageEngine;

/// Receives definition-change events, delivered in mutation order.
#[async_trait]
pub trait DefinitionsListener: Send + Sync {
    async fn on_change(&self, event: &DefinitionsEvent);
}

/// Definition store front end.
pub struct DefinitionsService {
    store: Arc<dyn StorageEngine>,
    listeners: RwLock<Vec<Arc<dyn DefinitionsListener>>>,
}

impl DefinitionsService {
    pub fn new(store: Arc<dyn StorageEngine>) -> Self {
        Self {
            store,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes a listener to every future definitions event.
    pub async fn register_listener(&self, listener: Arc<dyn DefinitionsListener>) {
        self.listeners.write().await.push(listener);
    }

    async fn notify(&self, event_type: DefinitionsEventType, tenant_id: &str, trigger_id: &str) {
        let event = DefinitionsEvent::new(event_type, tenant_id, trigger_id);
        let listeners = self.listeners.read().await.clone();
        tracing::debug!(
            "notifying {} listeners of {} for trigger {}",
            listeners.len(),
            event.event_type,
            trigger_id
        );
        for listener in listeners {
            listener.on_change(&event).await;
        }
    }

    // --- triggers ---

    /// Creates a new trigger. Fails if a trigger with the same id exists.
    pub async fn add_trigger(&self, tenant_id: &str, mut trigger: Trigger) -> Result<Trigger> {
        require(tenant_id, "tenantId")?;
        require(&trigger.id, "triggerId")?;
        require(&trigger.name, "trigger name")?;
        align_tenant(tenant_id, &mut trigger.tenant_id, "trigger");

        if self.store.get_trigger(tenant_id, &trigger.id).await?.is_some() {
            return Err(StorageError::AlreadyExists {
                entity: "trigger",
                id: trigger.id.clone(),
            });
        }
        // New triggers start disabled, so there is nothing to tell the
        // engine about yet; enabling happens through update_trigger.
        self.store.put_trigger(&trigger).await?;
        Ok(trigger)
    }

    /// Overwrites an existing trigger. Fails if the trigger does not exist.
    pub async fn update_trigger(&self, tenant_id: &str, mut trigger: Trigger) -> Result<Trigger> {
        require(tenant_id, "tenantId")?;
        require(&trigger.id, "triggerId")?;
        align_tenant(tenant_id, &mut trigger.tenant_id, "trigger");

        if self.store.get_trigger(tenant_id, &trigger.id).await?.is_none() {
            return Err(StorageError::NotFound {
                entity: "trigger",
                id: trigger.id.clone(),
            });
        }
        self.store.put_trigger(&trigger).await?;
        self.notify(DefinitionsEventType::TriggerChange, tenant_id, &trigger.id)
            .await;
        Ok(trigger)
    }

    /// Removes a trigger with all of its conditions, dampenings and tags.
    /// Removing an absent trigger is a no-op.
    pub async fn remove_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<()> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;

        if self.store.get_trigger(tenant_id, trigger_id).await?.is_none() {
            tracing::debug!("Ignoring removeTrigger [{}], the trigger does not exist", trigger_id);
            return Ok(());
        }

        self.remove_tags(tenant_id, trigger_id, None, None).await?;
        self.store.delete_conditions(tenant_id, trigger_id).await?;
        for mode in [Mode::Firing, Mode::AutoResolve] {
            self.store.delete_dampening(tenant_id, trigger_id, mode).await?;
        }
        self.store.delete_trigger(tenant_id, trigger_id).await?;
        self.notify(DefinitionsEventType::TriggerChange, tenant_id, trigger_id)
            .await;
        Ok(())
    }

    pub async fn get_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Option<Trigger>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        self.store.get_trigger(tenant_id, trigger_id).await
    }

    /// Returns the triggers of a tenant, ordered by id.
    pub async fn get_triggers(&self, tenant_id: &str) -> Result<Vec<Trigger>> {
        require(tenant_id, "tenantId")?;
        let mut triggers = self.store.triggers_by_tenant(tenant_id).await?;
        triggers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(triggers)
    }

    /// Returns every trigger of every tenant. The engine uses this to build
    /// its working set at startup.
    pub async fn get_all_triggers(&self) -> Result<Vec<Trigger>> {
        self.store.all_triggers().await
    }

    /// Copies a trigger under a fresh id, rewriting the data ids of every
    /// condition through `data_id_map`. The map's keyset must be exactly the
    /// data ids the condition set reads. The copy starts disabled.
    pub async fn copy_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        data_id_map: &HashMap<String, String>,
    ) -> Result<Trigger> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        if data_id_map.is_empty() {
            return Err(StorageError::Validation(
                "dataIdMap must not be empty".to_string(),
            ));
        }
        let trigger = self
            .store
            .get_trigger(tenant_id, trigger_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "trigger",
                id: trigger_id.to_string(),
            })?;

        let conditions = self.store.trigger_conditions(tenant_id, trigger_id).await?;
        let used: HashSet<&str> = conditions.iter().flat_map(|c| c.data_ids()).collect();
        let mapped: HashSet<&str> = data_id_map.keys().map(|k| k.as_str()).collect();
        if used != mapped {
            return Err(StorageError::Validation(format!(
                "dataIdMap keyset {:?} must match the dataIds used by the condition set {:?}",
                mapped, used
            )));
        }
        let dampenings = self.store.trigger_dampenings(tenant_id, trigger_id).await?;

        let mut copy = Trigger::new(tenant_id, &id::next_id(), &trigger.name);
        copy.description = trigger.description.clone();
        copy.severity = trigger.severity;
        copy.firing_match = trigger.firing_match;
        copy.auto_resolve_match = trigger.auto_resolve_match;
        copy.actions = trigger.actions.clone();
        let copy = self.add_trigger(tenant_id, copy).await?;

        for mode in [Mode::Firing, Mode::AutoResolve] {
            let mode_conditions: Vec<Condition> = conditions
                .iter()
                .filter(|c| c.trigger_mode == mode)
                .map(|c| {
                    let mut next = c.clone();
                    next.tenant_id = tenant_id.to_string();
                    next.trigger_id = copy.id.clone();
                    if let Some(new_id) = data_id_map.get(&next.data_id) {
                        next.data_id = new_id.clone();
                    }
                    if let ConditionSpec::Compare { data2_id, .. } = &mut next.spec {
                        if let Some(new_id) = data_id_map.get(data2_id) {
                            *data2_id = new_id.clone();
                        }
                    }
                    next
                })
                .collect();
            if !mode_conditions.is_empty() {
                self.set_conditions(tenant_id, &copy.id, mode, mode_conditions)
                    .await?;
            }
        }

        for dampening in dampenings {
            let mut next = dampening.clone();
            next.tenant_id = tenant_id.to_string();
            next.trigger_id = copy.id.clone();
            self.add_dampening(tenant_id, next).await?;
        }

        Ok(copy)
    }

    // --- conditions ---

    /// Replaces the condition set of one (trigger, mode). Set size and dense
    /// 1-based indexes are assigned here; whatever the caller put in those
    /// fields is overwritten. Passing an empty set clears the mode.
    ///
    /// The invisible `dataId` tags of the trigger are re-synced against the
    /// data ids used by the conditions of both modes.
    pub async fn set_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        mut conditions: Vec<Condition>,
    ) -> Result<Vec<Condition>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        for condition in &conditions {
            require(&condition.data_id, "condition dataId")?;
        }

        let size = conditions.len();
        for (i, condition) in conditions.iter_mut().enumerate() {
            condition.tenant_id = tenant_id.to_string();
            condition.trigger_id = trigger_id.to_string();
            condition.trigger_mode = mode;
            condition.condition_set_size = size;
            condition.condition_set_index = i + 1;
        }
        self.store
            .set_conditions(tenant_id, trigger_id, mode, &conditions)
            .await?;

        self.sync_data_id_tags(tenant_id, trigger_id).await?;
        self.notify(DefinitionsEventType::ConditionChange, tenant_id, trigger_id)
            .await;
        Ok(conditions)
    }

    /// Appends one condition to the (trigger, mode) set, renumbering the set.
    pub async fn add_condition(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        condition: Condition,
    ) -> Result<Vec<Condition>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        let mut conditions = self.store.conditions_for(tenant_id, trigger_id, mode).await?;
        conditions.push(condition);
        self.set_conditions(tenant_id, trigger_id, mode, conditions).await
    }

    /// Removes one condition by id, renumbering the remaining set. Removing
    /// an id that no longer exists leaves the set untouched.
    pub async fn remove_condition(
        &self,
        tenant_id: &str,
        condition_id: &str,
    ) -> Result<Vec<Condition>> {
        require(tenant_id, "tenantId")?;
        let (trigger_id, mode, _, _) =
            parse_condition_id(condition_id).map_err(StorageError::Validation)?;

        let conditions = self.store.conditions_for(tenant_id, &trigger_id, mode).await?;
        if !conditions.iter().any(|c| c.condition_id() == condition_id) {
            tracing::debug!(
                "Ignoring removeCondition [{}], the condition does not exist",
                condition_id
            );
            return Ok(conditions);
        }
        let remaining: Vec<Condition> = conditions
            .into_iter()
            .filter(|c| c.condition_id() != condition_id)
            .collect();
        self.set_conditions(tenant_id, &trigger_id, mode, remaining).await
    }

    /// Replaces one condition in place, keyed by its condition id. Fails if
    /// no condition with that id exists.
    pub async fn update_condition(
        &self,
        tenant_id: &str,
        condition: Condition,
    ) -> Result<Vec<Condition>> {
        require(tenant_id, "tenantId")?;
        let condition_id = condition.condition_id();
        let (trigger_id, mode, _, _) =
            parse_condition_id(&condition_id).map_err(StorageError::Validation)?;

        let conditions = self.store.conditions_for(tenant_id, &trigger_id, mode).await?;
        if !conditions.iter().any(|c| c.condition_id() == condition_id) {
            return Err(StorageError::NotFound {
                entity: "condition",
                id: condition_id,
            });
        }
        let replaced: Vec<Condition> = conditions
            .into_iter()
            .map(|c| {
                if c.condition_id() == condition_id {
                    condition.clone()
                } else {
                    c
                }
            })
            .collect();
        self.set_conditions(tenant_id, &trigger_id, mode, replaced).await
    }

    /// Returns a trigger's conditions, for one mode or for both.
    pub async fn get_trigger_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Condition>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        match mode {
            Some(mode) => self.store.conditions_for(tenant_id, trigger_id, mode).await,
            None => self.store.trigger_conditions(tenant_id, trigger_id).await,
        }
    }

    /// Brings the invisible `dataId` tags of the trigger in line with the
    /// data ids its conditions (both modes) currently read.
    async fn sync_data_id_tags(&self, tenant_id: &str, trigger_id: &str) -> Result<()> {
        let conditions = self.store.trigger_conditions(tenant_id, trigger_id).await?;
        let wanted: HashSet<String> = conditions
            .iter()
            .flat_map(|c| c.data_ids())
            .map(|d| d.to_string())
            .collect();

        let current: Vec<Tag> = self
            .store
            .tags_for_trigger(tenant_id, trigger_id)
            .await?
            .into_iter()
            .filter(|t| t.category == Tag::DATA_ID_CATEGORY)
            .collect();

        for tag in &current {
            if !wanted.contains(&tag.name) {
                self.store
                    .delete_tag(tenant_id, trigger_id, &tag.category, &tag.name)
                    .await?;
                self.store
                    .tag_index_remove(tenant_id, &tag.category, &tag.name, trigger_id)
                    .await?;
            }
        }
        let present: HashSet<&String> = current.iter().map(|t| &t.name).collect();
        for data_id in &wanted {
            if !present.contains(data_id) {
                let tag = Tag::data_id(tenant_id, trigger_id, data_id);
                self.store.put_tag(&tag).await?;
                self.store
                    .tag_index_add(tenant_id, &tag.category, &tag.name, trigger_id)
                    .await?;
            }
        }
        Ok(())
    }

    // --- dampenings ---

    /// Creates the dampening of one (trigger, mode). Fails if one exists.
    pub async fn add_dampening(&self, tenant_id: &str, mut dampening: Dampening) -> Result<Dampening> {
        require(tenant_id, "tenantId")?;
        require(&dampening.trigger_id, "triggerId")?;
        align_tenant(tenant_id, &mut dampening.tenant_id, "dampening");
        dampening.validate().map_err(StorageError::Validation)?;

        if self
            .store
            .get_dampening(tenant_id, &dampening.trigger_id, dampening.trigger_mode)
            .await?
            .is_some()
        {
            return Err(StorageError::AlreadyExists {
                entity: "dampening",
                id: dampening.dampening_id(),
            });
        }
        self.store.put_dampening(&dampening).await?;
        self.notify(
            DefinitionsEventType::DampeningChange,
            tenant_id,
            &dampening.trigger_id,
        )
        .await;
        Ok(dampening)
    }

    /// Overwrites the dampening of one (trigger, mode). Fails if absent.
    pub async fn update_dampening(
        &self,
        tenant_id: &str,
        mut dampening: Dampening,
    ) -> Result<Dampening> {
        require(tenant_id, "tenantId")?;
        require(&dampening.trigger_id, "triggerId")?;
        align_tenant(tenant_id, &mut dampening.tenant_id, "dampening");
        dampening.validate().map_err(StorageError::Validation)?;

        if self
            .store
            .get_dampening(tenant_id, &dampening.trigger_id, dampening.trigger_mode)
            .await?
            .is_none()
        {
            return Err(StorageError::NotFound {
                entity: "dampening",
                id: dampening.dampening_id(),
            });
        }
        self.store.put_dampening(&dampening).await?;
        self.notify(
            DefinitionsEventType::DampeningChange,
            tenant_id,
            &dampening.trigger_id,
        )
        .await;
        Ok(dampening)
    }

    /// Removes the dampening of one (trigger, mode). Removing an absent
    /// dampening is a no-op.
    pub async fn remove_dampening(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
    ) -> Result<()> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;

        if self.store.get_dampening(tenant_id, trigger_id, mode).await?.is_none() {
            tracing::debug!(
                "Ignoring removeDampening [{}-{}], the dampening does not exist",
                trigger_id,
                mode
            );
            return Ok(());
        }
        self.store.delete_dampening(tenant_id, trigger_id, mode).await?;
        self.notify(DefinitionsEventType::DampeningChange, tenant_id, trigger_id)
            .await;
        Ok(())
    }

    pub async fn get_dampening(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
    ) -> Result<Option<Dampening>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        self.store.get_dampening(tenant_id, trigger_id, mode).await
    }

    /// Returns a trigger's dampenings, for one mode or for both.
    pub async fn get_trigger_dampenings(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Dampening>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        let dampenings = self.store.trigger_dampenings(tenant_id, trigger_id).await?;
        Ok(match mode {
            Some(mode) => dampenings
                .into_iter()
                .filter(|d| d.trigger_mode == mode)
                .collect(),
            None => dampenings,
        })
    }

    // --- tags ---

    /// Adds one tag to a trigger, maintaining the reverse index. Re-adding
    /// an existing (category, name) pair overwrites its visibility.
    pub async fn add_tag(&self, tenant_id: &str, mut tag: Tag) -> Result<Tag> {
        require(tenant_id, "tenantId")?;
        require(&tag.trigger_id, "tag triggerId")?;
        require(&tag.name, "tag name")?;
        align_tenant(tenant_id, &mut tag.tenant_id, "tag");

        self.store.put_tag(&tag).await?;
        self.store
            .tag_index_add(tenant_id, &tag.category, &tag.name, &tag.trigger_id)
            .await?;
        Ok(tag)
    }

    /// Removes the tags of a trigger matching the optional category and name
    /// filters. With no filters, removes all of them.
    pub async fn remove_tags(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        category: Option<&str>,
        name: Option<&str>,
    ) -> Result<()> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;

        let tags = self.store.tags_for_trigger(tenant_id, trigger_id).await?;
        for tag in tags {
            if category.map_or(true, |c| tag.category == c) && name.map_or(true, |n| tag.name == n) {
                self.store
                    .delete_tag(tenant_id, trigger_id, &tag.category, &tag.name)
                    .await?;
                self.store
                    .tag_index_remove(tenant_id, &tag.category, &tag.name, trigger_id)
                    .await?;
            }
        }
        Ok(())
    }

    /// Returns a trigger's tags, optionally limited to one category, ordered
    /// by (category, name).
    pub async fn get_trigger_tags(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<Tag>> {
        require(tenant_id, "tenantId")?;
        require(trigger_id, "triggerId")?;
        let mut tags = self.store.tags_for_trigger(tenant_id, trigger_id).await?;
        if let Some(category) = category {
            tags.retain(|t| t.category == category);
        }
        tags.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(tags)
    }

    // --- action definitions ---

    /// Creates an action definition. Fails if the (plugin, actionId) pair
    /// already exists for the tenant.
    pub async fn add_action_definition(
        &self,
        tenant_id: &str,
        mut definition: ActionDefinition,
    ) -> Result<ActionDefinition> {
        require(tenant_id, "tenantId")?;
        require(&definition.action_plugin, "actionPlugin")?;
        require(&definition.action_id, "actionId")?;
        align_tenant(tenant_id, &mut definition.tenant_id, "action definition");

        if self
            .store
            .get_action_definition(tenant_id, &definition.action_plugin, &definition.action_id)
            .await?
            .is_some()
        {
            return Err(StorageError::AlreadyExists {
                entity: "action definition",
                id: format!("{}/{}", definition.action_plugin, definition.action_id),
            });
        }
        self.store.put_action_definition(&definition).await?;
        Ok(definition)
    }

    /// Overwrites an action definition. Fails if it does not exist.
    pub async fn update_action_definition(
        &self,
        tenant_id: &str,
        mut definition: ActionDefinition,
    ) -> Result<ActionDefinition> {
        require(tenant_id, "tenantId")?;
        require(&definition.action_plugin, "actionPlugin")?;
        require(&definition.action_id, "actionId")?;
        align_tenant(tenant_id, &mut definition.tenant_id, "action definition");

        if self
            .store
            .get_action_definition(tenant_id, &definition.action_plugin, &definition.action_id)
            .await?
            .is_none()
        {
            return Err(StorageError::NotFound {
                entity: "action definition",
                id: format!("{}/{}", definition.action_plugin, definition.action_id),
            });
        }
        self.store.put_action_definition(&definition).await?;
        Ok(definition)
    }

    /// Removes an action definition. Removing an absent one is a no-op.
    pub async fn remove_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<()> {
        require(tenant_id, "tenantId")?;
        require(action_plugin, "actionPlugin")?;
        require(action_id, "actionId")?;

        if self
            .store
            .get_action_definition(tenant_id, action_plugin, action_id)
            .await?
            .is_none()
        {
            tracing::debug!(
                "Ignoring removeActionDefinition [{}/{}], the definition does not exist",
                action_plugin,
                action_id
            );
            return Ok(());
        }
        self.store
            .delete_action_definition(tenant_id, action_plugin, action_id)
            .await
    }

    pub async fn get_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<ActionDefinition>> {
        require(tenant_id, "tenantId")?;
        require(action_plugin, "actionPlugin")?;
        require(action_id, "actionId")?;
        self.store
            .get_action_definition(tenant_id, action_plugin, action_id)
            .await
    }

    /// Returns a tenant's action definitions, ordered by (plugin, actionId).
    pub async fn get_action_definitions(&self, tenant_id: &str) -> Result<Vec<ActionDefinition>> {
        require(tenant_id, "tenantId")?;
        let mut definitions = self.store.action_definitions(tenant_id).await?;
        definitions.sort_by(|a, b| {
            (&a.action_plugin, &a.action_id).cmp(&(&b.action_plugin, &b.action_id))
        });
        Ok(definitions)
    }

    /// Returns a tenant's action definitions for one plugin, ordered by
    /// actionId.
    pub async fn get_action_definitions_by_plugin(
        &self,
        tenant_id: &str,
        action_plugin: &str,
    ) -> Result<Vec<ActionDefinition>> {
        require(tenant_id, "tenantId")?;
        require(action_plugin, "actionPlugin")?;
        let mut definitions = self.store.action_definitions(tenant_id).await?;
        definitions.retain(|d| d.action_plugin == action_plugin);
        definitions.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        Ok(definitions)
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StorageError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

/// A definition carries its own tenant id; the call's tenant id wins.
fn align_tenant(tenant_id: &str, entity_tenant: &mut String, what: &str) {
    if !entity_tenant.is_empty() && entity_tenant != tenant_id {
        tracing::warn!(
            "{} tenantId [{}] does not match [{}], overwriting",
            what,
            entity_tenant,
            tenant_id
        );
    }
    *entity_tenant = tenant_id.to_string();
}
