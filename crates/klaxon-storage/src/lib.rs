//! Persistence and service layer for triggers, conditions, dampenings, tags,
//! action definitions and alerts.
//!
//! [`StorageEngine`] is a deliberately narrow single-index interface: every
//! method touches one record type or one index. Cross-index semantics such as
//! criteria queries, status transitions and tag bookkeeping live in the
//! services ([`alerts::AlertsService`], [`definitions::DefinitionsService`],
//! [`actions::ActionsService`]) so that any backend implementing the single
//! index contract inherits them unchanged. [`memory::MemoryStorage`] is the
//! in-process implementation.

pub mod actions;
pub mod alerts;
pub mod definitions;
pub mod error;
pub mod memory;
pub mod tags;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use klaxon_common::action::ActionDefinition;
use klaxon_common::condition::Condition;
use klaxon_common::dampening::Dampening;
use klaxon_common::types::{Alert, AlertStatus, Mode, Severity, Tag, Trigger};
use std::collections::HashSet;

use error::Result;

/// Single-index persistence backend.
///
/// Implementations must be safe to share across tasks (`Send + Sync`)
/// because the services fan filter sub-queries out over spawned tasks that
/// all hold the same engine.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    // --- alerts ---

    /// Writes or overwrites one alert record.
    async fn put_alert(&self, alert: &Alert) -> Result<()>;

    /// Reads one alert record.
    async fn get_alert(&self, tenant_id: &str, alert_id: &str) -> Result<Option<Alert>>;

    /// Returns every alert of a tenant, in unspecified order.
    async fn alerts_by_tenant(&self, tenant_id: &str) -> Result<Vec<Alert>>;

    // --- alert indexes ---

    /// Indexes an alert id under its trigger.
    async fn add_alert_trigger_index(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        alert_id: &str,
    ) -> Result<()>;

    /// Returns the alert ids of one trigger.
    async fn alert_ids_by_trigger(&self, tenant_id: &str, trigger_id: &str)
        -> Result<HashSet<String>>;

    /// Indexes an alert id under its creation time.
    async fn add_alert_ctime_index(
        &self,
        tenant_id: &str,
        ctime: DateTime<Utc>,
        alert_id: &str,
    ) -> Result<()>;

    /// Returns the alert ids created inside the inclusive `[start, end]`
    /// range; an absent bound is unbounded on that side.
    async fn alert_ids_by_ctime(
        &self,
        tenant_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>>;

    /// Indexes an alert id under its current status.
    async fn add_alert_status_index(
        &self,
        tenant_id: &str,
        status: AlertStatus,
        alert_id: &str,
    ) -> Result<()>;

    /// Drops an alert id from one status bucket. Absent entries are ignored.
    async fn remove_alert_status_index(
        &self,
        tenant_id: &str,
        status: AlertStatus,
        alert_id: &str,
    ) -> Result<()>;

    /// Returns the alert ids currently in one status.
    async fn alert_ids_by_status(
        &self,
        tenant_id: &str,
        status: AlertStatus,
    ) -> Result<HashSet<String>>;

    /// Indexes an alert id under its severity. Severity never changes after
    /// creation, so there is no matching remove.
    async fn add_alert_severity_index(
        &self,
        tenant_id: &str,
        severity: Severity,
        alert_id: &str,
    ) -> Result<()>;

    /// Returns the alert ids of one severity.
    async fn alert_ids_by_severity(
        &self,
        tenant_id: &str,
        severity: Severity,
    ) -> Result<HashSet<String>>;

    // --- triggers ---

    /// Writes or overwrites one trigger.
    async fn put_trigger(&self, trigger: &Trigger) -> Result<()>;

    /// Reads one trigger.
    async fn get_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Option<Trigger>>;

    /// Deletes one trigger record. Cascades are the service's job.
    async fn delete_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<()>;

    /// Returns every trigger of a tenant.
    async fn triggers_by_tenant(&self, tenant_id: &str) -> Result<Vec<Trigger>>;

    /// Returns every trigger of every tenant. Used by the engine to build its
    /// working set at startup.
    async fn all_triggers(&self) -> Result<Vec<Trigger>>;

    // --- conditions ---

    /// Replaces the whole condition set of one (trigger, mode).
    async fn set_conditions(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        conditions: &[Condition],
    ) -> Result<()>;

    /// Returns the condition set of one (trigger, mode), ordered by set index.
    async fn conditions_for(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
    ) -> Result<Vec<Condition>>;

    /// Returns the conditions of both modes of one trigger.
    async fn trigger_conditions(&self, tenant_id: &str, trigger_id: &str) -> Result<Vec<Condition>>;

    /// Drops the condition sets of both modes of one trigger.
    async fn delete_conditions(&self, tenant_id: &str, trigger_id: &str) -> Result<()>;

    // --- dampenings ---

    /// Writes or overwrites one dampening.
    async fn put_dampening(&self, dampening: &Dampening) -> Result<()>;

    /// Reads the dampening of one (trigger, mode).
    async fn get_dampening(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
    ) -> Result<Option<Dampening>>;

    /// Deletes the dampening of one (trigger, mode). Absent entries are ignored.
    async fn delete_dampening(&self, tenant_id: &str, trigger_id: &str, mode: Mode) -> Result<()>;

    /// Returns the dampenings of both modes of one trigger.
    async fn trigger_dampenings(&self, tenant_id: &str, trigger_id: &str) -> Result<Vec<Dampening>>;

    // --- tags ---

    /// Writes one forward tag record. Overwrites an equal (trigger, category,
    /// name) entry.
    async fn put_tag(&self, tag: &Tag) -> Result<()>;

    /// Deletes one forward tag record. Absent entries are ignored.
    async fn delete_tag(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        category: &str,
        name: &str,
    ) -> Result<()>;

    /// Returns the tags of one trigger.
    async fn tags_for_trigger(&self, tenant_id: &str, trigger_id: &str) -> Result<Vec<Tag>>;

    /// Adds a trigger id to the reverse index entry of (category, name).
    async fn tag_index_add(
        &self,
        tenant_id: &str,
        category: &str,
        name: &str,
        trigger_id: &str,
    ) -> Result<()>;

    /// Drops a trigger id from the reverse index entry of (category, name),
    /// removing the entry when it empties.
    async fn tag_index_remove(
        &self,
        tenant_id: &str,
        category: &str,
        name: &str,
        trigger_id: &str,
    ) -> Result<()>;

    /// Returns the trigger ids carrying a tag, looked up by exact
    /// (category, name), by name across every category, or by category
    /// across every name. A query with neither component matches nothing;
    /// callers validate before reaching the store.
    async fn triggers_by_tag(
        &self,
        tenant_id: &str,
        category: Option<&str>,
        name: Option<&str>,
    ) -> Result<HashSet<String>>;

    // --- action definitions ---

    /// Writes or overwrites one action definition.
    async fn put_action_definition(&self, definition: &ActionDefinition) -> Result<()>;

    /// Reads one action definition.
    async fn get_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<Option<ActionDefinition>>;

    /// Deletes one action definition. Absent entries are ignored.
    async fn delete_action_definition(
        &self,
        tenant_id: &str,
        action_plugin: &str,
        action_id: &str,
    ) -> Result<()>;

    /// Returns every action definition of a tenant.
    async fn action_definitions(&self, tenant_id: &str) -> Result<Vec<ActionDefinition>>;
}
