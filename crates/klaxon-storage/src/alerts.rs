//! Alert persistence service: validation and index maintenance on write, the
//! criteria query engine on read, and the status transitions.
//!
//! Criteria queries run one sub-query per filter kind, all concurrently, and
//! intersect the resulting alert id sets. A filter that was requested but
//! matched nothing collapses the whole query to an empty page without
//! fetching anything.

use chrono::Utc;
use klaxon_common::condition::ConditionEval;
use klaxon_common::criteria::AlertsCriteria;
use klaxon_common::paging::{compare_alerts, Page, Pager};
use klaxon_common::types::{Alert, AlertStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Result, StorageError};
use crate::StorageEngine;

const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Outcome of one filter sub-query over an alert id index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilterOutcome {
    /// The criteria did not carry this filter.
    NotApplied,
    /// The filter ran and matched no alert at all.
    Empty,
    /// The filter ran and matched exactly these alert ids.
    Ids(HashSet<String>),
}

/// Folds one filter outcome into the intersection accumulator. `None` means
/// no filter has contributed yet; `Some` is the ids every applied filter so
/// far agreed on.
pub(crate) fn intersect(
    acc: Option<HashSet<String>>,
    outcome: FilterOutcome,
) -> Option<HashSet<String>> {
    match outcome {
        FilterOutcome::NotApplied => acc,
        FilterOutcome::Empty => Some(HashSet::new()),
        FilterOutcome::Ids(ids) => match acc {
            None => Some(ids),
            Some(current) => Some(current.intersection(&ids).cloned().collect()),
        },
    }
}

/// Alert store front end. Writes keep the four query indexes in step with
/// the record; reads answer criteria queries by index intersection.
pub struct AlertsService {
    store: Arc<dyn StorageEngine>,
    fetch_concurrency: usize,
}

impl AlertsService {
    pub fn new(store: Arc<dyn StorageEngine>) -> Self {
        Self {
            store,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Caps how many per-id record fetches one query runs at a time.
    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }

    /// Persists a batch of alerts and indexes each one by trigger, creation
    /// time, status and severity.
    pub async fn add_alerts(&self, alerts: Vec<Alert>) -> Result<()> {
        for alert in &alerts {
            if alert.tenant_id.is_empty() {
                return Err(StorageError::Validation(
                    "alert tenantId must not be empty".to_string(),
                ));
            }
            if alert.alert_id.is_empty() {
                return Err(StorageError::Validation(
                    "alertId must not be empty".to_string(),
                ));
            }
            if alert.trigger_id.is_empty() {
                return Err(StorageError::Validation(
                    "alert triggerId must not be empty".to_string(),
                ));
            }
        }
        for alert in &alerts {
            self.store.put_alert(alert).await?;
            self.store
                .add_alert_trigger_index(&alert.tenant_id, &alert.trigger_id, &alert.alert_id)
                .await?;
            self.store
                .add_alert_ctime_index(&alert.tenant_id, alert.ctime, &alert.alert_id)
                .await?;
            self.store
                .add_alert_status_index(&alert.tenant_id, alert.status, &alert.alert_id)
                .await?;
            self.store
                .add_alert_severity_index(&alert.tenant_id, alert.severity, &alert.alert_id)
                .await?;
        }
        Ok(())
    }

    /// Persists a single alert. Same indexing as [`AlertsService::add_alerts`].
    pub async fn create_alert(&self, alert: Alert) -> Result<Alert> {
        self.add_alerts(vec![alert.clone()]).await?;
        Ok(alert)
    }

    /// Reads one alert by id, optionally thinned.
    pub async fn get_alert(
        &self,
        tenant_id: &str,
        alert_id: &str,
        thin: bool,
    ) -> Result<Option<Alert>> {
        if tenant_id.is_empty() {
            return Err(StorageError::Validation(
                "tenantId must not be empty".to_string(),
            ));
        }
        if alert_id.is_empty() {
            return Err(StorageError::Validation(
                "alertId must not be empty".to_string(),
            ));
        }
        let alert = self.store.get_alert(tenant_id, alert_id).await?;
        Ok(alert.map(|a| if thin { a.thin() } else { a }))
    }

    /// Fetches the alerts matching `criteria`, ordered and cut down to one
    /// page.
    ///
    /// Without criteria this is a single tenant scan. With criteria, each
    /// filter kind runs as its own sub-query over one index and the id sets
    /// are intersected in a fixed order; as soon as the intersection empties
    /// the query returns an empty page with total size 0. Matching records
    /// are then fetched id by id with bounded concurrency, skipping ids
    /// whose record is not readable yet.
    pub async fn get_alerts(
        &self,
        tenant_id: &str,
        criteria: Option<&AlertsCriteria>,
        pager: Option<&Pager>,
    ) -> Result<Page<Alert>> {
        if tenant_id.is_empty() {
            return Err(StorageError::Validation(
                "tenantId must not be empty".to_string(),
            ));
        }
        let thin = criteria.map_or(false, |c| c.thin);
        let criteria = match criteria {
            Some(c) if c.has_criteria() => c,
            _ => {
                // No filters at all: a single tenant scan answers the query.
                let mut alerts = self.store.alerts_by_tenant(tenant_id).await?;
                if thin {
                    alerts = alerts.into_iter().map(|a| a.thin()).collect();
                }
                return Ok(prepare_page(alerts, pager));
            }
        };
        if criteria.combined_tags().iter().any(|t| t.is_empty()) {
            return Err(StorageError::Validation(
                "tag filter must set a category or a name".to_string(),
            ));
        }
        tracing::debug!("getAlerts criteria: {:?}", criteria);

        let handles = self.spawn_filters(tenant_id, criteria);

        // The alert-ids filter needs no sub-query, start the fold with it.
        let explicit_ids = criteria.combined_alert_ids();
        let mut acc = if explicit_ids.is_empty() {
            None
        } else {
            Some(explicit_ids)
        };

        for handle in handles {
            if matches!(&acc, Some(ids) if ids.is_empty()) {
                // Intersection already empty; remaining read-only sub-queries
                // finish detached.
                return Ok(empty_page(pager));
            }
            let outcome = handle
                .await
                .map_err(|e| StorageError::Task(e.to_string()))??;
            acc = intersect(acc, outcome);
        }

        let ids = match acc {
            Some(ids) if !ids.is_empty() => ids,
            // has_criteria() was true, so at least one filter ran.
            _ => return Ok(empty_page(pager)),
        };

        let alerts = self.fetch_alerts(tenant_id, ids, thin).await?;
        Ok(prepare_page(alerts, pager))
    }

    /// Spawns one sub-query task per filter kind present in the criteria, in
    /// the fold order: triggers and tags, creation time, severity, status.
    fn spawn_filters(
        &self,
        tenant_id: &str,
        criteria: &AlertsCriteria,
    ) -> Vec<JoinHandle<Result<FilterOutcome>>> {
        let mut handles = Vec::new();

        let trigger_ids = criteria.combined_trigger_ids();
        let tag_queries = criteria.combined_tags();
        if !trigger_ids.is_empty() || !tag_queries.is_empty() {
            let store = Arc::clone(&self.store);
            let tenant = tenant_id.to_string();
            handles.push(tokio::spawn(async move {
                // Explicit trigger ids and tag-resolved trigger ids act as
                // one trigger filter.
                let mut triggers = trigger_ids;
                for query in &tag_queries {
                    triggers.extend(
                        store
                            .triggers_by_tag(
                                &tenant,
                                query.category.as_deref(),
                                query.name.as_deref(),
                            )
                            .await?,
                    );
                }
                if triggers.is_empty() {
                    return Ok(FilterOutcome::Empty);
                }
                let mut ids = HashSet::new();
                for trigger_id in &triggers {
                    ids.extend(store.alert_ids_by_trigger(&tenant, trigger_id).await?);
                }
                Ok(non_empty(ids))
            }));
        }

        if criteria.start_time.is_some() || criteria.end_time.is_some() {
            let store = Arc::clone(&self.store);
            let tenant = tenant_id.to_string();
            let start = criteria.start_time;
            let end = criteria.end_time;
            handles.push(tokio::spawn(async move {
                let ids = store.alert_ids_by_ctime(&tenant, start, end).await?;
                Ok(non_empty(ids))
            }));
        }

        let severities = criteria.combined_severities();
        if !severities.is_empty() {
            let store = Arc::clone(&self.store);
            let tenant = tenant_id.to_string();
            handles.push(tokio::spawn(async move {
                let mut ids = HashSet::new();
                for severity in severities {
                    ids.extend(store.alert_ids_by_severity(&tenant, severity).await?);
                }
                Ok(non_empty(ids))
            }));
        }

        let statuses = criteria.combined_statuses();
        if !statuses.is_empty() {
            let store = Arc::clone(&self.store);
            let tenant = tenant_id.to_string();
            handles.push(tokio::spawn(async move {
                let mut ids = HashSet::new();
                for status in statuses {
                    ids.extend(store.alert_ids_by_status(&tenant, status).await?);
                }
                Ok(non_empty(ids))
            }));
        }

        handles
    }

    /// Fetches the records of a candidate id set with bounded concurrency.
    /// Ids without a readable record are skipped rather than failing the
    /// query, since indexes may run ahead of record visibility.
    async fn fetch_alerts(
        &self,
        tenant_id: &str,
        ids: HashSet<String>,
        thin: bool,
    ) -> Result<Vec<Alert>> {
        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency));
        let mut tasks = Vec::new();
        for alert_id in ids {
            let sem = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let tenant = tenant_id.to_string();
            tasks.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| StorageError::Task(e.to_string()))?;
                store.get_alert(&tenant, &alert_id).await
            }));
        }

        let mut alerts = Vec::new();
        for task in tasks {
            let fetched = task.await.map_err(|e| StorageError::Task(e.to_string()))??;
            if let Some(alert) = fetched {
                alerts.push(if thin { alert.thin() } else { alert });
            }
        }
        Ok(alerts)
    }

    /// Moves a batch of alerts to `Acknowledged`, recording who and why.
    /// Fails without touching anything if any target alert is resolved.
    pub async fn ack_alerts(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        ack_by: &str,
        ack_notes: &str,
    ) -> Result<()> {
        if tenant_id.is_empty() {
            return Err(StorageError::Validation(
                "tenantId must not be empty".to_string(),
            ));
        }
        if alert_ids.is_empty() {
            return Ok(());
        }

        let alerts = self.alerts_by_ids(tenant_id, alert_ids).await?;
        reject_resolved(&alerts)?;

        for mut alert in alerts {
            alert.status = AlertStatus::Acknowledged;
            alert.ack_by = Some(ack_by.to_string());
            alert.ack_notes = Some(ack_notes.to_string());
            alert.ack_time = Some(Utc::now());
            self.update_alert_status(&alert).await?;
        }
        Ok(())
    }

    /// Moves a batch of alerts to `Resolved`, the terminal status. Fails
    /// without touching anything if any target alert is already resolved.
    pub async fn resolve_alerts(
        &self,
        tenant_id: &str,
        alert_ids: &[String],
        resolved_by: &str,
        resolved_notes: &str,
        resolved_eval_sets: Vec<Vec<ConditionEval>>,
    ) -> Result<()> {
        if tenant_id.is_empty() {
            return Err(StorageError::Validation(
                "tenantId must not be empty".to_string(),
            ));
        }
        if alert_ids.is_empty() {
            return Ok(());
        }

        let alerts = self.alerts_by_ids(tenant_id, alert_ids).await?;
        reject_resolved(&alerts)?;

        for mut alert in alerts {
            alert.status = AlertStatus::Resolved;
            alert.resolved_by = Some(resolved_by.to_string());
            alert.resolved_notes = Some(resolved_notes.to_string());
            alert.resolved_time = Some(Utc::now());
            alert.resolved_eval_sets = resolved_eval_sets.clone();
            self.update_alert_status(&alert).await?;
        }
        Ok(())
    }

    /// Resolves every non-resolved alert of one trigger. Used by the engine
    /// when a trigger's auto-resolve condition set fires.
    pub async fn resolve_alerts_for_trigger(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        resolved_by: &str,
        resolved_notes: &str,
        resolved_eval_sets: Vec<Vec<ConditionEval>>,
    ) -> Result<()> {
        if trigger_id.is_empty() {
            return Ok(());
        }
        let criteria = AlertsCriteria {
            trigger_id: Some(trigger_id.to_string()),
            statuses: vec![AlertStatus::Open, AlertStatus::Acknowledged],
            ..Default::default()
        };
        let alerts = self.get_alerts(tenant_id, Some(&criteria), None).await?;

        for mut alert in alerts {
            alert.status = AlertStatus::Resolved;
            alert.resolved_by = Some(resolved_by.to_string());
            alert.resolved_notes = Some(resolved_notes.to_string());
            alert.resolved_time = Some(Utc::now());
            alert.resolved_eval_sets = resolved_eval_sets.clone();
            self.update_alert_status(&alert).await?;
        }
        Ok(())
    }

    async fn alerts_by_ids(&self, tenant_id: &str, alert_ids: &[String]) -> Result<Vec<Alert>> {
        let criteria = AlertsCriteria {
            alert_ids: alert_ids.to_vec(),
            ..Default::default()
        };
        Ok(self
            .get_alerts(tenant_id, Some(&criteria), None)
            .await?
            .items)
    }

    /// Rewrites the alert record and moves its id to the right status
    /// bucket. The id is removed from every bucket first, so a record whose
    /// index drifted ends up consistent again.
    async fn update_alert_status(&self, alert: &Alert) -> Result<()> {
        for status in [
            AlertStatus::Open,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
        ] {
            self.store
                .remove_alert_status_index(&alert.tenant_id, status, &alert.alert_id)
                .await?;
        }
        self.store
            .add_alert_status_index(&alert.tenant_id, alert.status, &alert.alert_id)
            .await?;
        self.store.put_alert(alert).await?;
        Ok(())
    }
}

fn non_empty(ids: HashSet<String>) -> FilterOutcome {
    if ids.is_empty() {
        FilterOutcome::Empty
    } else {
        FilterOutcome::Ids(ids)
    }
}

fn reject_resolved(alerts: &[Alert]) -> Result<()> {
    for alert in alerts {
        if alert.status == AlertStatus::Resolved {
            return Err(StorageError::AlertResolved {
                id: alert.alert_id.clone(),
            });
        }
    }
    Ok(())
}

fn empty_page(pager: Option<&Pager>) -> Page<Alert> {
    match pager {
        Some(pager) => pager.slice(Vec::new()),
        None => Page::single(Vec::new()),
    }
}

/// Sorts the full result set and cuts the requested page. Without a pager
/// the whole set comes back as one page in the default order, alert id
/// ascending.
fn prepare_page(mut alerts: Vec<Alert>, pager: Option<&Pager>) -> Page<Alert> {
    match pager {
        Some(pager) => {
            let orders = pager.effective_orders();
            alerts.sort_by(|a, b| compare_alerts(a, b, &orders));
            pager.slice(alerts)
        }
        None => {
            alerts.sort_by(|a, b| compare_alerts(a, b, &[]));
            Page::single(alerts)
        }
    }
}
