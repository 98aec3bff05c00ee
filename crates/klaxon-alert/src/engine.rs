//! The evaluation engine: holds the working set of enabled triggers, runs
//! evaluation cycles against their condition sets and dampening machines,
//! and performs the fire side effects (alert creation, action dispatch,
//! auto-disable, autoresolve bookkeeping).
//!
//! State is a per-(tenant, trigger) arena of lock-guarded entries: distinct
//! triggers evaluate in parallel, cycles of one trigger serialize, and a
//! definitions reload swaps an entry under the same lock so it never
//! interleaves with a running cycle.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use klaxon_common::action::Action;
use klaxon_common::condition::{Condition, ConditionSpec};
use klaxon_common::dampening::Dampening;
use klaxon_common::event::DefinitionsEvent;
use klaxon_common::types::{Alert, Data, MatchMode, Mode, Trigger};
use klaxon_storage::actions::ActionsService;
use klaxon_storage::alerts::AlertsService;
use klaxon_storage::definitions::{DefinitionsListener, DefinitionsService};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::dampening::DampeningState;
use crate::evaluator;

type EngineKey = (String, String);

/// Conditions and dampening machine of one trigger mode.
struct ModeMachine {
    conditions: Vec<Condition>,
    dampening: DampeningState,
}

impl ModeMachine {
    fn new(conditions: Vec<Condition>, policy: Option<&Dampening>) -> Self {
        let dampening = match policy {
            Some(policy) => DampeningState::for_policy(policy),
            None => DampeningState::default_strict(),
        };
        Self {
            conditions,
            dampening,
        }
    }
}

/// Everything the engine holds for one loaded trigger.
struct TriggerState {
    trigger: Trigger,
    /// The mode the trigger currently evaluates; autoresolve triggers flip
    /// to [`Mode::AutoResolve`] after firing and back once it is satisfied.
    mode: Mode,
    firing: ModeMachine,
    auto_resolve: ModeMachine,
}

/// Evaluation engine over the definitions, alerts and actions services.
pub struct AlertEngine {
    definitions: Arc<DefinitionsService>,
    alerts: Arc<AlertsService>,
    actions: Arc<ActionsService>,
    states: RwLock<HashMap<EngineKey, Arc<Mutex<TriggerState>>>>,
}

impl AlertEngine {
    pub fn new(
        definitions: Arc<DefinitionsService>,
        alerts: Arc<AlertsService>,
        actions: Arc<ActionsService>,
    ) -> Self {
        Self {
            definitions,
            alerts,
            actions,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes the engine to definitions changes and builds the initial
    /// working set from every enabled trigger.
    pub async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        self.definitions.register_listener(self.clone()).await;
        self.load().await
    }

    /// Builds the working set from every enabled trigger in the store.
    pub async fn load(&self) -> anyhow::Result<()> {
        let triggers = self
            .definitions
            .get_all_triggers()
            .await
            .context("loading triggers")?;
        let total = triggers.len();
        let mut loaded = 0usize;
        for trigger in triggers {
            if trigger.enabled {
                self.reload_trigger(&trigger.tenant_id, &trigger.id).await?;
                loaded += 1;
            }
        }
        tracing::info!("Alert engine loaded {} of {} triggers", loaded, total);
        Ok(())
    }

    /// Reloads one trigger's definition into the working set, discarding any
    /// in-flight dampening accumulation. Disabled or deleted triggers are
    /// unloaded. An existing entry is swapped under its own lock so the swap
    /// never interleaves with a running evaluation cycle.
    pub async fn reload_trigger(&self, tenant_id: &str, trigger_id: &str) -> anyhow::Result<()> {
        let key = (tenant_id.to_string(), trigger_id.to_string());
        let trigger = self
            .definitions
            .get_trigger(tenant_id, trigger_id)
            .await
            .with_context(|| format!("loading trigger {trigger_id}"))?;
        let trigger = match trigger {
            Some(trigger) if trigger.enabled => trigger,
            _ => {
                if self.states.write().await.remove(&key).is_some() {
                    tracing::info!(tenant_id = %tenant_id, trigger_id = %trigger_id, "Trigger unloaded");
                }
                return Ok(());
            }
        };

        let conditions = self
            .definitions
            .get_trigger_conditions(tenant_id, trigger_id, None)
            .await
            .with_context(|| format!("loading conditions of trigger {trigger_id}"))?;
        let (firing, auto_resolve): (Vec<Condition>, Vec<Condition>) = conditions
            .into_iter()
            .partition(|c| c.trigger_mode == Mode::Firing);
        let firing_policy = self
            .definitions
            .get_dampening(tenant_id, trigger_id, Mode::Firing)
            .await?;
        let auto_resolve_policy = self
            .definitions
            .get_dampening(tenant_id, trigger_id, Mode::AutoResolve)
            .await?;

        let next = TriggerState {
            mode: Mode::Firing,
            firing: ModeMachine::new(firing, firing_policy.as_ref()),
            auto_resolve: ModeMachine::new(auto_resolve, auto_resolve_policy.as_ref()),
            trigger,
        };

        let existing = self.states.read().await.get(&key).cloned();
        match existing {
            Some(state) => *state.lock().await = next,
            None => {
                self.states
                    .write()
                    .await
                    .insert(key, Arc::new(Mutex::new(next)));
            }
        }
        tracing::debug!(tenant_id = %tenant_id, trigger_id = %trigger_id, "Trigger loaded for evaluation");
        Ok(())
    }

    /// Runs one evaluation cycle for `(tenant, trigger)` against `mode`'s
    /// condition set. `data` is one cycle's worth of data points, already
    /// aligned across data ids by the caller; a condition whose stream has
    /// no point this cycle counts as unmatched. Returns whether the cycle
    /// satisfied the mode's dampening and fired.
    ///
    /// Data for a trigger that is not loaded, or for a mode the trigger is
    /// not currently in, evaluates to nothing.
    pub async fn evaluate(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        data: &[Data],
    ) -> anyhow::Result<bool> {
        let key = (tenant_id.to_string(), trigger_id.to_string());
        let state = self.states.read().await.get(&key).cloned();
        let Some(state) = state else {
            tracing::debug!(tenant_id = %tenant_id, trigger_id = %trigger_id, "Dropping data for unloaded trigger");
            return Ok(false);
        };

        let mut guard = state.lock().await;
        if guard.mode != mode {
            return Ok(false);
        }
        let match_mode = guard.trigger.match_for(mode);
        let machine = match mode {
            Mode::Firing => &mut guard.firing,
            Mode::AutoResolve => &mut guard.auto_resolve,
        };

        let mut evals = Vec::with_capacity(machine.conditions.len());
        let mut matched_all = !machine.conditions.is_empty();
        let mut matched_any = false;
        for condition in &machine.conditions {
            let Some(point) = data.iter().find(|d| d.data_id == condition.data_id) else {
                matched_all = false;
                continue;
            };
            let data2 = match &condition.spec {
                ConditionSpec::Compare { data2_id, .. } => {
                    data.iter().find(|d| &d.data_id == data2_id)
                }
                _ => None,
            };
            let eval = evaluator::evaluate(condition, point, data2)?;
            matched_all &= eval.matched;
            matched_any |= eval.matched;
            evals.push(eval);
        }
        let set_matched = match match_mode {
            MatchMode::All => matched_all,
            MatchMode::Any => matched_any,
        };
        let at = data.iter().map(|d| d.timestamp).max().unwrap_or_else(Utc::now);

        let Some(eval_sets) = machine.dampening.step(set_matched, at, evals) else {
            return Ok(false);
        };

        match mode {
            Mode::Firing => {
                let alert = Alert::new(tenant_id, trigger_id, guard.trigger.severity, eval_sets);
                let bindings: Vec<(String, String)> = guard
                    .trigger
                    .actions
                    .iter()
                    .flat_map(|(plugin, ids)| {
                        ids.iter().map(move |id| (plugin.clone(), id.clone()))
                    })
                    .collect();
                let disabled = guard.trigger.auto_disable.then(|| {
                    let mut trigger = guard.trigger.clone();
                    trigger.enabled = false;
                    trigger
                });
                if guard.trigger.auto_resolve {
                    guard.mode = Mode::AutoResolve;
                    guard.auto_resolve.dampening.reset();
                }
                // Side effects run without the per-key lock held: the
                // auto-disable update notifies back into the engine, which
                // reloads this very trigger.
                drop(guard);
                self.fire(tenant_id, trigger_id, alert, bindings, disabled)
                    .await?;
            }
            Mode::AutoResolve => {
                guard.mode = Mode::Firing;
                guard.firing.dampening.reset();
                drop(guard);
                tracing::info!(
                    tenant_id = %tenant_id,
                    trigger_id = %trigger_id,
                    "Trigger autoresolve satisfied, resolving its alerts"
                );
                self.alerts
                    .resolve_alerts_for_trigger(
                        tenant_id,
                        trigger_id,
                        "AutoResolve",
                        "trigger autoresolve condition set satisfied",
                        eval_sets,
                    )
                    .await
                    .with_context(|| format!("resolving alerts of trigger {trigger_id}"))?;
            }
        }
        Ok(true)
    }

    /// Current evaluation mode of a loaded trigger, `None` when not loaded.
    pub async fn current_mode(&self, tenant_id: &str, trigger_id: &str) -> Option<Mode> {
        let key = (tenant_id.to_string(), trigger_id.to_string());
        let state = self.states.read().await.get(&key).cloned()?;
        let mode = state.lock().await.mode;
        Some(mode)
    }

    /// Number of triggers in the working set.
    pub async fn loaded_triggers(&self) -> usize {
        self.states.read().await.len()
    }

    async fn fire(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        alert: Alert,
        bindings: Vec<(String, String)>,
        disabled: Option<Trigger>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            tenant_id = %tenant_id,
            trigger_id = %trigger_id,
            alert_id = %alert.alert_id,
            "Trigger fired"
        );
        self.alerts
            .add_alerts(vec![alert.clone()])
            .await
            .with_context(|| format!("storing alert of trigger {trigger_id}"))?;

        let message =
            serde_json::to_string(&alert).context("serializing alert for action dispatch")?;
        for (plugin, action_id) in bindings {
            self.actions
                .send(Action::new(
                    tenant_id,
                    &plugin,
                    &action_id,
                    &alert.alert_id,
                    message.clone(),
                ))
                .await
                .with_context(|| format!("dispatching action {plugin}/{action_id}"))?;
        }

        if let Some(trigger) = disabled {
            tracing::info!(tenant_id = %tenant_id, trigger_id = %trigger_id, "Auto-disabling trigger after fire");
            self.definitions
                .update_trigger(tenant_id, trigger)
                .await
                .with_context(|| format!("auto-disabling trigger {trigger_id}"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl DefinitionsListener for AlertEngine {
    /// Reloads the touched trigger on any definitions change.
    async fn on_change(&self, event: &DefinitionsEvent) {
        if let Err(e) = self
            .reload_trigger(&event.tenant_id, &event.trigger_id)
            .await
        {
            tracing::error!(
                tenant_id = %event.tenant_id,
                trigger_id = %event.trigger_id,
                error = %e,
                "Failed to reload trigger after definitions change"
            );
        }
    }
}
