use crate::config::EngineConfig;
use crate::dampening::DampeningState;
use crate::engine::AlertEngine;
use crate::error::EvalError;
use crate::evaluator;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use klaxon_common::action::Action;
use klaxon_common::condition::{
    AvailabilityOperator, CompareOperator, Condition, RangeOperator, StringOperator,
};
use klaxon_common::criteria::AlertsCriteria;
use klaxon_common::dampening::Dampening;
use klaxon_common::types::{
    Alert, AlertStatus, AvailabilityType, Data, MatchMode, Mode, Severity, Trigger,
};
use klaxon_storage::actions::{ActionListener, ActionsService};
use klaxon_storage::alerts::AlertsService;
use klaxon_storage::definitions::DefinitionsService;
use klaxon_storage::memory::MemoryStorage;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingActionListener {
    actions: Mutex<Vec<Action>>,
}

#[async_trait]
impl ActionListener for RecordingActionListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn process(&self, action: &Action) -> anyhow::Result<()> {
        self.actions.lock().await.push(action.clone());
        Ok(())
    }
}

async fn harness() -> (
    Arc<DefinitionsService>,
    Arc<AlertsService>,
    Arc<AlertEngine>,
    Arc<RecordingActionListener>,
) {
    klaxon_common::id::init(1, 1);
    let store = Arc::new(MemoryStorage::new());
    let definitions = Arc::new(DefinitionsService::new(store.clone()));
    let alerts = Arc::new(AlertsService::new(store));
    let actions = Arc::new(ActionsService::new());
    let listener = Arc::new(RecordingActionListener::default());
    actions.register_listener(listener.clone()).await;
    let engine = Arc::new(AlertEngine::new(definitions.clone(), alerts.clone(), actions));
    engine.clone().start().await.unwrap();
    (definitions, alerts, engine, listener)
}

/// Provisions a trigger the way an operator would: create disabled, attach
/// conditions and dampening, then enable (which loads it into the engine).
async fn add_enabled_trigger(
    definitions: &DefinitionsService,
    trigger: Trigger,
    conditions: Vec<Condition>,
    dampening: Option<Dampening>,
) -> Trigger {
    let tenant = trigger.tenant_id.clone();
    let id = trigger.id.clone();
    let mut trigger = definitions.add_trigger(&tenant, trigger).await.unwrap();
    for mode in [Mode::Firing, Mode::AutoResolve] {
        let set: Vec<Condition> = conditions
            .iter()
            .filter(|c| c.trigger_mode == mode)
            .cloned()
            .collect();
        if !set.is_empty() {
            definitions.set_conditions(&tenant, &id, mode, set).await.unwrap();
        }
    }
    if let Some(dampening) = dampening {
        definitions.add_dampening(&tenant, dampening).await.unwrap();
    }
    trigger.enabled = true;
    definitions.update_trigger(&tenant, trigger).await.unwrap()
}

fn cpu_above(threshold: f64) -> Condition {
    Condition::threshold("t1", "T1", Mode::Firing, "cpu", CompareOperator::Gt, threshold)
}

fn point(data_id: &str, value: f64) -> Data {
    Data::numeric(data_id, Utc::now(), value)
}

// --- evaluator ---

#[test]
fn threshold_operators_at_equality() {
    let value = point("cpu", 10.0);
    for (operator, expect) in [
        (CompareOperator::Gte, true),
        (CompareOperator::Lte, true),
        (CompareOperator::Gt, false),
        (CompareOperator::Lt, false),
    ] {
        let condition =
            Condition::threshold("t1", "T1", Mode::Firing, "cpu", operator, 10.0);
        let eval = evaluator::evaluate(&condition, &value, None).unwrap();
        assert_eq!(eval.matched, expect, "operator {operator}");
    }
}

#[test]
fn threshold_range_respects_bounds_and_inversion() {
    let inside = Condition::threshold_range(
        "t1",
        "T1",
        Mode::Firing,
        "cpu",
        RangeOperator::Inclusive,
        RangeOperator::Exclusive,
        10.0,
        20.0,
        true,
    );
    assert!(evaluator::evaluate(&inside, &point("cpu", 10.0), None).unwrap().matched);
    assert!(evaluator::evaluate(&inside, &point("cpu", 15.0), None).unwrap().matched);
    // the high bound is exclusive
    assert!(!evaluator::evaluate(&inside, &point("cpu", 20.0), None).unwrap().matched);
    assert!(!evaluator::evaluate(&inside, &point("cpu", 9.0), None).unwrap().matched);

    let outside = Condition::threshold_range(
        "t1",
        "T1",
        Mode::Firing,
        "cpu",
        RangeOperator::Inclusive,
        RangeOperator::Exclusive,
        10.0,
        20.0,
        false,
    );
    assert!(!evaluator::evaluate(&outside, &point("cpu", 15.0), None).unwrap().matched);
    assert!(evaluator::evaluate(&outside, &point("cpu", 20.0), None).unwrap().matched);
}

#[test]
fn compare_scales_the_second_stream() {
    let condition = Condition::compare(
        "t1",
        "T1",
        Mode::Firing,
        "node1.sessions",
        CompareOperator::Gt,
        "node2.sessions",
        0.8,
    );
    let data2 = point("node2.sessions", 100.0);
    let eval =
        evaluator::evaluate(&condition, &point("node1.sessions", 85.0), Some(&data2)).unwrap();
    assert!(eval.matched); // 85 > 0.8 * 100
    let eval =
        evaluator::evaluate(&condition, &point("node1.sessions", 75.0), Some(&data2)).unwrap();
    assert!(!eval.matched);

    let err = evaluator::evaluate(&condition, &point("node1.sessions", 85.0), None).unwrap_err();
    assert!(matches!(err, EvalError::MissingCompareData { .. }));
}

#[test]
fn string_operators_cover_all_forms() {
    let log = |text: &str| Data::text("log", Utc::now(), text);
    let condition = |operator, pattern: &str, ignore_case| {
        Condition::string("t1", "T1", Mode::Firing, "log", operator, pattern, ignore_case)
    };

    let starts = condition(StringOperator::StartsWith, "error", true);
    assert!(evaluator::evaluate(&starts, &log("ERROR: disk full"), None).unwrap().matched);
    let starts_cs = condition(StringOperator::StartsWith, "error", false);
    assert!(!evaluator::evaluate(&starts_cs, &log("ERROR: disk full"), None).unwrap().matched);

    let contains = condition(StringOperator::Contains, "disk", false);
    assert!(evaluator::evaluate(&contains, &log("ERROR: disk full"), None).unwrap().matched);

    let ends = condition(StringOperator::EndsWith, "full", false);
    assert!(evaluator::evaluate(&ends, &log("ERROR: disk full"), None).unwrap().matched);

    let equal = condition(StringOperator::Equal, "ok", true);
    assert!(evaluator::evaluate(&equal, &log("OK"), None).unwrap().matched);
    let not_equal = condition(StringOperator::NotEqual, "ok", true);
    assert!(!evaluator::evaluate(&not_equal, &log("OK"), None).unwrap().matched);

    let regex = condition(StringOperator::Match, "^ERROR.*full$", false);
    assert!(evaluator::evaluate(&regex, &log("ERROR: disk full"), None).unwrap().matched);
    assert!(!evaluator::evaluate(&regex, &log("WARN: disk full"), None).unwrap().matched);

    let bad = condition(StringOperator::Match, "(", false);
    let err = evaluator::evaluate(&bad, &log("anything"), None).unwrap_err();
    assert!(matches!(err, EvalError::BadPattern { .. }));
}

#[test]
fn availability_not_up_matches_degraded_states() {
    let not_up =
        Condition::availability("t1", "T1", Mode::Firing, "web", AvailabilityOperator::NotUp);
    let state = |s| Data::availability("web", Utc::now(), s);
    assert!(evaluator::evaluate(&not_up, &state(AvailabilityType::Down), None).unwrap().matched);
    assert!(
        evaluator::evaluate(&not_up, &state(AvailabilityType::Unavailable), None)
            .unwrap()
            .matched
    );
    assert!(!evaluator::evaluate(&not_up, &state(AvailabilityType::Up), None).unwrap().matched);

    let up = Condition::availability("t1", "T1", Mode::Firing, "web", AvailabilityOperator::Up);
    assert!(evaluator::evaluate(&up, &state(AvailabilityType::Up), None).unwrap().matched);
    assert!(!evaluator::evaluate(&up, &state(AvailabilityType::Down), None).unwrap().matched);
}

#[test]
fn wrong_value_type_is_a_loud_error() {
    let condition = cpu_above(90.0);
    let err =
        evaluator::evaluate(&condition, &Data::text("cpu", Utc::now(), "hot"), None).unwrap_err();
    assert!(matches!(
        err,
        EvalError::TypeMismatch {
            expected: "numeric",
            actual: "text",
            ..
        }
    ));
}

#[test]
fn evaluation_is_deterministic() {
    let condition = cpu_above(90.0);
    let data = point("cpu", 95.5);
    let first = evaluator::evaluate(&condition, &data, None).unwrap();
    let second = evaluator::evaluate(&condition, &data, None).unwrap();
    assert_eq!(first.matched, second.matched);
    assert_eq!(first.value, second.value);
    assert_eq!(first.condition_id, second.condition_id);
    assert_eq!(first.data_time, second.data_time);
}

// --- dampening state machine ---

#[test]
fn strict_fires_once_after_consecutive_run() {
    let policy = Dampening::strict("t1", "T1", Mode::Firing, 3);
    let mut machine = DampeningState::for_policy(&policy);
    let at = Utc::now();

    // the false cycle resets the streak
    for matched in [true, true, false, true, true] {
        assert!(machine.step(matched, at, Vec::new()).is_none());
    }
    let sets = machine.step(true, at, Vec::new()).unwrap();
    assert_eq!(sets.len(), 3);

    // accumulation restarted from zero
    assert!(machine.step(true, at, Vec::new()).is_none());
    assert!(machine.step(true, at, Vec::new()).is_none());
    assert!(machine.step(true, at, Vec::new()).is_some());
}

#[test]
fn default_policy_fires_on_first_match() {
    let mut machine = DampeningState::default_strict();
    let at = Utc::now();
    assert!(machine.step(false, at, Vec::new()).is_none());
    let sets = machine.step(true, at, Vec::new()).unwrap();
    assert_eq!(sets.len(), 1);
    assert!(machine.step(false, at, Vec::new()).is_none());
    assert!(machine.step(true, at, Vec::new()).is_some());
}

#[test]
fn relaxed_count_window_slides_over_cycles() {
    let policy = Dampening::relaxed_count("t1", "T1", Mode::Firing, 2, 3);
    let mut machine = DampeningState::for_policy(&policy);
    let at = Utc::now();

    assert!(machine.step(true, at, Vec::new()).is_none());
    assert!(machine.step(false, at, Vec::new()).is_none());
    assert!(machine.step(false, at, Vec::new()).is_none());
    // the first true cycle has slid out of the 3-cycle window
    assert!(machine.step(true, at, Vec::new()).is_none());
    let sets = machine.step(true, at, Vec::new()).unwrap();
    assert_eq!(sets.len(), 2);
}

#[test]
fn relaxed_time_evicts_cycles_by_age() {
    let policy = Dampening::relaxed_time("t1", "T1", Mode::Firing, 2, 10_000);
    let mut machine = DampeningState::for_policy(&policy);
    let t0 = Utc.timestamp_opt(1_000_000, 0).unwrap();

    assert!(machine.step(true, t0, Vec::new()).is_none());
    // 15s later the first cycle is older than the 10s window
    assert!(machine
        .step(true, t0 + Duration::seconds(15), Vec::new())
        .is_none());
    let sets = machine
        .step(true, t0 + Duration::seconds(16), Vec::new())
        .unwrap();
    assert_eq!(sets.len(), 2);
}

#[test]
fn reset_discards_accumulation() {
    let policy = Dampening::strict("t1", "T1", Mode::Firing, 2);
    let mut machine = DampeningState::for_policy(&policy);
    let at = Utc::now();

    assert!(machine.step(true, at, Vec::new()).is_none());
    machine.reset();
    assert!(machine.step(true, at, Vec::new()).is_none());
    assert!(machine.step(true, at, Vec::new()).is_some());
}

// --- engine ---

#[tokio::test]
async fn firing_creates_alert_and_dispatches_actions() {
    let (definitions, alerts, engine, sent) = harness().await;
    let mut trigger = Trigger::new("t1", "T1", "cpu high");
    trigger.severity = Severity::Critical;
    trigger.add_action("email", "ops");
    add_enabled_trigger(&definitions, trigger, vec![cpu_above(90.0)], None).await;

    let fired = engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap();
    assert!(fired);

    let page = alerts.get_alerts("t1", None, None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].status, AlertStatus::Open);
    assert_eq!(page[0].severity, Severity::Critical);
    assert_eq!(page[0].trigger_id, "T1");
    assert_eq!(page[0].eval_sets.len(), 1);

    let dispatched = sent.actions.lock().await;
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].action_plugin, "email");
    assert_eq!(dispatched[0].action_id, "ops");
    assert_eq!(dispatched[0].alert_id, page[0].alert_id);
    assert!(dispatched[0].message.contains(&page[0].alert_id));
    drop(dispatched);

    // default policy fires again on the next matching cycle
    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 97.0)])
        .await
        .unwrap());
    assert_eq!(alerts.get_alerts("t1", None, None).await.unwrap().total_size, 2);
}

#[tokio::test]
async fn strict_dampening_suppresses_flapping() {
    let (definitions, alerts, engine, _) = harness().await;
    add_enabled_trigger(
        &definitions,
        Trigger::new("t1", "T1", "cpu high"),
        vec![cpu_above(90.0)],
        Some(Dampening::strict("t1", "T1", Mode::Firing, 3)),
    )
    .await;

    for (value, expect) in [
        (95.0, false),
        (95.0, false),
        (10.0, false), // resets the streak
        (95.0, false),
        (95.0, false),
        (95.0, true),
    ] {
        let fired = engine
            .evaluate("t1", "T1", Mode::Firing, &[point("cpu", value)])
            .await
            .unwrap();
        assert_eq!(fired, expect, "value {value}");
    }

    let page = alerts.get_alerts("t1", None, None).await.unwrap();
    assert_eq!(page.total_size, 1);
    // the alert carries the three satisfying cycles
    assert_eq!(page[0].eval_sets.len(), 3);
}

#[tokio::test]
async fn match_any_fires_on_a_single_stream() {
    let (definitions, alerts, engine, _) = harness().await;
    let mut trigger = Trigger::new("t1", "T1", "cpu or mem");
    trigger.firing_match = MatchMode::Any;
    let mem_above =
        Condition::threshold("t1", "T1", Mode::Firing, "mem", CompareOperator::Gt, 90.0);
    add_enabled_trigger(&definitions, trigger, vec![cpu_above(90.0), mem_above], None).await;

    // mem has no data point this cycle; Any still fires on cpu
    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert_eq!(alerts.get_alerts("t1", None, None).await.unwrap().total_size, 1);
}

#[tokio::test]
async fn match_all_requires_every_condition() {
    let (definitions, alerts, engine, _) = harness().await;
    let mem_above =
        Condition::threshold("t1", "T1", Mode::Firing, "mem", CompareOperator::Gt, 90.0);
    add_enabled_trigger(
        &definitions,
        Trigger::new("t1", "T1", "cpu and mem"),
        vec![cpu_above(90.0), mem_above],
        None,
    )
    .await;

    // a stream with no aligned point counts as unmatched
    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert!(!engine
        .evaluate(
            "t1",
            "T1",
            Mode::Firing,
            &[point("cpu", 95.0), point("mem", 10.0)]
        )
        .await
        .unwrap());
    assert!(engine
        .evaluate(
            "t1",
            "T1",
            Mode::Firing,
            &[point("cpu", 95.0), point("mem", 95.0)]
        )
        .await
        .unwrap());
    assert_eq!(alerts.get_alerts("t1", None, None).await.unwrap().total_size, 1);
}

#[tokio::test]
async fn auto_disable_unloads_the_trigger_after_fire() {
    let (definitions, alerts, engine, _) = harness().await;
    let mut trigger = Trigger::new("t1", "T1", "one shot");
    trigger.auto_disable = true;
    add_enabled_trigger(&definitions, trigger, vec![cpu_above(90.0)], None).await;

    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());

    let stored = definitions.get_trigger("t1", "T1").await.unwrap().unwrap();
    assert!(!stored.enabled);
    assert_eq!(engine.current_mode("t1", "T1").await, None);

    // further data is dropped
    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 99.0)])
        .await
        .unwrap());
    assert_eq!(alerts.get_alerts("t1", None, None).await.unwrap().total_size, 1);
}

#[tokio::test]
async fn auto_resolve_cycles_between_modes() {
    let (definitions, alerts, engine, _) = harness().await;
    let mut trigger = Trigger::new("t1", "T1", "cpu high");
    trigger.auto_resolve = true;
    let recovered =
        Condition::threshold("t1", "T1", Mode::AutoResolve, "cpu", CompareOperator::Lt, 50.0);
    add_enabled_trigger(&definitions, trigger, vec![cpu_above(90.0), recovered], None).await;

    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert_eq!(engine.current_mode("t1", "T1").await, Some(Mode::AutoResolve));

    // firing data is ignored while the trigger waits for recovery
    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 99.0)])
        .await
        .unwrap());

    assert!(engine
        .evaluate("t1", "T1", Mode::AutoResolve, &[point("cpu", 30.0)])
        .await
        .unwrap());
    assert_eq!(engine.current_mode("t1", "T1").await, Some(Mode::Firing));

    let resolved = AlertsCriteria {
        status: Some(AlertStatus::Resolved),
        ..Default::default()
    };
    let page = alerts.get_alerts("t1", Some(&resolved), None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].resolved_by.as_deref(), Some("AutoResolve"));
    assert!(!page[0].resolved_eval_sets.is_empty());

    // the next breach opens a fresh alert
    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    let open = AlertsCriteria {
        status: Some(AlertStatus::Open),
        ..Default::default()
    };
    assert_eq!(alerts.get_alerts("t1", Some(&open), None).await.unwrap().total_size, 1);
}

#[tokio::test]
async fn dampening_change_discards_accumulation() {
    let (definitions, alerts, engine, _) = harness().await;
    add_enabled_trigger(
        &definitions,
        Trigger::new("t1", "T1", "cpu high"),
        vec![cpu_above(90.0)],
        Some(Dampening::strict("t1", "T1", Mode::Firing, 3)),
    )
    .await;

    for _ in 0..2 {
        assert!(!engine
            .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
            .await
            .unwrap());
    }

    // the update reloads the trigger and restarts the streak
    definitions
        .update_dampening("t1", Dampening::strict("t1", "T1", Mode::Firing, 3))
        .await
        .unwrap();

    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert_eq!(alerts.get_alerts("t1", None, None).await.unwrap().total_size, 1);
}

#[tokio::test]
async fn condition_change_swaps_the_evaluated_set() {
    let (definitions, alerts, engine, _) = harness().await;
    add_enabled_trigger(
        &definitions,
        Trigger::new("t1", "T1", "cpu high"),
        vec![cpu_above(90.0)],
        None,
    )
    .await;

    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 92.0)])
        .await
        .unwrap());

    definitions
        .set_conditions("t1", "T1", Mode::Firing, vec![cpu_above(95.0)])
        .await
        .unwrap();

    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 92.0)])
        .await
        .unwrap());
    assert!(engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 96.0)])
        .await
        .unwrap());
    assert_eq!(alerts.get_alerts("t1", None, None).await.unwrap().total_size, 2);
}

#[tokio::test]
async fn only_enabled_triggers_are_loaded() {
    let (definitions, alerts, engine, _) = harness().await;
    definitions
        .add_trigger("t1", Trigger::new("t1", "T1", "disabled"))
        .await
        .unwrap();
    definitions
        .set_conditions("t1", "T1", Mode::Firing, vec![cpu_above(90.0)])
        .await
        .unwrap();

    assert_eq!(engine.loaded_triggers().await, 0);
    assert!(!engine
        .evaluate("t1", "T1", Mode::Firing, &[point("cpu", 95.0)])
        .await
        .unwrap());
    assert!(alerts.get_alerts("t1", None, None).await.unwrap().is_empty());

    let mut trigger = definitions.get_trigger("t1", "T1").await.unwrap().unwrap();
    trigger.enabled = true;
    definitions.update_trigger("t1", trigger).await.unwrap();
    assert_eq!(engine.loaded_triggers().await, 1);

    definitions.remove_trigger("t1", "T1").await.unwrap();
    assert_eq!(engine.loaded_triggers().await, 0);
}

#[tokio::test]
async fn eval_errors_surface_through_the_engine() {
    let (definitions, _, engine, _) = harness().await;
    let bad = Condition::string(
        "t1",
        "T1",
        Mode::Firing,
        "log",
        StringOperator::Match,
        "(",
        false,
    );
    add_enabled_trigger(
        &definitions,
        Trigger::new("t1", "T1", "bad pattern"),
        vec![bad],
        None,
    )
    .await;

    let err = engine
        .evaluate(
            "t1",
            "T1",
            Mode::Firing,
            &[Data::text("log", Utc::now(), "boom")],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EvalError>(),
        Some(EvalError::BadPattern { .. })
    ));
}

// --- config ---

#[test]
fn config_defaults_apply() {
    let config: EngineConfig = toml::from_str("").unwrap();
    assert_eq!(config.id.machine_id, 1);
    assert_eq!(config.id.node_id, 1);
    assert_eq!(config.query.fetch_concurrency, 8);
}

#[test]
fn config_sections_override_independently() {
    let config: EngineConfig = toml::from_str("[id]\nmachine_id = 7\n").unwrap();
    assert_eq!(config.id.machine_id, 7);
    assert_eq!(config.id.node_id, 1);
    assert_eq!(config.query.fetch_concurrency, 8);
}

#[tokio::test]
async fn config_fetch_concurrency_feeds_the_alerts_service() {
    klaxon_common::id::init(1, 1);
    let config: EngineConfig = toml::from_str("[query]\nfetch_concurrency = 1\n").unwrap();
    let store = Arc::new(MemoryStorage::new());
    let alerts = AlertsService::new(store).with_fetch_concurrency(config.query.fetch_concurrency);

    let mut batch = Vec::new();
    for i in 0..5 {
        let mut alert = Alert::new("t1", "T1", Severity::Medium, Vec::new());
        alert.alert_id = format!("{i:03}");
        batch.push(alert);
    }
    alerts.add_alerts(batch).await.unwrap();

    // a trigger filter forces the bounded per-id fetch path
    let criteria = AlertsCriteria {
        trigger_id: Some("T1".to_string()),
        ..Default::default()
    };
    let page = alerts.get_alerts("t1", Some(&criteria), None).await.unwrap();
    assert_eq!(page.total_size, 5);
    let ids: Vec<&str> = page.iter().map(|a| a.alert_id.as_str()).collect();
    assert_eq!(ids, vec!["000", "001", "002", "003", "004"]);
}

#[test]
fn config_load_reads_a_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[id]\nmachine_id = 3\nnode_id = 4\n\n[query]\nfetch_concurrency = 2\n")
        .unwrap();

    let config = EngineConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.id.machine_id, 3);
    assert_eq!(config.id.node_id, 4);
    assert_eq!(config.query.fetch_concurrency, 2);

    assert!(EngineConfig::load(dir.path().join("missing.toml").to_str().unwrap()).is_err());
}
