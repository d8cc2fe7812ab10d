//! End-to-end orchestrator behaviour against in-process capabilities.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use harvest_core::workflow::{
    Capability, CapabilityKind, CapabilityRegistry, StepDeclaration, StepError, StepErrorCode,
    StepOutput, StepState, ValidationError, WorkflowDefinition, WorkflowOrchestrator,
};
use harvest_core::{Database, ServerError, WorkflowResult, WorkflowResultStore, WorkflowRunStore};

// ─── Fakes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(String),
    End(String),
}

/// Behaviour is driven by the step input:
/// - `id`: label recorded in the event log
/// - `delay_ms`: sleep before answering
/// - `fail`: error code to report instead of succeeding
/// - `hang`: never answer
struct FakeCapability {
    kind: CapabilityKind,
    log: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl Capability for FakeCapability {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    async fn invoke(&self, input: Value) -> Result<StepOutput, StepError> {
        let id = input["id"].as_str().unwrap_or("?").to_string();
        self.log.lock().unwrap().push(Event::Start(id.clone()));

        if input["hang"] == json!(true) {
            std::future::pending::<()>().await;
        }
        if let Some(ms) = input["delay_ms"].as_u64() {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        self.log.lock().unwrap().push(Event::End(id.clone()));

        if let Some(code) = input["fail"].as_str() {
            return Err(StepError::new(StepErrorCode::from_wire(code), "scripted failure"));
        }
        Ok(StepOutput(json!({ "id": id, "echo": input })))
    }
}

struct Harness {
    orchestrator: WorkflowOrchestrator,
    log: Arc<Mutex<Vec<Event>>>,
}

impl Harness {
    fn new() -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CapabilityRegistry::new();
        for kind in CapabilityKind::ALL {
            registry.register(Arc::new(FakeCapability {
                kind,
                log: log.clone(),
            }));
        }
        Self {
            orchestrator: WorkflowOrchestrator::new(Arc::new(registry))
                .with_default_timeout(Duration::from_secs(5)),
            log,
        }
    }

    fn starts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Start(id) => Some(id.clone()),
                Event::End(_) => None,
            })
            .collect()
    }

    fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }
}

fn step(name: &str, deps: &[&str]) -> StepDeclaration {
    StepDeclaration {
        name: name.into(),
        kind: "discovery".into(),
        input: json!({ "id": name }),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        timeout_secs: None,
    }
}

fn with_input(mut s: StepDeclaration, extra: Value) -> StepDeclaration {
    if let (Some(input), Some(extra)) = (s.input.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            input.insert(k.clone(), v.clone());
        }
    }
    s
}

fn workflow(steps: Vec<StepDeclaration>, parallel: bool) -> WorkflowDefinition {
    WorkflowDefinition {
        name: Some("test".into()),
        description: None,
        steps,
        allow_parallel: parallel,
        persist: false,
        step_timeout_secs: None,
    }
}

fn names(result: &WorkflowResult) -> Vec<&str> {
    result.steps.iter().map(|s| s.name.as_str()).collect()
}

// ─── Scenarios ──────────────────────────────────────────────────────────

#[tokio::test]
async fn fan_out_runs_in_one_wave() {
    let h = Harness::new();
    let def = workflow(
        vec![
            step("A", &[]),
            with_input(step("B", &["A"]), json!({ "delay_ms": 50 })),
            with_input(step("C", &["A"]), json!({ "delay_ms": 50 })),
        ],
        true,
    );

    let result = h.orchestrator.execute(&def).await.unwrap();

    assert_eq!(names(&result), vec!["A", "B", "C"]);
    assert!(result.steps.iter().all(|s| s.state == StepState::Succeeded));
    assert_eq!(result.counts.total, 3);
    assert_eq!(result.counts.succeeded, 3);
    assert!(result.success());

    // B and C overlap: both start before either finishes
    let events = h.events();
    assert_eq!(events[0], Event::Start("A".into()));
    assert_eq!(events[1], Event::End("A".into()));
    let mut wave: Vec<_> = events[2..4].to_vec();
    wave.sort_by_key(|e| format!("{:?}", e));
    assert_eq!(wave, vec![Event::Start("B".into()), Event::Start("C".into())]);
}

#[tokio::test]
async fn timeout_fails_step_and_skips_dependent() {
    let h = Harness::new();
    let mut a = with_input(step("A", &[]), json!({ "hang": true }));
    a.timeout_secs = Some(1);
    let def = workflow(vec![a, step("B", &["A"])], false);

    let result = h.orchestrator.execute(&def).await.unwrap();

    let a = result.step("A").unwrap();
    assert_eq!(a.state, StepState::Failed);
    assert_eq!(a.error.as_ref().unwrap().code, StepErrorCode::Timeout);
    let b = result.step("B").unwrap();
    assert_eq!(b.state, StepState::Skipped);
    assert_eq!(b.skipped_because.as_deref(), Some("A"));
    assert_eq!(result.counts.total, 2);
    assert_eq!(result.counts.succeeded, 0);
    assert_eq!(result.counts.failed, 1);
    assert_eq!(result.counts.skipped, 1);
    assert_eq!(h.starts(), vec!["A"]);
}

#[tokio::test]
async fn cycle_is_rejected_before_dispatch() {
    let h = Harness::new();
    let def = workflow(
        vec![step("A", &["C"]), step("B", &["A"]), step("C", &["B"])],
        true,
    );

    let err = h.orchestrator.execute(&def).await.unwrap_err();

    assert_eq!(
        err,
        ValidationError::CyclicDependency {
            cycle: vec!["A".into(), "B".into(), "C".into(), "A".into()]
        }
    );
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn unknown_dependency_is_rejected() {
    let h = Harness::new();
    let def = workflow(vec![step("A", &[]), step("B", &["Z"])], false);

    let err = h.orchestrator.execute(&def).await.unwrap_err();

    assert_eq!(
        err,
        ValidationError::UnknownDependency {
            step: "B".into(),
            dependency: "Z".into()
        }
    );
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn sequential_mode_runs_one_at_a_time_in_declaration_order() {
    let h = Harness::new();
    let def = workflow(
        vec![
            with_input(step("A", &[]), json!({ "delay_ms": 30 })),
            with_input(step("B", &[]), json!({ "delay_ms": 10 })),
            step("C", &[]),
        ],
        false,
    );

    let result = h.orchestrator.execute(&def).await.unwrap();

    assert!(result.success());
    assert_eq!(
        h.events(),
        vec![
            Event::Start("A".into()),
            Event::End("A".into()),
            Event::Start("B".into()),
            Event::End("B".into()),
            Event::Start("C".into()),
            Event::End("C".into()),
        ]
    );
}

// ─── Properties ─────────────────────────────────────────────────────────

#[tokio::test]
async fn failure_skips_every_transitive_dependent_and_spares_the_rest() {
    let h = Harness::new();
    let def = workflow(
        vec![
            step("root", &[]),
            with_input(step("bad", &["root"]), json!({ "fail": "unreachable" })),
            step("child", &["bad"]),
            step("grandchild", &["child", "root"]),
            step("sibling", &["root"]),
            step("island", &[]),
        ],
        true,
    );

    let graph = h.orchestrator.validate(&def).unwrap();
    let doomed = graph.transitive_dependents("bad");

    let result = h.orchestrator.execute(&def).await.unwrap();

    for run in &result.steps {
        if doomed.contains(&run.name) {
            assert_eq!(run.state, StepState::Skipped, "{}", run.name);
        }
    }
    assert_eq!(result.step("bad").unwrap().state, StepState::Failed);
    assert_eq!(result.step("sibling").unwrap().state, StepState::Succeeded);
    assert_eq!(result.step("island").unwrap().state, StepState::Succeeded);

    let started = h.starts();
    for name in &doomed {
        assert!(!started.contains(name), "skipped step {} was dispatched", name);
    }
    assert!(!result.success());
}

#[tokio::test]
async fn parallel_result_order_is_declaration_order() {
    let h = Harness::new();
    let def = workflow(
        vec![
            with_input(step("slow", &[]), json!({ "delay_ms": 80 })),
            with_input(step("medium", &[]), json!({ "delay_ms": 40 })),
            step("fast", &[]),
        ],
        true,
    );

    let result = h.orchestrator.execute(&def).await.unwrap();

    assert_eq!(names(&result), vec!["slow", "medium", "fast"]);
    let ends: Vec<_> = h
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::End(id) => Some(id),
            Event::Start(_) => None,
        })
        .collect();
    assert_eq!(ends, vec!["fast", "medium", "slow"]);
}

#[tokio::test]
async fn every_declared_step_appears_exactly_once() {
    let h = Harness::new();
    let def = workflow(
        vec![
            step("e", &["c", "d"]),
            step("a", &[]),
            with_input(step("b", &["a"]), json!({ "fail": "upstream-error" })),
            step("c", &["a"]),
            step("d", &["b"]),
        ],
        true,
    );

    let result = h.orchestrator.execute(&def).await.unwrap();

    assert_eq!(names(&result), vec!["e", "a", "b", "c", "d"]);
    assert_eq!(result.counts.total, 5);
    assert_eq!(
        result.counts.succeeded + result.counts.failed + result.counts.skipped,
        5
    );
}

#[tokio::test]
async fn result_shape_is_stable_across_runs() {
    let h = Harness::new();
    let def = workflow(
        vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])],
        true,
    );

    let first = h.orchestrator.execute(&def).await.unwrap();
    let second = h.orchestrator.execute(&def).await.unwrap();

    assert_eq!(first.states(), second.states());
    assert_eq!(names(&first), names(&second));
    assert_ne!(first.workflow_id, second.workflow_id);
}

#[tokio::test]
async fn outputs_are_substituted_into_dependents() {
    let h = Harness::new();
    let mut details = step("details", &["search"]);
    details.kind = "extraction".into();
    details.input = json!({
        "id": "details",
        "url": "${steps.search.output.id}",
        "note": "from ${steps.search.output.id}"
    });
    let def = workflow(vec![step("search", &[]), details], false);

    let result = h.orchestrator.execute(&def).await.unwrap();

    let echo = &result.step("details").unwrap().output.as_ref().unwrap()["echo"];
    assert_eq!(echo["url"], "search");
    assert_eq!(echo["note"], "from search");
}

#[tokio::test]
async fn empty_workflow_succeeds_trivially() {
    let h = Harness::new();
    let result = h.orchestrator.execute(&workflow(vec![], true)).await.unwrap();
    assert_eq!(result.counts.total, 0);
    assert!(result.success());
}

#[tokio::test]
async fn unregistered_kind_is_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(FakeCapability {
        kind: CapabilityKind::Discovery,
        log,
    }));
    let orchestrator = WorkflowOrchestrator::new(Arc::new(registry));

    let mut s = step("look", &[]);
    s.kind = "vision".into();
    let err = orchestrator.execute(&workflow(vec![s], false)).await.unwrap_err();
    assert_eq!(err.kind(), "unknown_capability_kind");
}

// ─── Persistence ────────────────────────────────────────────────────────

struct BrokenStore;

#[async_trait]
impl WorkflowResultStore for BrokenStore {
    async fn save(&self, _result: &WorkflowResult) -> Result<(), ServerError> {
        Err(ServerError::Database("disk full".into()))
    }

    async fn list(&self, _limit: usize) -> Result<Vec<WorkflowResult>, ServerError> {
        Ok(vec![])
    }

    async fn get(&self, _id: &str) -> Result<Option<WorkflowResult>, ServerError> {
        Ok(None)
    }
}

#[tokio::test]
async fn persisted_result_matches_returned_result() {
    let h = Harness::new();
    let store = WorkflowRunStore::new(Database::open_in_memory().unwrap());
    let orchestrator = h.orchestrator.clone().with_store(Arc::new(store.clone()));

    let mut def = workflow(vec![step("a", &[]), step("b", &["a"])], true);
    def.persist = true;
    let result = orchestrator.execute(&def).await.unwrap();

    let stored = store.get(&result.workflow_id).await.unwrap().unwrap();
    assert_eq!(stored, result);
}

#[tokio::test]
async fn persist_flag_off_stores_nothing() {
    let h = Harness::new();
    let store = WorkflowRunStore::new(Database::open_in_memory().unwrap());
    let orchestrator = h.orchestrator.clone().with_store(Arc::new(store.clone()));

    orchestrator
        .execute(&workflow(vec![step("a", &[])], false))
        .await
        .unwrap();

    assert!(store.list(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_does_not_change_result() {
    let h = Harness::new();
    let orchestrator = h.orchestrator.clone().with_store(Arc::new(BrokenStore));

    let mut def = workflow(vec![step("a", &[])], false);
    def.persist = true;
    let result = orchestrator.execute(&def).await.unwrap();

    assert!(result.success());
    assert_eq!(result.counts.succeeded, 1);
}
