//! Integration tests for the flow runner.
//!
//! These drive the runner end-to-end with `MockExecutor` doubles — no real
//! connectors or transports involved. Time-sensitive cases run under tokio's
//! paused clock so sleeps and timeouts resolve instantly and
//! deterministically.

use std::time::Duration;

use actions::mock::{MockBehaviour, MockExecutor, MockHandle};
use actions::ActionRegistry;
use expressions::ValueContainer;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    ActionStatus, FailedDependencyPolicy, FlowError, FlowRunner, FlowSettings, FlowStatus,
};

fn runner(document: &str, registry: ActionRegistry, settings: FlowSettings) -> FlowRunner {
    let mut runner = FlowRunner::new(registry, settings);
    runner.initialize(document).expect("definition should be valid");
    runner
}

/// Registry with one mocked type tag; returns the recording handle.
fn mocked(registry: &mut ActionRegistry, tag: &str, behaviour: MockBehaviour) -> MockHandle {
    let (factory, handle) = MockExecutor::factory(behaviour);
    registry.register(tag, move |ctx| factory(ctx));
    handle
}

fn trigger_value(body: serde_json::Value) -> ValueContainer {
    ValueContainer::from_json(serde_json::json!({ "body": body }))
}

// ============================================================
// Scenario 1: the greeting-note flow
// ============================================================

const GREETING_FLOW: &str = r#"{
    "name": "greeting",
    "trigger": {"type": "request"},
    "actions": {
        "Create_a_new_row_-_Create_greeting_note": {
            "type": "open_api_connection",
            "inputs": {
                "host": {"apiId": "annotations", "operationId": "CreateRecord"},
                "parameters": {
                    "item": {
                        "subject": "Greet our new Contact",
                        "notetext": "With the name of @{triggerBody()?['fullname']}"
                    }
                }
            },
            "conditions": ["@equals(triggerBody()?['lastname'], 'Doe')"]
        },
        "Send_me_an_email_notification": {
            "type": "email_notification",
            "runAfter": ["Create_a_new_row_-_Create_greeting_note"],
            "conditions": ["@equals(triggerBody()?['lastname'], 'Smith')"]
        }
    }
}"#;

#[tokio::test]
async fn greeting_flow_creates_note_and_skips_email() {
    const NOTE: &str = "Create_a_new_row_-_Create_greeting_note";
    const EMAIL: &str = "Send_me_an_email_notification";

    let mut registry = ActionRegistry::new();
    let note_output = ValueContainer::from_json(serde_json::json!({
        "body": {"annotationid": Uuid::new_v4().to_string()}
    }));
    let note_handle = mocked(
        &mut registry,
        "open_api_connection",
        MockBehaviour::ReturnValue(note_output),
    );
    let email_handle = mocked(&mut registry, "email_notification", MockBehaviour::ReturnNothing);

    let runner = runner(GREETING_FLOW, registry, FlowSettings::default());
    let report = runner
        .trigger(trigger_value(serde_json::json!({
            "contactid": Uuid::new_v4().to_string(),
            "fullname": "John Doe",
            "lastname": "Doe"
        })))
        .await
        .expect("run should complete");

    // The guarded note action ran with fully resolved inputs.
    let note = report.action_state(NOTE).expect("state for note action");
    assert_eq!(note.status, ActionStatus::Succeeded);
    let item = &note.action_input.as_ref().expect("resolved input")["parameters"]["item"];
    assert_eq!(item["subject"], ValueContainer::from("Greet our new Contact"));
    assert_eq!(item["notetext"], ValueContainer::from("With the name of John Doe"));
    assert!(note.action_output.is_some());
    assert_eq!(note_handle.call_count(), 1);

    // The email action was disabled by its guard: never executed, absent
    // from the positive-membership view, present in the report as Skipped.
    assert!(!report.executed_action_names().contains(&EMAIL));
    let email = report.action_state(EMAIL).expect("state for email action");
    assert_eq!(email.status, ActionStatus::Skipped);
    assert!(email.action_output.is_none());
    assert_eq!(email_handle.call_count(), 0);

    assert_eq!(report.status, FlowStatus::Succeeded);
}

// ============================================================
// Scenarios 2 & 3: the unknown-type policy
// ============================================================

const MYSTERY_FLOW: &str = r#"{
    "trigger": {"type": "request"},
    "actions": {
        "known": {"type": "mocked"},
        "mystery": {"type": "unregistered_gadget"}
    }
}"#;

#[tokio::test]
async fn lenient_mode_skips_unknown_action_types() {
    let mut registry = ActionRegistry::new();
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(MYSTERY_FLOW, registry, FlowSettings::lenient());
    let report = runner
        .trigger(ValueContainer::Null)
        .await
        .expect("lenient run should complete without error");

    assert_eq!(
        report.action_state("mystery").unwrap().status,
        ActionStatus::Skipped
    );
    assert_eq!(
        report.action_state("known").unwrap().status,
        ActionStatus::Succeeded
    );
    assert_eq!(handle.call_count(), 1);
    assert_eq!(report.status, FlowStatus::Succeeded);
}

#[tokio::test]
async fn strict_mode_fails_before_any_action_executes() {
    let mut registry = ActionRegistry::new();
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(MYSTERY_FLOW, registry, FlowSettings::default());
    let result = runner.trigger(ValueContainer::Null).await;

    assert!(matches!(result, Err(FlowError::Configuration(_))));
    assert_eq!(handle.call_count(), 0);
}

// ============================================================
// Scenario 4: partial failure never halts independent branches
// ============================================================

const FAILURE_FLOW: &str = r#"{
    "trigger": {"type": "request"},
    "actions": {
        "boom": {"type": "exploding"},
        "independent": {"type": "mocked"},
        "dependent": {
            "type": "mocked",
            "inputs": {"from_pred": "@outputs('boom')"},
            "runAfter": ["boom"]
        }
    }
}"#;

fn failure_registry() -> (ActionRegistry, MockHandle) {
    let mut registry = ActionRegistry::new();
    mocked(&mut registry, "exploding", MockBehaviour::Fail("kaput".into()));
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);
    (registry, handle)
}

#[tokio::test]
async fn failed_action_leaves_siblings_and_dependents_running() {
    let (registry, handle) = failure_registry();
    let runner = runner(FAILURE_FLOW, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    let boom = report.action_state("boom").unwrap();
    assert_eq!(boom.status, ActionStatus::Failed);
    assert!(boom.error.is_some());

    // The independent sibling and the dependent both still ran; the
    // dependent observed Null where the failed output would have been.
    assert_eq!(
        report.action_state("independent").unwrap().status,
        ActionStatus::Succeeded
    );
    let dependent = report.action_state("dependent").unwrap();
    assert_eq!(dependent.status, ActionStatus::Succeeded);
    assert!(dependent.action_input.as_ref().unwrap()["from_pred"].is_null());

    assert_eq!(handle.call_count(), 2);
    assert_eq!(report.status, FlowStatus::Failed);
}

#[tokio::test]
async fn skip_dependents_policy_shortcuts_failed_branches() {
    let (registry, handle) = failure_registry();
    let settings = FlowSettings {
        failed_dependency_policy: FailedDependencyPolicy::SkipDependents,
        ..FlowSettings::default()
    };
    let runner = runner(FAILURE_FLOW, registry, settings);
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    assert_eq!(
        report.action_state("dependent").unwrap().status,
        ActionStatus::Skipped
    );
    assert_eq!(
        report.action_state("independent").unwrap().status,
        ActionStatus::Succeeded
    );
    // Only the independent action reached an executor.
    assert_eq!(handle.executed_actions(), vec!["independent"]);
}

// ============================================================
// Ordering and guard laws
// ============================================================

#[tokio::test]
async fn run_after_order_is_respected_regardless_of_declaration() {
    // Declared c, b, a but chained a → b → c.
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "c": {"type": "mocked", "runAfter": ["b"]},
            "b": {"type": "mocked", "runAfter": ["a"]},
            "a": {"type": "mocked"}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(document, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    assert_eq!(handle.executed_actions(), vec!["a", "b", "c"]);
    assert_eq!(report.status, FlowStatus::Succeeded);
}

#[tokio::test]
async fn diamond_joins_only_after_both_branches_complete() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "a": {"type": "mocked"},
            "left": {"type": "mocked", "runAfter": ["a"]},
            "right": {"type": "mocked", "runAfter": ["a"]},
            "join": {"type": "mocked", "runAfter": ["left", "right"]}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(document, registry, FlowSettings::default());
    runner.trigger(ValueContainer::Null).await.unwrap();

    let order = handle.executed_actions();
    assert_eq!(order.len(), 4);
    assert_eq!(order.first().map(String::as_str), Some("a"));
    assert_eq!(order.last().map(String::as_str), Some("join"));
}

#[tokio::test]
async fn guard_false_means_no_dispatch_and_no_output() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "guarded": {"type": "mocked", "conditions": ["@equals(1, 2)"]}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    let handle = mocked(
        &mut registry,
        "mocked",
        MockBehaviour::ReturnValue(ValueContainer::from("never seen")),
    );

    let runner = runner(document, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    let guarded = report.action_state("guarded").unwrap();
    assert_eq!(guarded.status, ActionStatus::Skipped);
    assert!(guarded.action_output.is_none());
    assert_eq!(handle.call_count(), 0);
    assert_eq!(report.status, FlowStatus::Succeeded);
}

#[tokio::test]
async fn guard_evaluation_error_fails_only_the_owning_action() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "broken_guard": {"type": "mocked", "conditions": ["@outputs('no_such_action')"]},
            "sibling": {"type": "mocked"}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(document, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    let broken = report.action_state("broken_guard").unwrap();
    assert_eq!(broken.status, ActionStatus::Failed);
    assert!(broken.error.is_some());
    assert_eq!(
        report.action_state("sibling").unwrap().status,
        ActionStatus::Succeeded
    );
    assert_eq!(handle.executed_actions(), vec!["sibling"]);
    assert_eq!(report.status, FlowStatus::Failed);
}

// ============================================================
// Data flow between actions
// ============================================================

#[tokio::test]
async fn published_outputs_feed_downstream_templates() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "fetch": {"type": "producer"},
            "format": {
                "type": "consumer",
                "inputs": {"parameters": {"line": "Subject: @{outputs('fetch')['body']['subject']}"}},
                "runAfter": ["fetch"]
            }
        }
    }"#;
    let mut registry = ActionRegistry::new();
    mocked(
        &mut registry,
        "producer",
        MockBehaviour::ReturnValue(ValueContainer::from_json(
            serde_json::json!({"body": {"subject": "Hello"}}),
        )),
    );
    let consumer = mocked(&mut registry, "consumer", MockBehaviour::ReturnNothing);

    let runner = runner(document, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    assert_eq!(report.status, FlowStatus::Succeeded);
    let (_, inputs) = &consumer.calls()[0];
    assert_eq!(
        inputs["parameters"]["line"],
        ValueContainer::from("Subject: Hello")
    );
}

#[tokio::test]
async fn repeated_runs_resolve_identical_inputs() {
    let mut registry = ActionRegistry::new();
    mocked(
        &mut registry,
        "open_api_connection",
        MockBehaviour::ReturnNothing,
    );
    mocked(&mut registry, "email_notification", MockBehaviour::ReturnNothing);

    let runner = runner(GREETING_FLOW, registry, FlowSettings::default());
    let trigger = trigger_value(serde_json::json!({
        "fullname": "John Doe",
        "lastname": "Doe"
    }));

    let first = runner.trigger(trigger.clone()).await.unwrap();
    let second = runner.trigger(trigger).await.unwrap();

    let name = "Create_a_new_row_-_Create_greeting_note";
    assert_eq!(
        first.action_state(name).unwrap().action_input,
        second.action_state(name).unwrap().action_input
    );
}

// ============================================================
// Report completeness
// ============================================================

#[tokio::test]
async fn every_defined_action_gets_exactly_one_terminal_state() {
    let (registry, _) = failure_registry();
    let runner = runner(FAILURE_FLOW, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    assert_eq!(report.action_states.len(), 3);
    for (name, state) in &report.action_states {
        assert!(
            state.status.is_terminal(),
            "action '{name}' left non-terminal"
        );
    }
}

#[tokio::test]
async fn trigger_before_initialize_is_rejected() {
    let runner = FlowRunner::new(ActionRegistry::new(), FlowSettings::default());
    let result = runner.trigger(ValueContainer::Null).await;
    assert!(matches!(result, Err(FlowError::NotInitialized)));
}

// ============================================================
// Timeouts, cancellation, concurrency
// ============================================================

#[tokio::test(start_paused = true)]
async fn slow_executor_times_out_as_a_failed_state() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "slow": {"type": "sleepy", "timeoutSecs": 1},
            "quick": {"type": "mocked"}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    mocked(
        &mut registry,
        "sleepy",
        MockBehaviour::Sleep(Duration::from_secs(60)),
    );
    mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(document, registry, FlowSettings::default());
    let report = runner.trigger(ValueContainer::Null).await.unwrap();

    let slow = report.action_state("slow").unwrap();
    assert_eq!(slow.status, ActionStatus::Failed);
    assert!(slow.error.is_some());
    assert_eq!(
        report.action_state("quick").unwrap().status,
        ActionStatus::Succeeded
    );
    assert_eq!(report.status, FlowStatus::Failed);
}

#[tokio::test]
async fn cancelled_run_reports_never_ran_actions_as_skipped() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "first": {"type": "mocked"},
            "second": {"type": "mocked", "runAfter": ["first"]}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    let handle = mocked(&mut registry, "mocked", MockBehaviour::ReturnNothing);

    let runner = runner(document, registry, FlowSettings::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = runner
        .trigger_with_cancellation(ValueContainer::Null, cancel)
        .await
        .unwrap();

    assert_eq!(report.status, FlowStatus::Cancelled);
    assert_eq!(handle.call_count(), 0);
    for state in report.action_states.values() {
        assert_eq!(state.status, ActionStatus::Skipped);
    }
}

#[tokio::test(start_paused = true)]
async fn independent_branches_run_concurrently() {
    let document = r#"{
        "trigger": {"type": "request"},
        "actions": {
            "left": {"type": "sleepy"},
            "right": {"type": "sleepy"}
        }
    }"#;
    let mut registry = ActionRegistry::new();
    mocked(
        &mut registry,
        "sleepy",
        MockBehaviour::Sleep(Duration::from_secs(1)),
    );

    let settings = FlowSettings {
        action_timeout_secs: None,
        ..FlowSettings::default()
    };
    let runner = runner(document, registry, settings);

    let started = tokio::time::Instant::now();
    let report = runner.trigger(ValueContainer::Null).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.status, FlowStatus::Succeeded);
    // Two one-second sleeps overlapping: well under the sequential two
    // seconds on the paused clock.
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");
}
