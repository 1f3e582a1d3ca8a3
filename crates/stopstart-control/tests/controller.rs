//! End-to-end controller behaviour against the in-memory backend.
//!
//! Run with:
//!   cargo test -p stopstart-control --test controller

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stopstart_compute::{BackendCall, BackendError, MockBackend};
use stopstart_control::{
    find_eligible, ControlConfig, Controller, InstanceId, InstanceState, InvalidOperationReason,
    InvocationRequest, InvocationResult, Operation, TagPredicate,
};

const TAG_KEY: &str = "stopstart_me";
const TAG_VALUE: &str = "yes";

fn tag() -> TagPredicate {
    TagPredicate::new(TAG_KEY, TAG_VALUE).unwrap()
}

fn controller(backend: &Arc<MockBackend>) -> Controller<MockBackend> {
    Controller::new(Arc::clone(backend), ControlConfig::new(tag()))
}

fn ids(raw: &[&str]) -> Vec<InstanceId> {
    raw.iter().map(|id| InstanceId::new(*id).unwrap()).collect()
}

/// Four tagged instances: three running, one stopped.
fn mixed_fleet() -> Arc<MockBackend> {
    let backend = Arc::new(MockBackend::new());
    backend.add_instance_in("r-a", "i-1", InstanceState::Running, &[(TAG_KEY, TAG_VALUE)]);
    backend.add_instance_in("r-a", "i-2", InstanceState::Running, &[(TAG_KEY, TAG_VALUE)]);
    backend.add_instance_in("r-b", "i-3", InstanceState::Running, &[(TAG_KEY, TAG_VALUE)]);
    backend.add_instance_in("r-b", "i-4", InstanceState::Stopped, &[(TAG_KEY, TAG_VALUE)]);
    backend
}

// =============================================================================
// Invalid operations
// =============================================================================

#[tokio::test]
async fn invalid_operations_make_no_backend_calls() {
    let backend = mixed_fleet();
    let controller = controller(&backend);

    let payloads = [
        json!({"operation": "reboot"}),
        json!({"operation": "STOP"}),
        json!({"operation": "Start"}),
        json!({"operation": ""}),
        json!({"operation": 1}),
        json!({"operation": ["stop"]}),
        json!({}),
        json!({"operation": null}),
        json!("stop"),
    ];

    for payload in payloads {
        let result = controller
            .handle(&InvocationRequest::from_value(payload.clone()))
            .await;
        assert!(
            matches!(result, InvocationResult::InvalidOperation { .. }),
            "{payload} should be rejected, got {result:?}"
        );
    }

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn missing_and_unrecognized_are_distinguished() {
    let backend = Arc::new(MockBackend::new());
    let controller = controller(&backend);

    let missing = controller
        .handle(&InvocationRequest::from_value(json!({"detail": {}})))
        .await;
    assert_eq!(
        missing,
        InvocationResult::InvalidOperation {
            reason: InvalidOperationReason::Missing
        }
    );

    let unrecognized = controller.handle(&InvocationRequest::new("hibernate")).await;
    assert_eq!(
        unrecognized,
        InvocationResult::InvalidOperation {
            reason: InvalidOperationReason::Unrecognized {
                value: "hibernate".to_string()
            }
        }
    );
}

// =============================================================================
// NoOp
// =============================================================================

#[tokio::test]
async fn untagged_fleet_is_noop_for_start() {
    let backend = Arc::new(MockBackend::new());
    backend.add_instance("i-9", InstanceState::Stopped, &[("team", "web")]);

    let result = controller(&backend)
        .handle(&InvocationRequest::new("start"))
        .await;

    assert_eq!(
        result,
        InvocationResult::NoOp {
            operation: Operation::Start
        }
    );
    assert_eq!(backend.describe_count(), 1);
    assert_eq!(backend.dispatch_count(), 0);
    assert_eq!(backend.state_of("i-9"), Some(InstanceState::Stopped));
}

#[tokio::test]
async fn nothing_eligible_is_noop_with_only_the_query() {
    let backend = Arc::new(MockBackend::new());
    backend.add_instance("i-1", InstanceState::Running, &[(TAG_KEY, TAG_VALUE)]);
    backend.add_instance("i-2", InstanceState::Pending, &[(TAG_KEY, TAG_VALUE)]);

    let result = controller(&backend)
        .handle(&InvocationRequest::new("start"))
        .await;

    assert!(matches!(result, InvocationResult::NoOp { .. }));
    assert_eq!(backend.calls().len(), 1);
    assert!(matches!(backend.calls()[0], BackendCall::Describe(_)));
}

// =============================================================================
// Eligibility
// =============================================================================

#[tokio::test]
async fn stop_only_finds_running_instances() {
    let backend = Arc::new(MockBackend::new());
    let states = [
        ("i-pending", InstanceState::Pending),
        ("i-running", InstanceState::Running),
        ("i-shutting", InstanceState::ShuttingDown),
        ("i-terminated", InstanceState::Terminated),
        ("i-stopping", InstanceState::Stopping),
        ("i-stopped", InstanceState::Stopped),
    ];
    for (id, state) in states {
        backend.add_instance(id, state, &[(TAG_KEY, TAG_VALUE)]);
    }

    let eligible = find_eligible(backend.as_ref(), &tag(), Operation::Stop)
        .await
        .unwrap();
    assert_eq!(eligible, ids(&["i-running"]));
}

#[tokio::test]
async fn start_only_finds_stopped_instances() {
    let backend = Arc::new(MockBackend::new());
    let states = [
        ("i-pending", InstanceState::Pending),
        ("i-running", InstanceState::Running),
        ("i-shutting", InstanceState::ShuttingDown),
        ("i-terminated", InstanceState::Terminated),
        ("i-stopping", InstanceState::Stopping),
        ("i-stopped", InstanceState::Stopped),
    ];
    for (id, state) in states {
        backend.add_instance(id, state, &[(TAG_KEY, TAG_VALUE)]);
    }

    let eligible = find_eligible(backend.as_ref(), &tag(), Operation::Start)
        .await
        .unwrap();
    assert_eq!(eligible, ids(&["i-stopped"]));
}

#[tokio::test]
async fn other_tag_values_are_untouched() {
    let backend = Arc::new(MockBackend::new());
    backend.add_instance("i-1", InstanceState::Running, &[(TAG_KEY, TAG_VALUE)]);
    backend.add_instance("i-2", InstanceState::Running, &[(TAG_KEY, "no")]);

    let result = controller(&backend)
        .handle(&InvocationRequest::new("stop"))
        .await;

    assert_eq!(result.dispatched_count(), 1);
    assert_eq!(backend.state_of("i-2"), Some(InstanceState::Running));
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn three_running_one_stopped_scenario() {
    let backend = mixed_fleet();

    let result = controller(&backend)
        .handle(&InvocationRequest::new("stop"))
        .await;

    assert_eq!(
        result,
        InvocationResult::Dispatched {
            operation: Operation::Stop,
            count: 3
        }
    );

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let BackendCall::Stop(dispatched) = &calls[1] else {
        panic!("expected a stop call, got {:?}", calls[1]);
    };
    let mut dispatched = dispatched.clone();
    dispatched.sort();
    assert_eq!(dispatched, ids(&["i-1", "i-2", "i-3"]));

    assert_eq!(backend.state_of("i-4"), Some(InstanceState::Stopped));
}

#[tokio::test]
async fn many_instances_one_bulk_call() {
    let backend = Arc::new(MockBackend::new());
    let names: Vec<String> = (0..40).map(|n| format!("i-{n:04}")).collect();
    for name in &names {
        backend.add_instance(name, InstanceState::Stopped, &[(TAG_KEY, TAG_VALUE)]);
    }

    let result = controller(&backend)
        .handle(&InvocationRequest::new("start"))
        .await;

    assert_eq!(result.dispatched_count(), 40);
    assert_eq!(backend.dispatch_count(), 1);
    let BackendCall::Start(dispatched) = &backend.calls()[1] else {
        panic!("expected a start call");
    };
    assert_eq!(dispatched.len(), 40);
}

#[tokio::test]
async fn repeated_stop_does_not_double_dispatch() {
    let backend = mixed_fleet();
    let controller = controller(&backend);

    let first = controller.handle(&InvocationRequest::new("stop")).await;
    let second = controller.handle(&InvocationRequest::new("stop")).await;

    assert_eq!(
        first,
        InvocationResult::Dispatched {
            operation: Operation::Stop,
            count: 3
        }
    );
    assert_eq!(
        second,
        InvocationResult::NoOp {
            operation: Operation::Stop
        }
    );
    assert_eq!(backend.dispatch_count(), 1);
}

#[tokio::test]
async fn instances_still_stopping_are_not_restarted() {
    let backend = Arc::new(MockBackend::new().without_settling());
    backend.add_instance("i-1", InstanceState::Running, &[(TAG_KEY, TAG_VALUE)]);
    let controller = controller(&backend);

    controller.handle(&InvocationRequest::new("stop")).await;
    assert_eq!(backend.state_of("i-1"), Some(InstanceState::Stopping));

    let start = controller.handle(&InvocationRequest::new("start")).await;
    assert!(matches!(start, InvocationResult::NoOp { .. }));
    assert_eq!(backend.dispatch_count(), 1);
}

#[tokio::test]
async fn stop_then_start_cycle() {
    let backend = mixed_fleet();
    let controller = controller(&backend);

    controller.handle(&InvocationRequest::new("stop")).await;
    let start = controller.handle(&InvocationRequest::new("start")).await;

    assert_eq!(start.dispatched_count(), 4);
    for id in ["i-1", "i-2", "i-3", "i-4"] {
        assert_eq!(backend.state_of(id), Some(InstanceState::Running));
    }
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn throttled_query_never_dispatches() {
    let backend = mixed_fleet();
    backend.fail_next_describe(BackendError::Throttled {
        operation: "DescribeInstances",
        message: "Request limit exceeded.".to_string(),
    });

    let result = controller(&backend)
        .handle(&InvocationRequest::new("stop"))
        .await;

    match result {
        InvocationResult::BackendError { detail, retriable } => {
            assert!(detail.contains("Request limit exceeded."), "{detail}");
            assert!(retriable);
        }
        other => panic!("expected BackendError, got {other:?}"),
    }
    assert_eq!(backend.dispatch_count(), 0);
    assert_eq!(backend.state_of("i-1"), Some(InstanceState::Running));
}

#[tokio::test]
async fn dispatch_failure_is_reported() {
    let backend = mixed_fleet();
    backend.fail_next_dispatch(BackendError::Unauthorized {
        operation: "StopInstances",
        code: "UnauthorizedOperation".to_string(),
        message: "You are not authorized to perform this operation.".to_string(),
    });

    let result = controller(&backend)
        .handle(&InvocationRequest::new("stop"))
        .await;

    assert!(
        matches!(result, InvocationResult::BackendError { retriable: false, .. }),
        "{result:?}"
    );
    assert_eq!(backend.dispatch_count(), 1);
}

#[tokio::test]
async fn next_invocation_recovers_after_failure() {
    let backend = mixed_fleet();
    backend.fail_next_describe(BackendError::Transport {
        operation: "DescribeInstances",
        message: "connection reset".to_string(),
    });
    let controller = controller(&backend);

    let first = controller.handle(&InvocationRequest::new("stop")).await;
    let second = controller.handle(&InvocationRequest::new("stop")).await;

    assert!(matches!(first, InvocationResult::BackendError { .. }));
    assert_eq!(second.dispatched_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_is_a_backend_error() {
    let backend = mixed_fleet();
    backend.set_latency(Some(Duration::from_secs(30)));
    let config = ControlConfig::new(tag()).with_timeout(Duration::from_secs(5));
    let controller = Controller::new(Arc::clone(&backend), config);

    let result = controller.handle(&InvocationRequest::new("stop")).await;

    match result {
        InvocationResult::BackendError { detail, retriable } => {
            assert!(detail.contains("deadline"), "{detail}");
            assert!(!detail.contains("outcome unknown"), "{detail}");
            assert!(retriable);
        }
        other => panic!("expected BackendError, got {other:?}"),
    }
    assert_eq!(backend.dispatch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_during_dispatch_reports_unknown_outcome() {
    let backend = mixed_fleet();
    // Query finishes at 3s, the bulk stop would finish at 6s
    backend.set_latency(Some(Duration::from_secs(3)));
    let config = ControlConfig::new(tag()).with_timeout(Duration::from_secs(5));
    let controller = Controller::new(Arc::clone(&backend), config);

    let result = controller.handle(&InvocationRequest::new("stop")).await;

    match result {
        InvocationResult::BackendError { detail, retriable } => {
            assert!(detail.contains("dispatch outcome unknown"), "{detail}");
            assert!(detail.contains("stop for 3 instance(s)"), "{detail}");
            assert!(retriable);
        }
        other => panic!("expected BackendError, got {other:?}"),
    }
    assert_eq!(backend.dispatch_count(), 1);
}

#[tokio::test]
async fn concurrent_invocations_are_isolated() {
    let backend = mixed_fleet();
    let controller = Arc::new(controller(&backend));

    let a = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.handle(&InvocationRequest::new("stop")).await })
    };
    let b = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.handle(&InvocationRequest::new("bogus")).await })
    };

    let a = a.await.unwrap();
    let b = b.await.unwrap();
    assert!(a.is_success());
    assert!(matches!(b, InvocationResult::InvalidOperation { .. }));
}
