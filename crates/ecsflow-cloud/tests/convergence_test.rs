mod common;

use common::{Cloud, ENDPOINT, Op, graph};
use ecsflow_cloud::{
    ActionType, CloudError, ConvergenceEngine, DependencyGraph, DriverRegistry, Flow, Outcome,
    ResourceKind, WaitConfig,
};
use ResourceKind::*;

fn engine(cloud: &Cloud) -> ConvergenceEngine {
    let wait = WaitConfig {
        initial_delay_ms: 100,
        max_delay_ms: 1000,
        multiplier: 2.0,
        timeout_secs: 5,
    };
    ConvergenceEngine::new(graph(), cloud.registry())
        .unwrap()
        .with_settle_wait(wait.clone())
        .with_drain_wait(wait)
}

#[tokio::test(start_paused = true)]
async fn test_provision_creates_everything_in_dependency_order() {
    let cloud = Cloud::new();
    let result = engine(&cloud).provision().await;

    assert!(result.is_success());
    assert_eq!(result.endpoint.as_deref(), Some(ENDPOINT));
    assert_eq!(result.created(), 8);
    assert_eq!(result.resources.len(), 8);

    for dep in [SecurityGroup, Cluster, ExecutionRole, LogSink, TargetGroup] {
        assert!(cloud.position(Op::Create, dep) < cloud.position(Op::Create, LoadBalancer));
    }
    assert!(cloud.position(Op::Create, LoadBalancer) < cloud.position(Op::Create, Listener));
    assert!(cloud.position(Op::Create, TargetGroup) < cloud.position(Op::Create, Listener));
    for dep in [Cluster, ExecutionRole, LogSink, TargetGroup] {
        assert!(cloud.position(Op::Create, dep) < cloud.position(Op::Create, Service));
    }

    // every create is preceded by a probe of the same resource
    for kind in ResourceKind::ALL {
        assert!(cloud.position(Op::Probe, kind) < cloud.position(Op::Create, kind));
    }
}

#[tokio::test(start_paused = true)]
async fn test_second_provision_makes_no_mutating_calls() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);

    let first = engine.provision().await;
    cloud.clear_calls();
    let second = engine.provision().await;

    assert!(second.is_success());
    assert!(cloud.mutating_calls().is_empty());
    assert_eq!(second.reused(), 8);
    assert_eq!(first.endpoint, second.endpoint);
    assert!(
        second
            .resources
            .iter()
            .all(|r| r.outcome == Outcome::Reused)
    );
}

#[tokio::test(start_paused = true)]
async fn test_reprovision_completes_half_created_resource() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    cloud.with(|c| {
        c.incomplete.insert(ExecutionRole);
    });
    cloud.clear_calls();

    let second = engine.provision().await;

    assert!(second.is_success());
    assert_eq!(second.get(ExecutionRole).unwrap().outcome, Outcome::Reused);
    assert_eq!(cloud.mutating_calls(), vec![(Op::Complete, ExecutionRole)]);

    cloud.clear_calls();
    engine.provision().await;
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_provision_reuses_partial_state() {
    let cloud = Cloud::new();
    cloud.seed(SecurityGroup);
    cloud.seed(ExecutionRole);

    let result = engine(&cloud).provision().await;

    assert!(result.is_success());
    assert_eq!(result.get(SecurityGroup).unwrap().outcome, Outcome::Reused);
    assert_eq!(result.get(ExecutionRole).unwrap().outcome, Outcome::Reused);
    assert_eq!(cloud.count(Op::Create, SecurityGroup), 0);
    // reused role is not waited on
    assert_eq!(cloud.count(Op::CheckUsable, ExecutionRole), 0);
    assert_eq!(result.created(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_provision_exposes_caller_identifiers() {
    let cloud = Cloud::new();
    let result = engine(&cloud).provision().await;

    assert_eq!(result.execution_role_arn(), Some("fake:execution-role"));
    assert_eq!(result.target_group_arn(), Some("fake:target-group"));
}

#[tokio::test(start_paused = true)]
async fn test_provision_fails_fast() {
    let cloud = Cloud::new();
    cloud.with(|c| {
        c.fail_create.insert(TargetGroup);
    });

    let result = engine(&cloud).provision().await;

    assert!(!result.is_success());
    assert_eq!(result.failed, Some(TargetGroup));
    assert!(result.endpoint.is_none());
    assert!(matches!(
        result.get(TargetGroup).unwrap().outcome,
        Outcome::Failed(ref cause) if cause.contains("LimitExceeded")
    ));

    assert_eq!(cloud.count(Op::Create, Listener), 0);
    assert_eq!(cloud.count(Op::Create, Service), 0);
    assert_eq!(cloud.count(Op::Create, LoadBalancer), 0);

    // the report still enumerates every resource
    assert_eq!(result.resources.len(), 8);
    for kind in [Service, LoadBalancer, Listener] {
        assert_eq!(result.get(kind).unwrap().outcome, Outcome::NotAttempted);
    }
    assert!(cloud.is_live(SecurityGroup));
}

#[tokio::test(start_paused = true)]
async fn test_readiness_timeout_halts_provisioning() {
    let cloud = Cloud::new();
    cloud.with(|c| {
        c.never_ready.insert(ExecutionRole);
    });

    let start = tokio::time::Instant::now();
    let result = engine(&cloud).provision().await;

    assert!(start.elapsed() >= std::time::Duration::from_secs(5));
    assert_eq!(result.failed, Some(ExecutionRole));
    assert!(matches!(
        result.get(ExecutionRole).unwrap().outcome,
        Outcome::Failed(ref cause) if cause.contains("did not become usable")
    ));
    assert_eq!(cloud.count(Op::Create, Service), 0);
    assert_eq!(cloud.count(Op::Probe, Service), 0);
}

#[tokio::test(start_paused = true)]
async fn test_role_used_once_it_propagates() {
    let cloud = Cloud::new();
    cloud.with(|c| {
        c.not_ready_for.insert(ExecutionRole, 3);
    });

    let result = engine(&cloud).provision().await;

    assert!(result.is_success());
    assert_eq!(cloud.count(Op::CheckUsable, ExecutionRole), 4);
    assert!(cloud.position(Op::CheckUsable, ExecutionRole) < cloud.position(Op::Create, Service));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_removes_everything_in_reverse_order() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    cloud.clear_calls();

    let result = engine.destroy().await;

    assert!(result.is_success());
    assert_eq!(result.deleted(), 8);
    for kind in ResourceKind::ALL {
        assert!(!cloud.is_live(kind));
    }

    assert!(cloud.position(Op::Delete, Listener) < cloud.position(Op::Delete, LoadBalancer));
    assert!(cloud.position(Op::Delete, Listener) < cloud.position(Op::Delete, TargetGroup));
    assert!(cloud.position(Op::Delete, LoadBalancer) < cloud.position(Op::Delete, SecurityGroup));
    for dep in [Cluster, ExecutionRole, LogSink, TargetGroup] {
        assert!(cloud.position(Op::Delete, Service) < cloud.position(Op::Delete, dep));
    }

    // each resource is probed exactly once per run, dependencies included
    for kind in ResourceKind::ALL {
        assert_eq!(cloud.count(Op::Probe, kind), 1, "{kind} probed more than once");
    }
}

#[tokio::test(start_paused = true)]
async fn test_service_is_drained_before_delete() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    cloud.clear_calls();

    engine.destroy().await;

    let quiesce = cloud.position(Op::Quiesce, Service).unwrap();
    let checked = cloud.position(Op::CheckQuiesced, Service).unwrap();
    let delete = cloud.position(Op::Delete, Service).unwrap();
    assert!(quiesce < checked && checked < delete);
}

#[tokio::test(start_paused = true)]
async fn test_drain_timeout_is_reported_and_teardown_continues() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    cloud.with(|c| {
        c.never_drains.insert(Service);
    });

    let result = engine.destroy().await;

    assert!(!result.is_success());
    assert_eq!(cloud.count(Op::Delete, Service), 0);
    assert!(cloud.is_live(Service));
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.get(Cluster).unwrap().outcome, Outcome::Deleted);
}

#[tokio::test(start_paused = true)]
async fn test_second_destroy_finds_nothing() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    engine.destroy().await;
    cloud.clear_calls();

    let result = engine.destroy().await;

    assert!(result.is_success());
    assert_eq!(result.already_absent(), 8);
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_on_empty_account() {
    let cloud = Cloud::new();
    let result = engine(&cloud).destroy().await;

    assert!(result.is_success());
    assert!(
        result
            .resources
            .iter()
            .all(|r| r.outcome == Outcome::AlreadyAbsent)
    );
}

#[tokio::test(start_paused = true)]
async fn test_destroy_is_best_effort() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    cloud.with(|c| {
        c.fail_delete.insert(TargetGroup);
    });

    let result = engine.destroy().await;

    assert!(!result.is_success());
    let failures = result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, TargetGroup);

    // resources after the failure were still attempted
    for kind in [LogSink, ExecutionRole, Cluster, SecurityGroup] {
        assert_eq!(cloud.count(Op::Delete, kind), 1);
        assert_eq!(result.get(kind).unwrap().outcome, Outcome::Deleted);
    }
    assert!(cloud.is_live(TargetGroup));
    assert_eq!(result.resources.len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_fails_dependent_when_dependency_cannot_be_probed() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.provision().await;
    cloud.with(|c| {
        c.fail_probe.insert(LoadBalancer);
    });

    let result = engine.destroy().await;

    assert!(!result.is_success());
    match &result.get(Listener).unwrap().outcome {
        Outcome::Failed(cause) => {
            assert!(cause.contains("could not resolve dependency load-balancer"), "{cause}");
            assert!(cause.contains("Throttling"), "{cause}");
        }
        other => panic!("expected listener to fail, got {other:?}"),
    }
    assert!(matches!(
        result.get(LoadBalancer).unwrap().outcome,
        Outcome::Failed(_)
    ));
    assert!(cloud.is_live(Listener));
    assert_eq!(cloud.count(Op::Delete, Listener), 0);

    // unrelated resources are still torn down
    for kind in [Service, TargetGroup, Cluster, SecurityGroup] {
        assert_eq!(result.get(kind).unwrap().outcome, Outcome::Deleted);
    }
    assert_eq!(result.failures().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_partial_state_finds_listener_through_load_balancer() {
    let cloud = Cloud::new();
    cloud.seed(SecurityGroup);
    cloud.seed(LoadBalancer);
    cloud.seed(Listener);

    let result = engine(&cloud).destroy().await;

    assert!(result.is_success());
    assert_eq!(result.get(Listener).unwrap().outcome, Outcome::Deleted);
    assert_eq!(result.get(LoadBalancer).unwrap().outcome, Outcome::Deleted);
    assert_eq!(result.get(Service).unwrap().outcome, Outcome::AlreadyAbsent);
    assert_eq!(result.deleted(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_touches_nothing() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    engine.cancellation_token().cancel();

    let result = engine.provision().await;

    assert!(result.cancelled);
    assert!(!result.is_success());
    assert!(cloud.calls().is_empty());
    assert!(
        result
            .resources
            .iter()
            .all(|r| r.outcome == Outcome::NotAttempted)
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run_stops_at_resource_boundary() {
    let cloud = Cloud::new();
    let engine = engine(&cloud);
    let token = engine.cancellation_token();

    // cancelled while the role is still propagating
    cloud.with(|c| {
        c.not_ready_for.insert(ExecutionRole, 2);
    });
    let handle = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = engine.provision().await;
    handle.await.unwrap();

    assert!(result.cancelled);
    // the in-flight resource finished
    assert_eq!(result.get(ExecutionRole).unwrap().outcome, Outcome::Created);
    assert_eq!(result.get(LogSink).unwrap().outcome, Outcome::NotAttempted);
    assert_eq!(cloud.count(Op::Probe, LogSink), 0);
}

#[tokio::test]
async fn test_missing_driver_is_a_configuration_error() {
    let cloud = Cloud::new();
    let err = ConvergenceEngine::new(graph(), DriverRegistry::new()).unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(err, CloudError::MissingDriver(_)));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_cycle_is_caught_before_any_call() {
    let mut descriptors = common::descriptors();
    descriptors[0] = descriptors[0].clone().depends_on([Listener]);

    let err = DependencyGraph::build(descriptors).unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test(start_paused = true)]
async fn test_plan_is_read_only() {
    let cloud = Cloud::new();
    cloud.seed(Cluster);
    let engine = engine(&cloud);

    let plan = engine.plan(Flow::Provision).await.unwrap();
    assert!(cloud.mutating_calls().is_empty());
    assert_eq!(plan.summary().create, 7);
    assert_eq!(plan.summary().no_change, 1);
    assert_eq!(plan.actions[0].kind, SecurityGroup);

    let plan = engine.plan(Flow::Destroy).await.unwrap();
    assert!(cloud.mutating_calls().is_empty());
    assert_eq!(plan.actions_by_type(ActionType::Delete).len(), 1);
    assert_eq!(plan.actions.last().unwrap().kind, SecurityGroup);
}
