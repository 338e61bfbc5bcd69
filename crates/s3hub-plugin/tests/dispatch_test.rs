//! Integration tests for operation dispatch.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Behavior, CallLog, InFlight, TestPlugin};
use s3hub_core::config::plugin::ManagerConfig;
use s3hub_plugin::prelude::*;
use s3hub_plugin::result::{NO_PLUGINS_EXECUTED, NO_PLUGINS_REGISTERED};
use s3hub_plugin::{OutcomeStatus, PluginError, PluginManager, RecordingObserver};
use tokio_util::sync::CancellationToken;

fn observed(config: ManagerConfig) -> (PluginManager, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let manager = PluginManager::new(config).with_observer(observer.clone());
    (manager, observer)
}

async fn run(manager: &PluginManager, operation: S3Operation) -> Result<OperationResult, PluginError> {
    let ctx = OperationContext::new(operation).with_bucket("media");
    manager
        .execute_operation(operation, &ctx, OperationArgs::new())
        .await
}

#[tokio::test]
async fn test_no_plugins_registered_returns_synthetic_success() {
    let manager = PluginManager::default();

    let result = run(&manager, S3Operation::List).await.unwrap();

    assert!(result.success);
    assert_eq!(result.message, NO_PLUGINS_REGISTERED);
    assert!(result.data.is_none());
}

#[tokio::test]
async fn test_operation_without_plugins_ignores_other_operations() {
    let manager = PluginManager::default();
    let (put, descriptor) = TestPlugin::new("writer", &[S3Operation::Put]).build();
    manager.register_plugin(descriptor).await.unwrap();

    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(result.message, NO_PLUGINS_REGISTERED);
    assert_eq!(put.executions(), 0);
}

#[tokio::test]
async fn test_last_successful_result_wins() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, p1) = TestPlugin::new("p1", &[S3Operation::Get])
        .priority(Priority::Medium)
        .log(&log)
        .build();
    let (_, p2) = TestPlugin::new("p2", &[S3Operation::Get])
        .priority(Priority::High)
        .log(&log)
        .build();
    manager.register_plugin(p1).await.unwrap();
    manager.register_plugin(p2).await.unwrap();

    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(log.entries(), vec!["execute:p2", "execute:p1"]);
    assert_eq!(result.message, "result from p1");
    assert_eq!(result.plugin.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_plugins_run_in_priority_order() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    for (name, priority) in [
        ("low", Priority::Low),
        ("critical", Priority::Critical),
        ("medium", Priority::Medium),
        ("high", Priority::High),
    ] {
        let (_, descriptor) = TestPlugin::new(name, &[S3Operation::Delete])
            .priority(priority)
            .log(&log)
            .build();
        manager.register_plugin(descriptor).await.unwrap();
    }

    run(&manager, S3Operation::Delete).await.unwrap();

    assert_eq!(
        log.entries(),
        vec!["execute:critical", "execute:high", "execute:medium", "execute:low"]
    );
}

#[tokio::test]
async fn test_declined_gate_skips_execution() {
    let (manager, observer) = observed(ManagerConfig::default());
    let (gated, first) = TestPlugin::new("gated", &[S3Operation::Head])
        .priority(Priority::High)
        .gated(false)
        .build();
    let (open, second) = TestPlugin::new("open", &[S3Operation::Head])
        .gated(true)
        .build();
    manager.register_plugin(first).await.unwrap();
    manager.register_plugin(second).await.unwrap();

    let result = run(&manager, S3Operation::Head).await.unwrap();

    assert_eq!(gated.executions(), 0);
    assert_eq!(open.executions(), 1);
    assert_eq!(result.message, "result from open");
    assert_eq!(observer.outcomes_for("gated")[0].status, OutcomeStatus::Skipped);
    assert_eq!(observer.outcomes_for("open")[0].status, OutcomeStatus::Succeeded);
}

#[tokio::test]
async fn test_every_gate_declining_reports_nothing_executed() {
    let manager = PluginManager::default();
    let (_, descriptor) = TestPlugin::new("closed", &[S3Operation::List])
        .gated(false)
        .build();
    manager.register_plugin(descriptor).await.unwrap();

    let result = run(&manager, S3Operation::List).await.unwrap();

    assert!(result.success);
    assert_eq!(result.message, NO_PLUGINS_EXECUTED);
}

#[tokio::test]
async fn test_failing_pre_processor_aborts_before_any_plugin() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, validator) = TestPlugin::new("validator", &[S3Operation::Put])
        .failing_pre_processor("key is empty")
        .log(&log)
        .build();
    let (worker, descriptor) = TestPlugin::new("worker", &[S3Operation::Put])
        .log(&log)
        .build();
    manager.register_plugin(validator).await.unwrap();
    manager.register_plugin(descriptor).await.unwrap();

    let err = run(&manager, S3Operation::Put).await.unwrap_err();

    match err {
        PluginError::PreProcessing { plugin, source } => {
            assert_eq!(plugin, "validator");
            assert_eq!(source.message, "key is empty");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(worker.executions(), 0);
    assert_eq!(log.entries(), vec!["pre:validator"]);
}

#[tokio::test]
async fn test_pre_processors_run_for_unrelated_operations() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, auditor) = TestPlugin::new("auditor", &[S3Operation::Sync])
        .pre_processor()
        .log(&log)
        .build();
    let (reader, descriptor) = TestPlugin::new("reader", &[S3Operation::Get])
        .log(&log)
        .build();
    manager.register_plugin(auditor).await.unwrap();
    manager.register_plugin(descriptor).await.unwrap();

    run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(log.entries(), vec!["pre:auditor", "execute:reader"]);
    let seen = reader.seen_args.lock().unwrap();
    assert_eq!(seen[0].get_bool("pre:auditor"), Some(true));
}

#[tokio::test]
async fn test_pre_processors_chain_in_registration_order() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, first) = TestPlugin::new("first", &[S3Operation::Copy])
        .priority(Priority::Low)
        .pre_processor()
        .log(&log)
        .build();
    let (plugin, second) = TestPlugin::new("second", &[S3Operation::Copy])
        .priority(Priority::Critical)
        .pre_processor()
        .log(&log)
        .build();
    manager.register_plugin(first).await.unwrap();
    manager.register_plugin(second).await.unwrap();

    run(&manager, S3Operation::Copy).await.unwrap();

    assert_eq!(
        log.entries(),
        vec!["pre:first", "pre:second", "execute:second", "execute:first"]
    );
    let seen = plugin.seen_args.lock().unwrap();
    assert!(seen[0].contains_key("pre:first"));
    assert!(seen[0].contains_key("pre:second"));
}

#[tokio::test]
async fn test_plugin_failure_is_isolated() {
    let (manager, observer) = observed(ManagerConfig::default());
    let (_, broken) = TestPlugin::new("broken", &[S3Operation::Get])
        .priority(Priority::Low)
        .failing("backend unavailable")
        .build();
    let (_, healthy) = TestPlugin::new("healthy", &[S3Operation::Get])
        .priority(Priority::High)
        .build();
    manager.register_plugin(broken).await.unwrap();
    manager.register_plugin(healthy).await.unwrap();

    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(result.message, "result from healthy");
    match &observer.outcomes_for("broken")[0].status {
        OutcomeStatus::Failed(reason) => assert!(reason.contains("backend unavailable")),
        other => panic!("unexpected status: {other}"),
    }
}

#[tokio::test]
async fn test_plugin_panic_is_isolated() {
    let (manager, observer) = observed(ManagerConfig::default());
    let (_, faulty) = TestPlugin::new("faulty", &[S3Operation::Get])
        .priority(Priority::High)
        .behavior(Behavior::Panic("index out of range".into()))
        .build();
    let (steady, descriptor) = TestPlugin::new("steady", &[S3Operation::Get])
        .priority(Priority::Low)
        .build();
    manager.register_plugin(faulty).await.unwrap();
    manager.register_plugin(descriptor).await.unwrap();

    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(result.message, "result from steady");
    assert_eq!(steady.executions(), 1);
    match &observer.outcomes_for("faulty")[0].status {
        OutcomeStatus::Failed(reason) => {
            assert!(reason.contains("panicked"));
            assert!(reason.contains("index out of range"));
        }
        other => panic!("unexpected status: {other}"),
    }

    let again = run(&manager, S3Operation::Get).await.unwrap();
    assert_eq!(again.message, "result from steady");
}

#[tokio::test]
async fn test_all_plugins_failing_reports_nothing_executed() {
    let manager = PluginManager::default();
    for name in ["a", "b"] {
        let (_, descriptor) = TestPlugin::new(name, &[S3Operation::Move])
            .failing("nope")
            .post_processor()
            .build();
        manager.register_plugin(descriptor).await.unwrap();
    }

    let result = run(&manager, S3Operation::Move).await.unwrap();

    assert!(result.success);
    assert_eq!(result.message, NO_PLUGINS_EXECUTED);
}

#[tokio::test]
async fn test_post_processors_transform_the_winning_result() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, executor) = TestPlugin::new("executor", &[S3Operation::Get])
        .log(&log)
        .build();
    let (_, tagger) = TestPlugin::new("tagger", &[S3Operation::Put])
        .post_processor()
        .log(&log)
        .build();
    let (_, stamper) = TestPlugin::new("stamper", &[S3Operation::Put])
        .post_processor()
        .log(&log)
        .build();
    manager.register_plugin(executor).await.unwrap();
    manager.register_plugin(tagger).await.unwrap();
    manager.register_plugin(stamper).await.unwrap();

    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(result.message, "result from executor +tagger +stamper");
    assert_eq!(
        log.entries(),
        vec!["execute:executor", "post:tagger", "post:stamper"]
    );
}

#[tokio::test]
async fn test_failing_post_processor_discards_the_result() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, executor) = TestPlugin::new("executor", &[S3Operation::Get])
        .log(&log)
        .build();
    let (_, broken) = TestPlugin::new("broken", &[S3Operation::Get])
        .failing_post_processor("cannot annotate")
        .priority(Priority::Low)
        .log(&log)
        .build();
    let (_, after) = TestPlugin::new("after", &[S3Operation::List])
        .post_processor()
        .log(&log)
        .build();
    manager.register_plugin(executor).await.unwrap();
    manager.register_plugin(broken).await.unwrap();
    manager.register_plugin(after).await.unwrap();

    let err = run(&manager, S3Operation::Get).await.unwrap_err();

    assert!(matches!(err, PluginError::PostProcessing { ref plugin, .. } if plugin == "broken"));
    assert!(!log.entries().contains(&"post:after".to_string()));
}

#[tokio::test]
async fn test_post_processors_skipped_when_nothing_succeeds() {
    let manager = PluginManager::default();
    let log = CallLog::new();
    let (_, descriptor) = TestPlugin::new("failing", &[S3Operation::Get])
        .failing("boom")
        .post_processor()
        .log(&log)
        .build();
    manager.register_plugin(descriptor).await.unwrap();

    run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(log.entries(), vec!["execute:failing"]);
}

#[tokio::test]
async fn test_disabled_stages_are_not_run() {
    let manager = PluginManager::new(ManagerConfig {
        enable_pre_processing: false,
        enable_post_processing: false,
        ..Default::default()
    });
    let log = CallLog::new();
    let (plugin, descriptor) = TestPlugin::new("all-in-one", &[S3Operation::Put])
        .failing_pre_processor("would reject")
        .failing_post_processor("would reject")
        .log(&log)
        .build();
    manager.register_plugin(descriptor).await.unwrap();

    let result = run(&manager, S3Operation::Put).await.unwrap();

    assert_eq!(result.message, "result from all-in-one");
    assert_eq!(log.entries(), vec!["execute:all-in-one"]);
    assert!(plugin.seen_args.lock().unwrap()[0].is_empty());
}

#[tokio::test]
async fn test_plugin_context_is_released_after_invocation() {
    let manager = PluginManager::default();
    let (plugin, descriptor) = TestPlugin::new("observer", &[S3Operation::Get]).build();
    manager.register_plugin(descriptor).await.unwrap();

    let caller = CancellationToken::new();
    let ctx = OperationContext::new(S3Operation::Get).with_cancellation(caller.clone());
    manager
        .execute_operation(S3Operation::Get, &ctx, OperationArgs::new())
        .await
        .unwrap();

    let tokens = plugin.seen_tokens.lock().unwrap();
    assert!(tokens[0].is_cancelled());
    assert!(!caller.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_slow_plugin_times_out_and_dispatch_continues() {
    let (manager, observer) = observed(ManagerConfig {
        plugin_timeout_ms: 100,
        ..Default::default()
    });
    let (_, slow) = TestPlugin::new("slow", &[S3Operation::Get])
        .priority(Priority::High)
        .behavior(Behavior::Sleep(Duration::from_secs(60)))
        .build();
    let (fast, descriptor) = TestPlugin::new("fast", &[S3Operation::Get]).build();
    manager.register_plugin(slow).await.unwrap();
    manager.register_plugin(descriptor).await.unwrap();

    let started = tokio::time::Instant::now();
    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(result.message, "result from fast");
    assert_eq!(fast.executions(), 1);
    assert_eq!(observer.outcomes_for("slow")[0].status, OutcomeStatus::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_caller_deadline_caps_plugin_timeout() {
    let (manager, observer) = observed(ManagerConfig::default());
    let (_, descriptor) = TestPlugin::new("slow", &[S3Operation::Sync])
        .behavior(Behavior::Sleep(Duration::from_secs(10)))
        .build();
    manager.register_plugin(descriptor).await.unwrap();

    let ctx = OperationContext::new(S3Operation::Sync).with_timeout(Duration::from_millis(250));
    let started = tokio::time::Instant::now();
    let result = manager
        .execute_operation(S3Operation::Sync, &ctx, OperationArgs::new())
        .await
        .unwrap();

    assert_eq!(result.message, NO_PLUGINS_EXECUTED);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(observer.outcomes_for("slow")[0].status, OutcomeStatus::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_stops_in_flight_plugin() {
    let (manager, observer) = observed(ManagerConfig::default());
    let (_, descriptor) = TestPlugin::new("slow", &[S3Operation::Get])
        .behavior(Behavior::Sleep(Duration::from_secs(10)))
        .build();
    manager.register_plugin(descriptor).await.unwrap();

    let token = CancellationToken::new();
    let ctx = OperationContext::new(S3Operation::Get).with_cancellation(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = tokio::time::Instant::now();
    let result = manager
        .execute_operation(S3Operation::Get, &ctx, OperationArgs::new())
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(result.message, NO_PLUGINS_EXECUTED);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(observer.outcomes_for("slow")[0].status, OutcomeStatus::Cancelled);
}

async fn peak_overlap(max_concurrent_plugins: usize) -> usize {
    let manager = Arc::new(PluginManager::new(ManagerConfig {
        max_concurrent_plugins,
        ..Default::default()
    }));
    let tracker = InFlight::new();
    for (name, operation) in [("getter", S3Operation::Get), ("putter", S3Operation::Put)] {
        let (_, descriptor) = TestPlugin::new(name, &[operation])
            .behavior(Behavior::Sleep(Duration::from_millis(100)))
            .in_flight(&tracker)
            .build();
        manager.register_plugin(descriptor).await.unwrap();
    }

    let tasks: Vec<_> = [S3Operation::Get, S3Operation::Put]
        .into_iter()
        .map(|operation| {
            let manager = manager.clone();
            tokio::spawn(async move { run(&manager, operation).await })
        })
        .collect();
    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert!(result.plugin.is_some());
    }

    let expected = (max_concurrent_plugins > 0).then_some(max_concurrent_plugins);
    assert_eq!(manager.available_permits(), expected);
    tracker.peak()
}

#[tokio::test(start_paused = true)]
async fn test_admission_gate_limits_plugins_in_flight() {
    assert_eq!(peak_overlap(1).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_limit_disables_admission_gate() {
    assert_eq!(peak_overlap(0).await, 2);
}

#[tokio::test]
async fn test_oversized_limit_does_not_panic() {
    let manager = PluginManager::new(ManagerConfig {
        max_concurrent_plugins: usize::MAX,
        ..Default::default()
    });
    let (_, descriptor) = TestPlugin::new("only", &[S3Operation::Get]).build();
    manager.register_plugin(descriptor).await.unwrap();

    let result = run(&manager, S3Operation::Get).await.unwrap();

    assert_eq!(result.message, "result from only");
    assert!(manager.available_permits().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_uses_registry_snapshot() {
    let manager = Arc::new(PluginManager::default());
    let (_, slow) = TestPlugin::new("slow", &[S3Operation::Get])
        .priority(Priority::High)
        .behavior(Behavior::Sleep(Duration::from_secs(1)))
        .build();
    let (later, descriptor) = TestPlugin::new("later", &[S3Operation::Get])
        .priority(Priority::Low)
        .build();
    manager.register_plugin(slow).await.unwrap();
    manager.register_plugin(descriptor).await.unwrap();

    let in_flight = {
        let manager = manager.clone();
        tokio::spawn(async move { run(&manager, S3Operation::Get).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    manager.unregister_plugin("later").await.unwrap();
    assert_eq!(manager.plugin_count().await, 1);

    let result = in_flight.await.unwrap().unwrap();
    assert_eq!(result.message, "result from later");
    assert_eq!(later.executions(), 1);
    assert_eq!(later.cleanups(), 1);
}

#[tokio::test]
async fn test_caller_arguments_reach_plugin() {
    let manager = PluginManager::default();
    let (plugin, descriptor) = TestPlugin::new("reader", &[S3Operation::Get]).build();
    manager.register_plugin(descriptor).await.unwrap();

    let ctx = OperationContext::new(S3Operation::List).with_key("photos/cat.jpg");
    let args = operation_args! { "version" => 3 };
    manager
        .execute_operation(S3Operation::Get, &ctx, args)
        .await
        .unwrap();

    let seen = plugin.seen_args.lock().unwrap();
    assert_eq!(seen[0].get_i64("version"), Some(3));
}
