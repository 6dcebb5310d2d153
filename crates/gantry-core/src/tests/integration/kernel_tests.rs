#![cfg(test)]

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use super::common::{Clock, FixedClock, Probe, Recorder, fixture_kernel, json_source};
use crate::config::module::ServiceDefinition;
use crate::graph::builder::NodeState;
use crate::graph::error::{BlockReason, GraphError};
use crate::instantiator::error::WiringError;
use crate::instantiator::listeners::ServiceListener;
use crate::kernel::bootstrap::{Kernel, KernelStatus};
use crate::kernel::component::ServiceInstance;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result, ServicePhase};

const LAYERED: &str = r#"{"app": {"services": {
    "web": {"type": "probe", "args": {"db": {"$ref": "db"}}},
    "db": {"type": "probe"},
    "cache": {"type": "probe", "args": {"db": {"$ref": "db"}}},
    "metrics": {"type": "probe"}
}}}"#;

async fn started(recorder: &Recorder, json: &str) -> Kernel {
    let mut kernel = fixture_kernel(recorder).build();
    kernel
        .start_with_sources(vec![json_source("test", json)])
        .await
        .expect("kernel should start");
    kernel
}

#[tokio::test]
async fn test_start_order_is_dependency_first_then_declaration_order() {
    let recorder = Recorder::default();
    let kernel = started(&recorder, LAYERED).await;

    let expected = vec!["app.db", "app.web", "app.cache", "app.metrics"];
    assert_eq!(kernel.start_order(), expected);
    assert_eq!(recorder.with_prefix("start:"), expected);
    assert_eq!(kernel.status(), KernelStatus::Running);

    let registered: Vec<String> = kernel.services().await.into_iter().map(|(name, _)| name).collect();
    assert_eq!(registered, expected);
}

#[tokio::test]
async fn test_start_order_is_identical_across_runs() {
    let first = started(&Recorder::default(), LAYERED).await.start_order();
    for _ in 0..5 {
        assert_eq!(started(&Recorder::default(), LAYERED).await.start_order(), first);
    }
}

#[tokio::test]
async fn test_stop_runs_in_reverse_start_order_and_clears_registry() {
    let recorder = Recorder::default();
    let mut kernel = started(&recorder, LAYERED).await;

    let report = kernel.stop().await;
    assert!(report.is_clean());
    assert_eq!(report.stopped, vec!["app.metrics", "app.cache", "app.web", "app.db"]);
    assert_eq!(recorder.with_prefix("stop:"), report.stopped);
    assert!(kernel.services().await.is_empty());
    assert!(kernel.service("app.db").await.is_none());
    assert_eq!(kernel.status(), KernelStatus::Stopped);
    assert_eq!(kernel.state("app.db"), Some(NodeState::Stopped));
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let recorder = Recorder::default();
    let mut kernel = started(&recorder, LAYERED).await;
    kernel.stop().await;
    let second = kernel.stop().await;
    assert!(second.stopped.is_empty());
    assert_eq!(recorder.with_prefix("stop:").len(), 4);
}

#[tokio::test]
async fn test_stop_continues_past_failures() {
    let recorder = Recorder::default();
    let mut kernel = started(
        &recorder,
        r#"{"app": {"services": {
            "a": {"type": "probe"},
            "b": {"type": "probe", "args": {"fail_stop": true}},
            "c": {"type": "probe"}
        }}}"#,
    )
    .await;

    let report = kernel.stop().await;
    assert_eq!(report.stopped, vec!["app.c", "app.a"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "app.b");
    match &report.failures[0].1 {
        Error::ServiceLifecycle { service, phase, .. } => {
            assert_eq!(service, "app.b");
            assert_eq!(*phase, ServicePhase::Stop);
        }
        other => panic!("Expected ServiceLifecycle error, got {:?}", other),
    }
    assert_eq!(recorder.with_prefix("stop:"), vec!["app.c", "app.b", "app.a"]);
    assert_eq!(kernel.state("app.b"), Some(NodeState::Failed));
}

#[tokio::test]
async fn test_start_failure_rolls_back_started_services() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {
                "a": {"type": "probe"},
                "b": {"type": "probe"},
                "c": {"type": "probe", "args": {"fail_start": true}},
                "d": {"type": "probe"}
            }}}"#,
        )])
        .await
        .expect_err("start should fail");

    match &err {
        Error::ServiceLifecycle { service, phase, .. } => {
            assert_eq!(service, "app.c");
            assert_eq!(*phase, ServicePhase::Start);
        }
        other => panic!("Expected ServiceLifecycle error, got {:?}", other),
    }
    assert_eq!(err.root().to_string(), "Error: app.c refused to start");

    assert_eq!(
        recorder.events(),
        vec!["start:app.a", "start:app.b", "fail-start:app.c", "stop:app.b", "stop:app.a"]
    );
    assert_eq!(kernel.state("app.a"), Some(NodeState::Stopped));
    assert_eq!(kernel.state("app.c"), Some(NodeState::Failed));
    assert_eq!(kernel.state("app.d"), Some(NodeState::Pending));
    assert!(kernel.services().await.is_empty());
    assert_eq!(kernel.status(), KernelStatus::Failed);

    // A failed kernel can be stopped safely and nothing is stopped twice.
    assert!(kernel.stop().await.stopped.is_empty());
    assert_eq!(recorder.with_prefix("stop:").len(), 2);
}

#[tokio::test]
async fn test_cycle_fails_before_anything_starts() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {
                "a": {"type": "probe", "args": {"next": {"$ref": "b"}}},
                "b": {"type": "probe", "args": {"next": {"$ref": "a"}}},
                "c": {"type": "probe", "args": {"needs": {"$ref": "a"}}},
                "d": {"type": "probe"}
            }}}"#,
        )])
        .await
        .expect_err("cycle should fail");

    match &err {
        Error::Graph(GraphError::Unresolvable { blocked }) => {
            let names: Vec<&str> = blocked.iter().map(|b| b.service.as_str()).collect();
            assert_eq!(names, vec!["app.a", "app.b", "app.c"]);
            assert_eq!(
                blocked[0].reason,
                BlockReason::Cyclic {
                    cycle: vec!["app.a".into(), "app.b".into(), "app.a".into()]
                }
            );
            assert_eq!(blocked[2].reason, BlockReason::WaitingOn(vec!["app.a".into()]));
        }
        other => panic!("Expected unresolvable graph, got {:?}", other),
    }
    assert!(recorder.events().is_empty());
    assert!(kernel.services().await.is_empty());
    assert!(!kernel.is_running());
}

#[tokio::test]
async fn test_field_link_is_applied_before_start() {
    let recorder = Recorder::default();
    let kernel = started(
        &recorder,
        r#"{"app": {"services": {
            "worker": {"type": "probe", "fields": {"clock": {"$ref": "clock"}}},
            "clock": {"type": "clock", "args": {"now": 42}}
        }}}"#,
    )
    .await;

    assert_eq!(kernel.start_order(), vec!["app.clock", "app.worker"]);
    let worker = kernel
        .service("app.worker")
        .await
        .and_then(|i| i.downcast::<Probe>())
        .expect("worker should be registered");
    assert_eq!(worker.clock.get(), Some(&42));
}

#[tokio::test]
async fn test_unknown_field_fails_with_type_and_field() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {
                "first": {"type": "probe"},
                "worker": {"type": "probe", "fields": {"timezone": "UTC"}}
            }}}"#,
        )])
        .await
        .expect_err("unknown field should fail");

    assert!(
        err.to_string().contains("type probe, field timezone: not found"),
        "unexpected message: {}",
        err
    );
    assert!(matches!(err, Error::Wiring(WiringError::FieldNotFound { .. })));
    assert_eq!(recorder.events(), vec!["start:app.first", "stop:app.first"]);
}

#[tokio::test]
async fn test_field_of_wrong_type_is_rejected() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"worker": {"type": "probe", "fields": {"clock": 5}}}}}"#,
        )])
        .await
        .expect_err("integer is not a clock");

    match err {
        Error::Wiring(WiringError::FieldType { field, found, .. }) => {
            assert_eq!(field, "clock");
            assert_eq!(found, "integer");
        }
        other => panic!("Expected FieldType error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_type_and_listener_fail_before_instantiation() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();

    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"a": {"type": "probe"}, "b": {"type": "teapot"}}}}"#,
        )])
        .await
        .expect_err("unknown type");
    assert!(matches!(err, Error::Wiring(WiringError::UnknownType { ref type_name, .. }) if type_name == "teapot"));

    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"a": {"type": "probe", "listeners": ["audit"]}}}}"#,
        )])
        .await
        .expect_err("unknown listener");
    assert!(matches!(err, Error::Wiring(WiringError::UnknownListener { ref listener, .. }) if listener == "audit"));
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_missing_and_disabled_references() {
    let mut kernel = fixture_kernel(&Recorder::default()).build();
    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"a": {"type": "probe", "args": {"x": {"$ref": "other.ghost"}}}}}}"#,
        )])
        .await
        .expect_err("missing reference");
    assert_eq!(
        err.to_string(),
        "Dependency graph error: Service 'app.a' references 'other.ghost', which is not declared"
    );

    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {
                "a": {"type": "probe", "args": {"x": {"$ref": "b"}}},
                "b": {"type": "probe", "enabled": false}
            }}}"#,
        )])
        .await
        .expect_err("disabled reference");
    assert!(matches!(err, Error::Graph(GraphError::DisabledReference { .. })));
}

#[tokio::test]
async fn test_start_while_running_is_rejected_and_restart_after_stop_works() {
    let recorder = Recorder::default();
    let mut kernel = started(&recorder, LAYERED).await;

    let err = kernel
        .start_with_sources(vec![json_source("test", LAYERED)])
        .await
        .expect_err("already running");
    assert!(matches!(
        err,
        Error::KernelLifecycleError {
            phase: KernelLifecyclePhase::Start,
            ..
        }
    ));

    kernel.stop().await;
    kernel
        .start_with_sources(vec![json_source("test", LAYERED)])
        .await
        .expect("restart should succeed");
    assert_eq!(recorder.with_prefix("start:").len(), 8);
    assert_eq!(kernel.services().await.len(), 4);
}

#[tokio::test]
async fn test_registered_instances_resolve_but_are_not_managed() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    let clock = Arc::new(FixedClock(7));
    kernel
        .register_instance("host.clock", ServiceInstance::new(clock.clone()).export::<dyn Clock>(clock))
        .expect("register before start");

    kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"worker": {"type": "probe", "fields": {"clock": {"$ref": "host.clock"}}}}}}"#,
        )])
        .await
        .expect("start");

    assert_eq!(kernel.start_order(), vec!["app.worker"]);
    let names: Vec<String> = kernel.services().await.into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["host.clock", "app.worker"]);
    let worker = kernel.service("app.worker").await.and_then(|i| i.downcast::<Probe>()).unwrap();
    assert_eq!(worker.clock.get(), Some(&7));

    let late = ServiceInstance::of(FixedClock(1));
    assert!(kernel.register_instance("host.late", late).is_err());

    let report = kernel.stop().await;
    assert_eq!(report.stopped, vec!["app.worker"]);
}

#[tokio::test]
async fn test_registered_name_clash_fails_before_anything_starts() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    kernel
        .register_instance("app.b", ServiceInstance::of(FixedClock(3)))
        .expect("register before start");

    let err = kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"a": {"type": "probe"}, "b": {"type": "probe"}}}}"#,
        )])
        .await
        .unwrap_err();
    match err {
        Error::Graph(GraphError::ExternalConflict { service }) => assert_eq!(service, "app.b"),
        other => panic!("Expected external conflict, got {:?}", other),
    }
    assert!(recorder.events().is_empty());
    assert!(!kernel.is_running());
}

#[derive(Debug)]
struct ClockAttacher;

impl ServiceListener for ClockAttacher {
    fn name(&self) -> &str {
        "attach-clock"
    }

    fn on_instantiated(
        &self,
        _definition: &ServiceDefinition,
        instance: Option<ServiceInstance>,
    ) -> Result<Option<ServiceInstance>> {
        Ok(instance.map(|i| i.export::<dyn Clock>(Arc::new(FixedClock(99)))))
    }
}

#[tokio::test]
async fn test_listener_can_replace_the_instance() {
    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).listener(Arc::new(ClockAttacher)).build();
    kernel
        .start_with_sources(vec![json_source(
            "test",
            r#"{"app": {"services": {"a": {"type": "probe", "listeners": ["attach-clock"]}}}}"#,
        )])
        .await
        .expect("start");

    let clock = kernel.interface::<dyn Clock>("app.a").await.expect("listener export");
    assert_eq!(clock.now(), 99);
    assert_eq!(recorder.events(), vec!["start:app.a"]);
}

#[tokio::test]
async fn test_start_from_files_with_override_directory() {
    let dir = tempdir().unwrap();
    let primary = dir.path().join("gantry.yaml");
    fs::write(
        &primary,
        "app:\n  services:\n    a:\n      type: probe\n    b:\n      type: probe\n",
    )
    .unwrap();
    let overrides = dir.path().join("gantry.d");
    fs::create_dir(&overrides).unwrap();
    fs::write(overrides.join("10-disable-b.yaml"), "app:\n  services:\n    b:\n      enabled: false\n").unwrap();
    fs::write(overrides.join("20-extra.json"), r#"{"extra": {"services": {"c": {"type": "probe"}}}}"#).unwrap();

    let recorder = Recorder::default();
    let mut kernel = fixture_kernel(&recorder).build();
    kernel.start(&primary, Some(overrides.as_path())).await.expect("start from files");

    assert_eq!(kernel.start_order(), vec!["app.a", "extra.c"]);
    assert!(kernel.service("app.b").await.is_none());
}

#[tokio::test]
async fn test_profile_gated_module_is_skipped_unless_active() {
    let json = r#"{
        "base": {"services": {"a": {"type": "probe"}}},
        "debug": {"profiles": ["dev"], "services": {"tracer": {"type": "probe"}}}
    }"#;
    let recorder = Recorder::default();

    let mut plain = fixture_kernel(&recorder).build();
    plain.start_with_sources(vec![json_source("t", json)]).await.unwrap();
    assert_eq!(plain.start_order(), vec!["base.a"]);

    let mut dev = fixture_kernel(&recorder).profile("dev").build();
    dev.start_with_sources(vec![json_source("t", json)]).await.unwrap();
    assert_eq!(dev.start_order(), vec!["base.a", "debug.tracer"]);
}

#[tokio::test]
async fn test_plan_reports_order_without_instantiating() {
    let recorder = Recorder::default();
    let kernel = fixture_kernel(&recorder).build();
    let loader = crate::config::loader::ModuleLoader::new().with_source(json_source("t", LAYERED));
    let modules = kernel.load(&loader).unwrap();
    let graph = kernel.plan(&modules).unwrap();
    assert_eq!(graph.start_order(), vec!["app.db", "app.web", "app.cache", "app.metrics"]);
    assert!(recorder.events().is_empty());
}
