#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::StreamExt;

use super::common::{Greeter, GreeterProxy, LocalGreeter, Recorder, fixture_kernel, json_source};
use crate::instantiator::error::WiringError;
use crate::kernel::bootstrap::Kernel;
use crate::kernel::error::Error;
use crate::remote::client::RemoteClient;
use crate::remote::error::{DispatchReason, RemoteError};
use crate::remote::local::LocalTransport;
use crate::remote::location::RemoteLocation;

const SERVER: &str = r#"{"app": {"services": {
    "greeter": {"type": "greeter", "args": {"prefix": "Hi"}},
    "plain": {"type": "probe"}
}}}"#;

const CLIENT: &str = r#"{"edge": {"services": {
    "greeter": {"remote": {"url": "local://server", "service": "app.greeter",
                           "interface": "greeter", "max_retries": 0, "timeout_ms": 1000}}
}}}"#;

struct Cluster {
    server: Kernel,
    client: Kernel,
    transport: LocalTransport,
}

async fn cluster() -> Cluster {
    let transport = LocalTransport::new();
    let mut server = fixture_kernel(&Recorder::default()).build();
    server
        .start_with_sources(vec![json_source("server", SERVER)])
        .await
        .expect("server should start");
    transport.bind("server", server.dispatcher());

    let mut client = fixture_kernel(&Recorder::default())
        .transport(Arc::new(transport.clone()))
        .build();
    client
        .start_with_sources(vec![json_source("client", CLIENT)])
        .await
        .expect("client should start");
    Cluster {
        server,
        client,
        transport,
    }
}

async fn greeter(cluster: &Cluster) -> Arc<dyn Greeter> {
    cluster
        .client
        .interface::<dyn Greeter>("edge.greeter")
        .await
        .expect("proxy should be registered")
}

fn raw_client(cluster: &Cluster, service: &str) -> RemoteClient {
    RemoteClient::new(
        RemoteLocation::new("local://server", service, "greeter"),
        Arc::new(cluster.transport.clone()),
    )
}

#[tokio::test]
async fn test_proxy_forwards_calls_to_the_remote_service() {
    let cluster = cluster().await;
    let greeter = greeter(&cluster).await;
    assert_eq!(greeter.greet("Ada").await.unwrap(), "Hi, Ada!");

    let proxy = cluster
        .client
        .service("edge.greeter")
        .await
        .and_then(|i| i.downcast::<GreeterProxy>())
        .unwrap();
    assert_eq!(proxy.client.location().service, "app.greeter");
}

#[tokio::test]
async fn test_application_error_is_rethrown_unmodified() {
    let cluster = cluster().await;
    let err = greeter(&cluster).await.greet("").await.expect_err("empty name");
    let app = err.application().expect("application error");
    assert_eq!(app.tag, "empty_name");
    assert_eq!(app.message, "name must not be empty");
    assert_eq!(app.details, Some(serde_json::json!({"field": "name"})));
}

#[tokio::test]
async fn test_streaming_result_is_pulled_lazily() {
    let cluster = cluster().await;
    let produced = cluster
        .server
        .service("app.greeter")
        .await
        .and_then(|i| i.downcast::<LocalGreeter>())
        .unwrap()
        .produced
        .clone();

    let all: Vec<u32> = greeter(&cluster)
        .await
        .count_to(5)
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(all, vec![1, 2, 3, 4, 5]);
    assert_eq!(produced.load(Ordering::SeqCst), 5);

    let mut stream = greeter(&cluster).await.count_to(1_000).await.unwrap();
    assert_eq!(produced.load(Ordering::SeqCst), 5, "nothing is produced before the first poll");
    assert_eq!(stream.next().await.unwrap().unwrap(), 1);
    assert_eq!(stream.next().await.unwrap().unwrap(), 2);
    drop(stream);
    assert_eq!(produced.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_probe_checks_existence_without_calling_business_logic() {
    let cluster = cluster().await;
    raw_client(&cluster, "app.greeter").probe().await.expect("remotable service");

    match raw_client(&cluster, "app.plain").probe().await {
        Err(RemoteError::Dispatch(e)) => assert_eq!(e.reason, DispatchReason::NotRemotable),
        other => panic!("Expected NotRemotable, got {:?}", other),
    }
    match raw_client(&cluster, "app.ghost").probe().await {
        Err(RemoteError::Dispatch(e)) => assert_eq!(e.reason, DispatchReason::ServiceNotFound),
        other => panic!("Expected ServiceNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_method_and_bad_arguments_are_dispatch_errors() {
    let cluster = cluster().await;
    let client = raw_client(&cluster, "app.greeter");

    match client.invoke::<_, String>("shout", &("x",)).await {
        Err(RemoteError::Dispatch(e)) => assert_eq!(e.reason, DispatchReason::UnknownMethod),
        other => panic!("Expected UnknownMethod, got {:?}", other),
    }
    match client.invoke::<_, String>("greet", &(42,)).await {
        Err(RemoteError::Dispatch(e)) => assert_eq!(e.reason, DispatchReason::BadArguments),
        other => panic!("Expected BadArguments, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stopped_server_no_longer_resolves_services() {
    let mut cluster = cluster().await;
    cluster.server.stop().await;
    match greeter(&cluster).await.greet("Ada").await {
        Err(RemoteError::Dispatch(e)) => assert_eq!(e.reason, DispatchReason::ServiceNotFound),
        other => panic!("Expected ServiceNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_node_reports_attempt_count() {
    let transport = LocalTransport::new();
    let mut client = fixture_kernel(&Recorder::default())
        .transport(Arc::new(transport))
        .build();
    client
        .start_with_sources(vec![json_source(
            "client",
            r#"{"edge": {"services": {"greeter": {"remote": {
                "url": "local://nowhere", "service": "app.greeter", "interface": "greeter",
                "max_retries": 2, "backoff_ms": 1, "timeout_ms": 500}}}}}"#,
        )])
        .await
        .expect("proxies are created without contacting the remote side");

    let greeter = client.interface::<dyn Greeter>("edge.greeter").await.unwrap();
    match greeter.greet("Ada").await {
        Err(RemoteError::Transport(e)) => {
            assert_eq!(e.attempts, 3);
            assert!(e.source.is_transient());
        }
        other => panic!("Expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_proxies_compare_by_remote_location() {
    let cluster = cluster().await;
    let a = GreeterProxy {
        client: raw_client(&cluster, "app.greeter"),
    };
    let b = GreeterProxy {
        client: raw_client(&cluster, "app.greeter"),
    };
    let c = GreeterProxy {
        client: raw_client(&cluster, "app.plain"),
    };
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.client.to_string(), "remote app.greeter@local://server (greeter)");
}

#[tokio::test]
async fn test_remote_definition_needs_known_interface_and_scheme() {
    let mut kernel = fixture_kernel(&Recorder::default())
        .transport(Arc::new(LocalTransport::new()))
        .build();

    let err = kernel
        .start_with_sources(vec![json_source(
            "c",
            r#"{"m": {"services": {"s": {"remote": {"url": "local://x", "service": "a.b", "interface": "billing"}}}}}"#,
        )])
        .await
        .expect_err("no proxy for billing");
    assert!(matches!(err, Error::Wiring(WiringError::UnknownInterface { .. })));

    let err = kernel
        .start_with_sources(vec![json_source(
            "c",
            r#"{"m": {"services": {"s": {"remote": {"url": "tcp://10.0.0.1:1", "service": "a.b", "interface": "greeter"}}}}}"#,
        )])
        .await
        .expect_err("no tcp transport registered");
    assert!(matches!(err, Error::Wiring(WiringError::UnknownTransport { ref scheme, .. }) if scheme == "tcp"));
}
