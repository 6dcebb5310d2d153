#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use gantry_core::kernel::registry::ServiceRegistry;
use gantry_core::remote::{
    ApplicationError, Dispatcher, InvocationPolicy, InvokeFault, MethodSignature, RemoteClient, RemoteEndpoint,
    RemoteLocation, Reply, decode_args,
};
use gantry_core::{Service, ServiceInstance};
use serde_json::Value as JsonValue;

use crate::client::TcpTransport;
use crate::server::{ServerHandle, TcpServer};

/// Remotable test service: `echo/1`, `count/1`, `forever/0` and `fail/0`.
#[derive(Debug, Default)]
pub struct Echo {
    pub produced: Arc<AtomicUsize>,
}

#[async_trait]
impl Service for Echo {
    fn type_name(&self) -> &str {
        "echo"
    }
}

#[async_trait]
impl RemoteEndpoint for Echo {
    async fn invoke(&self, method: &MethodSignature, args: Vec<JsonValue>) -> Result<Reply, InvokeFault> {
        let produced = self.produced.clone();
        match (method.name.as_str(), method.arity) {
            ("echo", 1) => {
                let (value,): (JsonValue,) = decode_args(args)?;
                Ok(Reply::Value(value))
            }
            ("count", 1) => {
                let (n,): (u32,) = decode_args(args)?;
                Ok(Reply::stream(stream::iter(1..=n).map(move |i| {
                    produced.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, ApplicationError>(i)
                })))
            }
            ("forever", 0) => Ok(Reply::stream(stream::iter(1u64..).map(move |i| {
                produced.fetch_add(1, Ordering::SeqCst);
                Ok::<u64, ApplicationError>(i)
            }))),
            ("fail", 0) => Err(ApplicationError::new("out_of_stock", "nothing left").into()),
            _ => Err(InvokeFault::UnknownMethod),
        }
    }
}

pub struct Node {
    pub echo: Arc<Echo>,
    pub server: ServerHandle,
}

/// Serves an `Echo` as `svc.echo` on an ephemeral port.
pub async fn serve_echo() -> Node {
    serve_echo_on("127.0.0.1:0").await
}

pub async fn serve_echo_on(addr: &str) -> Node {
    let echo = Arc::new(Echo::default());
    let registry = ServiceRegistry::shared();
    registry
        .write()
        .await
        .register(
            "svc.echo",
            ServiceInstance::new(echo.clone()).export::<dyn RemoteEndpoint>(echo.clone()),
        )
        .unwrap();
    let server = TcpServer::bind(addr, Dispatcher::new(registry))
        .await
        .unwrap()
        .spawn()
        .unwrap();
    Node { echo, server }
}

pub fn client(url: &str, transport: &TcpTransport, max_retries: u32) -> RemoteClient {
    let policy = InvocationPolicy {
        max_retries,
        timeout: Duration::from_secs(2),
        backoff: Duration::from_millis(5),
    };
    RemoteClient::new(
        RemoteLocation::new(url, "svc.echo", "echo").with_policy(policy),
        Arc::new(transport.clone()),
    )
}
