#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde_json::Value as JsonValue;

use crate::config::loader::ModuleSource;
use crate::config::value::ConfigValue;
use crate::instantiator::args::{Arg, LinkFault};
use crate::kernel::bootstrap::KernelBuilder;
use crate::kernel::component::{Service, ServiceInstance};
use crate::kernel::error::{Error, Result};
use crate::remote::client::RemoteClient;
use crate::remote::endpoint::{InvokeFault, RemoteEndpoint, Reply, decode_args};
use crate::remote::error::{ApplicationError, RemoteError};
use crate::remote::stream::RemoteStream;
use crate::remote::wire::MethodSignature;

/// Shared log of lifecycle events ("start:a", "stop:a", ...).
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn record(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

#[async_trait]
impl Service for FixedClock {
    fn type_name(&self) -> &str {
        "clock"
    }
}

/// Records its lifecycle; can be told to fail on start or stop.
#[derive(Debug)]
pub struct Probe {
    pub name: String,
    pub recorder: Recorder,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub clock: OnceLock<i64>,
}

#[async_trait]
impl Service for Probe {
    fn type_name(&self) -> &str {
        "probe"
    }

    async fn start(&self) -> Result<()> {
        if self.fail_start {
            self.recorder.record(format!("fail-start:{}", self.name));
            return Err(Error::Other(format!("{} refused to start", self.name)));
        }
        self.recorder.record(format!("start:{}", self.name));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.recorder.record(format!("stop:{}", self.name));
        if self.fail_stop {
            return Err(Error::Other(format!("{} refused to stop", self.name)));
        }
        Ok(())
    }

    fn linkable_fields(&self) -> &'static [&'static str] {
        &["clock"]
    }

    fn link(&self, field: &str, value: Arg) -> std::result::Result<(), LinkFault> {
        match field {
            "clock" => {
                let clock = value.link_interface::<dyn Clock>()?;
                self.clock.set(clock.now()).map_err(|_| LinkFault::AlreadyLinked)
            }
            other => Err(LinkFault::Unknown(other.to_string())),
        }
    }
}

#[async_trait]
pub trait Greeter: Send + Sync {
    async fn greet(&self, name: &str) -> std::result::Result<String, RemoteError>;
    async fn count_to(&self, n: u32) -> std::result::Result<RemoteStream<u32>, RemoteError>;
}

/// Local greeter, remotable through its endpoint export.
#[derive(Debug)]
pub struct LocalGreeter {
    pub prefix: String,
    /// Stream elements produced so far, across all calls.
    pub produced: Arc<AtomicUsize>,
}

#[async_trait]
impl Service for LocalGreeter {
    fn type_name(&self) -> &str {
        "greeter"
    }
}

#[async_trait]
impl RemoteEndpoint for LocalGreeter {
    async fn invoke(&self, method: &MethodSignature, args: Vec<JsonValue>) -> std::result::Result<Reply, InvokeFault> {
        match (method.name.as_str(), method.arity) {
            ("greet", 1) => {
                let (name,): (String,) = decode_args(args)?;
                if name.is_empty() {
                    return Err(ApplicationError::new("empty_name", "name must not be empty")
                        .with_details(&serde_json::json!({"field": "name"}))
                        .into());
                }
                Reply::value(&format!("{}, {}!", self.prefix, name))
            }
            ("count_to", 1) => {
                let (n,): (u32,) = decode_args(args)?;
                let produced = self.produced.clone();
                Ok(Reply::stream(stream::iter(1..=n).map(move |i| {
                    produced.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, ApplicationError>(i)
                })))
            }
            _ => Err(InvokeFault::UnknownMethod),
        }
    }
}

/// Client-side stand-in for a remote greeter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreeterProxy {
    pub client: RemoteClient,
}

#[async_trait]
impl Service for GreeterProxy {
    fn type_name(&self) -> &str {
        "greeter-proxy"
    }
}

#[async_trait]
impl Greeter for GreeterProxy {
    async fn greet(&self, name: &str) -> std::result::Result<String, RemoteError> {
        self.client.invoke("greet", &(name,)).await
    }

    async fn count_to(&self, n: u32) -> std::result::Result<RemoteStream<u32>, RemoteError> {
        self.client.invoke_stream("count_to", &(n,)).await
    }
}

pub fn greeter_proxy(client: RemoteClient) -> ServiceInstance {
    let proxy = Arc::new(GreeterProxy { client });
    ServiceInstance::new(proxy.clone()).export::<dyn Greeter>(proxy)
}

/// Kernel builder with the fixture types registered.
pub fn fixture_kernel(recorder: &Recorder) -> KernelBuilder {
    let probes = recorder.clone();
    KernelBuilder::new()
        .register_type("probe", move |ctx| {
            Ok(ServiceInstance::of(Probe {
                name: ctx.name().to_string(),
                recorder: probes.clone(),
                fail_start: ctx.bool_or("fail_start", false)?,
                fail_stop: ctx.bool_or("fail_stop", false)?,
                clock: OnceLock::new(),
            }))
        })
        .register_type("clock", |ctx| {
            let clock = Arc::new(FixedClock(ctx.integer_or("now", 0)?));
            Ok(ServiceInstance::new(clock.clone()).export::<dyn Clock>(clock))
        })
        .register_type("greeter", |ctx| {
            let greeter = Arc::new(LocalGreeter {
                prefix: ctx.string_or("prefix", "Hello")?,
                produced: Arc::new(AtomicUsize::new(0)),
            });
            Ok(ServiceInstance::new(greeter.clone()).export::<dyn RemoteEndpoint>(greeter))
        })
        .proxy("greeter", greeter_proxy)
}

/// Parse an inline JSON document into an embedded source.
pub fn json_source(name: &str, json: &str) -> ModuleSource {
    let value: JsonValue = serde_json::from_str(json).expect("fixture JSON must parse");
    ModuleSource::embedded(name, ConfigValue::from(value))
}
