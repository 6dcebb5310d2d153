use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use gantry_core::instantiator::LinkFault;
use gantry_core::kernel::error::{Error, Result};
use gantry_core::remote::{ApplicationError, InvokeFault, MethodSignature, RemoteError, RemoteEndpoint, Reply, decode_args};
use gantry_core::{Arg, FactoryContext, KernelBuilder, RemoteClient, Service, ServiceInstance, WiringError};
use gantry_tcp::TcpTransport;
use log::info;
use serde_json::Value as JsonValue;

/// Builder with the bundled service types, the `greeter` proxy and the TCP
/// transport registered.
pub fn kernel_builder(profiles: Vec<String>) -> KernelBuilder {
    KernelBuilder::new()
        .profiles(profiles)
        .transport(Arc::new(TcpTransport::new()))
        .register_type("greeter", greeter)
        .register_type("announcer", announcer)
        .proxy("greeter", greeter_proxy)
}

#[async_trait]
pub trait Greeter: Send + Sync {
    async fn greet(&self, name: &str) -> std::result::Result<String, RemoteError>;
}

#[derive(Debug)]
pub struct LocalGreeter {
    prefix: String,
}

impl LocalGreeter {
    fn greeting(&self, name: &str) -> std::result::Result<String, ApplicationError> {
        if name.trim().is_empty() {
            return Err(ApplicationError::new("empty_name", "name must not be empty"));
        }
        Ok(format!("{}, {}!", self.prefix, name))
    }
}

#[async_trait]
impl Service for LocalGreeter {
    fn type_name(&self) -> &str {
        "greeter"
    }
}

#[async_trait]
impl Greeter for LocalGreeter {
    async fn greet(&self, name: &str) -> std::result::Result<String, RemoteError> {
        self.greeting(name).map_err(RemoteError::Application)
    }
}

#[async_trait]
impl RemoteEndpoint for LocalGreeter {
    async fn invoke(&self, method: &MethodSignature, args: Vec<JsonValue>) -> std::result::Result<Reply, InvokeFault> {
        if !method.is("greet", 1) {
            return Err(InvokeFault::UnknownMethod);
        }
        let (name,): (String,) = decode_args(args)?;
        Reply::value(&self.greeting(&name)?)
    }
}

fn greeter(ctx: &FactoryContext<'_>) -> Result<ServiceInstance> {
    let greeter = Arc::new(LocalGreeter {
        prefix: ctx.string_or("prefix", "Hello")?,
    });
    Ok(ServiceInstance::new(greeter.clone())
        .export::<dyn Greeter>(greeter.clone())
        .export::<dyn RemoteEndpoint>(greeter))
}

/// Forwards [`Greeter`] calls to a remote kernel.
#[derive(Debug)]
pub struct GreeterProxy {
    client: RemoteClient,
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
}

fn greeter_proxy(client: RemoteClient) -> ServiceInstance {
    let proxy = Arc::new(GreeterProxy { client });
    ServiceInstance::new(proxy.clone()).export::<dyn Greeter>(proxy)
}

/// Greets its `names` on start through the linked `greeter` field, which
/// may be local or remote.
pub struct Announcer {
    names: Vec<String>,
    greeter: OnceLock<Arc<dyn Greeter>>,
}

impl fmt::Debug for Announcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcer")
            .field("names", &self.names)
            .field("linked", &self.greeter.get().is_some())
            .finish()
    }
}

#[async_trait]
impl Service for Announcer {
    fn type_name(&self) -> &str {
        "announcer"
    }

    async fn start(&self) -> Result<()> {
        let greeter = self
            .greeter
            .get()
            .ok_or_else(|| Error::Other("announcer started without a linked greeter".into()))?;
        for name in &self.names {
            info!("{}", greeter.greet(name).await?);
        }
        Ok(())
    }

    fn linkable_fields(&self) -> &'static [&'static str] {
        &["greeter"]
    }

    fn link(&self, field: &str, value: Arg) -> std::result::Result<(), LinkFault> {
        match field {
            "greeter" => {
                let greeter = value.link_interface::<dyn Greeter>()?;
                self.greeter.set(greeter).map_err(|_| LinkFault::AlreadyLinked)
            }
            other => Err(LinkFault::Unknown(other.to_string())),
        }
    }
}

fn announcer(ctx: &FactoryContext<'_>) -> Result<ServiceInstance> {
    let names = match ctx.arg("names") {
        None => Vec::new(),
        Some(arg) => string_list(arg).ok_or_else(|| WiringError::ArgumentType {
            service: ctx.name().to_string(),
            parameter: "names".into(),
            expected: "list of strings",
            found: arg.describe(),
        })?,
    };
    Ok(ServiceInstance::of(Announcer {
        names,
        greeter: OnceLock::new(),
    }))
}

fn string_list(arg: &Arg) -> Option<Vec<String>> {
    arg.as_list()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}
