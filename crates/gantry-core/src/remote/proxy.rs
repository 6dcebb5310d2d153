use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::info;

use crate::config::module::{Implementation, ServiceDefinition};
use crate::instantiator::error::WiringError;
use crate::instantiator::listeners::ServiceListener;
use crate::kernel::component::ServiceInstance;
use crate::kernel::error::Result;
use crate::remote::client::RemoteClient;
use crate::remote::transport::TransportRegistry;

/// Builds the local stand-in for a remote service from a client.
pub type ProxyFactory = Arc<dyn Fn(RemoteClient) -> ServiceInstance + Send + Sync>;

/// Proxy adapters keyed by interface name.
#[derive(Default, Clone)]
pub struct ProxyRegistry {
    factories: HashMap<String, ProxyFactory>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, interface: impl Into<String>, factory: F)
    where
        F: Fn(RemoteClient) -> ServiceInstance + Send + Sync + 'static,
    {
        self.factories.insert(interface.into(), Arc::new(factory));
    }

    pub fn get(&self, interface: &str) -> Option<ProxyFactory> {
        self.factories.get(interface).cloned()
    }

    pub fn contains(&self, interface: &str) -> bool {
        self.factories.contains_key(interface)
    }
}

impl fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut interfaces: Vec<&String> = self.factories.keys().collect();
        interfaces.sort();
        f.debug_struct("ProxyRegistry").field("interfaces", &interfaces).finish()
    }
}

pub const REMOTE_PROXY_LISTENER: &str = "remote-proxy";

/// Built-in listener that supplies proxies for remote definitions. It runs
/// before any listener named by the definition and leaves local instances
/// untouched.
#[derive(Debug)]
pub struct RemoteProxyListener {
    proxies: ProxyRegistry,
    transports: TransportRegistry,
}

impl RemoteProxyListener {
    pub fn new(proxies: ProxyRegistry, transports: TransportRegistry) -> Self {
        Self { proxies, transports }
    }

    /// Check that a remote definition can be satisfied, without building anything.
    pub fn check(&self, definition: &ServiceDefinition) -> std::result::Result<(), WiringError> {
        let Implementation::Remote(location) = &definition.implementation else {
            return Ok(());
        };
        if !self.proxies.contains(&location.interface) {
            return Err(WiringError::UnknownInterface {
                service: definition.name.clone(),
                interface: location.interface.clone(),
            });
        }
        if self.transports.get(location.scheme()).is_none() {
            return Err(WiringError::UnknownTransport {
                service: definition.name.clone(),
                scheme: location.scheme().to_string(),
            });
        }
        Ok(())
    }
}

impl ServiceListener for RemoteProxyListener {
    fn name(&self) -> &str {
        REMOTE_PROXY_LISTENER
    }

    fn on_instantiated(
        &self,
        definition: &ServiceDefinition,
        instance: Option<ServiceInstance>,
    ) -> Result<Option<ServiceInstance>> {
        let Implementation::Remote(location) = &definition.implementation else {
            return Ok(instance);
        };
        if instance.is_some() {
            return Ok(instance);
        }
        let factory = self.proxies.get(&location.interface).ok_or_else(|| WiringError::UnknownInterface {
            service: definition.name.clone(),
            interface: location.interface.clone(),
        })?;
        let transport = self.transports.get(location.scheme()).ok_or_else(|| WiringError::UnknownTransport {
            service: definition.name.clone(),
            scheme: location.scheme().to_string(),
        })?;
        info!("Service '{}' proxied to {}", definition.name, location);
        Ok(Some(factory(RemoteClient::new(location.clone(), transport))))
    }
}
