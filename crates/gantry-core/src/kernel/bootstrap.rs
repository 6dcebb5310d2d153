use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::loader::{ModuleLoader, ModuleSource};
use crate::config::module::{Implementation, ModuleSet, ServiceDefinition};
use crate::config::value::ConfigValue;
use crate::graph::builder::{DependencyGraph, NodeState};
use crate::instantiator::args::FactoryContext;
use crate::instantiator::error::WiringError;
use crate::instantiator::linker::link_fields;
use crate::instantiator::listeners::{ListenerRegistry, ServiceListener};
use crate::instantiator::registry::TypeRegistry;
use crate::instantiator::resolve::resolve_map;
use crate::kernel::component::ServiceInstance;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result, ServicePhase};
use crate::kernel::registry::{ServiceRegistry, SharedRegistry};
use crate::remote::client::RemoteClient;
use crate::remote::dispatcher::Dispatcher;
use crate::remote::proxy::{ProxyRegistry, RemoteProxyListener};
use crate::remote::transport::{Transport, TransportRegistry};

/// Where the kernel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelStatus {
    /// Never started.
    Idle,
    Running,
    Stopped,
    /// The last start failed and was rolled back.
    Failed,
}

/// Outcome of a shutdown. Failures do not stop the remaining services from
/// being stopped.
#[derive(Debug, Default)]
pub struct StopReport {
    /// Services stopped, in stop order.
    pub stopped: Vec<String>,
    pub failures: Vec<(String, Error)>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collects everything a [`Kernel`] needs before it can start.
#[derive(Debug, Default)]
pub struct KernelBuilder {
    types: TypeRegistry,
    listeners: ListenerRegistry,
    proxies: ProxyRegistry,
    transports: TransportRegistry,
    defaults: Vec<ModuleSource>,
    profiles: Vec<String>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type<F>(mut self, type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&FactoryContext<'_>) -> Result<ServiceInstance> + Send + Sync + 'static,
    {
        self.types.register(type_name, factory);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ServiceListener>) -> Self {
        self.listeners.register(listener);
        self
    }

    pub fn proxy<F>(mut self, interface: impl Into<String>, factory: F) -> Self
    where
        F: Fn(RemoteClient) -> ServiceInstance + Send + Sync + 'static,
    {
        self.proxies.register(interface, factory);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.register(transport);
        self
    }

    /// Built-in module tree, merged before any file.
    pub fn embedded(mut self, name: impl Into<String>, tree: ConfigValue) -> Self {
        self.defaults.push(ModuleSource::embedded(name, tree));
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    pub fn profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles.extend(profiles.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Kernel {
        Kernel {
            types: self.types,
            listeners: self.listeners,
            proxy_listener: RemoteProxyListener::new(self.proxies, self.transports),
            defaults: self.defaults,
            profiles: self.profiles,
            registry: ServiceRegistry::shared(),
            external: Vec::new(),
            states: Vec::new(),
            started: Vec::new(),
            status: KernelStatus::Idle,
        }
    }
}

/// Loads module definitions, builds their dependency graph and brings the
/// services up in order.
///
/// Startup is all-or-nothing: if any service fails, the ones already started
/// are stopped in reverse order, the registry is cleared and the original
/// error is returned.
#[derive(Debug)]
pub struct Kernel {
    types: TypeRegistry,
    listeners: ListenerRegistry,
    proxy_listener: RemoteProxyListener,
    defaults: Vec<ModuleSource>,
    profiles: Vec<String>,
    registry: SharedRegistry,
    /// Instances supplied by the embedding program; never started or stopped here.
    external: Vec<(String, ServiceInstance)>,
    /// Node states of the current or last run, in start order.
    states: Vec<(String, NodeState)>,
    started: Vec<(String, ServiceInstance)>,
    status: KernelStatus,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub fn status(&self) -> KernelStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == KernelStatus::Running
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Make an existing instance available to `$ref` under `name`. Only
    /// allowed while the kernel is not running.
    pub fn register_instance(&mut self, name: impl Into<String>, instance: ServiceInstance) -> Result<()> {
        let name = name.into();
        if self.is_running() {
            return Err(Error::lifecycle(
                KernelLifecyclePhase::Register,
                format!("cannot register '{}' while the kernel is running", name),
            ));
        }
        if self.external.iter().any(|(existing, _)| *existing == name) {
            return Err(WiringError::AlreadyRegistered(name).into());
        }
        debug!("Registered external instance '{}'", name);
        self.external.push((name, instance));
        Ok(())
    }

    /// Embedded defaults, then `primary`, then the override directory.
    pub fn loader(&self, primary: &Path, override_dir: Option<&Path>) -> Result<ModuleLoader> {
        let loader = self
            .defaults
            .iter()
            .cloned()
            .fold(ModuleLoader::new(), ModuleLoader::with_source);
        Ok(loader.with_locations(primary, override_dir)?)
    }

    pub fn load(&self, loader: &ModuleLoader) -> Result<ModuleSet> {
        let tree = loader.load()?;
        Ok(ModuleSet::from_tree(&tree, &self.profiles)?)
    }

    /// Build and validate the graph without instantiating anything.
    pub fn plan(&self, modules: &ModuleSet) -> Result<DependencyGraph> {
        let external: Vec<String> = self.external.iter().map(|(name, _)| name.clone()).collect();
        let graph = DependencyGraph::build(modules, &external)?;
        for node in graph.nodes() {
            self.validate(&node.definition)?;
        }
        Ok(graph)
    }

    fn validate(&self, definition: &ServiceDefinition) -> Result<()> {
        match &definition.implementation {
            Implementation::Local { type_name, .. } if !self.types.contains(type_name) => {
                return Err(WiringError::UnknownType {
                    service: definition.name.clone(),
                    type_name: type_name.clone(),
                }
                .into());
            }
            Implementation::Local { .. } => {}
            Implementation::Remote(_) => {
                if !definition.fields.is_empty() {
                    return Err(WiringError::FieldsOnRemote {
                        service: definition.name.clone(),
                    }
                    .into());
                }
                self.proxy_listener.check(definition)?;
            }
        }
        if let Some(unknown) = definition.listeners.iter().find(|l| !self.listeners.contains(l)) {
            return Err(WiringError::UnknownListener {
                service: definition.name.clone(),
                listener: unknown.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Start from a primary file and an optional override directory.
    pub async fn start(&mut self, primary: &Path, override_dir: Option<&Path>) -> Result<()> {
        self.ensure_not_running()?;
        let loader = self.loader(primary, override_dir)?;
        self.start_with_loader(&loader).await
    }

    /// Start from explicit sources, merged after the embedded defaults.
    pub async fn start_with_sources(&mut self, sources: Vec<ModuleSource>) -> Result<()> {
        let loader = self
            .defaults
            .iter()
            .cloned()
            .chain(sources)
            .fold(ModuleLoader::new(), ModuleLoader::with_source);
        self.start_with_loader(&loader).await
    }

    pub async fn start_with_loader(&mut self, loader: &ModuleLoader) -> Result<()> {
        self.ensure_not_running()?;
        let modules = self.load(loader)?;
        self.start_modules(&modules).await
    }

    pub async fn start_modules(&mut self, modules: &ModuleSet) -> Result<()> {
        self.ensure_not_running()?;
        let graph = self.plan(modules)?;
        info!(
            "{} v{} starting {} service(s)",
            constants::APP_NAME,
            constants::APP_VERSION,
            graph.len()
        );

        self.states = graph
            .ordered()
            .map(|node| (node.name().to_string(), NodeState::Pending))
            .collect();
        self.started.clear();
        {
            let mut registry = self.registry.write().await;
            registry.clear();
            for (name, instance) in &self.external {
                registry.register(name, instance.clone())?;
            }
        }

        for (position, node) in graph.ordered().enumerate() {
            if let Err(err) = self.bring_up(position, &node.definition).await {
                error!("Startup failed at '{}': {}", node.name(), err);
                self.states[position].1 = NodeState::Failed;
                self.rollback().await;
                self.status = KernelStatus::Failed;
                return Err(err);
            }
        }

        self.status = KernelStatus::Running;
        info!("All {} service(s) started", self.started.len());
        Ok(())
    }

    /// instantiate -> link -> listeners -> register -> start
    async fn bring_up(&mut self, position: usize, definition: &ServiceDefinition) -> Result<()> {
        let name = definition.name.as_str();
        let mut instance = match &definition.implementation {
            Implementation::Local { type_name, args } => {
                let (args, fields) = {
                    let registry = self.registry.read().await;
                    (
                        resolve_map(definition, args, &registry)?,
                        resolve_map(definition, &definition.fields, &registry)?,
                    )
                };
                let factory = self.types.get(type_name).ok_or_else(|| WiringError::UnknownType {
                    service: name.to_string(),
                    type_name: type_name.clone(),
                })?;
                debug!("Constructing '{}' as '{}'", name, type_name);
                let instance =
                    factory(&FactoryContext::new(name, &args)).map_err(|e| wrap(e, name, ServicePhase::Construct))?;
                link_fields(self.types.field_cache(), name, type_name, &instance, fields)?;
                Some(instance)
            }
            Implementation::Remote(_) => None,
        };

        instance = self
            .proxy_listener
            .on_instantiated(definition, instance)
            .map_err(|e| wrap(e, name, ServicePhase::Listen))?;
        for listener_name in &definition.listeners {
            let listener = self
                .listeners
                .get(listener_name)
                .ok_or_else(|| WiringError::UnknownListener {
                    service: name.to_string(),
                    listener: listener_name.clone(),
                })?;
            debug!("Running listener '{}' on '{}'", listener_name, name);
            instance = listener
                .on_instantiated(definition, instance)
                .map_err(|e| wrap(e, name, ServicePhase::Listen))?;
        }
        let instance = instance.ok_or_else(|| WiringError::NoInstance {
            service: name.to_string(),
        })?;
        self.states[position].1 = NodeState::Instantiated;

        self.registry.write().await.register(name, instance.clone())?;
        info!("Starting service '{}' ({})", name, instance.type_name());
        instance
            .service()
            .start()
            .await
            .map_err(|e| wrap(e, name, ServicePhase::Start))?;
        self.states[position].1 = NodeState::Started;
        self.started.push((name.to_string(), instance));
        Ok(())
    }

    async fn rollback(&mut self) {
        warn!("Rolling back {} started service(s)", self.started.len());
        let report = self.stop_started().await;
        for (service, err) in &report.failures {
            error!("Rollback could not stop '{}': {}", service, err);
        }
        self.registry.write().await.clear();
    }

    /// Stop every started service in reverse start order and clear the
    /// registry. Calling it when nothing is running is a no-op.
    pub async fn stop(&mut self) -> StopReport {
        if !self.is_running() {
            debug!("Kernel is not running, nothing to stop");
            return StopReport::default();
        }
        info!("Stopping {} service(s)", self.started.len());
        let report = self.stop_started().await;
        self.registry.write().await.clear();
        self.status = KernelStatus::Stopped;
        if report.is_clean() {
            info!("Kernel stopped");
        } else {
            warn!("Kernel stopped with {} failure(s)", report.failures.len());
        }
        report
    }

    async fn stop_started(&mut self) -> StopReport {
        let mut report = StopReport::default();
        while let Some((name, instance)) = self.started.pop() {
            info!("Stopping service '{}'", name);
            let state = match instance.service().stop().await {
                Ok(()) => {
                    report.stopped.push(name.clone());
                    NodeState::Stopped
                }
                Err(err) => {
                    error!("Error stopping service '{}': {}", name, err);
                    report.failures.push((name.clone(), wrap(err, &name, ServicePhase::Stop)));
                    NodeState::Failed
                }
            };
            self.set_state(&name, state);
        }
        report
    }

    fn set_state(&mut self, name: &str, state: NodeState) {
        if let Some(entry) = self.states.iter_mut().find(|(n, _)| n == name) {
            entry.1 = state;
        }
    }

    fn ensure_not_running(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::lifecycle(KernelLifecyclePhase::Start, "kernel is already running"));
        }
        Ok(())
    }

    pub async fn service(&self, name: &str) -> Option<ServiceInstance> {
        self.registry.read().await.get(name).cloned()
    }

    /// A registered service viewed through interface `I`.
    pub async fn interface<I>(&self, name: &str) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.service(name).await.and_then(|instance| instance.interface::<I>())
    }

    /// Snapshot of the registry in registration order.
    pub async fn services(&self) -> Vec<(String, ServiceInstance)> {
        self.registry.read().await.snapshot()
    }

    /// State of `name` in the current or last run.
    pub fn state(&self, name: &str) -> Option<NodeState> {
        self.states.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn states(&self) -> &[(String, NodeState)] {
        &self.states
    }

    /// Start order of the current or last run.
    pub fn start_order(&self) -> Vec<String> {
        self.states.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Dispatcher serving this kernel's services to remote callers.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.registry())
    }
}

/// Attach the service and phase unless the error already names the service.
fn wrap(err: Error, service: &str, phase: ServicePhase) -> Error {
    match err {
        Error::Wiring(_) | Error::ServiceLifecycle { .. } => err,
        other => other.in_service(service, phase),
    }
}
