use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::module::ServiceDefinition;
use crate::kernel::component::ServiceInstance;
use crate::kernel::error::Result;

/// Post-construction hook. Receives the instance built so far (`None` for a
/// remote definition nobody has handled yet) and returns the instance to
/// keep, which may be a wrapper or a replacement.
pub trait ServiceListener: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn on_instantiated(
        &self,
        definition: &ServiceDefinition,
        instance: Option<ServiceInstance>,
    ) -> Result<Option<ServiceInstance>>;
}

/// Listeners a definition can name in its `listeners` list.
#[derive(Debug, Default, Clone)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Arc<dyn ServiceListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn ServiceListener>) {
        self.listeners.insert(listener.name().to_string(), listener);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServiceListener>> {
        self.listeners.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }
}
