use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::instantiator::error::WiringError;
use crate::kernel::component::ServiceInstance;

/// Registry handle shared by the kernel and its dispatchers.
pub type SharedRegistry = Arc<RwLock<ServiceRegistry>>;

/// Started services by qualified name, remembering registration order.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    instances: HashMap<String, ServiceInstance>,
    order: Vec<String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Names are registered at most once per run.
    pub fn register(&mut self, name: &str, instance: ServiceInstance) -> Result<(), WiringError> {
        if self.instances.contains_key(name) {
            return Err(WiringError::AlreadyRegistered(name.to_string()));
        }
        self.instances.insert(name.to_string(), instance);
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ServiceInstance> {
        self.instances.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Snapshot in registration order.
    pub fn snapshot(&self) -> Vec<(String, ServiceInstance)> {
        self.order
            .iter()
            .filter_map(|name| self.instances.get(name).map(|i| (name.clone(), i.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.order.clear();
    }
}
